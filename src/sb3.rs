//! Scratch 3 `project.json` loading.
//!
//! Deserialize the document into [`Sb3Project`] and convert it with
//! `ScratchProject::from`. Anything malformed below the target level is
//! skipped with a warning rather than failing the whole load.

use std::{collections::HashMap, rc::Rc};

use serde::Deserialize;
use serde_json::Value as Json;
use serde_repr::Deserialize_repr;
use tracing::{debug, warn};

use crate::{
    ast::{
        Block, Event, Field, Input, Mutation, ProcedureArgument, ProcedurePrototype, Script,
        StartCondition,
        project::{self, ScratchProject},
    },
    interpreter::{
        target::{Costume, Point, RotationStyle, Sound},
        value::Value,
    },
};

#[derive(Debug, Deserialize)]
pub struct Sb3Project {
    pub targets: Vec<Sb3Target>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb3Target {
    pub is_stage: bool,
    pub name: Rc<str>,
    /// `id -> [name, value]`, with a trailing cloud flag on some variables.
    #[serde(default)]
    pub variables: HashMap<Rc<str>, Json>,
    /// `id -> [name, [items]]`
    #[serde(default)]
    pub lists: HashMap<Rc<str>, Json>,
    #[serde(default)]
    pub blocks: HashMap<Rc<str>, Sb3Entry>,
    #[serde(default)]
    pub current_costume: usize,
    #[serde(default)]
    pub costumes: Vec<Sb3Costume>,
    #[serde(default)]
    pub sounds: Vec<Sb3Sound>,
    #[serde(default = "full_volume")]
    pub volume: f64,
    #[serde(default)]
    pub layer_order: i64,
    pub tempo: Option<f64>,

    pub visible: Option<bool>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub size: Option<f64>,
    pub direction: Option<f64>,
    pub draggable: Option<bool>,
    pub rotation_style: Option<Rc<str>>,
}

fn full_volume() -> f64 {
    100.0
}

/// A value in the block map: either a block, or a top-level reporter
/// primitive (`[12, name, id, x, y]`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Sb3Entry {
    Block(Sb3Block),
    Primitive(Vec<Json>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb3Block {
    pub opcode: Rc<str>,
    pub next: Option<Rc<str>>,
    #[serde(default)]
    pub inputs: HashMap<Rc<str>, Json>,
    #[serde(default)]
    pub fields: HashMap<Rc<str>, Json>,
    #[serde(default)]
    pub top_level: bool,
    pub mutation: Option<Sb3Mutation>,
}

/// Argument lists are JSON arrays encoded as strings.
#[derive(Debug, Default, Deserialize)]
pub struct Sb3Mutation {
    pub proccode: Option<Rc<str>>,
    pub argumentids: Option<String>,
    pub argumentnames: Option<String>,
    pub argumentdefaults: Option<String>,
    pub warp: Option<Json>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb3Costume {
    pub name: Rc<str>,
    #[serde(default)]
    pub bitmap_resolution: Option<f64>,
    #[serde(default)]
    pub rotation_center_x: f64,
    #[serde(default)]
    pub rotation_center_y: f64,
    pub md5ext: Option<Rc<str>>,
    pub asset_id: Option<Rc<str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb3Sound {
    pub name: Rc<str>,
    #[serde(default)]
    pub rate: u32,
    #[serde(default)]
    pub sample_count: u32,
    pub md5ext: Option<Rc<str>>,
    pub asset_id: Option<Rc<str>>,
}

/// First element of an input array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr)]
#[repr(u8)]
enum InputKind {
    Shadow = 1,
    NoShadow = 2,
    Obscured = 3,
}

/// First element of a compressed primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr)]
#[repr(u8)]
enum PrimitiveKind {
    Number = 4,
    PositiveNumber = 5,
    WholeNumber = 6,
    Integer = 7,
    Angle = 8,
    Color = 9,
    Text = 10,
    Broadcast = 11,
    Variable = 12,
    List = 13,
}

impl From<Sb3Project> for ScratchProject {
    fn from(sb3: Sb3Project) -> Self {
        let mut targets = sb3.targets;
        targets.sort_by_key(|target| (!target.is_stage, target.layer_order));

        let mut targets = targets.into_iter().peekable();
        let stage = targets.next_if(|target| target.is_stage);
        let tempo = stage.as_ref().and_then(|stage| stage.tempo);
        let stage = stage.map_or_else(
            || {
                warn!("project has no stage");
                project::Target::stage()
            },
            Sb3Target::convert,
        );

        let mut project = ScratchProject::new(stage);
        if let Some(tempo) = tempo {
            project.tempo = tempo;
        }
        for target in targets {
            if target.is_stage {
                warn!(name = %target.name, "ignoring a second stage");
                continue;
            }
            project = project.with_sprite(target.convert());
        }
        debug!(sprites = project.sprites.len(), "loaded project");
        project
    }
}

impl Sb3Target {
    fn convert(self) -> project::Target {
        let mut target = if self.is_stage {
            project::Target::stage()
        } else {
            project::Target::sprite(self.name.clone())
        };
        target.name = self.name.clone();
        target.volume = self.volume;
        target.current_costume = self.current_costume;

        for (id, decl) in &self.variables {
            match decl.as_array().map(Vec::as_slice) {
                Some([name, value, ..]) => {
                    let name = json_text(name);
                    target = target.with_variable(id.clone(), name, json_value(value));
                }
                _ => warn!(object = %self.name, variable = %id, "malformed variable"),
            }
        }
        for (id, decl) in &self.lists {
            match decl.as_array().map(Vec::as_slice) {
                Some([name, Json::Array(items), ..]) => {
                    let items = items.iter().map(json_value);
                    target = target.with_list(id.clone(), json_text(name), items);
                }
                _ => warn!(object = %self.name, list = %id, "malformed list"),
            }
        }

        target.costumes = self.costumes.iter().map(Sb3Costume::convert).collect();
        target.sounds = self.sounds.iter().map(Sb3Sound::convert).collect();
        target.scripts = ScriptReader { target: &self }.scripts();

        let rotation_style = self.rotation_style.as_deref().and_then(|style| {
            let parsed = RotationStyle::parse(style);
            if parsed.is_none() {
                warn!(object = %self.name, style, "unknown rotation style");
            }
            parsed
        });
        target.placed(|sprite| {
            sprite.x = self.x.unwrap_or_default();
            sprite.y = self.y.unwrap_or_default();
            sprite.direction = self.direction.unwrap_or(90.0);
            sprite.size = self.size.unwrap_or(100.0);
            sprite.visible = self.visible.unwrap_or(true);
            sprite.draggable = self.draggable.unwrap_or_default();
            sprite.rotation_style = rotation_style.unwrap_or_default();
        })
    }
}

impl Sb3Costume {
    fn convert(&self) -> Costume {
        let mut costume = Costume::new(self.name.clone());
        costume.bitmap_resolution = self.bitmap_resolution.unwrap_or(1.0);
        costume.rotation_center = Point::new(self.rotation_center_x, self.rotation_center_y);
        costume.asset = self.md5ext.clone().or_else(|| self.asset_id.clone());
        costume
    }
}

impl Sb3Sound {
    fn convert(&self) -> Sound {
        Sound {
            name: self.name.clone(),
            rate: self.rate,
            sample_count: self.sample_count,
            decoded: self.rate > 0 && self.sample_count > 0,
            asset: self.md5ext.clone().or_else(|| self.asset_id.clone()),
        }
    }
}

/// Rebuilds block trees from one target's flat block map.
struct ScriptReader<'a> {
    target: &'a Sb3Target,
}

impl ScriptReader<'_> {
    fn scripts(&self) -> Vec<Script> {
        let mut top: Vec<_> = self
            .target
            .blocks
            .iter()
            .filter_map(|(id, entry)| match entry {
                Sb3Entry::Block(block) if block.top_level => Some((id, block)),
                _ => None,
            })
            .collect();
        // Map order is not stable; keep loading deterministic.
        top.sort_by(|a, b| a.0.cmp(b.0));

        top.into_iter()
            .map(|(id, block)| self.script(id, block))
            .collect()
    }

    fn script(&self, id: &str, hat: &Sb3Block) -> Script {
        let field = |name: &str| self.field(hat, name);
        let condition = match &*hat.opcode {
            "event_whenflagclicked" => StartCondition::FlagClicked,
            "event_whenthisspriteclicked" | "event_whenstageclicked" => StartCondition::Clicked,
            "control_start_as_clone" => StartCondition::StartAsClone,
            "event_whenkeypressed" => {
                StartCondition::KeyPressed(field("KEY_OPTION").map_or("".into(), |f| f.value))
            }
            "event_whenbroadcastreceived" => match field("BROADCAST_OPTION") {
                Some(option) => StartCondition::BroadcastReceived(Event::from(
                    option.into_resource(),
                )),
                None => StartCondition::Other(hat.opcode.clone()),
            },
            "event_whenbackdropswitchesto" => {
                StartCondition::BackdropSwitched(field("BACKDROP").map_or("".into(), |f| f.value))
            }
            "procedures_definition" => match self.prototype(hat) {
                Some(prototype) => StartCondition::ProcedureCalled(prototype),
                None => StartCondition::Other(hat.opcode.clone()),
            },
            _ => {
                // A loose stack: keep it so the compiler can see what it
                // holds, but nothing will ever start it.
                return Script::new(
                    StartCondition::Other(hat.opcode.clone()),
                    self.chain(Some(id)),
                );
            }
        };
        Script::new(condition, self.chain(hat.next.as_deref()))
    }

    fn prototype(&self, definition: &Sb3Block) -> Option<ProcedurePrototype> {
        let id = definition
            .inputs
            .get("custom_block")
            .and_then(|input| input.as_array()?.get(1)?.as_str())?;
        let Some(Sb3Entry::Block(prototype)) = self.target.blocks.get(id) else {
            warn!(object = %self.target.name, block = id, "missing procedure prototype");
            return None;
        };
        let mutation = prototype.mutation.as_ref()?;

        let ids = json_strings(mutation.argumentids.as_deref());
        let names = json_strings(mutation.argumentnames.as_deref());
        let defaults = json_strings(mutation.argumentdefaults.as_deref());

        let mut result = ProcedurePrototype::new(mutation.proccode.clone().unwrap_or_default());
        for (index, (id, name)) in ids.into_iter().zip(names).enumerate() {
            let default = defaults.get(index).cloned().unwrap_or_default();
            result = result.with_arg(ProcedureArgument::new(id, name).with_default(default));
        }
        if mutation.warp.as_ref().is_some_and(json_truthy) {
            result = result.warp();
        }
        Some(result)
    }

    /// Follows `next` links from `first`.
    fn chain(&self, first: Option<&str>) -> Vec<Block> {
        let mut blocks = vec![];
        let mut next = first;
        while let Some(id) = next {
            match self.target.blocks.get(id) {
                Some(Sb3Entry::Block(block)) => {
                    blocks.push(self.block(block));
                    next = block.next.as_deref();
                }
                Some(Sb3Entry::Primitive(primitive)) => {
                    blocks.extend(self.primitive(primitive));
                    next = None;
                }
                None => {
                    warn!(object = %self.target.name, block = id, "missing block");
                    next = None;
                }
            }
        }
        blocks
    }

    fn block(&self, sb3: &Sb3Block) -> Block {
        let mut block = Block::new(sb3.opcode.clone());

        for name in sb3.fields.keys() {
            if let Some(field) = self.field(sb3, name) {
                block = block.with_field(name.clone(), field);
            }
        }
        for (name, input) in &sb3.inputs {
            if let Some(input) = self.input(input) {
                block = block.with_input(name.clone(), input);
            }
        }
        if let Some(mutation) = &sb3.mutation {
            block.mutation = Some(Mutation {
                proc_code: mutation.proccode.clone().unwrap_or_default(),
                argument_ids: json_strings(mutation.argumentids.as_deref())
                    .into_iter()
                    .map(Rc::from)
                    .collect(),
                warp: mutation.warp.as_ref().is_some_and(json_truthy),
            });
        }
        block
    }

    /// `[value, id]`; the value may be a number or null.
    fn field(&self, block: &Sb3Block, name: &str) -> Option<Field> {
        let parts = block.fields.get(name)?.as_array()?;
        let value = json_text(parts.first()?);
        Some(match parts.get(1).and_then(Json::as_str) {
            Some(id) => Field::identified(id, value),
            None => Field::new(value),
        })
    }

    /// `[1, shadow]`, `[2, block]` or `[3, block, shadow]`, where each slot
    /// is a block id, an inline primitive or null.
    fn input(&self, input: &Json) -> Option<Input> {
        let parts = input.as_array()?;
        let kind: InputKind = match serde_json::from_value(parts.first()?.clone()) {
            Ok(kind) => kind,
            Err(err) => {
                warn!(object = %self.target.name, %err, "unknown input kind");
                return None;
            }
        };

        let slot = |index: usize| parts.get(index).map_or(vec![], |part| self.slot(part));
        let mut result = Input::default();
        match kind {
            InputKind::Shadow => result.shadow = slot(1).into_iter().next(),
            InputKind::NoShadow => result.blocks = slot(1),
            InputKind::Obscured => {
                result.blocks = slot(1);
                result.shadow = slot(2).into_iter().next();
            }
        }
        Some(result)
    }

    fn slot(&self, part: &Json) -> Vec<Block> {
        match part {
            Json::String(id) => self.chain(Some(id)),
            Json::Array(primitive) => self.primitive(primitive).into_iter().collect(),
            _ => vec![],
        }
    }

    fn primitive(&self, parts: &[Json]) -> Option<Block> {
        let kind: PrimitiveKind = match parts.first().cloned().map(serde_json::from_value) {
            Some(Ok(kind)) => kind,
            _ => {
                warn!(object = %self.target.name, ?parts, "unknown primitive");
                return None;
            }
        };
        let value = parts.get(1).map_or_else(|| "".into(), json_text);
        let id = || parts.get(2).map_or_else(|| value.clone(), json_text);

        Some(match kind {
            PrimitiveKind::Number => Block::number(value),
            PrimitiveKind::PositiveNumber => Block::pos_number(value),
            PrimitiveKind::WholeNumber => Block::whole_number(value),
            PrimitiveKind::Integer => Block::integer(value),
            PrimitiveKind::Angle => Block::angle(value),
            PrimitiveKind::Color => Block::color(value),
            PrimitiveKind::Text => Block::text(value),
            PrimitiveKind::Broadcast => Block::event(id(), value),
            PrimitiveKind::Variable => Block::var(id(), value),
            PrimitiveKind::List => Block::list(id(), value),
        })
    }
}

fn json_text(json: &Json) -> Rc<str> {
    match json {
        Json::String(string) => string.as_str().into(),
        Json::Null => "".into(),
        other => other.to_string().into(),
    }
}

fn json_value(json: &Json) -> Value {
    match json {
        Json::Number(num) => num.as_f64().unwrap_or_default().into(),
        Json::Bool(bool) => (*bool).into(),
        other => json_text(other).into(),
    }
}

/// `true` or `"true"`.
fn json_truthy(json: &Json) -> bool {
    match json {
        Json::Bool(bool) => *bool,
        Json::String(string) => string == "true",
        _ => false,
    }
}

/// Decodes a JSON array of strings stored as a string.
fn json_strings(encoded: Option<&str>) -> Vec<String> {
    let Some(encoded) = encoded else {
        return vec![];
    };
    serde_json::from_str::<Vec<Json>>(encoded).map_or_else(
        |err| {
            warn!(%err, encoded, "malformed mutation list");
            vec![]
        },
        |items| items.iter().map(|item| json_text(item).to_string()).collect(),
    )
}
