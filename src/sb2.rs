//! Scratch 2 `project.json` loading.
//!
//! A Scratch 2 project is the stage object itself, with sprites nested in
//! `children` and scripts stored as nested arrays such as
//! `["doRepeat", 10, [["forward:", 10]]]`. Blocks are renamed onto the
//! Scratch 3 library on the way in so both formats compile the same way.

use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value as Json;
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
#[serde(transparent)]
pub struct Sb2Project {
    pub stage: Sb2Object,
}

/// The stage or a sprite.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb2Object {
    pub obj_name: Rc<str>,
    #[serde(default)]
    pub variables: Vec<Sb2Variable>,
    #[serde(default)]
    pub lists: Vec<Sb2List>,
    /// `[x, y, [block, ...]]`
    #[serde(default)]
    pub scripts: Vec<Json>,
    #[serde(default)]
    pub costumes: Vec<Sb2Costume>,
    #[serde(default)]
    pub current_costume_index: f64,
    #[serde(default)]
    pub sounds: Vec<Sb2Sound>,
    /// Sprites, in layer order, mixed with watcher records.
    #[serde(default)]
    pub children: Vec<Sb2Child>,
    #[serde(rename = "tempoBPM")]
    pub tempo_bpm: Option<f64>,
    pub volume: Option<f64>,

    pub scratch_x: Option<f64>,
    pub scratch_y: Option<f64>,
    /// 1 is the costume's own size.
    pub scale: Option<f64>,
    pub direction: Option<f64>,
    pub rotation_style: Option<Rc<str>>,
    pub is_draggable: Option<bool>,
    pub visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Sb2Child {
    Sprite(Sb2Object),
    Other(Json),
}

#[derive(Debug, Deserialize)]
pub struct Sb2Variable {
    pub name: Rc<str>,
    #[serde(default)]
    pub value: Json,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb2List {
    pub list_name: Rc<str>,
    #[serde(default)]
    pub contents: Vec<Json>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb2Costume {
    pub costume_name: Rc<str>,
    #[serde(rename = "baseLayerMD5")]
    pub base_layer_md5: Option<Rc<str>>,
    pub bitmap_resolution: Option<f64>,
    #[serde(default)]
    pub rotation_center_x: f64,
    #[serde(default)]
    pub rotation_center_y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sb2Sound {
    pub sound_name: Rc<str>,
    pub md5: Option<Rc<str>>,
    #[serde(default)]
    pub rate: u32,
    #[serde(default)]
    pub sample_count: u32,
}

impl From<Sb2Project> for ScratchProject {
    fn from(sb2: Sb2Project) -> Self {
        let mut stage = sb2.stage;
        let children = std::mem::take(&mut stage.children);
        let tempo = stage.tempo_bpm;

        let mut project = ScratchProject::new(stage.convert(true));
        if let Some(tempo) = tempo {
            project.tempo = tempo;
        }
        for child in children {
            match child {
                Sb2Child::Sprite(sprite) => project = project.with_sprite(sprite.convert(false)),
                Sb2Child::Other(_) => {}
            }
        }
        debug!(sprites = project.sprites.len(), "loaded scratch 2 project");
        project
    }
}

impl Sb2Object {
    fn convert(self, is_stage: bool) -> project::Target {
        let mut target = if is_stage {
            project::Target::stage()
        } else {
            project::Target::sprite(self.obj_name.clone())
        };
        target.name = self.obj_name.clone();
        target.volume = self.volume.unwrap_or(100.0);
        target.current_costume = self.current_costume_index.max(0.0) as usize;

        // Scratch 2 has no ids; the name is both.
        for var in &self.variables {
            let value = json_value(&var.value);
            target = target.with_variable(var.name.clone(), var.name.clone(), value);
        }
        for list in &self.lists {
            let items = list.contents.iter().map(json_value);
            target = target.with_list(list.list_name.clone(), list.list_name.clone(), items);
        }

        target.costumes = self.costumes.iter().map(Sb2Costume::convert).collect();
        target.sounds = self.sounds.iter().map(Sb2Sound::convert).collect();
        target.scripts = self
            .scripts
            .iter()
            .filter_map(|script| {
                let blocks = script.as_array()?.get(2)?.as_array()?;
                let script = BlockReader { object: &self.obj_name }.script(blocks);
                if script.is_none() {
                    warn!(object = %self.obj_name, "skipping an empty script");
                }
                script
            })
            .collect();

        let rotation_style = self.rotation_style.as_deref().and_then(|style| {
            let parsed = RotationStyle::parse(style);
            if parsed.is_none() {
                warn!(object = %self.obj_name, style, "unknown rotation style");
            }
            parsed
        });
        target.placed(|sprite| {
            sprite.x = self.scratch_x.unwrap_or_default();
            sprite.y = self.scratch_y.unwrap_or_default();
            sprite.direction = self.direction.unwrap_or(90.0);
            sprite.size = self.scale.unwrap_or(1.0) * 100.0;
            sprite.visible = self.visible.unwrap_or(true);
            sprite.draggable = self.is_draggable.unwrap_or_default();
            sprite.rotation_style = rotation_style.unwrap_or_default();
        })
    }
}

impl Sb2Costume {
    fn convert(&self) -> Costume {
        let mut costume = Costume::new(self.costume_name.clone());
        costume.bitmap_resolution = self.bitmap_resolution.unwrap_or(1.0);
        costume.rotation_center = Point::new(self.rotation_center_x, self.rotation_center_y);
        costume.asset = self.base_layer_md5.clone();
        costume
    }
}

impl Sb2Sound {
    fn convert(&self) -> Sound {
        Sound {
            name: self.sound_name.clone(),
            rate: self.rate,
            sample_count: self.sample_count,
            decoded: self.rate > 0 && self.sample_count > 0,
            asset: self.md5.clone(),
        }
    }
}

/// Where one positional argument of a Scratch 2 block goes.
#[derive(Debug, Clone, Copy)]
enum Arg {
    Input(&'static str),
    /// A dropdown input. Literals become the menu shadow, whose field has
    /// the input's name.
    Menu(&'static str, &'static str),
    Field(&'static str),
    Variable,
    List,
    Broadcast,
    Substack(&'static str),
}

/// The Scratch 3 block a Scratch 2 opcode is read as.
#[derive(Debug, Clone, Copy)]
struct Alias {
    opcode: &'static str,
    args: &'static [Arg],
    /// A field the Scratch 2 opcode implies.
    fixed: Option<(&'static str, &'static str)>,
}

const fn to(opcode: &'static str, args: &'static [Arg]) -> Alias {
    Alias {
        opcode,
        args,
        fixed: None,
    }
}

const fn fixed(
    opcode: &'static str,
    args: &'static [Arg],
    field: &'static str,
    value: &'static str,
) -> Alias {
    Alias {
        opcode,
        args,
        fixed: Some((field, value)),
    }
}

fn alias(opcode: &str) -> Option<Alias> {
    Some(match opcode {
        // Motion
        "forward:" => to("motion_movesteps", &[Arg::Input("STEPS")]),
        "turnRight:" => to("motion_turnright", &[Arg::Input("DEGREES")]),
        "turnLeft:" => to("motion_turnleft", &[Arg::Input("DEGREES")]),
        "heading:" => to("motion_pointindirection", &[Arg::Input("DIRECTION")]),
        "pointTowards:" => to(
            "motion_pointtowards",
            &[Arg::Menu("TOWARDS", "motion_pointtowards_menu")],
        ),
        "gotoX:y:" => to("motion_gotoxy", &[Arg::Input("X"), Arg::Input("Y")]),
        "gotoSpriteOrMouse:" => to("motion_goto", &[Arg::Menu("TO", "motion_goto_menu")]),
        "glideSecs:toX:y:elapsed:from:" => to(
            "motion_glidesecstoxy",
            &[Arg::Input("SECS"), Arg::Input("X"), Arg::Input("Y")],
        ),
        "changeXposBy:" => to("motion_changexby", &[Arg::Input("DX")]),
        "xpos:" => to("motion_setx", &[Arg::Input("X")]),
        "changeYposBy:" => to("motion_changeyby", &[Arg::Input("DY")]),
        "ypos:" => to("motion_sety", &[Arg::Input("Y")]),
        "bounceOffEdge" => to("motion_ifonedgebounce", &[]),
        "setRotationStyle" => to("motion_setrotationstyle", &[Arg::Field("STYLE")]),
        "xpos" => to("motion_xposition", &[]),
        "ypos" => to("motion_yposition", &[]),
        "heading" => to("motion_direction", &[]),

        // Looks
        "lookLike:" => to("looks_switchcostumeto", &[Arg::Menu("COSTUME", "looks_costume")]),
        "nextCostume" => to("looks_nextcostume", &[]),
        "startScene" => to("looks_switchbackdropto", &[Arg::Menu("BACKDROP", "looks_backdrops")]),
        "nextScene" => to("looks_nextbackdrop", &[]),
        "say:duration:elapsed:from:" => {
            to("looks_sayforsecs", &[Arg::Input("MESSAGE"), Arg::Input("SECS")])
        }
        "say:" => to("looks_say", &[Arg::Input("MESSAGE")]),
        "think:duration:elapsed:from:" => {
            to("looks_thinkforsecs", &[Arg::Input("MESSAGE"), Arg::Input("SECS")])
        }
        "think:" => to("looks_think", &[Arg::Input("MESSAGE")]),
        "changeGraphicEffect:by:" => {
            to("looks_changeeffectby", &[Arg::Field("EFFECT"), Arg::Input("CHANGE")])
        }
        "setGraphicEffect:to:" => {
            to("looks_seteffectto", &[Arg::Field("EFFECT"), Arg::Input("VALUE")])
        }
        "filterReset" => to("looks_cleargraphiceffects", &[]),
        "changeSizeBy:" => to("looks_changesizeby", &[Arg::Input("CHANGE")]),
        "setSizeTo:" => to("looks_setsizeto", &[Arg::Input("SIZE")]),
        "show" => to("looks_show", &[]),
        "hide" => to("looks_hide", &[]),
        "comeToFront" => fixed("looks_gotofrontback", &[], "FRONT_BACK", "front"),
        "goBackByLayers:" => fixed(
            "looks_goforwardbackwardlayers",
            &[Arg::Input("NUM")],
            "FORWARD_BACKWARD",
            "backward",
        ),
        "costumeIndex" => fixed("looks_costumenumbername", &[], "NUMBER_NAME", "number"),
        "costumeName" => fixed("looks_costumenumbername", &[], "NUMBER_NAME", "name"),
        "backgroundIndex" => fixed("looks_backdropnumbername", &[], "NUMBER_NAME", "number"),
        "sceneName" => fixed("looks_backdropnumbername", &[], "NUMBER_NAME", "name"),
        "scale" => to("looks_size", &[]),

        // Sound and music
        "playSound:" => to("sound_play", &[Arg::Menu("SOUND_MENU", "sound_sounds_menu")]),
        "doPlaySoundAndWait" => {
            to("sound_playuntildone", &[Arg::Menu("SOUND_MENU", "sound_sounds_menu")])
        }
        "stopAllSounds" => to("sound_stopallsounds", &[]),
        "changeVolumeBy:" => to("sound_changevolumeby", &[Arg::Input("VOLUME")]),
        "setVolumeTo:" => to("sound_setvolumeto", &[Arg::Input("VOLUME")]),
        "volume" => to("sound_volume", &[]),
        "playDrum" => to(
            "music_playDrumForBeats",
            &[Arg::Menu("DRUM", "music_menu_DRUM"), Arg::Input("BEATS")],
        ),
        "rest:elapsed:from:" => to("music_restForBeats", &[Arg::Input("BEATS")]),
        "noteOn:duration:elapsed:from:" => {
            to("music_playNoteForBeats", &[Arg::Input("NOTE"), Arg::Input("BEATS")])
        }
        "instrument:" => to(
            "music_setInstrument",
            &[Arg::Menu("INSTRUMENT", "music_menu_INSTRUMENT")],
        ),
        "changeTempoBy:" => to("music_changeTempo", &[Arg::Input("TEMPO")]),
        "setTempoTo:" => to("music_setTempo", &[Arg::Input("TEMPO")]),
        "tempo" => to("music_getTempo", &[]),

        // Pen
        "clearPenTrails" => to("pen_clear", &[]),
        "stampCostume" => to("pen_stamp", &[]),
        "putPenDown" => to("pen_penDown", &[]),
        "putPenUp" => to("pen_penUp", &[]),
        "penColor:" => to("pen_setPenColorToColor", &[Arg::Input("COLOR")]),
        "changePenHueBy:" => to("pen_changePenHueBy", &[Arg::Input("HUE")]),
        "setPenHueTo:" => to("pen_setPenHueToNumber", &[Arg::Input("HUE")]),
        "changePenShadeBy:" => to("pen_changePenShadeBy", &[Arg::Input("SHADE")]),
        "setPenShadeTo:" => to("pen_setPenShadeToNumber", &[Arg::Input("SHADE")]),
        "changePenSizeBy:" => to("pen_changePenSizeBy", &[Arg::Input("SIZE")]),
        "penSize:" => to("pen_setPenSizeTo", &[Arg::Input("SIZE")]),

        // Events
        "broadcast:" => to("event_broadcast", &[Arg::Broadcast]),
        "doBroadcastAndWait" => to("event_broadcastandwait", &[Arg::Broadcast]),

        // Control
        "wait:elapsed:from:" => to("control_wait", &[Arg::Input("DURATION")]),
        "doRepeat" => to("control_repeat", &[Arg::Input("TIMES"), Arg::Substack("SUBSTACK")]),
        "doForever" => to("control_forever", &[Arg::Substack("SUBSTACK")]),
        "doIf" => to("control_if", &[Arg::Input("CONDITION"), Arg::Substack("SUBSTACK")]),
        "doIfElse" => to(
            "control_if_else",
            &[Arg::Input("CONDITION"), Arg::Substack("SUBSTACK"), Arg::Substack("SUBSTACK2")],
        ),
        "doWaitUntil" => to("control_wait_until", &[Arg::Input("CONDITION")]),
        "doUntil" => to(
            "control_repeat_until",
            &[Arg::Input("CONDITION"), Arg::Substack("SUBSTACK")],
        ),
        "doWhile" => to("control_while", &[Arg::Input("CONDITION"), Arg::Substack("SUBSTACK")]),
        "warpSpeed" => to("control_all_at_once", &[Arg::Substack("SUBSTACK")]),
        "stopScripts" => to("control_stop", &[Arg::Field("STOP_OPTION")]),
        "createCloneOf" => to(
            "control_create_clone_of",
            &[Arg::Menu("CLONE_OPTION", "control_create_clone_of_menu")],
        ),
        "deleteClone" => to("control_delete_this_clone", &[]),
        "COUNT" => to("control_get_counter", &[]),
        "INCR_COUNT" => to("control_incr_counter", &[]),
        "CLR_COUNT" => to("control_clear_counter", &[]),

        // Sensing
        "doAsk" => to("sensing_askandwait", &[Arg::Input("QUESTION")]),
        "answer" => to("sensing_answer", &[]),
        "touching:" => to(
            "sensing_touchingobject",
            &[Arg::Menu("TOUCHINGOBJECTMENU", "sensing_touchingobjectmenu")],
        ),
        "touchingColor:" => to("sensing_touchingcolor", &[Arg::Input("COLOR")]),
        "color:sees:" => to(
            "sensing_coloristouchingcolor",
            &[Arg::Input("COLOR"), Arg::Input("COLOR2")],
        ),
        "distanceTo:" => to(
            "sensing_distanceto",
            &[Arg::Menu("DISTANCETOMENU", "sensing_distancetomenu")],
        ),
        "keyPressed:" => to("sensing_keypressed", &[Arg::Menu("KEY_OPTION", "sensing_keyoptions")]),
        "mousePressed" => to("sensing_mousedown", &[]),
        "mouseX" => to("sensing_mousex", &[]),
        "mouseY" => to("sensing_mousey", &[]),
        "soundLevel" => to("sensing_loudness", &[]),
        "timer" => to("sensing_timer", &[]),
        "timerReset" => to("sensing_resettimer", &[]),
        "getAttribute:of:" => to(
            "sensing_of",
            &[Arg::Field("PROPERTY"), Arg::Menu("OBJECT", "sensing_of_object_menu")],
        ),
        "timeAndDate" => to("sensing_current", &[Arg::Field("CURRENTMENU")]),
        "timestamp" => to("sensing_dayssince2000", &[]),
        "getUserName" => to("sensing_username", &[]),

        // Operators
        "+" => to("operator_add", &[Arg::Input("NUM1"), Arg::Input("NUM2")]),
        "-" => to("operator_subtract", &[Arg::Input("NUM1"), Arg::Input("NUM2")]),
        "*" => to("operator_multiply", &[Arg::Input("NUM1"), Arg::Input("NUM2")]),
        "/" => to("operator_divide", &[Arg::Input("NUM1"), Arg::Input("NUM2")]),
        "%" => to("operator_mod", &[Arg::Input("NUM1"), Arg::Input("NUM2")]),
        "randomFrom:to:" => to("operator_random", &[Arg::Input("FROM"), Arg::Input("TO")]),
        "<" => to("operator_lt", &[Arg::Input("OPERAND1"), Arg::Input("OPERAND2")]),
        ">" => to("operator_gt", &[Arg::Input("OPERAND1"), Arg::Input("OPERAND2")]),
        "=" => to("operator_equals", &[Arg::Input("OPERAND1"), Arg::Input("OPERAND2")]),
        "&" => to("operator_and", &[Arg::Input("OPERAND1"), Arg::Input("OPERAND2")]),
        "|" => to("operator_or", &[Arg::Input("OPERAND1"), Arg::Input("OPERAND2")]),
        "not" => to("operator_not", &[Arg::Input("OPERAND")]),
        "concatenate:with:" => to("operator_join", &[Arg::Input("STRING1"), Arg::Input("STRING2")]),
        "letter:of:" => to("operator_letter_of", &[Arg::Input("LETTER"), Arg::Input("STRING")]),
        "stringLength:" => to("operator_length", &[Arg::Input("STRING")]),
        "rounded" => to("operator_round", &[Arg::Input("NUM")]),
        "computeFunction:of:" => {
            to("operator_mathop", &[Arg::Field("OPERATOR"), Arg::Input("NUM")])
        }

        // Data
        "setVar:to:" => to("data_setvariableto", &[Arg::Variable, Arg::Input("VALUE")]),
        "changeVar:by:" => to("data_changevariableby", &[Arg::Variable, Arg::Input("VALUE")]),
        "showVariable:" => to("data_showvariable", &[Arg::Variable]),
        "hideVariable:" => to("data_hidevariable", &[Arg::Variable]),
        "append:toList:" => to("data_addtolist", &[Arg::Input("ITEM"), Arg::List]),
        "deleteLine:ofList:" => to("data_deleteoflist", &[Arg::Input("INDEX"), Arg::List]),
        "insert:at:ofList:" => to(
            "data_insertatlist",
            &[Arg::Input("ITEM"), Arg::Input("INDEX"), Arg::List],
        ),
        "setLine:ofList:to:" => {
            to("data_replaceitemoflist", &[Arg::Input("INDEX"), Arg::List, Arg::Input("ITEM")])
        }
        "getLine:ofList:" => to("data_itemoflist", &[Arg::Input("INDEX"), Arg::List]),
        "lineCountOfList:" => to("data_lengthoflist", &[Arg::List]),
        "list:contains:" => to("data_listcontainsitem", &[Arg::List, Arg::Input("ITEM")]),
        "showList:" => to("data_showlist", &[Arg::List]),
        "hideList:" => to("data_hidelist", &[Arg::List]),

        _ => return None,
    })
}

/// Turns one object's nested block arrays into block trees.
struct BlockReader<'a> {
    object: &'a str,
}

impl BlockReader<'_> {
    /// The first block decides how the script starts. Returns `None` for an
    /// empty script.
    fn script(&self, blocks: &[Json]) -> Option<Script> {
        let hat = blocks.first()?.as_array()?;
        let opcode = hat.first()?.as_str()?;
        let text = |index: usize| hat.get(index).map_or_else(|| "".into(), json_text);

        let condition = match opcode {
            "whenGreenFlag" => StartCondition::FlagClicked,
            "whenClicked" => StartCondition::Clicked,
            "whenCloned" => StartCondition::StartAsClone,
            "whenKeyPressed" => StartCondition::KeyPressed(text(1)),
            "whenIReceive" => {
                let name = text(1);
                StartCondition::BroadcastReceived(Event::new(name.clone(), name))
            }
            "whenSceneStarts" => StartCondition::BackdropSwitched(text(1)),
            "procDef" => StartCondition::ProcedureCalled(prototype(hat)),
            _ => {
                // A loose stack is kept for the compiler to look at but
                // never started.
                return Some(Script::new(
                    StartCondition::Other(opcode.into()),
                    self.stack(blocks),
                ));
            }
        };
        Some(Script::new(condition, self.stack(&blocks[1..])))
    }

    fn stack(&self, blocks: &[Json]) -> Vec<Block> {
        blocks.iter().filter_map(|block| self.block(block)).collect()
    }

    fn block(&self, json: &Json) -> Option<Block> {
        let Some(parts) = json.as_array() else {
            warn!(object = self.object, block = %json, "malformed block");
            return None;
        };
        let Some(opcode) = parts.first().and_then(Json::as_str) else {
            warn!(object = self.object, block = %json, "block without an opcode");
            return None;
        };
        let args = &parts[1..];
        let text = |index: usize| args.get(index).map_or_else(|| "".into(), json_text);

        match opcode {
            "readVariable" => return Some(Block::var(text(0), text(0))),
            "contentsOfList:" => return Some(Block::list(text(0), text(0))),
            "getParam" => {
                return Some(match args.get(1).and_then(Json::as_str) {
                    Some("b") => Block::param_bool(text(0)),
                    _ => Block::param(text(0)),
                });
            }
            "call" => return Some(self.call(text(0), &args[1.min(args.len())..])),
            _ => {}
        }

        let Some(alias) = alias(opcode) else {
            debug!(object = self.object, opcode, "no scratch 3 equivalent");
            return Some(Block::new(opcode));
        };

        let mut block = Block::new(alias.opcode);
        if let Some((name, value)) = alias.fixed {
            block = block.with_field(name, Field::new(value));
        }
        for (arg, json) in alias.args.iter().zip(args) {
            block = self.argument(block, *arg, json);
        }
        Some(block)
    }

    fn argument(&self, block: Block, arg: Arg, json: &Json) -> Block {
        match arg {
            Arg::Input(name) => match self.value(json) {
                Some(value) => block.with_input(name, value),
                None => block,
            },
            Arg::Menu(name, menu) => match json {
                Json::Array(_) => match self.block(json) {
                    Some(reporter) => block.with_input(name, reporter),
                    None => block,
                },
                Json::Null => block,
                literal => block.with_input(name, Block::menu(menu, name, json_text(literal))),
            },
            Arg::Field(name) => block.with_field(name, Field::new(json_text(json))),
            Arg::Variable => {
                let name = json_text(json);
                block.with_field("VARIABLE", Field::identified(name.clone(), name))
            }
            Arg::List => {
                let name = json_text(json);
                block.with_field("LIST", Field::identified(name.clone(), name))
            }
            Arg::Broadcast => match json {
                Json::Array(_) => match self.block(json) {
                    Some(reporter) => block.with_input("BROADCAST_INPUT", reporter),
                    None => block,
                },
                literal => {
                    let name = json_text(literal);
                    block.with_input("BROADCAST_INPUT", Block::event(name.clone(), name))
                }
            },
            Arg::Substack(name) => match json.as_array() {
                Some(blocks) => block.with_input(name, self.stack(blocks)),
                None => block,
            },
        }
    }

    /// A literal or a reporter. Empty slots hold null.
    fn value(&self, json: &Json) -> Option<Input> {
        let block = match json {
            Json::Null => return None,
            Json::Array(_) => self.block(json)?,
            Json::Number(num) => Block::number(num.to_string()),
            other => Block::text(json_text(other)),
        };
        Some(Input::from(block))
    }

    /// Arguments are positional; they are named `arg0`, `arg1`, ... to match
    /// the ids given to the definition's parameters.
    fn call(&self, proc_code: Rc<str>, args: &[Json]) -> Block {
        let mut block = Block::new("procedures_call");
        block.mutation = Some(Mutation {
            proc_code,
            ..Mutation::default()
        });
        for (index, json) in args.iter().enumerate() {
            let id = argument_id(index);
            block = match self.value(json) {
                Some(value) => block.with_arg(id, value),
                None => block.with_arg(id, Block::text("")),
            };
        }
        block
    }
}

/// `["procDef", spec, [names], [defaults], warp]`
fn prototype(hat: &[Json]) -> ProcedurePrototype {
    let spec = hat.get(1).map_or_else(|| "".into(), json_text);
    let list = |index: usize| hat.get(index).and_then(Json::as_array).cloned().unwrap_or_default();
    let defaults = list(3);

    let mut prototype = ProcedurePrototype::new(spec);
    for (index, name) in list(2).iter().enumerate() {
        let default = defaults.get(index).map_or_else(|| "".into(), json_text);
        let argument = ProcedureArgument::new(argument_id(index), json_text(name));
        prototype = prototype.with_arg(argument.with_default(default));
    }
    if hat.get(4).is_some_and(json_truthy) {
        prototype = prototype.warp();
    }
    prototype
}

fn argument_id(index: usize) -> Rc<str> {
    format!("arg{index}").into()
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

fn json_truthy(json: &Json) -> bool {
    match json {
        Json::Bool(bool) => *bool,
        Json::String(string) => string == "true",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn reader() -> BlockReader<'static> {
        BlockReader { object: "Cat" }
    }

    #[test]
    fn c_blocks_keep_their_substacks() {
        let block = reader()
            .block(&json!(["doRepeat", 10, [["forward:", 5], ["turnRight:", ["xpos"]]]]))
            .unwrap();

        assert_eq!(&*block.opcode, "control_repeat");
        assert_eq!(block.input("TIMES").unwrap().blocks, [Block::number("10")]);
        let body = &block.input("SUBSTACK").unwrap().blocks;
        assert_eq!(&*body[0].opcode, "motion_movesteps");
        let degrees = body[1].input("DEGREES").unwrap().value().unwrap();
        assert_eq!(&*degrees.opcode, "motion_xposition");
    }

    #[test]
    fn menus_and_fields_take_literals() {
        let go_to = reader().block(&json!(["gotoSpriteOrMouse:", "_mouse_"])).unwrap();
        assert_eq!(
            go_to.input("TO").unwrap().blocks,
            [Block::menu("motion_goto_menu", "TO", "_mouse_")]
        );

        let stop = reader().block(&json!(["stopScripts", "all"])).unwrap();
        assert_eq!(stop.field_value("STOP_OPTION"), Some("all"));

        let front = reader().block(&json!(["comeToFront"])).unwrap();
        assert_eq!(front.field_value("FRONT_BACK"), Some("front"));
    }

    #[test]
    fn procedures_use_positional_argument_ids() {
        let script = reader()
            .script(&[
                json!(["procDef", "jump %n", ["height"], [1], true]),
                json!(["changeYposBy:", ["getParam", "height", "r"]]),
            ])
            .unwrap();
        let StartCondition::ProcedureCalled(prototype) = &script.start_condition else {
            panic!("expected a definition");
        };
        assert_eq!(&*prototype.arguments[0].id, "arg0");
        assert_eq!(&*prototype.arguments[0].name, "height");
        assert!(prototype.skip_yields);
        assert_eq!(script.blocks[0].input("DY").unwrap().blocks, [Block::param("height")]);

        let call = reader().block(&json!(["call", "jump %n", 30])).unwrap();
        let mutation = call.mutation.as_ref().unwrap();
        assert_eq!(&*mutation.proc_code, "jump %n");
        assert_eq!(&*mutation.argument_ids[0], "arg0");
    }

    #[test]
    fn unknown_opcodes_pass_through() {
        let block = reader().block(&json!(["senseVideoMotion", "motion"])).unwrap();
        assert_eq!(&*block.opcode, "senseVideoMotion");
        assert!(reader().block(&json!(42)).is_none());
    }
}
