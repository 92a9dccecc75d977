use std::rc::Rc;

use crate::{
    ast::Script,
    blocks::BlockLibrary,
    codegen::ProjectCompiler,
    error::CompileError,
    sb2::Sb2Project,
    sb3::Sb3Project,
    interpreter::{
        Runtime,
        settings::Settings,
        target::{Costume, RotationStyle, Sound},
        value::Value,
    },
};

/// A loaded project before compilation.
#[derive(Debug, Clone)]
pub struct ScratchProject {
    pub stage: Target,
    /// Sprites in layer order, back to front.
    pub sprites: Vec<Target>,
    pub tempo: f64,
}

impl ScratchProject {
    pub fn new(stage: Target) -> Self {
        Self {
            stage,
            sprites: vec![],
            tempo: 60.0,
        }
    }

    pub fn with_sprite(mut self, sprite: Target) -> Self {
        self.sprites.push(sprite);
        self
    }

    /// Reads a Scratch 3 or Scratch 2 `project.json`, told apart by the
    /// Scratch 3 `targets` array.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        if document.get("targets").is_some() {
            Ok(serde_json::from_value::<Sb3Project>(document)?.into())
        } else {
            Ok(serde_json::from_value::<Sb2Project>(document)?.into())
        }
    }

    /// Compiles with the default block library.
    pub fn compile(&self, settings: Settings) -> Result<Runtime, CompileError> {
        ProjectCompiler::new(BlockLibrary::default()).compile(self, settings)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub id: Rc<str>,
    pub name: Rc<str>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListDecl {
    pub id: Rc<str>,
    pub name: Rc<str>,
    pub items: Vec<Value>,
}

/// Placement of a sprite on the stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub x: f64,
    pub y: f64,
    pub direction: f64,
    /// Percent of the costume's size.
    pub size: f64,
    pub visible: bool,
    pub draggable: bool,
    pub rotation_style: RotationStyle,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            direction: 90.0,
            size: 100.0,
            visible: true,
            draggable: false,
            rotation_style: RotationStyle::AllAround,
        }
    }
}

/// The stage or a sprite as declared in the project file.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: Rc<str>,
    pub is_stage: bool,
    pub variables: Vec<VariableDecl>,
    pub lists: Vec<ListDecl>,
    pub scripts: Vec<Script>,
    pub costumes: Vec<Costume>,
    pub current_costume: usize,
    pub sounds: Vec<Sound>,
    /// Percent.
    pub volume: f64,
    /// `None` for the stage.
    pub sprite: Option<Sprite>,
}

impl Target {
    fn new(name: impl Into<Rc<str>>, is_stage: bool) -> Self {
        Self {
            name: name.into(),
            is_stage,
            variables: vec![],
            lists: vec![],
            scripts: vec![],
            costumes: vec![],
            current_costume: 0,
            sounds: vec![],
            volume: 100.0,
            sprite: (!is_stage).then(Sprite::default),
        }
    }

    pub fn stage() -> Self {
        Self::new("Stage", true)
    }

    pub fn sprite(name: impl Into<Rc<str>>) -> Self {
        Self::new(name, false)
    }

    pub fn with_variable(
        mut self,
        id: impl Into<Rc<str>>,
        name: impl Into<Rc<str>>,
        value: impl Into<Value>,
    ) -> Self {
        self.variables.push(VariableDecl {
            id: id.into(),
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_list(
        mut self,
        id: impl Into<Rc<str>>,
        name: impl Into<Rc<str>>,
        items: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.lists.push(ListDecl {
            id: id.into(),
            name: name.into(),
            items: items.into_iter().collect(),
        });
        self
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn with_costume(mut self, costume: Costume) -> Self {
        self.costumes.push(costume);
        self
    }

    pub fn with_sound(mut self, sound: Sound) -> Self {
        self.sounds.push(sound);
        self
    }

    /// Applies `f` to the sprite placement. Does nothing for the stage.
    pub fn placed(mut self, f: impl FnOnce(&mut Sprite)) -> Self {
        if let Some(sprite) = &mut self.sprite {
            f(sprite);
        }
        self
    }
}
