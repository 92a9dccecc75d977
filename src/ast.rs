use std::{collections::HashMap, rc::Rc};

use derive_more::{Constructor, From, Into};

use crate::ast::primitives::{Primitive, data, event, math};

pub mod primitives;
pub mod project;

#[derive(Debug, Clone, PartialEq)]
pub enum StartCondition {
    FlagClicked,
    /// `when this sprite clicked` or `when stage clicked`.
    Clicked,
    StartAsClone,
    KeyPressed(Rc<str>),
    BroadcastReceived(Event),
    BackdropSwitched(Rc<str>),
    ProcedureCalled(ProcedurePrototype),
    /// A top-level block that is not a hat, or a hat nothing handles.
    Other(Rc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedurePrototype {
    pub proc_code: Rc<str>,
    pub arguments: Vec<ProcedureArgument>,
    pub skip_yields: bool,
}

impl ProcedurePrototype {
    pub fn new(proc_code: impl Into<Rc<str>>) -> Self {
        Self {
            proc_code: proc_code.into(),
            arguments: vec![],
            skip_yields: false,
        }
    }

    pub fn with_arg(mut self, arg: ProcedureArgument) -> Self {
        self.arguments.push(arg);
        self
    }

    /// Marks the procedure as "run without screen refresh".
    pub fn warp(mut self) -> Self {
        self.skip_yields = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureArgument {
    pub id: Rc<str>,
    pub name: Rc<str>,
    pub default: Rc<str>,
}

impl ProcedureArgument {
    pub fn new(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            default: "".into(),
        }
    }

    pub fn with_default(mut self, default: impl Into<Rc<str>>) -> Self {
        self.default = default.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub start_condition: StartCondition,
    pub blocks: Vec<Block>,
}

impl Script {
    pub fn new(start_condition: StartCondition, blocks: impl Into<Vec<Block>>) -> Self {
        Self {
            start_condition,
            blocks: blocks.into(),
        }
    }
}

/// Extra data carried by custom block calls and prototypes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mutation {
    pub proc_code: Rc<str>,
    /// Input names of the arguments, in call order.
    pub argument_ids: Vec<Rc<str>>,
    pub warp: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub opcode: Rc<str>,
    pub mutation: Option<Mutation>,
    /// Inputs that reference other blocks
    pub inputs: HashMap<Rc<str>, Input>,
    /// Inputs that don't reference other blocks
    pub fields: HashMap<Rc<str>, Field>,
}

impl Block {
    pub fn new(opcode: impl Into<Rc<str>>) -> Self {
        Self {
            opcode: opcode.into(),
            mutation: None,
            inputs: HashMap::new(),
            fields: HashMap::new(),
        }
    }

    pub fn call(proc_code: impl Into<Rc<str>>) -> Self {
        Self {
            mutation: Some(Mutation {
                proc_code: proc_code.into(),
                ..Mutation::default()
            }),
            ..Self::new("procedures_call")
        }
    }

    fn new_number(opcode: impl Into<Rc<str>>, num: impl Into<Rc<str>>) -> Self {
        Self::new(opcode).with_field("NUM", Field::new(num))
    }

    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::new("text").with_field("TEXT", Field::new(text))
    }

    pub fn number(num: impl Into<Rc<str>>) -> Self {
        Self::new_number("math_number", num)
    }

    pub fn integer(num: impl Into<Rc<str>>) -> Self {
        Self::new_number("math_integer", num)
    }

    pub fn whole_number(num: impl Into<Rc<str>>) -> Self {
        Self::new_number("math_whole_number", num)
    }

    pub fn pos_number(num: impl Into<Rc<str>>) -> Self {
        Self::new_number("math_positive_number", num)
    }

    pub fn angle(num: impl Into<Rc<str>>) -> Self {
        Self::new_number("math_angle", num)
    }

    /// A `#rrggbb` colour literal.
    pub fn color(hex: impl Into<Rc<str>>) -> Self {
        Self::new("colour_picker").with_field("COLOUR", Field::new(hex))
    }

    pub fn var(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Block::new("data_variable").with_field("VARIABLE", Field::identified(id, name))
    }

    pub fn list(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Block::new("data_listcontents").with_field("LIST", Field::identified(id, name))
    }

    pub fn param(name: impl Into<Rc<str>>) -> Self {
        Block::new("argument_reporter_string_number").with_field("VALUE", Field::new(name))
    }

    pub fn param_bool(name: impl Into<Rc<str>>) -> Self {
        Block::new("argument_reporter_boolean").with_field("VALUE", Field::new(name))
    }

    pub fn event(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Block::new("event_broadcast_menu")
            .with_field("BROADCAST_OPTION", Field::identified(id, name))
    }

    /// A dropdown shadow such as `motion_goto_menu`.
    pub fn menu(
        opcode: impl Into<Rc<str>>,
        field: impl Into<Rc<str>>,
        value: impl Into<Rc<str>>,
    ) -> Self {
        Block::new(opcode).with_field(field, Field::new(value))
    }

    pub fn with_input(mut self, name: impl Into<Rc<str>>, input: impl Into<Input>) -> Self {
        self.inputs.insert(name.into(), input.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<Rc<str>>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Adds an argument to a custom block call. Arguments are passed in the
    /// order they are added.
    pub fn with_arg(mut self, id: impl Into<Rc<str>>, input: impl Into<Input>) -> Self {
        let id = id.into();
        self.mutation
            .get_or_insert_with(Mutation::default)
            .argument_ids
            .push(id.clone());
        self.with_input(id, input)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|field| &*field.value)
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }

    /// Recognizes literal and data blocks that compile to a single push.
    pub fn try_as_primitive(&self) -> Option<Primitive> {
        let field = |name| self.fields.get(name).cloned();

        Some(match &*self.opcode {
            "text" => Primitive::Text(field("TEXT")?.value.into()),
            "math_number"
            | "math_integer"
            | "math_whole_number"
            | "math_positive_number"
            | "math_angle" => Primitive::Number(math::Number::new(field("NUM")?.value)),
            "colour_picker" => Primitive::Color(field("COLOUR")?.value.into()),
            "data_variable" => data::Variable::new(field("VARIABLE")?.into_resource()).into(),
            "data_listcontents" => data::ListContents::new(field("LIST")?.into_resource()).into(),
            "event_broadcast_menu" => {
                event::BroadcastMenu::new(field("BROADCAST_OPTION")?.into_resource()).into()
            }
            _ => return None,
        })
    }
}

impl From<Variable> for Block {
    fn from(value: Variable) -> Self {
        Self::var(value.0.id, value.0.name)
    }
}

impl From<List> for Block {
    fn from(value: List) -> Self {
        Self::list(value.0.id, value.0.name)
    }
}

impl From<Event> for Block {
    fn from(value: Event) -> Self {
        Self::event(value.0.id, value.0.name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Input {
    pub blocks: Vec<Block>,
    /// The literal a reporter was dropped over.
    pub shadow: Option<Block>,
}

impl Input {
    pub fn with_shadow(mut self, shadow: Block) -> Self {
        self.shadow = Some(shadow);
        self
    }

    /// The block that provides this input's value.
    pub fn value(&self) -> Option<&Block> {
        self.blocks.first().or(self.shadow.as_ref())
    }

    /// The input's value if it is a number typed straight into the slot.
    pub fn literal_number(&self) -> Option<f64> {
        match self.value()?.try_as_primitive()? {
            Primitive::Number(num) => num.value(),
            _ => None,
        }
    }
}

impl From<Block> for Input {
    fn from(value: Block) -> Self {
        Self {
            blocks: vec![value],
            shadow: None,
        }
    }
}

impl From<Vec<Block>> for Input {
    fn from(value: Vec<Block>) -> Self {
        Self {
            blocks: value,
            shadow: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: Rc<str>,
    pub id: Option<Rc<str>>,
}

impl Field {
    pub fn new(value: impl Into<Rc<str>>) -> Self {
        Self {
            value: value.into(),
            id: None,
        }
    }

    pub fn identified(id: impl Into<Rc<str>>, value: impl Into<Rc<str>>) -> Self {
        Self {
            value: value.into(),
            id: Some(id.into()),
        }
    }

    /// Fields without an id are identified by their name.
    pub fn into_resource(self) -> NamedResource {
        NamedResource {
            id: self.id.unwrap_or_else(|| self.value.clone()),
            name: self.value,
        }
    }
}

impl<T: Into<NamedResource>> From<T> for Field {
    fn from(value: T) -> Self {
        let resource: NamedResource = value.into();
        Self::identified(resource.id, resource.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Constructor)]
pub struct NamedResource {
    pub id: Rc<str>,
    pub name: Rc<str>,
}

#[derive(Debug, Clone, PartialEq, From, Into)]
pub struct Variable(NamedResource);

impl Variable {
    pub fn new(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Self(NamedResource::new(id.into(), name.into()))
    }
}

#[derive(Debug, Clone, PartialEq, From, Into)]
pub struct List(NamedResource);

impl List {
    pub fn new(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Self(NamedResource::new(id.into(), name.into()))
    }
}

#[derive(Debug, Clone, PartialEq, From, Into)]
pub struct Event(NamedResource);

impl Event {
    pub fn new(id: impl Into<Rc<str>>, name: impl Into<Rc<str>>) -> Self {
        Self(NamedResource::new(id.into(), name.into()))
    }

    pub fn name(&self) -> &Rc<str> {
        &self.0.name
    }
}
