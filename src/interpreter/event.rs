use std::{collections::HashMap, rc::Rc};

use itertools::Itertools;

use crate::continuation::CompiledScript;

/// A keyboard key as scripts see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Any,
    Code(u32),
}

impl KeyCode {
    pub const SPACE: Self = Self::Code(32);
    pub const ENTER: Self = Self::Code(13);
    pub const LEFT: Self = Self::Code(37);
    pub const UP: Self = Self::Code(38);
    pub const RIGHT: Self = Self::Code(39);
    pub const DOWN: Self = Self::Code(40);

    /// Maps a key name from a block menu. Letters are case-insensitive and
    /// longer names fall back to their first character.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match &*name.to_lowercase() {
            "space" => Self::SPACE,
            "enter" => Self::ENTER,
            "left arrow" => Self::LEFT,
            "up arrow" => Self::UP,
            "right arrow" => Self::RIGHT,
            "down arrow" => Self::DOWN,
            "any" => Self::Any,
            _ => {
                let first = name.chars().next()?;
                let upper = first.to_uppercase().next().unwrap_or(first);
                Self::Code(upper as u32)
            }
        })
    }
}

/// Something that starts scripts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    GreenFlag,
    Clicked,
    Cloned,
    KeyPressed(KeyCode),
    /// Message names are matched case-insensitively.
    Broadcast(Rc<str>),
    BackdropSwitched(Rc<str>),
}

impl Event {
    pub fn broadcast(name: &str) -> Self {
        Self::Broadcast(name.to_lowercase().into())
    }

    pub fn backdrop_switched(name: &str) -> Self {
        Self::BackdropSwitched(name.to_lowercase().into())
    }

    /// Whether re-triggering restarts a thread that is already running.
    /// Key presses leave the running handler alone so held keys don't
    /// restart it every repeat.
    pub fn replaces_existing(&self) -> bool {
        !matches!(self, Event::KeyPressed(_))
    }
}

/// Compiled scripts of one target keyed by what starts them.
#[derive(Debug, Default)]
pub struct Listeners {
    pub green_flag: Vec<Rc<CompiledScript>>,
    pub clicked: Vec<Rc<CompiledScript>>,
    pub cloned: Vec<Rc<CompiledScript>>,
    pub key_pressed: HashMap<KeyCode, Vec<Rc<CompiledScript>>>,
    pub broadcast: HashMap<Rc<str>, Vec<Rc<CompiledScript>>>,
    pub backdrop_switched: HashMap<Rc<str>, Vec<Rc<CompiledScript>>>,
}

impl Listeners {
    /// Registers a script for an event. Order of registration is the order
    /// threads are started in.
    pub fn add(&mut self, event: Event, script: Rc<CompiledScript>) {
        match event {
            Event::GreenFlag => self.green_flag.push(script),
            Event::Clicked => self.clicked.push(script),
            Event::Cloned => self.cloned.push(script),
            Event::KeyPressed(key) => self.key_pressed.entry(key).or_default().push(script),
            Event::Broadcast(name) => self.broadcast.entry(name).or_default().push(script),
            Event::BackdropSwitched(name) => {
                self.backdrop_switched.entry(name).or_default().push(script)
            }
        }
    }

    /// Scripts to start for an event. A specific key also fires the
    /// `any` key listeners.
    pub fn matching(&self, event: &Event) -> Vec<Rc<CompiledScript>> {
        let scripts = match event {
            Event::GreenFlag => &self.green_flag,
            Event::Clicked => &self.clicked,
            Event::Cloned => &self.cloned,
            Event::KeyPressed(key) => {
                let mut scripts = self.key_pressed.get(key).cloned().unwrap_or_default();
                if *key != KeyCode::Any
                    && let Some(any) = self.key_pressed.get(&KeyCode::Any)
                {
                    scripts.extend(any.iter().cloned());
                }
                return scripts;
            }
            Event::Broadcast(name) => match self.broadcast.get(name) {
                Some(scripts) => scripts,
                None => return vec![],
            },
            Event::BackdropSwitched(name) => match self.backdrop_switched.get(name) {
                Some(scripts) => scripts,
                None => return vec![],
            },
        };
        scripts.clone()
    }

    pub fn len(&self) -> usize {
        self.green_flag.len()
            + self.clicked.len()
            + self.cloned.len()
            + self.key_pressed.values().map(Vec::len).sum::<usize>()
            + self.broadcast.values().map(Vec::len).sum::<usize>()
            + self.backdrop_switched.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A custom block definition.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub script: Rc<CompiledScript>,
    /// Runs without screen refresh.
    pub warp: bool,
    /// Argument names in call order.
    pub arguments: Box<[Rc<str>]>,
}

/// Everything a sprite shares with its clones.
#[derive(Debug, Default)]
pub struct Scripts {
    pub listeners: Listeners,
    pub procedures: HashMap<Rc<str>, Procedure>,
}

impl Scripts {
    /// Later definitions with the same proc code replace earlier ones.
    pub fn define(&mut self, proc_code: Rc<str>, procedure: Procedure) {
        self.procedures.insert(proc_code, procedure);
    }

    pub fn procedure(&self, proc_code: &str) -> Option<&Procedure> {
        self.procedures.get(proc_code)
    }

    /// Every compiled script, ordered by id.
    pub fn all(&self) -> Vec<&Rc<CompiledScript>> {
        let listeners = &self.listeners;
        listeners
            .green_flag
            .iter()
            .chain(&listeners.clicked)
            .chain(&listeners.cloned)
            .chain(listeners.key_pressed.values().flatten())
            .chain(listeners.broadcast.values().flatten())
            .chain(listeners.backdrop_switched.values().flatten())
            .chain(self.procedures.values().map(|procedure| &procedure.script))
            .sorted_by_key(|script| script.id())
            .dedup_by(|a, b| a.id() == b.id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        continuation::ContinuationBuilder,
        interpreter::{id::Id, opcode::Opcode},
    };

    fn script(id: usize) -> Rc<CompiledScript> {
        let mut builder = ContinuationBuilder::new(format!("s{id}"));
        builder.op(Opcode::End);
        Rc::new(builder.build(Id::from(id)).unwrap())
    }

    #[test]
    fn key_names() {
        assert_eq!(KeyCode::from_name("space"), Some(KeyCode::SPACE));
        assert_eq!(KeyCode::from_name("a"), Some(KeyCode::Code('A' as u32)));
        assert_eq!(KeyCode::from_name("A"), KeyCode::from_name("a"));
        assert_eq!(KeyCode::from_name("Any"), Some(KeyCode::Any));
        assert_eq!(KeyCode::from_name(""), None);
    }

    #[test]
    fn specific_keys_also_fire_any_listeners() {
        let mut listeners = Listeners::default();
        listeners.add(Event::KeyPressed(KeyCode::SPACE), script(0));
        listeners.add(Event::KeyPressed(KeyCode::Any), script(1));

        let fired = listeners.matching(&Event::KeyPressed(KeyCode::SPACE));
        assert_eq!(fired.len(), 2);
        assert_eq!(listeners.matching(&Event::KeyPressed(KeyCode::Any)).len(), 1);
        assert_eq!(listeners.matching(&Event::KeyPressed(KeyCode::UP)).len(), 1);
    }

    #[test]
    fn broadcasts_ignore_case() {
        let mut listeners = Listeners::default();
        listeners.add(Event::broadcast("Go"), script(0));
        assert_eq!(listeners.matching(&Event::broadcast("GO")).len(), 1);
        assert!(listeners.matching(&Event::broadcast("stop")).is_empty());
    }

    #[test]
    fn all_scripts_in_id_order() {
        let mut scripts = Scripts::default();
        scripts.listeners.add(Event::broadcast("go"), script(2));
        scripts.listeners.add(Event::GreenFlag, script(1));
        scripts.define(
            "jump".into(),
            Procedure {
                script: script(0),
                warp: false,
                arguments: Box::new([]),
            },
        );

        let ids: Vec<_> = scripts.all().iter().map(|script| script.id()).collect();
        assert_eq!(ids, [Id::from(0), Id::from(1), Id::from(2)]);
    }

    #[test]
    fn only_key_presses_keep_running_threads() {
        assert!(Event::GreenFlag.replaces_existing());
        assert!(Event::broadcast("x").replaces_existing());
        assert!(!Event::KeyPressed(KeyCode::Any).replaces_existing());
    }
}
