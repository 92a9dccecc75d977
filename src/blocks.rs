use std::{fmt::Debug, rc::Rc};

use bon::bon;
use indexmap::IndexMap;

use crate::{
    codegen::{BlockType, CompileContext},
    error::RuntimeError,
    interpreter::{RuntimeContext, opcode::VisualTier},
};

mod control;
mod data;
mod events;
mod looks;
mod motion;
mod music;
mod operators;
mod pen;
mod procedures;
mod sensing;
mod sound;

pub type BlockCompileLogic = dyn Fn(CompileContext<'_, '_>);
pub type BlockRuntimeLogic = dyn Fn(&mut RuntimeContext<'_>) -> Result<(), RuntimeError>;

struct LibraryStorage {
    inputs_order: Vec<Rc<str>>,
    compile_logic: Option<Rc<BlockCompileLogic>>,
    runtime_logic: Option<Box<BlockRuntimeLogic>>,
    is_reporter: bool,
}

/// Every opcode the compiler understands, with how to compile it and what
/// to run for it.
pub struct BlockLibrary {
    blocks: IndexMap<Rc<str>, LibraryStorage>,
}

#[bon]
impl BlockLibrary {
    pub fn empty() -> Self {
        BlockLibrary {
            blocks: IndexMap::new(),
        }
    }

    #[builder(finish_fn = finish)]
    pub fn register_block(
        &mut self,
        #[builder(start_fn, into)] opcode: Rc<str>,
        #[builder(with = |c: impl Fn(CompileContext<'_, '_>) + 'static| Rc::new(c))]
        compile_logic: Option<Rc<BlockCompileLogic>>,
        #[builder(with = |r: impl Fn(&mut RuntimeContext<'_>) -> Result<(), RuntimeError> + 'static| Box::new(r))]
        runtime_logic: Option<Box<BlockRuntimeLogic>>,
        #[builder(into, default)] inputs_order: Vec<Rc<str>>,
    ) -> u32 {
        self.register_impl(opcode, compile_logic, runtime_logic, inputs_order, false)
    }

    #[builder(finish_fn = finish)]
    pub fn register_reporter(
        &mut self,

        #[builder(start_fn, into)] opcode: Rc<str>,
        #[builder(with = |c: impl Fn(CompileContext<'_, '_>) + 'static| Rc::new(c))]
        compile_logic: Option<Rc<BlockCompileLogic>>,
        #[builder(with = |r: impl Fn(&mut RuntimeContext<'_>) -> Result<(), RuntimeError> + 'static| Box::new(r))]
        runtime_logic: Option<Box<BlockRuntimeLogic>>,
        #[builder(into, default)] inputs_order: Vec<Rc<str>>,
    ) -> u32 {
        self.register_impl(opcode, compile_logic, runtime_logic, inputs_order, true)
    }

    fn register_impl(
        &mut self,
        opcode: Rc<str>,
        compile_logic: Option<Rc<BlockCompileLogic>>,
        runtime_logic: Option<Box<BlockRuntimeLogic>>,
        inputs_order: Vec<Rc<str>>,
        is_reporter: bool,
    ) -> u32 {
        let (idx, _) = self.blocks.insert_full(
            opcode,
            LibraryStorage {
                compile_logic,
                runtime_logic,
                inputs_order,
                is_reporter,
            },
        );
        idx as u32
    }

    /// Registers blocks that compile to nothing, such as editor-only or
    /// unsupported extension blocks.
    pub fn register_noops(&mut self, opcodes: &[&str]) {
        for &opcode in opcodes {
            self.register_block(opcode).compile_logic(|_| {}).finish();
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn split(self) -> (BlockTypeLibrary, BlockRuntimeLibrary) {
        let (type_lib, runtime_lib) = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(idx, (opcode, storage))| {
                (
                    (
                        opcode.clone(),
                        BlockType {
                            opcode,
                            compile_logic: storage.compile_logic,
                            id: idx as u32,
                            is_reporter: storage.is_reporter,
                            inputs_order: storage.inputs_order.into(),
                        },
                    ),
                    storage.runtime_logic,
                )
            })
            .collect::<(
                IndexMap<Rc<str>, BlockType>,
                Vec<Option<Box<BlockRuntimeLogic>>>,
            )>();

        (
            BlockTypeLibrary { blocks: type_lib },
            BlockRuntimeLibrary {
                blocks: runtime_lib,
            },
        )
    }
}

impl Debug for BlockLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockLibrary({} blocks)", self.blocks.len())
    }
}

impl Default for BlockLibrary {
    fn default() -> Self {
        let mut library = Self::empty();

        motion::register(&mut library);
        looks::register(&mut library);
        sound::register(&mut library);
        events::register(&mut library);
        control::register(&mut library);
        sensing::register(&mut library);
        operators::register(&mut library);
        data::register(&mut library);
        procedures::register(&mut library);
        pen::register(&mut library);
        music::register(&mut library);

        library
    }
}

/// Input names for `inputs_order`.
pub(crate) fn inputs<const N: usize>(names: [&str; N]) -> Vec<Rc<str>> {
    names.into_iter().map(Rc::from).collect()
}

/// Compile logic for a builtin statement that may change what is on screen.
pub(crate) fn visual_builtin(tier: VisualTier) -> impl Fn(CompileContext<'_, '_>) {
    move |mut ctx| {
        ctx.builtin();
        ctx.visual(tier);
    }
}

/// Compile logic for a menu shadow that reports its field's text.
pub(crate) fn menu(field: &'static str) -> impl Fn(CompileContext<'_, '_>) {
    move |mut ctx| ctx.push_field(field)
}

pub struct BlockTypeLibrary {
    blocks: IndexMap<Rc<str>, BlockType>,
}

impl BlockTypeLibrary {
    pub fn block(&self, opcode: &str) -> Option<&BlockType> {
        self.blocks.get(opcode).filter(|block| !block.is_reporter)
    }

    pub fn reporter(&self, opcode: &str) -> Option<&BlockType> {
        self.blocks.get(opcode).filter(|block| block.is_reporter)
    }

    /// The builtin id of any registered opcode.
    pub fn id_of(&self, opcode: &str) -> Option<u32> {
        self.blocks.get(opcode).map(|block| block.id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Debug for BlockTypeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockTypeLibrary({} blocks)", self.blocks.len())
    }
}

pub struct BlockRuntimeLibrary {
    blocks: Vec<Option<Box<BlockRuntimeLogic>>>,
}

impl BlockRuntimeLibrary {
    pub fn get(&self, idx: usize) -> Option<&BlockRuntimeLogic> {
        self.blocks.get(idx)?.as_deref()
    }
}

impl Debug for BlockRuntimeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockRuntimeLibrary({} blocks)", self.blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_registration_ids() {
        let mut library = BlockLibrary::empty();
        let say = library.register_block("looks_say").finish();
        let join = library
            .register_reporter("operator_join")
            .inputs_order(inputs(["STRING1", "STRING2"]))
            .runtime_logic(|ctx| {
                let [a, b] = ctx.pop_strings()?;
                ctx.push(format!("{a}{b}"));
                Ok(())
            })
            .finish();

        let (types, runtime) = library.split();
        assert_eq!(types.id_of("looks_say"), Some(say));
        assert!(types.block("operator_join").is_none());
        assert_eq!(types.reporter("operator_join").map(BlockType::id), Some(join));
        assert_eq!(types.reporter("operator_join").unwrap().inputs_order().len(), 2);
        assert!(runtime.get(say as usize).is_none());
        assert!(runtime.get(join as usize).is_some());
        assert!(runtime.get(99).is_none());
    }

    #[test]
    fn default_library_covers_every_category() {
        let (types, _) = BlockLibrary::default().split();
        for opcode in [
            "motion_movesteps",
            "looks_sayforsecs",
            "sound_playuntildone",
            "event_broadcastandwait",
            "control_repeat",
            "sensing_askandwait",
            "data_setvariableto",
            "procedures_call",
            "pen_penDown",
            "music_playNoteForBeats",
        ] {
            assert!(types.block(opcode).is_some(), "{opcode}");
        }
        assert!(types.reporter("sensing_answer").is_some());
        assert!(types.reporter("operator_add").is_some());
    }
}
