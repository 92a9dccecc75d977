use std::{fmt::Debug, mem, rc::Rc};

use derive_more::{From, Into};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::{
    ast::{
        Block, Field, Input, NamedResource, StartCondition,
        primitives::Primitive,
        project::{self, ScratchProject},
    },
    blocks::{BlockCompileLogic, BlockLibrary, BlockRuntimeLibrary, BlockTypeLibrary},
    continuation::{CompiledScript, ContinuationBuilder, Label, ScriptId},
    error::CompileError,
    interpreter::{
        Runtime,
        event::{Event, KeyCode, Procedure, Scripts},
        list::List,
        opcode::{Opcode, VisualTier},
        settings::Settings,
        target::{DataTables, Point, Target, TargetKind},
        value::Value,
    },
};

/// What the compiler knows about a registered opcode.
#[derive(Clone)]
pub struct BlockType {
    pub(crate) opcode: Rc<str>,
    pub(crate) compile_logic: Option<Rc<BlockCompileLogic>>,
    pub(crate) id: u32,
    pub(crate) is_reporter: bool,
    pub(crate) inputs_order: Rc<[Rc<str>]>,
}

impl BlockType {
    /// Emits code for `block`. Blocks without compile logic push their
    /// inputs in declaration order and call their runtime logic.
    pub fn compile(&self, compiler: &mut ScriptCompiler<'_>, block: &Block) {
        let ctx = CompileContext {
            compiler,
            block,
            ty: self,
        };
        match &self.compile_logic {
            Some(logic) => logic(ctx),
            None => {
                let mut ctx = ctx;
                ctx.builtin();
            }
        }
    }

    pub fn opcode(&self) -> &Rc<str> {
        &self.opcode
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_reporter(&self) -> bool {
        self.is_reporter
    }

    pub fn inputs_order(&self) -> &[Rc<str>] {
        &self.inputs_order
    }
}

impl Debug for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockType")
            .field("opcode", &self.opcode)
            .field("id", &self.id)
            .field("is_reporter", &self.is_reporter)
            .finish_non_exhaustive()
    }
}

/// The block being compiled, handed to compile logic.
pub struct CompileContext<'c, 't> {
    pub compiler: &'c mut ScriptCompiler<'t>,
    pub block: &'c Block,
    pub ty: &'c BlockType,
}

impl<'c> CompileContext<'c, '_> {
    pub fn input(&self, name: &str) -> Option<&'c Input> {
        self.block.inputs.get(name)
    }

    /// A field's text, or the empty string when the block has no such field.
    pub fn field(&self, name: &str) -> Rc<str> {
        self.block
            .field(name)
            .map_or_else(|| "".into(), |field| field.value.clone())
    }

    pub fn resource(&self, name: &str) -> Option<NamedResource> {
        self.block.field(name).cloned().map(Field::into_resource)
    }

    pub fn push_input(&mut self, name: &str) {
        let input = self.input(name);
        self.compiler.push_input(input);
    }

    pub fn push_number(&mut self, name: &str) {
        let input = self.input(name);
        self.compiler.push_number_input(input);
    }

    pub fn push_string(&mut self, name: &str) {
        let input = self.input(name);
        self.compiler.push_string_input(input);
    }

    pub fn push_bool(&mut self, name: &str) {
        let input = self.input(name);
        self.compiler.push_bool_input(input);
    }

    pub fn push_field(&mut self, name: &str) {
        let value = self.field(name);
        self.compiler.push_text(value);
    }

    /// Pushes every input the block declared, in order.
    pub fn push_inputs(&mut self) {
        let ty = self.ty;
        for name in ty.inputs_order() {
            self.push_input(name);
        }
    }

    pub fn call_builtin(&mut self) {
        self.compiler.op_with(Opcode::CallBuiltin, self.ty.id);
    }

    pub fn builtin(&mut self) {
        self.push_inputs();
        self.call_builtin();
    }

    /// Calls the runtime logic registered under another opcode, usually a
    /// helper such as `looks_sayforsecs.say`.
    pub fn call_helper(&mut self, opcode: &str) {
        match self.compiler.library().id_of(opcode) {
            Some(id) => self.compiler.op_with(Opcode::CallBuiltin, id),
            None => self.compiler.warn(format!("missing helper {opcode}")),
        }
    }

    pub fn substack(&mut self, name: &str) {
        if let Some(input) = self.input(name) {
            self.compiler.compile_substack(&input.blocks);
        }
    }

    pub fn visual(&mut self, tier: VisualTier) {
        self.compiler.visual(tier);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.compiler.warn(message);
    }
}

/// Set in handle words that refer to the stage's tables.
const STAGE_BIT: u32 = 1 << 31;

macro_rules! data_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, From, Into, Clone, Copy, PartialEq, Eq)]
        pub struct $name(u32);

        impl $name {
            pub fn new(index: usize, stage: bool) -> Self {
                let stage = if stage { STAGE_BIT } else { 0 };
                Self(index as u32 | stage)
            }

            pub fn is_stage(self) -> bool {
                self.0 & STAGE_BIT != 0
            }

            pub fn index(self) -> usize {
                (self.0 & !STAGE_BIT) as usize
            }
        }
    };
}

data_handle!(
    /// A variable slot: an index into the running target's or the stage's
    /// variable table.
    VarHandle
);
data_handle!(
    /// A list slot, resolved like [`VarHandle`].
    ListHandle
);

/// Compile warnings with a count per distinct message.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    counts: IndexMap<String, usize>,
}

impl Warnings {
    pub fn add(&mut self, message: impl Into<String>) {
        *self.counts.entry(message.into()).or_default() += 1;
    }

    pub fn count(&self, message: &str) -> usize {
        self.counts.get(message).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(message, &count)| (message.as_str(), count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn extend(&mut self, other: &Warnings) {
        for (message, count) in other.iter() {
            *self.counts.entry(message.to_owned()).or_default() += count;
        }
    }

    pub fn log(&self, object: &str) {
        for (message, count) in self.iter() {
            warn!(object, count, "{message}");
        }
    }
}

/// Symbol resolution for the target whose scripts are being compiled.
#[derive(Debug)]
pub struct TargetContext {
    name: Rc<str>,
    is_stage: bool,
    data: DataTables,
    stage: DataTables,
    pub warnings: Warnings,
}

impl TargetContext {
    pub fn stage(name: impl Into<Rc<str>>, stage: DataTables) -> Self {
        Self {
            name: name.into(),
            is_stage: true,
            data: DataTables::default(),
            stage,
            warnings: Warnings::default(),
        }
    }

    pub fn sprite(name: impl Into<Rc<str>>, data: DataTables, stage: DataTables) -> Self {
        Self {
            name: name.into(),
            is_stage: false,
            data,
            stage,
            warnings: Warnings::default(),
        }
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn is_stage(&self) -> bool {
        self.is_stage
    }

    fn own(&mut self) -> &mut DataTables {
        if self.is_stage {
            &mut self.stage
        } else {
            &mut self.data
        }
    }

    /// Resolves a variable: stage by id, own by id, own by name, stage by
    /// name. Unknown variables are created on this target with value 0.
    pub fn var(&mut self, var: &NamedResource) -> VarHandle {
        if let Some(index) = self.stage.variables.get_index_of(&*var.id) {
            return VarHandle::new(index, true);
        }
        if !self.is_stage
            && let Some(index) = self.data.variable_index(&var.id, &var.name)
        {
            return VarHandle::new(index, false);
        }
        if let Some(index) = self.stage.variable_index(&var.id, &var.name) {
            return VarHandle::new(index, true);
        }

        self.warnings.add(format!("unknown variable {}", var.name));
        let is_stage = self.is_stage;
        let index =
            self.own()
                .add_variable(var.id.clone(), var.name.clone(), Value::Number(0.0));
        VarHandle::new(index, is_stage)
    }

    /// Resolves a list the same way as [`var`](Self::var). Unknown lists
    /// are created empty.
    pub fn list(&mut self, list: &NamedResource) -> ListHandle {
        if let Some(index) = self.stage.lists.get_index_of(&*list.id) {
            return ListHandle::new(index, true);
        }
        if !self.is_stage
            && let Some(index) = self.data.list_index(&list.id, &list.name)
        {
            return ListHandle::new(index, false);
        }
        if let Some(index) = self.stage.list_index(&list.id, &list.name) {
            return ListHandle::new(index, true);
        }

        self.warnings.add(format!("unknown list {}", list.name));
        let is_stage = self.is_stage;
        let index = self
            .own()
            .add_list(list.id.clone(), list.name.clone(), List::default());
        ListHandle::new(index, is_stage)
    }

    /// The target's own tables and the stage's, in that order. The first is
    /// empty for the stage.
    pub fn into_tables(self) -> (DataTables, DataTables) {
        (self.data, self.stage)
    }
}

fn flushes_visual(opcode: Opcode) -> bool {
    opcode.is_terminator()
        || opcode.jump_operand()
        || matches!(
            opcode,
            Opcode::Broadcast
                | Opcode::BroadcastAndWait
                | Opcode::SceneChanged
                | Opcode::Stop
                | Opcode::DeleteClone
        )
}

/// Compiles one script into a single instruction stream.
///
/// Statements that change what is on screen raise a pending
/// [`VisualTier`]; it is written out as one `Visual` op just before the
/// next point where control can leave the straight-line code, so a run of
/// motion blocks costs a single check. Blocks that change what the check
/// reads (`hide`, `pen up`) flush it first.
pub struct ScriptCompiler<'t> {
    pub target: &'t mut TargetContext,
    library: Rc<BlockTypeLibrary>,
    builder: ContinuationBuilder,
    /// Parameter names of the procedure being compiled.
    arguments: Rc<[Rc<str>]>,
    visual: VisualTier,
}

impl<'t> ScriptCompiler<'t> {
    pub fn new(
        target: &'t mut TargetContext,
        library: Rc<BlockTypeLibrary>,
        name: impl Into<Rc<str>>,
    ) -> Self {
        Self {
            target,
            library,
            builder: ContinuationBuilder::new(name),
            arguments: Rc::new([]),
            visual: VisualTier::None,
        }
    }

    pub fn with_arguments(mut self, arguments: Rc<[Rc<str>]>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn library(&self) -> &BlockTypeLibrary {
        &self.library
    }

    pub fn argument(&self, name: &str) -> Option<u32> {
        self.arguments
            .iter()
            .position(|arg| &**arg == name)
            .map(|index| index as u32)
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.target.warnings.add(message);
    }

    pub fn compile_substack(&mut self, blocks: &[Block]) {
        for block in blocks {
            self.compile_statement(block);
        }
    }

    pub fn compile_statement(&mut self, block: &Block) {
        let library = Rc::clone(&self.library);
        match library.block(&block.opcode) {
            Some(ty) => ty.compile(self, block),
            None => self.warn(format!("unknown statement {}", block.opcode)),
        }
    }

    /// Pushes an input's value. Missing inputs push the empty string.
    pub fn push_input(&mut self, input: Option<&Input>) {
        match input.and_then(Input::value) {
            Some(block) => self.push_block(block),
            None => self.push_text("".into()),
        }
    }

    pub fn push_block(&mut self, block: &Block) {
        if let Some(primitive) = block.try_as_primitive() {
            self.push_primitive(primitive);
            return;
        }

        let library = Rc::clone(&self.library);
        match library.reporter(&block.opcode) {
            Some(ty) => ty.compile(self, block),
            None => {
                self.warn(format!("unknown expression {}", block.opcode));
                self.push_text("".into());
            }
        }
    }

    pub fn push_number_input(&mut self, input: Option<&Input>) {
        let Some(block) = input.and_then(Input::value) else {
            self.push_number(0.0);
            return;
        };

        if let Some(Primitive::Number(num)) = block.try_as_primitive()
            && let Some(value) = num.value()
        {
            self.push_number(value);
        } else if &*block.opcode == "argument_reporter_string_number"
            && let Some(index) = block.field_value("VALUE").and_then(|name| self.argument(name))
        {
            self.op_with(Opcode::PushArgNumber, index);
        } else {
            self.push_block(block);
            self.op(Opcode::ToNumber);
        }
    }

    pub fn push_string_input(&mut self, input: Option<&Input>) {
        let block = input.and_then(Input::value);
        if let Some(Primitive::Text(text)) = block.and_then(Block::try_as_primitive) {
            self.push_text(text.0);
            return;
        }
        self.push_input(input);
        self.op(Opcode::ToString);
    }

    /// Pushes a condition. An empty slot is false.
    pub fn push_bool_input(&mut self, input: Option<&Input>) {
        let Some(block) = input.and_then(Input::value) else {
            self.push_bool(false);
            return;
        };

        if &*block.opcode == "argument_reporter_boolean"
            && let Some(index) = block.field_value("VALUE").and_then(|name| self.argument(name))
        {
            self.op_with(Opcode::PushArgBoolean, index);
        } else {
            self.push_block(block);
        }
    }

    pub fn push_primitive(&mut self, primitive: Primitive) {
        match primitive {
            Primitive::Text(text) => self.push_text(text.0),
            Primitive::Number(num) => match num.value() {
                Some(value) => self.push_number(value),
                None => self.push_text(num.0),
            },
            Primitive::Color(color) => match color.rgb() {
                Some(rgb) => self.push_number(rgb.into()),
                None => {
                    self.warn(format!("expected hex color code but got {}", color.0));
                    self.push_number(0.0);
                }
            },
            Primitive::Variable(var) => {
                let handle = self.target.var(&var.0);
                self.op_with(Opcode::PushVar, handle.into());
            }
            Primitive::List(list) => {
                let handle = self.target.list(&list.0);
                self.op_with(Opcode::PushList, handle.into());
            }
            Primitive::Broadcast(event) => self.push_text(event.0.name),
        }
    }

    pub fn push_number(&mut self, num: f64) {
        self.builder.push_number(num);
    }

    pub fn push_text(&mut self, text: Rc<str>) {
        self.builder.push_text(text);
    }

    pub fn push_bool(&mut self, value: bool) {
        self.builder.push_bool(value);
    }

    /// Raises the pending visual tier.
    pub fn visual(&mut self, tier: VisualTier) {
        self.visual = self.visual.max(tier);
    }

    /// Writes the pending visual tier out now.
    pub fn flush_visual(&mut self) {
        let tier = mem::replace(&mut self.visual, VisualTier::None);
        if tier != VisualTier::None {
            self.builder.op_with(Opcode::Visual, tier.into());
        }
    }

    pub fn op(&mut self, opcode: Opcode) {
        if flushes_visual(opcode) {
            self.flush_visual();
        }
        self.builder.op(opcode);
    }

    pub fn op_with(&mut self, opcode: Opcode, operand: u32) {
        if flushes_visual(opcode) {
            self.flush_visual();
        }
        self.builder.op_with(opcode, operand);
    }

    pub fn op_with_operands(&mut self, opcode: Opcode, operands: &[u32]) {
        debug_assert_eq!(opcode.operand_words(), operands.len());
        if flushes_visual(opcode) {
            self.flush_visual();
        }
        self.builder.op(opcode);
        for &word in operands {
            self.builder.imm(word);
        }
    }

    pub fn jump(&mut self, opcode: Opcode, target: Label) {
        self.flush_visual();
        self.builder.jump(opcode, target);
    }

    /// `Queue` or `ForceQueue` to a label.
    pub fn resume_at(&mut self, opcode: Opcode, target: Label) {
        self.flush_visual();
        self.builder.resume_at(opcode, target);
    }

    pub fn new_label(&mut self) -> Label {
        self.builder.new_label()
    }

    pub fn place_label(&mut self, label: Label) {
        self.flush_visual();
        self.builder.place_label(label);
    }

    pub fn label_here(&mut self) -> Label {
        self.flush_visual();
        self.builder.label_here()
    }

    /// Calls a procedure with `argc` arguments already pushed. The caller
    /// resumes right after the call.
    pub fn call(&mut self, proc_code: Rc<str>, argc: u32) {
        self.flush_visual();
        let ret = self.builder.new_label();
        self.builder.call(proc_code, argc, ret);
        self.builder.place_label(ret);
    }

    /// Yields at least once, then keeps yielding until the wait whose start
    /// and duration are in locals 0 and 1 is over.
    pub fn wait_elapsed(&mut self) {
        let check = self.new_label();
        let done = self.new_label();
        self.resume_at(Opcode::ForceQueue, check);
        self.place_label(check);
        self.op_with(Opcode::WaitElapsed, 0);
        self.jump(Opcode::JumpIfTrue, done);
        self.resume_at(Opcode::ForceQueue, check);
        self.place_label(done);
    }

    /// Waits for the number of seconds `push_duration` leaves on the stack.
    pub fn wait_seconds(&mut self, push_duration: impl FnOnce(&mut Self)) {
        self.op(Opcode::Save);
        self.op(Opcode::PushNow);
        self.op_with(Opcode::SetLocal, 0);
        push_duration(self);
        self.op_with(Opcode::SetLocal, 1);
        self.wait_elapsed();
        self.op(Opcode::Restore);
    }

    pub fn finish(
        mut self,
        id: ScriptId,
        terminator: Opcode,
    ) -> Result<CompiledScript, CompileError> {
        self.op(terminator);
        self.builder.build(id)
    }
}

/// Compiles whole projects into a ready-to-start [`Runtime`].
pub struct ProjectCompiler {
    types: Rc<BlockTypeLibrary>,
    builtins: Rc<BlockRuntimeLibrary>,
    warnings: Warnings,
    next_script: usize,
}

impl ProjectCompiler {
    pub fn new(library: BlockLibrary) -> Self {
        let (types, builtins) = library.split();
        Self {
            types: Rc::new(types),
            builtins: Rc::new(builtins),
            warnings: Warnings::default(),
            next_script: 0,
        }
    }

    /// Warnings from the last [`compile`](Self::compile).
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    pub fn compile(
        &mut self,
        project: &ScratchProject,
        settings: Settings,
    ) -> Result<Runtime, CompileError> {
        if !project.stage.is_stage {
            return Err(CompileError::MissingStage);
        }
        self.warnings.clear();
        self.next_script = 0;

        let stage_data = declare_data(&project.stage);
        let mut ctx = TargetContext::stage(project.stage.name.clone(), stage_data);
        let stage_scripts = self.compile_scripts(&project.stage, &mut ctx)?;
        let (_, mut stage_tables) = ctx.into_tables();

        let mut sprites = Vec::with_capacity(project.sprites.len());
        for decl in &project.sprites {
            let data = declare_data(decl);
            let mut ctx = TargetContext::sprite(decl.name.clone(), data, stage_tables);
            let scripts = self.compile_scripts(decl, &mut ctx)?;
            let (data, stage) = ctx.into_tables();
            stage_tables = stage;
            sprites.push(build_target(decl, TargetKind::Sprite, data, scripts));
        }
        let stage = build_target(&project.stage, TargetKind::Stage, stage_tables, stage_scripts);

        debug!(
            sprites = sprites.len(),
            scripts = self.next_script,
            warnings = self.warnings.len(),
            "compiled project"
        );

        let mut runtime = Runtime::new(stage, sprites, Rc::clone(&self.builtins), settings);
        runtime.io_mut().tempo = project.tempo.clamp(20.0, 500.0);
        Ok(runtime)
    }

    fn compile_scripts(
        &mut self,
        decl: &project::Target,
        ctx: &mut TargetContext,
    ) -> Result<Scripts, CompileError> {
        let mut scripts = Scripts::default();

        for script in &decl.scripts {
            if let StartCondition::Other(opcode) = &script.start_condition {
                // Loose reporters and stacks are common; only opcodes nothing
                // knows about are worth a warning.
                if self.types.id_of(opcode).is_none() {
                    ctx.warnings.add(format!("unknown top level block {opcode}"));
                }
                continue;
            }
            if script.blocks.is_empty() {
                continue;
            }

            match &script.start_condition {
                StartCondition::ProcedureCalled(prototype) => {
                    let arguments: Rc<[Rc<str>]> =
                        prototype.arguments.iter().map(|arg| arg.name.clone()).collect();
                    let compiled = self.compile_script(
                        ctx,
                        prototype.proc_code.clone(),
                        Rc::clone(&arguments),
                        &script.blocks,
                        Opcode::EndCall,
                    )?;
                    scripts.define(
                        prototype.proc_code.clone(),
                        Procedure {
                            script: compiled,
                            warp: prototype.skip_yields,
                            arguments: arguments.iter().cloned().collect(),
                        },
                    );
                }
                condition => {
                    let Some(event) = listener_event(condition, ctx) else {
                        continue;
                    };
                    let name = format!("{} #{}", decl.name, self.next_script);
                    let compiled = self.compile_script(
                        ctx,
                        name.into(),
                        Rc::new([]),
                        &script.blocks,
                        Opcode::End,
                    )?;
                    scripts.listeners.add(event, compiled);
                }
            }
        }

        ctx.warnings.log(ctx.name());
        self.warnings.extend(&ctx.warnings);
        debug!(
            object = %decl.name,
            listeners = scripts.listeners.len(),
            procedures = scripts.procedures.len(),
            "compiled target"
        );
        Ok(scripts)
    }

    fn compile_script(
        &mut self,
        ctx: &mut TargetContext,
        name: Rc<str>,
        arguments: Rc<[Rc<str>]>,
        blocks: &[Block],
        terminator: Opcode,
    ) -> Result<Rc<CompiledScript>, CompileError> {
        let id = ScriptId::from(self.next_script);
        self.next_script += 1;

        let mut compiler =
            ScriptCompiler::new(ctx, Rc::clone(&self.types), name).with_arguments(arguments);
        compiler.compile_substack(blocks);
        let script = compiler.finish(id, terminator)?;
        trace!("{}", script.disassemble());
        Ok(Rc::new(script))
    }
}

fn listener_event(condition: &StartCondition, ctx: &mut TargetContext) -> Option<Event> {
    Some(match condition {
        StartCondition::FlagClicked => Event::GreenFlag,
        StartCondition::Clicked => Event::Clicked,
        StartCondition::StartAsClone => Event::Cloned,
        StartCondition::KeyPressed(key) => match KeyCode::from_name(key) {
            Some(key) => Event::KeyPressed(key),
            None => {
                ctx.warnings.add(format!("unknown key {key:?}"));
                return None;
            }
        },
        StartCondition::BroadcastReceived(event) => Event::broadcast(event.name()),
        StartCondition::BackdropSwitched(backdrop) => Event::backdrop_switched(backdrop),
        StartCondition::ProcedureCalled(_) | StartCondition::Other(_) => return None,
    })
}

fn declare_data(decl: &project::Target) -> DataTables {
    let mut data = DataTables::default();
    for var in &decl.variables {
        data.add_variable(var.id.clone(), var.name.clone(), var.value.clone());
    }
    for list in &decl.lists {
        data.add_list(list.id.clone(), list.name.clone(), List::new(list.items.iter().cloned()));
    }
    data
}

fn build_target(
    decl: &project::Target,
    kind: TargetKind,
    data: DataTables,
    scripts: Scripts,
) -> Target {
    let mut target = Target::new(decl.name.clone(), kind);
    target.scripts = Rc::new(scripts);
    target.data = data;
    target.costumes = decl.costumes.iter().cloned().collect();
    target.current_costume = decl
        .current_costume
        .min(decl.costumes.len().saturating_sub(1));
    target.sounds = decl.sounds.iter().cloned().collect();
    target.set_volume(decl.volume);

    if let Some(sprite) = &decl.sprite {
        target.position = Point::new(sprite.x, sprite.y);
        target.direction = sprite.direction;
        target.scale = sprite.size / 100.0;
        target.visible = sprite.visible;
        target.draggable = sprite.draggable;
        target.rotation_style = sprite.rotation_style;
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Script;

    fn opcodes(script: &CompiledScript) -> Vec<Opcode> {
        let mut ops = vec![];
        let mut pc = 0;
        while pc < script.code().len() {
            let op = Opcode::try_from(script.code()[pc]).unwrap();
            ops.push(op);
            pc += 1 + op.operand_words();
        }
        ops
    }

    fn compile(ctx: &mut TargetContext, blocks: &[Block]) -> CompiledScript {
        let (types, _) = BlockLibrary::default().split();
        let mut compiler = ScriptCompiler::new(ctx, Rc::new(types), "test");
        compiler.compile_substack(blocks);
        compiler.finish(ScriptId::from(0), Opcode::End).unwrap()
    }

    fn sprite_context() -> TargetContext {
        let mut stage = DataTables::default();
        stage.add_variable("g".into(), "global".into(), Value::Number(0.0));
        let mut own = DataTables::default();
        own.add_variable("l".into(), "local".into(), Value::Number(0.0));
        own.add_variable("shadow".into(), "global".into(), Value::Number(0.0));
        TargetContext::sprite("Cat", own, stage)
    }

    #[test]
    fn handles_carry_their_scope() {
        let handle = VarHandle::new(7, true);
        assert!(handle.is_stage());
        assert_eq!(handle.index(), 7);

        let word: u32 = ListHandle::new(3, false).into();
        assert_eq!(word, 3);
        assert!(!ListHandle::from(word).is_stage());
    }

    #[test]
    fn variable_lookup_order() {
        let mut ctx = sprite_context();

        assert_eq!(ctx.var(&NamedResource::new("g".into(), "x".into())), VarHandle::new(0, true));
        assert_eq!(ctx.var(&NamedResource::new("l".into(), "x".into())), VarHandle::new(0, false));
        // Own variables shadow stage ones when resolved by name.
        assert_eq!(
            ctx.var(&NamedResource::new("?".into(), "global".into())),
            VarHandle::new(1, false)
        );
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn unknown_data_is_created_on_the_target() {
        let mut ctx = sprite_context();
        let var = NamedResource::new("new".into(), "fresh".into());

        let handle = ctx.var(&var);
        assert_eq!(handle, VarHandle::new(2, false));
        assert_eq!(ctx.var(&var), handle);
        assert_eq!(ctx.warnings.count("unknown variable fresh"), 1);

        let list = ctx.list(&NamedResource::new("items".into(), "items".into()));
        assert_eq!(list, ListHandle::new(0, false));

        let (own, stage) = ctx.into_tables();
        assert_eq!(own.variables["new"].value, Value::Number(0.0));
        assert!(own.lists.contains_key("items"));
        assert_eq!(stage.variables.len(), 1);
    }

    #[test]
    fn unknown_blocks_warn_once_per_message() {
        let mut ctx = sprite_context();
        compile(&mut ctx, &[Block::new("foo_bar"), Block::new("foo_bar")]);

        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings.count("unknown statement foo_bar"), 2);
    }

    #[test]
    fn visual_changes_are_flushed_before_yielding() {
        let mut ctx = sprite_context();
        let script = compile(
            &mut ctx,
            &[Block::new("control_forever").with_input(
                "SUBSTACK",
                vec![
                    Block::new("motion_movesteps").with_input("STEPS", Block::number("10")),
                    Block::new("motion_turnright").with_input("DEGREES", Block::number("15")),
                ],
            )],
        );

        let ops = opcodes(&script);
        let visual = ops.iter().position(|&op| op == Opcode::Visual).unwrap();
        assert_eq!(ops[visual + 1], Opcode::ForceQueue);
        assert_eq!(ops.iter().filter(|&&op| op == Opcode::Visual).count(), 1);
    }

    #[test]
    fn lifting_the_pen_checks_pending_moves_first() {
        let mut ctx = sprite_context();
        let script = compile(
            &mut ctx,
            &[
                Block::new("motion_movesteps").with_input("STEPS", Block::number("10")),
                Block::new("pen_penUp"),
            ],
        );

        let ops = opcodes(&script);
        let visual = ops.iter().position(|&op| op == Opcode::Visual).unwrap();
        let lift = ops.iter().rposition(|&op| op == Opcode::CallBuiltin).unwrap();
        assert!(visual < lift, "{ops:?}");
    }

    #[test]
    fn numeric_literals_become_numbers() {
        let mut ctx = sprite_context();
        let script = compile(
            &mut ctx,
            &[Block::new("data_setvariableto")
                .with_field("VARIABLE", Field::identified("l", "local"))
                .with_input("VALUE", Block::number("12"))],
        );
        assert_eq!(opcodes(&script), [Opcode::PushNumber, Opcode::SetVar, Opcode::End]);
    }

    #[test]
    fn project_compiles_scripts_and_declarations() {
        let project = ScratchProject::new(
            project::Target::stage().with_variable("score", "score", 5.0),
        )
        .with_sprite(
            project::Target::sprite("Cat")
                .placed(|sprite| {
                    sprite.x = 10.0;
                    sprite.size = 50.0;
                })
                .with_script(Script::new(
                    StartCondition::FlagClicked,
                    [Block::new("motion_movesteps").with_input("STEPS", Block::number("10"))],
                ))
                .with_script(Script::new(StartCondition::Other("motion_xposition".into()), vec![]))
                .with_script(Script::new(StartCondition::Other("nonsense".into()), vec![]))
                .with_script(Script::new(StartCondition::FlagClicked, vec![])),
        );

        let mut compiler = ProjectCompiler::new(BlockLibrary::default());
        let runtime = compiler.compile(&project, Settings::default()).unwrap();

        let cat = runtime.sprite("Cat").unwrap();
        let cat = runtime.target(cat).unwrap();
        assert_eq!(cat.position, Point::new(10.0, 0.0));
        assert_eq!(cat.scale, 0.5);
        assert_eq!(cat.scripts.listeners.green_flag.len(), 1);
        assert_eq!(runtime.variable(runtime.stage_id(), "score"), Some(&Value::Number(5.0)));

        assert_eq!(compiler.warnings().len(), 1);
        assert_eq!(compiler.warnings().count("unknown top level block nonsense"), 1);

        compiler.compile(&project, Settings::default()).unwrap();
        assert_eq!(compiler.warnings().count("unknown top level block nonsense"), 1);
    }
}
