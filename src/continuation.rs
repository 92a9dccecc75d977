//! Resumable entry points into compiled scripts.
//!
//! A script compiles to one flat instruction stream. Every point a blocking
//! block may resume at is a *label*; a [`Continuation`] is a script plus one
//! of its labels, and running it executes from that label until the
//! instruction stream ends the invocation.

use std::{collections::HashSet, fmt::Write, rc::Rc};

use derive_more::{From, Into};
use indexmap::IndexSet;
use owo_colors::OwoColorize;

use crate::{
    error::CompileError,
    interpreter::{id::Id, opcode::Opcode, value::Value},
};

pub type ScriptId = Id<CompiledScript>;

#[derive(Debug, From, Into, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Debug)]
pub struct CompiledScript {
    id: ScriptId,
    name: Rc<str>,
    code: Box<[u32]>,
    constants: Box<[Value]>,
    labels: Box<[usize]>,
}

impl CompiledScript {
    pub fn id(&self) -> ScriptId {
        self.id
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn code(&self) -> &[u32] {
        &self.code
    }

    pub fn constant(&self, index: u32) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    pub fn label_offset(&self, label: u32) -> Option<usize> {
        self.labels.get(label as usize).copied()
    }

    pub fn entry(self: &Rc<Self>) -> Continuation {
        Continuation {
            script: Rc::clone(self),
            label: 0,
        }
    }

    pub fn continuation(self: &Rc<Self>, label: u32) -> Option<Continuation> {
        ((label as usize) < self.labels.len()).then(|| Continuation {
            script: Rc::clone(self),
            label,
        })
    }

    /// Every resumption point of the script, in label order.
    pub fn continuations(self: &Rc<Self>) -> impl Iterator<Item = Continuation> + '_ {
        (0..self.labels.len() as u32).map(|label| Continuation {
            script: Rc::clone(self),
            label,
        })
    }

    /// A human readable listing of the bytecode.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", "script".bold(), self.name.bold());

        let mut pc = 0;
        while pc < self.code.len() {
            for (label, _) in self.labels.iter().enumerate().filter(|&(_, &o)| o == pc) {
                let _ = writeln!(out, "{}", format!("L{label}:").yellow());
            }

            let Ok(opcode) = Opcode::try_from(self.code[pc]) else {
                let _ = writeln!(out, "  {:04} {}", pc, format!("{:#x}", self.code[pc]).red());
                pc += 1;
                continue;
            };
            let end = (pc + 1 + opcode.operand_words()).min(self.code.len());
            let operands = &self.code[pc + 1..end];

            let detail = match opcode {
                Opcode::PushNumber if operands.len() == 2 => {
                    format!("{}", read_f64([operands[0], operands[1]]))
                }
                Opcode::PushConstant => operands
                    .first()
                    .and_then(|&i| self.constant(i))
                    .map_or_else(|| "?".into(), |c| format!("{:?}", c.cast_string())),
                Opcode::Queue | Opcode::ForceQueue if operands.len() == 1 => {
                    format!("L{}", operands[0])
                }
                Opcode::Call if operands.len() == 3 => format!(
                    "{:?} argc={} ret=L{}",
                    self.constant(operands[0]).map(Value::cast_string),
                    operands[1],
                    operands[2]
                ),
                _ => operands.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(" "),
            };

            let _ = writeln!(
                out,
                "  {} {} {}",
                format!("{pc:04}").bright_black(),
                format!("{opcode:?}").cyan(),
                detail.bright_black()
            );
            pc += 1 + opcode.operand_words();
        }

        out
    }
}

impl PartialEq for CompiledScript {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A point to resume a script at.
#[derive(Debug, Clone)]
pub struct Continuation {
    pub script: Rc<CompiledScript>,
    pub label: u32,
}

impl Continuation {
    pub fn pc(&self) -> usize {
        self.script.labels[self.label as usize]
    }
}

impl PartialEq for Continuation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.script, &other.script) && self.label == other.label
    }
}

pub(crate) fn read_f64(words: [u32; 2]) -> f64 {
    let bytes: [u8; 8] = bytemuck::cast(words);
    f64::from_bits(u64::from_le_bytes(bytes))
}

fn write_f64(num: f64) -> [u32; 2] {
    bytemuck::cast(num.to_bits().to_le_bytes())
}

/// Accumulates one script's instruction stream, then validates it and splits
/// it into continuations.
#[derive(Debug)]
pub struct ContinuationBuilder {
    name: Rc<str>,
    code: Vec<u32>,
    constants: IndexSet<Rc<str>>,
    labels: Vec<Option<usize>>,
    /// Operand positions of jumps whose operand is still a label index.
    jump_fixups: Vec<usize>,
}

impl ContinuationBuilder {
    /// Starts a script with label 0 placed at the entry.
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            code: Vec::new(),
            constants: IndexSet::new(),
            labels: vec![Some(0)],
            jump_fixups: Vec::new(),
        }
    }

    pub fn name(&self) -> &Rc<str> {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label((self.labels.len() - 1) as u32)
    }

    pub fn place_label(&mut self, label: Label) {
        self.labels[label.0 as usize] = Some(self.code.len());
    }

    pub fn label_here(&mut self) -> Label {
        let label = self.new_label();
        self.place_label(label);
        label
    }

    pub fn op(&mut self, opcode: Opcode) {
        self.code.push(opcode.into());
    }

    pub fn imm(&mut self, word: u32) {
        self.code.push(word);
    }

    pub fn op_with(&mut self, opcode: Opcode, operand: u32) {
        self.op(opcode);
        self.imm(operand);
    }

    pub fn push_number(&mut self, num: f64) {
        self.op(Opcode::PushNumber);
        self.code.extend(write_f64(num));
    }

    pub fn push_text(&mut self, text: Rc<str>) {
        let index = self.constant(text);
        self.op_with(Opcode::PushConstant, index);
    }

    pub fn push_bool(&mut self, value: bool) {
        self.op_with(Opcode::PushBool, value.into());
    }

    pub fn constant(&mut self, text: Rc<str>) -> u32 {
        let (index, _) = self.constants.insert_full(text);
        index as u32
    }

    /// Writes a jump whose target is resolved once the label is placed.
    pub fn jump(&mut self, opcode: Opcode, target: Label) {
        debug_assert!(opcode.jump_operand());
        self.op(opcode);
        self.jump_fixups.push(self.code.len());
        self.imm(target.0);
    }

    /// Writes an op taking a resumption label operand.
    pub fn resume_at(&mut self, opcode: Opcode, target: Label) {
        self.op_with(opcode, target.0);
    }

    pub fn call(&mut self, proc_code: Rc<str>, argc: u32, ret: Label) {
        let name = self.constant(proc_code);
        self.op(Opcode::Call);
        self.imm(name);
        self.imm(argc);
        self.imm(ret.0);
    }

    pub fn build(self, id: ScriptId) -> Result<CompiledScript, CompileError> {
        let script = self.name.clone();
        let mut code = self.code;

        let mut boundaries = HashSet::new();
        let mut pc = 0;
        let mut last = None;
        while pc < code.len() {
            let opcode = Opcode::try_from(code[pc]).map_err(|_| CompileError::InvalidOpcode {
                script: script.clone(),
                pc,
                word: code[pc],
            })?;
            if pc + opcode.operand_words() >= code.len() {
                return Err(CompileError::Truncated {
                    script: script.clone(),
                    pc,
                });
            }
            boundaries.insert(pc);
            last = Some((pc, opcode));
            pc += 1 + opcode.operand_words();
        }

        if !last.is_some_and(|(_, op)| op.is_terminator()) {
            return Err(CompileError::Unterminated { script });
        }

        let mut labels = Vec::with_capacity(self.labels.len());
        for (label, offset) in self.labels.iter().enumerate() {
            let offset = offset.ok_or_else(|| CompileError::MissingLabel {
                script: script.clone(),
                pc: 0,
                label: label as u32,
            })?;
            if !boundaries.contains(&offset) {
                return Err(CompileError::MisalignedLabel {
                    script: script.clone(),
                    label,
                    pc: offset,
                });
            }
            labels.push(offset);
        }

        for &operand in &self.jump_fixups {
            let label = code[operand];
            let target = *labels.get(label as usize).ok_or_else(|| CompileError::MissingLabel {
                script: script.clone(),
                pc: operand - 1,
                label,
            })?;
            code[operand] = target as u32;
        }

        for &pc in &boundaries {
            let Ok(opcode) = Opcode::try_from(code[pc]) else {
                continue;
            };
            if let Some(offset) = opcode.label_operand() {
                let label = code[pc + 1 + offset];
                if label as usize >= labels.len() {
                    return Err(CompileError::MissingLabel {
                        script: script.clone(),
                        pc,
                        label,
                    });
                }
            }
            if opcode.jump_operand() && !boundaries.contains(&(code[pc + 1] as usize)) {
                return Err(CompileError::MisalignedJump {
                    script: script.clone(),
                    pc,
                    target: code[pc + 1],
                });
            }
            let constant = match opcode {
                Opcode::PushConstant | Opcode::Call => Some(code[pc + 1]),
                _ => None,
            };
            if let Some(index) = constant
                && index as usize >= self.constants.len()
            {
                return Err(CompileError::MissingConstant {
                    script: script.clone(),
                    pc,
                    index,
                });
            }
        }

        Ok(CompiledScript {
            id,
            name: self.name,
            code: code.into_boxed_slice(),
            constants: self.constants.into_iter().map(Value::String).collect(),
            labels: labels.into_boxed_slice(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ScriptId {
        Id::from(0)
    }

    #[test]
    fn labels_become_continuations() {
        let mut builder = ContinuationBuilder::new("loop");
        builder.push_text("hi".into());
        builder.op(Opcode::Pop);
        let top = builder.label_here();
        builder.resume_at(Opcode::ForceQueue, top);

        let script = Rc::new(builder.build(id()).unwrap());
        let continuations: Vec<_> = script.continuations().collect();

        assert_eq!(continuations.len(), 2);
        assert_eq!(continuations[0].pc(), 0);
        assert_eq!(continuations[1].pc(), 3);
        assert_eq!(script.constant(0), Some(&Value::from("hi")));
    }

    #[test]
    fn forward_jumps_are_patched() {
        let mut builder = ContinuationBuilder::new("if");
        let end = builder.new_label();
        builder.push_bool(false);
        builder.jump(Opcode::JumpIfFalse, end);
        builder.push_number(1.0);
        builder.op(Opcode::Pop);
        builder.place_label(end);
        builder.op(Opcode::End);

        let script = builder.build(id()).unwrap();
        assert_eq!(script.code()[3], 8);
        assert_eq!(script.label_offset(1), Some(8));
    }

    #[test]
    fn rejects_unterminated_scripts() {
        let mut builder = ContinuationBuilder::new("bad");
        builder.push_bool(true);
        assert_eq!(
            builder.build(id()),
            Err(CompileError::Unterminated { script: "bad".into() })
        );
    }

    #[test]
    fn rejects_unplaced_labels() {
        let mut builder = ContinuationBuilder::new("bad");
        let nowhere = builder.new_label();
        builder.resume_at(Opcode::Queue, nowhere);
        assert!(matches!(
            builder.build(id()),
            Err(CompileError::MissingLabel { label: 1, .. })
        ));
    }

    #[test]
    fn rejects_truncated_and_invalid_code() {
        let mut builder = ContinuationBuilder::new("bad");
        builder.op(Opcode::PushNumber);
        builder.imm(0);
        assert!(matches!(builder.build(id()), Err(CompileError::Truncated { pc: 0, .. })));

        let mut builder = ContinuationBuilder::new("bad");
        builder.imm(u32::MAX);
        assert!(matches!(builder.build(id()), Err(CompileError::InvalidOpcode { .. })));
    }

    #[test]
    fn numbers_survive_encoding() {
        for num in [0.5, -3.25, f64::INFINITY, 1e300] {
            assert_eq!(read_f64(write_f64(num)), num);
        }
    }

    #[test]
    fn disassembly_mentions_labels_and_constants() {
        let mut builder = ContinuationBuilder::new("say");
        builder.push_text("hello".into());
        builder.op(Opcode::Pop);
        builder.op(Opcode::End);
        let text = builder.build(id()).unwrap().disassemble();

        assert!(text.contains("L0:"));
        assert!(text.contains("\"hello\""));
        assert!(text.contains("End"));
    }
}
