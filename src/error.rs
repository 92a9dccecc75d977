use std::rc::Rc;

use derive_more::{Display, Error};

/// A fault raised while a thread is executing. Any of these halts the whole
/// runtime; see [`Runtime::tick`](crate::interpreter::Runtime::tick).
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum RuntimeError {
    #[display("operand stack underflow")]
    StackUnderflow,
    #[display("invalid opcode {word:#x} at {pc} in {script}")]
    InvalidOpcode { script: Rc<str>, pc: usize, word: u32 },
    #[display("truncated instruction at {pc} in {script}")]
    Truncated { script: Rc<str>, pc: usize },
    #[display("label {label} does not exist in {script}")]
    BadLabel { script: Rc<str>, label: u32 },
    #[display("constant {index} does not exist in {script}")]
    BadConstant { script: Rc<str>, index: u32 },
    #[display("no {kind} slot {index} on {target}")]
    BadHandle {
        target: Rc<str>,
        kind: &'static str,
        index: u32,
    },
    #[display("thread has no call frame")]
    MissingFrame,
    #[display("no saved local state to restore")]
    MissingLocalState,
    #[display("target {target} no longer exists")]
    MissingTarget { target: usize },
    #[display("unknown builtin {id}")]
    UnknownBuiltin { id: u32 },
    #[display("maximum call depth of {limit} exceeded")]
    CallDepthExceeded { limit: usize },
}

/// Raised when compiled bytecode fails validation. This always indicates a
/// bug in the block library rather than a problem with the project.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum CompileError {
    #[display("{script}: invalid opcode {word:#x} at {pc}")]
    InvalidOpcode { script: Rc<str>, pc: usize, word: u32 },
    #[display("{script}: instruction at {pc} is missing operands")]
    Truncated { script: Rc<str>, pc: usize },
    #[display("{script}: label {label} points into the middle of an instruction ({pc})")]
    MisalignedLabel { script: Rc<str>, label: usize, pc: usize },
    #[display("{script}: jump at {pc} targets {target}, which is not an instruction")]
    MisalignedJump {
        script: Rc<str>,
        pc: usize,
        target: u32,
    },
    #[display("{script}: instruction at {pc} references missing label {label}")]
    MissingLabel { script: Rc<str>, pc: usize, label: u32 },
    #[display("{script}: instruction at {pc} references missing constant {index}")]
    MissingConstant { script: Rc<str>, pc: usize, index: u32 },
    #[display("{script}: control can run past the end of the script")]
    Unterminated { script: Rc<str> },
    #[display("project has no stage")]
    MissingStage,
}
