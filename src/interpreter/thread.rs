use std::{cell::OnceCell, convert::identity, mem, rc::Rc};

use itertools::Itertools;

use crate::{
    continuation::{CompiledScript, Continuation, ScriptId},
    error::RuntimeError,
    interpreter::{id::Id, target::Target, value::Value},
};

/// A procedure argument with its coercions computed on first use.
#[derive(Debug, Clone, Default)]
pub struct Argument {
    pub value: Value,
    number: OnceCell<f64>,
    boolean: OnceCell<bool>,
}

impl Argument {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            number: OnceCell::new(),
            boolean: OnceCell::new(),
        }
    }

    pub fn number(&self) -> f64 {
        *self.number.get_or_init(|| self.value.cast_number())
    }

    pub fn boolean(&self) -> bool {
        *self.boolean.get_or_init(|| self.value.cast_boolean())
    }
}

/// State saved by a blocking block so it survives across resumptions.
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    slots: Vec<Value>,
    /// Scripts started by a `broadcast and wait`.
    pub threads: Vec<ScriptId>,
}

impl LocalState {
    pub fn get(&self, slot: u32) -> Value {
        self.slots.get(slot as usize).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, slot: u32, value: Value) {
        let slot = slot as usize;
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, Value::default());
        }
        self.slots[slot] = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    /// The procedure this frame runs, `None` for a thread's root frame.
    pub base: Option<ScriptId>,
    pub return_to: Option<Continuation>,
    pub args: Box<[Argument]>,
    /// Saved local states; the live one is held separately while running.
    pub stack: Vec<LocalState>,
    pub warp: bool,
}

impl CallFrame {
    pub fn root() -> Self {
        Self {
            stack: vec![LocalState::default()],
            ..Self::default()
        }
    }
}

/// One entry in the scheduler's queue.
#[derive(Debug)]
pub struct Thread {
    pub target: Id<Target>,
    pub base: ScriptId,
    pub resume: Option<Continuation>,
    pub frames: Vec<CallFrame>,
    pub warp: u32,
    pub stopped: bool,
}

impl Thread {
    pub fn new(target: Id<Target>, script: &Rc<CompiledScript>) -> Self {
        Self {
            target,
            base: script.id(),
            resume: Some(script.entry()),
            frames: vec![CallFrame::root()],
            warp: 0,
            stopped: false,
        }
    }
}

/// The live state of the thread currently being resumed.
#[derive(Debug)]
pub struct ExecutionContext {
    pub target: Id<Target>,
    pub base: ScriptId,
    /// Index of the thread in the queue.
    pub thread: usize,
    /// Frames of the callers, outermost first.
    pub calls: Vec<CallFrame>,
    pub frame: CallFrame,
    pub local: LocalState,
    pub warp: u32,
    /// Runs next within the same pass.
    pub immediate: Option<Continuation>,
    /// Written back to the queue once the thread yields.
    pub requeue: Option<Continuation>,
    /// Set by `stop all` while the thread runs. A stopped thread cannot
    /// queue itself.
    pub stopped: bool,
    stack: Vec<Value>,
}

impl ExecutionContext {
    /// Takes the thread's state, leaving a stopped shell behind in the
    /// queue so replacement and pruning still see it.
    pub fn load(index: usize, thread: &mut Thread) -> Result<Self, RuntimeError> {
        let mut calls = mem::take(&mut thread.frames);
        let mut frame = calls.pop().ok_or(RuntimeError::MissingFrame)?;
        let local = frame.stack.pop().ok_or(RuntimeError::MissingLocalState)?;

        let ctx = Self {
            target: thread.target,
            base: thread.base,
            thread: index,
            calls,
            frame,
            local,
            warp: thread.warp,
            immediate: thread.resume.take(),
            requeue: None,
            stopped: thread.stopped,
            stack: Vec::with_capacity(8),
        };
        thread.stopped = true;
        Ok(ctx)
    }

    /// A context for a script that is not in the queue.
    pub fn detached(target: Id<Target>, script: &Rc<CompiledScript>) -> Self {
        Self {
            target,
            base: script.id(),
            thread: usize::MAX,
            calls: vec![],
            frame: CallFrame::root(),
            local: LocalState::default(),
            warp: 0,
            immediate: Some(script.entry()),
            requeue: None,
            stopped: false,
            stack: vec![],
        }
    }

    /// Packs the context back into a queued thread resuming at `resume`.
    pub fn into_thread(mut self, resume: Continuation) -> Thread {
        self.frame.stack.push(self.local);
        self.calls.push(self.frame);
        Thread {
            target: self.target,
            base: self.base,
            resume: Some(resume),
            frames: self.calls,
            warp: self.warp,
            stopped: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.calls.len()
    }

    pub fn save(&mut self) {
        self.frame.stack.push(mem::take(&mut self.local));
    }

    pub fn restore(&mut self) -> Result<(), RuntimeError> {
        self.local = self.frame.stack.pop().ok_or(RuntimeError::MissingLocalState)?;
        Ok(())
    }

    /// Enters a procedure frame, saving the caller's state.
    pub fn push_frame(&mut self, frame: CallFrame) {
        self.save();
        let caller = mem::replace(&mut self.frame, frame);
        self.calls.push(caller);
    }

    /// Leaves the current procedure. Returns where the caller resumes, or
    /// `None` when already at the root frame.
    pub fn pop_frame(&mut self) -> Result<Option<Continuation>, RuntimeError> {
        let Some(caller) = self.calls.pop() else {
            return Ok(None);
        };
        let finished = mem::replace(&mut self.frame, caller);
        self.restore()?;
        Ok(finished.return_to)
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.stack.push(value.into());
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let first = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.drain(first..).collect())
    }

    fn pop_n_and_map<const N: usize, T>(
        &mut self,
        map: impl FnMut(Value) -> T,
    ) -> Result<[T; N], RuntimeError> {
        let first = self
            .stack
            .len()
            .checked_sub(N)
            .ok_or(RuntimeError::StackUnderflow)?;
        self.stack
            .drain(first..)
            .map(map)
            .collect_array::<N>()
            .ok_or(RuntimeError::StackUnderflow)
    }

    /// Pops `N` values, returned in the order they were pushed.
    pub fn pop_values<const N: usize>(&mut self) -> Result<[Value; N], RuntimeError> {
        self.pop_n_and_map(identity)
    }

    pub fn pop_numbers<const N: usize>(&mut self) -> Result<[f64; N], RuntimeError> {
        self.pop_n_and_map(|v| v.cast_number())
    }

    pub fn pop_strings<const N: usize>(&mut self) -> Result<[Rc<str>; N], RuntimeError> {
        self.pop_n_and_map(|v| v.cast_string())
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }
}
