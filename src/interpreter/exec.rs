use std::{cmp::Ordering, rc::Rc};

use tracing::trace;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    codegen::{ListHandle, VarHandle},
    continuation::{CompiledScript, Continuation, read_f64},
    error::RuntimeError,
    interpreter::{
        Runtime, RuntimeContext,
        event::Event,
        id::{Arena, Id},
        opcode::{MathFunction, Opcode, StopMode, VisualTier},
        target::{ListVariable, Target, Variable, Watched},
        thread::{Argument, CallFrame, ExecutionContext},
        value::{
            Value, compare, equal, floored_mod, num_equal, num_greater, num_less, random_between,
        },
    },
};

fn continuation_at(script: &Rc<CompiledScript>, label: u32) -> Result<Continuation, RuntimeError> {
    script
        .continuation(label)
        .ok_or_else(|| RuntimeError::BadLabel {
            script: script.name().clone(),
            label,
        })
}

impl Runtime {
    /// Runs one continuation until it ends the invocation. Anything to run
    /// next is left in `ctx.immediate` or `ctx.requeue`.
    pub(super) fn execute(
        &mut self,
        ctx: &mut ExecutionContext,
        cont: Continuation,
    ) -> Result<(), RuntimeError> {
        let script = cont.script.clone();
        let code = script.code();
        let mut pc = cont.pc();
        ctx.clear_stack();

        loop {
            let word = *code.get(pc).ok_or_else(|| RuntimeError::Truncated {
                script: script.name().clone(),
                pc,
            })?;
            let opcode = Opcode::try_from(word).map_err(|_| RuntimeError::InvalidOpcode {
                script: script.name().clone(),
                pc,
                word,
            })?;
            let operands = code
                .get(pc + 1..pc + 1 + opcode.operand_words())
                .ok_or_else(|| RuntimeError::Truncated {
                    script: script.name().clone(),
                    pc,
                })?;

            trace!(script = %script.name(), pc, ?opcode, depth = ctx.stack_len());
            pc += 1 + opcode.operand_words();

            match opcode {
                Opcode::PushConstant => {
                    let constant =
                        script
                            .constant(operands[0])
                            .ok_or_else(|| RuntimeError::BadConstant {
                                script: script.name().clone(),
                                index: operands[0],
                            })?;
                    ctx.push(constant.clone());
                }
                Opcode::PushNumber => ctx.push(read_f64([operands[0], operands[1]])),
                Opcode::PushBool => ctx.push(operands[0] != 0),
                Opcode::Pop => {
                    ctx.pop()?;
                }

                Opcode::ToNumber => {
                    let value = ctx.pop()?;
                    ctx.push(value.cast_number());
                }
                Opcode::ToString => {
                    let value = ctx.pop()?;
                    ctx.push(value.cast_string());
                }
                Opcode::ToBoolean => {
                    let value = ctx.pop()?;
                    ctx.push(value.cast_boolean());
                }

                Opcode::PushVar => {
                    let var = variable_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let value = var.value.clone();
                    ctx.push(value);
                }
                Opcode::SetVar => {
                    let value = ctx.pop()?;
                    variable_slot(&mut self.targets, self.stage, ctx, operands[0])?.value = value;
                }
                Opcode::ChangeVar => {
                    let delta = ctx.pop()?.cast_number();
                    let var = variable_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    var.value = (var.value.cast_number() + delta).into();
                }
                Opcode::VarWatch => {
                    variable_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let handle = VarHandle::from(operands[0]);
                    let owner = if handle.is_stage() { self.stage } else { ctx.target };
                    self.set_watcher(owner, Watched::Variable(handle.index()), operands[1] != 0);
                }

                Opcode::PushList => {
                    let list = list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let contents = list.list.contents();
                    ctx.push(contents);
                }
                Opcode::ListAdd => {
                    let item = ctx.pop()?;
                    let list = list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    list.list.push(item);
                }
                Opcode::ListDelete => {
                    let index = ctx.pop()?;
                    list_slot(&mut self.targets, self.stage, ctx, operands[0])?
                        .list
                        .delete(&index, &mut self.rng);
                }
                Opcode::ListDeleteAll => {
                    let list = list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    list.list.clear();
                }
                Opcode::ListInsert => {
                    let [item, index] = ctx.pop_values()?;
                    list_slot(&mut self.targets, self.stage, ctx, operands[0])?
                        .list
                        .insert(&index, item, &mut self.rng);
                }
                Opcode::ListReplace => {
                    let [index, item] = ctx.pop_values()?;
                    list_slot(&mut self.targets, self.stage, ctx, operands[0])?
                        .list
                        .replace(&index, item, &mut self.rng);
                }
                Opcode::ListItem => {
                    let index = ctx.pop()?;
                    let item = list_slot(&mut self.targets, self.stage, ctx, operands[0])?
                        .list
                        .item(&index, &mut self.rng);
                    ctx.push(item);
                }
                Opcode::ListItemNum => {
                    let item = ctx.pop()?;
                    let list = list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let position = list.list.index_of(&item);
                    ctx.push(position);
                }
                Opcode::ListLength => {
                    let list = list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let len = list.list.len();
                    ctx.push(len);
                }
                Opcode::ListContains => {
                    let item = ctx.pop()?;
                    let list = list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let found = list.list.contains(&item);
                    ctx.push(found);
                }
                Opcode::ListWatch => {
                    list_slot(&mut self.targets, self.stage, ctx, operands[0])?;
                    let handle = ListHandle::from(operands[0]);
                    let owner = if handle.is_stage() { self.stage } else { ctx.target };
                    self.set_watcher(owner, Watched::List(handle.index()), operands[1] != 0);
                }

                Opcode::Save => ctx.save(),
                Opcode::Restore => ctx.restore()?,
                Opcode::PushLocal => {
                    let value = ctx.local.get(operands[0]);
                    ctx.push(value);
                }
                Opcode::SetLocal => {
                    let value = ctx.pop()?;
                    ctx.local.set(operands[0], value);
                }
                Opcode::DecLocal => {
                    let value = ctx.local.get(operands[0]).cast_number();
                    ctx.local.set(operands[0], (value - 1.0).into());
                }

                Opcode::PushArg | Opcode::PushArgNumber | Opcode::PushArgBoolean => {
                    let arg = ctx.frame.args.get(operands[0] as usize);
                    let value = match (opcode, arg) {
                        (Opcode::PushArgNumber, Some(arg)) => arg.number().into(),
                        (Opcode::PushArgBoolean, Some(arg)) => arg.boolean().into(),
                        (_, Some(arg)) => arg.value.clone(),
                        (Opcode::PushArgNumber, None) => 0.0.into(),
                        (Opcode::PushArgBoolean, None) => false.into(),
                        (_, None) => Default::default(),
                    };
                    ctx.push(value);
                }

                Opcode::Add => {
                    let [a, b] = ctx.pop_numbers()?;
                    ctx.push(nan_to_zero(a + b));
                }
                Opcode::Subtract => {
                    let [a, b] = ctx.pop_numbers()?;
                    ctx.push(nan_to_zero(a - b));
                }
                Opcode::Multiply => {
                    let [a, b] = ctx.pop_numbers()?;
                    ctx.push(nan_to_zero(a * b));
                }
                Opcode::Divide => {
                    let [a, b] = ctx.pop_numbers()?;
                    ctx.push(nan_to_zero(a / b));
                }
                Opcode::Mod => {
                    let [a, b] = ctx.pop_numbers()?;
                    ctx.push(floored_mod(a, b));
                }
                Opcode::Round => {
                    let [x] = ctx.pop_numbers()?;
                    ctx.push((x + 0.5).floor());
                }
                Opcode::MathOp => {
                    let [x] = ctx.pop_numbers()?;
                    let result = MathFunction::try_from(operands[0]).map_or(0.0, |f| f.apply(x));
                    ctx.push(result);
                }
                Opcode::Random => {
                    let [from, to] = ctx.pop_values()?;
                    ctx.push(random_between(&from, &to, &mut self.rng));
                }
                Opcode::Lt => {
                    let [a, b] = ctx.pop_values()?;
                    ctx.push(compare(&a, &b) == Ordering::Less);
                }
                Opcode::Gt => {
                    let [a, b] = ctx.pop_values()?;
                    ctx.push(compare(&a, &b) == Ordering::Greater);
                }
                Opcode::Equals => {
                    let [a, b] = ctx.pop_values()?;
                    ctx.push(equal(&a, &b));
                }
                Opcode::NumLess => {
                    let [x, y] = ctx.pop_values()?;
                    ctx.push(num_less(x.cast_number(), &y));
                }
                Opcode::NumGreater => {
                    let [x, y] = ctx.pop_values()?;
                    ctx.push(num_greater(x.cast_number(), &y));
                }
                Opcode::NumEquals => {
                    let [x, y] = ctx.pop_values()?;
                    ctx.push(num_equal(x.cast_number(), &y));
                }
                Opcode::And => {
                    let [a, b] = ctx.pop_values()?;
                    ctx.push(a.cast_boolean() && b.cast_boolean());
                }
                Opcode::Or => {
                    let [a, b] = ctx.pop_values()?;
                    ctx.push(a.cast_boolean() || b.cast_boolean());
                }
                Opcode::Not => {
                    let value = ctx.pop()?;
                    ctx.push(!value.cast_boolean());
                }
                Opcode::Join => {
                    let [a, b] = ctx.pop_strings()?;
                    ctx.push(format!("{a}{b}"));
                }
                Opcode::LetterOf => {
                    let [index, string] = ctx.pop_values()?;
                    let index = index.cast_number().trunc();
                    let string = string.cast_string();
                    let letter = if index >= 1.0 {
                        string.graphemes(true).nth(index as usize - 1).unwrap_or("")
                    } else {
                        ""
                    };
                    ctx.push(letter);
                }
                Opcode::Length => {
                    let [string] = ctx.pop_strings()?;
                    ctx.push(string.graphemes(true).count());
                }
                Opcode::Contains => {
                    let [haystack, needle] = ctx.pop_strings()?;
                    ctx.push(haystack.to_lowercase().contains(&needle.to_lowercase()));
                }

                Opcode::Jump => pc = operands[0] as usize,
                Opcode::JumpIfFalse => {
                    if !ctx.pop()?.cast_boolean() {
                        pc = operands[0] as usize;
                    }
                }
                Opcode::JumpIfTrue => {
                    if ctx.pop()?.cast_boolean() {
                        pc = operands[0] as usize;
                    }
                }
                Opcode::Queue => {
                    let next = continuation_at(&script, operands[0])?;
                    if ctx.warp > 0 {
                        ctx.immediate = Some(next);
                    } else {
                        force_queue(ctx, next);
                    }
                    return Ok(());
                }
                Opcode::ForceQueue => {
                    force_queue(ctx, continuation_at(&script, operands[0])?);
                    return Ok(());
                }
                Opcode::End => return Ok(()),
                Opcode::EndCall => return end_call(ctx),
                Opcode::Call => {
                    let proc_code = script
                        .constant(operands[0])
                        .ok_or_else(|| RuntimeError::BadConstant {
                            script: script.name().clone(),
                            index: operands[0],
                        })?
                        .cast_string();
                    let args = ctx.pop_n(operands[1] as usize)?;
                    let ret = continuation_at(&script, operands[2])?;
                    return self.call(ctx, &proc_code, args, ret);
                }

                Opcode::Broadcast => {
                    let name = ctx.pop()?.cast_string();
                    let started = self.trigger(&Event::broadcast(&name));
                    if started.contains(&ctx.base) {
                        return Ok(());
                    }
                }
                Opcode::BroadcastAndWait => {
                    let name = ctx.pop()?.cast_string();
                    let started = self.trigger(&Event::broadcast(&name));
                    let restarted_self = started.contains(&ctx.base);
                    ctx.local.threads = started;
                    if restarted_self {
                        return Ok(());
                    }
                }
                Opcode::Running => {
                    let waiting = &ctx.local.threads;
                    let running = self
                        .queue
                        .iter()
                        .flatten()
                        .any(|thread| waiting.contains(&thread.base));
                    ctx.push(running);
                }
                Opcode::SceneChanged => {
                    let backdrop = self.target(self.stage)?.costume_name();
                    let started = self.trigger(&Event::backdrop_switched(&backdrop));
                    if started.contains(&ctx.base) {
                        return Ok(());
                    }
                }

                Opcode::Stop => match StopMode::try_from(operands[0]) {
                    Ok(StopMode::All) => {
                        self.stop_all();
                        ctx.stopped = true;
                        return Ok(());
                    }
                    Ok(StopMode::ThisScript) => return end_call(ctx),
                    Ok(StopMode::OtherScripts) => {
                        for (i, slot) in self.queue.iter_mut().enumerate() {
                            if i != ctx.thread
                                && slot.as_ref().is_some_and(|t| t.target == ctx.target)
                            {
                                *slot = None;
                            }
                        }
                    }
                    Err(_) => {}
                },
                Opcode::DeleteClone => {
                    if self.target(ctx.target)?.is_clone() {
                        self.delete_clone(ctx.target);
                        return Ok(());
                    }
                }
                Opcode::WaitElapsed => {
                    let start = ctx.local.get(operands[0]).cast_number();
                    let duration = ctx.local.get(operands[0] + 1).cast_number();
                    ctx.push(self.current_msecs - start >= duration * 1000.0);
                }
                Opcode::PushNow => ctx.push(self.current_msecs),
                Opcode::Visual => {
                    let tier = VisualTier::try_from(operands[0]).unwrap_or(VisualTier::Always);
                    self.visual_check(ctx.target, tier);
                }
                Opcode::CallBuiltin => {
                    let builtins = Rc::clone(&self.builtins);
                    let logic = builtins
                        .get(operands[0] as usize)
                        .ok_or(RuntimeError::UnknownBuiltin { id: operands[0] })?;
                    logic(&mut RuntimeContext { runtime: self, ctx })?;
                }
            }
        }
    }

    /// Enters a custom block. Warped calls and calls from warped code run
    /// inline; a call that would recurse after something visible changed
    /// yields until the next pass instead.
    fn call(
        &mut self,
        ctx: &mut ExecutionContext,
        proc_code: &str,
        args: Vec<Value>,
        ret: Continuation,
    ) -> Result<(), RuntimeError> {
        let scripts = Rc::clone(&self.target(ctx.target)?.scripts);
        let Some(procedure) = scripts.procedure(proc_code) else {
            ctx.immediate = Some(ret);
            return Ok(());
        };

        if ctx.depth() >= self.settings.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.settings.max_call_depth,
            });
        }

        let mut args: Vec<_> = args.into_iter().map(Argument::new).collect();
        args.resize_with(procedure.arguments.len(), Argument::default);

        let entry = procedure.script.entry();
        let base = procedure.script.id();
        ctx.push_frame(CallFrame {
            base: Some(base),
            return_to: Some(ret),
            args: args.into_boxed_slice(),
            stack: vec![],
            warp: procedure.warp,
        });

        if procedure.warp || ctx.warp > 0 {
            ctx.warp += 1;
        } else if self.visual
            && ctx
                .calls
                .iter()
                .rev()
                .take(self.settings.recursion_window)
                .any(|frame| frame.base == Some(base))
        {
            trace!(procedure = proc_code, "recursive call yields");
            ctx.requeue = Some(entry);
            return Ok(());
        }

        ctx.immediate = Some(entry);
        Ok(())
    }
}

fn variable_slot<'a>(
    targets: &'a mut Arena<Target>,
    stage: Id<Target>,
    ctx: &ExecutionContext,
    word: u32,
) -> Result<&'a mut Variable, RuntimeError> {
    let handle = VarHandle::from(word);
    let owner = if handle.is_stage() { stage } else { ctx.target };
    let target = targets
        .get_mut(owner)
        .ok_or(RuntimeError::MissingTarget { target: owner.get() })?;

    match target.data.variables.get_index_mut(handle.index()) {
        Some((_, var)) => Ok(var),
        None => Err(RuntimeError::BadHandle {
            target: target.name.clone(),
            kind: "variable",
            index: word,
        }),
    }
}

fn list_slot<'a>(
    targets: &'a mut Arena<Target>,
    stage: Id<Target>,
    ctx: &ExecutionContext,
    word: u32,
) -> Result<&'a mut ListVariable, RuntimeError> {
    let handle = ListHandle::from(word);
    let owner = if handle.is_stage() { stage } else { ctx.target };
    let target = targets
        .get_mut(owner)
        .ok_or(RuntimeError::MissingTarget { target: owner.get() })?;

    match target.data.lists.get_index_mut(handle.index()) {
        Some((_, list)) => Ok(list),
        None => Err(RuntimeError::BadHandle {
            target: target.name.clone(),
            kind: "list",
            index: word,
        }),
    }
}

/// Arithmetic that produces NaN (`0 / 0`, `Infinity - Infinity`) reports 0.
fn nan_to_zero(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x }
}

/// Resumes at `next` on the next pass unless the thread was stopped.
fn force_queue(ctx: &mut ExecutionContext, next: Continuation) {
    if !ctx.stopped {
        ctx.requeue = Some(next);
    }
}

fn end_call(ctx: &mut ExecutionContext) -> Result<(), RuntimeError> {
    if ctx.depth() > 0 {
        ctx.warp = ctx.warp.saturating_sub(1);
        ctx.immediate = ctx.pop_frame()?;
    }
    Ok(())
}
