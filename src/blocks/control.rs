use crate::{
    blocks::{BlockLibrary, inputs, menu},
    codegen::CompileContext,
    interpreter::opcode::{Opcode, StopMode},
};

const COUNT: u32 = 0;

pub(super) fn register(library: &mut BlockLibrary) {
    // Always yields at least once, even for a zero or negative duration.
    library
        .register_block("control_wait")
        .compile_logic(|ctx| {
            let duration = ctx.input("DURATION");
            ctx.compiler
                .wait_seconds(|compiler| compiler.push_number_input(duration));
        })
        .finish();

    library
        .register_block("control_repeat")
        .compile_logic(|mut ctx| {
            ctx.compiler.op(Opcode::Save);
            ctx.push_number("TIMES");
            ctx.compiler.op_with(Opcode::SetLocal, COUNT);

            let top = ctx.compiler.label_here();
            let done = ctx.compiler.new_label();
            ctx.compiler.op_with(Opcode::PushLocal, COUNT);
            ctx.compiler.push_number(0.5);
            ctx.compiler.op(Opcode::Lt);
            ctx.compiler.jump(Opcode::JumpIfTrue, done);
            ctx.compiler.op_with(Opcode::DecLocal, COUNT);
            ctx.substack("SUBSTACK");
            ctx.compiler.resume_at(Opcode::Queue, top);
            ctx.compiler.place_label(done);
            ctx.compiler.op(Opcode::Restore);
        })
        .finish();

    // Yields every iteration, even when warped.
    library
        .register_block("control_forever")
        .compile_logic(|mut ctx| {
            let top = ctx.compiler.label_here();
            ctx.substack("SUBSTACK");
            ctx.compiler.resume_at(Opcode::ForceQueue, top);
        })
        .finish();

    library
        .register_block("control_if")
        .compile_logic(|mut ctx| {
            let end = ctx.compiler.new_label();
            ctx.push_bool("CONDITION");
            ctx.compiler.jump(Opcode::JumpIfFalse, end);
            ctx.substack("SUBSTACK");
            ctx.compiler.place_label(end);
        })
        .finish();

    library
        .register_block("control_if_else")
        .compile_logic(|mut ctx| {
            let otherwise = ctx.compiler.new_label();
            let end = ctx.compiler.new_label();
            ctx.push_bool("CONDITION");
            ctx.compiler.jump(Opcode::JumpIfFalse, otherwise);
            ctx.substack("SUBSTACK");
            ctx.compiler.jump(Opcode::Jump, end);
            ctx.compiler.place_label(otherwise);
            ctx.substack("SUBSTACK2");
            ctx.compiler.place_label(end);
        })
        .finish();

    library
        .register_block("control_wait_until")
        .compile_logic(|ctx| conditional_loop(ctx, Opcode::JumpIfTrue, None))
        .finish();

    library
        .register_block("control_repeat_until")
        .compile_logic(|ctx| conditional_loop(ctx, Opcode::JumpIfTrue, Some("SUBSTACK")))
        .finish();

    library
        .register_block("control_while")
        .compile_logic(|ctx| conditional_loop(ctx, Opcode::JumpIfFalse, Some("SUBSTACK")))
        .finish();

    library
        .register_block("control_all_at_once")
        .compile_logic(|mut ctx| ctx.substack("SUBSTACK"))
        .finish();

    library
        .register_block("control_stop")
        .compile_logic(|mut ctx| {
            let option = ctx.field("STOP_OPTION");
            let mode = match &*option {
                "all" => StopMode::All,
                "this script" => StopMode::ThisScript,
                "other scripts in sprite" | "other scripts in stage" => StopMode::OtherScripts,
                _ => {
                    ctx.warn(format!("unknown stop option {option}"));
                    return;
                }
            };
            ctx.compiler.op_with(Opcode::Stop, mode.into());
        })
        .finish();

    library
        .register_block("control_create_clone_of")
        .runtime_logic(|ctx| {
            let [name] = ctx.pop_strings()?;
            let parent = if &*name == "_myself_" {
                Some(ctx.target_id())
            } else {
                ctx.runtime().sprite(&name)
            };
            if let Some(parent) = parent {
                ctx.runtime_mut().create_clone(parent);
            }
            Ok(())
        })
        .inputs_order(inputs(["CLONE_OPTION"]))
        .finish();

    library
        .register_block("control_delete_this_clone")
        .compile_logic(|ctx| ctx.compiler.op(Opcode::DeleteClone))
        .finish();

    library
        .register_block("control_incr_counter")
        .runtime_logic(|ctx| {
            ctx.runtime_mut().io_mut().counter += 1.0;
            Ok(())
        })
        .finish();

    library
        .register_block("control_clear_counter")
        .runtime_logic(|ctx| {
            ctx.runtime_mut().io_mut().counter = 0.0;
            Ok(())
        })
        .finish();

    library
        .register_reporter("control_get_counter")
        .runtime_logic(|ctx| {
            let counter = ctx.runtime().io().counter;
            ctx.push(counter);
            Ok(())
        })
        .finish();

    library
        .register_reporter("control_create_clone_of_menu")
        .compile_logic(menu("CLONE_OPTION"))
        .finish();
}

/// Checks the condition before every iteration and yields between
/// iterations unless warped.
fn conditional_loop(mut ctx: CompileContext<'_, '_>, exit_when: Opcode, body: Option<&str>) {
    let top = ctx.compiler.label_here();
    let done = ctx.compiler.new_label();
    ctx.push_bool("CONDITION");
    ctx.compiler.jump(exit_when, done);
    if let Some(body) = body {
        ctx.substack(body);
    }
    ctx.compiler.resume_at(Opcode::Queue, top);
    ctx.compiler.place_label(done);
}
