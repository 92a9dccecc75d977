use crate::{
    blocks::{BlockLibrary, inputs, menu, visual_builtin},
    codegen::CompileContext,
    error::RuntimeError,
    interpreter::{
        RuntimeContext,
        opcode::{Opcode, VisualTier},
        target::Target,
        value::Value,
    },
};

const START: u32 = 0;
const DURATION: u32 = 1;
/// Id of the bubble a timed `say` put up.
const BUBBLE: u32 = 2;

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("looks_say")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| say(ctx, false))
        .inputs_order(inputs(["MESSAGE"]))
        .finish();

    library
        .register_block("looks_think")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| say(ctx, true))
        .inputs_order(inputs(["MESSAGE"]))
        .finish();

    library
        .register_block("looks_sayforsecs")
        .compile_logic(say_for_secs)
        .runtime_logic(|ctx| begin_say_for_secs(ctx, false))
        .inputs_order(inputs(["MESSAGE", "SECS"]))
        .finish();

    library
        .register_block("looks_thinkforsecs")
        .compile_logic(say_for_secs)
        .runtime_logic(|ctx| begin_say_for_secs(ctx, true))
        .inputs_order(inputs(["MESSAGE", "SECS"]))
        .finish();

    // Clears the bubble unless something else was said in the meantime.
    library
        .register_block("looks_sayforsecs.clear")
        .runtime_logic(|ctx| {
            let bubble = ctx.local(BUBBLE).cast_number();
            let target = ctx.target_mut()?;
            if target.say_id as f64 == bubble {
                target.say("".into(), false);
            }
            Ok(())
        })
        .finish();

    library
        .register_block("looks_switchcostumeto")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| {
            let costume = ctx.pop()?;
            ctx.target_mut()?.set_costume(&costume);
            Ok(())
        })
        .inputs_order(inputs(["COSTUME"]))
        .finish();

    library
        .register_block("looks_nextcostume")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| {
            ctx.target_mut()?.next_costume();
            Ok(())
        })
        .finish();

    library
        .register_block("looks_switchbackdropto")
        .compile_logic(backdrop_change)
        .runtime_logic(|ctx| {
            let backdrop = ctx.pop()?;
            ctx.stage_mut().set_costume(&backdrop);
            Ok(())
        })
        .inputs_order(inputs(["BACKDROP"]))
        .finish();

    library
        .register_block("looks_nextbackdrop")
        .compile_logic(backdrop_change)
        .runtime_logic(|ctx| {
            ctx.stage_mut().next_costume();
            Ok(())
        })
        .finish();

    library
        .register_block("looks_changesizeby")
        .compile_logic(|mut ctx| {
            ctx.push_number("CHANGE");
            ctx.call_builtin();
            ctx.visual(VisualTier::Visible);
        })
        .runtime_logic(|ctx| {
            let [change] = ctx.pop_numbers()?;
            let target = ctx.target_mut()?;
            target.scale = (target.scale + change / 100.0).max(0.0);
            Ok(())
        })
        .finish();

    library
        .register_block("looks_setsizeto")
        .compile_logic(|mut ctx| {
            ctx.push_number("SIZE");
            ctx.call_builtin();
            ctx.visual(VisualTier::Visible);
        })
        .runtime_logic(|ctx| {
            let [size] = ctx.pop_numbers()?;
            ctx.target_mut()?.scale = (size / 100.0).max(0.0);
            Ok(())
        })
        .finish();

    library
        .register_block("looks_changeeffectby")
        .compile_logic(|ctx| effect(ctx, "CHANGE"))
        .runtime_logic(|ctx| {
            let [name, change] = ctx.pop_values()?;
            let target = ctx.target_mut()?;
            target.filters.change(&name.cast_string(), change.cast_number());
            Ok(())
        })
        .finish();

    library
        .register_block("looks_seteffectto")
        .compile_logic(|ctx| effect(ctx, "VALUE"))
        .runtime_logic(|ctx| {
            let [name, value] = ctx.pop_values()?;
            let target = ctx.target_mut()?;
            target.filters.set(&name.cast_string(), value.cast_number());
            Ok(())
        })
        .finish();

    library
        .register_block("looks_cleargraphiceffects")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| {
            ctx.target_mut()?.filters = Default::default();
            Ok(())
        })
        .finish();

    library
        .register_block("looks_show")
        .compile_logic(visual_builtin(VisualTier::Always))
        .runtime_logic(|ctx| {
            ctx.target_mut()?.visible = true;
            Ok(())
        })
        .finish();

    // The check runs while the sprite is still visible.
    library
        .register_block("looks_hide")
        .compile_logic(|mut ctx| {
            ctx.visual(VisualTier::Visible);
            ctx.compiler.flush_visual();
            ctx.builtin();
        })
        .runtime_logic(|ctx| {
            ctx.target_mut()?.visible = false;
            Ok(())
        })
        .finish();

    library
        .register_block("looks_gotofrontback")
        .compile_logic(|mut ctx| {
            let front = &*ctx.field("FRONT_BACK") == "front";
            ctx.compiler.push_bool(front);
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let front = ctx.pop()?.cast_boolean();
            let id = ctx.target_id();
            let position = if front { usize::MAX } else { 0 };
            ctx.runtime_mut().move_layer(id, position);
            Ok(())
        })
        .finish();

    library
        .register_block("looks_goforwardbackwardlayers")
        .compile_logic(|mut ctx| {
            let forward = &*ctx.field("FORWARD_BACKWARD") == "forward";
            ctx.push_number("NUM");
            if !forward {
                ctx.compiler.push_number(-1.0);
                ctx.compiler.op(Opcode::Multiply);
            }
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [layers] = ctx.pop_numbers()?;
            let id = ctx.target_id();
            ctx.runtime_mut().shift_layer(id, layers);
            Ok(())
        })
        .finish();

    library
        .register_reporter("looks_costumenumbername")
        .compile_logic(|mut ctx| {
            ctx.push_field("NUMBER_NAME");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [which] = ctx.pop_strings()?;
            let target = ctx.target()?;
            let value = costume_number_or_name(&which, target);
            ctx.push(value);
            Ok(())
        })
        .finish();

    library
        .register_reporter("looks_backdropnumbername")
        .compile_logic(|mut ctx| {
            ctx.push_field("NUMBER_NAME");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [which] = ctx.pop_strings()?;
            let stage = ctx.stage();
            let value = costume_number_or_name(&which, stage);
            ctx.push(value);
            Ok(())
        })
        .finish();

    library
        .register_reporter("looks_size")
        .runtime_logic(|ctx| {
            let target = ctx.target()?;
            let size = if target.is_stage() { 100.0 } else { target.scale * 100.0 };
            ctx.push(size);
            Ok(())
        })
        .finish();

    library
        .register_reporter("looks_costume")
        .compile_logic(menu("COSTUME"))
        .finish();
    library
        .register_reporter("looks_backdrops")
        .compile_logic(menu("BACKDROP"))
        .finish();

    library.register_noops(&[
        "looks_changestretchby",
        "looks_setstretchto",
        "looks_hideallsprites",
    ]);
}

fn say(ctx: &mut RuntimeContext<'_>, thinking: bool) -> Result<(), RuntimeError> {
    let [message] = ctx.pop_strings()?;
    ctx.target_mut()?.say(message, thinking);
    Ok(())
}

fn begin_say_for_secs(ctx: &mut RuntimeContext<'_>, thinking: bool) -> Result<(), RuntimeError> {
    let [message, secs] = ctx.pop_values()?;
    let bubble = ctx.target_mut()?.say(message.cast_string(), thinking);
    let now = ctx.runtime().current_msecs();
    ctx.set_local(START, now);
    ctx.set_local(DURATION, secs.cast_number());
    ctx.set_local(BUBBLE, bubble as f64);
    Ok(())
}

/// Shows the bubble, waits without an initial yield, then takes the bubble
/// down again.
fn say_for_secs(mut ctx: CompileContext<'_, '_>) {
    ctx.compiler.op(Opcode::Save);
    ctx.builtin();
    ctx.visual(VisualTier::Visible);

    let check = ctx.compiler.label_here();
    let done = ctx.compiler.new_label();
    ctx.compiler.op_with(Opcode::WaitElapsed, START);
    ctx.compiler.jump(Opcode::JumpIfTrue, done);
    ctx.compiler.resume_at(Opcode::ForceQueue, check);
    ctx.compiler.place_label(done);

    ctx.call_helper("looks_sayforsecs.clear");
    ctx.compiler.op(Opcode::Restore);
    ctx.visual(VisualTier::Visible);
}

/// Switching backdrops starts `when backdrop switches to` scripts.
fn backdrop_change(mut ctx: CompileContext<'_, '_>) {
    ctx.builtin();
    ctx.visual(VisualTier::Always);
    ctx.compiler.op(Opcode::SceneChanged);
}

fn effect(mut ctx: CompileContext<'_, '_>, input: &str) {
    let name = ctx.field("EFFECT").to_lowercase();
    ctx.compiler.push_text(name.into());
    ctx.push_number(input);
    ctx.call_builtin();
    ctx.visual(VisualTier::Visible);
}

fn costume_number_or_name(which: &str, target: &Target) -> Value {
    if which == "number" {
        (target.current_costume + 1).into()
    } else {
        target.costume_name().into()
    }
}
