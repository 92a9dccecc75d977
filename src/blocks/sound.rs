use crate::{
    blocks::{BlockLibrary, inputs, menu},
    interpreter::opcode::Opcode,
};

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("sound_play")
        .runtime_logic(|ctx| {
            let sound = ctx.pop()?;
            let id = ctx.target_id();
            ctx.runtime_mut().play_sound(id, &sound);
            Ok(())
        })
        .inputs_order(inputs(["SOUND_MENU"]))
        .finish();

    // Waits for as long as the sound lasts, and not at all for a sound that
    // doesn't exist.
    library
        .register_block("sound_playuntildone")
        .compile_logic(|mut ctx| {
            ctx.compiler.op(Opcode::Save);
            ctx.builtin();
            let done = ctx.compiler.new_label();
            ctx.compiler.jump(Opcode::JumpIfFalse, done);
            ctx.compiler.wait_elapsed();
            ctx.compiler.place_label(done);
            ctx.compiler.op(Opcode::Restore);
        })
        .runtime_logic(|ctx| {
            let sound = ctx.pop()?;
            let id = ctx.target_id();
            match ctx.runtime_mut().play_sound(id, &sound) {
                Some(duration) => {
                    let now = ctx.runtime().current_msecs();
                    ctx.set_local(0, now);
                    ctx.set_local(1, duration);
                    ctx.push(true);
                }
                None => ctx.push(false),
            }
            Ok(())
        })
        .inputs_order(inputs(["SOUND_MENU"]))
        .finish();

    library
        .register_block("sound_stopallsounds")
        .runtime_logic(|ctx| {
            ctx.runtime_mut().audio().stop_all();
            Ok(())
        })
        .finish();

    library
        .register_block("sound_changevolumeby")
        .compile_logic(|mut ctx| {
            ctx.push_number("VOLUME");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [delta] = ctx.pop_numbers()?;
            let target = ctx.target_mut()?;
            let volume = target.volume * 100.0 + delta;
            target.set_volume(volume);
            Ok(())
        })
        .finish();

    library
        .register_block("sound_setvolumeto")
        .compile_logic(|mut ctx| {
            ctx.push_number("VOLUME");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [volume] = ctx.pop_numbers()?;
            ctx.target_mut()?.set_volume(volume);
            Ok(())
        })
        .finish();

    library
        .register_block("sound_seteffectto")
        .compile_logic(|mut ctx| {
            if ctx.field("EFFECT").eq_ignore_ascii_case("pitch") {
                ctx.push_number("VALUE");
                ctx.call_builtin();
            }
        })
        .runtime_logic(|ctx| {
            let [pitch] = ctx.pop_numbers()?;
            ctx.target_mut()?.set_pitch(pitch);
            Ok(())
        })
        .finish();

    library
        .register_block("sound_changeeffectby")
        .compile_logic(|mut ctx| {
            if ctx.field("EFFECT").eq_ignore_ascii_case("pitch") {
                ctx.push_number("VALUE");
                ctx.call_builtin();
            }
        })
        .runtime_logic(|ctx| {
            let [delta] = ctx.pop_numbers()?;
            let target = ctx.target_mut()?;
            let pitch = target.pitch + delta;
            target.set_pitch(pitch);
            Ok(())
        })
        .finish();

    library
        .register_block("sound_cleareffects")
        .runtime_logic(|ctx| {
            ctx.target_mut()?.set_pitch(0.0);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sound_volume")
        .runtime_logic(|ctx| {
            let volume = ctx.target()?.volume * 100.0;
            ctx.push(volume);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sound_sounds_menu")
        .compile_logic(menu("SOUND_MENU"))
        .finish();
}
