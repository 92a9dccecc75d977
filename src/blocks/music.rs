use crate::{
    blocks::{BlockLibrary, menu},
    codegen::CompileContext,
    interpreter::opcode::Opcode,
};

const MIN_TEMPO: f64 = 20.0;
const MAX_TEMPO: f64 = 500.0;
/// Instruments and drums are numbered from 1 in blocks.
const INSTRUMENTS: f64 = 21.0;
const DRUMS: f64 = 18.0;

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("music_playNoteForBeats")
        .compile_logic(|ctx| play_for_beats(ctx, "NOTE"))
        .runtime_logic(|ctx| {
            let [key, beats] = ctx.pop_numbers()?;
            let volume = ctx.target()?.volume;
            let instrument = ctx.target()?.instrument;
            let runtime = ctx.runtime_mut();
            let duration = beats_to_secs(beats, runtime.io().tempo);
            runtime.audio().play_span(instrument, key, duration, volume);
            ctx.push(duration);
            Ok(())
        })
        .finish();

    library
        .register_block("music_playDrumForBeats")
        .compile_logic(|ctx| play_for_beats(ctx, "DRUM"))
        .runtime_logic(|ctx| {
            let [drum, beats] = ctx.pop_numbers()?;
            let volume = ctx.target()?.volume;
            let runtime = ctx.runtime_mut();
            let duration = beats_to_secs(beats, runtime.io().tempo);
            let drum = drum.round().clamp(1.0, DRUMS) as usize - 1;
            runtime.audio().play_drum(drum, duration, volume);
            ctx.push(duration);
            Ok(())
        })
        .finish();

    library
        .register_block("music_restForBeats")
        .compile_logic(|ctx| {
            let beats = ctx.input("BEATS");
            let id = ctx.ty.id();
            ctx.compiler.wait_seconds(|compiler| {
                compiler.push_number_input(beats);
                compiler.op_with(Opcode::CallBuiltin, id);
            });
        })
        .runtime_logic(|ctx| {
            let [beats] = ctx.pop_numbers()?;
            let duration = beats_to_secs(beats, ctx.runtime().io().tempo);
            ctx.push(duration);
            Ok(())
        })
        .finish();

    library
        .register_block("music_setTempo")
        .compile_logic(|mut ctx| {
            ctx.push_number("TEMPO");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [tempo] = ctx.pop_numbers()?;
            ctx.runtime_mut().io_mut().tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
            Ok(())
        })
        .finish();

    library
        .register_block("music_changeTempo")
        .compile_logic(|mut ctx| {
            ctx.push_number("TEMPO");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [delta] = ctx.pop_numbers()?;
            let io = ctx.runtime_mut().io_mut();
            io.tempo = (io.tempo + delta).clamp(MIN_TEMPO, MAX_TEMPO);
            Ok(())
        })
        .finish();

    library
        .register_block("music_setInstrument")
        .compile_logic(|mut ctx| {
            ctx.push_number("INSTRUMENT");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [instrument] = ctx.pop_numbers()?;
            let instrument = instrument.round().clamp(1.0, INSTRUMENTS) as usize - 1;
            ctx.target_mut()?.instrument = instrument;
            Ok(())
        })
        .finish();

    library
        .register_reporter("music_getTempo")
        .runtime_logic(|ctx| {
            let tempo = ctx.runtime().io().tempo;
            ctx.push(tempo);
            Ok(())
        })
        .finish();

    library
        .register_reporter("music_menu_DRUM")
        .compile_logic(menu("DRUM"))
        .finish();
    library
        .register_reporter("music_menu_INSTRUMENT")
        .compile_logic(menu("INSTRUMENT"))
        .finish();
}

fn beats_to_secs(beats: f64, tempo: f64) -> f64 {
    beats * 60.0 / tempo
}

/// Plays, then waits for as long as the runtime logic reports.
fn play_for_beats(ctx: CompileContext<'_, '_>, sound: &str) {
    let sound = ctx.input(sound);
    let beats = ctx.input("BEATS");
    let id = ctx.ty.id();
    ctx.compiler.wait_seconds(|compiler| {
        compiler.push_number_input(sound);
        compiler.push_number_input(beats);
        compiler.op_with(Opcode::CallBuiltin, id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_follow_the_tempo() {
        assert_eq!(beats_to_secs(1.0, 60.0), 1.0);
        assert_eq!(beats_to_secs(0.5, 120.0), 0.25);
    }
}
