use std::f64::consts::PI;

use crate::{
    blocks::{BlockLibrary, inputs, menu, visual_builtin},
    codegen::CompileContext,
    error::RuntimeError,
    interpreter::{
        RuntimeContext,
        opcode::{Opcode, VisualTier},
        target::{Point, RotationStyle},
    },
};

// Locals used while gliding.
const START: u32 = 0;
const DURATION: u32 = 1;
const BASE_X: u32 = 2;
const BASE_Y: u32 = 3;
const DELTA_X: u32 = 4;
const DELTA_Y: u32 = 5;

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("motion_movesteps")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [steps] = ctx.pop_numbers()?;
            let target = ctx.target()?;
            let radians = (90.0 - target.direction) * PI / 180.0;
            let to = Point::new(
                target.position.x + steps * radians.cos(),
                target.position.y + steps * radians.sin(),
            );
            move_to(ctx, to);
            Ok(())
        })
        .inputs_order(inputs(["STEPS"]))
        .finish();

    library
        .register_block("motion_turnright")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| turn(ctx, 1.0))
        .inputs_order(inputs(["DEGREES"]))
        .finish();

    library
        .register_block("motion_turnleft")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| turn(ctx, -1.0))
        .inputs_order(inputs(["DEGREES"]))
        .finish();

    library
        .register_block("motion_goto")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [to] = ctx.pop_strings()?;
            if let Some(to) = ctx.runtime_mut().position_of(&to) {
                move_to(ctx, to);
            }
            Ok(())
        })
        .inputs_order(inputs(["TO"]))
        .finish();

    library
        .register_block("motion_gotoxy")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [x, y] = ctx.pop_numbers()?;
            move_to(ctx, Point::new(x, y));
            Ok(())
        })
        .inputs_order(inputs(["X", "Y"]))
        .finish();

    library
        .register_block("motion_glideto")
        .compile_logic(glide)
        .runtime_logic(|ctx| {
            let [secs, to] = ctx.pop_values()?;
            let to = ctx.runtime_mut().position_of(&to.cast_string());
            match to {
                Some(to) => {
                    begin_glide(ctx, secs.cast_number(), to)?;
                    ctx.push(true);
                }
                None => ctx.push(false),
            }
            Ok(())
        })
        .inputs_order(inputs(["SECS", "TO"]))
        .finish();

    library
        .register_block("motion_glidesecstoxy")
        .compile_logic(glide)
        .runtime_logic(|ctx| {
            let [secs, x, y] = ctx.pop_numbers()?;
            begin_glide(ctx, secs, Point::new(x, y))?;
            ctx.push(true);
            Ok(())
        })
        .inputs_order(inputs(["SECS", "X", "Y"]))
        .finish();

    library
        .register_block("motion_glide.step")
        .runtime_logic(|ctx| {
            let elapsed = ctx.runtime().current_msecs() - ctx.local(START).cast_number();
            let duration = ctx.local(DURATION).cast_number() * 1000.0;
            let fraction = (elapsed / duration).min(1.0);
            let fraction = if fraction.is_nan() || duration <= 0.0 { 1.0 } else { fraction };

            let base = Point::new(
                ctx.local(BASE_X).cast_number(),
                ctx.local(BASE_Y).cast_number(),
            );
            let to = Point::new(
                base.x + fraction * ctx.local(DELTA_X).cast_number(),
                base.y + fraction * ctx.local(DELTA_Y).cast_number(),
            );
            move_to(ctx, to);
            ctx.push(fraction < 1.0);
            Ok(())
        })
        .finish();

    library
        .register_block("motion_pointindirection")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| {
            let [direction] = ctx.pop_numbers()?;
            ctx.target_mut()?.set_direction(direction);
            Ok(())
        })
        .inputs_order(inputs(["DIRECTION"]))
        .finish();

    library
        .register_block("motion_pointtowards")
        .compile_logic(visual_builtin(VisualTier::Visible))
        .runtime_logic(|ctx| {
            let [towards] = ctx.pop_strings()?;
            let Some(at) = ctx.runtime_mut().position_of(&towards) else {
                return Ok(());
            };
            let target = ctx.target_mut()?;
            let dx = at.x - target.position.x;
            let dy = at.y - target.position.y;
            target.direction = if dx == 0.0 && dy == 0.0 {
                90.0
            } else {
                dx.atan2(dy) * 180.0 / PI
            };
            Ok(())
        })
        .inputs_order(inputs(["TOWARDS"]))
        .finish();

    library
        .register_block("motion_changexby")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [dx] = ctx.pop_numbers()?;
            let at = ctx.target()?.position;
            move_to(ctx, Point::new(at.x + dx, at.y));
            Ok(())
        })
        .inputs_order(inputs(["DX"]))
        .finish();

    library
        .register_block("motion_setx")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [x] = ctx.pop_numbers()?;
            let at = ctx.target()?.position;
            move_to(ctx, Point::new(x, at.y));
            Ok(())
        })
        .inputs_order(inputs(["X"]))
        .finish();

    library
        .register_block("motion_changeyby")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [dy] = ctx.pop_numbers()?;
            let at = ctx.target()?.position;
            move_to(ctx, Point::new(at.x, at.y + dy));
            Ok(())
        })
        .inputs_order(inputs(["DY"]))
        .finish();

    library
        .register_block("motion_sety")
        .compile_logic(visual_builtin(VisualTier::Drawing))
        .runtime_logic(|ctx| {
            let [y] = ctx.pop_numbers()?;
            let at = ctx.target()?.position;
            move_to(ctx, Point::new(at.x, y));
            Ok(())
        })
        .inputs_order(inputs(["Y"]))
        .finish();

    // Whether the sprite bounced is only known at runtime, so this block
    // never marks the frame as visual on its own.
    library
        .register_block("motion_ifonedgebounce")
        .runtime_logic(|ctx| {
            ctx.target_mut()?.bounce_off_edge();
            Ok(())
        })
        .finish();

    library
        .register_block("motion_setrotationstyle")
        .compile_logic(|mut ctx| {
            let style = ctx.field("STYLE");
            match RotationStyle::parse(&style) {
                Some(style) => {
                    let index = match style {
                        RotationStyle::AllAround => 0.0,
                        RotationStyle::LeftRight => 1.0,
                        RotationStyle::DontRotate => 2.0,
                    };
                    ctx.compiler.push_number(index);
                    ctx.call_builtin();
                    ctx.visual(VisualTier::Visible);
                }
                None => ctx.warn(format!("unknown rotation style {style}")),
            }
        })
        .runtime_logic(|ctx| {
            let [style] = ctx.pop_numbers()?;
            ctx.target_mut()?.rotation_style = match style as u32 {
                1 => RotationStyle::LeftRight,
                2 => RotationStyle::DontRotate,
                _ => RotationStyle::AllAround,
            };
            Ok(())
        })
        .finish();

    library
        .register_reporter("motion_xposition")
        .runtime_logic(|ctx| {
            let x = ctx.target()?.position.x;
            ctx.push(x);
            Ok(())
        })
        .finish();

    library
        .register_reporter("motion_yposition")
        .runtime_logic(|ctx| {
            let y = ctx.target()?.position.y;
            ctx.push(y);
            Ok(())
        })
        .finish();

    library
        .register_reporter("motion_direction")
        .runtime_logic(|ctx| {
            let direction = ctx.target()?.direction;
            ctx.push(direction);
            Ok(())
        })
        .finish();

    library
        .register_reporter("motion_goto_menu")
        .compile_logic(menu("TO"))
        .finish();
    library
        .register_reporter("motion_glideto_menu")
        .compile_logic(menu("TO"))
        .finish();
    library
        .register_reporter("motion_pointtowards_menu")
        .compile_logic(menu("TOWARDS"))
        .finish();

    library.register_noops(&["motion_scroll_right", "motion_scroll_up", "motion_align_scene"]);
    for opcode in ["motion_xscroll", "motion_yscroll"] {
        library
            .register_reporter(opcode)
            .compile_logic(|ctx| ctx.compiler.push_text("undefined".into()))
            .finish();
    }
}

fn move_to(ctx: &mut RuntimeContext<'_>, to: Point) {
    let id = ctx.target_id();
    ctx.runtime_mut().move_to(id, to);
}

fn turn(ctx: &mut RuntimeContext<'_>, sign: f64) -> Result<(), RuntimeError> {
    let [degrees] = ctx.pop_numbers()?;
    let target = ctx.target_mut()?;
    let direction = target.direction + sign * degrees;
    target.set_direction(direction);
    Ok(())
}

fn begin_glide(ctx: &mut RuntimeContext<'_>, secs: f64, to: Point) -> Result<(), RuntimeError> {
    let base = ctx.target()?.position;
    let now = ctx.runtime().current_msecs();
    ctx.set_local(START, now);
    ctx.set_local(DURATION, secs);
    ctx.set_local(BASE_X, base.x);
    ctx.set_local(BASE_Y, base.y);
    ctx.set_local(DELTA_X, to.x - base.x);
    ctx.set_local(DELTA_Y, to.y - base.y);
    Ok(())
}

/// Moves on the first pass already, then once per frame until the glide's
/// duration is over.
fn glide(mut ctx: CompileContext<'_, '_>) {
    ctx.visual(VisualTier::Drawing);
    ctx.compiler.op(Opcode::Save);
    ctx.builtin();

    let done = ctx.compiler.new_label();
    ctx.compiler.jump(Opcode::JumpIfFalse, done);
    let step = ctx.compiler.label_here();
    ctx.call_helper("motion_glide.step");
    ctx.visual(VisualTier::Drawing);
    ctx.compiler.jump(Opcode::JumpIfFalse, done);
    ctx.compiler.resume_at(Opcode::ForceQueue, step);
    ctx.compiler.place_label(done);
    ctx.compiler.op(Opcode::Restore);
}
