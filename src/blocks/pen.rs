use crate::{
    blocks::{BlockLibrary, inputs, menu, visual_builtin},
    codegen::CompileContext,
    error::RuntimeError,
    interpreter::{
        RuntimeContext,
        opcode::{Opcode, VisualTier},
        value::parse_color,
    },
};

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("pen_clear")
        .compile_logic(visual_builtin(VisualTier::Always))
        .runtime_logic(|ctx| {
            ctx.runtime_mut().pen_clear();
            Ok(())
        })
        .finish();

    library
        .register_block("pen_stamp")
        .compile_logic(visual_builtin(VisualTier::Always))
        .runtime_logic(|ctx| {
            let id = ctx.target_id();
            ctx.runtime_mut().pen_stamp(id);
            Ok(())
        })
        .finish();

    library
        .register_block("pen_penDown")
        .compile_logic(visual_builtin(VisualTier::Always))
        .runtime_logic(|ctx| {
            ctx.target_mut()?.pen.down = true;
            let id = ctx.target_id();
            ctx.runtime_mut().pen_dot(id);
            Ok(())
        })
        .finish();

    // A pending pen-aware check has to see the pen before it lifts.
    library
        .register_block("pen_penUp")
        .compile_logic(|mut ctx| {
            ctx.compiler.flush_visual();
            ctx.builtin();
        })
        .runtime_logic(|ctx| {
            ctx.target_mut()?.pen.down = false;
            Ok(())
        })
        .finish();

    library
        .register_block("pen_setPenColorToColor")
        .runtime_logic(|ctx| {
            let color = parse_color(&ctx.pop()?);
            ctx.target_mut()?.pen.color.set_rgba(color);
            Ok(())
        })
        .inputs_order(inputs(["COLOR"]))
        .finish();

    library
        .register_block("pen_setPenColorParamTo")
        .compile_logic(|mut ctx| {
            ctx.push_string("COLOR_PARAM");
            ctx.push_number("VALUE");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [param, value] = ctx.pop_values()?;
            let param = param.cast_string().to_lowercase();
            ctx.target_mut()?.pen.color.set_param(&param, value.cast_number());
            Ok(())
        })
        .finish();

    library
        .register_block("pen_changePenColorParamBy")
        .compile_logic(|mut ctx| {
            ctx.push_string("COLOR_PARAM");
            ctx.push_number("VALUE");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [param, delta] = ctx.pop_values()?;
            let param = param.cast_string().to_lowercase();
            ctx.target_mut()?.pen.color.change_param(&param, delta.cast_number());
            Ok(())
        })
        .finish();

    // Scratch 2 hue (0..200) and shade blocks map onto the colour and
    // brightness parameters.
    library
        .register_block("pen_setPenHueToNumber")
        .compile_logic(|ctx| legacy_param(ctx, "color", "HUE", 0.5))
        .runtime_logic(|ctx| set_param(ctx, false))
        .finish();
    library
        .register_block("pen_changePenHueBy")
        .compile_logic(|ctx| legacy_param(ctx, "color", "HUE", 0.5))
        .runtime_logic(|ctx| set_param(ctx, true))
        .finish();
    library
        .register_block("pen_setPenShadeToNumber")
        .compile_logic(|ctx| legacy_param(ctx, "brightness", "SHADE", 1.0))
        .runtime_logic(|ctx| set_param(ctx, false))
        .finish();
    library
        .register_block("pen_changePenShadeBy")
        .compile_logic(|ctx| legacy_param(ctx, "brightness", "SHADE", 1.0))
        .runtime_logic(|ctx| set_param(ctx, true))
        .finish();

    library
        .register_block("pen_setPenSizeTo")
        .compile_logic(|mut ctx| {
            ctx.push_number("SIZE");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [size] = ctx.pop_numbers()?;
            ctx.target_mut()?.pen.size = size.max(1.0);
            Ok(())
        })
        .finish();

    library
        .register_block("pen_changePenSizeBy")
        .compile_logic(|mut ctx| {
            ctx.push_number("SIZE");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [delta] = ctx.pop_numbers()?;
            let pen = &mut ctx.target_mut()?.pen;
            pen.size = (pen.size + delta).max(1.0);
            Ok(())
        })
        .finish();

    library
        .register_reporter("pen_menu_colorParam")
        .compile_logic(menu("colorParam"))
        .finish();
}

fn legacy_param(mut ctx: CompileContext<'_, '_>, param: &str, input: &str, scale: f64) {
    ctx.compiler.push_text(param.into());
    ctx.push_number(input);
    if scale != 1.0 {
        ctx.compiler.push_number(scale);
        ctx.compiler.op(Opcode::Multiply);
    }
    ctx.call_builtin();
}

fn set_param(ctx: &mut RuntimeContext<'_>, change: bool) -> Result<(), RuntimeError> {
    let [param, value] = ctx.pop_values()?;
    let param = param.cast_string();
    let color = &mut ctx.target_mut()?.pen.color;
    if change {
        color.change_param(&param, value.cast_number());
    } else {
        color.set_param(&param, value.cast_number());
    }
    Ok(())
}
