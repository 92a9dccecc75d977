use time::OffsetDateTime;

use crate::{
    blocks::{BlockLibrary, inputs, menu},
    interpreter::{
        event::KeyCode,
        opcode::{Opcode, VisualTier},
        target::Target,
        value::{Value, parse_color},
    },
};

/// Position in the prompt queue.
const TICKET: u32 = 0;
/// Id of the bubble showing the question, if a sprite asked.
const BUBBLE: u32 = 1;

/// 2000-01-01T00:00:00Z in Unix milliseconds.
const EPOCH_2000_MS: f64 = 946_684_800_000.0;

pub(super) fn register(library: &mut BlockLibrary) {
    // Waits for every earlier question to be answered, asks, then waits for
    // its own answer.
    library
        .register_block("sensing_askandwait")
        .compile_logic(|mut ctx| {
            ctx.compiler.op(Opcode::Save);
            ctx.call_helper("sensing_askandwait.ticket");
            ctx.compiler.op_with(Opcode::SetLocal, TICKET);

            let turn = ctx.compiler.label_here();
            let ask = ctx.compiler.new_label();
            ctx.call_helper("sensing_askandwait.turn");
            ctx.compiler.op_with(Opcode::PushLocal, TICKET);
            ctx.compiler.op(Opcode::Lt);
            ctx.compiler.jump(Opcode::JumpIfFalse, ask);
            ctx.compiler.resume_at(Opcode::ForceQueue, turn);
            ctx.compiler.place_label(ask);

            ctx.push_string("QUESTION");
            ctx.call_builtin();

            let answered = ctx.compiler.label_here();
            let done = ctx.compiler.new_label();
            ctx.call_helper("sensing_askandwait.turn");
            ctx.compiler.op_with(Opcode::PushLocal, TICKET);
            ctx.compiler.op(Opcode::Equals);
            ctx.compiler.jump(Opcode::JumpIfFalse, done);
            ctx.compiler.resume_at(Opcode::ForceQueue, answered);
            ctx.compiler.place_label(done);

            ctx.call_helper("sensing_askandwait.done");
            ctx.compiler.op(Opcode::Restore);
            ctx.visual(VisualTier::Always);
        })
        .runtime_logic(|ctx| {
            let [question] = ctx.pop_strings()?;
            let target = ctx.target_mut()?;
            let bubble = if !question.is_empty() && target.visible && !target.is_stage() {
                Some(target.say(question.clone(), false))
            } else {
                None
            };

            let io = ctx.runtime_mut().io_mut();
            io.question = match bubble {
                None if !question.is_empty() => Some(question),
                _ => None,
            };
            io.prompt_visible = true;
            ctx.set_local(BUBBLE, bubble.map_or(-1.0, |id| id as f64));
            ctx.set_visual();
            Ok(())
        })
        .finish();

    library
        .register_block("sensing_askandwait.ticket")
        .runtime_logic(|ctx| {
            let io = ctx.runtime_mut().io_mut();
            let ticket = io.next_prompt_id;
            io.next_prompt_id += 1;
            ctx.push(ticket as f64);
            Ok(())
        })
        .finish();

    library
        .register_block("sensing_askandwait.turn")
        .runtime_logic(|ctx| {
            let turn = ctx.runtime().io().prompt_id;
            ctx.push(turn as f64);
            Ok(())
        })
        .finish();

    library
        .register_block("sensing_askandwait.done")
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
        .register_block("sensing_setdragmode")
        .compile_logic(|mut ctx| {
            let draggable = &*ctx.field("DRAG_MODE") == "draggable";
            ctx.compiler.push_bool(draggable);
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let draggable = ctx.pop()?.cast_boolean();
            ctx.target_mut()?.draggable = draggable;
            Ok(())
        })
        .finish();

    library
        .register_block("sensing_resettimer")
        .runtime_logic(|ctx| {
            ctx.runtime_mut().reset_timer();
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_touchingobject")
        .runtime_logic(|ctx| {
            let [what] = ctx.pop_strings()?;
            let id = ctx.target_id();
            let touching = ctx.runtime_mut().touching(id, &what);
            ctx.push(touching);
            Ok(())
        })
        .inputs_order(inputs(["TOUCHINGOBJECTMENU"]))
        .finish();

    library
        .register_reporter("sensing_touchingcolor")
        .runtime_logic(|ctx| {
            let color = parse_color(&ctx.pop()?);
            let id = ctx.target_id();
            let touching = ctx.runtime_mut().touching_color(id, color);
            ctx.push(touching);
            Ok(())
        })
        .inputs_order(inputs(["COLOR"]))
        .finish();

    library
        .register_reporter("sensing_coloristouchingcolor")
        .runtime_logic(|ctx| {
            let [mask, color] = ctx.pop_values()?;
            let id = ctx.target_id();
            let touching =
                ctx.runtime_mut()
                    .color_touching_color(id, parse_color(&mask), parse_color(&color));
            ctx.push(touching);
            Ok(())
        })
        .inputs_order(inputs(["COLOR", "COLOR2"]))
        .finish();

    library
        .register_reporter("sensing_distanceto")
        .runtime_logic(|ctx| {
            let [what] = ctx.pop_strings()?;
            let runtime = ctx.runtime();
            let other = match &*what {
                "_mouse_" => Some(runtime.io().mouse),
                name => runtime
                    .sprite(name)
                    .and_then(|id| runtime.target(id).ok())
                    .map(|sprite| sprite.position),
            };
            let distance = match other {
                Some(other) => ctx.target()?.position.distance(other),
                None => 10000.0,
            };
            ctx.push(distance);
            Ok(())
        })
        .inputs_order(inputs(["DISTANCETOMENU"]))
        .finish();

    library
        .register_reporter("sensing_answer")
        .runtime_logic(|ctx| {
            let answer = ctx.runtime().io().answer.clone();
            ctx.push(answer);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_keypressed")
        .runtime_logic(|ctx| {
            let [key] = ctx.pop_strings()?;
            let down = KeyCode::from_name(&key).is_some_and(|key| ctx.runtime().is_key_down(key));
            ctx.push(down);
            Ok(())
        })
        .inputs_order(inputs(["KEY_OPTION"]))
        .finish();

    library
        .register_reporter("sensing_mousedown")
        .runtime_logic(|ctx| {
            let down = ctx.runtime().io().mouse_down;
            ctx.push(down);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_mousex")
        .runtime_logic(|ctx| {
            let x = ctx.runtime().io().mouse.x;
            ctx.push(x);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_mousey")
        .runtime_logic(|ctx| {
            let y = ctx.runtime().io().mouse.y;
            ctx.push(y);
            Ok(())
        })
        .finish();

    // No microphone.
    library
        .register_reporter("sensing_loudness")
        .compile_logic(|ctx| ctx.compiler.push_number(-1.0))
        .finish();
    library
        .register_reporter("sensing_loud")
        .compile_logic(|ctx| ctx.compiler.push_bool(false))
        .finish();

    library
        .register_reporter("sensing_timer")
        .runtime_logic(|ctx| {
            let timer = ctx.runtime().timer();
            ctx.push(timer);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_of")
        .compile_logic(|mut ctx| {
            ctx.push_field("PROPERTY");
            ctx.push_string("OBJECT");
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [property, object] = ctx.pop_strings()?;
            let runtime = ctx.runtime();
            let value = runtime
                .object(&object)
                .and_then(|id| runtime.target(id).ok())
                .map_or(Value::Number(0.0), |target| attribute(target, &property));
            ctx.push(value);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_current")
        .compile_logic(|mut ctx| {
            let part = ctx.field("CURRENTMENU").to_lowercase();
            ctx.compiler.push_text(part.into());
            ctx.call_builtin();
        })
        .runtime_logic(|ctx| {
            let [part] = ctx.pop_strings()?;
            ctx.push(current(&part));
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_dayssince2000")
        .runtime_logic(|ctx| {
            let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e6;
            ctx.push((now_ms - EPOCH_2000_MS) / 86_400_000.0);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_username")
        .runtime_logic(|ctx| {
            let username = ctx.runtime().settings().username.clone();
            ctx.push(username);
            Ok(())
        })
        .finish();

    library
        .register_reporter("sensing_userid")
        .compile_logic(|ctx| ctx.compiler.push_text("undefined".into()))
        .finish();

    library
        .register_reporter("sensing_touchingobjectmenu")
        .compile_logic(menu("TOUCHINGOBJECTMENU"))
        .finish();
    library
        .register_reporter("sensing_distancetomenu")
        .compile_logic(menu("DISTANCETOMENU"))
        .finish();
    library
        .register_reporter("sensing_keyoptions")
        .compile_logic(menu("KEY_OPTION"))
        .finish();
    library
        .register_reporter("sensing_of_object_menu")
        .compile_logic(menu("OBJECT"))
        .finish();
}

/// `[property] of [object]`. Unknown properties read the object's variable
/// of that name, then 0.
fn attribute(target: &Target, property: &str) -> Value {
    let builtin: Option<Value> = if target.is_stage() {
        match property {
            "background #" | "backdrop #" => Some((target.current_costume + 1).into()),
            "backdrop name" => Some(target.costume_name().into()),
            "volume" => Some((target.volume * 100.0).into()),
            _ => None,
        }
    } else {
        match property {
            "x position" => Some(target.position.x.into()),
            "y position" => Some(target.position.y.into()),
            "direction" => Some(target.direction.into()),
            "costume #" => Some((target.current_costume + 1).into()),
            "costume name" => Some(target.costume_name().into()),
            "size" => Some((target.scale * 100.0).into()),
            "volume" => Some((target.volume * 100.0).into()),
            _ => None,
        }
    };

    builtin.unwrap_or_else(|| {
        target
            .data
            .variable_by_name(property)
            .map_or(Value::Number(0.0), |var| var.value.clone())
    })
}

/// A part of the current local date and time.
fn current(part: &str) -> f64 {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    match part {
        "year" => now.year().into(),
        "month" => u8::from(now.month()).into(),
        "date" => now.day().into(),
        "dayofweek" => now.weekday().number_from_sunday().into(),
        "hour" => now.hour().into(),
        "minute" => now.minute().into(),
        "second" => now.second().into(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::target::TargetKind;

    #[test]
    fn attributes_of_sprites_and_the_stage() {
        let mut sprite = Target::new("Cat", TargetKind::Sprite);
        sprite.position.x = 12.0;
        sprite.data.add_variable("v".into(), "lives".into(), Value::Number(3.0));

        assert_eq!(attribute(&sprite, "x position"), Value::Number(12.0));
        assert_eq!(attribute(&sprite, "lives"), Value::Number(3.0));
        assert_eq!(attribute(&sprite, "missing"), Value::Number(0.0));

        let stage = Target::new("Stage", TargetKind::Stage);
        assert_eq!(attribute(&stage, "backdrop #"), Value::Number(1.0));
        assert_eq!(attribute(&stage, "x position"), Value::Number(0.0));
    }

    #[test]
    fn unknown_date_parts_are_zero() {
        assert_eq!(current("fortnight"), 0.0);
        assert!(current("year") >= 2000.0);
    }
}
