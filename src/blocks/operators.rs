use crate::{
    blocks::BlockLibrary,
    codegen::CompileContext,
    interpreter::opcode::{MathFunction, Opcode},
};

pub(super) fn register(library: &mut BlockLibrary) {
    for (opcode, op) in [
        ("operator_add", Opcode::Add),
        ("operator_subtract", Opcode::Subtract),
        ("operator_multiply", Opcode::Multiply),
        ("operator_divide", Opcode::Divide),
        ("operator_mod", Opcode::Mod),
    ] {
        library
            .register_reporter(opcode)
            .compile_logic(move |mut ctx| {
                ctx.push_number("NUM1");
                ctx.push_number("NUM2");
                ctx.compiler.op(op);
            })
            .finish();
    }

    library
        .register_reporter("operator_random")
        .compile_logic(|mut ctx| {
            ctx.push_input("FROM");
            ctx.push_input("TO");
            ctx.compiler.op(Opcode::Random);
        })
        .finish();

    library
        .register_reporter("operator_lt")
        .compile_logic(|ctx| comparison(ctx, Opcode::Lt, Opcode::NumLess))
        .finish();
    library
        .register_reporter("operator_gt")
        .compile_logic(|ctx| comparison(ctx, Opcode::Gt, Opcode::NumGreater))
        .finish();
    library
        .register_reporter("operator_equals")
        .compile_logic(|ctx| comparison(ctx, Opcode::Equals, Opcode::NumEquals))
        .finish();

    library
        .register_reporter("operator_and")
        .compile_logic(|mut ctx| {
            ctx.push_bool("OPERAND1");
            ctx.push_bool("OPERAND2");
            ctx.compiler.op(Opcode::And);
        })
        .finish();

    library
        .register_reporter("operator_or")
        .compile_logic(|mut ctx| {
            ctx.push_bool("OPERAND1");
            ctx.push_bool("OPERAND2");
            ctx.compiler.op(Opcode::Or);
        })
        .finish();

    library
        .register_reporter("operator_not")
        .compile_logic(|mut ctx| {
            ctx.push_bool("OPERAND");
            ctx.compiler.op(Opcode::Not);
        })
        .finish();

    library
        .register_reporter("operator_join")
        .compile_logic(|mut ctx| {
            ctx.push_string("STRING1");
            ctx.push_string("STRING2");
            ctx.compiler.op(Opcode::Join);
        })
        .finish();

    library
        .register_reporter("operator_letter_of")
        .compile_logic(|mut ctx| {
            ctx.push_number("LETTER");
            ctx.push_string("STRING");
            ctx.compiler.op(Opcode::LetterOf);
        })
        .finish();

    library
        .register_reporter("operator_length")
        .compile_logic(|mut ctx| {
            ctx.push_string("STRING");
            ctx.compiler.op(Opcode::Length);
        })
        .finish();

    library
        .register_reporter("operator_contains")
        .compile_logic(|mut ctx| {
            ctx.push_string("STRING1");
            ctx.push_string("STRING2");
            ctx.compiler.op(Opcode::Contains);
        })
        .finish();

    library
        .register_reporter("operator_round")
        .compile_logic(|mut ctx| {
            ctx.push_number("NUM");
            ctx.compiler.op(Opcode::Round);
        })
        .finish();

    library
        .register_reporter("operator_mathop")
        .compile_logic(|mut ctx| {
            let name = ctx.field("OPERATOR");
            match MathFunction::parse(&name.to_lowercase()) {
                Some(function) => {
                    ctx.push_number("NUM");
                    ctx.compiler.op_with(Opcode::MathOp, function.into());
                }
                None => {
                    ctx.warn(format!("unknown math function {name}"));
                    ctx.compiler.push_number(0.0);
                }
            }
        })
        .finish();
}

/// A number typed straight into the left slot skips the numeric check on
/// that side.
fn comparison(mut ctx: CompileContext<'_, '_>, general: Opcode, numeric: Opcode) {
    match ctx.input("OPERAND1").and_then(|input| input.literal_number()) {
        Some(left) => {
            ctx.compiler.push_number(left);
            ctx.push_input("OPERAND2");
            ctx.compiler.op(numeric);
        }
        None => {
            ctx.push_input("OPERAND1");
            ctx.push_input("OPERAND2");
            ctx.compiler.op(general);
        }
    }
}
