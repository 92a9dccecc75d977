use crate::{blocks::BlockLibrary, interpreter::opcode::Opcode};

pub(super) fn register(library: &mut BlockLibrary) {
    // Arguments are evaluated at the call site, in the prototype's order.
    library
        .register_block("procedures_call")
        .compile_logic(|mut ctx| {
            let block = ctx.block;
            let Some(mutation) = &block.mutation else {
                ctx.warn("procedures_call without a mutation");
                return;
            };
            for id in &mutation.argument_ids {
                ctx.push_input(id);
            }
            let argc = mutation.argument_ids.len() as u32;
            ctx.compiler.call(mutation.proc_code.clone(), argc);
        })
        .finish();

    // Outside the procedure that declares them, argument reporters read 0
    // or false.
    library
        .register_reporter("argument_reporter_string_number")
        .compile_logic(|ctx| {
            let name = ctx.block.field_value("VALUE").unwrap_or_default();
            match ctx.compiler.argument(name) {
                Some(index) => ctx.compiler.op_with(Opcode::PushArg, index),
                None => ctx.compiler.push_number(0.0),
            }
        })
        .finish();

    library
        .register_reporter("argument_reporter_boolean")
        .compile_logic(|ctx| {
            let name = ctx.block.field_value("VALUE").unwrap_or_default();
            match ctx.compiler.argument(name) {
                Some(index) => ctx.compiler.op_with(Opcode::PushArgBoolean, index),
                None => ctx.compiler.push_bool(false),
            }
        })
        .finish();
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::{Block, Field, Mutation},
        blocks::BlockLibrary,
        codegen::{ScriptCompiler, TargetContext},
        continuation::ScriptId,
        interpreter::{opcode::Opcode, target::DataTables},
    };

    #[test]
    fn arguments_resolve_by_name() {
        let (types, _) = BlockLibrary::default().split();
        let mut target = TargetContext::stage("Stage", DataTables::default());
        let mut compiler = ScriptCompiler::new(&mut target, Rc::new(types), "jump %s")
            .with_arguments(vec![Rc::from("height")].into());

        let height = Block::new("argument_reporter_string_number")
            .with_field("VALUE", Field::new("height"));
        let missing =
            Block::new("argument_reporter_boolean").with_field("VALUE", Field::new("missing"));
        compiler.push_block(&height);
        compiler.push_block(&missing);
        let script = compiler.finish(ScriptId::from(0), Opcode::EndCall).unwrap();

        let code = script.code();
        assert_eq!(code[..2], [u32::from(Opcode::PushArg), 0]);
        assert_eq!(code[2..4], [u32::from(Opcode::PushBool), 0]);
    }

    #[test]
    fn calls_push_arguments_in_prototype_order() {
        let (types, _) = BlockLibrary::default().split();
        let mut target = TargetContext::stage("Stage", DataTables::default());
        let mut compiler = ScriptCompiler::new(&mut target, Rc::new(types), "test");

        let mut call = Block::new("procedures_call")
            .with_input("b", Block::number("2"))
            .with_input("a", Block::text("first"));
        call.mutation = Some(Mutation {
            proc_code: "go %s %n".into(),
            argument_ids: vec!["a".into(), "b".into()],
            warp: false,
        });
        compiler.compile_statement(&call);
        let script = compiler.finish(ScriptId::from(0), Opcode::End).unwrap();

        let code = script.code();
        assert_eq!(code[0], u32::from(Opcode::PushConstant));
        assert_eq!(code[2], u32::from(Opcode::PushNumber));
        assert_eq!(code[5], u32::from(Opcode::Call));
        assert_eq!(code[7], 2);
    }
}
