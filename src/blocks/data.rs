use crate::{
    blocks::BlockLibrary,
    codegen::CompileContext,
    interpreter::{opcode::Opcode, value::Value},
};

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("data_setvariableto")
        .compile_logic(|mut ctx| {
            let Some(var) = variable(&mut ctx) else { return };
            ctx.push_input("VALUE");
            ctx.compiler.op_with(Opcode::SetVar, var);
        })
        .finish();

    library
        .register_block("data_changevariableby")
        .compile_logic(|mut ctx| {
            let Some(var) = variable(&mut ctx) else { return };
            ctx.push_number("VALUE");
            ctx.compiler.op_with(Opcode::ChangeVar, var);
        })
        .finish();

    library
        .register_block("data_showvariable")
        .compile_logic(|mut ctx| {
            if let Some(var) = variable(&mut ctx) {
                ctx.compiler.op_with_operands(Opcode::VarWatch, &[var, 1]);
            }
        })
        .finish();

    library
        .register_block("data_hidevariable")
        .compile_logic(|mut ctx| {
            if let Some(var) = variable(&mut ctx) {
                ctx.compiler.op_with_operands(Opcode::VarWatch, &[var, 0]);
            }
        })
        .finish();

    library
        .register_block("data_showlist")
        .compile_logic(|mut ctx| {
            if let Some(list) = list(&mut ctx) {
                ctx.compiler.op_with_operands(Opcode::ListWatch, &[list, 1]);
            }
        })
        .finish();

    library
        .register_block("data_hidelist")
        .compile_logic(|mut ctx| {
            if let Some(list) = list(&mut ctx) {
                ctx.compiler.op_with_operands(Opcode::ListWatch, &[list, 0]);
            }
        })
        .finish();

    library
        .register_block("data_addtolist")
        .compile_logic(|mut ctx| {
            let Some(list) = list(&mut ctx) else { return };
            ctx.push_input("ITEM");
            ctx.compiler.op_with(Opcode::ListAdd, list);
        })
        .finish();

    library
        .register_block("data_deleteoflist")
        .compile_logic(|mut ctx| {
            let Some(list) = list(&mut ctx) else { return };
            ctx.push_input("INDEX");
            ctx.compiler.op_with(Opcode::ListDelete, list);
        })
        .finish();

    library
        .register_block("data_deletealloflist")
        .compile_logic(|mut ctx| {
            if let Some(list) = list(&mut ctx) {
                ctx.compiler.op_with(Opcode::ListDeleteAll, list);
            }
        })
        .finish();

    library
        .register_block("data_insertatlist")
        .compile_logic(|mut ctx| {
            let Some(list) = list(&mut ctx) else { return };
            ctx.push_input("ITEM");
            ctx.push_input("INDEX");
            ctx.compiler.op_with(Opcode::ListInsert, list);
        })
        .finish();

    library
        .register_block("data_replaceitemoflist")
        .compile_logic(|mut ctx| {
            let Some(list) = list(&mut ctx) else { return };
            ctx.push_input("INDEX");
            ctx.push_input("ITEM");
            ctx.compiler.op_with(Opcode::ListReplace, list);
        })
        .finish();

    library
        .register_reporter("data_itemoflist")
        .compile_logic(|mut ctx| {
            list_reporter(&mut ctx, Some("INDEX"), Opcode::ListItem, "".into())
        })
        .finish();

    library
        .register_reporter("data_itemnumoflist")
        .compile_logic(|mut ctx| {
            list_reporter(&mut ctx, Some("ITEM"), Opcode::ListItemNum, 0.0.into())
        })
        .finish();

    library
        .register_reporter("data_lengthoflist")
        .compile_logic(|mut ctx| list_reporter(&mut ctx, None, Opcode::ListLength, 0.0.into()))
        .finish();

    library
        .register_reporter("data_listcontainsitem")
        .compile_logic(|mut ctx| {
            list_reporter(&mut ctx, Some("ITEM"), Opcode::ListContains, false.into())
        })
        .finish();
}

fn variable(ctx: &mut CompileContext<'_, '_>) -> Option<u32> {
    let Some(var) = ctx.resource("VARIABLE") else {
        let message = format!("{} without a variable", ctx.block.opcode);
        ctx.warn(message);
        return None;
    };
    Some(ctx.compiler.target.var(&var).into())
}

fn list(ctx: &mut CompileContext<'_, '_>) -> Option<u32> {
    let Some(list) = ctx.resource("LIST") else {
        let message = format!("{} without a list", ctx.block.opcode);
        ctx.warn(message);
        return None;
    };
    Some(ctx.compiler.target.list(&list).into())
}

/// A list reporter that degrades to `fallback` when the block names no
/// list, so the expression still leaves one value on the stack.
fn list_reporter(
    ctx: &mut CompileContext<'_, '_>,
    operand: Option<&str>,
    opcode: Opcode,
    fallback: Value,
) {
    let Some(list) = list(ctx) else {
        match fallback {
            Value::Boolean(value) => ctx.compiler.push_bool(value),
            Value::Number(num) => ctx.compiler.push_number(num),
            Value::String(text) => ctx.compiler.push_text(text),
        }
        return;
    };
    if let Some(operand) = operand {
        ctx.push_input(operand);
    }
    ctx.compiler.op_with(opcode, list);
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        ast::{Block, Field},
        blocks::BlockLibrary,
        codegen::{ScriptCompiler, TargetContext},
        continuation::ScriptId,
        interpreter::{opcode::Opcode, target::DataTables, value::Value},
    };

    fn compile(target: &mut TargetContext, blocks: &[Block]) -> Vec<u32> {
        let (types, _) = BlockLibrary::default().split();
        let mut compiler = ScriptCompiler::new(target, Rc::new(types), "test");
        compiler.compile_substack(blocks);
        let script = compiler.finish(ScriptId::from(0), Opcode::End).unwrap();
        script.code().to_vec()
    }

    #[test]
    fn watchers_carry_handle_and_visibility() {
        let mut stage = DataTables::default();
        stage.add_variable("s".into(), "score".into(), Value::Number(0.0));
        let mut target = TargetContext::stage("Stage", stage);

        let code = compile(
            &mut target,
            &[Block::new("data_hidevariable")
                .with_field("VARIABLE", Field::identified("s", "score"))],
        );
        assert_eq!(code[0], u32::from(Opcode::VarWatch));
        assert_eq!(code[1], 1 << 31);
        assert_eq!(code[2], 0);
    }

    #[test]
    fn insert_pushes_item_before_index() {
        let mut target = TargetContext::stage("Stage", DataTables::default());
        let code = compile(
            &mut target,
            &[Block::new("data_insertatlist")
                .with_field("LIST", Field::identified("l", "items"))
                .with_input("ITEM", Block::text("thing"))
                .with_input("INDEX", Block::number("1"))],
        );
        assert_eq!(code[0], u32::from(Opcode::PushConstant));
        assert_eq!(code[2], u32::from(Opcode::PushNumber));
        assert_eq!(code[5], u32::from(Opcode::ListInsert));
        assert_eq!(target.warnings.count("unknown list items"), 1);
    }

    #[test]
    fn missing_list_field_still_reports_a_value() {
        let mut target = TargetContext::stage("Stage", DataTables::default());
        let (types, _) = BlockLibrary::default().split();
        let mut compiler = ScriptCompiler::new(&mut target, Rc::new(types), "test");
        compiler.push_block(&Block::new("data_lengthoflist"));
        let script = compiler.finish(ScriptId::from(0), Opcode::End).unwrap();
        assert_eq!(script.code()[0], u32::from(Opcode::PushNumber));
        assert_eq!(target.warnings.count("data_lengthoflist without a list"), 1);
    }
}
