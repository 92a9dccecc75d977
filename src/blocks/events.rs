use crate::{
    blocks::{BlockLibrary, menu},
    interpreter::opcode::Opcode,
};

pub(super) fn register(library: &mut BlockLibrary) {
    library
        .register_block("event_broadcast")
        .compile_logic(|mut ctx| {
            ctx.push_string("BROADCAST_INPUT");
            ctx.compiler.op(Opcode::Broadcast);
        })
        .finish();

    library
        .register_block("event_broadcastandwait")
        .compile_logic(|mut ctx| {
            ctx.compiler.op(Opcode::Save);
            ctx.push_string("BROADCAST_INPUT");
            ctx.compiler.op(Opcode::BroadcastAndWait);

            let check = ctx.compiler.label_here();
            let done = ctx.compiler.new_label();
            ctx.compiler.op(Opcode::Running);
            ctx.compiler.jump(Opcode::JumpIfFalse, done);
            ctx.compiler.resume_at(Opcode::ForceQueue, check);
            ctx.compiler.place_label(done);
            ctx.compiler.op(Opcode::Restore);
        })
        .finish();

    library
        .register_reporter("event_broadcast_menu")
        .compile_logic(menu("BROADCAST_OPTION"))
        .finish();
}
