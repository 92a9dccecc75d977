pub mod ast;
pub mod blocks;
pub mod codegen;
pub mod continuation;
pub mod error;
pub mod interpreter;
pub mod sb2;
pub mod sb3;
