use std::{env::args, fs};

use anyhow::{Context, Result};
use scratch_jit::ast::project::ScratchProject;

fn main() -> Result<()> {
    let path = args().nth(1).context("usage: print_ast <project.json>")?;
    let json = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;

    let project = ScratchProject::from_json(&json)?;

    println!("{project:#?}");
    Ok(())
}
