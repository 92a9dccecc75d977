use std::{fs, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use owo_colors::OwoColorize;
use scratch_jit::{ast::project::ScratchProject, interpreter::settings::Settings};

/// Prints the bytecode every script of a project compiles to.
#[derive(Parser, Debug)]
#[command(name = "disasm", version, about)]
struct Args {
    /// Path to a `project.json`.
    project: PathBuf,

    /// Only show this sprite (or `Stage`).
    #[arg(long)]
    target: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let json = fs::read_to_string(&args.project)
        .with_context(|| format!("reading {}", args.project.display()))?;
    let runtime = ScratchProject::from_json(&json)
        .context("parsing project")?
        .compile(Settings::default())
        .map_err(|err| anyhow!("compiling project: {err}"))?;

    let order = std::iter::once(runtime.stage_id()).chain(runtime.children().iter().copied());
    for id in order {
        let target = runtime.target(id).map_err(|err| anyhow!("{err}"))?;
        if args.target.as_deref().is_some_and(|name| name != &*target.name) {
            continue;
        }
        println!("{}", format!("== {} ==", target.name).green().bold());
        for script in target.scripts.all() {
            println!("{}", script.disassemble());
        }
    }
    Ok(())
}
