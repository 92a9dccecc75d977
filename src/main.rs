use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
    rc::Rc,
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use scratch_jit::{
    ast::project::ScratchProject,
    error::RuntimeError,
    interpreter::{Runtime, settings::Settings},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Runs a Scratch project headless, printing what its sprites say.
#[derive(Parser, Debug)]
#[command(name = "scratch-run", version, about)]
struct Args {
    /// A `project.json`, or a directory holding an extracted project.
    #[arg(value_name = "PROJECT")]
    project: PathBuf,

    /// JSON file with runtime settings. Missing keys keep their defaults.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Stop after this many frames even if scripts are still running.
    #[arg(long, default_value_t = 30 * 60)]
    frames: u64,

    /// Answers for `ask and wait`, used in order.
    #[arg(long = "answer", value_name = "TEXT")]
    answers: Vec<String>,

    /// Run frames back to back instead of at the project framerate.
    #[arg(long)]
    fast: bool,

    /// Seed for random numbers.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_str::<Settings>(&json)
                .with_context(|| format!("parsing settings {}", path.display()))?
        }
        None => Settings::default(),
    };
    if args.seed.is_some() {
        settings.seed = args.seed;
    }

    let project = load(&args.project)?;
    let mut runtime = project
        .compile(settings)
        .map_err(|err| anyhow!("compiling project: {err}"))?;

    let failure = Rc::new(RefCell::new(None::<RuntimeError>));
    let sink = Rc::clone(&failure);
    runtime.on_error(move |err| *sink.borrow_mut() = Some(err.clone()));

    run(&mut runtime, &args);

    if let Some(err) = failure.borrow_mut().take() {
        bail!("project halted: {err}");
    }
    Ok(())
}

fn load(path: &Path) -> Result<ScratchProject> {
    let path = if path.is_dir() {
        path.join("project.json")
    } else {
        path.to_owned()
    };
    let json =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    ScratchProject::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn run(runtime: &mut Runtime, args: &Args) {
    let mut answers: VecDeque<&str> = args.answers.iter().map(String::as_str).collect();
    let mut speech = HashMap::new();
    let frame = runtime.settings().frame_budget();

    runtime.start();
    runtime.trigger_green_flag();

    let mut frames = 0;
    while frames < args.frames {
        let started = Instant::now();
        runtime.tick();
        frames += 1;

        for (id, target) in runtime.targets().iter() {
            let text = target.bubble.as_ref().map(|bubble| Rc::clone(&bubble.text));
            if speech.get(&id) != Some(&text) {
                if let Some(text) = &text {
                    println!("{}: {}", target.name.bold(), text);
                }
                speech.insert(id, text);
            }
        }

        let prompt = runtime.io().prompt_visible;
        if prompt {
            if let Some(question) = runtime.io().question.clone() {
                println!("{} {}", "?".yellow(), question);
            }
            match answers.pop_front() {
                Some(answer) => runtime.submit_answer(answer),
                None => {
                    warn!("out of answers");
                    break;
                }
            }
        }

        if !runtime.is_running() || runtime.queue_len() == 0 {
            break;
        }
        if !args.fast {
            if let Some(rest) = frame.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }

    info!(frames, threads = runtime.queue_len(), "finished");
}
