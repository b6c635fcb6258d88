use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use ownership_lessons::lessons::select;
use ownership_lessons::{catalog, RunnerConfig, Transcript};
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    List,
    Run(Vec<String>),
}

#[derive(Debug)]
struct Args {
    command: Command,
    config: Option<PathBuf>,
    verbose: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut command = None;
    let mut ids = Vec::new();
    let mut config = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--verbose" | "-v" => verbose = true,
            "list" if command.is_none() => command = Some("list"),
            "run" if command.is_none() => command = Some("run"),
            "list" | "run" => bail!("list and run cannot be combined"),
            other if other.starts_with('-') => bail!("unknown flag {other}"),
            other if command == Some("run") => ids.push(other.to_string()),
            other => bail!("unexpected argument {other}; usage: lessons [list | run <id>...] [--config <path>] [--verbose]"),
        }
    }

    let command = match command {
        Some("list") => Command::List,
        _ => Command::Run(ids),
    };
    Ok(Args {
        command,
        config,
        verbose,
    })
}

fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => RunnerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RunnerConfig::default(),
    };

    let filter = if args.verbose || config.verbose {
        "trace"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    if !config.color {
        colored::control::set_override(false);
    }

    match args.command {
        Command::List => {
            for lesson in catalog() {
                println!("{:<16} {}", lesson.id.bold(), lesson.title);
            }
        }
        Command::Run(ids) => {
            let ids = if ids.is_empty() { config.lessons } else { ids };
            for lesson in select(&ids)? {
                println!("{}", format!("== {} ==", lesson.title).cyan().bold());

                let mut out = Transcript::new();
                (lesson.run)(&mut out).with_context(|| format!("lesson {} failed", lesson.id))?;
                for line in out.lines() {
                    println!("  {line}");
                }
                println!();
            }
            println!("{}", "All lessons completed".green());
        }
    }
    Ok(())
}
