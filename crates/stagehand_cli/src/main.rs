//! Stagehand CLI
//!
//! Validate timeline data and simulate it headlessly.

mod config;
mod project;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagehand_core::{MemoryScene, SceneProvider};
use stagehand_timeline::{ContactOutcome, Director, Registry, StageData, TimelineDef, TracingHooks};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{InputAction, PressArg, ScriptedInput, StagehandConfig, TouchArg};

/// Validate and simulate Stagehand timelines
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Validate and simulate Stagehand timelines")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the timelines in a stage file and report skipped entries
    Validate {
        /// Stage file (JSON)
        data: PathBuf,
    },

    /// Simulate a stage file headlessly
    Run {
        /// Stage file (JSON)
        data: PathBuf,

        /// Simulated seconds (defaults to `[run] seconds`)
        #[arg(short, long)]
        seconds: Option<f64>,

        /// Configuration file
        #[arg(short, long, default_value = "stagehand.toml")]
        config: PathBuf,

        /// Press a button: BUTTON[:PARTICIPANT]@TIME
        #[arg(long, value_name = "BUTTON@TIME")]
        press: Vec<PressArg>,

        /// Touch an emitter: EMITTER:PARTICIPANT@TIME
        #[arg(long, value_name = "EMITTER:PARTICIPANT@TIME")]
        touch: Vec<TouchArg>,
    },

    /// Write a sample stage.json and stagehand.toml
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing stage.json
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Validate { data } => cmd_validate(&data),
        Commands::Run {
            data,
            seconds,
            config,
            press,
            touch,
        } => {
            let mut inputs: Vec<ScriptedInput> = press.into_iter().map(|arg| arg.0).collect();
            inputs.extend(touch.into_iter().map(|arg| arg.0));
            cmd_run(&data, seconds, &config, inputs)
        }
        Commands::Init { path, force } => {
            project::create_stage(&path, force)?;
            info!("Created sample stage in {}", path.display());
            Ok(())
        }
    }
}

fn load_stage(path: &Path) -> Result<StageData> {
    StageData::load(path).with_context(|| format!("Failed to load stage {}", path.display()))
}

fn describe_triggers(def: &TimelineDef) -> String {
    let triggers = &def.triggers;
    let mut parts = Vec::new();
    if let Some(delay) = triggers.delay {
        parts.push(if triggers.is_delay_only() {
            format!("start after {delay}s")
        } else {
            format!("delay {delay}s")
        });
    }
    if let Some(button) = &triggers.button {
        parts.push(format!("button {button}"));
    }
    if let Some(tag) = &triggers.touch {
        let mode = if def.touch_multiple { "multiple" } else { "once" };
        parts.push(format!("touch {tag} ({mode})"));
    }
    if let Some(chain) = &triggers.chain {
        parts.push(format!("after {chain}"));
    }
    parts.join(", ")
}

fn format_duration(seconds: f64) -> String {
    if seconds.is_infinite() {
        "unbounded".to_string()
    } else {
        format!("{seconds:.2}s")
    }
}

fn cmd_validate(path: &Path) -> Result<()> {
    let data = load_stage(path)?;
    let registry = Registry::scan(&data.entities);

    println!("{}: {} timeline(s)", path.display(), registry.len());
    for def in registry.timelines() {
        let dispatchable = def.keyframes.iter().filter(|k| k.is_dispatchable()).count();
        println!(
            "  {:<24} {:<40} keyframes {}/{}  duration {}{}",
            def.name,
            describe_triggers(def),
            dispatchable,
            def.keyframes.len(),
            format_duration(def.duration),
            if def.loops() { "  loops" } else { "" }
        );
    }

    let diagnostics = registry.diagnostics();
    if diagnostics.is_empty() {
        return Ok(());
    }
    println!("skipped:");
    for diagnostic in diagnostics {
        println!("  {diagnostic}");
    }
    anyhow::bail!("{} entries skipped", diagnostics.len())
}

fn deliver(director: &mut Director<MemoryScene>, input: &ScriptedInput) {
    match &input.action {
        InputAction::Button {
            button,
            participant,
        } => {
            let participant = match participant {
                Some(name) => match director.scene().find(name) {
                    Some(node) => Some(node),
                    None => {
                        warn!(participant = %name, "unknown participant, pressing without one");
                        None
                    }
                },
                None => None,
            };
            let runs = director.press_button(button, participant);
            info!(at = input.at, %button, runs = runs.len(), "button pressed");
        }
        InputAction::Touch {
            emitter,
            participant,
        } => {
            let scene = director.scene();
            let (Some(emitter_id), Some(participant_id)) = (scene.find(emitter), scene.find(participant))
            else {
                warn!(%emitter, %participant, "touch names an unknown node");
                return;
            };
            for outcome in director.contact(emitter_id, participant_id) {
                match outcome {
                    ContactOutcome::Triggered { timeline, .. } => {
                        info!(at = input.at, timeline, %participant, "touch triggered")
                    }
                    ContactOutcome::DebounceSuppressed { timeline } => {
                        info!(at = input.at, timeline, %participant, "touch debounced")
                    }
                }
            }
        }
    }
}

fn cmd_run(path: &Path, seconds: Option<f64>, config_path: &Path, mut inputs: Vec<ScriptedInput>) -> Result<()> {
    let data = load_stage(path)?;
    let config = StagehandConfig::load(config_path)?;
    let seconds = seconds.unwrap_or(config.run.seconds);
    if !seconds.is_finite() || seconds < 0.0 {
        anyhow::bail!("--seconds must be >= 0, got {seconds}");
    }

    inputs.extend(config.input.iter().cloned());
    inputs.sort_by(|a, b| a.at.total_cmp(&b.at));

    let mut director = Director::from_stage(&data, config.director.clone(), TracingHooks)
        .with_context(|| format!("Failed to build scene from {}", path.display()))?;
    director.start();

    let dt = director.config().frame_interval();
    let frames = (seconds / dt).round() as u64;
    let mut pending = inputs.into_iter().peekable();
    for _ in 0..frames {
        let now = director.now();
        while let Some(input) = pending.next_if(|input| input.at <= now + 1e-9) {
            deliver(&mut director, &input);
        }
        director.step(dt);
    }
    for input in pending {
        warn!(at = input.at, "input after the end of the simulation ignored");
    }

    println!("after {:.2}s ({} frames):", director.now(), director.frame());
    println!("poses:");
    for (_, node) in director.scene().iter().filter(|(_, node)| node.kind.has_pose()) {
        let p = node.pose.position;
        println!("  {:<24} ({:.3}, {:.3}, {:.3})", node.name, p.x, p.y, p.z);
    }
    println!("timelines:");
    let scheduler = director.scheduler();
    for (index, def) in scheduler.registry().timelines().iter().enumerate() {
        let stats = scheduler.stats(index);
        println!(
            "  {:<24} triggered {}  started {}  completed {}  keyframes {}  debounced {}",
            def.name, stats.triggered, stats.started, stats.completed, stats.dispatched, stats.suppressed
        );
    }
    Ok(())
}
