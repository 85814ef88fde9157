//! Stagehand configuration file handling

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stagehand_timeline::DirectorConfig;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Top-level Stagehand configuration (stagehand.toml)
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StagehandConfig {
    #[serde(default)]
    pub director: DirectorConfig,
    #[serde(default)]
    pub run: RunConfig,
    /// Scripted inputs replayed during `stagehand run`
    #[serde(default)]
    pub input: Vec<ScriptedInput>,
}

/// Simulation defaults
#[derive(Debug, Deserialize, Serialize)]
pub struct RunConfig {
    /// Simulated seconds when `--seconds` is not given
    #[serde(default = "default_seconds")]
    pub seconds: f64,
}

fn default_seconds() -> f64 {
    10.0
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seconds: default_seconds(),
        }
    }
}

/// An input delivered at a fixed simulation time
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScriptedInput {
    pub at: f64,
    #[serde(flatten)]
    pub action: InputAction,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputAction {
    Button {
        button: String,
        #[serde(default)]
        participant: Option<String>,
    },
    Touch {
        emitter: String,
        participant: String,
    },
}

fn split_time(s: &str) -> Result<(&str, f64)> {
    let (head, at) = s
        .rsplit_once('@')
        .with_context(|| format!("`{s}` is missing `@TIME`"))?;
    let at: f64 = at
        .parse()
        .with_context(|| format!("`{at}` is not a time in seconds"))?;
    if !at.is_finite() || at < 0.0 {
        anyhow::bail!("input time must be >= 0, got {at}");
    }
    Ok((head, at))
}

impl ScriptedInput {
    /// Parse `BUTTON[:PARTICIPANT]@T`.
    pub fn press(s: &str) -> Result<Self> {
        let (head, at) = split_time(s)?;
        let (button, participant) = match head.split_once(':') {
            Some((button, participant)) => (button, Some(participant.to_string())),
            None => (head, None),
        };
        if button.is_empty() {
            anyhow::bail!("`{s}` names no button");
        }
        Ok(Self {
            at,
            action: InputAction::Button {
                button: button.to_string(),
                participant,
            },
        })
    }

    /// Parse `EMITTER:PARTICIPANT@T`.
    pub fn touch(s: &str) -> Result<Self> {
        let (head, at) = split_time(s)?;
        let (emitter, participant) = head
            .split_once(':')
            .with_context(|| format!("`{s}` should look like EMITTER:PARTICIPANT@TIME"))?;
        Ok(Self {
            at,
            action: InputAction::Touch {
                emitter: emitter.to_string(),
                participant: participant.to_string(),
            },
        })
    }
}

/// Wrapper so clap can parse `--press` values.
#[derive(Clone, Debug)]
pub struct PressArg(pub ScriptedInput);

impl FromStr for PressArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ScriptedInput::press(s).map(Self)
    }
}

/// Wrapper so clap can parse `--touch` values.
#[derive(Clone, Debug)]
pub struct TouchArg(pub ScriptedInput);

impl FromStr for TouchArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ScriptedInput::touch(s).map(Self)
    }
}

impl StagehandConfig {
    /// Load a configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no stagehand.toml, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: StagehandConfig = toml::from_str(content)?;
        config.director.validate()?;
        Ok(config)
    }

    /// Sample configuration written by `stagehand init`
    pub fn sample() -> Self {
        Self {
            input: vec![ScriptedInput {
                at: 1.0,
                action: InputAction::Button {
                    button: "Lever".to_string(),
                    participant: None,
                },
            }],
            ..Self::default()
        }
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
