//! Sample stage scaffolding

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::StagehandConfig;

/// Write a sample `stage.json` and `stagehand.toml` into `path`.
pub fn create_stage(path: &Path, force: bool) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))?;

    let stage = path.join("stage.json");
    if stage.exists() && !force {
        anyhow::bail!(
            "{} already exists. Pass --force to overwrite it.",
            stage.display()
        );
    }
    fs::write(&stage, SAMPLE_STAGE).with_context(|| format!("Failed to write {}", stage.display()))?;

    let config = path.join("stagehand.toml");
    fs::write(&config, StagehandConfig::sample().to_toml()?)
        .with_context(|| format!("Failed to write {}", config.display()))?;

    Ok(())
}

const SAMPLE_STAGE: &str = r#"{
  "scene": {
    "nodes": [
      { "name": "Lever", "tags": ["Switch"] },
      { "name": "Gate", "pose": { "position": [0.0, 0.0, 10.0] } },
      { "name": "Lamp", "attributes": { "Color": "Red" } }
    ]
  },
  "entities": [
    {
      "kind": "Timeline",
      "name": "OpenGate",
      "attributes": { "Button": "Lever" },
      "children": [
        {
          "kind": "Keyframe",
          "attributes": {
            "Function": "Move", "Timestamp": 0.0, "Length": 2.0,
            "Offset": [0.0, 6.0, 0.0], "Tween_Style": "Sine"
          },
          "target": { "node": "Gate" }
        },
        {
          "kind": "Keyframe",
          "attributes": { "Function": "Sound", "Timestamp": 0.0, "Sound": "gate_creak", "Volume": 0.8 },
          "target": { "node": "Gate" }
        },
        {
          "kind": "Keyframe",
          "attributes": { "Function": "Tween", "Timestamp": 2.0, "Attr_Color": "Green" },
          "target": { "node": "Lamp" }
        }
      ]
    },
    {
      "kind": "Timeline",
      "name": "Announce",
      "attributes": { "Chain": "OpenGate" },
      "children": [
        { "kind": "Keyframe", "attributes": { "Function": "Message", "Timestamp": 0.0, "Length": 3.0, "Text": "The gate is open" } }
      ]
    }
  ]
}
"#;
