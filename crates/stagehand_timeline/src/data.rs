//! Declarative timeline data
//!
//! Authored data is a JSON tree of [`Entity`] values. Timelines are entities
//! of kind `Timeline` anywhere in the tree; their children are keyframes.
//! A [`StageData`] file bundles that tree with the scene it animates.
//!
//! ```json
//! {
//!   "scene": { "nodes": [{ "name": "Door", "pose": { "position": [0, 0, 0] } }] },
//!   "entities": [
//!     { "kind": "Timeline", "name": "OpenDoor", "attributes": { "Button": "Lever" },
//!       "children": [
//!         { "kind": "Keyframe", "target": { "node": "Door" },
//!           "attributes": { "Function": "Move", "Timestamp": 0, "Length": 2,
//!                           "Offset": [0, 6, 0] } }
//!       ] }
//!   ]
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use stagehand_core::{SceneDescription, Value};
use std::path::Path;

use crate::error::Result;

/// Entity kind that marks a timeline
pub const TIMELINE_KIND: &str = "Timeline";

/// One node of the authored data tree
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Entity {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    #[serde(default)]
    pub target: Option<EntityTarget>,
    #[serde(default)]
    pub children: Vec<Entity>,
}

impl Entity {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_target(mut self, target: EntityTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_child(mut self, child: Entity) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn is_timeline(&self) -> bool {
        self.kind == TIMELINE_KIND
    }
}

/// What a keyframe acts on: a scene node by name, or a literal value
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EntityTarget {
    Node { node: String },
    Value(Value),
}

impl EntityTarget {
    pub fn node(name: &str) -> Self {
        EntityTarget::Node {
            node: name.to_string(),
        }
    }
}

/// A scene plus the entity tree that animates it
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StageData {
    #[serde(default)]
    pub scene: SceneDescription,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl StageData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage_data() {
        let json = r#"{
            "scene": { "nodes": [{ "name": "Door" }] },
            "entities": [
                { "kind": "Folder", "name": "Level", "children": [
                    { "kind": "Timeline", "name": "Open", "attributes": { "Button": "Lever", "Loop": true },
                      "children": [
                        { "kind": "Keyframe", "target": { "node": "Door" },
                          "attributes": { "Function": "Move", "Timestamp": 0.5, "Offset": [0, 6, 0] } },
                        { "kind": "Keyframe", "target": "Welcome",
                          "attributes": { "Function": "Message", "Timestamp": 1 } }
                      ] }
                ] }
            ]
        }"#;
        let data = StageData::from_json(json).unwrap();
        assert_eq!(data.scene.nodes.len(), 1);

        let timeline = &data.entities[0].children[0];
        assert!(timeline.is_timeline());
        assert_eq!(timeline.attribute("Loop"), Some(&Value::Bool(true)));
        assert_eq!(timeline.children[0].target, Some(EntityTarget::node("Door")));
        assert_eq!(
            timeline.children[1].target,
            Some(EntityTarget::Value(Value::from("Welcome")))
        );
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(StageData::from_json("{ \"entities\": 3 }").is_err());
    }
}
