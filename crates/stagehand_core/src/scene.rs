//! Scene provider interface and the in-memory scene
//!
//! The timeline runtime never owns scene objects. It addresses them through
//! generational [`NodeId`] handles and talks to the host through
//! [`SceneProvider`]: pose reads/writes, group reference poses, named
//! properties, key-value attributes and tag queries. A stale handle simply
//! stops resolving, which is how vanished objects are detected.
//!
//! [`MemoryScene`] is the arena-backed implementation used by the headless
//! runner and the test suites.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::error::{Result, SceneError};
use crate::geometry::{Pose, Vec3};
use crate::value::Value;

new_key_type! {
    /// Stable handle to a scene node
    pub struct NodeId;
}

/// Property name that reads and writes a node's pose
pub const POSE_PROPERTY: &str = "Pose";
/// Property name that reads and writes a node's position only
pub const POSITION_PROPERTY: &str = "Position";

/// What kind of scene object a node is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Single node with its own pose
    Part,
    /// Rigid group of parts, positioned through one reference part
    Group { reference: Option<NodeId> },
    /// Pure container without a pose
    Folder,
}

impl NodeKind {
    /// True when the node can be moved by pose writes.
    pub fn has_pose(&self) -> bool {
        match self {
            NodeKind::Part => true,
            NodeKind::Group { reference } => reference.is_some(),
            NodeKind::Folder => false,
        }
    }
}

/// Host scene access consumed by the animation and timeline crates
pub trait SceneProvider {
    /// Kind of a live node, `None` once the node is gone.
    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    fn name(&self, node: NodeId) -> Option<&str>;

    /// Look up a node by name.
    fn find(&self, name: &str) -> Option<NodeId>;

    /// All live nodes carrying `tag`, in creation order.
    fn tagged(&self, tag: &str) -> Vec<NodeId>;

    /// Every descendant of `node`, depth first.
    fn descendants(&self, node: NodeId) -> Vec<NodeId>;

    /// Current pose. Groups report their reference pose.
    fn pose(&self, node: NodeId) -> Result<Pose>;

    /// Replace a pose. Groups move all members rigidly.
    fn set_pose(&mut self, node: NodeId, pose: Pose) -> Result<()>;

    /// Bulk pose write. Returns the writes that failed.
    fn set_poses(&mut self, poses: &[(NodeId, Pose)]) -> Vec<(NodeId, SceneError)> {
        poses
            .iter()
            .filter_map(|(node, pose)| self.set_pose(*node, *pose).err().map(|e| (*node, e)))
            .collect()
    }

    fn property(&self, node: NodeId, name: &str) -> Result<Value>;

    fn set_property(&mut self, node: NodeId, name: &str, value: Value) -> Result<()>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<Value>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: Value) -> Result<()>;

    /// Attributes in insertion order.
    fn attributes(&self, node: NodeId) -> Vec<(String, Value)>;

    fn contains(&self, node: NodeId) -> bool {
        self.kind(node).is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory scene
// ─────────────────────────────────────────────────────────────────────────────

/// A node stored in a [`MemoryScene`]
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
    pub pose: Pose,
    pub properties: FxHashMap<String, Value>,
    pub attributes: IndexMap<String, Value>,
    pub tags: SmallVec<[String; 2]>,
}

impl SceneNode {
    fn new(name: &str, kind: NodeKind, pose: Pose) -> Self {
        Self {
            name: name.to_string(),
            kind,
            parent: None,
            children: SmallVec::new(),
            pose,
            properties: FxHashMap::default(),
            attributes: IndexMap::new(),
            tags: SmallVec::new(),
        }
    }
}

/// Arena-backed scene used for headless runs
#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: SlotMap<NodeId, SceneNode>,
    order: Vec<NodeId>,
    single_writes: u64,
    bulk_writes: u64,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, node: SceneNode) -> NodeId {
        let id = self.nodes.insert(node);
        self.order.push(id);
        id
    }

    /// Add a part with the given pose.
    pub fn add_part(&mut self, name: &str, pose: Pose) -> NodeId {
        self.insert(SceneNode::new(name, NodeKind::Part, pose))
    }

    /// Add an empty group. Parent parts to it and pick a reference with
    /// [`set_reference`](Self::set_reference).
    pub fn add_group(&mut self, name: &str) -> NodeId {
        self.insert(SceneNode::new(
            name,
            NodeKind::Group { reference: None },
            Pose::IDENTITY,
        ))
    }

    pub fn add_folder(&mut self, name: &str) -> NodeId {
        self.insert(SceneNode::new(name, NodeKind::Folder, Pose::IDENTITY))
    }

    /// Re-parent `child` under `parent`. A node cannot move into its own
    /// subtree.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let old_parent = self
            .nodes
            .get(child)
            .ok_or(SceneError::NodeNotFound(child))?
            .parent;
        if child == parent || self.descendants(child).contains(&parent) {
            return Err(SceneError::ParentCycle { child, parent });
        }
        if let Some(old) = old_parent.and_then(|p| self.nodes.get_mut(p)) {
            old.children.retain(|c| *c != child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        Ok(())
    }

    /// Designate the reference part of a group. The reference must be a
    /// part somewhere below the group.
    pub fn set_reference(&mut self, group: NodeId, reference: NodeId) -> Result<()> {
        let reference_kind = self
            .nodes
            .get(reference)
            .ok_or(SceneError::NodeNotFound(reference))?
            .kind;
        let group_kind = self
            .nodes
            .get(group)
            .ok_or(SceneError::NodeNotFound(group))?
            .kind;
        if !matches!(group_kind, NodeKind::Group { .. }) {
            return Err(SceneError::NotAGroup(group));
        }
        if reference_kind != NodeKind::Part || !self.descendants(group).contains(&reference) {
            return Err(SceneError::InvalidReference { group, reference });
        }
        if let Some(node) = self.nodes.get_mut(group) {
            node.kind = NodeKind::Group {
                reference: Some(reference),
            };
        }
        Ok(())
    }

    pub fn add_tag(&mut self, node: NodeId, tag: &str) -> Result<()> {
        let node = self.nodes.get_mut(node).ok_or(SceneError::NodeNotFound(node))?;
        if !node.tags.iter().any(|t| t == tag) {
            node.tags.push(tag.to_string());
        }
        Ok(())
    }

    /// Declare a property so later writes are type checked against it.
    pub fn insert_property(&mut self, node: NodeId, name: &str, value: Value) -> Result<()> {
        let node = self.nodes.get_mut(node).ok_or(SceneError::NodeNotFound(node))?;
        node.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a node and all of its descendants.
    pub fn remove(&mut self, node: NodeId) -> Option<SceneNode> {
        for child in self.descendants(node) {
            self.nodes.remove(child);
        }
        let removed = self.nodes.remove(node)?;
        if let Some(parent) = removed.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| *c != node);
        }
        let nodes = &self.nodes;
        self.order.retain(|id| nodes.contains_key(*id));
        Some(removed)
    }

    pub fn node(&self, node: NodeId) -> Option<&SceneNode> {
        self.nodes.get(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Live nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.order
            .iter()
            .filter_map(move |id| self.nodes.get(*id).map(|n| (*id, n)))
    }

    /// Number of individual pose writes received.
    pub fn single_write_count(&self) -> u64 {
        self.single_writes
    }

    /// Number of bulk pose writes received.
    pub fn bulk_write_count(&self) -> u64 {
        self.bulk_writes
    }

    fn group_parts(&self, group: NodeId) -> Vec<NodeId> {
        self.descendants(group)
            .into_iter()
            .filter(|id| matches!(self.nodes.get(*id).map(|n| n.kind), Some(NodeKind::Part)))
            .collect()
    }

    /// Compute the writes a pose change expands to without touching the arena.
    fn plan_pose(&self, node: NodeId, pose: Pose, plan: &mut Vec<(NodeId, Pose)>) -> Result<()> {
        let entry = self.nodes.get(node).ok_or(SceneError::NodeNotFound(node))?;
        match entry.kind {
            NodeKind::Part => plan.push((node, pose)),
            NodeKind::Group {
                reference: Some(reference),
            } => {
                let current = self.pose(reference)?;
                let transform = pose.compose(&current.inverse());
                for part in self.group_parts(node) {
                    let part_pose = self.nodes[part].pose;
                    plan.push((part, transform.compose(&part_pose)));
                }
                if !plan.iter().any(|(id, _)| *id == reference) {
                    plan.push((reference, pose));
                }
            }
            NodeKind::Group { reference: None } | NodeKind::Folder => {
                return Err(SceneError::NoPose(node));
            }
        }
        Ok(())
    }

    fn commit(&mut self, plan: Vec<(NodeId, Pose)>) {
        for (id, pose) in plan {
            if let Some(node) = self.nodes.get_mut(id) {
                node.pose = pose;
            }
        }
    }

    /// Build a scene from its serialized description.
    pub fn from_description(description: &SceneDescription) -> Result<Self> {
        let mut scene = Self::new();
        let mut references = Vec::new();
        for node in &description.nodes {
            scene.add_described(node, None, &mut references)?;
        }
        for (group, reference) in references {
            match scene.find(&reference) {
                Some(part) => scene.set_reference(group, part)?,
                None => tracing::warn!(reference = %reference, "group reference part not found"),
            }
        }
        Ok(scene)
    }

    fn add_described(
        &mut self,
        description: &NodeDescription,
        parent: Option<NodeId>,
        references: &mut Vec<(NodeId, String)>,
    ) -> Result<NodeId> {
        let id = match description.kind {
            DescribedKind::Part => self.add_part(&description.name, description.pose),
            DescribedKind::Group => self.add_group(&description.name),
            DescribedKind::Folder => self.add_folder(&description.name),
        };
        if let Some(parent) = parent {
            self.set_parent(id, parent)?;
        }
        if let Some(reference) = &description.reference {
            references.push((id, reference.clone()));
        }
        for tag in &description.tags {
            self.add_tag(id, tag)?;
        }
        for (name, value) in &description.properties {
            self.insert_property(id, name, value.clone())?;
        }
        for (name, value) in &description.attributes {
            self.set_attribute(id, name, value.clone())?;
        }
        for child in &description.children {
            self.add_described(child, Some(id), references)?;
        }
        Ok(id)
    }
}

impl SceneProvider for MemoryScene {
    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.get(node).map(|n| n.kind)
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|n| n.name.as_str())
    }

    fn find(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, n)| n.name == name).map(|(id, _)| id)
    }

    fn tagged(&self, tag: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, n)| n.tags.iter().any(|t| t == tag))
            .map(|(id, _)| id)
            .collect()
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        fn walk(scene: &MemoryScene, node: NodeId, out: &mut Vec<NodeId>) {
            if let Some(entry) = scene.nodes.get(node) {
                for child in &entry.children {
                    out.push(*child);
                    walk(scene, *child, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(self, node, &mut out);
        out
    }

    fn pose(&self, node: NodeId) -> Result<Pose> {
        let entry = self.nodes.get(node).ok_or(SceneError::NodeNotFound(node))?;
        match entry.kind {
            NodeKind::Part => Ok(entry.pose),
            NodeKind::Group {
                reference: Some(reference),
            } => self
                .nodes
                .get(reference)
                .map(|r| r.pose)
                .ok_or(SceneError::NoPose(node)),
            _ => Err(SceneError::NoPose(node)),
        }
    }

    fn set_pose(&mut self, node: NodeId, pose: Pose) -> Result<()> {
        let mut plan = Vec::new();
        self.plan_pose(node, pose, &mut plan)?;
        self.commit(plan);
        self.single_writes += 1;
        Ok(())
    }

    fn set_poses(&mut self, poses: &[(NodeId, Pose)]) -> Vec<(NodeId, SceneError)> {
        let mut plan = Vec::new();
        let mut failures = Vec::new();
        for (node, pose) in poses {
            if let Err(err) = self.plan_pose(*node, *pose, &mut plan) {
                failures.push((*node, err));
            }
        }
        self.commit(plan);
        self.bulk_writes += 1;
        failures
    }

    fn property(&self, node: NodeId, name: &str) -> Result<Value> {
        match name {
            POSE_PROPERTY => return self.pose(node).map(Value::Pose),
            POSITION_PROPERTY => return self.pose(node).map(|p| Value::Vec3(p.position)),
            _ => {}
        }
        let entry = self.nodes.get(node).ok_or(SceneError::NodeNotFound(node))?;
        entry
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| SceneError::MissingProperty {
                node,
                name: name.to_string(),
            })
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: Value) -> Result<()> {
        match name {
            POSE_PROPERTY => {
                let pose = value.as_pose().ok_or(SceneError::TypeMismatch {
                    name: name.to_string(),
                    expected: "pose",
                    actual: value.kind(),
                })?;
                return self.set_pose(node, pose);
            }
            POSITION_PROPERTY => {
                let position: Vec3 = value.as_vec3().ok_or(SceneError::TypeMismatch {
                    name: name.to_string(),
                    expected: "vec3",
                    actual: value.kind(),
                })?;
                let current = self.pose(node)?;
                return self.set_pose(node, Pose::new(position, current.rotation));
            }
            _ => {}
        }
        let entry = self
            .nodes
            .get_mut(node)
            .ok_or(SceneError::NodeNotFound(node))?;
        let slot = entry
            .properties
            .get_mut(name)
            .ok_or_else(|| SceneError::MissingProperty {
                node,
                name: name.to_string(),
            })?;
        if slot.kind() != value.kind() {
            return Err(SceneError::TypeMismatch {
                name: name.to_string(),
                expected: slot.kind(),
                actual: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<Value> {
        self.nodes.get(node)?.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: Value) -> Result<()> {
        let entry = self
            .nodes
            .get_mut(node)
            .ok_or(SceneError::NodeNotFound(node))?;
        entry.attributes.insert(name.to_string(), value);
        Ok(())
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, Value)> {
        self.nodes
            .get(node)
            .map(|n| {
                n.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialized scene description
// ─────────────────────────────────────────────────────────────────────────────

/// Serialized form of a [`MemoryScene`]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DescribedKind {
    #[default]
    Part,
    Group,
    Folder,
}

/// One node of a [`SceneDescription`]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NodeDescription {
    pub name: String,
    #[serde(default)]
    pub kind: DescribedKind,
    #[serde(default)]
    pub pose: Pose,
    /// Name of the reference part, groups only
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}
