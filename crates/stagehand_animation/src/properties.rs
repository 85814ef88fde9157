//! Property and attribute tweening
//!
//! [`PropertyTweenEngine::set_properties`] changes named properties and
//! key-value attributes on a node, optionally on all its descendants too,
//! either instantly or through the [`TweenRunner`]. Relative changes are
//! composed with each target's current value before anything is written.
//!
//! Attributes cannot be tweened directly, so each tweened attribute gets a
//! value holder that the runner animates. After every step the holder value
//! is copied back to the attribute, and the holder is discarded once its
//! tween is done.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use stagehand_core::{NodeId, SceneProvider, Value};

use crate::error::AnimationError;
use crate::tween::{HolderId, TweenFinished, TweenInfo, TweenOutcome, TweenRunner, TweenTarget};

/// One `set_properties` request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyChange {
    pub properties: IndexMap<String, Value>,
    pub attributes: IndexMap<String, Value>,
    /// Instant when `None`
    pub tween: Option<TweenInfo>,
    pub descendants: bool,
    pub relative: bool,
}

impl PropertyChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn tweened(mut self, info: TweenInfo) -> Self {
        self.tween = Some(info);
        self
    }

    pub fn with_descendants(mut self, descendants: bool) -> Self {
        self.descendants = descendants;
        self
    }

    pub fn relative(mut self, relative: bool) -> Self {
        self.relative = relative;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.attributes.is_empty()
    }
}

/// What one `set_properties` call did
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// Nodes the change was applied to
    pub targets: usize,
    /// Values written immediately
    pub written: usize,
    /// Tweens started
    pub tweens_started: usize,
    /// Per-target failures, already logged
    pub failures: Vec<AnimationError>,
}

/// Attribute a value holder mirrors into
#[derive(Clone, Debug)]
struct AttributeBinding {
    node: NodeId,
    name: String,
}

/// Applies property/attribute changes and owns the tweens they start
#[derive(Default)]
pub struct PropertyTweenEngine {
    runner: TweenRunner,
    bindings: FxHashMap<HolderId, AttributeBinding>,
}

impl PropertyTweenEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner(&self) -> &TweenRunner {
        &self.runner
    }

    /// Check if any tween is still running
    pub fn has_active_tweens(&self) -> bool {
        !self.runner.is_empty()
    }

    /// Apply `change` to `target` (and its descendants when requested).
    ///
    /// Failures on one target or one name are logged and collected in the
    /// report; the rest of the batch still applies.
    pub fn set_properties<S: SceneProvider + ?Sized>(
        &mut self,
        scene: &mut S,
        target: NodeId,
        change: &PropertyChange,
        now: f64,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        if !scene.contains(target) {
            let err = AnimationError::invalid("object", "node does not exist");
            tracing::warn!(?target, %err, "property change skipped");
            report.failures.push(err);
            return report;
        }

        let mut targets = vec![target];
        if change.descendants {
            targets.extend(scene.descendants(target));
        }
        report.targets = targets.len();

        for node in targets {
            self.apply_attributes(scene, node, change, now, &mut report);
            self.apply_properties(scene, node, change, now, &mut report);
        }
        report
    }

    fn apply_attributes<S: SceneProvider + ?Sized>(
        &mut self,
        scene: &mut S,
        node: NodeId,
        change: &PropertyChange,
        now: f64,
        report: &mut ApplyReport,
    ) {
        for (name, value) in &change.attributes {
            let current = scene.attribute(node, name);
            let goal = match resolve(name, current.as_ref(), value, change.relative) {
                Ok(goal) => goal,
                Err(err) => {
                    fail(report, node, err);
                    continue;
                }
            };

            match &change.tween {
                None => match scene.set_attribute(node, name, goal) {
                    Ok(()) => report.written += 1,
                    Err(source) => fail(
                        report,
                        node,
                        AnimationError::PropertyApplication {
                            node,
                            name: name.clone(),
                            source,
                        },
                    ),
                },
                Some(info) => {
                    let holder = self
                        .runner
                        .create_holder(current.unwrap_or_else(|| goal.clone()));
                    self.bindings.insert(
                        holder,
                        AttributeBinding {
                            node,
                            name: name.clone(),
                        },
                    );
                    let id = self.runner.create(TweenTarget::Holder { holder, goal }, *info);
                    self.runner.play(id, now);
                    report.tweens_started += 1;
                }
            }
        }
    }

    fn apply_properties<S: SceneProvider + ?Sized>(
        &mut self,
        scene: &mut S,
        node: NodeId,
        change: &PropertyChange,
        now: f64,
        report: &mut ApplyReport,
    ) {
        let mut goals: SmallVec<[(String, Value); 2]> = SmallVec::new();
        for (name, value) in &change.properties {
            let goal = if change.relative {
                let current = match scene.property(node, name) {
                    Ok(current) => current,
                    Err(source) => {
                        fail(
                            report,
                            node,
                            AnimationError::PropertyApplication {
                                node,
                                name: name.clone(),
                                source,
                            },
                        );
                        continue;
                    }
                };
                match resolve(name, Some(&current), value, true) {
                    Ok(goal) => goal,
                    Err(err) => {
                        fail(report, node, err);
                        continue;
                    }
                }
            } else {
                value.clone()
            };

            if change.tween.is_some() {
                goals.push((name.clone(), goal));
                continue;
            }
            match scene.set_property(node, name, goal) {
                Ok(()) => report.written += 1,
                Err(source) => fail(
                    report,
                    node,
                    AnimationError::PropertyApplication {
                        node,
                        name: name.clone(),
                        source,
                    },
                ),
            }
        }

        if let (Some(info), false) = (&change.tween, goals.is_empty()) {
            let id = self
                .runner
                .create(TweenTarget::Properties { node, goals }, *info);
            self.runner.play(id, now);
            report.tweens_started += 1;
        }
    }

    /// Advance every tween, mirror holders into their attributes and release
    /// the holders of finished tweens.
    pub fn step<S: SceneProvider + ?Sized>(&mut self, now: f64, scene: &mut S) -> Vec<TweenFinished> {
        let finished = self.runner.step(now, scene);

        for (holder, binding) in &self.bindings {
            if let Some(value) = self.runner.holder(*holder) {
                if let Err(err) = scene.set_attribute(binding.node, &binding.name, value.clone()) {
                    tracing::warn!(node = ?binding.node, attribute = %binding.name, %err, "attribute write failed");
                }
            }
        }

        for done in &finished {
            if let TweenTarget::Holder { holder, .. } = &done.target {
                self.bindings.remove(holder);
                self.runner.discard_holder(*holder);
            }
            if let TweenOutcome::Failed(err) = &done.outcome {
                tracing::warn!(id = ?done.id, %err, "tween failed");
            }
        }
        finished
    }
}

/// Goal value for one name, composing with `current` when relative.
fn resolve(
    name: &str,
    current: Option<&Value>,
    value: &Value,
    relative: bool,
) -> Result<Value, AnimationError> {
    match (relative, current) {
        (true, Some(current)) => {
            current
                .compose(value)
                .ok_or_else(|| AnimationError::NotComposable {
                    name: name.to_string(),
                    current: current.kind(),
                    delta: value.kind(),
                })
        }
        _ => Ok(value.clone()),
    }
}

fn fail(report: &mut ApplyReport, node: NodeId, err: AnimationError) {
    tracing::warn!(?node, %err, "property change failed on target");
    report.failures.push(err);
}
