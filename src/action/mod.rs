//! Side effects that run before or after a dialogue line.
//!
//! Descriptors are authored data shared by every session. Running one clones it into a
//! [`RunningAction`], so runtime state never leaks back into the descriptor, and the instance is
//! dropped as soon as its step completes.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::character::AssetRef;
use crate::dialogue::{secs, AudioClip};
use crate::host::{AudioPlayer, ObjectHandle, ObjectQuery, SceneHost};

pub mod curve;
mod sequence;

pub use curve::FadeCurve;
pub use sequence::ActionSequence;

pub type Vec3 = [f32; 3];

/// Full placement of a new object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TransformValues {
    pub position: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for TransformValues {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// Partial transform write; absent components are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TransformPatch {
    pub position: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub scale: Option<Vec3>,
}

/// How an action finds the object it works on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TargetReference {
    Direct {
        handle: ObjectHandle,
    },
    ByName {
        name: String,
        #[serde(default)]
        within: Option<String>,
    },
    ByTag {
        tag: String,
        #[serde(default)]
        within: Option<String>,
    },
}

impl TargetReference {
    /// Looks the target up, scoping name/tag searches to the children of `within` when set.
    pub fn resolve(&self, scene: &dyn SceneHost) -> Option<ObjectHandle> {
        match self {
            TargetReference::Direct { handle } => scene.exists(*handle).then_some(*handle),
            TargetReference::ByName { name, within } => {
                let parent = scoped_parent(scene, within.as_deref())?;
                scene.find(&ObjectQuery::Name(name.clone()), parent)
            }
            TargetReference::ByTag { tag, within } => {
                let parent = scoped_parent(scene, within.as_deref())?;
                scene.find(&ObjectQuery::Tag(tag.clone()), parent)
            }
        }
    }
}

/// `Some(None)` means unscoped, `None` means the scope parent itself is missing.
fn scoped_parent(scene: &dyn SceneHost, within: Option<&str>) -> Option<Option<ObjectHandle>> {
    match within.map(str::trim).filter(|name| !name.is_empty()) {
        None => Some(None),
        Some(parent) => scene
            .find(&ObjectQuery::Name(parent.to_string()), None)
            .map(Some),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InstantiatePrefab {
    pub prefab: AssetRef,
    #[serde(default)]
    pub name: Option<String>,
    /// Name of the object to parent the new instance to.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub transform: TransformValues,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModifyTransform {
    pub target_name: String,
    #[serde(flatten)]
    pub patch: TransformPatch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlayAudioClip {
    pub clip: AudioClip,
    #[serde(default = "default_true")]
    pub wait_for_completion: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SetObjectActive {
    pub target: TargetReference,
    pub active: bool,
    /// Report a missing target as an error instead of a warning.
    #[serde(default)]
    pub fail_if_missing: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FadeSprite {
    pub target: TargetReference,
    #[serde(default)]
    pub from_alpha: f32,
    #[serde(default = "default_alpha")]
    pub to_alpha: f32,
    #[serde(default)]
    pub duration_secs: f32,
    #[serde(default)]
    pub curve: FadeCurve,
    /// Activate the target before the fade starts.
    #[serde(default)]
    pub activate_on_start: bool,
    /// Deactivate the target once the fade completes.
    #[serde(default)]
    pub deactivate_on_end: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionGroup {
    #[serde(default)]
    pub actions: Vec<Option<LineAction>>,
}

fn default_true() -> bool {
    true
}

fn default_alpha() -> f32 {
    1.0
}

/// Built-in side effect kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineAction {
    InstantiatePrefab(InstantiatePrefab),
    ModifyTransform(ModifyTransform),
    PlayAudioClip(PlayAudioClip),
    SetObjectActive(SetObjectActive),
    FadeSprite(FadeSprite),
    Group(ActionGroup),
}

impl LineAction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LineAction::InstantiatePrefab(_) => "instantiate_prefab",
            LineAction::ModifyTransform(_) => "modify_transform",
            LineAction::PlayAudioClip(_) => "play_audio_clip",
            LineAction::SetObjectActive(_) => "set_object_active",
            LineAction::FadeSprite(_) => "fade_sprite",
            LineAction::Group(_) => "group",
        }
    }

    /// Clones the authored defaults into a fresh runtime instance.
    pub fn instantiate(&self) -> RunningAction {
        RunningAction {
            kind: self.kind_name(),
            spec: self.clone(),
            state: RunState::NotStarted,
        }
    }
}

/// Whether an action step has completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionStatus {
    Running,
    Finished,
}

/// Collaborators available to actions.
pub struct ActionEnv<'a> {
    pub scene: &'a mut dyn SceneHost,
    pub audio: &'a mut dyn AudioPlayer,
}

#[derive(Debug)]
enum RunState {
    NotStarted,
    Waiting {
        remaining: Duration,
    },
    Fading {
        target: ObjectHandle,
        elapsed: Duration,
        duration: Duration,
    },
    Group(Box<ActionSequence>),
    Done,
}

/// Disposable runtime instance of a [`LineAction`].
#[derive(Debug)]
pub struct RunningAction {
    kind: &'static str,
    spec: LineAction,
    state: RunState,
}

impl RunningAction {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Advances the action. The first call starts it; `dt` is time spent since the last call.
    pub fn poll(&mut self, env: &mut ActionEnv<'_>, dt: Duration) -> ActionStatus {
        if matches!(self.state, RunState::NotStarted) {
            self.state = self.start(env);
            // Time before start does not count towards the action.
            return self.poll_started(env, Duration::ZERO);
        }
        self.poll_started(env, dt)
    }

    fn start(&mut self, env: &mut ActionEnv<'_>) -> RunState {
        match &self.spec {
            LineAction::InstantiatePrefab(spec) => {
                let parent = match spec.parent.as_deref() {
                    Some(name) => {
                        let found = env.scene.find(&ObjectQuery::Name(name.to_string()), None);
                        if found.is_none() {
                            warn!(parent = name, "instantiate parent not found, spawning at root");
                        }
                        found
                    }
                    None => None,
                };
                let spawned = env.scene.instantiate(
                    &spec.prefab,
                    spec.name.as_deref(),
                    parent,
                    &spec.transform,
                );
                if spawned.is_none() {
                    warn!(prefab = spec.prefab.as_str(), "prefab could not be instantiated");
                }
                RunState::Done
            }
            LineAction::ModifyTransform(spec) => {
                match env
                    .scene
                    .find(&ObjectQuery::Name(spec.target_name.clone()), None)
                {
                    Some(target) => env.scene.set_transform(target, &spec.patch),
                    None => warn!(target = %spec.target_name, "transform target not found"),
                }
                RunState::Done
            }
            LineAction::PlayAudioClip(spec) => {
                env.audio.play(&spec.clip);
                if spec.wait_for_completion {
                    RunState::Waiting {
                        remaining: spec.clip.duration(),
                    }
                } else {
                    RunState::Done
                }
            }
            LineAction::SetObjectActive(spec) => {
                match spec.target.resolve(&*env.scene) {
                    Some(target) => env.scene.set_active(target, spec.active),
                    None if spec.fail_if_missing => {
                        error!(target = ?spec.target, "object to toggle not found");
                    }
                    None => warn!(target = ?spec.target, "object to toggle not found"),
                }
                RunState::Done
            }
            LineAction::FadeSprite(spec) => match spec.target.resolve(&*env.scene) {
                Some(target) => {
                    if spec.activate_on_start {
                        env.scene.set_active(target, true);
                    }
                    env.scene.set_alpha(target, spec.from_alpha);
                    RunState::Fading {
                        target,
                        elapsed: Duration::ZERO,
                        duration: secs(spec.duration_secs),
                    }
                }
                None => {
                    warn!(target = ?spec.target, "fade target not found");
                    RunState::Done
                }
            },
            LineAction::Group(group) => {
                RunState::Group(Box::new(ActionSequence::new(&group.actions)))
            }
        }
    }

    fn poll_started(&mut self, env: &mut ActionEnv<'_>, dt: Duration) -> ActionStatus {
        let finished = match &mut self.state {
            RunState::NotStarted => false,
            RunState::Done => true,
            RunState::Waiting { remaining } => {
                *remaining = remaining.saturating_sub(dt);
                remaining.is_zero()
            }
            RunState::Fading {
                target,
                elapsed,
                duration,
            } => {
                let LineAction::FadeSprite(spec) = &self.spec else {
                    return ActionStatus::Finished;
                };
                *elapsed = (*elapsed + dt).min(*duration);
                let t = if duration.is_zero() {
                    1.0
                } else {
                    elapsed.as_secs_f32() / duration.as_secs_f32()
                };
                let eased = spec.curve.apply(t);
                let alpha = spec.from_alpha + (spec.to_alpha - spec.from_alpha) * eased;
                env.scene.set_alpha(*target, alpha);
                let done = elapsed >= duration;
                if done && spec.deactivate_on_end {
                    env.scene.set_active(*target, false);
                }
                done
            }
            RunState::Group(sequence) => sequence.poll(env, dt) == ActionStatus::Finished,
        };
        if finished {
            self.state = RunState::Done;
            ActionStatus::Finished
        } else {
            ActionStatus::Running
        }
    }

    /// Abandons the action mid-flight, cancelling nested steps.
    pub fn cancel(&mut self, env: &mut ActionEnv<'_>) {
        if let RunState::Group(sequence) = &mut self.state {
            sequence.cancel(env);
        }
        if matches!(self.spec, LineAction::PlayAudioClip(_))
            && matches!(self.state, RunState::Waiting { .. })
        {
            env.audio.stop();
        }
        self.state = RunState::Done;
    }
}

impl Drop for RunningAction {
    fn drop(&mut self) {
        debug!(kind = self.kind, "disposed action instance");
    }
}

#[cfg(test)]
#[path = "../tests/action_tests.rs"]
mod tests;
