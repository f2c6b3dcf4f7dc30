//! Contracts with the collaborators that surround playback: UI, audio, scene and hooks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::{TransformPatch, TransformValues};
use crate::character::{AssetRef, CharacterProfile};
use crate::dialogue::{AudioClip, Conversation, DialogueLine};
use crate::language::LanguageSettings;
use crate::representation::CharacterVisual;

/// Everything the UI needs to show one line.
#[derive(Clone, Copy, Debug)]
pub struct DialogueUpdate<'a> {
    pub line: &'a DialogueLine,
    pub text: &'a str,
    pub speaker_name: &'a str,
    pub visuals: &'a [CharacterVisual],
    pub speaker: &'a CharacterProfile,
}

/// Dialogue presentation.
pub trait DialogueUi {
    fn update_dialogue_ui(&mut self, update: &DialogueUpdate<'_>);

    /// Replaces the text of the line on screen after a language switch.
    fn update_for_language_change(&mut self, text: &str, language: &str);

    /// Polled while a line waits for user input; `true` consumes one advance signal.
    fn poll_user_input(&mut self) -> bool;

    fn display_dialogue(&mut self, _text: &str) {}

    fn hide_dialogue(&mut self) {}

    fn dispose(&mut self) {}
}

/// Voice and sound playback.
pub trait AudioPlayer {
    fn play(&mut self, clip: &AudioClip);

    fn is_playing(&self) -> bool;

    fn stop(&mut self) {}
}

/// Handle to an object living in the host scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct ObjectHandle(pub u64);

/// Ways of locating a scene object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum ObjectQuery {
    Name(String),
    Tag(String),
}

/// Scene operations used by line actions.
pub trait SceneHost {
    fn instantiate(
        &mut self,
        prefab: &AssetRef,
        name: Option<&str>,
        parent: Option<ObjectHandle>,
        placement: &TransformValues,
    ) -> Option<ObjectHandle>;

    /// Finds an object, optionally restricted to the children of `within`.
    fn find(&self, query: &ObjectQuery, within: Option<ObjectHandle>) -> Option<ObjectHandle>;

    fn exists(&self, object: ObjectHandle) -> bool;

    fn set_transform(&mut self, object: ObjectHandle, patch: &TransformPatch);

    fn set_active(&mut self, object: ObjectHandle, active: bool);

    fn set_alpha(&mut self, object: ObjectHandle, alpha: f32);
}

/// Scene that contains nothing; every lookup misses.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyScene;

impl SceneHost for EmptyScene {
    fn instantiate(
        &mut self,
        prefab: &AssetRef,
        _name: Option<&str>,
        _parent: Option<ObjectHandle>,
        _placement: &TransformValues,
    ) -> Option<ObjectHandle> {
        debug!(prefab = prefab.as_str(), "empty scene ignores instantiate");
        None
    }

    fn find(&self, _query: &ObjectQuery, _within: Option<ObjectHandle>) -> Option<ObjectHandle> {
        None
    }

    fn exists(&self, _object: ObjectHandle) -> bool {
        false
    }

    fn set_transform(&mut self, _object: ObjectHandle, _patch: &TransformPatch) {}

    fn set_active(&mut self, _object: ObjectHandle, _active: bool) {}

    fn set_alpha(&mut self, _object: ObjectHandle, _alpha: f32) {}
}

/// Overridable start/end hooks of a session.
pub trait ConversationHooks {
    fn on_conversation_start(&mut self, _conversation: &Conversation) {}

    fn on_conversation_end(&mut self, _conversation: &Conversation) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl ConversationHooks for NoHooks {}

/// Collaborators borrowed for one tick of playback.
pub struct PlaybackHost<'a> {
    pub ui: &'a mut dyn DialogueUi,
    pub audio: &'a mut dyn AudioPlayer,
    pub scene: &'a mut dyn SceneHost,
    pub language: &'a LanguageSettings,
}
