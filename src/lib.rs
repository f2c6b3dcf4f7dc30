pub mod action;
mod branch;
mod character;
mod config;
mod container;
mod dialogue;
mod error;
mod event;
mod host;
mod language;
mod library;
pub mod localization;
mod player;
mod playlist;
pub mod representation;
mod schema;
mod state;

pub use action::{
    ActionEnv, ActionGroup, ActionSequence, ActionStatus, FadeCurve, FadeSprite, InstantiatePrefab,
    LineAction, ModifyTransform, PlayAudioClip, RunningAction, SetObjectActive, TargetReference,
    TransformPatch, TransformValues, Vec3,
};
pub use branch::{
    resolve_target, BranchContext, BranchEntry, BranchOutcome, BranchTarget,
    ConversationBranchContainer,
};
pub use character::{
    AssetRef, CharacterProfile, DisplayOptions, DisplayOptionsOverride, ExpressionId,
    PrefabExpression, Representation, RepresentationKind, ScreenSide, SpriteExpression,
};
pub use config::{EngineConfig, DEFAULT_MISSING_TRANSLATION_TEXT};
pub use container::{
    BranchSelection, ContainerEntry, ContainerMode, ConversationContainer, SelectionMode,
};
pub use dialogue::{
    AudioClip, Continuation, Conversation, DataIssue, DataIssueKind, DialogueLine,
    LineRepresentation, LocalizedText, Progression, RepresentationSlot,
};
pub use error::{ConvoError, ConvoResult};
pub use event::{PlaybackEvent, SessionId};
pub use host::{
    AudioPlayer, ConversationHooks, DialogueUi, DialogueUpdate, EmptyScene, NoHooks, ObjectHandle,
    ObjectQuery, PlaybackHost, SceneHost,
};
pub use language::LanguageSettings;
pub use library::{ConversationBundle, ConversationLibrary};
pub use localization::{resolve_line_text, resolve_line_text_with, LocalizationResult};
pub use player::ConversationPlayer;
pub use playlist::{ConversationRunner, PlaylistPlayback, PlaylistStatus};
pub use representation::{
    resolve_expression, resolve_line_representation, CharacterVisual, PrefabSpawn,
    RenderableExpression,
};
pub use schema::{conversation_schema, conversation_schema_json};
pub use state::ConversationState;
