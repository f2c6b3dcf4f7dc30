//! Character profiles and their visual representations.
//!
//! # Contracts
//! - **Invariant**: an expression's `id` never changes once generated; `display_name` may.
//! - **Invariant**: references to expressions are stored by `id`, never by display name.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an expression mapping entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExpressionId(Uuid);

impl ExpressionId {
    /// Generates a fresh, globally unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl std::fmt::Display for ExpressionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to an engine-side asset (sprite, prefab, clip, controller).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssetRef(pub String);

impl AssetRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which side of the dialogue box a character is drawn on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScreenSide {
    #[default]
    Left,
    Center,
    Right,
}

/// How a resolved expression is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DisplayOptions {
    pub flip_x: bool,
    pub flip_y: bool,
    pub scale: f32,
    pub side: ScreenSide,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            flip_x: false,
            flip_y: false,
            scale: 1.0,
            side: ScreenSide::Left,
        }
    }
}

/// Per-line display tweaks. Every present field replaces its counterpart outright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DisplayOptionsOverride {
    pub flip_x: Option<bool>,
    pub flip_y: Option<bool>,
    pub scale: Option<f32>,
    pub side: Option<ScreenSide>,
}

impl DisplayOptions {
    pub fn with_override(self, patch: &DisplayOptionsOverride) -> Self {
        Self {
            flip_x: patch.flip_x.unwrap_or(self.flip_x),
            flip_y: patch.flip_y.unwrap_or(self.flip_y),
            scale: patch.scale.unwrap_or(self.scale),
            side: patch.side.unwrap_or(self.side),
        }
    }
}

/// Sprite pair for one expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpriteExpression {
    pub id: ExpressionId,
    pub display_name: String,
    pub portrait: Option<AssetRef>,
    pub full_body: Option<AssetRef>,
    #[serde(default)]
    pub display: DisplayOptions,
}

/// Animator/material override for one expression of a prefab representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PrefabExpression {
    pub id: ExpressionId,
    pub display_name: String,
    pub animator_override: Option<AssetRef>,
    #[serde(default)]
    pub material_override: Option<AssetRef>,
    #[serde(default)]
    pub display: DisplayOptions,
}

/// Visual payload of a representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepresentationKind {
    SpriteSet {
        expressions: Vec<SpriteExpression>,
    },
    Prefab {
        prefab: AssetRef,
        expressions: Vec<PrefabExpression>,
    },
}

/// A named visual bundle of a character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Representation {
    pub name: String,
    #[serde(flatten)]
    pub kind: RepresentationKind,
}

impl Representation {
    pub fn expression_count(&self) -> usize {
        match &self.kind {
            RepresentationKind::SpriteSet { expressions } => expressions.len(),
            RepresentationKind::Prefab { expressions, .. } => expressions.len(),
        }
    }

    /// Ids of all expression entries, in authored order.
    pub fn expression_ids(&self) -> Vec<ExpressionId> {
        match &self.kind {
            RepresentationKind::SpriteSet { expressions } => {
                expressions.iter().map(|entry| entry.id).collect()
            }
            RepresentationKind::Prefab { expressions, .. } => {
                expressions.iter().map(|entry| entry.id).collect()
            }
        }
    }

    /// Looks up the id of the first expression with the given display name.
    ///
    /// For authoring tools only; playback references expressions by id.
    pub fn expression_id_by_display_name(&self, display_name: &str) -> Option<ExpressionId> {
        match &self.kind {
            RepresentationKind::SpriteSet { expressions } => expressions
                .iter()
                .find(|entry| entry.display_name == display_name)
                .map(|entry| entry.id),
            RepresentationKind::Prefab { expressions, .. } => expressions
                .iter()
                .find(|entry| entry.display_name == display_name)
                .map(|entry| entry.id),
        }
    }
}

/// A speaking or displayed character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterProfile {
    pub id: String,
    pub display_name: String,
    /// Hex color for the name plate, e.g. `#ffcc00`.
    #[serde(default)]
    pub name_color: Option<String>,
    #[serde(default)]
    pub is_player: bool,
    /// Token in line text replaced by `player_name` (e.g. `{PlayerName}`).
    #[serde(default)]
    pub player_placeholder: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub representations: Vec<Representation>,
}

impl CharacterProfile {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            name_color: None,
            is_player: false,
            player_placeholder: None,
            player_name: None,
            representations: Vec::new(),
        }
    }

    pub fn representation(&self, name: &str) -> Option<&Representation> {
        self.representations.iter().find(|rep| rep.name == name)
    }

    /// Name shown on the dialogue plate.
    pub fn speaker_name(&self) -> &str {
        match self.player_name.as_deref() {
            Some(name) if self.is_player && !name.trim().is_empty() => name,
            _ => &self.display_name,
        }
    }
}
