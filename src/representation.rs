//! Resolves which visual a character shows for a given representation and expression.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::character::{
    AssetRef, CharacterProfile, DisplayOptions, DisplayOptionsOverride, ExpressionId,
    Representation, RepresentationKind,
};
use crate::dialogue::{LineRepresentation, RepresentationSlot};

/// Request to spawn a prefab with an expression-specific override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrefabSpawn {
    pub prefab: AssetRef,
    pub animator_override: Option<AssetRef>,
    pub material_override: Option<AssetRef>,
}

/// Renderable result handed to the UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderableExpression {
    Sprite {
        expression: ExpressionId,
        portrait: Option<AssetRef>,
        full_body: Option<AssetRef>,
        display: DisplayOptions,
    },
    Prefab {
        expression: ExpressionId,
        spawn: PrefabSpawn,
        display: DisplayOptions,
    },
}

impl RenderableExpression {
    pub fn expression(&self) -> ExpressionId {
        match self {
            Self::Sprite { expression, .. } | Self::Prefab { expression, .. } => *expression,
        }
    }

    pub fn display(&self) -> &DisplayOptions {
        match self {
            Self::Sprite { display, .. } | Self::Prefab { display, .. } => display,
        }
    }

    fn apply_override(&mut self, patch: &DisplayOptionsOverride) {
        match self {
            Self::Sprite { display, .. } | Self::Prefab { display, .. } => {
                *display = display.with_override(patch);
            }
        }
    }
}

/// A resolved representation for one slot of a line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterVisual {
    pub slot: RepresentationSlot,
    pub character_id: String,
    pub representation: String,
    pub expression: RenderableExpression,
}

/// Resolves `expression` within the representation named `selector`.
///
/// An empty or unknown selector falls back to the profile's first representation, and an unset
/// or unknown expression id falls back to the representation's first entry. Returns `None` only
/// when the profile has no representations or the chosen one has no entries.
pub fn resolve_expression<'a>(
    profile: &'a CharacterProfile,
    selector: &str,
    expression: Option<ExpressionId>,
) -> Option<(&'a Representation, RenderableExpression)> {
    let representation = select_representation(profile, selector)?;
    let renderable = match &representation.kind {
        RepresentationKind::SpriteSet { expressions } => {
            let index = expression_index(
                expressions.iter().map(|entry| entry.id),
                expression,
                profile,
                representation,
            )?;
            let entry = &expressions[index];
            RenderableExpression::Sprite {
                expression: entry.id,
                portrait: entry.portrait.clone(),
                full_body: entry.full_body.clone(),
                display: entry.display,
            }
        }
        RepresentationKind::Prefab {
            prefab,
            expressions,
        } => {
            let index = expression_index(
                expressions.iter().map(|entry| entry.id),
                expression,
                profile,
                representation,
            )?;
            let entry = &expressions[index];
            RenderableExpression::Prefab {
                expression: entry.id,
                spawn: PrefabSpawn {
                    prefab: prefab.clone(),
                    animator_override: entry.animator_override.clone(),
                    material_override: entry.material_override.clone(),
                },
                display: entry.display,
            }
        }
    };
    Some((representation, renderable))
}

/// Resolves a line's representation selection, applying its display override.
pub fn resolve_line_representation(
    profile: &CharacterProfile,
    slot: RepresentationSlot,
    selection: &LineRepresentation,
) -> Option<CharacterVisual> {
    let (representation, mut renderable) =
        resolve_expression(profile, &selection.representation, selection.expression)?;
    if let Some(patch) = &selection.display_override {
        renderable.apply_override(patch);
    }
    Some(CharacterVisual {
        slot,
        character_id: profile.id.clone(),
        representation: representation.name.clone(),
        expression: renderable,
    })
}

fn select_representation<'a>(
    profile: &'a CharacterProfile,
    selector: &str,
) -> Option<&'a Representation> {
    let selector = selector.trim();
    if selector.is_empty() {
        debug!(character = %profile.id, "no representation selected, using the first one");
    } else {
        if let Some(found) = profile.representation(selector) {
            return Some(found);
        }
        warn!(
            character = %profile.id,
            representation = selector,
            "unknown representation, using the first one"
        );
    }
    let first = profile.representations.first();
    if first.is_none() {
        warn!(character = %profile.id, "character has no representations");
    }
    first
}

fn expression_index(
    mut ids: impl Iterator<Item = ExpressionId> + Clone,
    wanted: Option<ExpressionId>,
    profile: &CharacterProfile,
    representation: &Representation,
) -> Option<usize> {
    if ids.clone().next().is_none() {
        warn!(
            character = %profile.id,
            representation = %representation.name,
            "representation has no expressions"
        );
        return None;
    }
    match wanted.filter(|id| !id.is_nil()) {
        Some(wanted) => match ids.position(|id| id == wanted) {
            Some(index) => Some(index),
            None => {
                warn!(
                    character = %profile.id,
                    representation = %representation.name,
                    expression = %wanted,
                    "unknown expression id, using the first entry"
                );
                Some(0)
            }
        },
        None => {
            debug!(
                character = %profile.id,
                representation = %representation.name,
                "no expression selected, using the first entry"
            );
            Some(0)
        }
    }
}

#[cfg(test)]
#[path = "tests/representation_tests.rs"]
mod tests;
