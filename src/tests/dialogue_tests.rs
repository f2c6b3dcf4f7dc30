use super::*;
use crate::character::{Representation, RepresentationKind, SpriteExpression};

fn two_line_conversation() -> Conversation {
    let mut conversation = Conversation::new("intro", "Intro");
    conversation
        .participants
        .push(CharacterProfile::new("alice", "Alice"));
    conversation
        .lines
        .push(DialogueLine::new("intro", 0, "alice").with_text("en", "Hi."));
    conversation
        .lines
        .push(DialogueLine::new("intro", 1, "alice").with_text("en", "Bye."));
    conversation
}

#[test]
fn clamp_line_index_stays_in_range() {
    let conversation = two_line_conversation();
    assert_eq!(conversation.clamp_line_index(0), 0);
    assert_eq!(conversation.clamp_line_index(1), 1);
    assert_eq!(conversation.clamp_line_index(50), 1);
    assert_eq!(Conversation::new("empty", "").clamp_line_index(7), 0);
}

#[test]
fn clean_conversation_has_no_issues() {
    assert!(two_line_conversation().validate().is_empty());
}

#[test]
fn validate_reports_each_problem() {
    let mut conversation = two_line_conversation();
    conversation.lines[1].index = 5;
    conversation.lines[1].character_id = "ghost".to_string();
    conversation.lines[1].texts.clear();
    conversation.lines[0].after_actions.push(None);

    let id = ExpressionId::generate();
    let expression = SpriteExpression {
        id,
        display_name: "smile".to_string(),
        portrait: None,
        full_body: None,
        display: Default::default(),
    };
    let mut duplicate = expression.clone();
    duplicate.display_name = "grin".to_string();
    conversation.participants[0].representations.push(Representation {
        name: "default".to_string(),
        kind: RepresentationKind::SpriteSet {
            expressions: vec![expression, duplicate],
        },
    });

    let kinds: Vec<DataIssueKind> = conversation
        .validate()
        .into_iter()
        .map(|issue| issue.kind)
        .collect();
    assert!(kinds.contains(&DataIssueKind::LineIndexMismatch {
        expected: 1,
        found: 5
    }));
    assert!(kinds.contains(&DataIssueKind::UnknownSpeaker("ghost".to_string())));
    assert!(kinds.contains(&DataIssueKind::MissingTranslations));
    assert!(kinds.contains(&DataIssueKind::NullAction));
    assert!(kinds.contains(&DataIssueKind::DuplicateExpressionId {
        character: "alice".to_string(),
        representation: "default".to_string(),
    }));
}

#[test]
fn representations_iterate_present_slots_in_order() {
    let mut line = DialogueLine::new("intro", 0, "alice");
    let selection = |character: &str| LineRepresentation {
        character_id: character.to_string(),
        representation: String::new(),
        expression: None,
        display_override: None,
    };
    line.tertiary = Some(selection("carol"));
    line.primary = Some(selection("alice"));

    let slots: Vec<(RepresentationSlot, &str)> = line
        .representations()
        .map(|(slot, selection)| (slot, selection.character_id.as_str()))
        .collect();
    assert_eq!(
        slots,
        [
            (RepresentationSlot::Primary, "alice"),
            (RepresentationSlot::Tertiary, "carol")
        ]
    );
}

#[test]
fn line_defaults_fill_in_from_json() {
    let line: DialogueLine = serde_json::from_str(
        r#"{
            "line_id": "intro:0",
            "conversation_id": "intro",
            "index": 0,
            "character_id": "alice",
            "texts": [{ "language": "en", "text": "Hi." }],
            "progression": { "mode": "timed", "duration_secs": 1.5 },
            "continuation": { "mode": "branch", "key": "left" }
        }"#,
    )
    .expect("line should parse");

    assert_eq!(line.progression, Progression::Timed { duration_secs: 1.5 });
    assert_eq!(
        line.continuation,
        Continuation::Branch {
            key: "left".to_string(),
            push_return_point: false
        }
    );
    assert!(line.before_actions.is_empty());
    assert!(line.audio.is_none());
}

#[test]
fn negative_durations_become_zero() {
    assert_eq!(secs(-1.0), Duration::ZERO);
    assert_eq!(secs(f32::NAN), Duration::ZERO);
    assert_eq!(secs(0.5), Duration::from_millis(500));
}
