use std::sync::Arc;

use convo_engine::{
    BranchTarget, ContainerMode, ConversationBundle, ConversationLibrary, ConvoError,
    DataIssueKind, EngineConfig, SelectionMode,
};

const BUNDLE: &str = r#"{
    "conversations": [
        {
            "id": "intro",
            "name": "Intro",
            "participants": [{ "id": "alice", "display_name": "Alice" }],
            "lines": [
                {
                    "line_id": "intro:0",
                    "conversation_id": "intro",
                    "index": 0,
                    "character_id": "alice",
                    "texts": [{ "language": "en", "text": "Hello" }]
                },
                {
                    "line_id": "intro:1",
                    "conversation_id": "intro",
                    "index": 1,
                    "character_id": "bob",
                    "texts": []
                }
            ]
        }
    ],
    "containers": [
        {
            "name": "greetings",
            "mode": "selector",
            "selection": "sequential",
            "entries": [
                { "alias": "hi", "conversation": "intro" },
                { "alias": "lost", "conversation": "missing" }
            ]
        }
    ],
    "branch_tables": [
        {
            "name": "routes",
            "entries": [
                { "key": "again", "target": "conversation_line", "line_index": 0 },
                { "key": "done", "target": "end_conversation" }
            ]
        }
    ]
}"#;

#[test]
fn bundle_loads_into_library() {
    let bundle = ConversationBundle::from_json(BUNDLE).expect("bundle parses");
    let library = ConversationLibrary::from_bundle(bundle).expect("library builds");

    let intro = library.conversation("intro").expect("intro present");
    assert_eq!(intro.line_count(), 2);

    let container = library.container("greetings").expect("container present");
    assert_eq!(container.mode, ContainerMode::Selector);
    assert_eq!(container.selection, SelectionMode::Sequential);
    assert!(container.entries[0].enabled);
    assert_eq!(container.entries[0].weight, 1.0);

    let routes = library.branch_table("routes").expect("table present");
    assert_eq!(
        routes.entry("AGAIN").map(|entry| &entry.target),
        Some(&BranchTarget::ConversationLine {
            conversation: None,
            line_index: 0
        })
    );
}

#[test]
fn library_validation_collects_issues() {
    let bundle = ConversationBundle::from_json(BUNDLE).expect("bundle parses");
    let library = ConversationLibrary::from_bundle(bundle).expect("library builds");

    let kinds: Vec<DataIssueKind> = library.validate().into_iter().map(|issue| issue.kind).collect();
    assert!(kinds.contains(&DataIssueKind::UnknownSpeaker("bob".to_string())));
    assert!(kinds.contains(&DataIssueKind::MissingTranslations));
    assert!(kinds.contains(&DataIssueKind::DanglingContainerEntry {
        container: "greetings".to_string(),
        alias: "lost".to_string(),
    }));
}

#[test]
fn duplicate_conversation_ids_are_rejected() {
    let mut bundle = ConversationBundle::from_json(BUNDLE).expect("bundle parses");
    let copy = bundle.conversations[0].clone();
    bundle.conversations.push(copy);

    let err = ConversationLibrary::from_bundle(bundle).unwrap_err();
    assert!(matches!(err, ConvoError::InvalidData(message) if message.contains("intro")));
}

#[test]
fn malformed_json_points_at_the_error() {
    let input = "{\n  \"conversations\": [\n    { \"id\": 5 }\n  ]\n}";
    let err = ConversationBundle::from_json(input).unwrap_err();
    match err {
        ConvoError::Serialization { src, span, .. } => {
            assert_eq!(src, input);
            let line_three = input.find("{ \"id\"").expect("line exists");
            assert!(span.offset() >= line_three);
        }
        other => panic!("expected serialization error, got {other:?}"),
    }
}

#[test]
fn bundle_survives_json_export() {
    let bundle = ConversationBundle::from_json(BUNDLE).expect("bundle parses");
    let exported = bundle.to_json().expect("export");
    let reparsed = ConversationBundle::from_json(&exported).expect("reparse");
    assert_eq!(reparsed.conversations, bundle.conversations);
    assert_eq!(reparsed.branch_tables, bundle.branch_tables);
}

#[test]
fn sequential_cursor_is_shared_through_the_library() {
    let bundle = ConversationBundle::from_json(BUNDLE).expect("bundle parses");
    let library = ConversationLibrary::from_bundle(bundle).expect("library builds");
    let first = library.container("greetings").expect("container");
    let second = library.container("greetings").expect("container");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn config_round_trips_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("engine.toml");
    let config = EngineConfig {
        default_language: "fr".to_string(),
        supported_languages: vec!["en".to_string(), "fr".to_string()],
        rng_seed: Some(42),
        ..EngineConfig::default()
    };

    config.save(&path).expect("save");
    let loaded = EngineConfig::load(&path).expect("load");
    assert_eq!(loaded, config);

    let missing = EngineConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConvoError::ConfigNotFound(_)));
}
