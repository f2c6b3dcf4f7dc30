mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{player, simple_conversation, Harness};
use convo_engine::{
    ContainerEntry, ContainerMode, Conversation, ConversationContainer, ConversationLibrary,
    ConversationRunner, ConversationState, ConvoResult, PlaylistPlayback, PlaylistStatus,
    Progression, SelectionMode, SessionId,
};

/// Runner that finishes a conversation only when told to.
#[derive(Default)]
struct ManualRunner {
    played: Vec<(String, usize)>,
    next: u64,
    completed: Option<SessionId>,
}

impl ManualRunner {
    fn finish_current(&mut self) {
        self.completed = Some(SessionId(self.next));
    }

    fn played_ids(&self) -> Vec<&str> {
        self.played.iter().map(|(id, _)| id.as_str()).collect()
    }
}

impl ConversationRunner for ManualRunner {
    fn play_conversation(
        &mut self,
        conversation: Arc<Conversation>,
        start_line: usize,
    ) -> ConvoResult<SessionId> {
        self.next += 1;
        self.played.push((conversation.id.clone(), start_line));
        Ok(SessionId(self.next))
    }

    fn has_completed(&self, session: SessionId) -> bool {
        self.completed.is_some_and(|done| done >= session)
    }
}

fn library_with(ids: &[&str]) -> ConversationLibrary {
    let mut library = ConversationLibrary::new();
    for id in ids {
        library.insert_conversation(simple_conversation(id, &["line"]));
    }
    library
}

fn playlist(entries: &[(&str, &str)]) -> ConversationContainer {
    entries.iter().fold(
        ConversationContainer::new("chapter", ContainerMode::Playlist, SelectionMode::First),
        |container, (alias, conversation)| {
            container.with_entry(ContainerEntry::new(*alias, *conversation))
        },
    )
}

fn run_passes(playback: &mut PlaylistPlayback, runner: &mut ManualRunner, passes: usize) {
    for _ in 0..passes {
        if playback.tick(runner, Duration::ZERO).expect("tick") == PlaylistStatus::Finished {
            return;
        }
        runner.finish_current();
    }
}

#[test]
fn plays_from_start_alias_and_wraps_once() {
    let library = library_with(&["a", "b", "c"]);
    let container = playlist(&[("first", "a"), ("second", "b"), ("third", "c")]);
    let mut playback = PlaylistPlayback::new(&container, &library, Some("SECOND"), None);
    let mut runner = ManualRunner::default();

    assert_eq!(playback.start_alias(), Some("second"));
    run_passes(&mut playback, &mut runner, 10);

    assert_eq!(runner.played_ids(), ["b", "c", "a"]);
    assert!(playback.is_finished());
}

#[test]
fn start_can_be_found_by_conversation_name() {
    let library = library_with(&["a", "b"]);
    let container = playlist(&[("first", "a"), ("second", "b")]);
    let mut playback = PlaylistPlayback::new(&container, &library, Some("b"), None);
    let mut runner = ManualRunner::default();

    run_passes(&mut playback, &mut runner, 10);
    assert_eq!(runner.played_ids(), ["b", "a"]);
}

#[test]
fn waits_for_the_runner_before_moving_on() {
    let library = library_with(&["a", "b"]);
    let container = playlist(&[("first", "a"), ("second", "b")]);
    let mut playback = PlaylistPlayback::new(&container, &library, None, None);
    let mut runner = ManualRunner::default();

    for _ in 0..3 {
        assert_eq!(
            playback.tick(&mut runner, Duration::from_secs(1)).expect("tick"),
            PlaylistStatus::Running
        );
    }
    assert_eq!(runner.played_ids(), ["a"]);
}

#[test]
fn invalid_and_disabled_entries_are_skipped() {
    let library = library_with(&["a", "c"]);
    let mut container = playlist(&[("first", "a"), ("broken", "missing"), ("third", "c")]);
    container.entries.push(ContainerEntry {
        enabled: false,
        ..ContainerEntry::new("off", "a")
    });
    let mut playback = PlaylistPlayback::new(&container, &library, Some("broken"), None);
    let mut runner = ManualRunner::default();

    // The dropped start entry hands over to the next kept one.
    assert_eq!(playback.start_alias(), Some("third"));
    run_passes(&mut playback, &mut runner, 10);
    assert_eq!(runner.played_ids(), ["c", "a"]);
}

#[test]
fn post_delay_holds_the_next_entry() {
    let library = library_with(&["a", "b"]);
    let mut container = playlist(&[("first", "a"), ("second", "b")]);
    container.entries[0].post_delay_secs = 2.0;
    let mut playback = PlaylistPlayback::new(&container, &library, None, None);
    let mut runner = ManualRunner::default();

    playback.tick(&mut runner, Duration::ZERO).expect("tick");
    runner.finish_current();
    playback.tick(&mut runner, Duration::ZERO).expect("tick");
    playback.tick(&mut runner, Duration::from_secs(1)).expect("tick");
    assert_eq!(runner.played_ids(), ["a"]);

    playback.tick(&mut runner, Duration::from_secs(1)).expect("tick");
    assert_eq!(runner.played_ids(), ["a", "b"]);
}

#[test]
fn loop_override_keeps_playing() {
    let library = library_with(&["a", "b"]);
    let container = playlist(&[("first", "a"), ("second", "b")]);
    let mut playback = PlaylistPlayback::new(&container, &library, None, Some(true));
    let mut runner = ManualRunner::default();

    assert!(playback.is_looping());
    run_passes(&mut playback, &mut runner, 5);
    assert_eq!(runner.played_ids(), ["a", "b", "a", "b", "a"]);
    assert!(!playback.is_finished());
}

#[test]
fn nothing_playable_finishes_immediately() {
    let library = library_with(&[]);
    let container = playlist(&[("ghost", "missing")]);
    let mut playback = PlaylistPlayback::new(&container, &library, None, Some(true));
    let mut runner = ManualRunner::default();

    assert_eq!(
        playback.tick(&mut runner, Duration::ZERO).expect("tick"),
        PlaylistStatus::Finished
    );
    assert!(runner.played.is_empty());
}

#[test]
fn drives_a_real_player_through_timed_conversations() {
    let mut library = ConversationLibrary::new();
    for (id, text) in [("morning", "Good morning"), ("evening", "Good evening")] {
        let mut conversation = simple_conversation(id, &[text]);
        conversation.lines[0].progression = Progression::Timed { duration_secs: 0.5 };
        library.insert_conversation(conversation);
    }
    let container = ConversationContainer::new("day", ContainerMode::Playlist, SelectionMode::First)
        .with_entry(ContainerEntry::new("am", "morning"))
        .with_entry(ContainerEntry::new("pm", "evening"));
    let mut playback = PlaylistPlayback::new(&container, &library, None, None);
    let mut player = player(library);
    let mut harness = Harness::new("en");

    let mut finished = false;
    for _ in 0..20 {
        let dt = Duration::from_millis(250);
        if playback.tick(&mut player, dt).expect("tick") == PlaylistStatus::Finished {
            finished = true;
            break;
        }
        harness.tick(&mut player, dt);
    }

    assert!(finished);
    assert_eq!(harness.shown_texts(), ["Good morning", "Good evening"]);
    assert_eq!(player.state(), ConversationState::Idle);
}
