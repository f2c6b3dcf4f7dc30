#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use convo_engine::{
    AssetRef, AudioClip, AudioPlayer, CharacterProfile, CharacterVisual, Conversation,
    ConversationHooks, ConversationLibrary, ConversationPlayer, ConversationState, DialogueLine,
    DialogueUi, DialogueUpdate, EngineConfig, LanguageSettings, ObjectHandle, ObjectQuery,
    PlaybackHost, SceneHost, TransformPatch, TransformValues,
};

/// Ordered record of every collaborator call, shared by the fakes.
pub type Journal = Rc<RefCell<Vec<String>>>;

#[derive(Clone, Debug, PartialEq)]
pub struct ShownLine {
    pub index: usize,
    pub text: String,
    pub speaker: String,
    pub visuals: Vec<CharacterVisual>,
}

#[derive(Default)]
pub struct RecordingUi {
    journal: Journal,
    pub shown: Vec<ShownLine>,
    pub language_changes: Vec<(String, String)>,
    pub advances: usize,
    pub opened: usize,
    pub hidden: usize,
    pub disposed: usize,
}

impl DialogueUi for RecordingUi {
    fn update_dialogue_ui(&mut self, update: &DialogueUpdate<'_>) {
        self.journal.borrow_mut().push(format!("ui:{}", update.text));
        self.shown.push(ShownLine {
            index: update.line.index,
            text: update.text.to_string(),
            speaker: update.speaker_name.to_string(),
            visuals: update.visuals.to_vec(),
        });
    }

    fn update_for_language_change(&mut self, text: &str, language: &str) {
        self.journal
            .borrow_mut()
            .push(format!("ui:language:{language}:{text}"));
        self.language_changes
            .push((text.to_string(), language.to_string()));
    }

    fn poll_user_input(&mut self) -> bool {
        if self.advances == 0 {
            return false;
        }
        self.advances -= 1;
        true
    }

    fn display_dialogue(&mut self, _text: &str) {
        self.opened += 1;
        self.journal.borrow_mut().push("ui:open".to_string());
    }

    fn hide_dialogue(&mut self) {
        self.hidden += 1;
        self.journal.borrow_mut().push("ui:hide".to_string());
    }

    fn dispose(&mut self) {
        self.disposed += 1;
    }
}

/// Audio that reports "playing" for a fixed number of polls after each `play`.
#[derive(Default)]
pub struct ScriptedAudio {
    journal: Journal,
    pub polls_per_clip: usize,
    busy: Cell<usize>,
    pub played: Vec<String>,
    pub stops: usize,
}

impl AudioPlayer for ScriptedAudio {
    fn play(&mut self, clip: &AudioClip) {
        self.journal
            .borrow_mut()
            .push(format!("audio:{}", clip.asset.as_str()));
        self.played.push(clip.asset.as_str().to_string());
        self.busy.set(self.polls_per_clip);
    }

    fn is_playing(&self) -> bool {
        let busy = self.busy.get();
        if busy == 0 {
            return false;
        }
        self.busy.set(busy - 1);
        true
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.busy.set(0);
    }
}

#[derive(Default)]
pub struct RecordingScene {
    journal: Journal,
    names: HashMap<String, ObjectHandle>,
    pub active: HashMap<String, bool>,
    next_handle: u64,
}

impl RecordingScene {
    pub fn add(&mut self, name: &str) -> ObjectHandle {
        self.next_handle += 1;
        let handle = ObjectHandle(self.next_handle);
        self.names.insert(name.to_string(), handle);
        self.active.insert(name.to_string(), false);
        handle
    }

    fn name_of(&self, object: ObjectHandle) -> Option<String> {
        self.names
            .iter()
            .find(|(_, handle)| **handle == object)
            .map(|(name, _)| name.clone())
    }
}

impl SceneHost for RecordingScene {
    fn instantiate(
        &mut self,
        prefab: &AssetRef,
        name: Option<&str>,
        _parent: Option<ObjectHandle>,
        _placement: &TransformValues,
    ) -> Option<ObjectHandle> {
        let name = name.unwrap_or(prefab.as_str()).to_string();
        self.journal
            .borrow_mut()
            .push(format!("scene:spawn:{name}"));
        Some(self.add(&name))
    }

    fn find(&self, query: &ObjectQuery, _within: Option<ObjectHandle>) -> Option<ObjectHandle> {
        match query {
            ObjectQuery::Name(name) => self.names.get(name).copied(),
            ObjectQuery::Tag(_) => None,
        }
    }

    fn exists(&self, object: ObjectHandle) -> bool {
        self.name_of(object).is_some()
    }

    fn set_transform(&mut self, _object: ObjectHandle, _patch: &TransformPatch) {}

    fn set_active(&mut self, object: ObjectHandle, active: bool) {
        if let Some(name) = self.name_of(object) {
            self.journal
                .borrow_mut()
                .push(format!("scene:{name}:{active}"));
            self.active.insert(name, active);
        }
    }

    fn set_alpha(&mut self, _object: ObjectHandle, _alpha: f32) {}
}

/// Fake collaborators plus the language context, wired to one journal.
pub struct Harness {
    pub ui: RecordingUi,
    pub audio: ScriptedAudio,
    pub scene: RecordingScene,
    pub language: LanguageSettings,
    journal: Journal,
}

impl Harness {
    pub fn new(current_language: &str) -> Self {
        let journal = Journal::default();
        Self {
            ui: RecordingUi {
                journal: Rc::clone(&journal),
                ..RecordingUi::default()
            },
            audio: ScriptedAudio {
                journal: Rc::clone(&journal),
                ..ScriptedAudio::default()
            },
            scene: RecordingScene {
                journal: Rc::clone(&journal),
                ..RecordingScene::default()
            },
            language: LanguageSettings::new(
                vec!["en".to_string(), "fr".to_string()],
                current_language,
            ),
            journal,
        }
    }

    pub fn tick(&mut self, player: &mut ConversationPlayer, dt: Duration) -> ConversationState {
        let mut host = PlaybackHost {
            ui: &mut self.ui,
            audio: &mut self.audio,
            scene: &mut self.scene,
            language: &self.language,
        };
        player.tick(&mut host, dt)
    }

    pub fn stop(&mut self, player: &mut ConversationPlayer) -> bool {
        let mut host = PlaybackHost {
            ui: &mut self.ui,
            audio: &mut self.audio,
            scene: &mut self.scene,
            language: &self.language,
        };
        player.stop_conversation(&mut host)
    }

    pub fn refresh_language(&mut self, player: &mut ConversationPlayer) -> bool {
        let mut host = PlaybackHost {
            ui: &mut self.ui,
            audio: &mut self.audio,
            scene: &mut self.scene,
            language: &self.language,
        };
        player.refresh_language(&mut host)
    }

    pub fn advance(&mut self) {
        self.ui.advances += 1;
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    pub fn shown_texts(&self) -> Vec<String> {
        self.ui.shown.iter().map(|line| line.text.clone()).collect()
    }
}

#[derive(Clone, Default)]
pub struct CountingHooks {
    pub starts: Rc<Cell<usize>>,
    pub ends: Rc<Cell<usize>>,
}

impl ConversationHooks for CountingHooks {
    fn on_conversation_start(&mut self, _conversation: &Conversation) {
        self.starts.set(self.starts.get() + 1);
    }

    fn on_conversation_end(&mut self, _conversation: &Conversation) {
        self.ends.set(self.ends.get() + 1);
    }
}

pub fn seeded_config() -> EngineConfig {
    EngineConfig {
        supported_languages: vec!["en".to_string(), "fr".to_string()],
        rng_seed: Some(7),
        ..EngineConfig::default()
    }
}

pub fn player(library: ConversationLibrary) -> ConversationPlayer {
    ConversationPlayer::new(seeded_config(), Arc::new(library))
}

/// Conversation spoken by "alice", one English line per text.
pub fn simple_conversation(id: &str, texts: &[&str]) -> Conversation {
    let mut conversation = Conversation::new(id, id);
    conversation
        .participants
        .push(CharacterProfile::new("alice", "Alice"));
    for (index, text) in texts.iter().enumerate() {
        conversation
            .lines
            .push(DialogueLine::new(id, index, "alice").with_text("en", text));
    }
    conversation
}

/// Runs ticks with an advance queued before each one until the player goes idle.
pub fn play_to_end(harness: &mut Harness, player: &mut ConversationPlayer, max_ticks: usize) {
    for _ in 0..max_ticks {
        if harness.tick(player, Duration::from_millis(100)) == ConversationState::Idle {
            return;
        }
        harness.advance();
    }
    panic!("conversation did not finish within {max_ticks} ticks");
}
