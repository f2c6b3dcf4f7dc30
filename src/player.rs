//! Line-by-line playback of one conversation at a time.
//!
//! The player is a phase machine polled with [`ConversationPlayer::tick`]. Every point where a
//! line waits (actions, voice audio, user input, timers) is a phase, so a host drives playback
//! from its frame loop without handing the player a thread or an executor.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, instrument, warn};

use crate::action::{ActionEnv, ActionSequence, ActionStatus};
use crate::branch::{BranchContext, BranchOutcome, ConversationBranchContainer};
use crate::character::CharacterProfile;
use crate::config::EngineConfig;
use crate::dialogue::{
    secs, Continuation, Conversation, DialogueLine, Progression, RepresentationSlot,
};
use crate::error::{ConvoError, ConvoResult};
use crate::event::{PlaybackEvent, SessionId};
use crate::host::{ConversationHooks, DialogueUpdate, NoHooks, PlaybackHost};
use crate::library::ConversationLibrary;
use crate::localization::{resolve_line_text_with, substitute_player_name, LocalizationResult};
use crate::playlist::ConversationRunner;
use crate::representation::{resolve_expression, resolve_line_representation, CharacterVisual};
use crate::state::ConversationState;

/// Plays conversations against the collaborators passed to each tick.
pub struct ConversationPlayer {
    config: EngineConfig,
    library: Arc<ConversationLibrary>,
    branch_table: Option<Arc<ConversationBranchContainer>>,
    hooks: Box<dyn ConversationHooks>,
    rng: StdRng,
    state: ConversationState,
    session: Option<Session>,
    next_session: u64,
    last_completed: Option<SessionId>,
    events: Vec<PlaybackEvent>,
}

struct ReturnPoint {
    conversation: Arc<Conversation>,
    line: usize,
}

struct Session {
    id: SessionId,
    origin: Arc<Conversation>,
    conversation: Arc<Conversation>,
    /// Line whose pipeline is running.
    line: usize,
    /// Externally visible cursor; differs from `line` after a jump until the line finishes.
    cursor: usize,
    pending_jump: Option<usize>,
    phase: Phase,
    return_stack: Vec<ReturnPoint>,
    resolved: LocalizationResult,
    text: String,
    /// Line on screen, keyed by its own conversation since branches swap `conversation`.
    displayed: Option<(Arc<Conversation>, usize)>,
    opened: bool,
    language_revision: Option<u64>,
}

enum Phase {
    Begin,
    BeforeActions(ActionSequence),
    Audio { started: bool },
    Present,
    AwaitInput,
    AwaitTimer { remaining: Duration },
    AfterActions(ActionSequence),
    Advance,
}

enum Flow {
    Continue,
    Suspend,
    Finished,
}

impl Session {
    fn new(id: SessionId, conversation: Arc<Conversation>, line: usize) -> Self {
        Self {
            id,
            origin: Arc::clone(&conversation),
            conversation,
            line,
            cursor: line,
            pending_jump: None,
            phase: Phase::Begin,
            return_stack: Vec::new(),
            resolved: LocalizationResult::default(),
            text: String::new(),
            displayed: None,
            opened: false,
            language_revision: None,
        }
    }

    /// Moves to `index`, unwinding return points while the target is past the end.
    fn move_to(&mut self, index: usize) -> Flow {
        let mut index = index;
        while index >= self.conversation.line_count() {
            let Some(point) = self.return_stack.pop() else {
                return Flow::Finished;
            };
            debug!(
                conversation = %point.conversation.id,
                line = point.line,
                "returning to branch origin"
            );
            self.conversation = point.conversation;
            index = point.line;
        }
        self.line = index;
        self.cursor = index;
        self.phase = Phase::Begin;
        Flow::Continue
    }

    fn next_line(&mut self) -> usize {
        self.pending_jump.take().unwrap_or(self.line + 1)
    }

    fn displays_current_line(&self) -> bool {
        self.displayed.as_ref().is_some_and(|(conversation, index)| {
            *index == self.line && Arc::ptr_eq(conversation, &self.conversation)
        })
    }

    /// Whether the in-flight line has resolved text that is not on screen yet.
    fn presentation_pending(&self) -> bool {
        matches!(
            self.phase,
            Phase::BeforeActions(_) | Phase::Audio { .. } | Phase::Present
        )
    }
}

impl ConversationPlayer {
    pub fn new(config: EngineConfig, library: Arc<ConversationLibrary>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            library,
            branch_table: None,
            hooks: Box::new(NoHooks),
            rng,
            state: ConversationState::Idle,
            session: None,
            next_session: 0,
            last_completed: None,
            events: Vec::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: impl ConversationHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Table consulted by lines that continue through a named branch.
    pub fn with_branch_table(mut self, table: Arc<ConversationBranchContainer>) -> Self {
        self.branch_table = Some(table);
        self
    }

    pub fn set_branch_table(&mut self, table: Option<Arc<ConversationBranchContainer>>) {
        self.branch_table = table;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<ConversationLibrary> {
        &self.library
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn current_conversation(&self) -> Option<&Arc<Conversation>> {
        self.session.as_ref().map(|session| &session.conversation)
    }

    /// Current line cursor; `None` outside a session.
    pub fn current_dialogue_line(&self) -> Option<usize> {
        self.session.as_ref().map(|session| session.cursor)
    }

    pub fn return_depth(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.return_stack.len())
    }

    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Starts `conversation` at its first line.
    pub fn start_conversation(
        &mut self,
        conversation: Option<Arc<Conversation>>,
    ) -> ConvoResult<SessionId> {
        self.start_conversation_at(conversation, 0)
    }

    /// Starts the library conversation with the given id.
    pub fn start_by_id(&mut self, id: &str) -> ConvoResult<SessionId> {
        let conversation = self.library.conversation(id);
        if conversation.is_none() {
            warn!(conversation = id, "no conversation with this id in the library");
        }
        self.start_conversation(conversation)
    }

    /// Starts whatever a library container selects, using the player's random source.
    pub fn start_from_container(
        &mut self,
        container: &str,
        alias_or_name: Option<&str>,
    ) -> ConvoResult<SessionId> {
        let Some(found) = self.library.container(container) else {
            warn!(container, "no container with this name in the library");
            return Err(ConvoError::EmptyContainer(container.to_string()));
        };
        let Some(selection) =
            found.resolve_for_branch(self.library.as_ref(), alias_or_name, &mut self.rng)
        else {
            return Err(ConvoError::EmptyContainer(container.to_string()));
        };
        self.start_conversation_at(Some(selection.conversation), selection.start_line)
    }

    /// Starts `conversation` at `start_line`, clamped into range.
    ///
    /// A session still in progress is abandoned first: its hooks run but the UI is left alone,
    /// since no host is available here. Use [`Self::stop_conversation`] for a clean stop.
    #[instrument(skip_all, fields(start_line = start_line))]
    pub fn start_conversation_at(
        &mut self,
        conversation: Option<Arc<Conversation>>,
        start_line: usize,
    ) -> ConvoResult<SessionId> {
        let Some(conversation) = conversation else {
            error!("cannot start playback without conversation data");
            return Err(ConvoError::MissingConversation);
        };
        if let Some(previous) = self.session.take() {
            warn!(session = %previous.id, "restarting while a session is active, abandoning it");
            self.finish(previous, None);
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);
        let line = conversation.clamp_line_index(start_line);

        self.transition(ConversationState::Starting);
        self.hooks.on_conversation_start(&conversation);
        info!(session = %id, conversation = %conversation.id, line, "conversation started");
        self.session = Some(Session::new(id, conversation, line));
        self.transition(ConversationState::Playing);
        Ok(id)
    }

    /// Advances playback by `dt`, running every phase that can complete without waiting.
    #[instrument(level = "trace", skip_all)]
    pub fn tick(&mut self, host: &mut PlaybackHost<'_>, dt: Duration) -> ConversationState {
        let Some(mut session) = self.session.take() else {
            return self.state;
        };
        self.sync_language(&mut session, host, false);

        let mut dt = dt;
        let mut flow = Flow::Continue;
        for _ in 0..self.config.max_steps_per_tick.max(1) {
            flow = self.step(&mut session, host, std::mem::take(&mut dt));
            if !matches!(flow, Flow::Continue) {
                break;
            }
        }
        match flow {
            Flow::Finished => self.finish(session, Some(host)),
            Flow::Continue => {
                warn!(
                    max_steps = self.config.max_steps_per_tick,
                    "step budget exhausted, yielding until the next tick"
                );
                self.session = Some(session);
            }
            Flow::Suspend => self.session = Some(session),
        }
        self.state
    }

    /// Re-pushes the displayed line's text in the active language.
    ///
    /// Ticks do this on their own when the language revision changes; hosts call it to force a
    /// refresh. Returns whether the UI was updated.
    #[instrument(skip_all)]
    pub fn refresh_language(&mut self, host: &mut PlaybackHost<'_>) -> bool {
        let Some(mut session) = self.session.take() else {
            debug!("no active session, nothing to refresh");
            return false;
        };
        let refreshed = self.sync_language(&mut session, host, true);
        self.session = Some(session);
        refreshed
    }

    /// Moves the line cursor while playing.
    ///
    /// The line in flight finishes its pipeline first; playback then continues at `index`
    /// instead of following the line's continuation. Out-of-range requests are ignored.
    #[instrument(skip_all, fields(index = index))]
    pub fn change_current_dialogue_line(&mut self, index: usize) -> bool {
        if self.state != ConversationState::Playing {
            warn!(state = %self.state, "line jump ignored outside playback");
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let count = session.conversation.line_count();
        if index >= count {
            warn!(index, count, "line jump out of range, ignoring");
            return false;
        }
        debug!(from = session.cursor, to = index, "line cursor moved");
        session.cursor = index;
        session.pending_jump = Some(index);
        true
    }

    /// Cancels the active session: running actions are dropped, audio stops and the UI hides.
    #[instrument(skip_all)]
    pub fn stop_conversation(&mut self, host: &mut PlaybackHost<'_>) -> bool {
        let Some(mut session) = self.session.take() else {
            debug!("no active session to stop");
            return false;
        };
        info!(session = %session.id, "stopping conversation");
        match &mut session.phase {
            Phase::BeforeActions(sequence) | Phase::AfterActions(sequence) => {
                let mut env = ActionEnv {
                    scene: &mut *host.scene,
                    audio: &mut *host.audio,
                };
                sequence.cancel(&mut env);
            }
            Phase::Audio { started: true } => host.audio.stop(),
            _ => {}
        }
        session.phase = Phase::Begin;
        self.finish(session, Some(host));
        true
    }

    /// Stops any session and releases the UI.
    pub fn shutdown(&mut self, host: &mut PlaybackHost<'_>) {
        self.stop_conversation(host);
        host.ui.dispose();
    }

    fn transition(&mut self, to: ConversationState) {
        let from = self.state;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "unexpected state transition");
        }
        debug!(%from, %to, "state transition");
        self.state = to;
        self.events.push(PlaybackEvent::StateChanged { from, to });
    }

    fn finish(&mut self, session: Session, host: Option<&mut PlaybackHost<'_>>) {
        if let Some(host) = host.filter(|_| session.opened) {
            host.ui.hide_dialogue();
        }
        self.transition(ConversationState::Ended);
        self.hooks.on_conversation_end(&session.origin);
        self.transition(ConversationState::Idle);
        info!(
            session = %session.id,
            conversation = %session.origin.id,
            "conversation finished"
        );
        self.last_completed = Some(session.id);
        self.events.push(PlaybackEvent::Completed {
            session: session.id,
        });
    }

    fn step(&mut self, session: &mut Session, host: &mut PlaybackHost<'_>, dt: Duration) -> Flow {
        let conversation = Arc::clone(&session.conversation);
        let Some(line) = conversation.line(session.line) else {
            let index = session.line;
            return session.move_to(index);
        };

        match &mut session.phase {
            Phase::Begin => self.begin_line(session, host, &conversation, line),
            Phase::BeforeActions(sequence) => {
                let mut env = ActionEnv {
                    scene: &mut *host.scene,
                    audio: &mut *host.audio,
                };
                if sequence.poll(&mut env, dt) == ActionStatus::Running {
                    return Flow::Suspend;
                }
                session.text = player_text(&conversation, &session.resolved.text);
                session.phase = Phase::Audio { started: false };
                Flow::Continue
            }
            Phase::Audio { started } => {
                let Some(clip) = &line.audio else {
                    session.phase = Phase::Present;
                    return Flow::Continue;
                };
                if !*started {
                    *started = true;
                    debug!(clip = clip.asset.as_str(), "playing line audio");
                    host.audio.play(clip);
                }
                if host.audio.is_playing() {
                    return Flow::Suspend;
                }
                session.phase = Phase::Present;
                Flow::Continue
            }
            Phase::Present => self.present_line(session, host, &conversation, line),
            Phase::AwaitInput => {
                if !host.ui.poll_user_input() {
                    return Flow::Suspend;
                }
                session.phase = Phase::AfterActions(ActionSequence::new(&line.after_actions));
                Flow::Continue
            }
            Phase::AwaitTimer { remaining } => {
                *remaining = remaining.saturating_sub(dt);
                if !remaining.is_zero() {
                    return Flow::Suspend;
                }
                session.phase = Phase::AfterActions(ActionSequence::new(&line.after_actions));
                Flow::Continue
            }
            Phase::AfterActions(sequence) => {
                let mut env = ActionEnv {
                    scene: &mut *host.scene,
                    audio: &mut *host.audio,
                };
                if sequence.poll(&mut env, dt) == ActionStatus::Running {
                    return Flow::Suspend;
                }
                session.phase = Phase::Advance;
                Flow::Continue
            }
            Phase::Advance => self.advance(session, line),
        }
    }

    fn begin_line(
        &mut self,
        session: &mut Session,
        host: &PlaybackHost<'_>,
        conversation: &Conversation,
        line: &DialogueLine,
    ) -> Flow {
        if conversation.participant(&line.character_id).is_none() {
            error!(
                conversation = %conversation.id,
                line = session.line,
                character = %line.character_id,
                "speaker profile not found, skipping line"
            );
            self.events.push(PlaybackEvent::LineSkipped {
                conversation: conversation.id.clone(),
                index: session.line,
                reason: format!("unknown speaker '{}'", line.character_id),
            });
            let next = session.next_line();
            return session.move_to(next);
        }

        session.resolved = self.resolve_text(conversation, session.line, line, host);
        session.text = session.resolved.text.clone();
        session.phase = Phase::BeforeActions(ActionSequence::new(&line.before_actions));
        Flow::Continue
    }

    fn resolve_text(
        &self,
        conversation: &Conversation,
        index: usize,
        line: &DialogueLine,
        host: &PlaybackHost<'_>,
    ) -> LocalizationResult {
        let resolved = resolve_line_text_with(
            &line.texts,
            host.language.current(),
            &self.config.missing_translation_text,
        );
        if !resolved.success {
            error!(
                conversation = %conversation.id,
                line = index,
                diagnostic = %resolved.diagnostic,
                "line text could not be localized"
            );
        } else if resolved.is_fallback {
            warn!(
                conversation = %conversation.id,
                line = index,
                diagnostic = %resolved.diagnostic,
                "line text fell back to another language"
            );
        }
        resolved
    }

    fn present_line(
        &mut self,
        session: &mut Session,
        host: &mut PlaybackHost<'_>,
        conversation: &Conversation,
        line: &DialogueLine,
    ) -> Flow {
        let Some(speaker) = conversation.participant(&line.character_id) else {
            let next = session.next_line();
            return session.move_to(next);
        };
        let visuals = resolve_visuals(conversation, line, speaker);
        let speaker_name = speaker.speaker_name();

        if !session.opened {
            host.ui.display_dialogue(&session.text);
            session.opened = true;
        }
        host.ui.update_dialogue_ui(&DialogueUpdate {
            line,
            text: &session.text,
            speaker_name,
            visuals: &visuals,
            speaker,
        });
        session.displayed = Some((Arc::clone(&session.conversation), session.line));
        debug!(conversation = %conversation.id, line = session.line, "line presented");
        self.events.push(PlaybackEvent::LineShown {
            conversation: conversation.id.clone(),
            index: session.line,
            speaker: speaker_name.to_string(),
            text: session.text.clone(),
            language: session.resolved.used_language.clone(),
            is_fallback: session.resolved.is_fallback,
        });

        session.phase = match line.progression {
            Progression::UserInput => Phase::AwaitInput,
            Progression::Timed { duration_secs } => Phase::AwaitTimer {
                remaining: secs(duration_secs),
            },
        };
        Flow::Continue
    }

    fn advance(&mut self, session: &mut Session, line: &DialogueLine) -> Flow {
        if let Some(index) = session.pending_jump.take() {
            debug!(index, "continuing at jumped line");
            return session.move_to(index);
        }
        let next = session.line + 1;

        match &line.continuation {
            Continuation::Continue => session.move_to(next),
            Continuation::EndConversation => {
                session.return_stack.clear();
                Flow::Finished
            }
            Continuation::ContainerBranch {
                container,
                alias,
                push_return_point,
            } => {
                let found = container.as_deref().and_then(|name| {
                    let found = self.library.container(name);
                    if found.is_none() {
                        warn!(container = name, "branch container not in library");
                    }
                    found
                });
                let selection = found.and_then(|target| {
                    target.resolve_for_branch(
                        self.library.as_ref(),
                        alias.as_deref(),
                        &mut self.rng,
                    )
                });
                match selection {
                    Some(selection) => self.branch_to(
                        session,
                        selection.conversation,
                        selection.start_line,
                        *push_return_point,
                    ),
                    None => {
                        warn!(line = session.line, "container branch unresolved, continuing");
                        session.move_to(next)
                    }
                }
            }
            Continuation::Branch {
                key,
                push_return_point,
            } => {
                let Some(table) = self.branch_table.clone() else {
                    warn!(key = %key, "named branch without a branch table, continuing");
                    return session.move_to(next);
                };
                let outcome = {
                    let mut ctx = BranchContext {
                        library: self.library.as_ref(),
                        current: Some(&session.conversation),
                        rng: &mut self.rng,
                    };
                    table.resolve(key, &mut ctx)
                };
                match outcome {
                    Some(BranchOutcome::Jump {
                        conversation,
                        line_index,
                    }) => self.branch_to(session, conversation, line_index, *push_return_point),
                    Some(BranchOutcome::End) => {
                        session.return_stack.clear();
                        Flow::Finished
                    }
                    None => {
                        warn!(key = %key, table = %table.name, "unknown branch key, continuing");
                        session.move_to(next)
                    }
                }
            }
        }
    }

    fn branch_to(
        &mut self,
        session: &mut Session,
        conversation: Arc<Conversation>,
        line: usize,
        push_return_point: bool,
    ) -> Flow {
        if push_return_point {
            session.return_stack.push(ReturnPoint {
                conversation: Arc::clone(&session.conversation),
                line: session.line + 1,
            });
        }
        info!(
            from = %session.conversation.id,
            to = %conversation.id,
            line,
            "branching"
        );
        self.events.push(PlaybackEvent::Branched {
            from: session.conversation.id.clone(),
            to: conversation.id.clone(),
            line,
        });
        session.conversation = conversation;
        session.move_to(line)
    }

    fn sync_language(
        &mut self,
        session: &mut Session,
        host: &mut PlaybackHost<'_>,
        force: bool,
    ) -> bool {
        let revision = host.language.revision();
        let changed = session
            .language_revision
            .is_some_and(|seen| seen != revision);
        session.language_revision = Some(revision);
        if !changed && !force {
            return false;
        }

        let conversation = Arc::clone(&session.conversation);
        if session.presentation_pending() && !session.displays_current_line() {
            if let Some(line) = conversation.line(session.line) {
                session.resolved = self.resolve_text(&conversation, session.line, line, host);
                session.text = match session.phase {
                    Phase::BeforeActions(_) => session.resolved.text.clone(),
                    _ => player_text(&conversation, &session.resolved.text),
                };
            }
        }

        let Some((shown, index)) = session.displayed.clone() else {
            return false;
        };
        let Some(line) = shown.line(index) else {
            return false;
        };
        let resolved = self.resolve_text(&shown, index, line, host);
        let text = player_text(&shown, &resolved.text);
        let language = host.language.current();
        host.ui.update_for_language_change(&text, language);
        if session.displays_current_line() {
            session.text = text.clone();
            session.resolved = resolved;
        }
        debug!(language, line = index, "displayed line refreshed for language change");
        self.events.push(PlaybackEvent::LanguageRefreshed {
            language: language.to_string(),
            text,
        });
        true
    }
}

impl ConversationRunner for ConversationPlayer {
    fn play_conversation(
        &mut self,
        conversation: Arc<Conversation>,
        start_line: usize,
    ) -> ConvoResult<SessionId> {
        self.start_conversation_at(Some(conversation), start_line)
    }

    fn has_completed(&self, session: SessionId) -> bool {
        self.last_completed.is_some_and(|done| done >= session)
    }
}

/// Applies the roster's player name to `text`.
fn player_text(conversation: &Conversation, text: &str) -> String {
    let Some(player) = conversation.player_profile() else {
        return text.to_string();
    };
    let placeholder = player
        .player_placeholder
        .as_deref()
        .filter(|token| !token.is_empty());
    let name = player
        .player_name
        .as_deref()
        .filter(|name| !name.trim().is_empty());
    if placeholder.is_none() || name.is_none() {
        warn!(
            character = %player.id,
            "player profile lacks a name or placeholder, text left as is"
        );
    }
    substitute_player_name(text, placeholder, name)
}

fn resolve_visuals(
    conversation: &Conversation,
    line: &DialogueLine,
    speaker: &CharacterProfile,
) -> Vec<CharacterVisual> {
    let mut visuals = Vec::new();
    for (slot, selection) in line.representations() {
        let profile = if selection.character_id.is_empty() || selection.character_id == speaker.id
        {
            Some(speaker)
        } else {
            conversation.participant(&selection.character_id)
        };
        let Some(profile) = profile else {
            warn!(
                character = %selection.character_id,
                ?slot,
                "representation names a character outside the roster"
            );
            continue;
        };
        match resolve_line_representation(profile, slot, selection) {
            Some(visual) => visuals.push(visual),
            None => warn!(character = %profile.id, ?slot, "no expression to show"),
        }
    }

    if line.primary.is_none() && !speaker.representations.is_empty() {
        if let Some((representation, expression)) = resolve_expression(speaker, "", None) {
            visuals.insert(
                0,
                CharacterVisual {
                    slot: RepresentationSlot::Primary,
                    character_id: speaker.id.clone(),
                    representation: representation.name.clone(),
                    expression,
                },
            );
        }
    }
    visuals
}
