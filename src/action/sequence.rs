use std::collections::VecDeque;
use std::time::Duration;

use tracing::error;

use super::{ActionEnv, ActionStatus, LineAction, RunningAction};

/// Runs a list of actions one after another, each to completion before the next starts.
#[derive(Debug, Default)]
pub struct ActionSequence {
    pending: VecDeque<Option<LineAction>>,
    current: Option<RunningAction>,
    position: usize,
}

impl ActionSequence {
    pub fn new(actions: &[Option<LineAction>]) -> Self {
        Self {
            pending: actions.iter().cloned().collect(),
            current: None,
            position: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    /// Advances the sequence. Only the action running on entry receives `dt`.
    pub fn poll(&mut self, env: &mut ActionEnv<'_>, dt: Duration) -> ActionStatus {
        let mut dt = dt;
        loop {
            if let Some(action) = self.current.as_mut() {
                if action.poll(env, std::mem::take(&mut dt)) == ActionStatus::Running {
                    return ActionStatus::Running;
                }
                self.current = None;
            }

            let Some(next) = self.pending.pop_front() else {
                return ActionStatus::Finished;
            };
            let position = self.position;
            self.position += 1;
            match next {
                Some(action) => self.current = Some(action.instantiate()),
                None => error!(position, "null action in list, skipping"),
            }
        }
    }

    /// Drops the running action and everything still queued.
    pub fn cancel(&mut self, env: &mut ActionEnv<'_>) {
        if let Some(mut action) = self.current.take() {
            action.cancel(env);
        }
        self.pending.clear();
    }
}
