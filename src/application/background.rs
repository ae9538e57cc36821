use crate::application::rule_sync::{RuleSyncReport, RuleSynchronizer};
use crate::domain::models::{Message, PomodoroPhase, SystemNotification};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preference_store::{ExtensionState, Preferences};
use crate::infrastructure::rule_engine::RuleEngine;
use crate::infrastructure::runtime::{MessageSink, Notifier};
use std::sync::{Arc, Mutex, MutexGuard};

pub const NOTIFICATION_TITLE: &str = "Pomodoro";
pub const NUDGE_TEXT: &str = "[Gemini AI: Great job! Take a break.]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    pub rules: RuleSyncReport,
    pub resume_ticker: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundOutcome {
    RulesSynced(RuleSyncReport),
    Notified(SystemNotification),
    Ignored,
}

pub fn completion_notification(completed: PomodoroPhase) -> SystemNotification {
    let message = match completed {
        PomodoroPhase::Work => "Time for a break!",
        PomodoroPhase::Break => "Back to focus!",
    };
    SystemNotification {
        title: NOTIFICATION_TITLE.to_string(),
        message: message.to_string(),
    }
}

/// The always-on context: owns the rule set and reacts to bus messages.
pub struct BackgroundService<E>
where
    E: RuleEngine,
{
    preferences: Preferences,
    synchronizer: RuleSynchronizer<E>,
    notifier: Arc<dyn Notifier>,
    bus: Arc<dyn MessageSink>,
    state: Mutex<ExtensionState>,
}

impl<E> BackgroundService<E>
where
    E: RuleEngine,
{
    pub fn new(
        preferences: Preferences,
        synchronizer: RuleSynchronizer<E>,
        notifier: Arc<dyn Notifier>,
        bus: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            preferences,
            synchronizer,
            notifier,
            bus,
            state: Mutex::new(ExtensionState::default()),
        }
    }

    pub fn state(&self) -> Result<ExtensionState, InfraError> {
        Ok(self.lock_state()?.clone())
    }

    pub async fn startup(&self) -> Result<StartupReport, InfraError> {
        let snapshot = self.preferences.snapshot()?;
        let resume_ticker = snapshot.pomodoro.running;
        let (mode, blocklist) = (snapshot.focus_mode.clone(), snapshot.blocklist.clone());
        *self.lock_state()? = snapshot;

        let rules = self.synchronizer.sync(&mode, &blocklist).await?;
        tracing::info!(
            mode = %mode,
            rules = rules.active_rule_count(),
            resume_ticker,
            "background started"
        );
        Ok(StartupReport { rules, resume_ticker })
    }

    pub async fn handle(&self, message: Message) -> Result<BackgroundOutcome, InfraError> {
        match message {
            Message::ModeChange { mode } => {
                self.preferences.save_focus_mode(&mode)?;
                let blocklist = {
                    let mut state = self.lock_state()?;
                    state.focus_mode = mode.clone();
                    state.blocklist.clone()
                };
                let report = self.synchronizer.sync(&mode, &blocklist).await?;
                Ok(BackgroundOutcome::RulesSynced(report))
            }
            Message::BlocklistUpdate { blocklist } => {
                self.preferences.save_blocklist(&blocklist)?;
                let mode = {
                    let mut state = self.lock_state()?;
                    state.blocklist = blocklist.clone();
                    state.focus_mode.clone()
                };
                let report = self.synchronizer.sync(&mode, &blocklist).await?;
                Ok(BackgroundOutcome::RulesSynced(report))
            }
            Message::PomodoroComplete { mode } => {
                let notification = completion_notification(mode);
                self.notifier.notify(notification.clone())?;
                self.bus.send(Message::AiNudge {
                    nudge: NUDGE_TEXT.to_string(),
                })?;
                Ok(BackgroundOutcome::Notified(notification))
            }
            other => {
                tracing::debug!(message = other.type_name(), "background ignores message");
                Ok(BackgroundOutcome::Ignored)
            }
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ExtensionState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("background state: {error}")))
    }
}
