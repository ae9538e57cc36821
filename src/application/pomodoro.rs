use crate::domain::models::{Message, PomodoroState};
use crate::domain::pomodoro::TickOutcome;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preference_store::Preferences;
use crate::infrastructure::runtime::MessageSink;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerSource {
    /// The visible control surface.
    Foreground,
    /// The always-on service context.
    Background,
}

impl TickerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// A foreground ticker holds authority; the background tick did nothing.
    Yielded,
    Advanced(TickOutcome),
}

/// Shared pomodoro state machine. Every operation reloads from the store,
/// applies the transition, and persists the result before returning.
pub struct PomodoroTimer {
    preferences: Preferences,
    bus: Arc<dyn MessageSink>,
    foreground_leases: Arc<AtomicUsize>,
    gate: Mutex<()>,
}

/// While alive, background ticks yield to the foreground ticker.
#[derive(Debug)]
pub struct ForegroundLease {
    leases: Arc<AtomicUsize>,
}

impl Drop for ForegroundLease {
    fn drop(&mut self) {
        self.leases.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PomodoroTimer {
    pub fn new(preferences: Preferences, bus: Arc<dyn MessageSink>) -> Self {
        Self {
            preferences,
            bus,
            foreground_leases: Arc::new(AtomicUsize::new(0)),
            gate: Mutex::new(()),
        }
    }

    pub fn acquire_foreground(&self) -> ForegroundLease {
        self.foreground_leases.fetch_add(1, Ordering::SeqCst);
        ForegroundLease {
            leases: Arc::clone(&self.foreground_leases),
        }
    }

    pub fn foreground_active(&self) -> bool {
        self.foreground_leases.load(Ordering::SeqCst) > 0
    }

    pub fn state(&self) -> Result<PomodoroState, InfraError> {
        self.preferences.load_pomodoro()
    }

    pub fn start(&self) -> Result<PomodoroState, InfraError> {
        self.transition(|state| {
            if !state.start() {
                tracing::debug!("start ignored; timer already running");
            }
        })
    }

    pub fn pause(&self) -> Result<PomodoroState, InfraError> {
        self.transition(PomodoroState::pause)
    }

    pub fn reset(&self) -> Result<PomodoroState, InfraError> {
        self.transition(PomodoroState::reset)
    }

    pub fn tick(&self, source: TickerSource) -> Result<TickReport, InfraError> {
        if source == TickerSource::Background && self.foreground_active() {
            return Ok(TickReport::Yielded);
        }

        let _transition = self.lock_transition()?;
        let mut state = self.preferences.load_pomodoro()?;
        let outcome = state.tick();
        if outcome == TickOutcome::Idle {
            return Ok(TickReport::Advanced(outcome));
        }
        self.preferences.save_pomodoro(&state)?;

        if let TickOutcome::Completed { completed, next } = outcome {
            tracing::info!(
                source = source.as_str(),
                completed = completed.as_str(),
                next = next.as_str(),
                "pomodoro phase complete"
            );
            self.bus.send(Message::PomodoroComplete { mode: completed })?;
        }
        Ok(TickReport::Advanced(outcome))
    }

    fn transition<F>(&self, apply: F) -> Result<PomodoroState, InfraError>
    where
        F: FnOnce(&mut PomodoroState),
    {
        let _transition = self.lock_transition()?;
        let mut state = self.preferences.load_pomodoro()?;
        apply(&mut state);
        self.preferences.save_pomodoro(&state)?;
        Ok(state)
    }

    fn lock_transition(&self) -> Result<MutexGuard<'_, ()>, InfraError> {
        self.gate
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("timer: {error}")))
    }
}

/// Ticks once per second until `shutdown` flips to true or its sender drops.
pub async fn run_ticker(timer: Arc<PomodoroTimer>, source: TickerSource, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(error) = timer.tick(source) {
                    tracing::error!(source = source.as_str(), %error, "pomodoro tick failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(source = source.as_str(), "pomodoro ticker stopped");
}
