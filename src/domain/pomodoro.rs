use crate::domain::models::{PomodoroPhase, PomodoroState, POMODORO_WORK_SECONDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Ticked { time_left: u32 },
    Completed { completed: PomodoroPhase, next: PomodoroPhase },
}

impl PomodoroState {
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        *self = Self {
            running: false,
            time_left: POMODORO_WORK_SECONDS,
            mode: PomodoroPhase::Work,
        };
    }

    /// Advances one second. Reaching zero completes the phase and rolls over
    /// into the next one while staying running.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }

        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left > 0 {
            return TickOutcome::Ticked {
                time_left: self.time_left,
            };
        }

        let completed = self.mode;
        let next = completed.next();
        self.mode = next;
        self.time_left = next.duration_seconds();
        TickOutcome::Completed { completed, next }
    }
}
