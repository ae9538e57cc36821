pub mod background;
pub mod bootstrap;
pub mod commands;
pub mod host;
pub mod overlay;
pub mod pomodoro;
pub mod rule_sync;
