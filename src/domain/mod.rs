pub mod blocking;
pub mod content;
pub mod links;
pub mod models;
pub mod pomodoro;
pub mod theme;
