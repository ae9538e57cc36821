use crate::application::bootstrap::bootstrap_workspace;
use crate::application::pomodoro::{run_ticker, ForegroundLease, PomodoroTimer, TickerSource};
use crate::domain::models::{
    Appearance, ColorMode, FocusMode, Message, Mood, PomodoroState, ThemeName,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::preference_store::{Preferences, SqlitePreferenceStore};
use crate::infrastructure::runtime::MessageSink;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const NUDGE_PLACEHOLDER: &str = "[Gemini AI motivational nudge here]";

pub struct AppState {
    database_path: PathBuf,
    logs_dir: PathBuf,
    config: AppConfig,
    preferences: Preferences,
    timer: Arc<PomodoroTimer>,
    bus: Arc<dyn MessageSink>,
    runtime: Mutex<SurfaceRuntime>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf, bus: Arc<dyn MessageSink>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store = SqlitePreferenceStore::open(&bootstrap.database_path)?;
        let preferences = Preferences::new(Arc::new(store));
        let timer = Arc::new(PomodoroTimer::new(preferences.clone(), Arc::clone(&bus)));

        Ok(Self {
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            config: bootstrap.config,
            preferences,
            timer,
            bus,
            runtime: Mutex::new(SurfaceRuntime::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn timer(&self) -> &Arc<PomodoroTimer> {
        &self.timer
    }

    /// Keeps the latest nudge so a surface opened later still shows it.
    pub fn record_nudge(&self, nudge: &str) -> Result<(), InfraError> {
        lock_runtime(self)?.nudge = Some(nudge.to_string());
        Ok(())
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Default)]
struct SurfaceRuntime {
    nudge: Option<String>,
    session: Option<SurfaceSession>,
}

/// An open control surface: holds ticker authority and runs the foreground ticker.
#[derive(Debug)]
struct SurfaceSession {
    _lease: ForegroundLease,
    shutdown: watch::Sender<bool>,
    _ticker: JoinHandle<()>,
}

impl SurfaceSession {
    fn close(self) {
        let _ = self.shutdown.send(true);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerResponse {
    #[serde(flatten)]
    pub state: PomodoroState,
    pub display: String,
}

impl From<PomodoroState> for TimerResponse {
    fn from(state: PomodoroState) -> Self {
        let display = state.display();
        Self { state, display }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceResponse {
    pub focus_mode: FocusMode,
    pub blocklist: Vec<String>,
    pub tasklist: Vec<String>,
    pub mood: Option<Mood>,
    pub appearance: Appearance,
    pub mode_label: String,
    pub timer: TimerResponse,
    pub nudge: String,
}

/// One control-surface action as it arrives over the host channel.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ControlCommand {
    GetFocusMode,
    SetFocusMode { mode: String },
    ListBlocklist,
    AddBlockSite { site: String },
    RemoveBlockSite { index: usize },
    ListTasks,
    AddTask { title: String },
    RemoveTask { index: usize },
    GetMood,
    SetMood { mood: String },
    GetTheme,
    SetTheme { theme: String, mode: String },
    StartTimer,
    PauseTimer,
    ResetTimer,
    GetTimer,
    OpenSurface,
    CloseSurface,
    RequestMinimalize {
        #[serde(default)]
        content_only: bool,
    },
    GetNudge,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetFocusMode => "get_focus_mode",
            Self::SetFocusMode { .. } => "set_focus_mode",
            Self::ListBlocklist => "list_blocklist",
            Self::AddBlockSite { .. } => "add_block_site",
            Self::RemoveBlockSite { .. } => "remove_block_site",
            Self::ListTasks => "list_tasks",
            Self::AddTask { .. } => "add_task",
            Self::RemoveTask { .. } => "remove_task",
            Self::GetMood => "get_mood",
            Self::SetMood { .. } => "set_mood",
            Self::GetTheme => "get_theme",
            Self::SetTheme { .. } => "set_theme",
            Self::StartTimer => "start_timer",
            Self::PauseTimer => "pause_timer",
            Self::ResetTimer => "reset_timer",
            Self::GetTimer => "get_timer",
            Self::OpenSurface => "open_surface",
            Self::CloseSurface => "close_surface",
            Self::RequestMinimalize { .. } => "request_minimalize",
            Self::GetNudge => "get_nudge",
        }
    }
}

/// Runs a command and serializes its result; failures are logged to the
/// command log and returned as their message.
pub fn dispatch_command(state: &AppState, command: ControlCommand) -> Result<serde_json::Value, String> {
    let name = command.name();
    run_command(state, command).map_err(|error| state.command_error(name, &error))
}

fn run_command(state: &AppState, command: ControlCommand) -> Result<serde_json::Value, InfraError> {
    let value = match command {
        ControlCommand::GetFocusMode => serde_json::to_value(get_focus_mode_impl(state)?)?,
        ControlCommand::SetFocusMode { mode } => serde_json::to_value(set_focus_mode_impl(state, mode)?)?,
        ControlCommand::ListBlocklist => serde_json::to_value(list_blocklist_impl(state)?)?,
        ControlCommand::AddBlockSite { site } => serde_json::to_value(add_block_site_impl(state, site)?)?,
        ControlCommand::RemoveBlockSite { index } => {
            serde_json::to_value(remove_block_site_impl(state, index)?)?
        }
        ControlCommand::ListTasks => serde_json::to_value(list_tasks_impl(state)?)?,
        ControlCommand::AddTask { title } => serde_json::to_value(add_task_impl(state, title)?)?,
        ControlCommand::RemoveTask { index } => serde_json::to_value(remove_task_impl(state, index)?)?,
        ControlCommand::GetMood => serde_json::to_value(get_mood_impl(state)?)?,
        ControlCommand::SetMood { mood } => serde_json::to_value(set_mood_impl(state, mood)?)?,
        ControlCommand::GetTheme => serde_json::to_value(get_theme_impl(state)?)?,
        ControlCommand::SetTheme { theme, mode } => {
            serde_json::to_value(set_theme_impl(state, theme, mode)?)?
        }
        ControlCommand::StartTimer => serde_json::to_value(start_timer_impl(state)?)?,
        ControlCommand::PauseTimer => serde_json::to_value(pause_timer_impl(state)?)?,
        ControlCommand::ResetTimer => serde_json::to_value(reset_timer_impl(state)?)?,
        ControlCommand::GetTimer => serde_json::to_value(get_timer_impl(state)?)?,
        ControlCommand::OpenSurface => serde_json::to_value(open_surface_impl(state)?)?,
        ControlCommand::CloseSurface => serde_json::to_value(close_surface_impl(state)?)?,
        ControlCommand::RequestMinimalize { content_only } => {
            serde_json::to_value(request_minimalize_impl(state, content_only)?)?
        }
        ControlCommand::GetNudge => serde_json::to_value(get_nudge_impl(state)?)?,
    };
    Ok(value)
}

pub fn get_focus_mode_impl(state: &AppState) -> Result<FocusMode, InfraError> {
    state.preferences.load_focus_mode()
}

pub fn set_focus_mode_impl(state: &AppState, mode: String) -> Result<FocusMode, InfraError> {
    if mode.trim().is_empty() {
        return Err(InfraError::InvalidConfig("mode must not be empty".to_string()));
    }
    let mode = FocusMode::from(mode);
    state.preferences.save_focus_mode(&mode)?;
    state.bus.send(Message::ModeChange { mode: mode.clone() })?;

    state.log_info("set_focus_mode", &format!("mode={mode}"));
    Ok(mode)
}

pub fn list_blocklist_impl(state: &AppState) -> Result<Vec<String>, InfraError> {
    state.preferences.load_blocklist()
}

/// Appends a trimmed site. Empty input and exact duplicates leave the list as is.
pub fn add_block_site_impl(state: &AppState, site: String) -> Result<Vec<String>, InfraError> {
    let mut blocklist = state.preferences.load_blocklist()?;
    let site = site.trim();
    if site.is_empty() || blocklist.iter().any(|existing| existing == site) {
        return Ok(blocklist);
    }
    blocklist.push(site.to_string());
    publish_blocklist(state, &blocklist)?;

    state.log_info("add_block_site", &format!("site={site} entries={}", blocklist.len()));
    Ok(blocklist)
}

pub fn remove_block_site_impl(state: &AppState, index: usize) -> Result<Vec<String>, InfraError> {
    let mut blocklist = state.preferences.load_blocklist()?;
    if index >= blocklist.len() {
        return Err(InfraError::InvalidConfig(format!(
            "blocklist index out of range: {index}"
        )));
    }
    let removed = blocklist.remove(index);
    publish_blocklist(state, &blocklist)?;

    state.log_info("remove_block_site", &format!("site={removed} entries={}", blocklist.len()));
    Ok(blocklist)
}

fn publish_blocklist(state: &AppState, blocklist: &[String]) -> Result<(), InfraError> {
    state.preferences.save_blocklist(blocklist)?;
    state.bus.send(Message::BlocklistUpdate {
        blocklist: blocklist.to_vec(),
    })
}

pub fn list_tasks_impl(state: &AppState) -> Result<Vec<String>, InfraError> {
    state.preferences.load_tasklist()
}

pub fn add_task_impl(state: &AppState, title: String) -> Result<Vec<String>, InfraError> {
    let mut tasklist = state.preferences.load_tasklist()?;
    let title = title.trim();
    if title.is_empty() {
        return Ok(tasklist);
    }
    tasklist.push(title.to_string());
    state.preferences.save_tasklist(&tasklist)?;
    Ok(tasklist)
}

pub fn remove_task_impl(state: &AppState, index: usize) -> Result<Vec<String>, InfraError> {
    let mut tasklist = state.preferences.load_tasklist()?;
    if index >= tasklist.len() {
        return Err(InfraError::InvalidConfig(format!("task index out of range: {index}")));
    }
    tasklist.remove(index);
    state.preferences.save_tasklist(&tasklist)?;
    Ok(tasklist)
}

pub fn get_mood_impl(state: &AppState) -> Result<Option<Mood>, InfraError> {
    state.preferences.load_mood()
}

pub fn set_mood_impl(state: &AppState, mood: String) -> Result<Mood, InfraError> {
    let mood = mood.parse::<Mood>().map_err(InfraError::InvalidConfig)?;
    state.preferences.save_mood(mood)?;
    state.log_info("set_mood", &format!("mood={}", mood.as_str()));
    Ok(mood)
}

pub fn get_theme_impl(state: &AppState) -> Result<Appearance, InfraError> {
    state.preferences.load_appearance()
}

pub fn set_theme_impl(state: &AppState, theme: String, mode: String) -> Result<Appearance, InfraError> {
    let appearance = Appearance {
        theme: theme.parse::<ThemeName>().map_err(InfraError::InvalidConfig)?,
        mode: mode.parse::<ColorMode>().map_err(InfraError::InvalidConfig)?,
    };
    state.preferences.save_appearance(appearance)?;
    state.bus.send(Message::ThemeChange {
        theme: appearance.theme,
        mode: appearance.mode,
    })?;

    state.log_info(
        "set_theme",
        &format!("theme={} mode={}", appearance.theme.as_str(), appearance.mode.as_str()),
    );
    Ok(appearance)
}

pub fn start_timer_impl(state: &AppState) -> Result<TimerResponse, InfraError> {
    let started = state.timer.start()?;
    state.log_info("start_timer", &format!("phase={} left={}", started.mode.as_str(), started.time_left));
    Ok(started.into())
}

pub fn pause_timer_impl(state: &AppState) -> Result<TimerResponse, InfraError> {
    Ok(state.timer.pause()?.into())
}

pub fn reset_timer_impl(state: &AppState) -> Result<TimerResponse, InfraError> {
    Ok(state.timer.reset()?.into())
}

pub fn get_timer_impl(state: &AppState) -> Result<TimerResponse, InfraError> {
    Ok(state.timer.state()?.into())
}

/// Opens the control surface: takes ticker authority, starts the foreground
/// ticker and returns everything the surface renders. Must run inside a tokio
/// runtime.
pub fn open_surface_impl(state: &AppState) -> Result<SurfaceResponse, InfraError> {
    {
        let mut runtime = lock_runtime(state)?;
        if runtime.session.is_none() {
            let lease = state.timer.acquire_foreground();
            let (shutdown, shutdown_rx) = watch::channel(false);
            let ticker = tokio::spawn(run_ticker(
                Arc::clone(&state.timer),
                TickerSource::Foreground,
                shutdown_rx,
            ));
            runtime.session = Some(SurfaceSession {
                _lease: lease,
                shutdown,
                _ticker: ticker,
            });
            state.log_info("open_surface", "foreground ticker started");
        }
    }

    let snapshot = state.preferences.snapshot()?;
    Ok(SurfaceResponse {
        mode_label: snapshot.appearance.mode.label().to_string(),
        focus_mode: snapshot.focus_mode,
        blocklist: snapshot.blocklist,
        tasklist: snapshot.tasklist,
        mood: snapshot.mood,
        appearance: snapshot.appearance,
        timer: snapshot.pomodoro.into(),
        nudge: get_nudge_impl(state)?,
    })
}

pub fn close_surface_impl(state: &AppState) -> Result<bool, InfraError> {
    let session = lock_runtime(state)?.session.take();
    let Some(session) = session else {
        return Ok(false);
    };
    session.close();
    state.log_info("close_surface", "foreground ticker stopped");
    Ok(true)
}

pub fn request_minimalize_impl(state: &AppState, content_only: bool) -> Result<Message, InfraError> {
    let message = if content_only {
        Message::AiContentOnly
    } else {
        Message::AiMinimalize
    };
    state.bus.send(message.clone())?;
    Ok(message)
}

pub fn get_nudge_impl(state: &AppState) -> Result<String, InfraError> {
    Ok(lock_runtime(state)?
        .nudge
        .clone()
        .unwrap_or_else(|| NUDGE_PLACEHOLDER.to_string()))
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, SurfaceRuntime>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::LockPoisoned(format!("runtime: {error}")))
}
