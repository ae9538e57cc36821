use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const POMODORO_WORK_SECONDS: u32 = 25 * 60;
pub const POMODORO_BREAK_SECONDS: u32 = 5 * 60;

/// Operating mode; only `deep` activates site blocking, every other name is
/// carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum FocusMode {
    #[default]
    Deep,
    Other(String),
}

impl FocusMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Deep => "deep",
            Self::Other(name) => name,
        }
    }

    pub fn blocks_sites(&self) -> bool {
        matches!(self, Self::Deep)
    }
}

impl From<String> for FocusMode {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed == "deep" {
            Self::Deep
        } else {
            Self::Other(trimmed.to_string())
        }
    }
}

impl From<FocusMode> for String {
    fn from(value: FocusMode) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blocked site pattern together with its position-derived rule id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEntry {
    pub id: u32,
    pub url_filter: String,
}

impl BlockEntry {
    pub fn from_blocklist(blocklist: &[String]) -> Vec<Self> {
        blocklist
            .iter()
            .enumerate()
            .map(|(index, site)| Self {
                id: index as u32 + 1,
                url_filter: site.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleActionType {
    Block,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: RuleActionType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockingRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl BlockingRule {
    pub fn validate(&self) -> Result<(), String> {
        if self.id == 0 {
            return Err("rule.id must be >= 1".to_string());
        }
        if self.priority == 0 {
            return Err(format!("rule {} priority must be >= 1", self.id));
        }
        let filter = &self.condition.url_filter;
        validate_non_empty(filter, "rule.condition.urlFilter")?;
        if !filter.is_ascii() {
            return Err(format!("rule {} urlFilter must be ASCII: '{filter}'", self.id));
        }
        if filter.chars().any(char::is_whitespace) {
            return Err(format!(
                "rule {} urlFilter must not contain whitespace: '{filter}'",
                self.id
            ));
        }
        if self.condition.resource_types.is_empty() {
            return Err(format!("rule {} must target at least one resource type", self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroPhase {
    #[default]
    Work,
    Break,
}

impl PomodoroPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
        }
    }

    pub fn duration_seconds(self) -> u32 {
        match self {
            Self::Work => POMODORO_WORK_SECONDS,
            Self::Break => POMODORO_BREAK_SECONDS,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Work => Self::Break,
            Self::Break => Self::Work,
        }
    }
}

/// Persisted timer state; field names match the stored `pomodoro` object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroState {
    pub running: bool,
    pub time_left: u32,
    pub mode: PomodoroPhase,
}

impl Default for PomodoroState {
    fn default() -> Self {
        Self {
            running: false,
            time_left: POMODORO_WORK_SECONDS,
            mode: PomodoroPhase::Work,
        }
    }
}

impl PomodoroState {
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.time_left / 60, self.time_left % 60)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    #[default]
    Calming,
    Gentle,
    HighContrast,
}

impl ThemeName {
    pub const ALL: [ThemeName; 3] = [Self::Calming, Self::Gentle, Self::HighContrast];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calming => "calming",
            Self::Gentle => "gentle",
            Self::HighContrast => "high-contrast",
        }
    }
}

impl FromStr for ThemeName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == value.trim())
            .ok_or_else(|| format!("unknown theme '{}'", value.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "Light Mode",
            Self::Dark => "Dark Mode",
        }
    }
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown color mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Appearance {
    pub theme: ThemeName,
    pub mode: ColorMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Stressed,
    Tired,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Self::Happy,
        Self::Neutral,
        Self::Sad,
        Self::Stressed,
        Self::Tired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Stressed => "stressed",
            Self::Tired => "tired",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Happy => "😊",
            Self::Neutral => "😐",
            Self::Sad => "😢",
            Self::Stressed => "😣",
            Self::Tired => "😴",
        }
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|mood| mood.as_str() == value || mood.emoji() == value)
            .ok_or_else(|| format!("unknown mood '{value}'"))
    }
}

/// Messages exchanged between the control surface, the background context and
/// the page context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    ModeChange { mode: FocusMode },
    BlocklistUpdate { blocklist: Vec<String> },
    PomodoroComplete { mode: PomodoroPhase },
    AiMinimalize,
    AiContentOnly,
    ThemeChange { theme: ThemeName, mode: ColorMode },
    AiNudge { nudge: String },
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ModeChange { .. } => "MODE_CHANGE",
            Self::BlocklistUpdate { .. } => "BLOCKLIST_UPDATE",
            Self::PomodoroComplete { .. } => "POMODORO_COMPLETE",
            Self::AiMinimalize => "AI_MINIMALIZE",
            Self::AiContentOnly => "AI_CONTENT_ONLY",
            Self::ThemeChange { .. } => "THEME_CHANGE",
            Self::AiNudge { .. } => "AI_NUDGE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemNotification {
    pub title: String,
    pub message: String,
}

fn validate_non_empty(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_shape_uses_type_tag() {
        let message = Message::BlocklistUpdate {
            blocklist: vec!["example.com".to_string()],
        };
        let json = serde_json::to_value(&message).expect("serialize message");
        assert_eq!(
            json,
            serde_json::json!({"type": "BLOCKLIST_UPDATE", "blocklist": ["example.com"]})
        );

        let parsed: Message =
            serde_json::from_str(r#"{"type":"THEME_CHANGE","theme":"high-contrast","mode":"dark"}"#)
                .expect("parse theme change");
        assert_eq!(
            parsed,
            Message::ThemeChange {
                theme: ThemeName::HighContrast,
                mode: ColorMode::Dark
            }
        );
    }

    #[test]
    fn pomodoro_state_matches_stored_object() {
        let stored = serde_json::json!({"running": true, "timeLeft": 42, "mode": "break"});
        let state: PomodoroState = serde_json::from_value(stored).expect("parse pomodoro");
        assert!(state.running);
        assert_eq!(state.time_left, 42);
        assert_eq!(state.mode, PomodoroPhase::Break);
        assert_eq!(state.display(), "00:42");
        assert_eq!(PomodoroState::default().display(), "25:00");
    }

    #[test]
    fn rule_validation_rejects_malformed_filters() {
        let mut rule = BlockingRule {
            id: 1,
            priority: 1,
            action: RuleAction {
                action_type: RuleActionType::Block,
            },
            condition: RuleCondition {
                url_filter: "youtube.com".to_string(),
                resource_types: vec![ResourceType::MainFrame],
            },
        };
        assert!(rule.validate().is_ok());

        rule.condition.url_filter = "bad filter".to_string();
        assert!(rule.validate().is_err());
        rule.condition.url_filter = "ünicode.example".to_string();
        assert!(rule.validate().is_err());
        rule.condition.url_filter = "  ".to_string();
        assert!(rule.validate().is_err());
    }

    #[test]
    fn focus_mode_keeps_unknown_names() {
        let mode: FocusMode = serde_json::from_str(r#""relax""#).expect("parse mode");
        assert_eq!(mode, FocusMode::Other("relax".to_string()));
        assert!(!mode.blocks_sites());
        assert!(FocusMode::from("deep".to_string()).blocks_sites());
        assert_eq!(serde_json::to_string(&FocusMode::Deep).expect("serialize"), r#""deep""#);
    }

    #[test]
    fn mood_accepts_name_or_emoji() {
        assert_eq!("tired".parse::<Mood>(), Ok(Mood::Tired));
        assert_eq!("😊".parse::<Mood>(), Ok(Mood::Happy));
        assert!("ecstatic".parse::<Mood>().is_err());
    }
}
