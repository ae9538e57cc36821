use crate::domain::models::{Appearance, ColorMode, ThemeName};
use std::fmt::Write;

pub const OVERLAY_ID: &str = "clavi-ai-minimal-overlay";
pub const OVERLAY_STYLE_ID: &str = "clavi-overlay-style";
pub const THEME_CLASS_PREFIX: &str = "clavi-theme-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub bar_background: &'static str,
    pub border: &'static str,
    pub shadow: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonStyle {
    pub background: &'static str,
    pub hover_background: &'static str,
    pub text: &'static str,
    pub radius_px: u8,
    pub weight: u16,
}

/// Color and typography tokens for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeDescriptor {
    pub name: ThemeName,
    pub light: Palette,
    pub dark: Palette,
    pub button: ButtonStyle,
    pub radius_px: u8,
    pub font_size_em: &'static str,
    pub line_height: &'static str,
    pub font_family: Option<&'static str>,
    pub bar_border_px: &'static str,
    pub emphasize_links: bool,
}

impl ThemeDescriptor {
    pub fn palette(&self, mode: ColorMode) -> &Palette {
        match mode {
            ColorMode::Light => &self.light,
            ColorMode::Dark => &self.dark,
        }
    }
}

const SANS: &str = "Arial, Helvetica, sans-serif";

static THEMES: [ThemeDescriptor; 3] = [
    ThemeDescriptor {
        name: ThemeName::Calming,
        light: Palette {
            background: "linear-gradient(135deg, #e0f7fa 0%, #b2ebf2 100%)",
            text: "#14505c",
            bar_background: "linear-gradient(90deg, #b2ebf2 0%, #e0f7fa 100%)",
            border: "#b2ebf2",
            shadow: "0 8px 36px 0 #7ed6df33, 0 1.5px 8px #7ed6df22",
        },
        dark: Palette {
            background: "linear-gradient(135deg, #102542 0%, #19335c 100%)",
            text: "#e0f7fa",
            bar_background: "#19335c",
            border: "#19335c",
            shadow: "0 8px 36px 0 #48b1bf33, 0 1.5px 8px #48b1bf22",
        },
        button: ButtonStyle {
            background: "linear-gradient(90deg, #7ed6df 0%, #48b1bf 100%)",
            hover_background: "linear-gradient(90deg, #48b1bf 0%, #7ed6df 100%)",
            text: "#fff",
            radius_px: 14,
            weight: 700,
        },
        radius_px: 18,
        font_size_em: "1.05em",
        line_height: "1.7",
        font_family: None,
        bar_border_px: "1.5px",
        emphasize_links: false,
    },
    ThemeDescriptor {
        name: ThemeName::Gentle,
        light: Palette {
            background: "linear-gradient(120deg, #fff7fa 0%, #e6f7ff 100%)",
            text: "#6d4c41",
            bar_background: "linear-gradient(90deg, #f7cac9 0%, #b5ead7 100%)",
            border: "#f7cac9",
            shadow: "0 8px 36px 0 #f7cac933, 0 1.5px 8px #b5ead722",
        },
        dark: Palette {
            background: "linear-gradient(120deg, #232946 0%, #393e6e 100%)",
            text: "#fdf6e3",
            bar_background: "#393e6e",
            border: "#393e6e",
            shadow: "0 8px 36px 0 #b5ead733, 0 1.5px 8px #f7cac922",
        },
        button: ButtonStyle {
            background: "linear-gradient(90deg, #f7cac9 0%, #b5ead7 100%)",
            hover_background: "linear-gradient(90deg, #b5ead7 0%, #f7cac9 100%)",
            text: "#6d4c41",
            radius_px: 18,
            weight: 700,
        },
        radius_px: 22,
        font_size_em: "1.08em",
        line_height: "1.8",
        font_family: Some(SANS),
        bar_border_px: "1.5px",
        emphasize_links: false,
    },
    ThemeDescriptor {
        name: ThemeName::HighContrast,
        light: Palette {
            background: "#fff",
            text: "#000",
            bar_background: "#ffd600",
            border: "#ffd600",
            shadow: "0 8px 36px 0 #ffd60055, 0 1.5px 8px #ffd60033",
        },
        dark: Palette {
            background: "#000",
            text: "#fff",
            bar_background: "#222",
            border: "#ffd600",
            shadow: "0 8px 36px 0 #ffd60055, 0 1.5px 8px #ffd60033",
        },
        button: ButtonStyle {
            background: "#ffd600",
            hover_background: "#fff",
            text: "#000",
            radius_px: 0,
            weight: 900,
        },
        radius_px: 0,
        font_size_em: "1.18em",
        line_height: "1.6",
        font_family: Some(SANS),
        bar_border_px: "2.5px",
        emphasize_links: true,
    },
];

pub fn descriptor(theme: ThemeName) -> &'static ThemeDescriptor {
    THEMES
        .iter()
        .find(|descriptor| descriptor.name == theme)
        .unwrap_or(&THEMES[0])
}

pub fn theme_class(theme: ThemeName) -> String {
    format!("{THEME_CLASS_PREFIX}{}", theme.as_str())
}

/// Class list applied to both the document root and the overlay element.
pub fn appearance_classes(appearance: Appearance) -> Vec<String> {
    vec![
        theme_class(appearance.theme),
        appearance.mode.as_str().to_string(),
    ]
}

pub fn is_theme_marker(class: &str) -> bool {
    class.starts_with(THEME_CLASS_PREFIX) || class == "light" || class == "dark"
}

/// Builds the overlay stylesheet for every theme/mode pair from the table.
pub fn overlay_stylesheet() -> String {
    let mut css = String::new();
    for theme in &THEMES {
        for mode in [ColorMode::Light, ColorMode::Dark] {
            write_theme_rules(&mut css, theme, mode);
        }
    }
    css.push_str(SHARED_RULES.replace("#OVERLAY", &format!("#{OVERLAY_ID}")).as_str());
    css
}

fn write_theme_rules(css: &mut String, theme: &ThemeDescriptor, mode: ColorMode) {
    let scope = format!(
        ".{}.{} #{OVERLAY_ID}",
        theme_class(theme.name),
        mode.as_str()
    );
    let palette = theme.palette(mode);
    let font_family = theme
        .font_family
        .map(|family| format!(" font-family: {family};"))
        .unwrap_or_default();

    let _ = writeln!(
        css,
        "{scope} {{ background: {}; color: {}; border-radius: {}px; box-shadow: {}; font-size: {}; line-height: {};{font_family} }}",
        palette.background,
        palette.text,
        theme.radius_px,
        palette.shadow,
        theme.font_size_em,
        theme.line_height,
    );
    let _ = writeln!(
        css,
        "{scope} .clavi-overlay-bar {{ background: {}; color: {}; border-bottom: {} solid {}; }}",
        palette.bar_background, palette.text, theme.bar_border_px, palette.border,
    );
    let _ = writeln!(
        css,
        "{scope} button {{ background: {}; color: {}; border-radius: {}px; font-weight: {}; }}",
        theme.button.background, theme.button.text, theme.button.radius_px, theme.button.weight,
    );
    let _ = writeln!(
        css,
        "{scope} button:hover {{ background: {}; }}",
        theme.button.hover_background
    );
    if theme.emphasize_links {
        let _ = writeln!(
            css,
            "{scope} a {{ color: {}; font-weight: 900; text-decoration: underline; }}",
            palette.border
        );
        let _ = writeln!(
            css,
            "{scope} a:focus {{ outline: 3px solid {} !important; }}",
            palette.border
        );
    }
}

const SHARED_RULES: &str = "\
#OVERLAY .clavi-overlay-bar { display: flex; justify-content: space-between; align-items: center; padding: 10px 18px; font-size: 1.1em; font-weight: 600; position: sticky; top: 0; z-index: 1; }
#OVERLAY .clavi-overlay-bar button { background: none; border: none; font-size: 1.5em; cursor: pointer; color: #888; }
#OVERLAY .clavi-overlay-content { padding: 24px 18px; max-width: 900px; margin: 0 auto; }
#OVERLAY img { display: block; margin: 24px auto 12px auto; max-width: 100%; max-height: 300px; border-radius: 12px; object-fit: contain; }
#OVERLAY .clavi-main-content h1, #OVERLAY .clavi-main-content h2, #OVERLAY .clavi-main-content h3 { margin-top: 1.2em; }
#OVERLAY .clavi-spinner { margin: 32px auto; width: 48px; height: 48px; border: 6px solid #e0e7ff; border-top: 6px solid #6c63ff; border-radius: 50%; animation: clavi-spin 1s linear infinite; }
@keyframes clavi-spin { 0% { transform: rotate(0deg); } 100% { transform: rotate(360deg); } }
";
