// Theme palettes and the style manager
//
// Colours are kept as hex strings so they can be inspected and overridden
// without a window; apply() pushes them into the Slint Palette global.

use super::Palette;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Returned by [`StyleManager::get_color`] for unknown colour names
pub const FALLBACK_COLOR: &str = "#000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Colour palette for this theme as `(name, hex)` pairs.
    pub fn palette(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Theme::Light => LIGHT_PALETTE,
            Theme::Dark => DARK_PALETTE,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

const LIGHT_PALETTE: &[(&str, &str)] = &[
    ("background", "#FFFFFF"),
    ("surface", "#F5F5F5"),
    ("primary", "#1976D2"),
    ("secondary", "#424242"),
    ("accent", "#FF4081"),
    ("text", "#212121"),
    ("text_secondary", "#757575"),
    ("border", "#E0E0E0"),
    ("hover", "#E3F2FD"),
    ("success", "#4CAF50"),
    ("warning", "#FF9800"),
    ("error", "#F44336"),
    ("info", "#2196F3"),
];

const DARK_PALETTE: &[(&str, &str)] = &[
    ("background", "#1E1E1E"),
    ("surface", "#2D2D2D"),
    ("primary", "#90CAF9"),
    ("secondary", "#B0B0B0"),
    ("accent", "#F48FB1"),
    ("text", "#FFFFFF"),
    ("text_secondary", "#B0B0B0"),
    ("border", "#404040"),
    ("hover", "#424242"),
    ("success", "#66BB6A"),
    ("warning", "#FFA726"),
    ("error", "#EF5350"),
    ("info", "#42A5F5"),
];

/// Parse `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(hex: &str) -> Option<slint::Color> {
    let digits = hex.strip_prefix('#')?;
    if !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();

    match digits.len() {
        6 => Some(slint::Color::from_rgb_u8(channel(0)?, channel(2)?, channel(4)?)),
        8 => Some(slint::Color::from_argb_u8(
            channel(6)?,
            channel(0)?,
            channel(2)?,
            channel(4)?,
        )),
        _ => None,
    }
}

/// Current theme plus per-colour overrides.
#[derive(Debug, Clone, Default)]
pub struct StyleManager {
    current_theme: Theme,
    custom_styles: IndexMap<String, String>,
}

impl StyleManager {
    pub fn new(theme: Theme) -> Self {
        Self {
            current_theme: theme,
            custom_styles: IndexMap::new(),
        }
    }

    pub fn theme(&self) -> Theme {
        self.current_theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.current_theme = theme;
        tracing::info!("Applied theme: {}", theme);
    }

    /// Switch between light and dark, returning the new theme.
    pub fn toggle_theme(&mut self) -> Theme {
        let theme = self.current_theme.toggled();
        self.set_theme(theme);
        theme
    }

    /// Look up a colour in the current theme; custom overrides win.
    pub fn get_color(&self, name: &str) -> &str {
        if let Some(custom) = self.custom_styles.get(name) {
            return custom;
        }
        self.current_theme
            .palette()
            .iter()
            .find(|(key, _)| *key == name)
            .map_or(FALLBACK_COLOR, |(_, hex)| *hex)
    }

    /// Override a named colour for every theme.
    pub fn add_custom_style(&mut self, name: impl Into<String>, hex: impl Into<String>) {
        let name = name.into();
        tracing::debug!("Added custom style for {}", name);
        self.custom_styles.insert(name, hex.into());
    }

    pub fn custom_styles(&self) -> &IndexMap<String, String> {
        &self.custom_styles
    }

    fn color(&self, name: &str) -> slint::Color {
        parse_hex_color(self.get_color(name)).unwrap_or_else(|| {
            tracing::warn!("Invalid colour for {}: {}", name, self.get_color(name));
            slint::Color::from_rgb_u8(0, 0, 0)
        })
    }

    /// Push the current colours into a window's Palette global.
    pub fn apply(&self, palette: &Palette<'_>) {
        palette.set_background(self.color("background"));
        palette.set_surface(self.color("surface"));
        palette.set_primary(self.color("primary"));
        palette.set_text(self.color("text"));
        palette.set_text_secondary(self.color("text_secondary"));
        palette.set_border(self.color("border"));
        palette.set_error(self.color("error"));
    }
}
