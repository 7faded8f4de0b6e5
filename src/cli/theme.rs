use crate::config::{
    HexColor, StyleOverride, ThemeConfig as UserThemeConfig, ThemeModifier, ThemePreset, ThemeToken,
};
use crossterm::style::{Attribute, Attributes, Color, ContentStyle};
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::io::{self, IsTerminal};

#[derive(Debug, Clone)]
pub struct Theme {
    enabled: bool,
    styles: HashMap<ThemeToken, ContentStyle>,
}

impl Theme {
    pub fn from_config(enabled: bool, config: &UserThemeConfig) -> Self {
        let mut styles = preset_styles(config.preset);
        for (token, override_style) in &config.styles {
            let base = styles.get(token).copied().unwrap_or_default();
            styles.insert(*token, merge_style(base, override_style));
        }

        Self { enabled, styles }
    }

    /// Colors only when stdout is a terminal and `NO_COLOR` is unset.
    pub fn for_stdout(config: &UserThemeConfig) -> Self {
        let enabled = io::stdout().is_terminal() && env::var_os("NO_COLOR").is_none();
        Self::from_config(enabled, config)
    }

    pub fn style(&self, token: ThemeToken) -> ContentStyle {
        if !self.enabled {
            return disabled_style(token);
        }

        self.styles.get(&token).copied().unwrap_or_default()
    }

    pub fn paint<D: Display>(&self, token: ThemeToken, text: D) -> String {
        self.style(token).apply(text).to_string()
    }
}

fn preset_styles(preset: ThemePreset) -> HashMap<ThemeToken, ContentStyle> {
    ThemeToken::all()
        .iter()
        .copied()
        .map(|token| (token, preset_style(preset, token)))
        .collect()
}

fn preset_style(preset: ThemePreset, token: ThemeToken) -> ContentStyle {
    match preset {
        ThemePreset::Default => default_preset_style(token),
        ThemePreset::Light => light_preset_style(token),
        ThemePreset::HighContrast => high_contrast_preset_style(token),
    }
}

fn fg(r: u8, g: u8, b: u8) -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::Rgb { r, g, b }),
        ..ContentStyle::default()
    }
}

fn with_attrs(mut style: ContentStyle, attrs: &[Attribute]) -> ContentStyle {
    for attr in attrs {
        style.attributes.set(*attr);
    }
    style
}

fn default_preset_style(token: ThemeToken) -> ContentStyle {
    match token {
        ThemeToken::UserPrompt => with_attrs(fg(158, 206, 106), &[Attribute::Bold]),
        ThemeToken::AssistantText => fg(192, 202, 245),
        ThemeToken::PlotCaption => with_attrs(fg(138, 138, 138), &[Attribute::Italic]),
        ThemeToken::Notice => fg(255, 158, 100),
        ThemeToken::CodeBlock => fg(125, 207, 255),
        ThemeToken::SystemInfo => fg(86, 95, 137),
        ThemeToken::SystemError => with_attrs(fg(247, 118, 142), &[Attribute::Bold]),
    }
}

fn light_preset_style(token: ThemeToken) -> ContentStyle {
    match token {
        ThemeToken::UserPrompt => with_attrs(fg(31, 111, 235), &[Attribute::Bold]),
        ThemeToken::AssistantText => fg(36, 41, 47),
        ThemeToken::PlotCaption => with_attrs(fg(80, 90, 110), &[Attribute::Italic]),
        ThemeToken::Notice => fg(188, 76, 0),
        ThemeToken::CodeBlock => fg(5, 80, 40),
        ThemeToken::SystemInfo => fg(36, 70, 120),
        ThemeToken::SystemError => with_attrs(fg(176, 0, 32), &[Attribute::Bold]),
    }
}

fn high_contrast_preset_style(token: ThemeToken) -> ContentStyle {
    match token {
        ThemeToken::UserPrompt => with_attrs(fg(0, 255, 127), &[Attribute::Bold]),
        ThemeToken::AssistantText => fg(255, 255, 255),
        ThemeToken::PlotCaption => with_attrs(fg(220, 220, 220), &[Attribute::Italic]),
        ThemeToken::Notice => with_attrs(fg(255, 215, 0), &[Attribute::Bold]),
        ThemeToken::CodeBlock => fg(135, 206, 250),
        ThemeToken::SystemInfo => fg(173, 216, 230),
        ThemeToken::SystemError => with_attrs(fg(255, 64, 64), &[Attribute::Bold]),
    }
}

fn disabled_style(token: ThemeToken) -> ContentStyle {
    match token {
        ThemeToken::UserPrompt => with_attrs(ContentStyle::default(), &[Attribute::Bold]),
        _ => ContentStyle::default(),
    }
}

fn merge_style(base: ContentStyle, override_style: &StyleOverride) -> ContentStyle {
    let mut merged = base;

    if let Some(fg) = override_style.fg {
        merged.foreground_color = Some(color_from_hex(fg));
    }

    if let Some(bg) = override_style.bg {
        merged.background_color = Some(color_from_hex(bg));
    }

    if let Some(modifiers) = &override_style.modifiers {
        merged.attributes = Attributes::default();
        for modifier in modifiers {
            merged.attributes.set(modifier_to_attribute(*modifier));
        }
    }

    merged
}

fn color_from_hex(color: HexColor) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

fn modifier_to_attribute(modifier: ThemeModifier) -> Attribute {
    match modifier {
        ThemeModifier::Bold => Attribute::Bold,
        ThemeModifier::Dim => Attribute::Dim,
        ThemeModifier::Italic => Attribute::Italic,
        ThemeModifier::Underlined => Attribute::Underlined,
        ThemeModifier::Reversed => Attribute::Reverse,
        ThemeModifier::CrossedOut => Attribute::CrossedOut,
    }
}
