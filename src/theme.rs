use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub line_color: String,
    pub axis_color: String,
    pub grid_color: String,
    pub background: String,
    pub legend_background: String,
    pub legend_border: String,
}

impl Theme {
    /// Matplotlib-like defaults: black strokes, DejaVu Sans.
    pub fn classic() -> Self {
        Self {
            font_family: "\"DejaVu Sans\", Verdana, Arial, sans-serif".to_string(),
            font_size: 10.0,
            text_color: "#000000".to_string(),
            line_color: "#000000".to_string(),
            axis_color: "#000000".to_string(),
            grid_color: "#B0B0B0".to_string(),
            background: "#FFFFFF".to_string(),
            legend_background: "#FFFFFF".to_string(),
            legend_border: "#CCCCCC".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 11.0,
            text_color: "#1C2430".to_string(),
            line_color: "#3A4658".to_string(),
            axis_color: "#7A8AA6".to_string(),
            grid_color: "#D7E0F0".to_string(),
            background: "#FFFFFF".to_string(),
            legend_background: "#FFFFFF".to_string(),
            legend_border: "#D7E0F0".to_string(),
        }
    }
}

/// Qualitative color maps, named after their matplotlib counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Palette {
    Set1,
    Set2,
    Dark2,
    Accent,
    Pastel1,
    Tab10,
}

const SET1: [&str; 9] = [
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628", "#f781bf",
    "#999999",
];
const SET2: [&str; 8] = [
    "#66c2a5", "#fc8d62", "#8da0cb", "#e78ac3", "#a6d854", "#ffd92f", "#e5c494", "#b3b3b3",
];
const DARK2: [&str; 8] = [
    "#1b9e77", "#d95f02", "#7570b3", "#e7298a", "#66a61e", "#e6ab02", "#a6761d", "#666666",
];
const ACCENT: [&str; 8] = [
    "#7fc97f", "#beaed4", "#fdc086", "#ffff99", "#386cb0", "#f0027f", "#bf5b17", "#666666",
];
const PASTEL1: [&str; 9] = [
    "#fbb4ae", "#b3cde3", "#ccebc5", "#decbe4", "#fed9a6", "#ffffcc", "#e5d8bd", "#fddaec",
    "#f2f2f2",
];
const TAB10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

impl Palette {
    pub const ALL: [Palette; 6] = [
        Palette::Set1,
        Palette::Set2,
        Palette::Dark2,
        Palette::Accent,
        Palette::Pastel1,
        Palette::Tab10,
    ];

    pub fn colors(self) -> &'static [&'static str] {
        match self {
            Self::Set1 => &SET1,
            Self::Set2 => &SET2,
            Self::Dark2 => &DARK2,
            Self::Accent => &ACCENT,
            Self::Pastel1 => &PASTEL1,
            Self::Tab10 => &TAB10,
        }
    }

    /// Color for the `index`-th series, cycling when the palette runs out.
    pub fn color(self, index: usize) -> &'static str {
        let colors = self.colors();
        colors[index % colors.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Set1 => "Set1",
            Self::Set2 => "Set2",
            Self::Dark2 => "Dark2",
            Self::Accent => "Accent",
            Self::Pastel1 => "Pastel1",
            Self::Tab10 => "tab10",
        }
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|palette| palette.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                Error::invalid(format!(
                    "unknown palette '{wanted}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

impl TryFrom<String> for Palette {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Palette> for String {
    fn from(value: Palette) -> Self {
        value.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_names_parse_case_insensitively() {
        assert_eq!("set2".parse::<Palette>().unwrap(), Palette::Set2);
        assert_eq!("DARK2".parse::<Palette>().unwrap(), Palette::Dark2);
        assert_eq!(" Tab10 ".parse::<Palette>().unwrap(), Palette::Tab10);
        assert!("viridis".parse::<Palette>().is_err());
    }

    #[test]
    fn palette_colors_cycle() {
        let palette = Palette::Set2;
        let len = palette.colors().len();
        assert_eq!(palette.color(0), palette.color(len));
        assert_ne!(palette.color(0), palette.color(1));
    }

    #[test]
    fn palette_round_trips_through_serde() {
        let json = serde_json::to_string(&Palette::Accent).unwrap();
        assert_eq!(json, "\"Accent\"");
        let back: Palette = serde_json::from_str("\"accent\"").unwrap();
        assert_eq!(back, Palette::Accent);
    }
}
