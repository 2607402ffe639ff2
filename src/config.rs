use crate::theme::{Palette, Theme};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxFlowConfig {
    /// Ribbons carrying less than `threshold * total` are not drawn.
    pub threshold: f64,
    pub palette: Palette,
    pub label_font_size: f32,
    pub ribbon_opacity: f32,
    pub gridline_opacity: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for BoxFlowConfig {
    fn default() -> Self {
        Self {
            threshold: 0.005,
            palette: Palette::Set2,
            label_font_size: 14.0,
            ribbon_opacity: 0.3,
            gridline_opacity: 0.9,
            width: 640.0,
            height: 480.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub palette: Palette,
    pub legend: bool,
    pub bar_width: f64,
    pub tick_font_size: f32,
    pub tick_rotation: f32,
    pub y_tick_count: usize,
    pub width: f32,
    pub height: f32,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            palette: Palette::Tab10,
            legend: true,
            bar_width: 0.5,
            tick_font_size: 10.0,
            tick_rotation: 25.0,
            y_tick_count: 5,
            width: 1000.0,
            height: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FractionConfig {
    pub palette: Palette,
    pub orientation: Orientation,
    pub legend: bool,
    pub show_values: bool,
    /// Extent along the bar, in pixels.
    pub length: f32,
    /// Extent across the bar, in pixels.
    pub thickness: f32,
}

impl Default for FractionConfig {
    fn default() -> Self {
        Self {
            palette: Palette::Dark2,
            orientation: Orientation::Horizontal,
            legend: true,
            show_values: false,
            length: 1000.0,
            thickness: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub label_line_height: f32,
    /// Skip font lookups and size ASCII text with the built-in width table.
    pub fast_text_metrics: bool,
    pub margin: f32,
    pub boxflow: BoxFlowConfig,
    pub stack: StackConfig,
    pub fraction: FractionConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            label_line_height: 1.2,
            fast_text_metrics: false,
            margin: 16.0,
            boxflow: BoxFlowConfig::default(),
            stack: StackConfig::default(),
            fraction: FractionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    fast_text_metrics: Option<bool>,
    boxflow: Option<BoxFlowOptions>,
    stack: Option<StackOptions>,
    fraction: Option<FractionOptions>,
    render: Option<RenderOptionsFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    text_color: Option<String>,
    line_color: Option<String>,
    axis_color: Option<String>,
    grid_color: Option<String>,
    background: Option<String>,
    legend_background: Option<String>,
    legend_border: Option<String>,
}

/// Box-flow overrides, shared by config files and the `options` block of a chart document.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxFlowOptions {
    pub threshold: Option<f64>,
    pub palette: Option<Palette>,
    pub label_font_size: Option<f32>,
    pub ribbon_opacity: Option<f32>,
    pub gridline_opacity: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOptions {
    pub palette: Option<Palette>,
    pub legend: Option<bool>,
    pub bar_width: Option<f64>,
    pub tick_font_size: Option<f32>,
    pub tick_rotation: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractionOptions {
    pub palette: Option<Palette>,
    pub orientation: Option<Orientation>,
    pub legend: Option<bool>,
    pub show_values: Option<bool>,
    pub length: Option<f32>,
    pub thickness: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderOptionsFile {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
}

impl BoxFlowOptions {
    pub fn apply(&self, config: &mut BoxFlowConfig) {
        if let Some(v) = self.threshold {
            config.threshold = v;
        }
        if let Some(v) = self.palette {
            config.palette = v;
        }
        if let Some(v) = self.label_font_size {
            config.label_font_size = v;
        }
        if let Some(v) = self.ribbon_opacity {
            config.ribbon_opacity = v;
        }
        if let Some(v) = self.gridline_opacity {
            config.gridline_opacity = v;
        }
        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(v) = self.height {
            config.height = v;
        }
    }
}

impl StackOptions {
    pub fn apply(&self, config: &mut StackConfig) {
        if let Some(v) = self.palette {
            config.palette = v;
        }
        if let Some(v) = self.legend {
            config.legend = v;
        }
        if let Some(v) = self.bar_width {
            config.bar_width = v;
        }
        if let Some(v) = self.tick_font_size {
            config.tick_font_size = v;
        }
        if let Some(v) = self.tick_rotation {
            config.tick_rotation = v;
        }
        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(v) = self.height {
            config.height = v;
        }
    }
}

impl FractionOptions {
    pub fn apply(&self, config: &mut FractionConfig) {
        if let Some(v) = self.palette {
            config.palette = v;
        }
        if let Some(v) = self.orientation {
            config.orientation = v;
        }
        if let Some(v) = self.legend {
            config.legend = v;
        }
        if let Some(v) = self.show_values {
            config.show_values = v;
        }
        if let Some(v) = self.length {
            config.length = v;
        }
        if let Some(v) = self.thickness {
            config.thickness = v;
        }
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;
    apply_config_file(&mut config, parsed);
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "modern" {
            config.theme = Theme::modern();
        } else if theme_name == "classic" || theme_name == "default" {
            config.theme = Theme::classic();
        } else {
            tracing::warn!(theme = theme_name, "unknown theme name, keeping current theme");
        }
        config.render.background = config.theme.background.clone();
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.axis_color {
            config.theme.axis_color = v;
        }
        if let Some(v) = vars.grid_color {
            config.theme.grid_color = v;
        }
        if let Some(v) = vars.background {
            config.render.background = v.clone();
            config.theme.background = v;
        }
        if let Some(v) = vars.legend_background {
            config.theme.legend_background = v;
        }
        if let Some(v) = vars.legend_border {
            config.theme.legend_border = v;
        }
    }

    if let Some(v) = parsed.fast_text_metrics {
        config.layout.fast_text_metrics = v;
    }
    if let Some(options) = parsed.boxflow {
        options.apply(&mut config.layout.boxflow);
    }
    if let Some(options) = parsed.stack {
        options.apply(&mut config.layout.stack);
    }
    if let Some(options) = parsed.fraction {
        options.apply(&mut config.layout.fraction);
    }
    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(json: &str) -> Config {
        let mut config = Config::default();
        let parsed: ConfigFile = serde_json::from_str(json).unwrap();
        apply_config_file(&mut config, parsed);
        config
    }

    #[test]
    fn defaults_follow_chart_conventions() {
        let config = LayoutConfig::default();
        assert_eq!(config.boxflow.threshold, 0.005);
        assert_eq!(config.boxflow.palette, Palette::Set2);
        assert_eq!(config.fraction.palette, Palette::Dark2);
        assert_eq!(config.fraction.orientation, Orientation::Horizontal);
        assert_eq!(config.stack.tick_rotation, 25.0);
    }

    #[test]
    fn config_file_overrides_chart_options() {
        let config = config_from(
            r##"{
                "theme": "modern",
                "themeVariables": { "fontSize": 18, "background": "#000000" },
                "boxflow": {
                    "threshold": 0.02,
                    "palette": "dark2",
                    "labelFontSize": 9,
                    "gridlineOpacity": 0.5
                },
                "fraction": { "orientation": "vertical", "showValues": true },
                "render": { "width": 300 }
            }"##,
        );
        assert_eq!(config.theme.font_size, 18.0);
        assert_eq!(config.render.background, "#000000");
        assert_eq!(config.layout.boxflow.threshold, 0.02);
        assert_eq!(config.layout.boxflow.palette, Palette::Dark2);
        assert_eq!(config.layout.boxflow.gridline_opacity, 0.5);
        assert_eq!(config.layout.boxflow.label_font_size, 9.0);
        assert_eq!(config.layout.fraction.orientation, Orientation::Vertical);
        assert!(config.layout.fraction.show_values);
        assert_eq!(config.render.width, 300.0);
    }

    #[test]
    fn unknown_palette_is_rejected() {
        let parsed = serde_json::from_str::<ConfigFile>(r#"{ "stack": { "palette": "jet" } }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.layout.boxflow.threshold, 0.005);
    }
}
