use crate::config::LayoutConfig;
use crate::text_metrics;

use super::TextBlock;

/// Measures a possibly multi-line label. Lines are split on `\n` and never wrapped.
pub(crate) fn measure_label_with_font_size(
    text: &str,
    font_size: f32,
    config: &LayoutConfig,
    font_family: &str,
) -> TextBlock {
    let lines = split_lines(text);
    let fast_metrics = config.fast_text_metrics;
    let width = lines
        .iter()
        .map(|line| text_width(line, font_size, font_family, fast_metrics))
        .fold(0.0, f32::max);
    let height = lines.len() as f32 * font_size * config.label_line_height;
    TextBlock {
        lines,
        width,
        height,
    }
}

pub(crate) fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

pub(crate) fn text_width(text: &str, font_size: f32, font_family: &str, fast_metrics: bool) -> f32 {
    if fast_metrics && text.is_ascii() {
        return fallback_text_width(text, font_size);
    }
    text_metrics::measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| fallback_text_width(text, font_size))
}

/// Approximate advance of `ch` in ems for a DejaVu-like sans face.
pub(crate) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.318,
        '.' | ',' | ':' | ';' | '|' | '!' | '\'' => 0.318,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.39,
        'i' | 'j' | 'l' => 0.278,
        'I' => 0.295,
        'f' | 't' | 'r' => 0.38,
        'm' | 'w' => 0.88,
        'M' | 'W' => 0.92,
        '0'..='9' => 0.636,
        'A'..='Z' => 0.68,
        'a'..='z' => 0.6,
        '%' | '@' | '&' | '#' => 0.9,
        _ => 0.6,
    }
}

fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(char_width_factor)
        .sum::<f32>()
        * font_size
}
