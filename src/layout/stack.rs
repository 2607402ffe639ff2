use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::StackConfig;
use crate::error::{Error, Result};
use crate::ir::{StackSpec, XOrder, cell_key};

use super::axis::{AxisTick, axis_ticks};
use super::{Legend, LegendItem};

const TOP_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackSegment {
    pub category: String,
    pub value: f64,
    pub start: f64,
    pub end: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackBar {
    pub label: String,
    /// Bar center on the categorical x axis (bar `i` sits at `i`).
    pub center: f64,
    pub width: f64,
    pub total: f64,
    pub segments: Vec<StackSegment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackLayout {
    pub bars: Vec<StackBar>,
    /// Display names of the stacked categories, bottom to top.
    pub categories: Vec<String>,
    pub y_max: f64,
    pub y_ticks: Vec<AxisTick>,
    pub show_y_axis: bool,
    pub tick_font_size: f32,
    pub tick_rotation: f32,
    pub legend: Option<Legend>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

struct Row {
    x: String,
    y: Option<String>,
    amount: f64,
}

pub fn compute_stack(spec: &StackSpec, config: &StackConfig) -> Result<StackLayout> {
    let rows = collect_rows(spec);
    let raw_categories = resolve_categories(spec, &rows)?;
    let groups = order_groups(spec, &rows)?;
    debug!(
        rows = rows.len(),
        bars = groups.len(),
        categories = raw_categories.len(),
        "resolved stack groups"
    );

    let category_index: HashMap<&str, usize> = raw_categories
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let group_index: HashMap<&str, usize> = groups
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let mut values = vec![vec![0.0f64; raw_categories.len()]; groups.len()];
    for row in &rows {
        let Some(category) = row.y.as_deref() else {
            continue;
        };
        let (Some(&g), Some(&c)) = (group_index.get(row.x.as_str()), category_index.get(category))
        else {
            continue;
        };
        values[g][c] += row.amount;
    }

    if spec.fractions {
        for bar in &mut values {
            let sum: f64 = bar.iter().sum();
            if sum > 0.0 {
                bar.iter_mut().for_each(|value| *value /= sum);
            }
        }
    }

    let categories: Vec<String> = raw_categories
        .iter()
        .map(|name| {
            if spec.title_case {
                title_case(name)
            } else {
                name.clone()
            }
        })
        .collect();

    let bars: Vec<StackBar> = groups
        .iter()
        .zip(&values)
        .enumerate()
        .map(|(idx, (label, bar_values))| {
            let mut level = 0.0;
            let segments = categories
                .iter()
                .zip(bar_values)
                .enumerate()
                .map(|(c, (category, &value))| {
                    let start = level;
                    level += value;
                    StackSegment {
                        category: category.clone(),
                        value,
                        start,
                        end: level,
                        color: config.palette.color(c).to_string(),
                    }
                })
                .collect();
            StackBar {
                label: label.clone(),
                center: idx as f64,
                width: config.bar_width,
                total: level,
                segments,
            }
        })
        .collect();

    let y_max = if spec.fractions {
        1.0
    } else {
        bars.iter().map(|bar| bar.total).fold(0.0, f64::max)
    };
    let y_top = if y_max > 0.0 { y_max * (1.0 + TOP_MARGIN) } else { 1.0 };
    let y_ticks = if spec.fractions {
        Vec::new()
    } else {
        axis_ticks(0.0, y_max.max(f64::MIN_POSITIVE), config.y_tick_count)
            .into_iter()
            .filter(|tick| tick.value <= y_top)
            .collect()
    };
    let legend = config.legend.then(|| Legend {
        title: Some(title_case_if(&spec.y, spec.title_case)),
        items: categories
            .iter()
            .enumerate()
            .map(|(c, label)| LegendItem {
                label: label.clone(),
                color: config.palette.color(c).to_string(),
            })
            .collect(),
    });

    let half = config.bar_width.max(0.5);
    Ok(StackLayout {
        x_range: (-half, (bars.len().max(1) - 1) as f64 + half),
        y_range: (0.0, y_top),
        bars,
        categories,
        y_max,
        y_ticks,
        show_y_axis: !spec.fractions,
        tick_font_size: config.tick_font_size,
        tick_rotation: config.tick_rotation,
        legend,
    })
}

fn collect_rows(spec: &StackSpec) -> Vec<Row> {
    let mut rows = Vec::with_capacity(spec.records.len());
    for record in &spec.records {
        let Some(x) = cell_key(record.get(&spec.x)) else {
            continue;
        };
        let y = cell_key(record.get(&spec.y));
        let amount = match &spec.weight {
            None => 1.0,
            Some(column) => match record.get(column).and_then(|value| value.as_f64()) {
                Some(weight) if weight.is_finite() => weight,
                _ => 0.0,
            },
        };
        rows.push(Row { x, y, amount });
    }
    rows
}

/// Distinct y values in sorted order, or exactly `y_order` when given.
fn resolve_categories(spec: &StackSpec, rows: &[Row]) -> Result<Vec<String>> {
    let mut present: Vec<String> = Vec::new();
    for row in rows {
        if let Some(y) = &row.y
            && !present.contains(y)
        {
            present.push(y.clone());
        }
    }

    if let Some(order) = &spec.y_order {
        if let Some(missing) = order.iter().find(|name| !present.contains(name)) {
            return Err(Error::invalid(format!(
                "yOrder names '{missing}', which never appears in column '{}'",
                spec.y
            )));
        }
        return Ok(order.clone());
    }

    let numeric: Option<Vec<f64>> = present.iter().map(|v| v.parse::<f64>().ok()).collect();
    match numeric {
        Some(keys) if !keys.is_empty() => {
            let mut paired: Vec<(f64, String)> = keys.into_iter().zip(present).collect();
            paired.sort_by(|a, b| a.0.total_cmp(&b.0));
            Ok(paired.into_iter().map(|(_, name)| name).collect())
        }
        _ => {
            present.sort();
            Ok(present)
        }
    }
}

fn order_groups(spec: &StackSpec, rows: &[Row]) -> Result<Vec<String>> {
    let mut first_seen: Vec<String> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        let count = counts.entry(row.x.as_str()).or_insert(0);
        if *count == 0 {
            first_seen.push(row.x.clone());
        }
        *count += 1;
    }

    match &spec.x_order {
        XOrder::Input => Ok(first_seen),
        XOrder::Frequency => {
            let mut ordered = first_seen;
            // Stable: ties keep first-appearance order.
            ordered.sort_by(|a, b| {
                let ca = counts.get(a.as_str()).copied().unwrap_or(0);
                let cb = counts.get(b.as_str()).copied().unwrap_or(0);
                cb.cmp(&ca)
            });
            Ok(ordered)
        }
        XOrder::Explicit(order) => {
            if let Some(missing) = first_seen.iter().find(|x| !order.contains(x)) {
                return Err(Error::invalid(format!(
                    "value '{missing}' of column '{}' is not listed in xOrder",
                    spec.x
                )));
            }
            let mut ordered: Vec<String> = Vec::with_capacity(first_seen.len());
            for name in order {
                if counts.contains_key(name.as_str()) && !ordered.contains(name) {
                    ordered.push(name.clone());
                }
            }
            Ok(ordered)
        }
    }
}

fn title_case_if(text: &str, enabled: bool) -> String {
    if enabled {
        title_case(text)
    } else {
        text.to_string()
    }
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}
