use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{BoxFlowOptions, FractionOptions, LayoutConfig, StackOptions};
use crate::error::{Error, Result};

/// Source label -> destination label -> magnitude, in insertion order.
pub type FlowSpec = IndexMap<String, IndexMap<String, f64>>;

/// One row of a table, keyed by column name.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[serde(alias = "sankey")]
    BoxFlow,
    Stack,
    Fraction,
}

#[derive(Debug, Clone)]
pub enum Chart {
    BoxFlow(FlowSpec),
    Stack(StackSpec),
    Fraction(FractionSpec),
}

impl Chart {
    pub fn kind(&self) -> ChartKind {
        match self {
            Self::BoxFlow(_) => ChartKind::BoxFlow,
            Self::Stack(_) => ChartKind::Stack,
            Self::Fraction(_) => ChartKind::Fraction,
        }
    }
}

/// How the bars of a stacked chart are ordered along x.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum XOrder {
    /// Most frequent x value first; ties keep first-appearance order.
    #[default]
    Frequency,
    /// First-appearance order.
    Input,
    /// Exactly this order; every x value in the data must be listed.
    Explicit(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct StackSpec {
    pub records: Vec<Record>,
    /// Column whose values become the bars.
    pub x: String,
    /// Column whose values become the stacked segments.
    pub y: String,
    /// Optional numeric column; segments sum it instead of counting rows.
    pub weight: Option<String>,
    pub x_order: XOrder,
    pub y_order: Option<Vec<String>>,
    /// Normalize each bar to sum to 1.
    pub fractions: bool,
    /// Title-case the segment names shown in the legend.
    pub title_case: bool,
}

impl StackSpec {
    pub fn new(records: Vec<Record>, x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            records,
            x: x.into(),
            y: y.into(),
            weight: None,
            x_order: XOrder::default(),
            y_order: None,
            fractions: false,
            title_case: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FractionSpec {
    pub counts: Vec<f64>,
    pub labels: Vec<String>,
    pub title: Option<String>,
}

impl FractionSpec {
    pub fn new(counts: Vec<f64>, labels: Vec<String>) -> Self {
        Self {
            counts,
            labels,
            title: None,
        }
    }
}

/// Returns the textual key of a table cell, or `None` for missing values.
pub fn cell_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// A chart document: the chart plus the option overrides it carried.
#[derive(Debug, Clone)]
pub struct ChartDocument {
    pub chart: Chart,
    pub boxflow: BoxFlowOptions,
    pub stack: StackOptions,
    pub fraction: FractionOptions,
}

impl ChartDocument {
    /// Applies the document's styling overrides for its own chart kind.
    pub fn apply_options(&self, config: &mut LayoutConfig) {
        match self.chart.kind() {
            ChartKind::BoxFlow => self.boxflow.apply(&mut config.boxflow),
            ChartKind::Stack => self.stack.apply(&mut config.stack),
            ChartKind::Fraction => self.fraction.apply(&mut config.fraction),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    chart: ChartKind,
    data: Value,
    #[serde(default)]
    options: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackColumns {
    x: Option<String>,
    y: Option<String>,
    weight: Option<String>,
    x_order: Option<RawXOrder>,
    y_order: Option<Vec<String>>,
    #[serde(default)]
    fractions: bool,
    title_case: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawXOrder {
    Flag(bool),
    Named(String),
    Explicit(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawFraction {
    counts: Vec<Value>,
    labels: Vec<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Parses a chart document. Strict JSON is tried first, then JSON5.
pub fn parse_document(input: &str) -> Result<ChartDocument> {
    let value = match serde_json::from_str::<Value>(input) {
        Ok(value) => value,
        Err(json_err) => json5::from_str::<Value>(input)
            .map_err(|json5_err| Error::Parse(format!("{json_err}; as JSON5: {json5_err}")))?,
    };
    let raw: RawDocument =
        serde_json::from_value(value).map_err(|err| Error::Parse(err.to_string()))?;
    let options = if raw.options.is_null() {
        Value::Object(Map::new())
    } else {
        raw.options
    };

    let chart = match raw.chart {
        ChartKind::BoxFlow => Chart::BoxFlow(flow_spec_from_value(&raw.data)?),
        ChartKind::Stack => Chart::Stack(stack_spec_from_value(raw.data, &options)?),
        ChartKind::Fraction => Chart::Fraction(fraction_spec_from_value(raw.data)?),
    };

    let (boxflow, stack, fraction) = match chart.kind() {
        ChartKind::BoxFlow => (
            parse_options(&options, "boxflow")?,
            Default::default(),
            Default::default(),
        ),
        ChartKind::Stack => (
            Default::default(),
            parse_options(&options, "stack")?,
            Default::default(),
        ),
        ChartKind::Fraction => (
            Default::default(),
            Default::default(),
            parse_options(&options, "fraction")?,
        ),
    };

    Ok(ChartDocument {
        chart,
        boxflow,
        stack,
        fraction,
    })
}

fn parse_options<T: DeserializeOwned>(options: &Value, kind: &str) -> Result<T> {
    serde_json::from_value(options.clone())
        .map_err(|err| Error::Parse(format!("{kind} options: {err}")))
}

/// Converts a nested JSON object into a [`FlowSpec`], keeping key order.
pub fn flow_spec_from_value(value: &Value) -> Result<FlowSpec> {
    let Value::Object(sources) = value else {
        return Err(Error::invalid("box-flow data must be an object of objects"));
    };
    let mut spec = FlowSpec::with_capacity(sources.len());
    for (source, flows) in sources {
        let Value::Object(flows) = flows else {
            return Err(Error::invalid(format!(
                "flows of '{source}' must be an object of destination -> magnitude"
            )));
        };
        let mut targets = IndexMap::with_capacity(flows.len());
        for (target, magnitude) in flows {
            let magnitude = magnitude.as_f64().ok_or_else(|| {
                Error::invalid(format!(
                    "magnitude of '{source}' -> '{target}' is not a number: {magnitude}"
                ))
            })?;
            targets.insert(target.clone(), magnitude);
        }
        spec.insert(source.clone(), targets);
    }
    Ok(spec)
}

fn stack_spec_from_value(data: Value, options: &Value) -> Result<StackSpec> {
    let Value::Array(rows) = data else {
        return Err(Error::invalid("stack data must be an array of records"));
    };
    let mut records = Vec::with_capacity(rows.len());
    for (idx, row) in rows.into_iter().enumerate() {
        match row {
            Value::Object(record) => records.push(record),
            other => {
                return Err(Error::invalid(format!(
                    "stack record {idx} is not an object: {other}"
                )));
            }
        }
    }

    let columns: StackColumns = serde_json::from_value(options.clone())
        .map_err(|err| Error::Parse(format!("stack options: {err}")))?;
    let x = columns
        .x
        .ok_or_else(|| Error::invalid("stack chart needs an 'x' column option"))?;
    let y = columns
        .y
        .ok_or_else(|| Error::invalid("stack chart needs a 'y' column option"))?;
    let x_order = match columns.x_order {
        None | Some(RawXOrder::Flag(true)) => XOrder::Frequency,
        Some(RawXOrder::Flag(false)) => XOrder::Input,
        Some(RawXOrder::Named(name)) => match name.as_str() {
            "frequency" => XOrder::Frequency,
            "input" => XOrder::Input,
            other => {
                return Err(Error::invalid(format!(
                    "xOrder must be a bool, \"frequency\", \"input\" or a list, got \"{other}\""
                )));
            }
        },
        Some(RawXOrder::Explicit(order)) => XOrder::Explicit(order),
    };

    Ok(StackSpec {
        records,
        x,
        y,
        weight: columns.weight,
        x_order,
        y_order: columns.y_order,
        fractions: columns.fractions,
        title_case: columns.title_case.unwrap_or(true),
    })
}

fn fraction_spec_from_value(data: Value) -> Result<FractionSpec> {
    let raw: RawFraction = serde_json::from_value(data)
        .map_err(|err| Error::Parse(format!("fraction data: {err}")))?;
    let counts = raw
        .counts
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            value.as_f64().ok_or_else(|| {
                Error::invalid(format!("count {idx} is not a number: {value}"))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(FractionSpec {
        counts,
        labels: raw.labels,
        title: raw.title.filter(|title| !title.is_empty()),
    })
}
