use crate::config::{Config, Orientation, load_config};
use crate::ir::{ChartDocument, ChartKind, parse_document};
use crate::layout::compute_layout;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::theme::Palette;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TABPLOT_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "tabplot",
    version,
    about = "Render box-flow, stacked-bar and fraction-bar charts from JSON data"
)]
pub struct Args {
    /// Input chart document (.json / .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables and per-chart defaults)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Hide box-flow ribbons below this fraction of the total
    #[arg(long = "threshold")]
    pub threshold: Option<f64>,

    /// Color palette (Set1, Set2, Dark2, Accent, Pastel1, tab10)
    #[arg(long = "palette")]
    pub palette: Option<Palette>,

    /// Canvas width in pixels
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Canvas height in pixels
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("failed to load config file")?;
    let input = read_input(args.input.as_deref())?;
    let document = parse_document(&input)?;
    let config = resolve_config(config, &document, &args);

    let layout = compute_layout(&document.chart, &config.layout)?;
    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &config.theme, &config.layout);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(args.output.as_deref(), "png")?;
            let svg = render_svg(&layout, &config.theme, &config.layout);
            write_output_png(&svg, output, &config.render, &config.theme)?;
        }
        OutputFormat::Json => match args.output.as_deref() {
            Some(path) => write_layout_dump(path, &layout)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => {
                let dump = LayoutDump::from_layout(&layout);
                println!("{}", serde_json::to_string_pretty(&dump)?);
            }
        },
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Layers config file, then document options, then command-line flags.
fn resolve_config(mut config: Config, document: &ChartDocument, args: &Args) -> Config {
    document.apply_options(&mut config.layout);
    let kind = document.chart.kind();

    if let Some(threshold) = args.threshold {
        if kind == ChartKind::BoxFlow {
            config.layout.boxflow.threshold = threshold;
        } else {
            tracing::warn!(chart = ?kind, "--threshold only applies to box-flow charts");
        }
    }
    if let Some(palette) = args.palette {
        match kind {
            ChartKind::BoxFlow => config.layout.boxflow.palette = palette,
            ChartKind::Stack => config.layout.stack.palette = palette,
            ChartKind::Fraction => config.layout.fraction.palette = palette,
        }
    }
    if let Some(width) = args.width {
        config.render.width = width;
        match kind {
            ChartKind::BoxFlow => config.layout.boxflow.width = width,
            ChartKind::Stack => config.layout.stack.width = width,
            ChartKind::Fraction => *fraction_extent(&mut config, true) = width,
        }
    }
    if let Some(height) = args.height {
        config.render.height = height;
        match kind {
            ChartKind::BoxFlow => config.layout.boxflow.height = height,
            ChartKind::Stack => config.layout.stack.height = height,
            ChartKind::Fraction => *fraction_extent(&mut config, false) = height,
        }
    }
    config
}

/// The fraction-bar extent that lies along the canvas width (or height).
fn fraction_extent(config: &mut Config, horizontal: bool) -> &mut f32 {
    let fraction = &mut config.layout.fraction;
    if (fraction.orientation == Orientation::Horizontal) == horizontal {
        &mut fraction.length
    } else {
        &mut fraction.thickness
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output<'a>(output: Option<&'a Path>, ext: &str) -> Result<&'a Path> {
    output.ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}
