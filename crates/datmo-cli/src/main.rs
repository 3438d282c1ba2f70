//! datmo - display adaptive tone mapping CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "datmo")]
#[command(author, version, about = "Display adaptive tone mapping")]
#[command(long_about = "
Tone maps high dynamic range images for a specific display and viewing
environment, keeping contrast visible where the eye is most sensitive.

Examples:
  datmo tonemap scene.hdr -o scene.png
  datmo tonemap scene.pfm -o out.png --display lcd_bright -e 1.5
  datmo tonemap scene.hdr -o out.png --peak 1000 --black 0.05 --ambient 10
  datmo tonemap scene.hdr -o out.png -w 400 --curve-out curve.txt
  datmo curve scene.hdr --display crt
  datmo display --display lcd_office
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Tone map an HDR image for a display
    #[command(visible_alias = "t")]
    Tonemap(TonemapArgs),

    /// Print the tone curve computed for an image
    Curve(CurveArgs),

    /// Print the response of a display model
    Display(DisplayCmdArgs),
}

/// Target display, either a preset with overrides or a measured table.
#[derive(Args, Clone)]
struct DisplayArgs {
    /// Display preset: lcd_office, lcd, lcd_bright, crt
    #[arg(long, default_value = "lcd")]
    display: String,

    /// Override display gamma
    #[arg(long)]
    gamma: Option<f32>,

    /// Override peak luminance (cd/m2)
    #[arg(long)]
    peak: Option<f32>,

    /// Override black level (cd/m2)
    #[arg(long)]
    black: Option<f32>,

    /// Override ambient illuminance (lux)
    #[arg(long)]
    ambient: Option<f32>,

    /// Override screen reflectivity
    #[arg(long)]
    reflectivity: Option<f32>,

    /// Measured response: text file of "pixel_value luminance" rows
    #[arg(long, conflicts_with_all = ["gamma", "peak", "black", "ambient", "reflectivity"])]
    display_lut: Option<PathBuf>,
}

/// Viewing geometry.
#[derive(Args, Clone)]
struct ViewArgs {
    /// Vertical display resolution in pixels
    #[arg(long)]
    vres: Option<u32>,

    /// Viewing distance in screen heights (with --vres)
    #[arg(long, default_value = "2.0")]
    screen_heights: f32,

    /// Pixels per visual degree (instead of --vres)
    #[arg(long, conflicts_with = "vres")]
    ppd: Option<f32>,

    /// Viewing distance in metres
    #[arg(long, default_value = "0.5")]
    view_distance: f32,
}

/// Curve shaping shared by `tonemap` and `curve`.
#[derive(Args, Clone)]
struct CurveShape {
    /// Contrast enhancement factor
    #[arg(short = 'e', long, default_value = "1.0")]
    enhancement: f32,

    /// Map this scene luminance (cd/m2) to display white; negative disables
    #[arg(short = 'w', long, allow_negative_numbers = true)]
    white: Option<f32>,
}

/// Arguments for the `tonemap` command.
#[derive(Args)]
struct TonemapArgs {
    /// Input image (.hdr, .pfm)
    input: PathBuf,

    /// Output image (.png, .pfm, .hdr)
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    display: DisplayArgs,

    #[command(flatten)]
    view: ViewArgs,

    #[command(flatten)]
    shape: CurveShape,

    /// Color saturation (default 1.0, or 0.4 with --legacy-color)
    #[arg(short = 's', long)]
    saturation: Option<f32>,

    /// Use the legacy luminance-ratio color rule
    #[arg(long)]
    legacy_color: bool,

    /// Also write the tone curve table to this file
    #[arg(long)]
    curve_out: Option<PathBuf>,

    /// PNG bit depth: 8 or 16
    #[arg(long, default_value = "8")]
    bits: u8,

    /// Abort if tone mapping takes longer than this many seconds
    #[arg(long)]
    timeout: Option<f64>,
}

/// Arguments for the `curve` command.
#[derive(Args)]
struct CurveArgs {
    /// Input image (.hdr, .pfm)
    input: PathBuf,

    #[command(flatten)]
    display: DisplayArgs,

    #[command(flatten)]
    view: ViewArgs,

    #[command(flatten)]
    shape: CurveShape,
}

/// Arguments for the `display` command.
#[derive(Args)]
struct DisplayCmdArgs {
    #[command(flatten)]
    display: DisplayArgs,

    /// Number of sampled pixel values
    #[arg(short = 'n', long, default_value = "11")]
    samples: usize,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Tonemap(args) => commands::tonemap::run(args, cli.verbose),
        Commands::Curve(args) => commands::curve::run(args, cli.verbose),
        Commands::Display(args) => commands::display::run(args),
    }
}
