use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use grabmaps::grab::{self, InspectError, SimulationParams};
use grabmaps::session::{BoundsMode, ConfigError, GrabConfig, GrabError, SessionStatus};
use grabmaps::GeoRect;
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "grabmaps", version, about = "Grab calibrated map tiles from a map viewer")]
struct Cli {
    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit JSON logs through `tracing` instead of plain lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Viewer reports its bounds and pans to coordinates.
    Direct,
    /// Viewer answers point queries and pans relatively.
    Sampled,
}

impl From<Mode> for BoundsMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Direct => BoundsMode::DirectBounds,
            Mode::Sampled => BoundsMode::SampledCorners,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print a grab configuration built on a preset viewer profile.
    Preset {
        #[arg(value_enum)]
        mode: Mode,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the calibration stored in a `.gdm` file.
    Inspect {
        gdm: PathBuf,
        /// Print the inspection as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a grab against a synthetic viewer.
    Simulate {
        /// Grab configuration (JSON). Defaults to the preset for `--mode`.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "direct")]
        mode: Mode,
        #[arg(long)]
        map_folder: Option<PathBuf>,
        #[arg(long)]
        zoom_steps: Option<u32>,
        /// PNG map to grab from instead of a generated checkerboard.
        #[arg(long)]
        raster: Option<PathBuf>,
        /// Extent of the map as `north,south,east,west` in degrees.
        #[arg(long, value_parser = parse_extent)]
        extent: Option<GeoRect>,
        /// Write the session report (JSON) here.
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Grab(#[from] GrabError),
    #[error(transparent)]
    Inspect(#[from] InspectError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    if cli.json_logs {
        grabmaps::core::init_tracing(true);
        return;
    }
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = grabmaps::core::init_with_level(level);
}

fn parse_extent(s: &str) -> Result<GeoRect, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("`{v}`: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let [north, south, east, west] = values[..] else {
        return Err(format!("expected 4 values, got {}", values.len()));
    };
    let rect = GeoRect::new(north, south, east, west);
    rect.validate().map_err(|e| e.to_string())?;
    Ok(rect)
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Preset { mode, output } => {
            let config = grab::preset_config(mode.into());
            match output {
                Some(path) => config.write_json(path)?,
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
        Command::Inspect { gdm, json } => {
            let inspection = grab::inspect_tile(&gdm)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
                return Ok(());
            }
            let record = &inspection.record;
            println!("image: {}", record.image_file_name);
            println!("zoom level: {}", record.zoom_level);
            match inspection.image_size {
                Some((w, h)) => println!("size: {w}x{h}"),
                None => println!("size: image not found"),
            }
            for p in &record.points {
                println!(
                    "  ({}, {}) -> {:.6}, {:.6}",
                    p.x, p.y, p.position.lng, p.position.lat
                );
            }
            if let Some(fit) = inspection.fit {
                println!(
                    "fit: {:.9} deg/px east, {:.9} deg/px south, max residual {:.2} px",
                    fit.lng_per_px, fit.lat_per_px, fit.max_residual_px
                );
            }
        }
        Command::Simulate {
            config,
            mode,
            map_folder,
            zoom_steps,
            raster,
            extent,
            report,
        } => {
            let mut config = match config {
                Some(path) => GrabConfig::load_json(path)?,
                None => grab::preset_config(mode.into()),
            };
            if let Some(folder) = map_folder {
                config.map_folder = folder;
            }
            if let Some(steps) = zoom_steps {
                config.zoom_steps = steps;
            }
            let defaults = SimulationParams::default();
            let params = SimulationParams {
                mode: mode.into(),
                raster,
                extent: extent.unwrap_or(defaults.extent),
                ..defaults
            };
            let summary = grab::simulate(&config, &params)?;

            let status = match summary.status {
                SessionStatus::Completed => "completed",
                SessionStatus::Cancelled => "cancelled",
            };
            println!("{status}: {} tiles", summary.tiles_written);
            for level in &summary.levels {
                println!(
                    "  zoom {}: {}x{} tiles ({:?}), {} pans",
                    level.zoom_step, level.slices_x, level.slices_y, level.strategy, level.pans
                );
            }
            if let Some(path) = report {
                std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
            }
        }
    }
    Ok(())
}
