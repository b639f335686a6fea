use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coreg::core::{Frame, FrameId, MemoryPointStore, Vec3};
use coreg::pipeline::{
    calibrate_pair, map_points, JsonFileTransformStore, MapOptions, RegistrationConfig,
    TransformStore,
};
use log::info;
use tempfile::NamedTempFile;

/// Register coordinate frames from shared points and map points between them.
#[derive(Debug, Parser)]
#[command(name = "coreg", author, version, about = "Point-based 3D frame registration")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG is used otherwise.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit and save the transforms between two frames, in both directions.
    Calibrate {
        /// JSON point store with the frames' saved positions.
        #[arg(long)]
        points: String,
        /// JSON transform store; created if missing.
        #[arg(long)]
        transforms: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        dest: String,
        /// Optional JSON RegistrationConfig. Defaults are used if omitted.
        #[arg(long)]
        config: Option<String>,
        /// Save the closed-form fit if refinement does not converge.
        #[arg(long)]
        accept_unrefined: bool,
    },
    /// Map every point of the source frame into the destination frame.
    Apply {
        /// JSON point store; rewritten with the mapped points.
        #[arg(long)]
        points: String,
        #[arg(long)]
        transforms: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        dest: String,
        /// Appended to each label in the destination frame.
        #[arg(long, default_value = "")]
        suffix: String,
        /// Added to each mapped point, in destination coordinates.
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
        offset: Option<Vec<f64>>,
    },
    /// Print every saved transform.
    Show {
        #[arg(long)]
        transforms: String,
    },
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Write `value` next to `path` and rename it into place.
fn write_json_file<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn lookup_frame(points: &MemoryPointStore, name: &str) -> Result<Frame> {
    points
        .frame(&FrameId::new(name))
        .with_context(|| format!("frame {name:?} not found in point store"))
}

fn run_calibrate(
    points_path: &str,
    transforms_path: &str,
    source: &str,
    dest: &str,
    config_path: Option<&str>,
    accept_unrefined: bool,
) -> Result<String> {
    let points: MemoryPointStore = load_json_file(Path::new(points_path))?;
    let mut config = if let Some(cfg_path) = config_path {
        load_json_file::<RegistrationConfig>(Path::new(cfg_path))?
    } else {
        RegistrationConfig::default()
    };
    config.accept_unrefined |= accept_unrefined;

    let a = lookup_frame(&points, source)?;
    let b = lookup_frame(&points, dest)?;
    let mut transforms = JsonFileTransformStore::new(transforms_path);
    let calibration = calibrate_pair(&points, &mut transforms, &a, &b, &config)
        .with_context(|| format!("calibrating {source} <-> {dest}"))?;
    info!("saved {source} <-> {dest} to {transforms_path}");
    Ok(serde_json::to_string_pretty(&calibration)?)
}

fn run_apply(
    points_path: &str,
    transforms_path: &str,
    source: &str,
    dest: &str,
    options: MapOptions,
) -> Result<String> {
    let path = Path::new(points_path);
    let mut points: MemoryPointStore = load_json_file(path)?;
    let transforms = JsonFileTransformStore::new(transforms_path);

    let src = lookup_frame(&points, source)?;
    // the destination may have no points yet; fall back to the axes recorded with the transform
    let dst = match points.frame(&FrameId::new(dest)) {
        Some(frame) => frame,
        None => transforms.load(&src.id, &FrameId::new(dest))?.dest,
    };

    let summary = map_points(&mut points, &transforms, &src, &dst, &options)
        .with_context(|| format!("mapping {source} -> {dest}"))?;
    write_json_file(&points, path)?;
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn run_show(transforms_path: &str) -> Result<String> {
    let transforms = JsonFileTransformStore::new(transforms_path);
    let all = transforms
        .keys()?
        .iter()
        .map(|(s, d)| transforms.load(s, d))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string_pretty(&all)?)
}

fn init_logging(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder.init();
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let json = match cli.command {
        Command::Calibrate {
            points,
            transforms,
            source,
            dest,
            config,
            accept_unrefined,
        } => run_calibrate(
            &points,
            &transforms,
            &source,
            &dest,
            config.as_deref(),
            accept_unrefined,
        )?,
        Command::Apply {
            points,
            transforms,
            source,
            dest,
            suffix,
            offset,
        } => {
            let offset = offset
                .map(|v| Vec3::new(v[0], v[1], v[2]))
                .unwrap_or_else(Vec3::zeros);
            run_apply(
                &points,
                &transforms,
                &source,
                &dest,
                MapOptions { suffix, offset },
            )?
        }
        Command::Show { transforms } => run_show(&transforms)?,
    };
    println!("{json}");
    Ok(())
}
