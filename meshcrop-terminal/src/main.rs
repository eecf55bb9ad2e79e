//! meshcrop - crop a model's mesh to a box and save the result as GLB
//!
//! Subcommands:
//! - `edit`: interactive cropper in the terminal
//! - `crop`: headless crop to an explicit world-space box
//! - `inspect`: summarize a .glb or .gltf file
//! - `config`: show the settings file, or write the defaults to it

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use meshcrop_core::glb::{self, GlbContainer};
use meshcrop_core::{
    Aabb, CropReport, CropSession, CropperError, GlbExporter, GltfLoader, ModelLoader, ModelSource,
};
use meshcrop_terminal::{write_artifact, CropperApp, Settings};
use nalgebra::Point3;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meshcrop", version)]
#[command(about = "Crop a glTF/GLB model to a box and save it as GLB", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive cropper
    Edit(EditArgs),
    /// Crop to an explicit world-space box and save the result
    Crop(CropArgs),
    /// Print a summary of a .glb or .gltf file
    Inspect(InspectArgs),
    /// Show the settings file and the effective settings
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
struct EditArgs {
    /// Path or URL of a .gltf/.glb model
    source: String,

    /// Directory for the cropped artifact (overrides settings)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CropArgs {
    /// Path or URL of a .gltf/.glb model
    source: String,

    /// Minimum corner of the crop box, as x,y,z
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    min: Point3<f32>,

    /// Maximum corner of the crop box, as x,y,z
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    max: Point3<f32>,

    /// Directory for the cropped artifact (overrides settings)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// A .glb or .gltf file
    file: PathBuf,
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Write the default settings if no settings file exists yet
    #[arg(long)]
    init: bool,
}

fn parse_point(value: &str) -> Result<Point3<f32>, String> {
    let coords = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate in {value:?}: {e}"))?;
    match coords[..] {
        [x, y, z] => Ok(Point3::new(x, y, z)),
        _ => Err(format!("expected x,y,z but got {value:?}")),
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "meshcrop=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        // The editor owns the terminal, so logs go to a file
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn user_error(err: CropperError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

fn open_session(source: &str) -> Result<CropSession> {
    let mut session = CropSession::new();
    session
        .open(&GltfLoader, &ModelSource::parse(source))
        .map_err(user_error)?;
    Ok(session)
}

fn edit(args: EditArgs, mut settings: Settings) -> Result<()> {
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }
    let log_path = settings.log_path();
    init_logging(Some(&log_path))?;

    println!("Loading {}...", args.source);
    let session = open_session(&args.source)?;

    let mut app = CropperApp::new(session, settings)?;
    app.run()?;

    if let Some(notification) = app.notification() {
        println!("{notification}");
    }
    println!("Log written to {}", log_path.display());
    Ok(())
}

fn crop_to_bounds(session: &mut CropSession, bounds: &Aabb) -> Result<CropReport> {
    if !session.fit_region(bounds) {
        bail!("Could not place the crop box in state {}", session.state().label());
    }
    session.crop_and_save(&GlbExporter).map_err(user_error)
}

fn crop(args: CropArgs, mut settings: Settings) -> Result<()> {
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }
    init_logging(None)?;

    let bounds = Aabb::new(args.min, args.max);
    if bounds.is_empty() {
        bail!("--min must not exceed --max on any axis");
    }

    let mut session = open_session(&args.source)?;
    let report = crop_to_bounds(&mut session, &bounds)?;

    let path = write_artifact(&settings.output_dir, &report.artifact)
        .with_context(|| format!("Failed to write {}", report.artifact.file_name))?;
    if let Some(warning) = &report.artifact.warning {
        eprintln!("warning: {warning}");
    }
    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(&report.stats)?);
    Ok(())
}

fn array_len(document: &serde_json::Value, key: &str) -> usize {
    document[key].as_array().map_or(0, Vec::len)
}

fn inspect(args: InspectArgs) -> Result<()> {
    init_logging(None)?;
    let path = &args.file;
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if glb::is_glb(&data) {
        let container = GlbContainer::parse(&data).context("Invalid GLB container")?;
        let document = container.json_value()?;
        println!("GLB version {}, {} bytes", container.version, container.length);
        println!("  JSON chunk: {} bytes", container.json.len());
        match container.bin {
            Some(bin) => println!("  BIN chunk:  {} bytes", bin.len()),
            None => println!("  BIN chunk:  none"),
        }
        println!(
            "  meshes: {}, accessors: {}, nodes: {}",
            array_len(&document, "meshes"),
            array_len(&document, "accessors"),
            array_len(&document, "nodes")
        );
    }

    let source = ModelSource::Bytes {
        data,
        base_dir: path.parent().map(Path::to_path_buf),
    };
    let scene = GltfLoader
        .load(&source)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&scene.summary())?);
    Ok(())
}

fn config(args: ConfigArgs, settings: Settings) -> Result<()> {
    let Some(path) = Settings::config_path() else {
        bail!("No configuration directory on this platform");
    };
    if args.init {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        Settings::default().save_to(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }
    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;

    match cli.command {
        Commands::Edit(args) => edit(args, settings),
        Commands::Crop(args) => crop(args, settings),
        Commands::Inspect(args) => inspect(args),
        Commands::Config(args) => config(args, settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1, -2.5,3"), Ok(Point3::new(1.0, -2.5, 3.0)));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,2,three").is_err());
    }

    #[test]
    fn test_crop_args() {
        let cli = Cli::try_parse_from([
            "meshcrop", "crop", "model.glb", "--min", "-1,0,-1", "--max", "1,2,1",
        ])
        .unwrap();
        let Commands::Crop(args) = cli.command else {
            panic!("expected crop");
        };
        assert_eq!(args.min, Point3::new(-1.0, 0.0, -1.0));
        assert_eq!(args.max, Point3::new(1.0, 2.0, 1.0));
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn test_refused_fit_is_an_error() {
        let mut session = CropSession::new();
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let err = crop_to_bounds(&mut session, &bounds).unwrap_err();
        assert!(err.to_string().contains("Could not place the crop box"));
        assert_eq!(session.state(), meshcrop_core::SessionState::Idle);
    }

    #[test]
    fn test_config_args() {
        let cli = Cli::try_parse_from(["meshcrop", "config", "--init"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigArgs { init: true })));
    }
}
