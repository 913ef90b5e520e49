//! workbench - run detectors over images from the command line.
//!
//! Subcommands:
//! - `list`: detectors available in the detector directory
//! - `detect`: filter and annotate one image
//! - `run`: process an image directory, a still image or `stub://N`
//! - `create`: assemble a cascade or network detector and save it

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use detection_workbench::{
    builder::{self, CascadeEntry},
    ingest, ui, Detection, Detector, DetectorCatalog, Frame, FrameSource, RevertableOption,
    ShapeKind, Workbench, WorkbenchConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Detection workbench")]
struct Cli {
    /// Directory holding detector descriptions (*.yaml)
    #[arg(long, global = true, env = "WORKBENCH_DETECTORS_DIR", value_name = "DIR")]
    detectors_dir: Option<PathBuf>,

    /// Progress display on stderr (auto|plain|fancy)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the detectors in the detector directory
    List,
    /// Filter one image, run a detector on it and save the annotated result
    Detect(DetectArgs),
    /// Process every frame of a source
    Run(RunArgs),
    /// Build a new detector and save it to the detector directory
    #[command(subcommand)]
    Create(CreateCommand),
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// Detector name as shown by `list`
    #[arg(long)]
    detector: Option<String>,

    #[arg(long, value_name = "IMAGE")]
    input: PathBuf,

    #[arg(long, value_name = "IMAGE")]
    output: PathBuf,

    /// Option change, e.g. `sobel=1` or `binary-thresholding=120`. Repeatable,
    /// applied in order.
    #[arg(long = "set", value_name = "OPTION=VALUE")]
    sets: Vec<String>,

    /// Undo this many of the changes above
    #[arg(long, default_value_t = 0)]
    undo: usize,

    /// Detector threshold in 0..=1
    #[arg(long)]
    threshold: Option<f32>,

    /// Labels to switch off
    #[arg(long = "disable", value_name = "LABEL")]
    disabled: Vec<String>,

    /// Print detections as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Image directory, image file or `stub://N`
    #[arg(long)]
    input: Option<String>,

    #[arg(long)]
    detector: Option<String>,

    /// Where annotated frames are written
    #[arg(long, env = "WORKBENCH_OUTPUT_DIR", value_name = "DIR")]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    max_frames: Option<u64>,

    #[arg(long = "set", value_name = "OPTION=VALUE")]
    sets: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum CreateCommand {
    /// One cascade, or a group of cascades searched inside the primary
    Cascade {
        #[arg(long)]
        name: String,

        /// `label=path/to/cascade.xml`, optionally suffixed `:circle`
        #[arg(long = "entry", value_name = "LABEL=PATH[:SHAPE]", required = true)]
        entries: Vec<String>,

        /// Label of the primary cascade of a group
        #[arg(long)]
        primary: Option<String>,
    },
    /// A network model with its labels file
    Network {
        #[arg(long)]
        name: String,

        #[arg(long)]
        model: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        labels: PathBuf,
    },
}

#[derive(Serialize)]
struct DetectReport<'a> {
    input: &'a Path,
    output: &'a Path,
    detector: Option<&'a str>,
    last_change: &'a str,
    status: Option<&'a str>,
    detections: &'a [Detection],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let reporter = ui::Reporter::new(ui::Style::from_flag(Some(&cli.ui)), is_tty, !stdout_is_tty);

    let mut config = WorkbenchConfig::load()?;
    if let Some(dir) = cli.detectors_dir {
        config.detectors_dir = dir;
    }

    match cli.command {
        Command::List => list(&config),
        Command::Detect(args) => detect(&config, &reporter, args),
        Command::Run(args) => run(&config, &reporter, args),
        Command::Create(command) => create(&config, &reporter, command),
    }
}

fn list(config: &WorkbenchConfig) -> Result<()> {
    let catalog = DetectorCatalog::scan(&config.detectors_dir)?;
    if catalog.is_empty() {
        println!("no detectors in {}", catalog.dir().display());
        return Ok(());
    }
    for name in catalog.names() {
        if let Some(path) = catalog.path(&name) {
            println!("{name}\t{}", path.display());
        }
    }
    Ok(())
}

fn detect(config: &WorkbenchConfig, reporter: &ui::Reporter, args: DetectArgs) -> Result<()> {
    let mut bench = Workbench::new(config.initial_options());
    bench.source_changed(false);
    apply_sets(&mut bench, &args.sets)?;
    for _ in 0..args.undo {
        if !bench.undo() {
            log::warn!("nothing left to undo");
            break;
        }
    }

    if let Some(name) = &args.detector {
        select(&mut bench, config, reporter, name)?;
    }
    if let Some(threshold) = args.threshold {
        if !bench.adjust_threshold(threshold) {
            log::warn!("selected detector has no threshold");
        }
    }
    for label in &args.disabled {
        if !bench.enable_object(label, false) {
            log::warn!("selected detector cannot switch off {label}");
        }
    }

    let frame = {
        let _step = reporter.step("Read image");
        Frame::open(&args.input)?
    };
    let outcome = {
        let _step = reporter.step("Process frame");
        bench.process_frame(&frame)
    };
    {
        let _step = reporter.step("Write image");
        outcome.frame.save(&args.output)?;
    }

    if args.json {
        let report = DetectReport {
            input: &args.input,
            output: &args.output,
            detector: bench.detector().map(|d| d.name()),
            last_change: bench.history().last_change(),
            status: outcome.status.as_deref(),
            detections: outcome.detections.as_slice(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for det in &outcome.detections {
            println!(
                "{}\t{} {} {} {}",
                det.caption(),
                det.rect.x,
                det.rect.y,
                det.rect.width,
                det.rect.height
            );
        }
        if let Some(status) = &outcome.status {
            eprintln!("{status}");
        }
    }
    Ok(())
}

fn run(config: &WorkbenchConfig, reporter: &ui::Reporter, args: RunArgs) -> Result<()> {
    let location = args
        .input
        .or_else(|| config.source.path.clone())
        .ok_or_else(|| anyhow!("no input given and source.path is not configured"))?;
    let max_frames = args.max_frames.or(config.source.max_frames);
    let output_dir = args.output_dir.unwrap_or_else(|| config.output_dir.clone());

    let mut source = ingest::open_source(&location, max_frames)?;
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut bench = Workbench::new(config.initial_options());
    if let Some(name) = &args.detector {
        select(&mut bench, config, reporter, name)?;
    }

    let keep_running = Arc::new(AtomicBool::new(true));
    {
        let keep_running = Arc::clone(&keep_running);
        ctrlc::set_handler(move || keep_running.store(false, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    source.connect()?;
    bench.source_changed(source.is_camera());
    apply_sets(&mut bench, &args.sets)?;

    let mut counter = reporter.frames(max_frames);
    let processed = bench.run(source.as_mut(), &keep_running, |index, outcome| {
        let path = output_dir.join(format!("frame_{index:05}.png"));
        outcome.frame.save(&path)?;
        counter.tick(outcome.status.as_deref());
        Ok(())
    })?;
    drop(counter);

    log::info!("wrote {} frames to {}", processed, output_dir.display());
    Ok(())
}

fn create(
    config: &WorkbenchConfig,
    reporter: &ui::Reporter,
    command: CreateCommand,
) -> Result<()> {
    let (name, detector) = match command {
        CreateCommand::Cascade {
            name,
            entries,
            primary,
        } => {
            let entries = entries
                .iter()
                .map(|raw| parse_entry(raw.as_str()))
                .collect::<Result<Vec<_>>>()?;
            let _step = reporter.step("Load cascades");
            let detector = builder::build_cascade_detector(&entries, primary.as_deref())?;
            (name, detector)
        }
        CreateCommand::Network {
            name,
            model,
            config: model_config,
            labels,
        } => {
            let _step = reporter.step("Load network");
            let detector = builder::build_network_detector(&model, model_config.as_deref(), &labels)?;
            (name, detector)
        }
    };
    let path = builder::save_detector(detector.as_ref(), &config.detectors_dir, &name)?;
    println!("{}", path.display());
    Ok(())
}

fn select(
    bench: &mut Workbench,
    config: &WorkbenchConfig,
    reporter: &ui::Reporter,
    name: &str,
) -> Result<()> {
    let step = reporter.step(&format!("Load detector {name}"));
    let catalog = match DetectorCatalog::scan(&config.detectors_dir) {
        Ok(catalog) => catalog,
        Err(err) => {
            step.fail();
            return Err(err);
        }
    };
    let Some(path) = catalog.path(name) else {
        step.fail();
        bail!("no detector named {name} in {}", catalog.dir().display());
    };
    if !bench.select_detector(path) {
        step.fail();
        bail!("failed to load detector {name} from {}", path.display());
    }
    Ok(())
}

fn apply_sets(bench: &mut Workbench, sets: &[String]) -> Result<()> {
    for raw in sets {
        let (option, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("expected OPTION=VALUE, got {raw}"))?;
        let option: RevertableOption = option.trim().parse()?;
        let value = option
            .parse_value(value)
            .ok_or_else(|| anyhow!("invalid value {value:?} for {option}"))?;
        bench.set_option(option, value);
    }
    Ok(())
}

fn parse_entry(raw: &str) -> Result<CascadeEntry> {
    let (label, path) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected LABEL=PATH, got {raw}"))?;
    let (path, shape) = match path.rsplit_once(':') {
        Some((path, "circle")) => (path, ShapeKind::Circle),
        Some((path, "rectangle")) => (path, ShapeKind::Rectangle),
        _ => (path, ShapeKind::Rectangle),
    };
    Ok(CascadeEntry::new(label.trim(), path).with_shape(shape))
}
