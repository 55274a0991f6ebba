//! Command line front end for inspecting calibration sequences, decoding
//! recorded landmark frames and running simulated calibrations.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gaze_calibration::{
    codec,
    config::{Config, EXAMPLE_CONFIG},
    context::{CalibrationContext, CalibrationOutcome, CalibrationTick},
    landmarks::Point2D,
    model::{FileModelStore, MemoryModelStore, ModelRegistry, ModelStore},
    sequence::{CalibrationSequencer, CancellationToken, Segment, SequenceTemplate, Speed},
    simulation::{SimulatedCamera, SyntheticFace},
};
use log::{info, warn};
use std::{io::Read, path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the timeline of the configured calibration sequence
    Sequence {
        /// Override the template (scan_xy, scan_x, scan_y, grid, zigzag)
        #[arg(short, long)]
        template: Option<SequenceTemplate>,

        /// Override the grid size
        #[arg(short, long)]
        size: Option<usize>,

        /// Override the speed (slow, medium, fast)
        #[arg(long)]
        speed: Option<Speed>,

        /// Also sample the target state every STEP seconds
        #[arg(long)]
        step: Option<f64>,
    },

    /// Decode a serialized landmark frame and report its framing
    Decode {
        /// Encoded frame; read from stdin when omitted
        frame: Option<String>,

        /// Dump the decoded frame as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a full calibration against a synthetic face
    Simulate {
        /// Animation and capture rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Horizontal head offset from the frame center
        #[arg(long, default_value = "0.0")]
        head_offset: f64,

        /// Persist the trained model to the configured store directory
        #[arg(long)]
        persist: bool,

        /// Print the training report as JSON
        #[arg(long)]
        report: bool,
    },

    /// Print an example configuration file
    ExampleConfig {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Sequence {
            template,
            size,
            speed,
            step,
        } => print_sequence(&config, template, size, speed, step),
        Command::Decode { frame, json } => decode(frame, json),
        Command::Simulate {
            fps,
            head_offset,
            persist,
            report,
        } => simulate(&config, fps, head_offset, persist, report),
        Command::ExampleConfig { output } => {
            if let Some(path) = output {
                std::fs::write(&path, EXAMPLE_CONFIG)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Wrote example configuration to {}", path.display());
            } else {
                print!("{EXAMPLE_CONFIG}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    info!("Loading configuration from: {}", path.display());
    let config = Config::from_file(path)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_sequence(
    config: &Config,
    template: Option<SequenceTemplate>,
    size: Option<usize>,
    speed: Option<Speed>,
    step: Option<f64>,
) -> Result<()> {
    let mut spec = config.sequence_spec();
    spec.template = template.unwrap_or(spec.template);
    spec.size = size.unwrap_or(spec.size);
    spec.speed = speed.unwrap_or(spec.speed);
    let sequencer = CalibrationSequencer::build(&spec)?;

    println!(
        "{} sequence, size {}, {} speed: {:.2}s",
        spec.template,
        spec.size,
        spec.speed,
        sequencer.duration()
    );
    print_segment(sequencer.root(), 0.0, 0);

    if let Some(step) = step {
        if !(step.is_finite() && step > 0.0) {
            bail!("Step must be positive, got {step}");
        }
        println!();
        let mut t = 0.0;
        while t <= sequencer.duration() {
            let point = sequencer.point_at(t);
            let position = point
                .position
                .map_or_else(|| "-".to_string(), |p| format!("({:.3}, {:.3})", p.x, p.y));
            println!(
                "{t:8.3}s  {position:<16} size {:<6} opacity {:<6} {}{}",
                point.size.map_or_else(|| "-".to_string(), |s| format!("{s:.3}")),
                point.opacity.map_or_else(|| "-".to_string(), |o| format!("{o:.3}")),
                if point.recording { "rec" } else { "   " },
                point.message.map(|m| format!("  \"{m}\"")).unwrap_or_default()
            );
            t += step;
        }
    }
    Ok(())
}

fn print_segment(segment: &Segment, start: f64, depth: usize) {
    let indent = "  ".repeat(depth);
    match segment {
        Segment::List(list) => {
            println!("{indent}{start:8.3}s list ({} children, {:.3}s)", list.children().len(), list.duration());
            let mut offset = start;
            for child in list.children() {
                print_segment(child, offset, depth + 1);
                offset += child.duration();
            }
        }
        Segment::Message { text, duration, .. } => {
            println!("{indent}{start:8.3}s message {duration:.3}s \"{text}\"");
        }
        other => println!("{indent}{start:8.3}s {} {:.3}s", other.kind(), other.duration()),
    }
}

fn decode(frame: Option<String>, json: bool) -> Result<()> {
    let encoded = match frame {
        Some(frame) => frame,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };
    let Some(frame) = codec::deserialize(encoded.trim()) else {
        bail!(
            "Not a valid frame string (expected {} base64 characters)",
            codec::ENCODED_LEN
        );
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&frame)?);
        return Ok(());
    }

    println!("Frame {}x{}", frame.width, frame.height);
    if frame.is_degenerate() {
        println!("No face detected");
        return Ok(());
    }
    let (left, right) = (frame.left_pupil(), frame.right_pupil());
    println!("Face ratio:   {:.4}", frame.face_ratio());
    println!("Left pupil:   ({:.4}, {:.4})", left.x, left.y);
    println!("Right pupil:  ({:.4}, {:.4})", right.x, right.y);
    println!("Quality:      {:.4}", frame.quality_metric());
    match frame.is_outside() {
        Some(edge) => println!("Outside:      {edge}"),
        None => println!("Outside:      no"),
    }
    Ok(())
}

fn simulate(config: &Config, fps: u32, head_offset: f64, persist: bool, report: bool) -> Result<()> {
    if fps == 0 {
        bail!("Frame rate must be greater than 0");
    }
    let store: Box<dyn ModelStore> = if persist {
        Box::new(FileModelStore::new(&config.model.store_dir)?)
    } else {
        Box::new(MemoryModelStore::new())
    };
    let mut ctx = CalibrationContext::new(
        config,
        &ModelRegistry::with_builtin(),
        Box::new(SimulatedCamera::new()),
        store,
    )?;
    ctx.subscribe(Box::new(|point| log::debug!("Gaze: {point:?}")));

    let face = SyntheticFace::default().with_center(Point2D::new(0.5 + head_offset, 0.5));
    let framing = face.frame(Point2D::new(0.5, 0.5));
    if let Some(edge) = framing.is_outside() {
        warn!("Synthetic face is near the {edge} edge");
    }
    info!("Synthetic face quality {:.3}", framing.quality_metric());

    let token = CancellationToken::new();
    if !ctx.start_calibration()? {
        bail!("Calibration could not be started");
    }

    let mut frame_no: u32 = 0;
    let outcome = loop {
        let elapsed = Duration::from_secs_f64(f64::from(frame_no) / f64::from(fps));
        match ctx.tick(elapsed, &token) {
            CalibrationTick::Target(target) => {
                let gaze = target.position.unwrap_or(Point2D::new(0.5, 0.5));
                ctx.on_frame(&face.frame(gaze));
            }
            CalibrationTick::Finished(outcome) => break outcome,
            CalibrationTick::Idle => bail!("Calibration stopped unexpectedly"),
        }
        frame_no += 1;
    };

    match outcome {
        CalibrationOutcome::Succeeded { accuracy, report: training } => {
            println!(
                "Calibration succeeded: accuracy {accuracy:.1}, mse {:.6}, {} train / {} validation samples",
                training.validation.mse, training.validation.train_samples, training.validation.validation_samples
            );
            if report {
                println!("{}", serde_json::to_string_pretty(&training)?);
            }
        }
        CalibrationOutcome::Failed => bail!("Calibration failed"),
        CalibrationOutcome::Cancelled => bail!("Calibration cancelled"),
    }

    ctx.set_gaze_enabled(true);
    for target in [
        Point2D::new(0.1, 0.1),
        Point2D::new(0.5, 0.5),
        Point2D::new(0.9, 0.3),
    ] {
        match ctx.on_frame(&face.frame(target)) {
            Some(p) => println!(
                "Looking at ({:.2}, {:.2}) -> predicted ({:.3}, {:.3})",
                target.x, target.y, p.x, p.y
            ),
            None => println!("Looking at ({:.2}, {:.2}) -> no prediction", target.x, target.y),
        }
    }
    ctx.set_gaze_enabled(false);
    Ok(())
}
