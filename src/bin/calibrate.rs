use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use bodytrack::recording::{camera_from_number, read_recording, Record};
use bodytrack::{CalibrationByBodies, Camera, Config, Skeleton};

/// Estimates the camera-2 to camera-1 transform from a recording of a
/// single person walking in front of both cameras.
#[derive(Parser)]
#[command(name = "calibrate", version = env!("BODYTRACK_VERSION"), about)]
struct Args {
    /// Path to the config JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON-lines recording
    #[arg(long)]
    input: PathBuf,
    /// Where to store the matrix, overriding the configured path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(output) = &args.output {
        config.calibration.storing_path = Some(output.to_string_lossy().into_owned());
    }
    if config.calibration.storing_path.is_none() {
        log::warn!("no storing path configured, the matrix is only printed");
    }

    let records = read_recording(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let mut calibration = CalibrationByBodies::new(config.calibration.clone());
    let mut latest_camera2: Vec<Skeleton> = Vec::new();

    for record in records {
        let timestamp = record.timestamp();
        let Record::Frame { camera, bodies, .. } = record else {
            continue;
        };
        match camera_from_number(camera)? {
            Camera::Second => latest_camera2 = bodies,
            Camera::First => {
                if let Some(transform) = calibration.process(&bodies, &latest_camera2, timestamp)? {
                    for row in transform.rows() {
                        println!("{:>10.5} {:>10.5} {:>10.5} {:>10.5}", row[0], row[1], row[2], row[3]);
                    }
                    return Ok(());
                }
            }
        }
    }

    let (collected, needed) = calibration.progress();
    bail!(
        "recording ended before calibration finished ({:?}, {}/{} joints)",
        calibration.state(),
        collected,
        needed
    )
}
