use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use bodytrack::recording::{camera_from_number, read_recording, Record};
use bodytrack::{
    BodiesIdentification, BodiesSelection, BodyPosturesDetector, Camera, Config, FusionEvent, FusionPipeline,
    HandsContact, HandsProximityDetector, NearestJoin, Posture, SharedSelection, Skeleton,
};

/// Replays a two-camera recording through the per-camera trackers and the
/// fusion stage, and writes the fused bodies of every tick.
#[derive(Parser)]
#[command(name = "bodytrack", version = env!("BODYTRACK_VERSION"), about)]
struct Args {
    /// Path to the config JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON-lines recording
    #[arg(long)]
    input: PathBuf,
    /// Fused log output path
    #[arg(long, default_value = "fused.json")]
    output: PathBuf,
    /// Run trackers and fusion on worker threads
    #[arg(long)]
    threaded: bool,
}

#[derive(Serialize, Debug, Default)]
struct FrameLog {
    timestamp_ms: u64,
    bodies: Vec<Skeleton>,
    removed: Vec<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    postures: BTreeMap<u32, Vec<Posture>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hands: Vec<HandsContact>,
}

fn millis(timestamp: std::time::Duration) -> u64 {
    timestamp.as_millis() as u64
}

fn replay(config: &Config, records: Vec<Record>) -> anyhow::Result<Vec<FrameLog>> {
    let mut trackers = [
        BodiesIdentification::new(config.identification.clone()),
        BodiesIdentification::new(config.identification.clone()),
    ];
    let selection = SharedSelection::new(BodiesSelection::new(config.selection.clone()));
    let fixed = selection.lock().has_fixed_transform();
    let mut join = NearestJoin::new();
    let mut logs = Vec::new();
    let mut pending_removed = Vec::new();

    for record in records {
        let timestamp = record.timestamp();
        match record {
            Record::Calibration { calibration, .. } => {
                if !fixed {
                    join.push_calibration(timestamp, calibration);
                }
            }
            Record::Frame { camera, bodies, .. } => {
                let camera = camera_from_number(camera)?;
                let tracker = match camera {
                    Camera::First => &mut trackers[0],
                    Camera::Second => &mut trackers[1],
                };
                let output = tracker.process(bodies, timestamp);
                selection.on_learned_bodies(camera, output.learned);
                pending_removed.extend(selection.on_removed_bodies(camera, &output.removed));

                match camera {
                    Camera::Second => join.push_camera2(timestamp, output.identified),
                    Camera::First => {
                        let Some(joined) = join.join(timestamp, output.identified) else {
                            continue;
                        };
                        let out = selection
                            .on_frames(joined.camera1, joined.camera2, joined.transform)
                            .with_context(|| format!("fusion failed at {} ms", millis(timestamp)))?;
                        pending_removed.extend(out.removed);
                        logs.push(FrameLog {
                            timestamp_ms: millis(timestamp),
                            bodies: out.bodies,
                            removed: std::mem::take(&mut pending_removed),
                            ..Default::default()
                        });
                    }
                }
            }
        }
    }
    Ok(logs)
}

fn replay_threaded(config: &Config, records: Vec<Record>) -> anyhow::Result<Vec<FrameLog>> {
    let pipeline = FusionPipeline::new(config);
    for record in records {
        if let Err(err) = pipeline.push_record(record) {
            // a worker error, if any, says why it stopped
            pipeline.finish()?;
            return Err(err).context("replay interrupted");
        }
    }

    let mut logs: Vec<FrameLog> = Vec::new();
    let mut pending_removed = Vec::new();
    for event in pipeline.finish()? {
        match event {
            FusionEvent::Removed { ids, .. } => pending_removed.extend(ids),
            FusionEvent::Bodies { timestamp, bodies } => logs.push(FrameLog {
                timestamp_ms: millis(timestamp),
                bodies,
                removed: std::mem::take(&mut pending_removed),
                ..Default::default()
            }),
        }
    }
    Ok(logs)
}

fn annotate(config: &Config, logs: &mut [FrameLog]) {
    let postures = BodyPosturesDetector::new(config.postures.clone());
    let hands = HandsProximityDetector::new(config.hands_proximity.clone());
    for frame in logs {
        frame.postures = postures.process(&frame.bodies);
        frame.hands = hands.process(&frame.bodies);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    let records = read_recording(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    log::info!("replaying {} records from {}", records.len(), args.input.display());

    let mut logs = if args.threaded {
        replay_threaded(&config, records)?
    } else {
        replay(&config, records)?
    };

    annotate(&config, &mut logs);

    let fused_ids: std::collections::BTreeSet<u32> = logs.iter().flat_map(|l| l.bodies.iter().map(|b| b.id)).collect();
    log::info!("{} fused ticks, {} fused identities", logs.len(), fused_ids.len());

    let writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(writer, &logs)?;
    log::info!("fused log written to {}", args.output.display());
    Ok(())
}
