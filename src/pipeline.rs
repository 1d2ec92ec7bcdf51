//! Threaded streaming front-end.
//!
//! One worker per camera runs its identity tracker, and a fusion worker
//! joins their outputs with the calibration stream and drives the shared
//! selection state. Workers talk over crossbeam channels and stop once
//! their input senders are dropped.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::config::Config;
use crate::correspondence::Camera;
use crate::error::{BodyError, Result};
use crate::identification::{BodiesIdentification, IdentificationOutput};
use crate::recording::{camera_from_number, Record};
use crate::selection::BodiesSelection;
use crate::skeleton::Skeleton;
use crate::sync::{NearestJoin, SharedSelection};
use crate::transform::Transform;

/// Output of the fusion stage.
#[derive(Debug, Clone)]
pub enum FusionEvent {
    /// Fused skeletons of one tick, ids rewritten to fused ids.
    Bodies { timestamp: Duration, bodies: Vec<Skeleton> },
    /// Fused ids that no longer exist.
    Removed { timestamp: Duration, ids: Vec<u32> },
}

struct CameraFrame {
    timestamp: Duration,
    bodies: Vec<Skeleton>,
}

enum FusionInput {
    Tracked {
        camera: Camera,
        timestamp: Duration,
        output: IdentificationOutput,
    },
    Calibration {
        timestamp: Duration,
        transform: Transform,
    },
}

pub struct FusionPipeline {
    camera1_tx: Sender<CameraFrame>,
    camera2_tx: Sender<CameraFrame>,
    fusion_tx: Sender<FusionInput>,
    events_rx: Receiver<FusionEvent>,
    selection: SharedSelection,
    workers: Vec<JoinHandle<Result<()>>>,
}

impl FusionPipeline {
    pub fn new(config: &Config) -> Self {
        let (camera1_tx, camera1_rx) = unbounded::<CameraFrame>();
        let (camera2_tx, camera2_rx) = unbounded::<CameraFrame>();
        let (fusion_tx, fusion_rx) = unbounded::<FusionInput>();
        let (events_tx, events_rx) = unbounded::<FusionEvent>();

        let selection = SharedSelection::new(BodiesSelection::new(config.selection.clone()));

        let mut workers = Vec::with_capacity(3);
        for (camera, frames) in [(Camera::First, camera1_rx), (Camera::Second, camera2_rx)] {
            let identification = BodiesIdentification::new(config.identification.clone());
            workers.push(spawn_tracker(camera, identification, frames, fusion_tx.clone()));
        }
        workers.push(spawn_fusion(selection.clone(), fusion_rx, events_tx));

        Self {
            camera1_tx,
            camera2_tx,
            fusion_tx,
            events_rx,
            selection,
            workers,
        }
    }

    /// Queues a frame for one camera. Frames of a camera must come in
    /// non-decreasing timestamp order. Returns false once the worker is gone.
    pub fn push_frame(&self, camera: Camera, timestamp: Duration, bodies: Vec<Skeleton>) -> bool {
        let frame = CameraFrame { timestamp, bodies };
        let tx = match camera {
            Camera::First => &self.camera1_tx,
            Camera::Second => &self.camera2_tx,
        };
        tx.send(frame).is_ok()
    }

    pub fn push_calibration(&self, timestamp: Duration, transform: Transform) -> bool {
        self.fusion_tx
            .send(FusionInput::Calibration { timestamp, transform })
            .is_ok()
    }

    /// Queues one recorded frame or calibration sample. Fails once the
    /// worker it is meant for has stopped.
    pub fn push_record(&self, record: Record) -> Result<()> {
        let timestamp = record.timestamp();
        let accepted = match record {
            Record::Calibration { calibration, .. } => self.push_calibration(timestamp, calibration),
            Record::Frame { camera, bodies, .. } => self.push_frame(camera_from_number(camera)?, timestamp, bodies),
        };
        if accepted {
            Ok(())
        } else {
            Err(BodyError::Worker(format!(
                "worker stopped before the record at {} ms",
                timestamp.as_millis()
            )))
        }
    }

    pub fn events(&self) -> &Receiver<FusionEvent> {
        &self.events_rx
    }

    pub fn selection(&self) -> &SharedSelection {
        &self.selection
    }

    /// Closes the inputs, drains the remaining events and waits for the
    /// workers.
    pub fn finish(self) -> Result<Vec<FusionEvent>> {
        let Self {
            camera1_tx,
            camera2_tx,
            fusion_tx,
            events_rx,
            workers,
            ..
        } = self;
        drop(camera1_tx);
        drop(camera2_tx);
        drop(fusion_tx);

        let events: Vec<FusionEvent> = events_rx.iter().collect();
        for worker in workers {
            worker
                .join()
                .map_err(|_| BodyError::Worker("worker thread panicked".to_string()))??;
        }
        Ok(events)
    }
}

fn spawn_tracker(
    camera: Camera,
    mut identification: BodiesIdentification,
    frames: Receiver<CameraFrame>,
    fusion_tx: Sender<FusionInput>,
) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        log::debug!("{:?} camera tracker started", camera);
        while let Ok(frame) = frames.recv() {
            let output = identification.process(frame.bodies, frame.timestamp);
            let input = FusionInput::Tracked {
                camera,
                timestamp: frame.timestamp,
                output,
            };
            if fusion_tx.send(input).is_err() {
                break;
            }
        }
        log::debug!("{:?} camera tracker stopped", camera);
        Ok(())
    })
}

fn spawn_fusion(
    selection: SharedSelection,
    inputs: Receiver<FusionInput>,
    events_tx: Sender<FusionEvent>,
) -> JoinHandle<Result<()>> {
    thread::spawn(move || {
        log::debug!("fusion worker started");
        let mut join = NearestJoin::new();
        let fixed = selection.lock().has_fixed_transform();

        while let Ok(input) = inputs.recv() {
            match input {
                FusionInput::Calibration { timestamp, transform } => {
                    if !fixed {
                        join.push_calibration(timestamp, transform);
                    }
                }
                FusionInput::Tracked {
                    camera,
                    timestamp,
                    output,
                } => {
                    let IdentificationOutput {
                        identified,
                        learned,
                        removed,
                    } = output;
                    selection.on_learned_bodies(camera, learned);
                    let removed = selection.on_removed_bodies(camera, &removed);
                    if !removed.is_empty() && events_tx.send(FusionEvent::Removed { timestamp, ids: removed }).is_err() {
                        break;
                    }

                    let joined = match camera {
                        Camera::Second => {
                            join.push_camera2(timestamp, identified);
                            continue;
                        }
                        Camera::First => match join.join(timestamp, identified) {
                            Some(joined) => joined,
                            None => continue,
                        },
                    };

                    let out = selection.on_frames(joined.camera1, joined.camera2, joined.transform)?;
                    if !out.removed.is_empty()
                        && events_tx
                            .send(FusionEvent::Removed {
                                timestamp,
                                ids: out.removed,
                            })
                            .is_err()
                    {
                        break;
                    }
                    if events_tx
                        .send(FusionEvent::Bodies {
                            timestamp,
                            bodies: out.bodies,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
        log::debug!("fusion worker stopped");
        Ok(())
    })
}
