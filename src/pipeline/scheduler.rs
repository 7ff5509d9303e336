//! Hands frames to the face mesh worker, one at a time.
//!
//! A frame is only submitted when the previous submission has been observed
//! back on the event channel. Frames offered in between are skipped, never
//! queued. Every message from the worker carries the session id it was
//! started with; anything not matching the current id is dropped.

use std::{thread, time::Instant};

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};

use super::face_mesh::{FaceMeshBackend, FaceMeshEngine};
use crate::{
    error::{MalformedResult, SessionError},
    types::{FaceMeshOptions, FaceMeshResult, Frame, Landmark},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Engine is still being created on the worker.
    Initializing,
    /// Next offered frame will be submitted.
    Ready,
    InFlight,
    Failed,
}

#[derive(Debug)]
pub enum SchedulerEvent {
    Ready,
    Completed(FaceMeshResult),
    InferenceFailed { sequence: u64, error: anyhow::Error },
    Failed(SessionError),
}

struct Job {
    sequence: u64,
    frame: Frame,
}

enum WorkerMessage {
    Ready {
        session_id: u64,
        landmark_count: usize,
    },
    InitFailed {
        session_id: u64,
        error: anyhow::Error,
    },
    Completed {
        session_id: u64,
        sequence: u64,
        frame_timestamp: Instant,
        outcome: anyhow::Result<Vec<Vec<Landmark>>>,
    },
}

impl WorkerMessage {
    fn session_id(&self) -> u64 {
        match self {
            WorkerMessage::Ready { session_id, .. }
            | WorkerMessage::InitFailed { session_id, .. }
            | WorkerMessage::Completed { session_id, .. } => *session_id,
        }
    }
}

pub struct InferenceScheduler {
    session_id: u64,
    expected_landmarks: usize,
    phase: SchedulerPhase,
    job_tx: Sender<Job>,
    event_rx: Receiver<WorkerMessage>,
    next_sequence: u64,
    skipped: u64,
}

impl InferenceScheduler {
    /// Spawns the worker that owns this session's engine. The engine is built
    /// on the worker, so this returns before the backend is ready.
    pub fn spawn<B: FaceMeshBackend>(
        session_id: u64,
        backend: B,
        options: FaceMeshOptions,
    ) -> Result<Self, SessionError> {
        let (job_tx, job_rx) = bounded(1);
        let (event_tx, event_rx) = unbounded();
        let expected_landmarks = options.expected_landmark_count();

        thread::Builder::new()
            .name(format!("face-mesh-{session_id}"))
            .spawn(move || run_worker(session_id, backend, options, job_rx, event_tx))
            .map_err(|err| {
                SessionError::inference_init(
                    anyhow::Error::new(err).context("failed to spawn face mesh worker"),
                )
            })?;

        Ok(Self {
            session_id,
            expected_landmarks,
            phase: SchedulerPhase::Initializing,
            job_tx,
            event_rx,
            next_sequence: 0,
            skipped: 0,
        })
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn submitted(&self) -> u64 {
        self.next_sequence
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Offers a frame. Returns whether it was submitted.
    pub fn on_frame(&mut self, frame: &Frame) -> bool {
        if self.phase != SchedulerPhase::Ready {
            self.skipped += 1;
            return false;
        }

        let job = Job {
            sequence: self.next_sequence,
            frame: frame.clone(),
        };
        match self.job_tx.try_send(job) {
            Ok(()) => {
                self.next_sequence += 1;
                self.phase = SchedulerPhase::InFlight;
                true
            }
            Err(err) => {
                // The slot is always empty in Ready, so this is a dead worker.
                log::warn!("face mesh worker rejected frame: {err}");
                self.skipped += 1;
                false
            }
        }
    }

    /// Next event from the worker, if one is waiting. Never blocks.
    pub fn poll(&mut self) -> Option<SchedulerEvent> {
        loop {
            let message = match self.event_rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    if self.phase == SchedulerPhase::Failed {
                        return None;
                    }
                    self.phase = SchedulerPhase::Failed;
                    return Some(SchedulerEvent::Failed(SessionError::WorkerExited));
                }
            };

            if let Some(event) = self.handle(message) {
                return Some(event);
            }
        }
    }

    fn handle(&mut self, message: WorkerMessage) -> Option<SchedulerEvent> {
        if message.session_id() != self.session_id {
            log::debug!(
                "dropping message from session {} in session {}",
                message.session_id(),
                self.session_id
            );
            return None;
        }

        match message {
            WorkerMessage::Ready { landmark_count, .. } => {
                if self.phase != SchedulerPhase::Initializing {
                    return None;
                }
                if landmark_count != self.expected_landmarks {
                    self.phase = SchedulerPhase::Failed;
                    return Some(SchedulerEvent::Failed(SessionError::inference_init(anyhow!(
                        "backend produces {landmark_count} landmarks per face, expected {}",
                        self.expected_landmarks
                    ))));
                }
                self.phase = SchedulerPhase::Ready;
                Some(SchedulerEvent::Ready)
            }
            WorkerMessage::InitFailed { error, .. } => {
                self.phase = SchedulerPhase::Failed;
                Some(SchedulerEvent::Failed(SessionError::inference_init(error)))
            }
            WorkerMessage::Completed {
                sequence,
                frame_timestamp,
                outcome,
                ..
            } => {
                if self.phase != SchedulerPhase::InFlight {
                    return None;
                }
                self.phase = SchedulerPhase::Ready;
                match outcome {
                    Ok(faces) => Some(SchedulerEvent::Completed(normalize_faces(
                        faces,
                        self.expected_landmarks,
                        sequence,
                        frame_timestamp,
                    ))),
                    Err(error) => Some(SchedulerEvent::InferenceFailed { sequence, error }),
                }
            }
        }
    }

    /// Detaches from the worker. A request already handed over keeps running,
    /// but its result has nowhere to go.
    pub fn dispose(self) {
        log::info!(
            "session {} scheduler disposed ({} frames submitted, {} skipped)",
            self.session_id,
            self.next_sequence,
            self.skipped
        );
    }
}

fn run_worker<B: FaceMeshBackend>(
    session_id: u64,
    backend: B,
    options: FaceMeshOptions,
    job_rx: Receiver<Job>,
    event_tx: Sender<WorkerMessage>,
) {
    let mut engine = match backend.create(&options) {
        Ok(engine) => engine,
        Err(error) => {
            log::error!(
                "failed to create {} face mesh engine: {error:?}",
                backend.label()
            );
            let _ = event_tx.send(WorkerMessage::InitFailed { session_id, error });
            return;
        }
    };

    let ready = WorkerMessage::Ready {
        session_id,
        landmark_count: engine.landmark_count(),
    };
    if event_tx.send(ready).is_err() {
        return;
    }

    while let Ok(job) = job_rx.recv() {
        let outcome = engine.infer(&job.frame);
        let completed = WorkerMessage::Completed {
            session_id,
            sequence: job.sequence,
            frame_timestamp: job.frame.timestamp,
            outcome,
        };
        if event_tx.send(completed).is_err() {
            break;
        }
    }

    log::debug!("face mesh worker for session {session_id} exiting");
}

/// Keeps the first face and drops it if it does not match the topology.
pub fn normalize_faces(
    faces: Vec<Vec<Landmark>>,
    expected_landmarks: usize,
    sequence: u64,
    frame_timestamp: Instant,
) -> FaceMeshResult {
    let Some(face) = faces.into_iter().next() else {
        return FaceMeshResult::empty(sequence, frame_timestamp);
    };

    match validate_face(&face, expected_landmarks) {
        Ok(()) => FaceMeshResult::with_face(face, sequence, frame_timestamp),
        Err(err) => {
            log::warn!("discarding malformed face mesh result for frame {sequence}: {err}");
            FaceMeshResult::empty(sequence, frame_timestamp)
        }
    }
}

/// Largest accepted distance of a normalized coordinate from the origin.
/// Landmarks may sit a little outside the frame when the face is cut off.
pub const MAX_LANDMARK_OFFSET: f32 = 2.0;

pub fn validate_face(face: &[Landmark], expected_landmarks: usize) -> Result<(), MalformedResult> {
    if face.len() != expected_landmarks {
        return Err(MalformedResult::LandmarkCount {
            expected: expected_landmarks,
            actual: face.len(),
        });
    }
    if let Some(index) = face.iter().position(|landmark| !landmark.is_finite()) {
        return Err(MalformedResult::NonFinite { index });
    }
    if let Some(index) = face.iter().position(|landmark| {
        landmark.x.abs() > MAX_LANDMARK_OFFSET || landmark.y.abs() > MAX_LANDMARK_OFFSET
    }) {
        return Err(MalformedResult::OutOfRange { index });
    }
    Ok(())
}
