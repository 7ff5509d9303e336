use super::{
    face_mesh::FaceMeshBackend,
    frame_source::FrameSource,
    scheduler::{InferenceScheduler, SchedulerEvent, SchedulerPhase},
    topology::ConnectorTables,
};
use crate::{
    error::SessionError,
    types::{FaceMeshOptions, FaceMeshResult, Frame, SessionState},
};

/// Receives every completed result of a running session, in submission order.
pub trait ResultConsumer {
    fn receive(&mut self, result: &FaceMeshResult);

    /// Called on teardown so nothing from the old session stays visible.
    fn clear(&mut self) {}
}

pub struct SessionController<S: FrameSource, B: FaceMeshBackend> {
    source: S,
    backend: B,
    options: FaceMeshOptions,
    state: SessionState,
    scheduler: Option<InferenceScheduler>,
    consumers: Vec<Box<dyn ResultConsumer>>,
    latest: Option<FaceMeshResult>,
    last_error: Option<SessionError>,
    sessions_started: u64,
}

impl<S: FrameSource, B: FaceMeshBackend> SessionController<S, B> {
    pub fn new(source: S, backend: B, options: FaceMeshOptions) -> Self {
        Self {
            source,
            backend,
            options,
            state: SessionState::Idle,
            scheduler: None,
            consumers: Vec::new(),
            latest: None,
            last_error: None,
            sessions_started: 0,
        }
    }

    /// Consumers are invoked in the order they were added.
    pub fn add_consumer(&mut self, consumer: impl ResultConsumer + 'static) {
        self.consumers.push(Box::new(consumer));
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn latest_result(&self) -> Option<&FaceMeshResult> {
        self.latest.as_ref()
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    /// Identity of the running session, if any.
    pub fn session_id(&self) -> Option<u64> {
        self.scheduler.as_ref().map(InferenceScheduler::session_id)
    }

    pub fn scheduler_phase(&self) -> Option<SchedulerPhase> {
        self.scheduler.as_ref().map(InferenceScheduler::phase)
    }

    /// Frames handed to the worker in the running session.
    pub fn frames_submitted(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, InferenceScheduler::submitted)
    }

    /// Frames dropped in the running session because the worker was not
    /// ready or was busy.
    pub fn frames_skipped(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, InferenceScheduler::skipped)
    }

    pub fn connectors(&self) -> ConnectorTables {
        self.backend.connectors()
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            return Ok(());
        }

        if let Err(err) = self.source.ensure_ready() {
            log::error!("cannot start session: {err}");
            self.last_error = Some(err.clone());
            return Err(err);
        }

        let session_id = self.sessions_started + 1;
        let scheduler =
            match InferenceScheduler::spawn(session_id, self.backend.clone(), self.options.clone())
            {
                Ok(scheduler) => scheduler,
                Err(err) => {
                    log::error!("cannot start session: {err}");
                    self.last_error = Some(err.clone());
                    return Err(err);
                }
            };

        self.sessions_started = session_id;
        self.scheduler = Some(scheduler);
        self.last_error = None;
        self.state = SessionState::Running;
        log::info!(
            "session {session_id} started with {} backend",
            self.backend.label()
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.dispose();
        }
        if self.state == SessionState::Running {
            log::info!("session {} stopped", self.sessions_started);
        }
        self.state = SessionState::Idle;
        self.latest = None;
        for consumer in &mut self.consumers {
            consumer.clear();
        }
    }

    /// One cooperative tick: handles pending worker events, then takes the
    /// newest frame from the source and offers it for inference. The frame is
    /// returned for display whether or not it was submitted.
    pub fn pump(&mut self) -> Option<Frame> {
        self.drain_events();

        let frame = self.source.next_frame()?;
        if let Some(scheduler) = self.scheduler.as_mut() {
            if !scheduler.on_frame(&frame) {
                log::debug!(
                    "frame skipped in phase {:?} ({} skipped so far)",
                    scheduler.phase(),
                    scheduler.skipped()
                );
            }
        }
        Some(frame)
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.scheduler.as_mut().and_then(InferenceScheduler::poll) {
            match event {
                SchedulerEvent::Ready => {
                    log::info!("session {} face mesh backend ready", self.sessions_started);
                }
                SchedulerEvent::Completed(result) => self.on_result(result),
                SchedulerEvent::InferenceFailed { sequence, error } => {
                    log::warn!("inference failed for frame {sequence}: {error:#}");
                    // The last drawing no longer matches the video.
                    self.latest = None;
                    for consumer in &mut self.consumers {
                        consumer.clear();
                    }
                }
                SchedulerEvent::Failed(err) => {
                    log::error!("session {} failed: {err}", self.sessions_started);
                    self.stop();
                    self.last_error = Some(err);
                    return;
                }
            }
        }
    }

    fn on_result(&mut self, result: FaceMeshResult) {
        if !self.is_running() {
            log::debug!("dropping result for frame {} while idle", result.sequence);
            return;
        }
        let result = self.latest.insert(result);
        for consumer in &mut self.consumers {
            consumer.receive(result);
        }
    }
}

impl<S: FrameSource, B: FaceMeshBackend> Drop for SessionController<S, B> {
    fn drop(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.dispose();
        }
    }
}
