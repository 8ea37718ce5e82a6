//! Recording session lifecycle.
//!
//! ```text
//!            start                 pause
//!   Idle ─────────────▶ Recording ─────▶ Paused
//!    ▲                   │   ▲   resume    │
//!    │                   │   └─────────────┘
//!    │        stop       ▼                 │ stop
//!    └────────────── Stopping ◀────────────┘
//! ```
//!
//! Every transition runs under one FIFO mutex. While a stop waits out the
//! minimum duration, pause and resume queue behind it; a start sees the
//! `Stopping` snapshot and returns without waiting. Readers of the current
//! state use a `watch` snapshot and never wait. Requests that do not apply
//! to the current state are no-ops.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashcam_common::config::RecordingDefaults;
use dashcam_common::RecordingClock;
use dashcam_media_store::{DestinationHandle, MediaKind, MediaReference, MediaStore};
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};

use crate::backend::{CameraSession, CaptureRequest, OrientationSource};
use crate::error::RecordingError;
use crate::pipeline::{PipelineFactory, PipelineStats, RecorderSpec, RecordingPipeline};

/// Recording lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
    /// Finalizing; possibly waiting out the minimum duration.
    Stopping,
}

/// Notifications published as a recording moves through its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    Started {
        name: String,
    },
    Paused {
        /// Active recording time so far.
        active: Duration,
    },
    Resumed,
    Finalized {
        reference: Option<MediaReference>,
        error: Option<String>,
        /// Wall time from start to finalization.
        duration: Duration,
    },
}

/// Recorder parameters and lifecycle limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSettings {
    /// Recordings are never finalized before this much wall time has passed.
    pub min_duration: Duration,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u32,
    pub audio: bool,
    pub mime_type: String,
}

impl From<&RecordingDefaults> for RecordingSettings {
    fn from(defaults: &RecordingDefaults) -> Self {
        Self {
            min_duration: Duration::from_millis(defaults.min_duration_ms),
            fps: defaults.fps,
            width: defaults.width,
            height: defaults.height,
            video_bitrate: defaults.video_bitrate,
            audio: defaults.audio,
            mime_type: defaults.mime_type.clone(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self::from(&RecordingDefaults::default())
    }
}

/// Resources owned by an active recording.
struct RecordingSession {
    destination: DestinationHandle,
    clock: RecordingClock,
    pipeline: Box<dyn RecordingPipeline>,
    orientation_hint: i32,
}

#[derive(Default)]
struct StateCell {
    state: RecordingState,
    session: Option<RecordingSession>,
}

/// Drives start, pause, resume and stop of video recordings.
pub struct RecordingController {
    session: Arc<dyn CameraSession>,
    store: Arc<dyn MediaStore>,
    orientation: Arc<dyn OrientationSource>,
    pipelines: Arc<dyn PipelineFactory>,
    settings: RecordingSettings,
    cell: Mutex<StateCell>,
    state_tx: watch::Sender<RecordingState>,
    events: broadcast::Sender<RecordingEvent>,
}

impl RecordingController {
    pub fn new(
        session: Arc<dyn CameraSession>,
        store: Arc<dyn MediaStore>,
        orientation: Arc<dyn OrientationSource>,
        pipelines: Arc<dyn PipelineFactory>,
        settings: RecordingSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        let (events, _) = broadcast::channel(16);
        Self {
            session,
            store,
            orientation,
            pipelines,
            settings,
            cell: Mutex::new(StateCell::default()),
            state_tx,
            events,
        }
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    /// Current state snapshot.
    pub fn state(&self) -> RecordingState {
        *self.state_tx.borrow()
    }

    /// True from start until a stop has fully finished.
    pub fn is_recording(&self) -> bool {
        self.state() != RecordingState::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.state() == RecordingState::Paused
    }

    /// Watch state changes.
    pub fn watch_state(&self) -> watch::Receiver<RecordingState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events.subscribe()
    }

    /// Statistics of the active recorder, if any.
    pub async fn stats(&self) -> Option<PipelineStats> {
        let cell = self.cell.lock().await;
        cell.session.as_ref().map(|s| s.pipeline.stats())
    }

    /// Start a recording. A no-op unless idle.
    pub async fn start(&self) -> Result<(), RecordingError> {
        if self.state() != RecordingState::Idle {
            tracing::debug!(state = ?self.state(), "Start ignored; recording already active");
            return Ok(());
        }
        let mut cell = self.cell.lock().await;
        if cell.state != RecordingState::Idle {
            tracing::debug!(state = ?cell.state, "Start ignored; recording already active");
            return Ok(());
        }

        let mime_type = self.settings.mime_type.as_str();
        let destination = self
            .store
            .create_destination(MediaKind::Video, mime_type)
            .ok_or_else(|| RecordingError::DestinationUnavailable(mime_type.to_string()))?;

        let orientation_hint = self.orientation.rotation_degrees().unwrap_or(0);
        let pipeline = match self.begin(&destination, orientation_hint).await {
            Ok(pipeline) => pipeline,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    name = destination.display_name(),
                    "Failed to start recording"
                );
                if let Err(discard_err) = self.store.discard(&destination) {
                    tracing::warn!(error = %discard_err, "Failed to discard recording destination");
                }
                self.restore_preview().await;
                return Err(e);
            }
        };

        tracing::info!(
            name = destination.display_name(),
            fps = self.settings.fps,
            orientation_hint,
            "Recording started"
        );
        let name = destination.display_name().to_string();
        cell.session = Some(RecordingSession {
            destination,
            clock: RecordingClock::start(),
            pipeline,
            orientation_hint,
        });
        self.set_state(&mut cell, RecordingState::Recording);
        let _ = self.events.send(RecordingEvent::Started { name });
        Ok(())
    }

    /// Pause the active recording. A no-op unless recording, or if the
    /// recorder cannot pause.
    pub async fn pause(&self) -> Result<(), RecordingError> {
        let mut cell = self.cell.lock().await;
        if cell.state != RecordingState::Recording {
            tracing::debug!(state = ?cell.state, "Pause ignored");
            return Ok(());
        }
        let Some(session) = cell.session.as_mut() else {
            return Ok(());
        };
        if !session.pipeline.supports_pause() {
            tracing::debug!("Recorder does not support pause");
            return Ok(());
        }

        session.pipeline.pause()?;
        session.clock.pause();
        let active = session.clock.active_elapsed();
        tracing::info!(active_ms = active.as_millis() as u64, "Recording paused");
        self.set_state(&mut cell, RecordingState::Paused);
        let _ = self.events.send(RecordingEvent::Paused { active });
        Ok(())
    }

    /// Resume a paused recording. A no-op unless paused.
    pub async fn resume(&self) -> Result<(), RecordingError> {
        let mut cell = self.cell.lock().await;
        if cell.state != RecordingState::Paused {
            tracing::debug!(state = ?cell.state, "Resume ignored");
            return Ok(());
        }
        let Some(session) = cell.session.as_mut() else {
            return Ok(());
        };

        session.pipeline.resume()?;
        session.clock.resume();
        tracing::info!("Recording resumed");
        self.set_state(&mut cell, RecordingState::Recording);
        let _ = self.events.send(RecordingEvent::Resumed);
        Ok(())
    }

    /// Stop and finalize the active recording.
    ///
    /// Waits until the minimum duration has passed since start. Returns
    /// `Ok(None)` when nothing was recording. The state is `Idle` once this
    /// returns, whether or not finalization succeeded, and also if the
    /// returned future is dropped early.
    pub async fn stop(&self) -> Result<Option<MediaReference>, RecordingError> {
        let mut cell = self.cell.lock().await;
        if !matches!(cell.state, RecordingState::Recording | RecordingState::Paused) {
            tracing::debug!(state = ?cell.state, "Stop ignored; not recording");
            return Ok(None);
        }
        let Some(session) = cell.session.take() else {
            self.set_state(&mut cell, RecordingState::Idle);
            return Ok(None);
        };
        self.set_state(&mut cell, RecordingState::Stopping);
        let guard = StoppingGuard {
            cell,
            state_tx: &self.state_tx,
        };

        let remaining = session.clock.remaining_until(self.settings.min_duration);
        if !remaining.is_zero() {
            tracing::debug!(
                remaining_ms = remaining.as_millis() as u64,
                "Extending recording to minimum duration"
            );
            tokio::time::sleep(remaining).await;
        }

        let duration = session.clock.wall_elapsed();
        let result = self.finish(session, duration).await;
        drop(guard);

        let event = match &result {
            Ok(reference) => {
                tracing::info!(
                    path = %reference,
                    duration_ms = duration.as_millis() as u64,
                    "Recording finalized"
                );
                RecordingEvent::Finalized {
                    reference: Some(reference.clone()),
                    error: None,
                    duration,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Recording failed to finalize");
                RecordingEvent::Finalized {
                    reference: None,
                    error: Some(e.to_string()),
                    duration,
                }
            }
        };
        let _ = self.events.send(event);
        result.map(Some)
    }

    async fn begin(
        &self,
        destination: &DestinationHandle,
        orientation_hint: i32,
    ) -> Result<Box<dyn RecordingPipeline>, RecordingError> {
        let spec = RecorderSpec {
            fps: self.settings.fps,
            width: self.settings.width,
            height: self.settings.height,
            video_bitrate: self.settings.video_bitrate,
            audio: self.settings.audio,
            mime_type: self.settings.mime_type.clone(),
            orientation_hint,
        };
        let mut pipeline = self.pipelines.build(destination, &spec)?;
        self.session
            .repeat_preview(CaptureRequest::record(self.settings.fps))
            .await?;
        pipeline.start()?;
        Ok(pipeline)
    }

    /// Stop the recorder and hand the destination to the store.
    async fn finish(
        &self,
        session: RecordingSession,
        duration: Duration,
    ) -> Result<MediaReference, RecordingError> {
        let RecordingSession {
            destination,
            clock,
            mut pipeline,
            orientation_hint,
        } = session;

        let stopped = pipeline.stop();
        drop(pipeline);
        self.restore_preview().await;

        if let Err(e) = stopped {
            if let Err(discard_err) = self.store.discard(&destination) {
                tracing::warn!(error = %discard_err, "Failed to discard recording destination");
            }
            return Err(e);
        }

        let attributes = BTreeMap::from([
            ("duration_ms".to_string(), duration.as_millis().to_string()),
            ("rotation_degrees".to_string(), orientation_hint.to_string()),
            ("started_at".to_string(), clock.epoch_wall().to_string()),
        ]);
        let stored = self
            .store
            .write_metadata(&destination, &attributes)
            .and_then(|()| self.store.finalize(&destination));
        if let Err(e) = stored {
            if let Err(discard_err) = self.store.discard(&destination) {
                tracing::warn!(error = %discard_err, "Failed to discard recording destination");
            }
            return Err(e.into());
        }
        Ok(destination.reference())
    }

    async fn restore_preview(&self) {
        if let Err(e) = self.session.repeat_preview(CaptureRequest::preview()).await {
            tracing::warn!(error = %e, "Failed to restore preview request");
        }
    }

    fn set_state(&self, cell: &mut StateCell, state: RecordingState) {
        cell.state = state;
        self.state_tx.send_replace(state);
    }
}

/// Returns the controller to `Idle` when a stop ends, however it ends.
struct StoppingGuard<'a> {
    cell: MutexGuard<'a, StateCell>,
    state_tx: &'a watch::Sender<RecordingState>,
}

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        self.cell.state = RecordingState::Idle;
        self.cell.session = None;
        self.state_tx.send_replace(RecordingState::Idle);
    }
}
