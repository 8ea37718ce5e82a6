//! Camera facade: preview, photos and recordings on one open session.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashcam_common::config::AppConfig;
use dashcam_media_store::{MediaKind, MediaReference, MediaStore};
use tokio::sync::broadcast;

use crate::backend::{CameraSession, CaptureRequest, OrientationSource};
use crate::error::{CaptureError, RecordingError, SessionError};
use crate::pipeline::PipelineFactory;
use crate::recording::{RecordingController, RecordingEvent, RecordingSettings};
use crate::still::{CaptureSettings, CombinedCaptureResult, StillCaptureCoordinator};

/// Settings for both capture paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSettings {
    pub capture: CaptureSettings,
    pub recording: RecordingSettings,
}

impl From<&AppConfig> for CameraSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            capture: CaptureSettings::from(&config.capture),
            recording: RecordingSettings::from(&config.recording),
        }
    }
}

/// An open camera with still capture and recording.
pub struct Camera {
    session: Arc<dyn CameraSession>,
    store: Arc<dyn MediaStore>,
    still: StillCaptureCoordinator,
    recorder: RecordingController,
}

impl Camera {
    pub fn new(
        session: Arc<dyn CameraSession>,
        orientation: Arc<dyn OrientationSource>,
        store: Arc<dyn MediaStore>,
        pipelines: Arc<dyn PipelineFactory>,
        settings: CameraSettings,
    ) -> Self {
        let still =
            StillCaptureCoordinator::new(session.clone(), orientation.clone(), settings.capture);
        let recorder = RecordingController::new(
            session.clone(),
            store.clone(),
            orientation,
            pipelines,
            settings.recording,
        );
        Self {
            session,
            store,
            still,
            recorder,
        }
    }

    /// Install the preview repeating request.
    pub async fn start_preview(&self) -> Result<(), SessionError> {
        self.session.repeat_preview(CaptureRequest::preview()).await
    }

    /// Capture a still image and save it to the media store.
    pub async fn take_photo(&self) -> Result<MediaReference, CaptureError> {
        let result = self.still.capture().await?;
        self.persist(result)
    }

    fn persist(&self, result: CombinedCaptureResult) -> Result<MediaReference, CaptureError> {
        let format = result.format();
        let mime_type = match format.mime_type() {
            Some(mime) if format.is_jpeg() => mime,
            _ => {
                tracing::warn!(%format, "Captured format cannot be saved as a photo");
                result.release();
                return Err(CaptureError::UnsupportedFormat(format));
            }
        };

        let handle = self
            .store
            .create_destination(MediaKind::Photo, mime_type)
            .ok_or_else(|| CaptureError::DestinationUnavailable(mime_type.to_string()))?;

        let attributes = BTreeMap::from([
            (
                "Orientation".to_string(),
                result.orientation().code().to_string(),
            ),
            (
                "rotation_degrees".to_string(),
                result.raw_orientation().to_string(),
            ),
            (
                "sensor_timestamp_ns".to_string(),
                result.metadata().sensor_timestamp_ns.to_string(),
            ),
        ]);

        let written = self
            .store
            .write_bytes(&handle, result.buffer().data())
            .and_then(|_| self.store.write_metadata(&handle, &attributes))
            .and_then(|_| self.store.finalize(&handle));
        result.release();

        match written {
            Ok(()) => {
                let reference = handle.reference();
                tracing::info!(path = %reference, "Photo saved");
                Ok(reference)
            }
            Err(e) => {
                if let Err(discard_err) = self.store.discard(&handle) {
                    tracing::warn!(error = %discard_err, "Failed to discard photo destination");
                }
                Err(e.into())
            }
        }
    }

    pub async fn start_recording(&self) -> Result<(), RecordingError> {
        self.recorder.start().await
    }

    pub async fn pause_recording(&self) -> Result<(), RecordingError> {
        self.recorder.pause().await
    }

    pub async fn resume_recording(&self) -> Result<(), RecordingError> {
        self.recorder.resume().await
    }

    pub async fn stop_recording(&self) -> Result<Option<MediaReference>, RecordingError> {
        self.recorder.stop().await
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.recorder.is_paused()
    }

    pub fn subscribe_recording_events(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recorder.subscribe()
    }

    pub fn still(&self) -> &StillCaptureCoordinator {
        &self.still
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }

    /// Finish any active recording and close the session.
    pub async fn shutdown(&self) {
        if let Err(e) = self.recorder.stop().await {
            tracing::warn!(error = %e, "Recording did not finalize during shutdown");
        }
        if let Err(e) = self.session.stop_repeating().await {
            tracing::debug!(error = %e, "Could not stop repeating request");
        }
        self.session.close().await;
    }
}
