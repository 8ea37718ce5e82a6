//! In-process camera session driven by scripts.
//!
//! Each submitted still capture plays one [`CaptureScript`]: the metadata
//! callback and any number of buffers, each at a delay from submission. The
//! default script behaves like healthy hardware. Scripts can also drop the
//! buffer, deliver stray frames, deliver late, or fail the session, which is
//! how the CLI's scenarios and the engine tests exercise the coordinator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashcam_camera_core::{CameraCharacteristics, LensFacing, PixelFormat};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{CameraSession, CaptureMetadata, CaptureRequest, MetadataReceiver};
use crate::buffer::{BufferListener, BufferPool, QueuedBuffer};
use crate::error::SessionError;

/// How a scripted buffer is timestamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStamp {
    /// Same timestamp as the capture metadata.
    Matching,
    /// Metadata timestamp plus an offset (a neighbouring frame).
    Offset(i64),
    /// A fixed timestamp.
    Absolute(i64),
}

impl BufferStamp {
    fn resolve(self, sensor_timestamp_ns: i64) -> i64 {
        match self {
            Self::Matching => sensor_timestamp_ns,
            Self::Offset(offset) => sensor_timestamp_ns + offset,
            Self::Absolute(ts) => ts,
        }
    }
}

/// One buffer produced by a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedBuffer {
    /// Delay from submission.
    pub delay: Duration,
    pub stamp: BufferStamp,
}

/// How the metadata callback behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Complete,
    Fail(SessionError),
    /// Never fires while the session is open.
    Silent,
}

/// Script for one still capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureScript {
    /// Delay from submission until the metadata callback.
    pub metadata_delay: Duration,
    /// Sensor timestamp to report. Derived from the session clock if unset.
    pub sensor_timestamp_ns: Option<i64>,
    pub outcome: MetadataOutcome,
    pub buffers: Vec<ScriptedBuffer>,
}

impl Default for CaptureScript {
    fn default() -> Self {
        Self::matching()
    }
}

impl CaptureScript {
    /// Metadata after 30ms, the matching buffer after 40ms.
    pub fn matching() -> Self {
        Self {
            metadata_delay: Duration::from_millis(30),
            sensor_timestamp_ns: None,
            outcome: MetadataOutcome::Complete,
            buffers: vec![ScriptedBuffer {
                delay: Duration::from_millis(40),
                stamp: BufferStamp::Matching,
            }],
        }
    }

    /// Metadata arrives but the buffer is lost in the pipeline.
    pub fn dropped_buffer() -> Self {
        Self {
            buffers: vec![],
            ..Self::matching()
        }
    }

    /// The matching buffer arrives `delay` after submission.
    pub fn late_buffer(delay: Duration) -> Self {
        Self {
            buffers: vec![ScriptedBuffer {
                delay,
                stamp: BufferStamp::Matching,
            }],
            ..Self::matching()
        }
    }

    /// The session reports `error` instead of metadata.
    pub fn session_failure(error: SessionError) -> Self {
        Self {
            outcome: MetadataOutcome::Fail(error),
            buffers: vec![],
            ..Self::matching()
        }
    }

    /// Neither metadata nor buffers ever arrive.
    pub fn silent() -> Self {
        Self {
            outcome: MetadataOutcome::Silent,
            buffers: vec![],
            ..Self::matching()
        }
    }

    /// Report a fixed sensor timestamp.
    pub fn with_sensor_timestamp(mut self, timestamp_ns: i64) -> Self {
        self.sensor_timestamp_ns = Some(timestamp_ns);
        self
    }

    /// Deliver `count` neighbouring frames just before the scripted buffers.
    pub fn with_stray_buffers(mut self, count: usize) -> Self {
        let first_delay = self
            .buffers
            .iter()
            .map(|b| b.delay)
            .min()
            .unwrap_or(self.metadata_delay);
        for i in 0..count {
            self.buffers.push(ScriptedBuffer {
                delay: first_delay.saturating_sub(Duration::from_millis((count - i) as u64)),
                stamp: BufferStamp::Offset(-33_333_333 * (count - i) as i64),
            });
        }
        self
    }

    /// Add a buffer.
    pub fn with_buffer(mut self, delay: Duration, stamp: BufferStamp) -> Self {
        self.buffers.push(ScriptedBuffer { delay, stamp });
        self
    }
}

/// A scripted [`CameraSession`].
pub struct SyntheticCamera {
    characteristics: CameraCharacteristics,
    shared: Arc<Shared>,
}

struct Shared {
    pool: BufferPool,
    format: PixelFormat,
    origin: Instant,
    state: Mutex<SyntheticState>,
}

#[derive(Default)]
struct SyntheticState {
    listener: Option<BufferListener>,
    reader: VecDeque<QueuedBuffer>,
    scripts: VecDeque<CaptureScript>,
    repeating: Option<CaptureRequest>,
    frame_number: u64,
    closed: bool,
    silent: Vec<oneshot::Sender<Result<CaptureMetadata, SessionError>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn new(characteristics: CameraCharacteristics) -> Self {
        let shared = Shared {
            pool: BufferPool::new(characteristics.max_in_flight_buffers),
            format: characteristics.still_format,
            origin: Instant::now(),
            state: Mutex::new(SyntheticState::default()),
        };
        Self {
            characteristics,
            shared: Arc::new(shared),
        }
    }

    /// A back-facing JPEG camera holding three buffers in flight.
    pub fn with_defaults() -> Self {
        Self::new(default_characteristics(LensFacing::Back, PixelFormat::Jpeg))
    }

    /// Queue a script for the next submitted capture.
    pub fn push_script(&self, script: CaptureScript) {
        self.shared.state().scripts.push_back(script);
    }

    /// Produce a buffer right now, outside any script.
    pub fn inject_buffer(&self, timestamp_ns: i64) {
        self.shared.emit(timestamp_ns);
    }

    /// Simulate the device going away: pending callbacks never fire and the
    /// buffer stream ends.
    pub fn disconnect(&self) {
        tracing::warn!(camera = %self.characteristics.camera_id, "Synthetic camera disconnected");
        self.shared.shut_down();
    }

    /// Hardware buffer accounting.
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.shared.pool
    }

    /// Buffers waiting in the session because no listener was registered.
    pub fn held_buffers(&self) -> usize {
        self.shared.state().reader.len()
    }

    /// The installed repeating request, if any.
    pub fn repeating_request(&self) -> Option<CaptureRequest> {
        self.shared.state().repeating
    }

    pub fn has_listener(&self) -> bool {
        self.shared.state().listener.is_some()
    }
}

/// Characteristics used by [`SyntheticCamera::with_defaults`].
pub fn default_characteristics(
    lens_facing: LensFacing,
    still_format: PixelFormat,
) -> CameraCharacteristics {
    CameraCharacteristics {
        camera_id: "synthetic-0".to_string(),
        lens_facing,
        still_format,
        still_width: 4032,
        still_height: 3024,
        max_in_flight_buffers: 3,
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SyntheticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_ns(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
    }

    fn emit(&self, timestamp_ns: i64) {
        let Some(lease) = self.pool.try_lease() else {
            tracing::warn!(timestamp_ns, "Buffer pool exhausted; frame dropped");
            return;
        };
        let buffer = QueuedBuffer::new(
            timestamp_ns,
            self.format,
            synthetic_frame(timestamp_ns),
            Some(lease),
        );

        let mut state = self.state();
        if state.closed {
            return;
        }
        let buffer = match &state.listener {
            Some(listener) => match listener.deliver(buffer) {
                Ok(()) => return,
                Err(mpsc::error::TrySendError::Full(buffer)) => {
                    tracing::warn!(timestamp_ns, "Buffer queue full; frame dropped");
                    buffer.release();
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(buffer)) => buffer,
            },
            None => buffer,
        };
        tracing::trace!(timestamp_ns, "No buffer listener; holding frame");
        state.reader.push_back(buffer);
    }

    async fn play(
        self: Arc<Self>,
        script: CaptureScript,
        frame_number: u64,
        sensor_timestamp_ns: i64,
        tx: oneshot::Sender<Result<CaptureMetadata, SessionError>>,
    ) {
        enum Step {
            Metadata,
            Buffer(i64),
        }

        let start = Instant::now();
        // Metadata goes first so it wins ties against buffers at the same delay.
        let mut steps = vec![(script.metadata_delay, Step::Metadata)];
        steps.extend(
            script
                .buffers
                .iter()
                .map(|b| (b.delay, Step::Buffer(b.stamp.resolve(sensor_timestamp_ns)))),
        );
        steps.sort_by_key(|(delay, _)| *delay);

        let mut tx = Some(tx);
        for (delay, step) in steps {
            tokio::time::sleep_until(start + delay).await;
            match step {
                Step::Metadata => {
                    let Some(tx) = tx.take() else { continue };
                    match &script.outcome {
                        MetadataOutcome::Complete => {
                            let _ = tx.send(Ok(CaptureMetadata {
                                frame_number,
                                sensor_timestamp_ns,
                            }));
                        }
                        MetadataOutcome::Fail(error) => {
                            let _ = tx.send(Err(error.clone()));
                        }
                        MetadataOutcome::Silent => {
                            self.state().silent.push(tx);
                        }
                    }
                }
                Step::Buffer(timestamp_ns) => self.emit(timestamp_ns),
            }
        }
    }

    fn shut_down(&self) {
        let mut state = self.state();
        state.closed = true;
        state.listener = None;
        state.repeating = None;
        state.silent.clear();
        state.reader.clear();
        for task in state.tasks.drain(..) {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl CameraSession for SyntheticCamera {
    fn characteristics(&self) -> &CameraCharacteristics {
        &self.characteristics
    }

    async fn submit_capture(
        &self,
        request: CaptureRequest,
    ) -> Result<MetadataReceiver, SessionError> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.shared.state();
        if state.closed {
            return Err(SessionError::Closed);
        }
        state.frame_number += 1;
        let frame_number = state.frame_number;
        let script = state.scripts.pop_front().unwrap_or_default();
        let sensor_timestamp_ns = script
            .sensor_timestamp_ns
            .unwrap_or_else(|| self.shared.now_ns() + script.metadata_delay.as_nanos() as i64);

        tracing::debug!(
            frame_number,
            sensor_timestamp_ns,
            template = ?request.template,
            "Synthetic capture submitted"
        );

        let shared = self.shared.clone();
        state.tasks.retain(|task| !task.is_finished());
        state.tasks.push(tokio::spawn(shared.play(
            script,
            frame_number,
            sensor_timestamp_ns,
            tx,
        )));
        Ok(rx)
    }

    fn register_buffer_listener(&self, listener: BufferListener) {
        self.shared.state().listener = Some(listener);
    }

    fn unregister_buffer_listener(&self) {
        self.shared.state().listener = None;
    }

    fn acquire_next_buffer(&self) -> Option<QueuedBuffer> {
        self.shared.state().reader.pop_front()
    }

    async fn repeat_preview(&self, request: CaptureRequest) -> Result<(), SessionError> {
        let mut state = self.shared.state();
        if state.closed {
            return Err(SessionError::Closed);
        }
        tracing::debug!(template = ?request.template, fps = ?request.target_fps, "Repeating request installed");
        state.repeating = Some(request);
        Ok(())
    }

    async fn stop_repeating(&self) -> Result<(), SessionError> {
        let mut state = self.shared.state();
        if state.closed {
            return Err(SessionError::Closed);
        }
        state.repeating = None;
        Ok(())
    }

    async fn close(&self) {
        tracing::info!(camera = %self.characteristics.camera_id, "Closing synthetic camera");
        self.shared.shut_down();
    }
}

/// JPEG-framed placeholder bytes carrying the frame timestamp.
fn synthetic_frame(timestamp_ns: i64) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(b"DASHCAM");
    data.extend_from_slice(&timestamp_ns.to_le_bytes());
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_buffers_without_listener_are_held() {
        let camera = SyntheticCamera::with_defaults();
        camera.push_script(CaptureScript::matching().with_sensor_timestamp(500));

        let rx = camera
            .submit_capture(CaptureRequest::still_capture())
            .await
            .unwrap();
        let metadata = rx.await.unwrap().unwrap();
        assert_eq!(metadata.sensor_timestamp_ns, 500);
        assert_eq!(metadata.frame_number, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(camera.held_buffers(), 1);
        assert_eq!(camera.buffer_pool().outstanding(), 1);

        let buffer = camera.acquire_next_buffer().unwrap();
        assert_eq!(buffer.timestamp_ns(), 500);
        buffer.release();
        assert_eq!(camera.buffer_pool().outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_releases_held_buffers_and_rejects_requests() {
        let camera = SyntheticCamera::with_defaults();
        camera.inject_buffer(1);
        camera.inject_buffer(2);
        assert_eq!(camera.buffer_pool().outstanding(), 2);

        camera.close().await;
        assert_eq!(camera.buffer_pool().outstanding(), 0);
        assert!(matches!(
            camera.submit_capture(CaptureRequest::still_capture()).await,
            Err(SessionError::Closed)
        ));
        assert!(camera
            .repeat_preview(CaptureRequest::preview())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_exhaustion_drops_frames() {
        let camera = SyntheticCamera::with_defaults();
        for ts in 0..5 {
            camera.inject_buffer(ts);
        }
        assert_eq!(camera.held_buffers(), 3);
    }

    #[test]
    fn test_stray_buffers_precede_scripted_buffer() {
        let script = CaptureScript::matching().with_stray_buffers(2);
        assert_eq!(script.buffers.len(), 3);
        let matching = script.buffers[0].delay;
        assert!(script.buffers[1..].iter().all(|b| b.delay < matching));
        assert!(script.buffers[1..]
            .iter()
            .all(|b| matches!(b.stamp, BufferStamp::Offset(o) if o < 0)));
    }
}
