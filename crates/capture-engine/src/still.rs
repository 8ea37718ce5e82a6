//! Still capture synchronization.
//!
//! A still capture produces two independent notifications: capture metadata
//! (with the sensor timestamp) and, separately, an image buffer. The
//! coordinator opens a ticket, waits for the metadata, then consumes buffers
//! in arrival order until one is accepted by the match policy for its pixel
//! format. Everything else it dequeues is released on the spot.
//!
//! Only one ticket is open at a time. The in-flight flag and the buffer
//! listener registration are held by scoped guards, so they are cleared on
//! success, on every error, and when the caller drops the future.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashcam_camera_core::{ExifOrientation, PixelFormat};
use dashcam_common::config::CaptureDefaults;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::backend::{CameraSession, CaptureMetadata, CaptureRequest, OrientationSource};
use crate::buffer::{BufferListener, QueuedBuffer};
use crate::error::{CaptureError, SessionError, TimeoutStage};

/// How a buffer is associated with capture metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// The buffer timestamp must equal the metadata's sensor timestamp.
    Timestamp,
    /// The first buffer dequeued after submission is accepted.
    FirstBuffer,
}

impl MatchPolicy {
    pub fn accepts(self, buffer: &QueuedBuffer, expected_timestamp_ns: i64) -> bool {
        match self {
            Self::Timestamp => buffer.timestamp_ns() == expected_timestamp_ns,
            Self::FirstBuffer => true,
        }
    }
}

/// Per-format choice of [`MatchPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPolicyTable {
    /// Whether buffer and metadata timestamps share a clock on this platform.
    pub timestamps_authoritative: bool,
    /// Formats whose buffer timestamps are not comparable.
    pub first_buffer_formats: Vec<PixelFormat>,
}

impl MatchPolicyTable {
    pub fn policy_for(&self, format: PixelFormat) -> MatchPolicy {
        if self.timestamps_authoritative && !self.first_buffer_formats.contains(&format) {
            MatchPolicy::Timestamp
        } else {
            MatchPolicy::FirstBuffer
        }
    }
}

/// Tuning for the still capture coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Capacity of the per-ticket buffer queue.
    pub buffer_queue_capacity: usize,
    /// Bound on each wait: for metadata, then for a matching buffer.
    pub capture_timeout: Duration,
    pub matching: MatchPolicyTable,
}

impl From<&CaptureDefaults> for CaptureSettings {
    fn from(defaults: &CaptureDefaults) -> Self {
        Self {
            buffer_queue_capacity: defaults.buffer_queue_capacity.max(1),
            capture_timeout: Duration::from_millis(defaults.capture_timeout_ms),
            matching: MatchPolicyTable {
                timestamps_authoritative: defaults.timestamp_matching,
                first_buffer_formats: defaults.first_buffer_formats.clone(),
            },
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureDefaults::default())
    }
}

/// Identity of one in-flight still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTicket {
    pub id: u64,
    pub submitted_at: Instant,
    /// Sensor timestamp reported by the metadata, once it has arrived.
    pub expected_timestamp_ns: Option<i64>,
}

impl CaptureTicket {
    fn open(id: u64) -> Self {
        Self {
            id,
            submitted_at: Instant::now(),
            expected_timestamp_ns: None,
        }
    }
}

/// Capture metadata paired with the buffer it describes.
///
/// Only the coordinator builds these, and only from a buffer the match
/// policy accepted. The buffer is released when the result is released or
/// dropped.
#[derive(Debug)]
pub struct CombinedCaptureResult {
    ticket_id: u64,
    metadata: CaptureMetadata,
    buffer: QueuedBuffer,
    orientation: ExifOrientation,
    raw_orientation: i32,
    format: PixelFormat,
}

impl CombinedCaptureResult {
    pub fn ticket_id(&self) -> u64 {
        self.ticket_id
    }

    pub fn metadata(&self) -> &CaptureMetadata {
        &self.metadata
    }

    pub fn buffer(&self) -> &QueuedBuffer {
        &self.buffer
    }

    /// Orientation tag for the output image.
    pub fn orientation(&self) -> ExifOrientation {
        self.orientation
    }

    /// Device rotation in degrees at the time of capture.
    pub fn raw_orientation(&self) -> i32 {
        self.raw_orientation
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Release the underlying buffer.
    pub fn release(self) {
        self.buffer.release();
    }

    /// Give up the metadata and keep the buffer.
    pub fn into_buffer(self) -> QueuedBuffer {
        self.buffer
    }
}

/// Matches still-capture metadata to image buffers, one ticket at a time.
pub struct StillCaptureCoordinator {
    session: Arc<dyn CameraSession>,
    orientation: Arc<dyn OrientationSource>,
    settings: CaptureSettings,
    in_flight: AtomicBool,
    last_ticket: AtomicU64,
}

impl StillCaptureCoordinator {
    pub fn new(
        session: Arc<dyn CameraSession>,
        orientation: Arc<dyn OrientationSource>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            session,
            orientation,
            settings,
            in_flight: AtomicBool::new(false),
            last_ticket: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Whether a ticket is currently open.
    pub fn is_capturing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Capture one still image.
    ///
    /// Returns [`CaptureError::InProgress`] without side effects if another
    /// capture is outstanding.
    pub async fn capture(&self) -> Result<CombinedCaptureResult, CaptureError> {
        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Capture requested while another is in flight");
            return Err(CaptureError::InProgress);
        };

        let mut ticket = CaptureTicket::open(self.last_ticket.fetch_add(1, Ordering::Relaxed) + 1);

        let stale = self.drain_stale_buffers();
        if stale > 0 {
            tracing::debug!(ticket = ticket.id, stale, "Released stale buffers");
        }

        let (tx, mut queue) = mpsc::channel(self.settings.buffer_queue_capacity.max(1));
        self.session
            .register_buffer_listener(BufferListener::new(tx));
        let registration = ListenerRegistration {
            session: self.session.as_ref(),
        };

        let metadata_rx = self
            .session
            .submit_capture(CaptureRequest::still_capture())
            .await?;
        tracing::debug!(ticket = ticket.id, "Still capture submitted");

        let metadata = match tokio::time::timeout(self.settings.capture_timeout, metadata_rx).await
        {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(SessionError::Closed.into()),
            Err(_) => return Err(self.timed_out(&ticket, TimeoutStage::Metadata)),
        };
        ticket.expected_timestamp_ns = Some(metadata.sensor_timestamp_ns);
        tracing::debug!(
            ticket = ticket.id,
            sensor_timestamp_ns = metadata.sensor_timestamp_ns,
            "Capture metadata received"
        );

        let buffer = match tokio::time::timeout(
            self.settings.capture_timeout,
            self.dequeue_matching(&mut queue, &ticket, metadata.sensor_timestamp_ns),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(self.timed_out(&ticket, TimeoutStage::Buffer)),
        };

        drop(registration);
        queue.close();
        let mut leftover = 0usize;
        while let Ok(extra) = queue.try_recv() {
            extra.release();
            leftover += 1;
        }
        if leftover > 0 {
            tracing::debug!(ticket = ticket.id, leftover, "Released buffers queued after match");
        }

        let raw_orientation = self.orientation.rotation_degrees().unwrap_or(0);
        let mirrored = self.session.characteristics().lens_facing.is_mirrored();
        let orientation = ExifOrientation::compose(raw_orientation, mirrored);

        tracing::info!(
            ticket = ticket.id,
            timestamp_ns = buffer.timestamp_ns(),
            bytes = buffer.len(),
            ?orientation,
            elapsed_ms = ticket.submitted_at.elapsed().as_millis() as u64,
            "Still capture complete"
        );

        Ok(CombinedCaptureResult {
            ticket_id: ticket.id,
            metadata,
            format: buffer.format(),
            buffer,
            orientation,
            raw_orientation,
        })
    }

    /// Dequeue buffers in arrival order until one is accepted.
    async fn dequeue_matching(
        &self,
        queue: &mut mpsc::Receiver<QueuedBuffer>,
        ticket: &CaptureTicket,
        expected_timestamp_ns: i64,
    ) -> Result<QueuedBuffer, CaptureError> {
        while let Some(buffer) = queue.recv().await {
            let policy = self.settings.matching.policy_for(buffer.format());
            if policy.accepts(&buffer, expected_timestamp_ns) {
                tracing::debug!(
                    ticket = ticket.id,
                    timestamp_ns = buffer.timestamp_ns(),
                    ?policy,
                    "Matching buffer dequeued"
                );
                return Ok(buffer);
            }
            tracing::trace!(
                ticket = ticket.id,
                timestamp_ns = buffer.timestamp_ns(),
                expected_timestamp_ns,
                "Releasing non-matching buffer"
            );
            buffer.release();
        }
        Err(SessionError::Closed.into())
    }

    /// Release buffers the session kept from earlier captures.
    fn drain_stale_buffers(&self) -> usize {
        let mut released = 0;
        while let Some(buffer) = self.session.acquire_next_buffer() {
            buffer.release();
            released += 1;
        }
        released
    }

    fn timed_out(&self, ticket: &CaptureTicket, stage: TimeoutStage) -> CaptureError {
        tracing::warn!(
            ticket = ticket.id,
            %stage,
            expected_timestamp_ns = ?ticket.expected_timestamp_ns,
            timeout_ms = self.settings.capture_timeout.as_millis() as u64,
            "Still capture timed out"
        );
        CaptureError::Timeout {
            ticket: ticket.id,
            stage,
            waited: self.settings.capture_timeout,
        }
    }
}

/// Holds the in-flight flag for the lifetime of one capture.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Unregisters the buffer listener when the capture ends.
struct ListenerRegistration<'a> {
    session: &'a dyn CameraSession,
}

impl Drop for ListenerRegistration<'_> {
    fn drop(&mut self) {
        self.session.unregister_buffer_listener();
    }
}
