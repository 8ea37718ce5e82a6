//! Recorder pipelines for video capture.
//!
//! The recording controller drives a [`RecordingPipeline`] built per session
//! by a [`PipelineFactory`]. [`FileRecordingPipeline`] is the in-process
//! implementation: a writer thread that appends frame records to the
//! destination at the target frame rate.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use dashcam_media_store::DestinationHandle;
use serde::Serialize;

use crate::error::RecordingError;

/// A recorder writing one video destination.
pub trait RecordingPipeline: Send {
    /// Start writing.
    fn start(&mut self) -> Result<(), RecordingError>;

    /// Stop writing and flush the output.
    fn stop(&mut self) -> Result<(), RecordingError>;

    fn pause(&mut self) -> Result<(), RecordingError>;

    fn resume(&mut self) -> Result<(), RecordingError>;

    /// Whether `pause` is available on this recorder.
    fn supports_pause(&self) -> bool {
        true
    }

    fn is_running(&self) -> bool;

    fn stats(&self) -> PipelineStats;
}

/// Runtime statistics from a recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames written.
    pub frames_captured: u64,

    /// Frame slots skipped because the writer fell behind.
    pub frames_dropped: u64,

    /// Bytes written to the destination.
    pub bytes_written: u64,
}

impl PipelineStats {
    /// Drop rate as a percentage.
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_captured + self.frames_dropped;
        if total == 0 {
            return 0.0;
        }
        self.frames_dropped as f64 / total as f64 * 100.0
    }
}

/// Encoder parameters for one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecorderSpec {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: u32,
    pub audio: bool,
    pub mime_type: String,
    /// Rotation the player should apply, in degrees.
    pub orientation_hint: i32,
}

/// Builds a recorder for a freshly created destination.
pub trait PipelineFactory: Send + Sync {
    fn build(
        &self,
        destination: &DestinationHandle,
        spec: &RecorderSpec,
    ) -> Result<Box<dyn RecordingPipeline>, RecordingError>;
}

/// Builds [`FileRecordingPipeline`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePipelineFactory;

impl PipelineFactory for FilePipelineFactory {
    fn build(
        &self,
        destination: &DestinationHandle,
        spec: &RecorderSpec,
    ) -> Result<Box<dyn RecordingPipeline>, RecordingError> {
        Ok(Box::new(FileRecordingPipeline::new(
            destination.path().to_path_buf(),
            spec.clone(),
        )))
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
    bytes_written: AtomicU64,
}

/// Writes a JSON header line followed by one record per frame.
pub struct FileRecordingPipeline {
    path: PathBuf,
    spec: RecorderSpec,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    counters: Arc<Counters>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
}

impl FileRecordingPipeline {
    pub fn new(path: PathBuf, spec: RecorderSpec) -> Self {
        Self {
            path,
            spec,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            writer: None,
        }
    }

    fn io_error(&self, action: &str, e: impl std::fmt::Display) -> RecordingError {
        RecordingError::recorder(format!(
            "Failed to {action} recorder for {}: {e}",
            self.path.display()
        ))
    }
}

impl RecordingPipeline for FileRecordingPipeline {
    fn start(&mut self) -> Result<(), RecordingError> {
        if self.writer.is_some() {
            return Err(RecordingError::recorder("recorder already started"));
        }

        let file = File::options()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error("open", e))?;
        let mut out = BufWriter::new(file);
        let header = serde_json::to_string(&self.spec).map_err(|e| self.io_error("start", e))?;
        writeln!(out, "DASHCAM-VIDEO {header}").map_err(|e| self.io_error("start", e))?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let paused = self.paused.clone();
        let counters = self.counters.clone();
        let frame_interval = Duration::from_secs(1) / self.spec.fps.max(1);
        let frame_bytes = (self.spec.video_bitrate / 8 / self.spec.fps.max(1)).clamp(16, 4096);

        let writer = std::thread::Builder::new()
            .name("dashcam-recorder".to_string())
            .spawn(move || -> std::io::Result<()> {
                let started = Instant::now();
                let mut next_frame = started;
                let mut index = 0u64;
                let payload = vec![0u8; frame_bytes as usize];

                while running.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now < next_frame {
                        std::thread::sleep((next_frame - now).min(Duration::from_millis(10)));
                        continue;
                    }
                    let behind = ((now - next_frame).as_nanos() / frame_interval.as_nanos().max(1))
                        as u64;
                    next_frame += frame_interval * (behind as u32 + 1);
                    if paused.load(Ordering::SeqCst) {
                        continue;
                    }

                    let pts_ms = (now - started).as_millis() as u64;
                    writeln!(out, "frame {index} {pts_ms}")?;
                    out.write_all(&payload)?;
                    index += 1;
                    counters.frames_captured.fetch_add(1, Ordering::Relaxed);
                    counters.frames_dropped.fetch_add(behind, Ordering::Relaxed);
                    counters
                        .bytes_written
                        .fetch_add(payload.len() as u64, Ordering::Relaxed);
                }
                out.flush()
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                self.io_error("spawn", e)
            })?;

        self.writer = Some(writer);
        tracing::debug!(path = %self.path.display(), fps = self.spec.fps, "Recorder started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordingError> {
        self.running.store(false, Ordering::SeqCst);
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        match writer.join() {
            Ok(Ok(())) => {
                tracing::debug!(
                    path = %self.path.display(),
                    frames = self.counters.frames_captured.load(Ordering::Relaxed),
                    "Recorder stopped"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(self.io_error("flush", e)),
            Err(_) => Err(RecordingError::recorder("recorder thread panicked")),
        }
    }

    fn pause(&mut self) -> Result<(), RecordingError> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), RecordingError> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_captured: self.counters.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FileRecordingPipeline {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "Recorder did not stop cleanly");
            }
        }
    }
}
