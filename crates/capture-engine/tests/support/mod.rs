#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashcam_capture_engine::{
    PipelineFactory, PipelineStats, RecorderSpec, RecordingError, RecordingPipeline,
};
use dashcam_media_store::{DestinationHandle, MediaKind, MediaReference, MediaStore, StoreError};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryItem {
    pub kind: MediaKind,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
    pub pending: bool,
}

#[derive(Default)]
struct MemoryInner {
    next: u32,
    items: BTreeMap<String, MemoryItem>,
    discarded: Vec<String>,
}

/// Media store keeping everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    refuse: AtomicBool,
    fail_finalize: AtomicBool,
}

impl MemoryStore {
    /// Make `create_destination` return `None`.
    pub fn refuse_destinations(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Make `finalize` fail with an I/O error.
    pub fn fail_finalize(&self) {
        self.fail_finalize.store(true, Ordering::SeqCst);
    }

    pub fn items(&self) -> BTreeMap<String, MemoryItem> {
        self.inner.lock().unwrap().items.clone()
    }

    pub fn item(&self, reference: &MediaReference) -> MemoryItem {
        self.items()
            .get(&reference.display_name)
            .cloned()
            .expect("item should exist")
    }

    pub fn discarded(&self) -> Vec<String> {
        self.inner.lock().unwrap().discarded.clone()
    }

    fn with_item<T>(
        &self,
        handle: &DestinationHandle,
        f: impl FnOnce(&mut MemoryItem) -> T,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .items
            .get_mut(handle.display_name())
            .map(f)
            .ok_or_else(|| StoreError::Missing {
                path: handle.path().to_path_buf(),
            })
    }
}

impl MediaStore for MemoryStore {
    fn create_destination(&self, kind: MediaKind, mime_type: &str) -> Option<DestinationHandle> {
        if self.refuse.load(Ordering::SeqCst) {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.next += 1;
        let name = format!("item_{:03}", inner.next);
        inner.items.insert(
            name.clone(),
            MemoryItem {
                kind,
                mime_type: mime_type.to_string(),
                bytes: vec![],
                attributes: BTreeMap::new(),
                pending: true,
            },
        );
        let path = PathBuf::from(format!("/memory/{name}"));
        Some(DestinationHandle::new(name, kind, mime_type, path))
    }

    fn write_bytes(
        &self,
        handle: &DestinationHandle,
        bytes: &[u8],
    ) -> Result<MediaReference, StoreError> {
        self.with_item(handle, |item| item.bytes = bytes.to_vec())?;
        Ok(handle.reference())
    }

    fn write_metadata(
        &self,
        handle: &DestinationHandle,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.with_item(handle, |item| {
            item.attributes
                .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())))
        })
    }

    fn finalize(&self, handle: &DestinationHandle) -> Result<(), StoreError> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: handle.path().to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.with_item(handle, |item| item.pending = false)
    }

    fn discard(&self, handle: &DestinationHandle) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.items.remove(handle.display_name());
        inner.discarded.push(handle.display_name().to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCall {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Pipeline factory recording every call with its (virtual) time.
#[derive(Default)]
pub struct MockPipelines {
    calls: Arc<Mutex<Vec<(PipelineCall, Instant)>>>,
    specs: Mutex<Vec<RecorderSpec>>,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    no_pause: AtomicBool,
}

impl MockPipelines {
    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn without_pause(&self) {
        self.no_pause.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<PipelineCall> {
        self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    /// Time of the first call of `kind`.
    pub fn time_of(&self, kind: PipelineCall) -> Option<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == kind)
            .map(|(_, at)| *at)
    }

    pub fn specs(&self) -> Vec<RecorderSpec> {
        self.specs.lock().unwrap().clone()
    }
}

impl PipelineFactory for MockPipelines {
    fn build(
        &self,
        _destination: &DestinationHandle,
        spec: &RecorderSpec,
    ) -> Result<Box<dyn RecordingPipeline>, RecordingError> {
        self.specs.lock().unwrap().push(spec.clone());
        Ok(Box::new(MockPipeline {
            calls: self.calls.clone(),
            fail_start: self.fail_start.load(Ordering::SeqCst),
            fail_stop: self.fail_stop.load(Ordering::SeqCst),
            supports_pause: !self.no_pause.load(Ordering::SeqCst),
            running: false,
        }))
    }
}

struct MockPipeline {
    calls: Arc<Mutex<Vec<(PipelineCall, Instant)>>>,
    fail_start: bool,
    fail_stop: bool,
    supports_pause: bool,
    running: bool,
}

impl MockPipeline {
    fn log(&self, call: PipelineCall) {
        self.calls.lock().unwrap().push((call, Instant::now()));
    }
}

impl RecordingPipeline for MockPipeline {
    fn start(&mut self) -> Result<(), RecordingError> {
        self.log(PipelineCall::Start);
        if self.fail_start {
            return Err(RecordingError::recorder("encoder unavailable"));
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordingError> {
        self.log(PipelineCall::Stop);
        self.running = false;
        if self.fail_stop {
            return Err(RecordingError::recorder("muxer failed"));
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), RecordingError> {
        self.log(PipelineCall::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), RecordingError> {
        self.log(PipelineCall::Resume);
        Ok(())
    }

    fn supports_pause(&self) -> bool {
        self.supports_pause
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn stats(&self) -> PipelineStats {
        PipelineStats::default()
    }
}
