mod support;

use std::sync::Arc;
use std::time::Duration;

use dashcam_camera_core::{LensFacing, PixelFormat};
use dashcam_capture_engine::backend::default_characteristics;
use dashcam_capture_engine::{
    Camera, CameraSettings, CaptureError, CaptureRequest, CaptureScript, CameraSession,
    FilePipelineFactory, FixedOrientation, RecordingEvent, SessionError, SyntheticCamera,
};
use dashcam_media_store::{FsMediaStore, MediaKind};
use support::{MemoryStore, MockPipelines};

fn camera_with(
    session: Arc<SyntheticCamera>,
    store: Arc<MemoryStore>,
    rotation: i32,
) -> Camera {
    Camera::new(
        session,
        Arc::new(FixedOrientation::new(rotation)),
        store,
        Arc::new(MockPipelines::default()),
        CameraSettings::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn photo_is_persisted_with_orientation() {
    let session = Arc::new(SyntheticCamera::with_defaults());
    session.push_script(CaptureScript::matching().with_sensor_timestamp(100));
    let store = Arc::new(MemoryStore::default());
    let camera = camera_with(session.clone(), store.clone(), 90);

    let reference = camera.take_photo().await.unwrap();
    assert_eq!(reference.kind, MediaKind::Photo);

    let item = store.item(&reference);
    assert_eq!(item.mime_type, "image/jpeg");
    assert!(!item.pending);
    assert_eq!(&item.bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(item.attributes["Orientation"], "6");
    assert_eq!(item.attributes["rotation_degrees"], "90");
    assert_eq!(item.attributes["sensor_timestamp_ns"], "100");
    assert_eq!(session.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_jpeg_output_is_rejected_and_released() {
    let session = Arc::new(SyntheticCamera::new(default_characteristics(
        LensFacing::Back,
        PixelFormat::Yuv420,
    )));
    let store = Arc::new(MemoryStore::default());
    let camera = camera_with(session.clone(), store.clone(), 0);

    let err = camera.take_photo().await.unwrap_err();
    assert!(matches!(
        err,
        CaptureError::UnsupportedFormat(PixelFormat::Yuv420)
    ));
    assert!(store.items().is_empty());
    assert_eq!(session.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn photo_without_destination_fails() {
    let session = Arc::new(SyntheticCamera::with_defaults());
    let store = Arc::new(MemoryStore::default());
    store.refuse_destinations();
    let camera = camera_with(session.clone(), store, 0);

    let err = camera.take_photo().await.unwrap_err();
    assert!(matches!(err, CaptureError::DestinationUnavailable(_)));
    assert_eq!(session.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn photos_can_be_taken_while_recording() {
    let session = Arc::new(SyntheticCamera::with_defaults());
    let store = Arc::new(MemoryStore::default());
    let camera = camera_with(session.clone(), store.clone(), 0);

    camera.start_preview().await.unwrap();
    assert_eq!(session.repeating_request(), Some(CaptureRequest::preview()));

    camera.start_recording().await.unwrap();
    assert!(camera.is_recording());
    camera.take_photo().await.unwrap();
    camera.pause_recording().await.unwrap();
    assert!(camera.is_paused());
    camera.resume_recording().await.unwrap();

    let video = camera.stop_recording().await.unwrap().unwrap();
    assert_eq!(video.kind, MediaKind::Video);
    assert_eq!(store.items().len(), 2);
    assert!(!camera.is_recording());
}

#[tokio::test(start_paused = true)]
async fn shutdown_finalizes_recording_and_closes_session() {
    let session = Arc::new(SyntheticCamera::with_defaults());
    let store = Arc::new(MemoryStore::default());
    let camera = camera_with(session.clone(), store.clone(), 0);
    let mut events = camera.subscribe_recording_events();

    camera.start_recording().await.unwrap();
    camera.shutdown().await;

    assert!(!camera.is_recording());
    assert!(matches!(events.recv().await.unwrap(), RecordingEvent::Started { .. }));
    assert!(matches!(
        events.recv().await.unwrap(),
        RecordingEvent::Finalized {
            reference: Some(_),
            ..
        }
    ));
    assert!(store.items().values().all(|item| !item.pending));
    assert!(matches!(
        session.submit_capture(CaptureRequest::still_capture()).await,
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn recording_to_filesystem_store() {
    let root = std::env::temp_dir().join(format!("dashcam-camera-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    let store = Arc::new(FsMediaStore::new(&root, "Dashcam"));
    let mut settings = CameraSettings::default();
    settings.recording.min_duration = Duration::from_millis(50);

    let camera = Camera::new(
        Arc::new(SyntheticCamera::with_defaults()),
        Arc::new(FixedOrientation::new(0)),
        store.clone(),
        Arc::new(FilePipelineFactory),
        settings,
    );

    let photo = camera.take_photo().await.unwrap();
    camera.start_recording().await.unwrap();
    let video = camera.stop_recording().await.unwrap().unwrap();

    assert!(photo.path.starts_with(root.join("Pictures/Dashcam")));
    assert!(video.path.starts_with(root.join("DCIM/Dashcam")));
    let header = std::fs::read(&video.path).unwrap();
    assert!(header.starts_with(b"DASHCAM-VIDEO "));

    let records = store.list().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.is_pending));

    let _ = std::fs::remove_dir_all(&root);
}
