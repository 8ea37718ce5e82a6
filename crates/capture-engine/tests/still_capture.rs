use std::sync::Arc;
use std::time::Duration;

use dashcam_camera_core::{ExifOrientation, LensFacing, PixelFormat};
use dashcam_capture_engine::backend::{default_characteristics, BufferStamp};
use dashcam_capture_engine::{
    CaptureError, CaptureScript, CaptureSettings, FixedOrientation, SessionError,
    StillCaptureCoordinator, SyntheticCamera, TimeoutStage,
};
use tokio::time::Instant;

fn coordinator(camera: &Arc<SyntheticCamera>, rotation: i32) -> StillCaptureCoordinator {
    StillCaptureCoordinator::new(
        camera.clone(),
        Arc::new(FixedOrientation::new(rotation)),
        CaptureSettings::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn matching_buffer_is_paired_with_its_metadata() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(CaptureScript::matching().with_sensor_timestamp(100));
    let still = coordinator(&camera, 0);

    let result = still.capture().await.unwrap();
    assert_eq!(result.metadata().sensor_timestamp_ns, 100);
    assert_eq!(result.buffer().timestamp_ns(), 100);
    assert_eq!(result.format(), PixelFormat::Jpeg);
    assert_eq!(result.orientation(), ExifOrientation::Normal);
    assert!(!still.is_capturing());
    assert!(!camera.has_listener());

    result.release();
    assert_eq!(camera.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn stray_buffers_are_released_not_returned() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(
        CaptureScript::matching()
            .with_sensor_timestamp(100)
            .with_stray_buffers(2),
    );
    let still = coordinator(&camera, 0);

    let result = still.capture().await.unwrap();
    assert_eq!(result.buffer().timestamp_ns(), 100);
    assert_eq!(camera.buffer_pool().outstanding(), 1);
    assert_eq!(camera.buffer_pool().released(), 2);

    drop(result);
    assert_eq!(camera.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_buffer_times_out_and_late_buffer_is_drained_next_time() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(
        CaptureScript::late_buffer(Duration::from_millis(6000)).with_sensor_timestamp(200),
    );
    camera.push_script(CaptureScript::matching().with_sensor_timestamp(300));
    let still = coordinator(&camera, 0);

    let started = Instant::now();
    let err = still.capture().await.unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Timeout {
            ticket: 1,
            stage: TimeoutStage::Buffer,
            ..
        }
    ));
    // Metadata after 30ms, then the full buffer timeout.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(5030) && waited < Duration::from_millis(5040));
    assert!(!still.is_capturing());
    assert!(!camera.has_listener());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(camera.held_buffers(), 1);

    let result = still.capture().await.unwrap();
    assert_eq!(result.ticket_id(), 2);
    assert_eq!(result.buffer().timestamp_ns(), 300);
    assert_eq!(camera.held_buffers(), 0);
    result.release();
    assert_eq!(camera.buffer_pool().outstanding(), 0);
}

// Metadata arrives 30ms after submission, so the buffer deadline is 5030ms.
const METADATA_DELAY: Duration = Duration::from_millis(30);

#[tokio::test(start_paused = true)]
async fn buffer_at_the_deadline_yields_a_single_timeout() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    let deadline = METADATA_DELAY + CaptureSettings::default().capture_timeout;
    camera.push_script(CaptureScript::late_buffer(deadline).with_sensor_timestamp(200));
    camera.push_script(CaptureScript::matching().with_sensor_timestamp(300));
    let still = coordinator(&camera, 0);

    let err = still.capture().await.unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Timeout {
            ticket: 1,
            stage: TimeoutStage::Buffer,
            ..
        }
    ));
    assert!(!still.is_capturing());
    assert!(!camera.has_listener());

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(camera.held_buffers(), 1);
    assert_eq!(camera.buffer_pool().outstanding(), 1);

    let result = still.capture().await.unwrap();
    assert_eq!(result.ticket_id(), 2);
    assert_eq!(result.buffer().timestamp_ns(), 300);
    assert_eq!(camera.held_buffers(), 0);
    result.release();
    assert_eq!(camera.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn buffer_just_before_the_deadline_is_matched() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    let deadline = METADATA_DELAY + CaptureSettings::default().capture_timeout;
    camera.push_script(
        CaptureScript::late_buffer(deadline - Duration::from_millis(1))
            .with_sensor_timestamp(200),
    );
    let still = coordinator(&camera, 0);

    let result = still.capture().await.unwrap();
    assert_eq!(result.ticket_id(), 1);
    assert_eq!(result.buffer().timestamp_ns(), 200);
    assert!(!still.is_capturing());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(camera.held_buffers(), 0);
    result.release();
    assert_eq!(camera.buffer_pool().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_metadata_times_out() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(CaptureScript::silent());
    let still = coordinator(&camera, 0);

    let err = still.capture().await.unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Timeout {
            stage: TimeoutStage::Metadata,
            ..
        }
    ));
    assert!(!still.is_capturing());

    assert!(still.capture().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn concurrent_capture_fails_fast() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    let still = coordinator(&camera, 0);

    let (first, second) = tokio::join!(still.capture(), still.capture());
    assert!(first.is_ok());
    assert!(matches!(second, Err(ref e) if e.is_in_progress()));
    assert!(!still.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn cancelled_capture_clears_flag_and_listener() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(CaptureScript::matching().with_sensor_timestamp(400));
    camera.push_script(CaptureScript::matching().with_sensor_timestamp(500));
    let still = coordinator(&camera, 0);

    // Metadata arrives at 30ms, the buffer would at 40ms.
    let cancelled = tokio::time::timeout(Duration::from_millis(35), still.capture()).await;
    assert!(cancelled.is_err());
    assert!(!still.is_capturing());
    assert!(!camera.has_listener());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(camera.held_buffers(), 1);

    let result = still.capture().await.unwrap();
    assert_eq!(result.buffer().timestamp_ns(), 500);
}

#[tokio::test(start_paused = true)]
async fn session_failure_is_surfaced() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(CaptureScript::session_failure(SessionError::from_code(4)));
    let still = coordinator(&camera, 0);

    let err = still.capture().await.unwrap_err();
    assert!(matches!(
        err,
        CaptureError::Session(SessionError::DeviceFatal)
    ));
    assert!(!still.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn disconnect_fails_outstanding_capture() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    let still = coordinator(&camera, 0);

    let (result, ()) = tokio::join!(still.capture(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        camera.disconnect();
    });
    assert!(matches!(
        result,
        Err(CaptureError::Session(SessionError::Closed))
    ));
    assert!(!still.is_capturing());
    assert!(matches!(
        still.capture().await,
        Err(CaptureError::Session(SessionError::Closed))
    ));
}

#[tokio::test(start_paused = true)]
async fn depth_jpeg_accepts_first_buffer() {
    let camera = Arc::new(SyntheticCamera::new(default_characteristics(
        LensFacing::Back,
        PixelFormat::DepthJpeg,
    )));
    camera.push_script(
        CaptureScript::dropped_buffer()
            .with_sensor_timestamp(100)
            .with_buffer(Duration::from_millis(40), BufferStamp::Absolute(777)),
    );
    let still = coordinator(&camera, 0);

    let result = still.capture().await.unwrap();
    assert_eq!(result.metadata().sensor_timestamp_ns, 100);
    assert_eq!(result.buffer().timestamp_ns(), 777);
}

#[tokio::test(start_paused = true)]
async fn non_authoritative_timestamps_accept_first_buffer() {
    let camera = Arc::new(SyntheticCamera::with_defaults());
    camera.push_script(
        CaptureScript::dropped_buffer()
            .with_sensor_timestamp(100)
            .with_buffer(Duration::from_millis(45), BufferStamp::Offset(5)),
    );
    let mut settings = CaptureSettings::default();
    settings.matching.timestamps_authoritative = false;
    let still = StillCaptureCoordinator::new(
        camera.clone(),
        Arc::new(FixedOrientation::new(0)),
        settings,
    );

    let result = still.capture().await.unwrap();
    assert_eq!(result.buffer().timestamp_ns(), 105);
}

#[tokio::test(start_paused = true)]
async fn front_lens_output_is_mirrored() {
    let camera = Arc::new(SyntheticCamera::new(default_characteristics(
        LensFacing::Front,
        PixelFormat::Jpeg,
    )));
    let still = coordinator(&camera, 90);

    let result = still.capture().await.unwrap();
    assert_eq!(result.raw_orientation(), 90);
    assert_eq!(result.orientation(), ExifOrientation::Transpose);
    assert_eq!(result.orientation().code(), 5);
}
