//! Record a video clip.

use std::time::Duration;

use dashcam_capture_engine::RecordingEvent;
use dashcam_common::config::AppConfig;

pub async fn run(
    config: &AppConfig,
    duration_ms: Option<u64>,
    pause_at_ms: Option<u64>,
    pause_for_ms: u64,
    rotation: i32,
) -> anyhow::Result<()> {
    let (camera, _session) = super::open_camera(config, rotation, false);
    let mut events = camera.subscribe_recording_events();
    camera.start_preview().await?;

    println!("Starting recording");
    println!(
        "  {}x{} @ {}fps",
        config.recording.width, config.recording.height, config.recording.fps
    );
    println!("  Minimum duration: {}ms", config.recording.min_duration_ms);
    println!();

    camera.start_recording().await?;
    tracing::info!(?duration_ms, ?pause_at_ms, rotation, "Recording run started");

    if let Some(pause_at) = pause_at_ms {
        tokio::time::sleep(Duration::from_millis(pause_at)).await;
        camera.pause_recording().await?;
        println!("Paused");
        tokio::time::sleep(Duration::from_millis(pause_for_ms)).await;
        camera.resume_recording().await?;
        println!("Resumed");
    }

    match duration_ms {
        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        None => {
            println!("Press Ctrl+C to stop recording...");
            tokio::signal::ctrl_c().await?;
            println!();
        }
    }

    if let Some(stats) = camera.recorder().stats().await {
        println!(
            "Frames: {} written, {} dropped ({:.1}%)",
            stats.frames_captured,
            stats.frames_dropped,
            stats.drop_rate()
        );
    }

    let result = camera.stop_recording().await;
    camera.shutdown().await;
    tracing::debug!(ok = result.is_ok(), "Recording run finished");

    while let Ok(event) = events.try_recv() {
        if let RecordingEvent::Finalized { duration, .. } = event {
            println!("Clip length: {:.2}s", duration.as_secs_f64());
        }
    }

    match result? {
        Some(reference) => println!("Recording saved to: {reference}"),
        None => println!("Nothing was recorded"),
    }
    Ok(())
}
