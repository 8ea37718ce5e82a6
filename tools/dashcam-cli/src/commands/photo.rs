//! Capture still photos.

use std::time::Duration;

use dashcam_capture_engine::CaptureScript;
use dashcam_common::config::AppConfig;

use crate::Scenario;

fn script(scenario: Scenario, timeout: Duration) -> CaptureScript {
    match scenario {
        Scenario::Matching => CaptureScript::matching(),
        Scenario::Stray => CaptureScript::matching().with_stray_buffers(2),
        Scenario::Late => CaptureScript::late_buffer(timeout + Duration::from_millis(500)),
        Scenario::Dropped => CaptureScript::dropped_buffer(),
    }
}

pub async fn run(
    config: &AppConfig,
    count: u32,
    rotation: i32,
    front: bool,
    scenario: Scenario,
) -> anyhow::Result<()> {
    let (camera, session) = super::open_camera(config, rotation, front);
    camera.start_preview().await?;

    let timeout = camera.still().settings().capture_timeout;
    println!(
        "Taking {count} photo(s) (rotation {rotation}, {} lens, {scenario:?})",
        if front { "front" } else { "back" }
    );

    tracing::debug!(count, rotation, front, ?scenario, ?timeout, "Photo run starting");

    let mut saved = 0;
    for i in 1..=count {
        session.push_script(script(scenario, timeout));
        match camera.take_photo().await {
            Ok(reference) => {
                saved += 1;
                println!("  [{i}] {}", reference);
            }
            Err(e) => {
                tracing::warn!(attempt = i, error = %e, "Photo failed");
                println!("  [{i}] failed: {e}");
            }
        }
    }

    camera.shutdown().await;
    println!();
    println!("Saved {saved} of {count} photo(s)");

    if saved == 0 && count > 0 {
        anyhow::bail!("no photos were saved");
    }
    Ok(())
}
