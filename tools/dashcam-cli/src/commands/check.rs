//! Validate the configuration and media store.

use dashcam_common::config::AppConfig;
use dashcam_media_store::MediaKind;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Dashcam Check");
    println!("{}", "=".repeat(50));

    let mut ok = true;

    match config.validate() {
        Ok(()) => println!("[OK] Configuration is valid"),
        Err(e) => {
            ok = false;
            println!("[FAIL] Configuration: {e}");
        }
    }

    println!(
        "     capture: queue {} buffers, timeout {}ms",
        config.capture.buffer_queue_capacity, config.capture.capture_timeout_ms
    );
    println!(
        "     recording: minimum {}ms, {}x{} @ {}fps",
        config.recording.min_duration_ms,
        config.recording.width,
        config.recording.height,
        config.recording.fps
    );

    let store = super::media_store(config);
    for kind in [MediaKind::Photo, MediaKind::Video] {
        let dir = store.root().join(store.relative_dir(kind));
        match std::fs::create_dir_all(&dir) {
            Ok(()) => println!("[OK] {:?} directory: {}", kind, dir.display()),
            Err(e) => {
                ok = false;
                println!("[FAIL] {:?} directory {}: {e}", kind, dir.display());
            }
        }
    }

    match store.list() {
        Ok(records) => {
            let pending = records.iter().filter(|r| r.is_pending).count();
            println!("[OK] Media store readable: {} item(s)", records.len());
            if pending > 0 {
                println!("[WARN] {pending} item(s) were never finalized");
            }
        }
        Err(e) => {
            ok = false;
            println!("[FAIL] Media store: {e}");
        }
    }

    println!();
    if ok {
        println!("All checks passed. Dashcam is ready.");
        Ok(())
    } else {
        anyhow::bail!("some checks failed")
    }
}
