pub mod check;
pub mod config;
pub mod list;
pub mod photo;
pub mod record;

use std::sync::Arc;

use dashcam_camera_core::{LensFacing, PixelFormat};
use dashcam_capture_engine::backend::default_characteristics;
use dashcam_capture_engine::{
    Camera, CameraSettings, FilePipelineFactory, FixedOrientation, SyntheticCamera,
};
use dashcam_common::config::AppConfig;
use dashcam_media_store::FsMediaStore;

/// Store rooted at the configured media directory.
pub fn media_store(config: &AppConfig) -> FsMediaStore {
    FsMediaStore::new(&config.media_dir, &config.app_name)
}

/// Open a camera over a synthetic session and the configured store.
pub fn open_camera(
    config: &AppConfig,
    rotation: i32,
    front: bool,
) -> (Camera, Arc<SyntheticCamera>) {
    let lens = if front {
        LensFacing::Front
    } else {
        LensFacing::Back
    };
    let session = Arc::new(SyntheticCamera::new(default_characteristics(
        lens,
        PixelFormat::Jpeg,
    )));
    let camera = Camera::new(
        session.clone(),
        Arc::new(FixedOrientation::new(rotation)),
        Arc::new(media_store(config)),
        Arc::new(FilePipelineFactory),
        CameraSettings::from(config),
    );
    (camera, session)
}
