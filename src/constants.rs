// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::types::Resolution;

/// Application directory name under the config and data roots
pub const APP_NAME: &str = "mealcam";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MEALCAM_CONFIG";

/// Resolution requested from the camera unless configured otherwise
pub const DEFAULT_IDEAL_RESOLUTION: Resolution = Resolution::new(1920, 1080);

/// File and directory names
pub mod paths {
    pub const CONFIG_FILE: &str = "config.json";

    /// Meal log, profile and targets
    pub const STORE_FILE: &str = "meals.json";

    /// Images owned by persisted meals
    pub const IMAGES_DIR: &str = "images";

    /// Captures saved from the command line
    pub const PHOTOS_DIR: &str = "photos";

    /// Prefix of saved photo filenames
    pub const PHOTO_PREFIX: &str = "IMG";
}

/// Capture timing
pub mod timing {
    use std::time::Duration;

    /// How long a capture keeps retrying while the stream warms up
    pub const DEFAULT_READY_TIMEOUT_MS: u64 = 5000;

    /// Pause between capture attempts that hit `FrameUnavailable`
    pub const CAPTURE_RETRY_INTERVAL: Duration = Duration::from_millis(50);
}

/// V4L2 streaming parameters
pub mod v4l2 {
    use std::time::Duration;

    /// Memory-mapped buffers queued on the device
    pub const BUFFER_COUNT: u32 = 4;

    /// Time allowed for opening a node and negotiating its format
    pub const OPEN_TIMEOUT: Duration = Duration::from_secs(3);

    /// Sizes offered for cameras that report stepwise frame sizes
    pub const STEPWISE_RESOLUTIONS: &[(u32, u32)] =
        &[(640, 480), (1280, 720), (1920, 1080), (2592, 1944)];
}

/// Daily targets used until the user sets their own
pub mod nutrition {
    pub const DEFAULT_CALORIES: f64 = 2000.0;
    pub const DEFAULT_PROTEIN: f64 = 150.0;
    pub const DEFAULT_CARBS: f64 = 250.0;
    pub const DEFAULT_FAT: f64 = 65.0;

    /// Schema version written into the persisted store
    pub const STATE_VERSION: u32 = 1;
}

/// Supported file formats
pub mod file_formats {
    /// Extensions accepted by the import fallback
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Whether a path looks like an importable image
    pub fn is_image_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}
