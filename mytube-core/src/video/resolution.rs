//! Resolution labels recorded in video metadata.

/// Label used when the dimensions could not be probed.
pub const UNKNOWN_RESOLUTION: &str = "unknown";

/// Maps frame dimensions to the label stored with a video.
///
/// The first tier whose width or height threshold either dimension reaches
/// wins, so a 1080x1920 portrait frame is labelled `2K`. Frames below 720p
/// are labelled `WxH`.
pub fn resolution_label(width: u32, height: u32) -> String {
    if width == 0 || height == 0 {
        return UNKNOWN_RESOLUTION.to_string();
    }

    let tier = if width >= 7680 || height >= 4320 {
        "8K"
    } else if width >= 3840 || height >= 2160 {
        "4K"
    } else if width >= 2560 || height >= 1440 {
        "2K"
    } else if width >= 1920 || height >= 1080 {
        "1080p"
    } else if width >= 1280 || height >= 720 {
        "720p"
    } else {
        return format!("{width}x{height}");
    };

    tier.to_string()
}
