//! DLNA protocol constants

/// Transport token used for every protocol served by this crate
pub const NETWORK_PROTOCOL_HTTP_GET: &str = "http-get";

/// Network wildcard
pub const NETWORK_ANY: &str = "*";

/// Default DLNA.ORG_FLAGS prefix for image content
pub const IMAGE_FLAGS: &str = "00100000";

/// Default DLNA.ORG_FLAGS prefix for audio and video content
pub const STREAMING_FLAGS: &str = "01700000";

/// Reserved low-order part of DLNA.ORG_FLAGS (always zero)
pub const FLAGS_RESERVED: &str = "000000000000000000000000";

// Common content formats
pub const MIME_AUDIO_AAC: &str = "audio/aac";
pub const MIME_AUDIO_AC3: &str = "audio/x-ac3";
pub const MIME_AUDIO_LPCM: &str = "audio/L16";
pub const MIME_AUDIO_MP3: &str = "audio/mpeg";
pub const MIME_AUDIO_WAVE: &str = "audio/wave";
pub const MIME_IMAGE_JPEG: &str = "image/jpeg";
pub const MIME_IMAGE_PNG: &str = "image/png";
pub const MIME_VIDEO_MPEG: &str = "video/mpeg";
pub const MIME_VIDEO_MPEGM2TS: &str = "video/vnd.dlna.mpeg-tts";
pub const MIME_VIDEO_MPEGTS: &str = "video/x-mpegts";

/// Width thresholds (display pixels) separating video resolution classes
pub const VIDEO_WIDTH_THRESHOLDS: [u32; 4] = [1280, 876, 640, 352];

/// Width at or below which a video is considered low resolution
pub const VIDEO_SMALL_WIDTH: u32 = 352;

/// Width thresholds separating image size classes
pub const IMAGE_WIDTH_THRESHOLDS: [u32; 3] = [1024, 640, 160];

/// Height thresholds separating image size classes
pub const IMAGE_HEIGHT_THRESHOLDS: [u32; 3] = [768, 480, 160];

/// Edge at or below which an image is considered a thumbnail
pub const IMAGE_THUMBNAIL_EDGE: u32 = 160;

/// Frame-rate distances (Hz) and the penalty each one adds once exceeded
pub const FRAME_RATE_PENALTIES: [(f32, u32); 3] = [(0.01, 2), (0.3, 4), (2.0, 8)];

/// Penalty for a stereo/surround mismatch
pub const CHANNEL_LAYOUT_PENALTY: u32 = 2;

/// Penalty for each broken resolution threshold
pub const RESOLUTION_PENALTY: u32 = 1;
