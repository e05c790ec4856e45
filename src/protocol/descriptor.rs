//! Protocol descriptor
//!
//! A [`Protocol`] describes one wire format the server can produce: the
//! `protocolInfo` identity advertised over UPnP plus the numeric shape used
//! for matching, and the encoder hints handed to the external transcoder.
//!
//! The identity string has the form
//!
//! ```text
//! <network_protocol>:<network>:<content_format>:<DLNA.ORG_PN=profile | content features>
//! ```

use std::fmt;

use super::constants::*;

/// Audio shape of a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u32,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

/// Video shape of a protocol
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VideoFormat {
    /// Coded width in pixels
    pub width: u32,
    /// Coded height in pixels
    pub height: u32,
    /// Pixel aspect ratio
    pub aspect: f32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, aspect: f32, frame_rate_num: u32, frame_rate_den: u32) -> Self {
        Self {
            width,
            height,
            aspect,
            frame_rate_num,
            frame_rate_den,
        }
    }
}

/// Transcoder configuration carried alongside a protocol
///
/// Not part of the negotiated identity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncoderHints {
    pub audio_codec: String,
    /// Audio bit rate in kbit/s
    pub audio_rate: u32,
    pub video_codec: String,
    /// Video bit rate in kbit/s
    pub video_rate: u32,
    /// Container/mux name
    pub mux: String,
    pub fast_encode_options: String,
    pub slow_encode_options: String,
}

impl EncoderHints {
    /// Hints for an audio-only encode
    pub fn audio(codec: impl Into<String>, rate: u32, mux: impl Into<String>) -> Self {
        Self {
            audio_codec: codec.into(),
            audio_rate: rate,
            mux: mux.into(),
            ..Default::default()
        }
    }

    /// Add video codec settings
    pub fn video(mut self, codec: impl Into<String>, rate: u32) -> Self {
        self.video_codec = codec.into();
        self.video_rate = rate;
        self
    }

    /// Set encoder option strings for fast and slow (high quality) encodes
    pub fn encode_options(mut self, fast: impl Into<String>, slow: impl Into<String>) -> Self {
        self.fast_encode_options = fast.into();
        self.slow_encode_options = slow.into();
        self
    }
}

/// Declarative capability descriptor
///
/// A default-constructed protocol has an empty `profile`; catalog lookups
/// return it to signal "not found".
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    pub network_protocol: String,
    pub network: String,
    pub content_format: String,
    /// DLNA profile name, unique within a catalog
    pub profile: String,
    pub suffix: String,

    pub play_speed: bool,
    pub conversion_indicator: bool,
    pub operations_range: bool,
    pub operations_timeseek: bool,

    /// DLNA.ORG_FLAGS prefix (8 hex digits)
    pub flags: String,

    pub sample_rate: u32,
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub aspect: f32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,

    pub encoder: EncoderHints,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            network_protocol: String::new(),
            network: String::new(),
            content_format: String::new(),
            profile: String::new(),
            suffix: String::new(),
            play_speed: true,
            conversion_indicator: false,
            operations_range: false,
            operations_timeseek: false,
            flags: String::new(),
            sample_rate: 0,
            channels: 0,
            width: 0,
            height: 0,
            aspect: 0.0,
            frame_rate_num: 0,
            frame_rate_den: 0,
            encoder: EncoderHints::default(),
        }
    }
}

impl Protocol {
    /// Create an `http-get` protocol for a transcoded stream
    ///
    /// Transcoded content always sets the conversion indicator and supports
    /// neither byte-range nor time-seek operations.
    pub fn new(
        content_format: impl Into<String>,
        profile: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        let content_format = content_format.into();
        let flags = if is_image(&content_format) {
            IMAGE_FLAGS
        } else {
            STREAMING_FLAGS
        };

        Self {
            network_protocol: NETWORK_PROTOCOL_HTTP_GET.to_string(),
            network: NETWORK_ANY.to_string(),
            content_format,
            profile: profile.into(),
            suffix: suffix.into(),
            conversion_indicator: true,
            flags: flags.to_string(),
            ..Default::default()
        }
    }

    /// Create an audio protocol
    pub fn audio(
        content_format: impl Into<String>,
        profile: impl Into<String>,
        suffix: impl Into<String>,
        audio: AudioFormat,
    ) -> Self {
        Self::new(content_format, profile, suffix).with_audio(audio)
    }

    /// Create a video protocol
    pub fn video(
        content_format: impl Into<String>,
        profile: impl Into<String>,
        suffix: impl Into<String>,
        audio: AudioFormat,
        video: VideoFormat,
    ) -> Self {
        Self::new(content_format, profile, suffix)
            .with_audio(audio)
            .with_video(video)
    }

    /// Create an image protocol
    pub fn image(
        content_format: impl Into<String>,
        profile: impl Into<String>,
        suffix: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        let mut protocol = Self::new(content_format, profile, suffix);
        protocol.width = width;
        protocol.height = height;
        protocol
    }

    /// Set the audio shape
    pub fn with_audio(mut self, audio: AudioFormat) -> Self {
        self.sample_rate = audio.sample_rate;
        self.channels = audio.channels;
        self
    }

    /// Set the video shape
    pub fn with_video(mut self, video: VideoFormat) -> Self {
        self.width = video.width;
        self.height = video.height;
        self.aspect = video.aspect;
        self.frame_rate_num = video.frame_rate_num;
        self.frame_rate_den = video.frame_rate_den;
        self
    }

    /// Set the encoder hints
    pub fn with_encoder(mut self, encoder: EncoderHints) -> Self {
        self.encoder = encoder;
        self
    }

    /// Whether this protocol came from a successful lookup
    pub fn is_valid(&self) -> bool {
        !self.profile.is_empty()
    }

    /// Frame rate in Hz, 0 when unset
    pub fn frame_rate(&self) -> f32 {
        if self.frame_rate_den == 0 {
            0.0
        } else {
            self.frame_rate_num as f32 / self.frame_rate_den as f32
        }
    }

    /// Display width after applying the pixel aspect ratio
    pub fn display_width(&self) -> u32 {
        ((self.width as f32 * self.aspect) + 0.5) as u32
    }

    /// Expected stream data rate in bytes per second
    pub fn data_rate(&self) -> usize {
        (self.encoder.audio_rate as usize + self.encoder.video_rate as usize) * (1024 / 8)
    }

    /// Render the `protocolInfo` string
    ///
    /// In brief mode the last field is only `DLNA.ORG_PN=<profile>`,
    /// otherwise the full content features are emitted.
    pub fn protocol_info(&self, brief: bool) -> String {
        let mut result = format!(
            "{}:{}:{}:",
            self.network_protocol, self.network, self.content_format
        );

        if self.profile.is_empty() {
            result.push('*');
        } else if brief {
            result.push_str("DLNA.ORG_PN=");
            result.push_str(&self.profile);
        } else {
            result.push_str(&self.content_features());
        }

        result
    }

    /// Render the DLNA content features string
    pub fn content_features(&self) -> String {
        let mut result = String::new();

        if !self.profile.is_empty() {
            result.push_str("DLNA.ORG_PN=");
            result.push_str(&self.profile);
            result.push(';');
        }

        if is_image(&self.content_format) {
            result.push_str(&format!(
                "DLNA.ORG_PS={};DLNA.ORG_OP={}{};",
                self.play_speed as u8, self.operations_timeseek as u8, self.operations_range as u8
            ));
        }

        result.push_str(&format!("DLNA.ORG_CI={}", self.conversion_indicator as u8));

        if !self.flags.is_empty() {
            result.push_str(";DLNA.ORG_FLAGS=");
            result.push_str(&self.flags);
            result.push_str(FLAGS_RESERVED);
        }

        result
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.protocol_info(false))
    }
}

fn is_image(content_format: &str) -> bool {
    content_format.starts_with("image/")
}
