//! Protocol catalog and matcher
//!
//! The catalog holds the source protocols declared at startup (audio, video
//! and image lists, plus the sink list) and answers "which protocols best fit
//! this request" queries.
//!
//! Every query scores each entry with a penalty built from independent
//! mismatch tests, groups entries by penalty (lowest first) and then keeps the
//! first entry per profile name. Results are recomputed on every call.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};

use super::constants::*;
use super::descriptor::{AudioFormat, EncoderHints, Protocol, VideoFormat};

/// Declared protocol lists
///
/// Entries are appended once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProtocolCatalog {
    audio: Vec<Protocol>,
    video: Vec<Protocol>,
    image: Vec<Protocol>,
    sink: Vec<Protocol>,
}

impl ProtocolCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an audio protocol
    pub fn add_source_audio_protocol(
        &mut self,
        profile: &str,
        mime: &str,
        suffix: &str,
        audio: AudioFormat,
        encoder: EncoderHints,
    ) {
        tracing::info!(
            profile = profile,
            sample_rate = audio.sample_rate,
            channels = audio.channels,
            "Enabled audio protocol"
        );

        self.audio
            .push(Protocol::audio(mime, profile, suffix, audio).with_encoder(encoder));
    }

    /// Declare a video protocol
    pub fn add_source_video_protocol(
        &mut self,
        profile: &str,
        mime: &str,
        suffix: &str,
        audio: AudioFormat,
        video: VideoFormat,
        encoder: EncoderHints,
    ) {
        let protocol = Protocol::video(mime, profile, suffix, audio, video).with_encoder(encoder);

        tracing::info!(
            profile = profile,
            sample_rate = audio.sample_rate,
            channels = audio.channels,
            width = video.width,
            height = video.height,
            frame_rate = protocol.frame_rate(),
            "Enabled video protocol"
        );

        self.video.push(protocol);
    }

    /// Declare an image protocol
    pub fn add_source_image_protocol(
        &mut self,
        profile: &str,
        mime: &str,
        suffix: &str,
        width: u32,
        height: u32,
    ) {
        tracing::info!(
            profile = profile,
            width = width,
            height = height,
            "Enabled image protocol"
        );

        self.image
            .push(Protocol::image(mime, profile, suffix, width, height));
    }

    /// Declare a protocol this device accepts as a sink
    pub fn add_sink_protocol(&mut self, protocol: Protocol) {
        self.sink.push(protocol);
    }

    /// All declared source protocols: audio, then video, then image
    pub fn source_protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.audio.iter().chain(&self.video).chain(&self.image)
    }

    /// Declared sink protocols
    pub fn sink_protocols(&self) -> &[Protocol] {
        &self.sink
    }

    /// Comma-joined brief identity of every source protocol
    pub fn source_protocol_info(&self) -> String {
        join_brief(self.source_protocols())
    }

    /// Comma-joined brief identity of every sink protocol
    pub fn sink_protocol_info(&self) -> String {
        join_brief(self.sink.iter())
    }

    /// Audio protocols for a channel count, best match first
    ///
    /// The `channels` of each result is capped at the requested count.
    pub fn get_audio_protocols(&self, channels: u32) -> Vec<Protocol> {
        let mut result = best_per_profile(
            self.audio
                .iter()
                .map(|p| (channel_penalty(p.channels, channels), p)),
        );

        for protocol in &mut result {
            protocol.channels = protocol.channels.min(channels);
        }

        result
    }

    /// Video protocols for a requested shape, best match first
    ///
    /// `width` is the requested display width and `frame_rate` is in Hz.
    pub fn get_video_protocols(&self, channels: u32, width: u32, frame_rate: f32) -> Vec<Protocol> {
        let mut result = best_per_profile(self.video.iter().map(|p| {
            let penalty = channel_penalty(p.channels, channels)
                + video_width_penalty(p.display_width(), width)
                + frame_rate_penalty(p.frame_rate(), frame_rate);

            (penalty, p)
        }));

        for protocol in &mut result {
            protocol.channels = protocol.channels.min(channels);
        }

        result
    }

    /// Image protocols for a requested size, best match first
    pub fn get_image_protocols(&self, width: u32, height: u32) -> Vec<Protocol> {
        best_per_profile(self.image.iter().map(|p| {
            let penalty =
                size_class_penalty(p.width, width, &IMAGE_WIDTH_THRESHOLDS, IMAGE_THUMBNAIL_EDGE)
                    + size_class_penalty(
                        p.height,
                        height,
                        &IMAGE_HEIGHT_THRESHOLDS,
                        IMAGE_THUMBNAIL_EDGE,
                    );

            (penalty, p)
        }))
    }

    /// Find an audio protocol by profile
    ///
    /// Returns a default protocol (empty profile) when not found.
    pub fn get_audio_protocol(&self, profile: &str, channels: u32) -> Protocol {
        find_profile(self.get_audio_protocols(channels), profile)
    }

    /// Find a video protocol by profile
    ///
    /// Returns a default protocol (empty profile) when not found.
    pub fn get_video_protocol(
        &self,
        profile: &str,
        channels: u32,
        width: u32,
        frame_rate: f32,
    ) -> Protocol {
        find_profile(self.get_video_protocols(channels, width, frame_rate), profile)
    }

    /// Find an image protocol by profile
    ///
    /// Returns a default protocol (empty profile) when not found.
    pub fn get_image_protocol(&self, profile: &str, width: u32, height: u32) -> Protocol {
        find_profile(self.get_image_protocols(width, height), profile)
    }

    /// Like [`get_audio_protocol`](Self::get_audio_protocol), but a miss is an error
    pub fn require_audio_protocol(&self, profile: &str, channels: u32) -> Result<Protocol> {
        require(self.get_audio_protocol(profile, channels), profile)
    }

    /// Like [`get_video_protocol`](Self::get_video_protocol), but a miss is an error
    pub fn require_video_protocol(
        &self,
        profile: &str,
        channels: u32,
        width: u32,
        frame_rate: f32,
    ) -> Result<Protocol> {
        require(
            self.get_video_protocol(profile, channels, width, frame_rate),
            profile,
        )
    }

    /// Like [`get_image_protocol`](Self::get_image_protocol), but a miss is an error
    pub fn require_image_protocol(&self, profile: &str, width: u32, height: u32) -> Result<Protocol> {
        require(self.get_image_protocol(profile, width, height), profile)
    }

    /// Number of declared source protocols
    pub fn len(&self) -> usize {
        self.audio.len() + self.video.len() + self.image.len()
    }

    /// Whether no source protocol is declared
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry (full shutdown only)
    pub fn clear(&mut self) {
        self.audio.clear();
        self.video.clear();
        self.image.clear();
        self.sink.clear();
    }
}

/// Group by penalty (ascending, stable) and keep the first entry per profile
fn best_per_profile<'a>(scored: impl Iterator<Item = (u32, &'a Protocol)>) -> Vec<Protocol> {
    let mut groups: BTreeMap<u32, Vec<&Protocol>> = BTreeMap::new();
    for (penalty, protocol) in scored {
        groups.entry(penalty).or_default().push(protocol);
    }

    let mut profiles = HashSet::new();
    groups
        .into_values()
        .flatten()
        .filter(|&p| profiles.insert(p.profile.as_str()))
        .cloned()
        .collect()
}

fn find_profile(protocols: Vec<Protocol>, profile: &str) -> Protocol {
    protocols
        .into_iter()
        .find(|p| p.profile == profile)
        .unwrap_or_default()
}

fn require(protocol: Protocol, profile: &str) -> Result<Protocol> {
    if protocol.is_valid() {
        Ok(protocol)
    } else {
        Err(Error::UnsupportedProfile(profile.to_string()))
    }
}

fn join_brief<'a>(protocols: impl Iterator<Item = &'a Protocol>) -> String {
    protocols
        .map(|p| p.protocol_info(true))
        .collect::<Vec<_>>()
        .join(",")
}

fn channel_penalty(offered: u32, requested: u32) -> u32 {
    if (offered > 2) == (requested > 2) {
        0
    } else {
        CHANNEL_LAYOUT_PENALTY
    }
}

fn video_width_penalty(offered: u32, requested: u32) -> u32 {
    size_class_penalty(offered, requested, &VIDEO_WIDTH_THRESHOLDS, VIDEO_SMALL_WIDTH)
}

/// One penalty per threshold the two sizes fall on different sides of,
/// plus one when only one of them is in the smallest class
fn size_class_penalty(offered: u32, requested: u32, thresholds: &[u32], small_edge: u32) -> u32 {
    let above = thresholds
        .iter()
        .filter(|&&t| (offered > t) != (requested > t))
        .count() as u32;

    let small = ((offered <= small_edge) != (requested <= small_edge)) as u32;

    (above + small) * RESOLUTION_PENALTY
}

fn frame_rate_penalty(offered: f32, requested: f32) -> u32 {
    let distance = (offered - requested).abs();

    FRAME_RATE_PENALTIES
        .iter()
        .filter(|(threshold, _)| distance > *threshold)
        .map(|(_, penalty)| penalty)
        .sum()
}
