//! Connection entry types
//!
//! This module defines the per-connection record stored in the registry and
//! the projections returned by the ConnectionManager actions.

use std::sync::{Arc, Weak};

use crate::protocol::Protocol;
use crate::proxy::StreamSource;

use super::key::OutputKey;

/// Direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Allowed values of `A_ARG_TYPE_Direction`
    pub const VALUES: [&'static str; 2] = ["Input", "Output"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "Input",
            Direction::Output => "Output",
        }
    }
}

/// Status of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Ok,
    ContentFormatMismatch,
    InsufficientBandwidth,
    UnreliableChannel,
    Unknown,
}

impl ConnectionStatus {
    /// Allowed values of `A_ARG_TYPE_ConnectionStatus`
    pub const VALUES: [&'static str; 5] = [
        "OK",
        "ContentFormatMismatch",
        "InsufficientBandwidth",
        "UnreliableChannel",
        "Unknown",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Ok => "OK",
            ConnectionStatus::ContentFormatMismatch => "ContentFormatMismatch",
            ConnectionStatus::InsufficientBandwidth => "InsufficientBandwidth",
            ConnectionStatus::UnreliableChannel => "UnreliableChannel",
            ConnectionStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: i32,
    pub rcs_id: i32,
    pub avtransport_id: i32,
    /// `protocolInfo` reported by GetCurrentConnectionInfo
    pub protocol_info: String,
    pub peer_connection_manager: String,
    pub peer_connection_id: i32,
    pub direction: Direction,
    pub status: ConnectionStatus,

    /// Resource being streamed
    pub mrl: String,
    /// Endpoint serving the stream
    pub endpoint: String,
    /// Full identity of the granted protocol
    pub protocol_string: String,
    /// Transcode options
    pub opt: String,
    /// Source feeding this connection, if still alive
    pub source: Weak<StreamSource>,
}

impl ConnectionInfo {
    /// Create an output connection record
    pub fn output(
        connection_id: i32,
        protocol: &Protocol,
        mrl: &str,
        endpoint: &str,
        opt: &str,
        source: &Arc<StreamSource>,
    ) -> Self {
        Self {
            connection_id,
            rcs_id: -1,
            avtransport_id: -1,
            protocol_info: format!("http-get:*:{}:*", protocol.content_format),
            peer_connection_manager: String::new(),
            peer_connection_id: -1,
            direction: Direction::Output,
            status: ConnectionStatus::Ok,
            mrl: mrl.to_string(),
            endpoint: endpoint.to_string(),
            protocol_string: protocol.to_string(),
            opt: opt.to_string(),
            source: Arc::downgrade(source),
        }
    }

    /// Whether this connection serves `key`
    pub fn matches(&self, key: &OutputKey) -> bool {
        self.protocol_string == key.protocol
            && self.mrl == key.mrl
            && self.endpoint == key.endpoint
            && self.opt == key.opt
    }
}

/// Response of GetProtocolInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Comma-joined source protocol identities
    pub source: String,
    /// Comma-joined sink protocol identities
    pub sink: String,
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::protocol::constants::MIME_VIDEO_MPEG;
    use crate::proxy::ProxyConfig;

    #[test]
    fn test_output_connection_defaults() {
        let source = StreamSource::spawn(Cursor::new(vec![0u8; 8]), ProxyConfig::default().block_size(8))
            .unwrap();
        let protocol = Protocol::new(MIME_VIDEO_MPEG, "MPEG_PS_PAL", "mpg");

        let info = ConnectionInfo::output(3, &protocol, "file:///a.mkv", "/mpeg/3", "", &source);

        assert_eq!(info.connection_id, 3);
        assert_eq!(info.rcs_id, -1);
        assert_eq!(info.avtransport_id, -1);
        assert_eq!(info.peer_connection_id, -1);
        assert_eq!(info.protocol_info, "http-get:*:video/mpeg:*");
        assert_eq!(info.direction, Direction::Output);
        assert_eq!(info.status, ConnectionStatus::Ok);
        assert!(info.matches(&OutputKey::new(&protocol, "file:///a.mkv", "/mpeg/3", "")));
        assert!(!info.matches(&OutputKey::new(&protocol, "file:///b.mkv", "/mpeg/3", "")));
        assert!(info.source.upgrade().is_some());

        drop(source);
        assert!(info.source.upgrade().is_none());
    }

    #[test]
    fn test_enum_strings() {
        assert_eq!(Direction::Output.as_str(), "Output");
        assert_eq!(ConnectionStatus::Ok.to_string(), "OK");
        assert_eq!(
            ConnectionStatus::VALUES,
            [
                ConnectionStatus::Ok.as_str(),
                ConnectionStatus::ContentFormatMismatch.as_str(),
                ConnectionStatus::InsufficientBandwidth.as_str(),
                ConnectionStatus::UnreliableChannel.as_str(),
                ConnectionStatus::Unknown.as_str(),
            ]
        );
    }
}
