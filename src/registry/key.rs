//! Output connection key
//!
//! Two requests may share one running source only if they ask for exactly
//! the same thing: same granted protocol, same resource, same serving
//! endpoint and same transcode options.

use crate::protocol::Protocol;

/// De-duplication key of an output connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey {
    /// Full (non-brief) protocol identity string
    pub protocol: String,
    /// Resource identifier
    pub mrl: String,
    /// Serving endpoint address
    pub endpoint: String,
    /// Transcode options
    pub opt: String,
}

impl OutputKey {
    /// Create a new output key
    pub fn new(
        protocol: &Protocol,
        mrl: impl Into<String>,
        endpoint: impl Into<String>,
        opt: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.to_string(),
            mrl: mrl.into(),
            endpoint: endpoint.into(),
            opt: opt.into(),
        }
    }
}

impl std::fmt::Display for OutputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] via {}", self.mrl, self.protocol, self.endpoint)?;
        if !self.opt.is_empty() {
            write!(f, " ({})", self.opt)?;
        }
        Ok(())
    }
}
