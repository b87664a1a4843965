//! Client builder

use std::sync::Arc;

use peerlink_session_core::{CallTimeouts, RtcPlatform};

use super::{Client, ClientConfig};
use crate::channel::ClientChannel;
use crate::endpoint::PresenceResolver;
use crate::error::{ClientError, ClientResult};

/// Builder for creating a peerlink client
pub struct ClientBuilder {
    config: ClientConfig,
    channel: Option<Arc<dyn ClientChannel>>,
    platform: Option<Arc<dyn RtcPlatform>>,
    resolver: Option<PresenceResolver>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            channel: None,
            platform: None,
            resolver: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.app_id = Some(app_id.into());
        self
    }

    pub fn max_sessions(mut self, max_sessions: usize) -> Self {
        self.config.max_sessions = max_sessions;
        self
    }

    pub fn timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.config.session.timeouts = timeouts;
        self
    }

    pub fn force_turn(mut self, force_turn: bool) -> Self {
        self.config.session.force_turn = force_turn;
        self
    }

    /// Signaling transport
    pub fn channel(mut self, channel: Arc<dyn ClientChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Platform WebRTC stack
    pub fn platform(mut self, platform: Arc<dyn RtcPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the default presence priority order
    pub fn presence_resolver(mut self, resolver: PresenceResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> ClientResult<Arc<Client>> {
        let channel = self.channel.ok_or_else(|| ClientError::MissingConfiguration {
            field: "channel".into(),
        })?;
        let platform = self.platform.ok_or_else(|| ClientError::MissingConfiguration {
            field: "platform".into(),
        })?;
        Client::new(self.config, channel, platform, self.resolver)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
