use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sub-channel carrying application messages
pub const MAIN_SUB_CHANNEL: &str = "main";
/// Sub-channel carrying key-exchange announcements
pub const KEY_EXCHANGE_SUB_CHANNEL: &str = "keyExchange";
/// How long `init` waits for the own key to become announceable
pub const DEFAULT_KEY_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a channel's traffic lives on the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelIdentity {
    /// Caller supplied, or assigned by the broker on create
    pub tunnel_id: String,
    /// Partition of the tunnel, e.g. "main" or "keyExchange"
    pub sub_channel: String,
}

impl TunnelIdentity {
    pub fn new(tunnel_id: impl Into<String>, sub_channel: impl Into<String>) -> Self {
        Self {
            tunnel_id: tunnel_id.into(),
            sub_channel: sub_channel.into(),
        }
    }

    /// The same tunnel on a different sub-channel
    pub fn with_sub_channel(&self, sub_channel: impl Into<String>) -> Self {
        Self::new(self.tunnel_id.clone(), sub_channel)
    }
}

impl fmt::Display for TunnelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tunnel_id, self.sub_channel)
    }
}

/// Behaviour switches of a tunnel channel, all off by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelConfig {
    /// Encrypt every message per recipient and run the key exchange
    #[serde(default)]
    pub encryption: bool,
    /// Gzip payloads before they go on the wire
    #[serde(default)]
    pub compression: bool,
    /// Let the broker assign the tunnel id on create
    #[serde(default)]
    pub random: bool,
    /// This participant opened the tunnel and does not announce its key
    /// until a peer shows up
    #[serde(default)]
    pub first_user: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_defaults_all_off() {
        let config: TunnelConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TunnelConfig::default());
        assert!(!config.encryption && !config.compression && !config.random && !config.first_user);

        let config: TunnelConfig =
            serde_json::from_str(r#"{"encryption":true,"firstUser":true}"#).unwrap();
        assert!(config.encryption && config.first_user);
    }

    #[test]
    fn test_identity_display_and_sub_channel() {
        let main = TunnelIdentity::new("room1", MAIN_SUB_CHANNEL);
        let keys = main.with_sub_channel(KEY_EXCHANGE_SUB_CHANNEL);
        assert_eq!(main.to_string(), "room1/main");
        assert_eq!(keys.to_string(), "room1/keyExchange");
        assert_ne!(main, keys);
    }
}
