use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::stringy_u64;

pub const MSG_SEND_IBC_POST: &str = "/planet.blog.MsgSendIbcPost";
pub const MSG_SEND_IBC_UPDATE_POST: &str = "/planet.blog.MsgSendIbcUpdatePost";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MsgError {
    #[error("invalid creator address")]
    InvalidCreator,
    #[error("invalid packet port")]
    InvalidPort,
    #[error("invalid packet channel")]
    InvalidChannel,
    #[error("invalid packet timeout")]
    InvalidTimeout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgSendIbcPost {
    pub creator: String,
    pub port: String,
    #[serde(rename = "channelID")]
    pub channel_id: String,
    #[serde(rename = "timeoutTimestamp", with = "stringy_u64")]
    pub timeout_timestamp: u64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgSendIbcUpdatePost {
    pub creator: String,
    pub port: String,
    #[serde(rename = "channelID")]
    pub channel_id: String,
    #[serde(rename = "timeoutTimestamp", with = "stringy_u64")]
    pub timeout_timestamp: u64,
    #[serde(rename = "postID")]
    pub post_id: String,
    pub title: String,
    pub content: String,
}

impl MsgSendIbcPost {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        validate_packet_fields(
            &self.creator,
            &self.port,
            &self.channel_id,
            self.timeout_timestamp,
        )
    }
}

impl MsgSendIbcUpdatePost {
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        validate_packet_fields(
            &self.creator,
            &self.port,
            &self.channel_id,
            self.timeout_timestamp,
        )
    }
}

fn validate_packet_fields(
    creator: &str,
    port: &str,
    channel_id: &str,
    timeout_timestamp: u64,
) -> Result<(), MsgError> {
    if creator.trim().is_empty() {
        return Err(MsgError::InvalidCreator);
    }
    if port.is_empty() {
        return Err(MsgError::InvalidPort);
    }
    if channel_id.is_empty() {
        return Err(MsgError::InvalidChannel);
    }
    if timeout_timestamp == 0 {
        return Err(MsgError::InvalidTimeout);
    }
    Ok(())
}

/// Codec handle for one registered message type. The template carries the
/// JSON shape of a default instance; actual protobuf encode/decode lives
/// in the external codec.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub type_url: &'static str,
    template: fn() -> Value,
}

impl MessageDescriptor {
    pub fn template(&self) -> Value {
        (self.template)()
    }
}

/// Immutable registry of the module's transaction message types, built
/// once at store initialization.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<MessageDescriptor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: vec![
                MessageDescriptor {
                    type_url: MSG_SEND_IBC_POST,
                    template: || {
                        serde_json::to_value(MsgSendIbcPost::default()).unwrap_or(Value::Null)
                    },
                },
                MessageDescriptor {
                    type_url: MSG_SEND_IBC_UPDATE_POST,
                    template: || {
                        serde_json::to_value(MsgSendIbcUpdatePost::default()).unwrap_or(Value::Null)
                    },
                },
            ],
        }
    }

    pub fn resolve(&self, type_url: &str) -> Option<&MessageDescriptor> {
        self.entries.iter().find(|e| e.type_url == type_url)
    }

    pub fn entries(&self) -> &[MessageDescriptor] {
        &self.entries
    }

    pub fn type_urls(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.type_url)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn type_urls_are_unique() {
        let registry = Registry::new();
        let urls: HashSet<&str> = registry.type_urls().collect();
        assert_eq!(urls.len(), registry.entries().len());
    }

    #[test]
    fn resolves_registered_types() {
        let registry = Registry::new();
        assert!(registry.resolve(MSG_SEND_IBC_POST).is_some());
        assert!(registry.resolve(MSG_SEND_IBC_UPDATE_POST).is_some());
        assert!(registry.resolve("/planet.blog.MsgUnknown").is_none());
    }

    #[test]
    fn template_exposes_message_shape() {
        let registry = Registry::new();
        let descriptor = registry.resolve(MSG_SEND_IBC_UPDATE_POST).unwrap();
        let template = descriptor.template();
        assert!(template.get("postID").is_some());
        assert!(template.get("channelID").is_some());
    }

    #[test]
    fn validate_basic_rejects_bad_fields() {
        let mut msg = MsgSendIbcUpdatePost {
            creator: "cosmos1abc".into(),
            port: "blog".into(),
            channel_id: "channel-0".into(),
            timeout_timestamp: 100,
            ..Default::default()
        };
        assert_eq!(msg.validate_basic(), Ok(()));

        msg.timeout_timestamp = 0;
        assert_eq!(msg.validate_basic(), Err(MsgError::InvalidTimeout));

        msg.timeout_timestamp = 100;
        msg.channel_id.clear();
        assert_eq!(msg.validate_basic(), Err(MsgError::InvalidChannel));

        msg.channel_id = "channel-0".into();
        msg.creator = "  ".into();
        assert_eq!(msg.validate_basic(), Err(MsgError::InvalidCreator));
    }
}
