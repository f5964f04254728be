//! SSH message-type registry (RFC 4253 Section 12, RFC 4252, RFC 4254).
//!
//! The packet layer never interprets payloads. It only looks at the first
//! payload byte to label packets in logs, so this module is a lookup table
//! from type number to name.
//!
//! # Example
//!
//! ```rust
//! use wirelay_proto::ssh::message::{describe, MessageType};
//!
//! assert_eq!(MessageType::from_u8(20), Some(MessageType::KexInit));
//! assert_eq!(describe(21), "SSH_MSG_NEWKEYS");
//! assert_eq!(describe(200), "$200");
//! ```

/// SSH message types known to the diagnostics layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Connection teardown.
    Disconnect = 1,
    /// No-op; also used for keep-alive.
    Ignore = 2,
    /// Reply to an unknown message.
    Unimplemented = 3,
    /// Debug text.
    Debug = 4,
    /// Service request.
    ServiceRequest = 5,
    /// Service accept.
    ServiceAccept = 6,
    /// Algorithm negotiation.
    KexInit = 20,
    /// Switch to the freshly negotiated keys.
    NewKeys = 21,
    /// DH / ECDH init.
    KexdhInit = 30,
    /// DH / ECDH reply.
    KexdhReply = 31,
    /// Group-exchange request.
    KexGexRequest = 34,
    /// User authentication request.
    UserauthRequest = 50,
    /// User authentication failure.
    UserauthFailure = 51,
    /// User authentication success.
    UserauthSuccess = 52,
    /// User authentication banner.
    UserauthBanner = 53,
    /// Public key accepted.
    UserauthPkOk = 60,
    /// Global request.
    GlobalRequest = 80,
    /// Global request success.
    RequestSuccess = 81,
    /// Global request failure.
    RequestFailure = 82,
    /// Channel open.
    ChannelOpen = 90,
    /// Channel open confirmation.
    ChannelOpenConfirmation = 91,
    /// Channel open failure.
    ChannelOpenFailure = 92,
    /// Channel window adjust.
    ChannelWindowAdjust = 93,
    /// Channel data.
    ChannelData = 94,
    /// Channel extended data.
    ChannelExtendedData = 95,
    /// Channel EOF.
    ChannelEof = 96,
    /// Channel close.
    ChannelClose = 97,
    /// Channel request.
    ChannelRequest = 98,
    /// Channel request success.
    ChannelSuccess = 99,
    /// Channel request failure.
    ChannelFailure = 100,
}

const REGISTRY: &[(MessageType, &str)] = &[
    (MessageType::Disconnect, "SSH_MSG_DISCONNECT"),
    (MessageType::Ignore, "SSH_MSG_IGNORE"),
    (MessageType::Unimplemented, "SSH_MSG_UNIMPLEMENTED"),
    (MessageType::Debug, "SSH_MSG_DEBUG"),
    (MessageType::ServiceRequest, "SSH_MSG_SERVICE_REQUEST"),
    (MessageType::ServiceAccept, "SSH_MSG_SERVICE_ACCEPT"),
    (MessageType::KexInit, "SSH_MSG_KEXINIT"),
    (MessageType::NewKeys, "SSH_MSG_NEWKEYS"),
    (MessageType::KexdhInit, "SSH_MSG_KEXDH_INIT"),
    (MessageType::KexdhReply, "SSH_MSG_KEXDH_REPLY"),
    (MessageType::KexGexRequest, "SSH_MSG_KEX_DH_GEX_REQUEST"),
    (MessageType::UserauthRequest, "SSH_MSG_USERAUTH_REQUEST"),
    (MessageType::UserauthFailure, "SSH_MSG_USERAUTH_FAILURE"),
    (MessageType::UserauthSuccess, "SSH_MSG_USERAUTH_SUCCESS"),
    (MessageType::UserauthBanner, "SSH_MSG_USERAUTH_BANNER"),
    (MessageType::UserauthPkOk, "SSH_MSG_USERAUTH_PK_OK"),
    (MessageType::GlobalRequest, "SSH_MSG_GLOBAL_REQUEST"),
    (MessageType::RequestSuccess, "SSH_MSG_REQUEST_SUCCESS"),
    (MessageType::RequestFailure, "SSH_MSG_REQUEST_FAILURE"),
    (MessageType::ChannelOpen, "SSH_MSG_CHANNEL_OPEN"),
    (MessageType::ChannelOpenConfirmation, "SSH_MSG_CHANNEL_OPEN_CONFIRMATION"),
    (MessageType::ChannelOpenFailure, "SSH_MSG_CHANNEL_OPEN_FAILURE"),
    (MessageType::ChannelWindowAdjust, "SSH_MSG_CHANNEL_WINDOW_ADJUST"),
    (MessageType::ChannelData, "SSH_MSG_CHANNEL_DATA"),
    (MessageType::ChannelExtendedData, "SSH_MSG_CHANNEL_EXTENDED_DATA"),
    (MessageType::ChannelEof, "SSH_MSG_CHANNEL_EOF"),
    (MessageType::ChannelClose, "SSH_MSG_CHANNEL_CLOSE"),
    (MessageType::ChannelRequest, "SSH_MSG_CHANNEL_REQUEST"),
    (MessageType::ChannelSuccess, "SSH_MSG_CHANNEL_SUCCESS"),
    (MessageType::ChannelFailure, "SSH_MSG_CHANNEL_FAILURE"),
];

impl MessageType {
    /// Looks up a message type by its wire number.
    pub fn from_u8(byte: u8) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(ty, _)| *ty as u8 == byte)
            .map(|(ty, _)| *ty)
    }

    /// Returns the RFC name of this message type.
    pub fn name(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(ty, _)| ty == self)
            .map(|(_, name)| *name)
            .unwrap_or("SSH_MSG_UNKNOWN")
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), *self as u8)
    }
}

/// Describes a message-type byte for logging.
///
/// Unknown numbers are rendered as `$<n>` so that the log line still says
/// what arrived on the wire.
pub fn describe(byte: u8) -> String {
    match MessageType::from_u8(byte) {
        Some(ty) => ty.name().to_string(),
        None => format!("${}", byte),
    }
}

/// Describes the first byte of a payload, or `<empty>` for an empty payload.
pub fn describe_payload(payload: &[u8]) -> String {
    payload
        .first()
        .map(|b| describe(*b))
        .unwrap_or_else(|| "<empty>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_variant() {
        for (ty, name) in REGISTRY {
            assert_eq!(MessageType::from_u8(*ty as u8), Some(*ty));
            assert_eq!(ty.name(), *name);
        }
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(MessageType::from_u8(255), None);
        assert_eq!(describe(255), "$255");
    }

    #[test]
    fn test_describe_payload() {
        assert_eq!(describe_payload(&[2, 0, 0, 0, 0]), "SSH_MSG_IGNORE");
        assert_eq!(describe_payload(&[]), "<empty>");
    }

    #[test]
    fn test_display() {
        assert_eq!(MessageType::NewKeys.to_string(), "SSH_MSG_NEWKEYS(21)");
    }
}
