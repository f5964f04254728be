//! Error types for Wirelay

use std::fmt;

/// Unified error type for all Wirelay operations
#[derive(Debug)]
pub enum WirelayError {
    /// I/O error on the underlying stream
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Protocol error (malformed or oversized message)
    Protocol(String),

    /// Packet framing error (length/block-size mismatch, bad padding)
    Framing(String),

    /// Cipher or MAC engine failure
    Crypto(String),

    /// MAC mismatch on an inbound packet
    Authentication(String),

    /// Peer kept sending after a rekey was requested
    RekeyIgnored {
        /// Packets received since the rekey request
        packets: u32,
    },

    /// Deadline expired
    Timeout(String),

    /// Connection already closed
    Closed,

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl WirelayError {
    /// Returns true if the connection must be torn down after this error.
    ///
    /// Only an expired deadline leaves the stream in a usable state; every
    /// other failure means the packet stream is out of sync or untrusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WirelayError::Timeout(_))
    }
}

impl fmt::Display for WirelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WirelayError::Io(e) => write!(f, "IO error: {}", e),
            WirelayError::Config(msg) => write!(f, "Configuration error: {}", msg),
            WirelayError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            WirelayError::Framing(msg) => write!(f, "Framing error: {}", msg),
            WirelayError::Crypto(msg) => write!(f, "Crypto error: {}", msg),
            WirelayError::Authentication(msg) => write!(f, "Authentication error: {}", msg),
            WirelayError::RekeyIgnored { packets } => write!(
                f,
                "Rekey requests are being ignored ({} packets since request)",
                packets
            ),
            WirelayError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            WirelayError::Closed => write!(f, "Connection closed"),
            WirelayError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for WirelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WirelayError::Io(e) => Some(e),
            WirelayError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WirelayError {
    fn from(err: std::io::Error) -> Self {
        WirelayError::Io(err)
    }
}

/// Result type for Wirelay operations
pub type WirelayResult<T> = Result<T, WirelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = WirelayError::Framing("Invalid packet blocking".to_string());
        assert_eq!(err.to_string(), "Framing error: Invalid packet blocking");

        let err = WirelayError::RekeyIgnored { packets: 20 };
        assert_eq!(
            err.to_string(),
            "Rekey requests are being ignored (20 packets since request)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: WirelayError = io_err.into();
        assert!(matches!(err, WirelayError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_is_fatal() {
        assert!(!WirelayError::Timeout("banner".to_string()).is_fatal());
        assert!(WirelayError::Authentication("mac mismatch".to_string()).is_fatal());
        assert!(WirelayError::Closed.is_fatal());
        assert!(WirelayError::RekeyIgnored { packets: 20 }.is_fatal());
    }

    #[test]
    fn test_result_type() {
        fn example() -> WirelayResult<i32> {
            Ok(42)
        }

        assert_eq!(example().unwrap(), 42);
    }
}
