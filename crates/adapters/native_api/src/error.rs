//! Native API adapter error types.

use homelink_app::ports::ApiConnectionError;

/// Errors specific to the native API client.
#[derive(Debug, thiserror::Error)]
pub enum NativeApiError {
    /// The host name lookup failed.
    #[error("error resolving {host}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The host name resolved to nothing.
    #[error("no address found for {host}")]
    NoAddress { host: String },

    /// The TCP connection could not be opened.
    #[error("error connecting to {address}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The device did not answer in time.
    #[error("timeout while {0}")]
    Timeout(&'static str),

    /// The device rejected the password.
    #[error("invalid password")]
    InvalidPassword,

    /// The first byte of a frame was not the plaintext preamble.
    #[error("unexpected preamble {0:#04x}")]
    Preamble(u8),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    /// A payload could not be decoded.
    #[error("malformed message: {0}")]
    Decode(&'static str),

    /// Socket failure after connecting.
    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl NativeApiError {
    /// Convert into the [`ApiConnectionError`] the app layer understands.
    #[must_use]
    pub fn into_port_error(self) -> ApiConnectionError {
        match self {
            Self::Resolve { host, source } => ApiConnectionError::Resolve {
                host,
                reason: source.to_string(),
            },
            Self::NoAddress { host } => ApiConnectionError::Resolve {
                host,
                reason: "no address found".to_string(),
            },
            Self::Connect { address, source } => ApiConnectionError::Connect {
                address,
                reason: source.to_string(),
            },
            Self::Timeout(_) => ApiConnectionError::Timeout,
            Self::InvalidPassword => ApiConnectionError::InvalidPassword,
            Self::Io(err) => ApiConnectionError::Io(err.to_string()),
            other @ (Self::Preamble(_) | Self::FrameTooLarge(_) | Self::Decode(_)) => {
                ApiConnectionError::Protocol(other.to_string())
            }
        }
    }
}

impl From<NativeApiError> for ApiConnectionError {
    fn from(err: NativeApiError) -> Self {
        err.into_port_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_resolve_failures_to_resolve() {
        let err = NativeApiError::NoAddress {
            host: "test.local".to_string(),
        };
        let port: ApiConnectionError = err.into();
        assert!(port.is_resolve());
    }

    #[test]
    fn should_map_decoding_failures_to_protocol() {
        let port: ApiConnectionError = NativeApiError::Preamble(0x01).into();
        assert_eq!(
            port,
            ApiConnectionError::Protocol("unexpected preamble 0x01".to_string())
        );
    }

    #[test]
    fn should_map_refused_connection_to_connect() {
        let err = NativeApiError::Connect {
            address: "127.0.0.1:6053".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let port: ApiConnectionError = err.into();
        assert!(matches!(port, ApiConnectionError::Connect { .. }));
        assert!(!port.is_resolve());
    }
}
