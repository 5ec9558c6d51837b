//! Error types for the mug engine.

use crate::domain::attributes::Attribute;
use crate::domain::capabilities::DeviceType;
use thiserror::Error;

/// Errors reported by the external BLE transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("device is not connected")]
    NotConnected,
    #[error("pairing is not supported by this backend")]
    PairingUnsupported,
    #[error("operation timed out")]
    Timeout,
    #[error("{0}")]
    Backend(String),
}

/// Errors surfaced by [`EmberMug`](crate::EmberMug).
#[derive(Debug, Error)]
pub enum MugError {
    #[error("failed to connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("no active connection to the device")]
    NotConnected,

    #[error("failed to read {attribute}: {source}")]
    Read {
        attribute: Attribute,
        #[source]
        source: TransportError,
    },

    #[error("failed to write {attribute}: {source}")]
    Write {
        attribute: Attribute,
        #[source]
        source: TransportError,
    },

    #[error("could not decode {attribute}: {reason}")]
    Decode { attribute: Attribute, reason: String },

    #[error("the {device_type} does not have the {attribute} attribute")]
    Unsupported {
        device_type: DeviceType,
        attribute: Attribute,
    },

    #[error("invalid {attribute}: {reason}")]
    Validation { attribute: Attribute, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl MugError {
    pub(crate) fn decode(attribute: Attribute, reason: impl Into<String>) -> Self {
        Self::Decode {
            attribute,
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(attribute: Attribute, reason: impl Into<String>) -> Self {
        Self::Validation {
            attribute,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MugError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_device_type() {
        let err = MugError::Unsupported {
            device_type: DeviceType::Cup,
            attribute: Attribute::Name,
        };
        assert_eq!(err.to_string(), "the cup does not have the name attribute");
    }

    #[test]
    fn test_write_error_carries_transport_message() {
        let err = MugError::Write {
            attribute: Attribute::LedColour,
            source: TransportError::Backend("GATT error 0x0e".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to write led_colour: GATT error 0x0e"
        );
    }
}
