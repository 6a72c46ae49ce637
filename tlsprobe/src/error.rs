use std::{fmt, fmt::Formatter, io};

use crate::tls::msgs::{
    alert::AlertMessagePayload, enums::ContentType, message::MessageError,
};

/// What the peer did (or failed to do) while a flight was in progress.
///
/// Carries the alert if one arrived, the bytes we had sent in the exchange
/// and whatever the peer returned before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFailure {
    pub alert: Option<AlertMessagePayload>,
    pub reason: String,
    pub sent: Vec<u8>,
    pub received: Vec<u8>,
}

impl ProtocolFailure {
    pub fn alert(alert: AlertMessagePayload, sent: Vec<u8>, received: Vec<u8>) -> Self {
        Self {
            alert: Some(alert),
            reason: format!("peer sent {:?} {:?}", alert.level, alert.description),
            sent,
            received,
        }
    }

    pub fn transport(err: &io::Error, sent: Vec<u8>, received: Vec<u8>) -> Self {
        Self {
            alert: None,
            reason: err.to_string(),
            sent,
            received,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The socket could not be opened or configured.
    Connection(String),
    /// A fatal alert arrived or the socket failed during an exchange.
    Protocol(ProtocolFailure),
    /// An expected message or field is missing from the peer's response.
    Structure(String),
    /// A record could not be decoded as its content type.
    CorruptMessage(ContentType),
    /// Key exchange, key derivation or record protection failed.
    Crypto(String),
    /// The server certificate could not be parsed or lacks an attribute.
    Certificate(String),
    /// A configuration file or value is invalid.
    Config(String),
}

impl Error {
    pub fn corrupt_message(typ: ContentType) -> Self {
        Error::CorruptMessage(typ)
    }

    pub fn structure(reason: impl Into<String>) -> Self {
        Error::Structure(reason.into())
    }

    /// The alert that ended the exchange, if the peer sent one.
    pub fn alert(&self) -> Option<&AlertMessagePayload> {
        match self {
            Error::Protocol(failure) => failure.alert.as_ref(),
            _ => None,
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(err) => write!(f, "error while connecting: {}", err),
            Error::Protocol(failure) => write!(
                f,
                "protocol failure: {} (sent {} bytes, received {} bytes)",
                failure.reason,
                failure.sent.len(),
                failure.received.len()
            ),
            Error::Structure(err) => write!(f, "unexpected response: {}", err),
            Error::CorruptMessage(typ) => write!(f, "received corrupt message of type {:?}", typ),
            Error::Crypto(err) => write!(f, "error in cryptographic operation: {}", err),
            Error::Certificate(err) => write!(f, "error inspecting certificate: {}", err),
            Error::Config(err) => write!(f, "invalid configuration: {}", err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Connection(err.to_string())
    }
}

impl From<ring::error::Unspecified> for Error {
    fn from(err: ring::error::Unspecified) -> Self {
        Error::Crypto(err.to_string())
    }
}

impl From<MessageError> for Error {
    fn from(err: MessageError) -> Self {
        Error::Structure(format!("{:?}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Config(err.to_string())
    }
}
