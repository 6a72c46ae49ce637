use std::fmt;

use crate::{
    codec::{Codec, Reader},
    error::Error,
    tls::msgs::{
        alert::AlertMessagePayload,
        base::Payload,
        ccs::ChangeCipherSpecPayload,
        enums::{AlertDescription, AlertLevel, ContentType, HandshakeType, ProtocolVersion},
        handshake::HandshakeMessagePayload,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePayload {
    Alert(AlertMessagePayload),
    Handshake(HandshakeMessagePayload),
    ChangeCipherSpec(ChangeCipherSpecPayload),
    ApplicationData(Payload),
}

impl MessagePayload {
    pub fn encode(&self, bytes: &mut Vec<u8>) {
        match *self {
            Self::Alert(ref x) => x.encode(bytes),
            Self::Handshake(ref x) => x.encode(bytes),
            Self::ChangeCipherSpec(ref x) => x.encode(bytes),
            Self::ApplicationData(ref x) => x.encode(bytes),
        }
    }

    pub fn new(typ: ContentType, payload: Payload) -> Result<Self, Error> {
        let mut r = Reader::init(&payload.0);
        let parsed = match typ {
            ContentType::ApplicationData => return Ok(Self::ApplicationData(payload)),
            ContentType::Alert => AlertMessagePayload::read(&mut r).map(MessagePayload::Alert),
            ContentType::Handshake => {
                HandshakeMessagePayload::read(&mut r).map(MessagePayload::Handshake)
            }
            ContentType::ChangeCipherSpec => {
                ChangeCipherSpecPayload::read(&mut r).map(MessagePayload::ChangeCipherSpec)
            }
            _ => None,
        };

        parsed
            .filter(|_| !r.any_left())
            .ok_or_else(|| Error::corrupt_message(typ))
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Alert(_) => ContentType::Alert,
            Self::Handshake(_) => ContentType::Handshake,
            Self::ChangeCipherSpec(_) => ContentType::ChangeCipherSpec,
            Self::ApplicationData(_) => ContentType::ApplicationData,
        }
    }
}

/// A TLS frame, named TLSPlaintext in the standard.
///
/// This type owns all memory for its interior parts. It is used to read/write
/// from/to I/O buffers as well as for encryption/decryption. It can be
/// converted into a `Message` by decoding the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct OpaqueMessage {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: Payload,
}

impl fmt::Debug for OpaqueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueMessage")
            .field("typ", &self.typ)
            .field("version", &self.version)
            .field("len", &self.payload.0.len())
            .finish()
    }
}

impl Codec for OpaqueMessage {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        self.version.encode(bytes);
        (self.payload.0.len() as u16).encode(bytes);
        self.payload.encode(bytes);
    }

    fn read(reader: &mut Reader) -> Option<Self> {
        Self::read(reader).ok()
    }
}

impl OpaqueMessage {
    /// `MessageError` allows callers to distinguish between valid prefixes (might
    /// become valid if we read more data) and invalid data.
    pub fn read(r: &mut Reader) -> Result<Self, MessageError> {
        let typ = ContentType::read(r).ok_or(MessageError::TooShortForHeader)?;
        let version = ProtocolVersion::read(r).ok_or(MessageError::TooShortForHeader)?;
        let len = u16::read(r).ok_or(MessageError::TooShortForHeader)?;

        // Reject oversize messages
        if len >= Self::MAX_PAYLOAD {
            return Err(MessageError::IllegalLength);
        }

        // Accept only versions 0x03XX for any XX.
        match version {
            ProtocolVersion::Unknown(ref v) if (v & 0xff00) != 0x0300 => {
                return Err(MessageError::IllegalProtocolVersion);
            }
            _ => {}
        };

        let mut sub = r.sub(len as usize).ok_or(MessageError::TooShortForLength)?;
        let payload = Payload::read(&mut sub);

        Ok(Self {
            typ,
            version,
            payload,
        })
    }

    /// Force conversion into a plaintext message.
    ///
    /// This should only be used for messages that are known to be in plaintext. Otherwise, the
    /// `OpaqueMessage` should be decrypted into a `PlainMessage` first.
    pub fn into_plain_message(self) -> PlainMessage {
        PlainMessage {
            version: self.version,
            typ: self.typ,
            payload: self.payload,
        }
    }

    /// This is the maximum on-the-wire size of a TLSCiphertext.
    /// That's 2^14 payload bytes, a header, and a 2KB allowance
    /// for ciphertext overheads.
    const MAX_PAYLOAD: u16 = 16384 + 2048;

    /// Content type, version and size.
    pub const HEADER_SIZE: u16 = 1 + 2 + 2;

    /// Maximum on-wire message size.
    pub const MAX_WIRE_SIZE: usize = (Self::MAX_PAYLOAD + Self::HEADER_SIZE) as usize;
}

impl From<Message> for PlainMessage {
    fn from(msg: Message) -> Self {
        let typ = msg.payload.content_type();
        let payload = match msg.payload {
            MessagePayload::ApplicationData(payload) => payload,
            _ => {
                let mut buf = Vec::new();
                msg.payload.encode(&mut buf);
                Payload(buf)
            }
        };

        Self {
            typ,
            version: msg.version,
            payload,
        }
    }
}

/// A decrypted TLS frame
///
/// This type owns all memory for its interior parts. It can be decrypted from an
/// OpaqueMessage or encrypted into an OpaqueMessage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlainMessage {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: Payload,
}

/// Largest plaintext fragment a single record may carry, 2^14 bytes.
pub const MAX_FRAGMENT_LEN: usize = 16384;

impl PlainMessage {
    pub fn into_unencrypted_opaque(self) -> OpaqueMessage {
        OpaqueMessage {
            version: self.version,
            typ: self.typ,
            payload: self.payload,
        }
    }

    /// Splits the payload into records of at most `max_frag` bytes each.
    ///
    /// An empty payload still yields one (empty) record.
    pub fn fragments(self, max_frag: usize) -> Vec<PlainMessage> {
        if self.payload.0.len() <= max_frag {
            return vec![self];
        }

        let (typ, version) = (self.typ, self.version);
        self.payload
            .0
            .chunks(max_frag.max(1))
            .map(|chunk| PlainMessage {
                typ,
                version,
                payload: Payload::new(chunk.to_vec()),
            })
            .collect()
    }
}

/// A message with decoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: ProtocolVersion,
    pub payload: MessagePayload,
}

impl Message {
    pub fn is_handshake_type(&self, hstyp: HandshakeType) -> bool {
        // Bit of a layering violation, but OK.
        if let MessagePayload::Handshake(ref hsp) = self.payload {
            hsp.typ == hstyp
        } else {
            false
        }
    }

    pub fn build_alert(level: AlertLevel, desc: AlertDescription) -> Self {
        Self {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Alert(AlertMessagePayload {
                level,
                description: desc,
            }),
        }
    }

    pub fn build_handshake(payload: HandshakeMessagePayload) -> Self {
        Self {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::Handshake(payload),
        }
    }

    pub fn build_change_cipher_spec() -> Self {
        Self {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload {}),
        }
    }

    pub fn build_application_data(data: Vec<u8>) -> Self {
        Self {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::ApplicationData(Payload::new(data)),
        }
    }

    pub fn alert(&self) -> Option<&AlertMessagePayload> {
        match self.payload {
            MessagePayload::Alert(ref alert) => Some(alert),
            _ => None,
        }
    }

    pub fn handshake(&self) -> Option<&HandshakeMessagePayload> {
        match self.payload {
            MessagePayload::Handshake(ref hs) => Some(hs),
            _ => None,
        }
    }

    /// The plaintext serialization of this message as a single record.
    pub fn create_opaque(&self) -> OpaqueMessage {
        PlainMessage::from(self.clone()).into_unencrypted_opaque()
    }
}

/// Parses a plaintext message into a well-typed [`Message`].
///
/// A [`PlainMessage`] must contain plaintext content. Encrypted content should be stored in an
/// [`OpaqueMessage`] and decrypted before being stored into a [`PlainMessage`].
impl TryFrom<PlainMessage> for Message {
    type Error = Error;

    fn try_from(plain: PlainMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            version: plain.version,
            payload: MessagePayload::new(plain.typ, plain.payload)?,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum MessageError {
    TooShortForHeader,
    TooShortForLength,
    IllegalLength,
    IllegalProtocolVersion,
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn alert_record_parses_into_message() {
        let bytes = [0x15, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28];
        let opaque = OpaqueMessage::read(&mut Reader::init(&bytes)).unwrap();
        let msg = Message::try_from(opaque.into_plain_message()).unwrap();

        let alert = msg.alert().unwrap();
        assert_eq!(alert.level, AlertLevel::Fatal);
        assert_eq!(alert.description, AlertDescription::HandshakeFailure);
    }

    #[test]
    fn partial_header_is_distinguished_from_garbage() {
        assert_eq!(
            OpaqueMessage::read(&mut Reader::init(&[0x16, 0x03])),
            Err(MessageError::TooShortForHeader)
        );
        assert_eq!(
            OpaqueMessage::read(&mut Reader::init(&[0x16, 0x03, 0x03, 0x00, 0x05, 0x01])),
            Err(MessageError::TooShortForLength)
        );
        assert_eq!(
            OpaqueMessage::read(&mut Reader::init(&[0x16, 0x7f, 0x03, 0x00, 0x01, 0x01])),
            Err(MessageError::IllegalProtocolVersion)
        );
    }

    #[test]
    fn change_cipher_spec_record_is_a_single_byte() {
        let opaque = Message::build_change_cipher_spec().create_opaque();
        assert_eq!(opaque.get_encoding(), [0x14, 0x03, 0x03, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn oversized_payload_is_split_at_the_fragment_limit() {
        let plain = PlainMessage {
            typ: ContentType::Handshake,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload::new(vec![0xaa; 2 * MAX_FRAGMENT_LEN + 100]),
        };

        let fragments = plain.fragments(MAX_FRAGMENT_LEN);
        let lens: Vec<usize> = fragments.iter().map(|f| f.payload.0.len()).collect();
        assert_eq!(lens, [MAX_FRAGMENT_LEN, MAX_FRAGMENT_LEN, 100]);
        assert!(fragments.iter().all(|f| f.typ == ContentType::Handshake));
    }

    #[test]
    fn empty_payload_is_one_record() {
        let plain = PlainMessage {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload::new(Vec::new()),
        };
        assert_eq!(plain.fragments(MAX_FRAGMENT_LEN).len(), 1);
    }

    #[test]
    fn trailing_bytes_in_alert_are_rejected() {
        let plain = PlainMessage {
            typ: ContentType::Alert,
            version: ProtocolVersion::TLSv1_2,
            payload: Payload::new(vec![1, 0, 0]),
        };
        assert!(Message::try_from(plain).is_err());
    }
}
