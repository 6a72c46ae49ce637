use std::fmt;

use crate::{
    codec::{self, encode_vec_u16, encode_vec_u8, read_vec_u16, read_vec_u8, Codec, Reader},
    tls::{
        key::Certificate,
        msgs::{
            base::{Payload, PayloadU16, PayloadU8},
            enums::{
                CertChainType, CertificateStatusType, CipherSuite, Compression, ECCurveType,
                ECPointFormat, ExtensionType, HandshakeType, HeartbeatMode, NamedGroup,
                ProtocolVersion, ServerNameType, SignatureScheme,
            },
        },
    },
};

/// Largest certificate chain accepted from a peer.
const MAX_CERTIFICATE_CHAIN: usize = 0x1_0000;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Random(pub [u8; 32]);

impl fmt::Debug for Random {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Random").field(&hex::encode(self.0)).finish()
    }
}

impl Codec for Random {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let bytes = r.take(32)?;
        let mut opaque = [0; 32];
        opaque.clone_from_slice(bytes);

        Some(Self(opaque))
    }
}

impl Random {
    pub fn write_slice(&self, bytes: &mut [u8]) {
        let buf = self.get_encoding();
        bytes.copy_from_slice(&buf);
    }
}

impl From<[u8; 32]> for Random {
    #[inline]
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A session id of any length up to 255 bytes. RFC 5246 caps it at 32, but
/// longer values are representable so they can be sent on purpose.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SessionID(pub Vec<u8>);

impl fmt::Debug for SessionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("SessionID").field(&hex::encode(&self.0)).finish()
    }
}

impl Codec for SessionID {
    fn encode(&self, bytes: &mut Vec<u8>) {
        PayloadU8::new(self.0.clone()).encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        PayloadU8::read(r).map(|p| Self(p.into_inner()))
    }
}

impl SessionID {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownExtension {
    pub typ: ExtensionType,
    pub payload: Payload,
}

impl UnknownExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.payload.encode(bytes);
    }

    fn read(typ: ExtensionType, r: &mut Reader) -> Self {
        let payload = Payload::read(r);
        Self { typ, payload }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerName {
    pub typ: ServerNameType,
    pub name: PayloadU16,
}

impl ServerName {
    pub fn host_name(name: &str) -> Self {
        Self {
            typ: ServerNameType::HostName,
            name: PayloadU16::new(name.as_bytes().to_vec()),
        }
    }
}

impl Codec for ServerName {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        self.name.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let typ = ServerNameType::read(r)?;
        let name = PayloadU16::read(r)?;
        Some(Self { typ, name })
    }
}

/// An RFC 6066 `URLAndHash` entry with an optional SHA-1 hash marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlAndHash {
    pub url: PayloadU16,
    pub sha1_hash: Option<[u8; 20]>,
}

impl Codec for UrlAndHash {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.url.encode(bytes);
        match self.sha1_hash {
            Some(hash) => {
                1u8.encode(bytes);
                bytes.extend_from_slice(&hash);
            }
            None => 0u8.encode(bytes),
        }
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let url = PayloadU16::read(r)?;
        let sha1_hash = match u8::read(r)? {
            0 => None,
            _ => {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(r.take(20)?);
                Some(hash)
            }
        };
        Some(Self { url, sha1_hash })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateStatusRequest {
    pub status_type: CertificateStatusType,
    pub responder_ids: PayloadU16,
    pub extensions: PayloadU16,
}

impl CertificateStatusRequest {
    pub fn ocsp() -> Self {
        Self {
            status_type: CertificateStatusType::OCSP,
            responder_ids: PayloadU16::empty(),
            extensions: PayloadU16::empty(),
        }
    }
}

impl Codec for CertificateStatusRequest {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.status_type.encode(bytes);
        self.responder_ids.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        Some(Self {
            status_type: CertificateStatusType::read(r)?,
            responder_ids: PayloadU16::read(r)?,
            extensions: PayloadU16::read(r)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientExtension {
    ServerName(Vec<ServerName>),
    MaxFragmentLength(u8),
    ClientCertificateUrl(CertChainType, Vec<UrlAndHash>),
    CertificateStatusRequest(CertificateStatusRequest),
    NamedGroups(Vec<NamedGroup>),
    ECPointFormats(Vec<ECPointFormat>),
    SignatureAlgorithms(Vec<SignatureScheme>),
    Heartbeat(HeartbeatMode),
    Protocols(Vec<PayloadU8>),
    SessionTicket(Payload),
    RenegotiationInfo(PayloadU8),
    Unknown(UnknownExtension),
}

impl ClientExtension {
    /// An extension with an arbitrary type code and no body.
    pub fn bare(typ: ExtensionType) -> Self {
        Self::Unknown(UnknownExtension {
            typ,
            payload: Payload::empty(),
        })
    }

    pub fn get_type(&self) -> ExtensionType {
        match *self {
            Self::ServerName(_) => ExtensionType::ServerName,
            Self::MaxFragmentLength(_) => ExtensionType::MaxFragmentLength,
            Self::ClientCertificateUrl(..) => ExtensionType::ClientCertificateUrl,
            Self::CertificateStatusRequest(_) => ExtensionType::StatusRequest,
            Self::NamedGroups(_) => ExtensionType::EllipticCurves,
            Self::ECPointFormats(_) => ExtensionType::ECPointFormats,
            Self::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Self::Heartbeat(_) => ExtensionType::Heartbeat,
            Self::Protocols(_) => ExtensionType::ALProtocolNegotiation,
            Self::SessionTicket(_) => ExtensionType::SessionTicket,
            Self::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            Self::Unknown(ref r) => r.typ,
        }
    }

    fn encode_body(&self, sub: &mut Vec<u8>) {
        match *self {
            Self::ServerName(ref names) => encode_vec_u16(sub, names),
            Self::MaxFragmentLength(code) => code.encode(sub),
            Self::ClientCertificateUrl(chain_type, ref urls) => {
                chain_type.encode(sub);
                encode_vec_u16(sub, urls);
            }
            Self::CertificateStatusRequest(ref r) => r.encode(sub),
            Self::NamedGroups(ref groups) => encode_vec_u16(sub, groups),
            Self::ECPointFormats(ref formats) => encode_vec_u8(sub, formats),
            Self::SignatureAlgorithms(ref schemes) => encode_vec_u16(sub, schemes),
            Self::Heartbeat(mode) => mode.encode(sub),
            Self::Protocols(ref protocols) => encode_vec_u16(sub, protocols),
            Self::SessionTicket(ref ticket) => ticket.encode(sub),
            Self::RenegotiationInfo(ref info) => info.encode(sub),
            Self::Unknown(ref r) => r.encode(sub),
        }
    }

    fn read_body(typ: ExtensionType, sub: &mut Reader) -> Option<Self> {
        Some(match typ {
            ExtensionType::ServerName => Self::ServerName(read_vec_u16(sub)?),
            ExtensionType::MaxFragmentLength => Self::MaxFragmentLength(u8::read(sub)?),
            ExtensionType::ClientCertificateUrl => {
                let chain_type = CertChainType::read(sub)?;
                Self::ClientCertificateUrl(chain_type, read_vec_u16(sub)?)
            }
            ExtensionType::StatusRequest => {
                Self::CertificateStatusRequest(CertificateStatusRequest::read(sub)?)
            }
            ExtensionType::EllipticCurves => Self::NamedGroups(read_vec_u16(sub)?),
            ExtensionType::ECPointFormats => Self::ECPointFormats(read_vec_u8(sub)?),
            ExtensionType::SignatureAlgorithms => Self::SignatureAlgorithms(read_vec_u16(sub)?),
            ExtensionType::Heartbeat => Self::Heartbeat(HeartbeatMode::read(sub)?),
            ExtensionType::ALProtocolNegotiation => Self::Protocols(read_vec_u16(sub)?),
            ExtensionType::SessionTicket => Self::SessionTicket(Payload::read(sub)),
            ExtensionType::RenegotiationInfo => Self::RenegotiationInfo(PayloadU8::read(sub)?),
            _ => return None,
        })
    }
}

impl Codec for ClientExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.get_type().encode(bytes);

        let mut sub: Vec<u8> = Vec::new();
        self.encode_body(&mut sub);

        PayloadU16::encode_slice(&sub, bytes);
    }

    /// Bodies that do not parse as their registered layout are kept as
    /// `Unknown` instead of failing the whole hello.
    fn read(r: &mut Reader) -> Option<Self> {
        let typ = ExtensionType::read(r)?;
        let len = u16::read(r)? as usize;
        let body = r.take(len)?;

        let mut sub = Reader::init(body);
        match Self::read_body(typ, &mut sub) {
            Some(ext) if !sub.any_left() => Some(ext),
            _ => Some(Self::Unknown(UnknownExtension::read(
                typ,
                &mut Reader::init(body),
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerExtension {
    ECPointFormats(Vec<ECPointFormat>),
    RenegotiationInfo(PayloadU8),
    SessionTicketAck,
    Protocols(Vec<PayloadU8>),
    Unknown(UnknownExtension),
}

impl ServerExtension {
    pub fn get_type(&self) -> ExtensionType {
        match *self {
            Self::ECPointFormats(_) => ExtensionType::ECPointFormats,
            Self::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            Self::SessionTicketAck => ExtensionType::SessionTicket,
            Self::Protocols(_) => ExtensionType::ALProtocolNegotiation,
            Self::Unknown(ref r) => r.typ,
        }
    }
}

impl Codec for ServerExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.get_type().encode(bytes);

        let mut sub: Vec<u8> = Vec::new();
        match *self {
            Self::ECPointFormats(ref formats) => encode_vec_u8(&mut sub, formats),
            Self::RenegotiationInfo(ref info) => info.encode(&mut sub),
            Self::SessionTicketAck => {}
            Self::Protocols(ref protocols) => encode_vec_u16(&mut sub, protocols),
            Self::Unknown(ref r) => r.encode(&mut sub),
        }

        PayloadU16::encode_slice(&sub, bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let typ = ExtensionType::read(r)?;
        let len = u16::read(r)? as usize;
        let body = r.take(len)?;

        let mut sub = Reader::init(body);
        let ext = match typ {
            ExtensionType::ECPointFormats => read_vec_u8(&mut sub).map(Self::ECPointFormats),
            ExtensionType::RenegotiationInfo => {
                PayloadU8::read(&mut sub).map(Self::RenegotiationInfo)
            }
            ExtensionType::SessionTicket if body.is_empty() => Some(Self::SessionTicketAck),
            ExtensionType::ALProtocolNegotiation => read_vec_u16(&mut sub).map(Self::Protocols),
            _ => None,
        };

        match ext {
            Some(ext) if !sub.any_left() => Some(ext),
            _ => Some(Self::Unknown(UnknownExtension::read(
                typ,
                &mut Reader::init(body),
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientHelloPayload {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionID,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<Compression>,
    pub extensions: Vec<ClientExtension>,
}

impl Codec for ClientHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.client_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        encode_vec_u16(bytes, &self.cipher_suites);
        encode_vec_u8(bytes, &self.compression_methods);

        if !self.extensions.is_empty() {
            encode_vec_u16(bytes, &self.extensions);
        }
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let mut ret = Self {
            client_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionID::read(r)?,
            cipher_suites: read_vec_u16(r)?,
            compression_methods: read_vec_u8(r)?,
            extensions: Vec::new(),
        };

        if r.any_left() {
            ret.extensions = read_vec_u16(r)?;
        }

        if r.any_left() {
            return None;
        }

        Some(ret)
    }
}

impl ClientHelloPayload {
    pub fn find_extension(&self, ext: ExtensionType) -> Option<&ClientExtension> {
        self.extensions.iter().find(|x| x.get_type() == ext)
    }

    pub fn ticket_extension(&self) -> Option<&Payload> {
        match self.find_extension(ExtensionType::SessionTicket)? {
            ClientExtension::SessionTicket(ticket) => Some(ticket),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerHelloPayload {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionID,
    pub cipher_suite: CipherSuite,
    pub compression_method: Compression,
    pub extensions: Vec<ServerExtension>,
}

impl Codec for ServerHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.legacy_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suite.encode(bytes);
        self.compression_method.encode(bytes);

        if !self.extensions.is_empty() {
            encode_vec_u16(bytes, &self.extensions);
        }
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let mut ret = Self {
            legacy_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionID::read(r)?,
            cipher_suite: CipherSuite::read(r)?,
            compression_method: Compression::read(r)?,
            extensions: Vec::new(),
        };

        if r.any_left() {
            ret.extensions = read_vec_u16(r)?;
        }

        Some(ret)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ECParameters {
    pub curve_type: ECCurveType,
    pub named_group: NamedGroup,
}

impl Codec for ECParameters {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.curve_type.encode(bytes);
        self.named_group.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let curve_type = ECCurveType::read(r)?;
        if curve_type != ECCurveType::NamedCurve {
            return None;
        }

        let named_group = NamedGroup::read(r)?;
        Some(Self {
            curve_type,
            named_group,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigitallySignedStruct {
    pub scheme: SignatureScheme,
    pub sig: PayloadU16,
}

impl Codec for DigitallySignedStruct {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.scheme.encode(bytes);
        self.sig.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let scheme = SignatureScheme::read(r)?;
        let sig = PayloadU16::read(r)?;

        Some(Self { scheme, sig })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerECDHParams {
    pub curve_params: ECParameters,
    pub public: PayloadU8,
}

impl Codec for ServerECDHParams {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.curve_params.encode(bytes);
        self.public.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let cp = ECParameters::read(r)?;
        let pb = PayloadU8::read(r)?;

        Some(Self {
            curve_params: cp,
            public: pb,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ECDHEServerKeyExchange {
    pub params: ServerECDHParams,
    pub dss: DigitallySignedStruct,
}

impl Codec for ECDHEServerKeyExchange {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.params.encode(bytes);
        self.dss.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let params = ServerECDHParams::read(r)?;
        let dss = DigitallySignedStruct::read(r)?;

        Some(Self { params, dss })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerKeyExchangePayload {
    ECDHE(ECDHEServerKeyExchange),
    Unknown(Payload),
}

impl Codec for ServerKeyExchangePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match *self {
            Self::ECDHE(ref x) => x.encode(bytes),
            Self::Unknown(ref x) => x.encode(bytes),
        }
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let body = r.rest();
        let mut sub = Reader::init(body);
        match ECDHEServerKeyExchange::read(&mut sub) {
            Some(ecdhe) if !sub.any_left() => Some(Self::ECDHE(ecdhe)),
            _ => Some(Self::Unknown(Payload::new(body))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSessionTicketPayload {
    pub lifetime_hint: u32,
    pub ticket: PayloadU16,
}

impl NewSessionTicketPayload {
    pub fn new(lifetime_hint: u32, ticket: Vec<u8>) -> Self {
        Self {
            lifetime_hint,
            ticket: PayloadU16::new(ticket),
        }
    }
}

impl Codec for NewSessionTicketPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.lifetime_hint.encode(bytes);
        self.ticket.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let lifetime = u32::read(r)?;
        let ticket = PayloadU16::read(r)?;

        Some(Self {
            lifetime_hint: lifetime,
            ticket,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakePayload {
    HelloRequest,
    ClientHello(ClientHelloPayload),
    ServerHello(ServerHelloPayload),
    Certificate(Vec<Certificate>),
    ServerKeyExchange(ServerKeyExchangePayload),
    ServerHelloDone,
    ClientKeyExchange(Payload),
    NewSessionTicket(NewSessionTicketPayload),
    Finished(Payload),
    Unknown(Payload),
}

impl HandshakePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match *self {
            Self::HelloRequest | Self::ServerHelloDone => {}
            Self::ClientHello(ref x) => x.encode(bytes),
            Self::ServerHello(ref x) => x.encode(bytes),
            Self::Certificate(ref x) => codec::encode_vec_u24(bytes, x),
            Self::ServerKeyExchange(ref x) => x.encode(bytes),
            Self::ClientKeyExchange(ref x) => x.encode(bytes),
            Self::NewSessionTicket(ref x) => x.encode(bytes),
            Self::Finished(ref x) => x.encode(bytes),
            Self::Unknown(ref x) => x.encode(bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessagePayload {
    pub typ: HandshakeType,
    pub payload: HandshakePayload,
}

impl Codec for HandshakeMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        // encode payload to learn length
        let mut sub: Vec<u8> = Vec::new();
        self.payload.encode(&mut sub);

        self.typ.encode(bytes);
        codec::u24(sub.len() as u32).encode(bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let typ = HandshakeType::read(r)?;
        let len = usize::from(codec::u24::read(r)?);
        let body = r.take(len)?;
        let mut sub = Reader::init(body);

        let payload = match typ {
            HandshakeType::HelloRequest if sub.left() == 0 => Some(HandshakePayload::HelloRequest),
            HandshakeType::ClientHello => {
                ClientHelloPayload::read(&mut sub).map(HandshakePayload::ClientHello)
            }
            HandshakeType::ServerHello => {
                ServerHelloPayload::read(&mut sub).map(HandshakePayload::ServerHello)
            }
            HandshakeType::Certificate => {
                codec::read_vec_u24_limited::<Certificate>(&mut sub, MAX_CERTIFICATE_CHAIN)
                    .map(HandshakePayload::Certificate)
            }
            HandshakeType::ServerKeyExchange => {
                ServerKeyExchangePayload::read(&mut sub).map(HandshakePayload::ServerKeyExchange)
            }
            HandshakeType::ServerHelloDone if sub.left() == 0 => {
                Some(HandshakePayload::ServerHelloDone)
            }
            HandshakeType::ClientKeyExchange => {
                Some(HandshakePayload::ClientKeyExchange(Payload::read(&mut sub)))
            }
            HandshakeType::NewSessionTicket => {
                NewSessionTicketPayload::read(&mut sub).map(HandshakePayload::NewSessionTicket)
            }
            HandshakeType::Finished => Some(HandshakePayload::Finished(Payload::read(&mut sub))),
            _ => None,
        };

        let payload = match payload {
            Some(payload) if !sub.any_left() => payload,
            _ => HandshakePayload::Unknown(Payload::new(body)),
        };

        Some(Self { typ, payload })
    }
}

impl HandshakeMessagePayload {
    pub fn build(typ: HandshakeType, payload: HandshakePayload) -> Self {
        Self { typ, payload }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn unparseable_extension_body_becomes_unknown() {
        // signature_algorithms with an odd-length list
        let bytes = [0x00, 0x0d, 0x00, 0x03, 0x00, 0x01, 0x04];
        let ext = ClientExtension::read_bytes(&bytes).unwrap();
        assert_eq!(
            ext,
            ClientExtension::Unknown(UnknownExtension {
                typ: ExtensionType::SignatureAlgorithms,
                payload: Payload::new(vec![0x00, 0x01, 0x04]),
            })
        );
        assert_eq!(ext.get_encoding(), bytes);
    }

    #[test]
    fn empty_extension_lists_still_carry_a_prefix() {
        let ext = ClientExtension::SignatureAlgorithms(vec![]);
        assert_eq!(ext.get_encoding(), [0x00, 0x0d, 0x00, 0x02, 0x00, 0x00]);

        let ext = ClientExtension::RenegotiationInfo(PayloadU8::empty());
        assert_eq!(ext.get_encoding(), [0xff, 0x01, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn server_key_exchange_parses_named_curve() {
        let mut bytes = vec![0x03, 0x00, 0x17, 0x03, 0x04, 0xaa, 0xbb];
        bytes.extend_from_slice(&[0x04, 0x03, 0x00, 0x02, 0x30, 0x00]);

        let msg = ServerKeyExchangePayload::read_bytes(&bytes).unwrap();
        match msg {
            ServerKeyExchangePayload::ECDHE(ecdhe) => {
                assert_eq!(ecdhe.params.curve_params.named_group, NamedGroup::secp256r1);
                assert_eq!(ecdhe.params.public.0, vec![0x04, 0xaa, 0xbb]);
                assert_eq!(ecdhe.dss.scheme, SignatureScheme::ECDSA_NISTP256_SHA256);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn handshake_envelope_carries_u24_length() {
        let msg = HandshakeMessagePayload::build(
            HandshakeType::Finished,
            HandshakePayload::Finished(Payload::new(vec![7u8; 12])),
        );
        let bytes = msg.get_encoding();
        assert_eq!(&bytes[..4], &[0x14, 0x00, 0x00, 0x0c]);
        assert_eq!(HandshakeMessagePayload::read_bytes(&bytes), Some(msg));
    }
}
