use crate::{
    codec::Codec,
    config::{HandshakeConfig, TicketMode},
    error::Error,
    tls::{
        msgs::{
            base::{Payload, PayloadU16, PayloadU8},
            enums::{
                AlertDescription, AlertLevel, CertChainType, CipherSuite, Compression,
                ECPointFormat, ExtensionType, HandshakeType, HeartbeatMode, ProtocolVersion,
            },
            handshake::{
                CertificateStatusRequest, ClientExtension, ClientHelloPayload,
                HandshakeMessagePayload, HandshakePayload, ServerECDHParams, ServerName,
                SessionID, UrlAndHash,
            },
            message::Message,
        },
        session::CryptoSession,
    },
};

/// Encrypt-then-MAC (RFC 7366), offered although the suites are AEAD only.
pub const ENCRYPT_THEN_MAC_PROBE: ExtensionType = ExtensionType::EncryptThenMac;

/// trusted_ca_keys (RFC 6066), sent without a body.
pub const TRUSTED_CA_KEYS_PROBE: ExtensionType = ExtensionType::TrustedCAKeys;

/// A code point no standard assigns; servers must skip it.
pub const UNASSIGNED_PROBE: ExtensionType = ExtensionType::Unknown(0x00f0);

/// max_fragment_length code for 2^12 bytes.
pub const MAX_FRAGMENT_LENGTH_4096: u8 = 0x04;

pub const CLIENT_CERTIFICATE_URL: &str = "http://www.example.com";

pub const ALPN_PROTOCOLS: &[&[u8]] = &[b"http/1.1", b"http/2.0"];

/// The suite every ClientHello offers first.
pub const BASELINE_SUITE: CipherSuite = CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;

/// Builds the client's messages from an immutable configuration.
#[derive(Debug, Clone, Copy)]
pub struct MessageBuilder<'a> {
    config: &'a HandshakeConfig,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(config: &'a HandshakeConfig) -> Self {
        Self { config }
    }

    pub fn client_hello_payload(&self, session: &CryptoSession) -> ClientHelloPayload {
        let mut cipher_suites = vec![BASELINE_SUITE];
        cipher_suites.extend_from_slice(self.config.cipher_suites());

        let mut compression_methods = vec![Compression::Null];
        compression_methods.extend_from_slice(self.config.compressions());

        ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: session.client_random(),
            session_id: SessionID(self.config.session_id().to_vec()),
            cipher_suites,
            compression_methods,
            extensions: self.hello_extensions(),
        }
    }

    /// Every extension of the ClientHello, in wire order.
    pub fn hello_extensions(&self) -> Vec<ClientExtension> {
        let mut extensions = vec![
            ClientExtension::bare(ENCRYPT_THEN_MAC_PROBE),
            ClientExtension::ECPointFormats(vec![ECPointFormat::Uncompressed]),
        ];
        extensions.extend(self.assemble_extensions());
        extensions
    }

    pub fn client_hello(&self, session: &CryptoSession) -> Message {
        handshake(
            HandshakeType::ClientHello,
            HandshakePayload::ClientHello(self.client_hello_payload(session)),
        )
    }

    /// Caller extensions first, then the fixed probe set in wire order.
    pub fn assemble_extensions(&self) -> Vec<ClientExtension> {
        let config = self.config;
        let mut exts = config.extra_extensions().to_vec();

        if !config.server_names().is_empty() {
            exts.push(ClientExtension::ServerName(
                config
                    .server_names()
                    .iter()
                    .map(|name| ServerName::host_name(name))
                    .collect(),
            ));
        }

        exts.push(ClientExtension::SignatureAlgorithms(
            config.signature_algorithms().unwrap_or_default().to_vec(),
        ));
        exts.push(ClientExtension::NamedGroups(
            config.supported_groups().unwrap_or_default().to_vec(),
        ));
        exts.push(ClientExtension::RenegotiationInfo(
            config
                .renegotiation_info()
                .map(|info| PayloadU8::new(info.to_vec()))
                .unwrap_or_else(PayloadU8::empty),
        ));

        exts.push(ClientExtension::bare(TRUSTED_CA_KEYS_PROBE));
        exts.push(ClientExtension::CertificateStatusRequest(
            CertificateStatusRequest::ocsp(),
        ));
        exts.push(ClientExtension::bare(UNASSIGNED_PROBE));
        exts.push(ClientExtension::Protocols(
            ALPN_PROTOCOLS
                .iter()
                .map(|proto| PayloadU8::new(proto.to_vec()))
                .collect(),
        ));
        exts.push(ClientExtension::MaxFragmentLength(MAX_FRAGMENT_LENGTH_4096));
        exts.push(ClientExtension::ClientCertificateUrl(
            CertChainType::IndividualCerts,
            vec![UrlAndHash {
                url: PayloadU16::new(CLIENT_CERTIFICATE_URL.as_bytes().to_vec()),
                sha1_hash: None,
            }],
        ));
        exts.push(ClientExtension::Heartbeat(HeartbeatMode::PeerNotAllowedToSend));

        match config.ticket() {
            TicketMode::Disabled => {}
            TicketMode::Empty => exts.push(ClientExtension::SessionTicket(Payload::empty())),
            TicketMode::Value(ticket) => {
                exts.push(ClientExtension::SessionTicket(Payload::new(ticket.clone())))
            }
        }

        exts
    }

    /// Runs the key exchange against the server's parameters and wraps our
    /// public point.
    pub fn client_key_exchange(
        &self,
        session: &mut CryptoSession,
        params: &ServerECDHParams,
    ) -> Result<Message, Error> {
        let pubkey = session.client_key_exchange(params)?;
        Ok(handshake(
            HandshakeType::ClientKeyExchange,
            HandshakePayload::ClientKeyExchange(Payload::new(
                PayloadU8::new(pubkey).get_encoding(),
            )),
        ))
    }

    /// Finished over the transcript as it stands.
    pub fn finished(&self, session: &CryptoSession) -> Result<Message, Error> {
        let verify_data = session.client_verify_data()?;
        Ok(handshake(
            HandshakeType::Finished,
            HandshakePayload::Finished(Payload::new(verify_data)),
        ))
    }

    pub fn alert(&self, level: AlertLevel, description: AlertDescription) -> Message {
        Message::build_alert(level, description)
    }

    pub fn change_cipher_spec(&self) -> Message {
        Message::build_change_cipher_spec()
    }

    pub fn application_data(&self, data: Vec<u8>) -> Message {
        Message::build_application_data(data)
    }

    pub fn http_request(&self) -> Message {
        self.application_data(http_request(self.config.http_host()))
    }
}

fn handshake(typ: HandshakeType, payload: HandshakePayload) -> Message {
    Message::build_handshake(HandshakeMessagePayload::build(typ, payload))
}

pub fn http_request(host: &str) -> Vec<u8> {
    format!("GET / HTTP/1.1\r\nHost: {}\r\n\r\n", host).into_bytes()
}
