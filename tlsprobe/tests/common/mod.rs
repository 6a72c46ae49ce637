//! An in-process TLS 1.2 server for driving handshakes end to end.
//!
//! It implements just enough of the server side to complete full and
//! abbreviated handshakes with `TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256` on
//! secp256r1, answers one HTTP request and closes. The ServerKeyExchange
//! signature is not a real signature. Everything a client sends is recorded
//! as [`Event`]s, one list per connection.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    io::{ErrorKind, Read, Write},
    net::{Shutdown, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};
use tlsprobe::{
    codec::{Codec, Reader},
    config::{HandshakeConfig, HandshakeConfigBuilder},
    tls::{
        cipher::{GcmMessageDecrypter, GcmMessageEncrypter, KeyBlock, Side},
        hash_hs::HandshakeHash,
        key::Certificate,
        key_exchange::KeyExchange,
        msgs::{
            base::{Payload, PayloadU16, PayloadU8},
            deframer::{HandshakeJoiner, MessageDeframer},
            enums::{
                AlertDescription, AlertLevel, CipherSuite, Compression, ContentType,
                ECCurveType, ECPointFormat, HandshakeType, NamedGroup, ProtocolVersion,
                SignatureScheme,
            },
            handshake::{
                ClientHelloPayload, DigitallySignedStruct, ECDHEServerKeyExchange,
                ECParameters, HandshakeMessagePayload, HandshakePayload,
                NewSessionTicketPayload, Random, ServerECDHParams, ServerExtension,
                ServerHelloPayload, ServerKeyExchangePayload, SessionID,
            },
            message::{Message, MessagePayload, OpaqueMessage, PlainMessage},
        },
        prf,
    },
};

pub const SERVER_CERT: &[u8] = include_bytes!("../../assets/example-com.der");

pub const HTTP_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

/// A record that frames correctly but decodes to nothing.
pub const CORRUPT_RECORD: &[u8] = &[0x15, 0x03, 0x03, 0x00, 0x03, 0xde, 0xad, 0xbe];

const SERVER_RANDOM: [u8; 32] = [0x33; 32];
const SERVER_READ_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Answers the ClientHello with a fatal alert.
    FatalAlertOnHello(AlertDescription),
    /// Sprinkles WARNING alerts over every flight.
    WarningAlerts,
    /// Leaves the Certificate out of the first flight.
    NoCertificate,
    /// Never issues a session ticket.
    NoTickets,
}

/// What the server saw from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ClientHello(ClientHelloPayload),
    WarningAlert(AlertDescription),
    ClientKeyExchange,
    ChangeCipherSpec,
    Finished { verified: bool },
    Request(Vec<u8>),
    /// A record the server could not make sense of, as received.
    Unexpected(Vec<u8>),
}

#[derive(Default)]
struct Shared {
    tickets: HashMap<Vec<u8>, Vec<u8>>,
    issued: usize,
    connections: Vec<Vec<Event>>,
}

pub struct MockServer {
    port: u16,
    shared: Arc<Mutex<Shared>>,
}

impl MockServer {
    pub fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Mutex::new(Shared::default()));

        let server_shared = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };
                let events = ServerConn::new(stream, behavior, server_shared.clone()).run();
                server_shared.lock().unwrap().connections.push(events);
            }
        });

        Self { port, shared }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> HandshakeConfigBuilder {
        HandshakeConfig::builder()
            .addr("127.0.0.1")
            .port(self.port)
            .io_timeout(Duration::from_millis(300))
    }

    /// Events of the first `n` finished connections, waiting for them to
    /// finish if needed.
    pub fn connections(&self, n: usize) -> Vec<Vec<Event>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            {
                let shared = self.shared.lock().unwrap();
                if shared.connections.len() >= n {
                    return shared.connections[..n].to_vec();
                }
            }
            assert!(Instant::now() < deadline, "server saw fewer than {} connections", n);
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn issued_tickets(&self) -> usize {
        self.shared.lock().unwrap().issued
    }
}

struct ServerConn {
    stream: TcpStream,
    behavior: Behavior,
    shared: Arc<Mutex<Shared>>,
    deframer: MessageDeframer,
    joiner: HandshakeJoiner,
    pending: VecDeque<(Message, Vec<u8>)>,
    transcript: HandshakeHash,
    keys: Option<KeyBlock>,
    encrypter: Option<GcmMessageEncrypter>,
    write_seq: u64,
    decrypter: Option<GcmMessageDecrypter>,
    read_seq: u64,
    out: Vec<u8>,
    events: Vec<Event>,
}

impl ServerConn {
    fn new(stream: TcpStream, behavior: Behavior, shared: Arc<Mutex<Shared>>) -> Self {
        Self {
            stream,
            behavior,
            shared,
            deframer: MessageDeframer::new(),
            joiner: HandshakeJoiner::new(),
            pending: VecDeque::new(),
            transcript: HandshakeHash::new(),
            keys: None,
            encrypter: None,
            write_seq: 0,
            decrypter: None,
            read_seq: 0,
            out: Vec::new(),
            events: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Event> {
        let _ = self.stream.set_read_timeout(Some(SERVER_READ_TIMEOUT));

        if let Err(description) = self.serve() {
            debug!("mock server aborts with {:?}", description);
            self.queue(Message::build_alert(AlertLevel::Fatal, description));
            self.flush();
        }
        let _ = self.stream.shutdown(Shutdown::Both);
        self.events
    }

    fn serve(&mut self) -> Result<(), AlertDescription> {
        let (hello, encoded) = match self.expect_handshake()? {
            (HandshakePayload::ClientHello(hello), encoded) => (hello, encoded),
            _ => return Err(AlertDescription::UnexpectedMessage),
        };
        self.events.push(Event::ClientHello(hello.clone()));
        self.transcript.update_raw(&encoded);

        if let Behavior::FatalAlertOnHello(description) = self.behavior {
            return Err(description);
        }

        let resumable = if hello.session_id.is_empty() {
            None
        } else {
            hello
                .ticket_extension()
                .and_then(|ticket| self.shared.lock().unwrap().tickets.get(&ticket.0).cloned())
        };

        match resumable {
            Some(master) => self.abbreviated(&hello, &master)?,
            None => self.full(&hello)?,
        }

        self.serve_http()
    }

    fn server_hello(&self, session_id: SessionID, ticket_ack: bool) -> Message {
        let mut extensions = vec![ServerExtension::ECPointFormats(vec![
            ECPointFormat::Uncompressed,
        ])];
        if ticket_ack {
            extensions.push(ServerExtension::SessionTicketAck);
        }

        handshake(
            HandshakeType::ServerHello,
            HandshakePayload::ServerHello(ServerHelloPayload {
                legacy_version: ProtocolVersion::TLSv1_2,
                random: Random(SERVER_RANDOM),
                session_id,
                cipher_suite: CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                compression_method: Compression::Null,
                extensions,
            }),
        )
    }

    fn warn_if_asked(&mut self) {
        if self.behavior == Behavior::WarningAlerts {
            self.queue(Message::build_alert(
                AlertLevel::Warning,
                AlertDescription::UnrecognisedName,
            ));
        }
    }

    fn full(&mut self, hello: &ClientHelloPayload) -> Result<(), AlertDescription> {
        let kx = KeyExchange::start(NamedGroup::secp256r1, false)
            .map_err(|_| AlertDescription::InternalError)?;
        let issue_ticket =
            hello.ticket_extension().is_some() && self.behavior != Behavior::NoTickets;

        self.warn_if_asked();
        self.queue(self.server_hello(SessionID::empty(), issue_ticket));
        if self.behavior != Behavior::NoCertificate {
            self.queue(handshake(
                HandshakeType::Certificate,
                HandshakePayload::Certificate(vec![Certificate(SERVER_CERT.to_vec())]),
            ));
        }
        self.queue(handshake(
            HandshakeType::ServerKeyExchange,
            HandshakePayload::ServerKeyExchange(ServerKeyExchangePayload::ECDHE(
                ECDHEServerKeyExchange {
                    params: ServerECDHParams {
                        curve_params: ECParameters {
                            curve_type: ECCurveType::NamedCurve,
                            named_group: NamedGroup::secp256r1,
                        },
                        public: PayloadU8::new(kx.pubkey().to_vec()),
                    },
                    dss: DigitallySignedStruct {
                        scheme: SignatureScheme::ECDSA_NISTP256_SHA256,
                        sig: PayloadU16::new(vec![0x30; 70]),
                    },
                },
            )),
        ));
        self.warn_if_asked();
        self.queue(handshake(
            HandshakeType::ServerHelloDone,
            HandshakePayload::ServerHelloDone,
        ));
        self.flush();

        let cke = match self.expect_handshake()? {
            (HandshakePayload::ClientKeyExchange(cke), encoded) => {
                self.transcript.update_raw(&encoded);
                cke
            }
            _ => return Err(AlertDescription::UnexpectedMessage),
        };
        let point = PayloadU8::read(&mut Reader::init(&cke.0))
            .ok_or(AlertDescription::DecodeError)?;
        self.events.push(Event::ClientKeyExchange);

        let premaster = kx
            .complete(&point.0)
            .map_err(|_| AlertDescription::IllegalParameter)?;
        let master = prf::master_secret(&premaster, &hello.random.0, &SERVER_RANDOM);
        self.keys = Some(KeyBlock::derive(&master, &hello.random.0, &SERVER_RANDOM));

        self.expect_change_cipher_spec()?;
        self.expect_client_finished(&master)?;

        if issue_ticket {
            let ticket = {
                let mut shared = self.shared.lock().unwrap();
                shared.issued += 1;
                let ticket = format!("mock-ticket-{}", shared.issued).into_bytes();
                shared.tickets.insert(ticket.clone(), master.to_vec());
                ticket
            };
            self.queue(handshake(
                HandshakeType::NewSessionTicket,
                HandshakePayload::NewSessionTicket(NewSessionTicketPayload::new(300, ticket)),
            ));
        }
        self.queue(Message::build_change_cipher_spec());
        self.queue_server_finished(&master);
        self.warn_if_asked();
        self.flush();
        Ok(())
    }

    fn abbreviated(
        &mut self,
        hello: &ClientHelloPayload,
        master: &[u8],
    ) -> Result<(), AlertDescription> {
        self.keys = Some(KeyBlock::derive(master, &hello.random.0, &SERVER_RANDOM));

        self.queue(self.server_hello(hello.session_id.clone(), false));
        self.queue(Message::build_change_cipher_spec());
        self.queue_server_finished(master);
        self.flush();

        self.expect_change_cipher_spec()?;
        self.expect_client_finished(master)
    }

    fn serve_http(&mut self) -> Result<(), AlertDescription> {
        loop {
            match self.next_message() {
                Some((msg, _)) => match msg.payload {
                    MessagePayload::ApplicationData(data) => {
                        self.events.push(Event::Request(data.0));
                        self.warn_if_asked();
                        self.queue(Message::build_application_data(HTTP_RESPONSE.to_vec()));
                        self.flush();
                        return Ok(());
                    }
                    MessagePayload::Alert(alert) if !alert.is_fatal() => {
                        self.events.push(Event::WarningAlert(alert.description));
                    }
                    _ => return Err(AlertDescription::UnexpectedMessage),
                },
                None => return Err(AlertDescription::UnexpectedMessage),
            }
        }
    }

    fn queue_server_finished(&mut self, master: &[u8]) {
        let verify_data = prf::verify_data(
            master,
            prf::SERVER_FINISHED_LABEL,
            self.transcript.get_current_hash().as_ref(),
        );
        self.queue(handshake(
            HandshakeType::Finished,
            HandshakePayload::Finished(Payload::new(verify_data)),
        ));
    }

    fn expect_change_cipher_spec(&mut self) -> Result<(), AlertDescription> {
        loop {
            match self.next_message() {
                Some((msg, _)) => match msg.payload {
                    MessagePayload::ChangeCipherSpec(_) => break,
                    MessagePayload::Alert(alert) if !alert.is_fatal() => {
                        self.events.push(Event::WarningAlert(alert.description));
                    }
                    _ => return Err(AlertDescription::UnexpectedMessage),
                },
                None => return Err(AlertDescription::UnexpectedMessage),
            }
        }

        self.events.push(Event::ChangeCipherSpec);
        let keys = self.keys.as_ref().ok_or(AlertDescription::UnexpectedMessage)?;
        let (_, decrypter) = keys
            .split(Side::Server)
            .map_err(|_| AlertDescription::InternalError)?;
        self.decrypter = Some(decrypter);
        self.read_seq = 0;
        Ok(())
    }

    fn expect_client_finished(&mut self, master: &[u8]) -> Result<(), AlertDescription> {
        let (verify_data, encoded) = match self.expect_handshake()? {
            (HandshakePayload::Finished(verify_data), encoded) => (verify_data, encoded),
            _ => return Err(AlertDescription::UnexpectedMessage),
        };

        let expected = prf::verify_data(
            master,
            prf::CLIENT_FINISHED_LABEL,
            self.transcript.get_current_hash().as_ref(),
        );
        let verified = expected == verify_data.0;
        self.events.push(Event::Finished { verified });
        if !verified {
            return Err(AlertDescription::DecryptError);
        }

        self.transcript.update_raw(&encoded);
        Ok(())
    }

    /// Next handshake message, skipping WARNING alerts.
    fn expect_handshake(&mut self) -> Result<(HandshakePayload, Vec<u8>), AlertDescription> {
        loop {
            let (msg, encoded) = self
                .next_message()
                .ok_or(AlertDescription::UnexpectedMessage)?;
            match msg.payload {
                MessagePayload::Handshake(hs) => return Ok((hs.payload, encoded)),
                MessagePayload::Alert(alert) if !alert.is_fatal() => {
                    self.events.push(Event::WarningAlert(alert.description));
                }
                _ => return Err(AlertDescription::UnexpectedMessage),
            }
        }
    }

    /// Next message from the client with its raw handshake encoding. `None`
    /// once the client closed, went silent or sent garbage.
    fn next_message(&mut self) -> Option<(Message, Vec<u8>)> {
        loop {
            if let Some(next) = self.pending.pop_front() {
                return Some(next);
            }

            if let Some(opaque) = self.deframer.frames.pop_front() {
                self.process_record(opaque)?;
                continue;
            }

            if self.deframer.desynced {
                self.events.push(Event::Unexpected(Vec::new()));
                return None;
            }

            let mut buf = [0u8; 4096];
            match self.stream.read(&mut buf) {
                Ok(0) => return None,
                Ok(n) => self.deframer.extend(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    debug!("mock server read failed: {}", err);
                    return None;
                }
            }
        }
    }

    fn process_record(&mut self, opaque: OpaqueMessage) -> Option<()> {
        let raw = opaque.get_encoding();
        let plain = match self.decrypter {
            Some(ref decrypter) if opaque.typ != ContentType::ChangeCipherSpec => {
                let seq = self.read_seq;
                self.read_seq += 1;
                decrypter.decrypt(opaque, seq).ok()
            }
            _ => Some(opaque.into_plain_message()),
        };

        let plain = match plain {
            Some(plain) => plain,
            None => {
                self.events.push(Event::Unexpected(raw));
                return None;
            }
        };

        if plain.typ == ContentType::Handshake {
            let version = plain.version;
            if self.joiner.take_message(plain).is_none() {
                self.events.push(Event::Unexpected(raw));
                return None;
            }
            while let Some(joined) = self.joiner.frames.pop_front() {
                let msg = Message {
                    version,
                    payload: MessagePayload::Handshake(joined.parsed),
                };
                self.pending.push_back((msg, joined.encoded));
            }
            return Some(());
        }

        match Message::try_from(plain) {
            Ok(msg) => {
                self.pending.push_back((msg, Vec::new()));
                Some(())
            }
            Err(_) => {
                self.events.push(Event::Unexpected(raw));
                None
            }
        }
    }

    fn queue(&mut self, msg: Message) {
        if let MessagePayload::Handshake(ref hs) = msg.payload {
            self.transcript.update_raw(&hs.get_encoding());
        }
        let is_ccs = matches!(msg.payload, MessagePayload::ChangeCipherSpec(_));

        let plain = PlainMessage::from(msg);
        let opaque = match self.encrypter {
            Some(ref encrypter) => {
                let seq = self.write_seq;
                self.write_seq += 1;
                match encrypter.encrypt(&plain, seq) {
                    Ok(opaque) => opaque,
                    Err(err) => {
                        warn!("mock server failed to encrypt: {}", err);
                        return;
                    }
                }
            }
            None => plain.into_unencrypted_opaque(),
        };
        opaque.encode(&mut self.out);

        if is_ccs {
            if let Some(Ok((encrypter, _))) = self.keys.as_ref().map(|k| k.split(Side::Server)) {
                self.encrypter = Some(encrypter);
                self.write_seq = 0;
            }
        }
    }

    fn flush(&mut self) {
        let out = std::mem::take(&mut self.out);
        if let Err(err) = self.stream.write_all(&out) {
            debug!("mock server write failed: {}", err);
        }
    }
}

fn handshake(typ: HandshakeType, payload: HandshakePayload) -> Message {
    Message::build_handshake(HandshakeMessagePayload::build(typ, payload))
}
