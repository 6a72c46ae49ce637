//! Record layer on top of a [`Stream`]: serializes flights of messages,
//! optionally in paced chunks, and collects the peer's response.

use std::{
    io,
    io::{ErrorKind, Write},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, trace, warn};

use crate::{
    codec::Codec,
    error::{Error, ProtocolFailure},
    net::stream::Stream,
    tls::{
        msgs::{
            alert::AlertMessagePayload,
            ccs::ChangeCipherSpecPayload,
            deframer::{HandshakeJoiner, MessageDeframer},
            enums::{ContentType, HandshakeType},
            handshake::{HandshakeMessagePayload, HandshakePayload},
            message::{Message, MessagePayload, PlainMessage, MAX_FRAGMENT_LEN},
        },
        session::CryptoSession,
    },
};

/// Writes `bytes` in windows of `chunk` bytes, pausing `pacing` after each.
/// Returns the number of writes.
pub fn write_chunked<W: Write>(
    writer: &mut W,
    bytes: &[u8],
    chunk: usize,
    pacing: Duration,
) -> io::Result<usize> {
    let mut writes = 0;
    for window in bytes.chunks(chunk.max(1)) {
        writer.write_all(window)?;
        writer.flush()?;
        writes += 1;
        thread::sleep(pacing);
    }
    Ok(writes)
}

/// When [`RecordTransport::receive`] may return before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Until {
    /// Only on timeout or when the peer closes.
    Deadline,
    /// Once a handshake message of this type arrived.
    Handshake(HandshakeType),
}

/// Everything the peer sent in reply to one transmission.
#[derive(Debug, Default, Clone)]
pub struct Response {
    pub messages: Vec<Message>,
    /// Raw bytes as read from the socket.
    pub raw: Vec<u8>,
    /// Whether the peer closed the connection.
    pub closed: bool,
}

impl Response {
    pub fn handshakes(&self) -> impl Iterator<Item = &HandshakeMessagePayload> {
        self.messages.iter().filter_map(Message::handshake)
    }

    pub fn find_handshake(&self, typ: HandshakeType) -> Option<&HandshakePayload> {
        self.handshakes()
            .find(|hs| hs.typ == typ)
            .map(|hs| &hs.payload)
    }

    pub fn has_handshake(&self, typ: HandshakeType) -> bool {
        self.find_handshake(typ).is_some()
    }

    pub fn has_change_cipher_spec(&self) -> bool {
        self.messages
            .iter()
            .any(|m| matches!(m.payload, MessagePayload::ChangeCipherSpec(_)))
    }

    pub fn has_application_data(&self) -> bool {
        self.messages
            .iter()
            .any(|m| matches!(m.payload, MessagePayload::ApplicationData(_)))
    }

    /// All application data, concatenated in arrival order.
    pub fn application_data(&self) -> Vec<u8> {
        self.messages
            .iter()
            .filter_map(|m| match m.payload {
                MessagePayload::ApplicationData(ref data) => Some(&data.0[..]),
                _ => None,
            })
            .collect::<Vec<_>>()
            .concat()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &AlertMessagePayload> {
        self.messages.iter().filter_map(Message::alert)
    }

    fn is_done(&self, until: Until) -> bool {
        match until {
            Until::Deadline => false,
            Until::Handshake(typ) => self.has_handshake(typ),
        }
    }
}

pub struct RecordTransport<S: Stream> {
    stream: S,
    io_timeout: Duration,
    chunk: Option<usize>,
    pacing: Duration,
    verbose: bool,
    deframer: MessageDeframer,
    joiner: HandshakeJoiner,
    /// Bytes of the most recent transmission, kept for failure reports.
    last_sent: Vec<u8>,
}

impl<S: Stream> RecordTransport<S> {
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            stream,
            io_timeout,
            chunk: None,
            pacing: Duration::from_millis(1),
            verbose: false,
            deframer: MessageDeframer::new(),
            joiner: HandshakeJoiner::new(),
            last_sent: Vec::new(),
        }
    }

    pub fn with_chunking(mut self, chunk: Option<usize>, pacing: Duration) -> Self {
        self.chunk = chunk;
        self.pacing = pacing;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn last_sent(&self) -> &[u8] {
        &self.last_sent
    }

    fn show(&self, direction: &str, msg: &Message) {
        if self.verbose {
            info!("{} {:?}", direction, msg);
        } else {
            debug!("{} {:?}", direction, msg.payload.content_type());
        }
    }

    /// Serializes a flight into its final wire form.
    ///
    /// Handshake messages join the transcript before encryption, and write
    /// encryption starts right after an outgoing ChangeCipherSpec. Payloads
    /// over 2^14 bytes span several records.
    pub fn serialize(
        &self,
        flight: &[Message],
        session: &mut CryptoSession,
    ) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        for msg in flight {
            self.show("->", msg);
            if let MessagePayload::Handshake(ref hs) = msg.payload {
                session.add_handshake(&hs.get_encoding());
            }

            for fragment in PlainMessage::from(msg.clone()).fragments(MAX_FRAGMENT_LEN) {
                session.encrypt(fragment)?.encode(&mut bytes);
            }

            if let MessagePayload::ChangeCipherSpec(_) = msg.payload {
                session.activate_write()?;
            }
        }
        Ok(bytes)
    }

    /// Sends a flight as one transmission.
    pub fn send(&mut self, flight: &[Message], session: &mut CryptoSession) -> Result<(), Error> {
        let bytes = self.serialize(flight, session)?;
        self.send_raw(&bytes)
    }

    /// Writes bytes as they are, in chunks if chunking is configured.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        trace!("writing {}", hex::encode(bytes));
        self.last_sent = bytes.to_vec();

        let result = match self.chunk {
            Some(chunk) => write_chunked(&mut self.stream, bytes, chunk, self.pacing).map(|writes| {
                debug!("sent {} bytes in {} chunks", bytes.len(), writes);
            }),
            None => self.stream.write_all(bytes).and_then(|_| self.stream.flush()),
        };

        result.map_err(|err| {
            Error::Protocol(ProtocolFailure::transport(
                &err,
                self.last_sent.clone(),
                Vec::new(),
            ))
        })
    }

    /// Collects the peer's response until the I/O timeout expires, the peer
    /// closes, or `until` is satisfied.
    ///
    /// WARNING alerts are logged and kept in the response. Any other alert ends the
    /// exchange with a [`ProtocolFailure`], as does a socket error.
    pub fn receive(&mut self, session: &mut CryptoSession, until: Until) -> Result<Response, Error> {
        let deadline = Instant::now() + self.io_timeout;
        let mut response = Response::default();

        loop {
            self.process_frames(session, &mut response)?;
            if response.is_done(until) {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                trace!("receive deadline reached");
                break;
            }

            let read = self
                .stream
                .set_read_timeout(deadline - now)
                .and_then(|_| self.deframer.read(&mut self.stream));

            match read {
                Ok(0) => {
                    debug!("peer closed the connection");
                    response.closed = true;
                    self.process_frames(session, &mut response)?;
                    break;
                }
                Ok(n) => trace!("read {} bytes", n),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    trace!("read timed out");
                    self.process_frames(session, &mut response)?;
                    break;
                }
                Err(err) => {
                    self.process_frames(session, &mut response)?;
                    return Err(Error::Protocol(ProtocolFailure::transport(
                        &err,
                        self.last_sent.clone(),
                        response.raw,
                    )));
                }
            }
        }

        Ok(response)
    }

    pub fn send_recv(
        &mut self,
        flight: &[Message],
        session: &mut CryptoSession,
        until: Until,
    ) -> Result<Response, Error> {
        self.send(flight, session)?;
        self.receive(session, until)
    }

    fn process_frames(
        &mut self,
        session: &mut CryptoSession,
        response: &mut Response,
    ) -> Result<(), Error> {
        if self.deframer.desynced {
            return Err(Error::structure("peer sent data that is not TLS"));
        }

        while let Some(opaque) = self.deframer.frames.pop_front() {
            opaque.encode(&mut response.raw);
            let plain = session.decrypt(opaque)?;

            match plain.typ {
                ContentType::Alert => {
                    let msg = Message::try_from(plain)?;
                    if let Some(alert) = msg.alert().copied() {
                        if alert.is_fatal() {
                            warn!("peer sent alert {:?} {:?}", alert.level, alert.description);
                            return Err(Error::Protocol(ProtocolFailure::alert(
                                alert,
                                self.last_sent.clone(),
                                response.raw.clone(),
                            )));
                        }
                        warn!("ignoring warning alert {:?}", alert.description);
                    }
                    self.show("<-", &msg);
                    response.messages.push(msg);
                }
                ContentType::ChangeCipherSpec => {
                    let msg = Message {
                        version: plain.version,
                        payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload {}),
                    };
                    self.show("<-", &msg);
                    session.activate_read()?;
                    response.messages.push(msg);
                }
                ContentType::Handshake => {
                    let version = plain.version;
                    self.joiner
                        .take_message(plain)
                        .ok_or_else(|| Error::corrupt_message(ContentType::Handshake))?;

                    while let Some(raw) = self.joiner.frames.pop_front() {
                        self.on_handshake(session, &raw.parsed, &raw.encoded)?;
                        let msg = Message {
                            version,
                            payload: MessagePayload::Handshake(raw.parsed),
                        };
                        self.show("<-", &msg);
                        response.messages.push(msg);
                    }
                }
                ContentType::ApplicationData => {
                    let msg = Message::try_from(plain)?;
                    self.show("<-", &msg);
                    response.messages.push(msg);
                }
                typ => {
                    debug!("dropping record of type {:?}", typ);
                }
            }
        }

        Ok(())
    }

    fn on_handshake(
        &mut self,
        session: &mut CryptoSession,
        parsed: &HandshakeMessagePayload,
        encoded: &[u8],
    ) -> Result<(), Error> {
        match parsed.payload {
            HandshakePayload::HelloRequest => return Ok(()),
            HandshakePayload::ServerHello(ref hello) => session.on_server_hello(hello)?,
            HandshakePayload::Finished(ref verify_data) => {
                session.check_server_finished(&verify_data.0);
            }
            _ => {}
        }

        session.add_handshake(encoded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::{
        net::stream::MemoryStream,
        tls::msgs::{
            enums::{AlertDescription, AlertLevel, CipherSuite, Compression, ProtocolVersion},
            handshake::{Random, ServerHelloPayload, SessionID},
        },
    };

    fn transport(chunk: Option<usize>) -> RecordTransport<MemoryStream> {
        RecordTransport::new(MemoryStream::new(), Duration::from_millis(50))
            .with_chunking(chunk, Duration::from_millis(1))
    }

    fn alert(level: AlertLevel, description: AlertDescription) -> Vec<u8> {
        Message::build_alert(level, description)
            .create_opaque()
            .get_encoding()
    }

    #[test]
    fn chunking_splits_into_ceil_windows() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        for chunk in [1usize, 7, 10, 333, 1000, 4096] {
            let mut t = transport(Some(chunk));
            t.send_raw(&bytes).unwrap();

            let writes = t.stream().writes();
            assert_eq!(writes.len(), (bytes.len() + chunk - 1) / chunk);
            assert!(writes.iter().all(|w| w.len() <= chunk));
            assert_eq!(t.stream().written(), bytes);
        }
    }

    #[test]
    fn unchunked_send_is_a_single_write() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        t.send(
            &[
                Message::build_alert(AlertLevel::Warning, AlertDescription::RecordOverflow),
                Message::build_application_data(b"x".to_vec()),
            ],
            &mut session,
        )
        .unwrap();

        assert_eq!(t.stream().writes().len(), 1);
        assert_eq!(t.last_sent(), &t.stream().written()[..]);
    }

    #[test]
    fn chunked_and_unchunked_serializations_match() {
        let flight = [
            Message::build_alert(AlertLevel::Warning, AlertDescription::RecordOverflow),
            Message::build_application_data(b"GET / HTTP/1.1\r\n\r\n".to_vec()),
        ];

        let whole = transport(None);
        let mut session = CryptoSession::resume(&[1u8; 48], true).unwrap();
        let expected = whole.serialize(&flight, &mut session).unwrap();

        let mut chunked = transport(Some(3));
        let mut session = CryptoSession::resume(&[1u8; 48], true).unwrap();
        chunked.send(&flight, &mut session).unwrap();

        assert_eq!(chunked.stream().written(), expected);
        assert_eq!(chunked.stream().writes().len(), (expected.len() + 2) / 3);
    }

    /// Walks the record headers of `bytes`, returning each record's length.
    fn record_lengths(bytes: &[u8]) -> Vec<usize> {
        let mut lens = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let len = u16::from_be_bytes([rest[3], rest[4]]) as usize;
            lens.push(len);
            rest = &rest[5 + len..];
        }
        lens
    }

    #[test]
    fn large_payloads_span_several_records() {
        let t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        let bytes = t
            .serialize(
                &[Message::build_application_data(vec![0x41; 40_000])],
                &mut session,
            )
            .unwrap();

        assert_eq!(record_lengths(&bytes), [16384, 16384, 7232]);
        assert_eq!(bytes.len(), 40_000 + 3 * 5);
    }

    #[test]
    fn large_encrypted_payloads_keep_headers_consistent() {
        let t = transport(None);
        let mut session = CryptoSession::resume(&[1u8; 48], true).unwrap();
        session
            .on_server_hello(&ServerHelloPayload {
                legacy_version: ProtocolVersion::TLSv1_2,
                random: Random([9u8; 32]),
                session_id: SessionID::empty(),
                cipher_suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                compression_method: Compression::Null,
                extensions: vec![],
            })
            .unwrap();
        let bytes = t
            .serialize(
                &[
                    Message::build_change_cipher_spec(),
                    Message::build_application_data(vec![0x41; 20_000]),
                ],
                &mut session,
            )
            .unwrap();

        // CCS, then two sealed fragments: 8 byte explicit nonce and 16 byte tag each.
        assert_eq!(record_lengths(&bytes), [1, 16384 + 24, 3616 + 24]);
    }

    #[test]
    fn warning_alerts_do_not_end_the_receive() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        t.stream
            .add_to_inbound(&alert(AlertLevel::Warning, AlertDescription::UnrecognisedName));

        let response = t.receive(&mut session, Until::Deadline).unwrap();
        assert_eq!(response.warnings().count(), 1);
        assert!(!response.closed);
    }

    #[test]
    fn fatal_alert_carries_sent_and_received_bytes() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        let fatal = alert(AlertLevel::Fatal, AlertDescription::HandshakeFailure);
        t.stream.add_to_inbound(&fatal);

        let err = t
            .send_recv(
                &[Message::build_application_data(b"ping".to_vec())],
                &mut session,
                Until::Deadline,
            )
            .unwrap_err();

        match err {
            Error::Protocol(failure) => {
                let alert = failure.alert.unwrap();
                assert_eq!(alert.level, AlertLevel::Fatal);
                assert_eq!(alert.description, AlertDescription::HandshakeFailure);
                assert_eq!(failure.received, fatal);
                assert_eq!(failure.sent, t.stream().written());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_alert_level_is_fatal() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        t.stream
            .add_to_inbound(&[0x15, 0x03, 0x03, 0x00, 0x02, 0x07, 0x0a]);

        let err = t.receive(&mut session, Until::Deadline).unwrap_err();
        assert_eq!(err.alert().map(|a| a.level), Some(AlertLevel::Unknown(7)));
    }

    #[test]
    fn early_stop_on_expected_handshake() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        let done = Message::build_handshake(HandshakeMessagePayload::build(
            HandshakeType::ServerHelloDone,
            HandshakePayload::ServerHelloDone,
        ));
        t.stream.add_to_inbound(&done.create_opaque().get_encoding());

        let started = Instant::now();
        let response = t
            .receive(&mut session, Until::Handshake(HandshakeType::ServerHelloDone))
            .unwrap();
        assert!(response.has_handshake(HandshakeType::ServerHelloDone));
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(session.transcript().message_count(), 1);
    }

    #[test]
    fn eof_marks_response_closed() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        t.stream.close_inbound();

        let response = t.receive(&mut session, Until::Deadline).unwrap();
        assert!(response.closed);
        assert!(response.messages.is_empty());
    }

    #[test]
    fn garbage_response_is_structural() {
        let mut t = transport(None);
        let mut session = CryptoSession::new(true).unwrap();
        t.stream.add_to_inbound(b"HTTP/1.1 400 Bad Request\r\n\r\n");

        assert!(matches!(
            t.receive(&mut session, Until::Deadline),
            Err(Error::Structure(_))
        ));
    }
}
