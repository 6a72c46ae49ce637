//! Full and abbreviated TLS 1.2 handshakes driven message by message.
//!
//! A [`TlsHandshake`] runs one attempt at a time. Every attempt owns its
//! [`Connection`], [`CryptoSession`] and [`Injector`], and all three are gone
//! once the public operation returns. What the attempt learned (server
//! certificate, master secret, session ticket, HTTP response, failure) stays
//! on the [`TlsHandshake`] for inspection.

use log::{debug, error, info, warn};

use crate::{
    config::HandshakeConfig,
    error::Error,
    inject::{FaultPlan, Injector},
    net::{Connection, RecordTransport, Response, Stream, Until},
    tls::{
        cert::CertificateRecord,
        key::Certificate,
        msgs::{
            enums::HandshakeType, handshake::HandshakePayload, message::Message,
        },
        session::CryptoSession,
    },
};

pub mod builder;
mod exercise;
mod full;
mod resume;

pub use builder::MessageBuilder;
pub use exercise::GOOD_RESPONSE;

/// Session id of every abbreviated handshake; a non-empty id asks the server
/// to resume.
pub const RESUMPTION_SESSION_ID: [u8; 32] = [0x38; 32];

/// Progress of a handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    SentClientHello,
    GotServerCert,
    SentClientKeyExchangeAndCcs,
    /// Abbreviated handshakes only.
    GotServerCcs,
    SentFinished,
    Complete,
    Failed,
}

/// State of one attempt. Dropping it closes the connection.
pub(crate) struct Attempt<'c, 'p, S: Stream> {
    builder: MessageBuilder<'c>,
    strict_resumption: bool,
    transport: RecordTransport<S>,
    session: CryptoSession,
    injector: Injector<'p>,
    state: HandshakeState,
    certificate: Option<Certificate>,
    ticket: Option<Vec<u8>>,
    http_response: Option<Vec<u8>>,
}

impl<'c, 'p, S: Stream> Attempt<'c, 'p, S> {
    pub(crate) fn new(
        config: &'c HandshakeConfig,
        stream: S,
        session: CryptoSession,
        plan: Option<FaultPlan<'p>>,
    ) -> Self {
        let transport = RecordTransport::new(stream, config.io_timeout())
            .with_chunking(config.chunk(), config.pacing())
            .with_verbose(config.verbose());

        Self {
            builder: MessageBuilder::new(config),
            strict_resumption: config.strict_resumption(),
            transport,
            session,
            injector: Injector::new(plan),
            state: HandshakeState::Start,
            certificate: None,
            ticket: None,
            http_response: None,
        }
    }

    fn advance(&mut self, state: HandshakeState) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Sends a flight unless the fault plan replaces it with a corrupt record.
    fn send_scheduled(&mut self, flight: &[Message]) -> Result<(), Error> {
        match self.injector.maybe_inject() {
            Some(corrupt) => {
                info!("replacing {} scheduled message(s) by a corrupt record", flight.len());
                self.transport.send_raw(&corrupt)
            }
            None => self.transport.send(flight, &mut self.session),
        }
    }

    fn send_recv_scheduled(&mut self, flight: &[Message], until: Until) -> Result<Response, Error> {
        self.send_scheduled(flight)?;
        self.transport.receive(&mut self.session, until)
    }

    fn note_ticket(&mut self, response: &Response) {
        if let Some(HandshakePayload::NewSessionTicket(nst)) =
            response.find_handshake(HandshakeType::NewSessionTicket)
        {
            debug!(
                "got session ticket of {} bytes, lifetime {}s",
                nst.ticket.0.len(),
                nst.lifetime_hint
            );
            self.ticket = Some(nst.ticket.0.clone());
        }
    }
}

/// Client driving handshakes against one configured server.
///
/// ```no_run
/// use tlsprobe::{config::HandshakeConfig, handshake::TlsHandshake};
///
/// let config = HandshakeConfig::builder().addr("127.0.0.1").port(8443).build()?;
/// let mut hs = TlsHandshake::new(config);
/// assert!(hs.do_12(None));
/// # Ok::<(), tlsprobe::error::Error>(())
/// ```
#[derive(Debug)]
pub struct TlsHandshake {
    config: HandshakeConfig,
    state: HandshakeState,
    progress: HandshakeState,
    certificate: Option<Certificate>,
    http_response: Option<Vec<u8>>,
    master_secret: Option<Vec<u8>>,
    ticket: Option<Vec<u8>>,
    failure: Option<Error>,
}

impl TlsHandshake {
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Start,
            progress: HandshakeState::Start,
            certificate: None,
            http_response: None,
            master_secret: None,
            ticket: None,
            failure: None,
        }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// Full handshake without application data.
    pub fn do_12_handshake(&mut self, plan: Option<FaultPlan<'_>>) -> bool {
        let config = self.config.clone();
        self.run(&config, None, plan, |attempt| attempt.full_handshake())
    }

    /// Full handshake followed by one HTTP request.
    pub fn do_12(&mut self, plan: Option<FaultPlan<'_>>) -> bool {
        let config = self.config.clone();
        self.run(&config, None, plan, |attempt| {
            attempt.full_handshake()?;
            attempt.exercise()
        })
    }

    /// Abbreviated handshake with a master secret and ticket from an earlier
    /// connection, followed by one HTTP request.
    pub fn do_12_resume(
        &mut self,
        master_secret: &[u8],
        ticket: &[u8],
        plan: Option<FaultPlan<'_>>,
    ) -> bool {
        let config = match self
            .config
            .for_resumption(ticket, RESUMPTION_SESSION_ID.to_vec())
        {
            Ok(config) => config,
            Err(err) => {
                self.reset();
                error!("resumption not attempted: {}", err);
                self.state = HandshakeState::Failed;
                self.failure = Some(err);
                return false;
            }
        };
        self.run(&config, Some(master_secret), plan, |attempt| {
            attempt.abbreviated_handshake()?;
            attempt.exercise()
        })
    }

    fn run<F>(
        &mut self,
        config: &HandshakeConfig,
        master_secret: Option<&[u8]>,
        plan: Option<FaultPlan<'_>>,
        steps: F,
    ) -> bool
    where
        F: FnOnce(&mut Attempt<'_, '_, Connection>) -> Result<(), Error>,
    {
        self.reset();

        let session = match master_secret {
            Some(master_secret) => CryptoSession::resume(master_secret, config.deterministic()),
            None => CryptoSession::new(config.deterministic()),
        };

        let result = session.and_then(|session| {
            let conn = Connection::establish(
                config.addr(),
                config.port(),
                config.io_timeout(),
                config.chunk().is_some(),
            )?;
            let mut attempt = Attempt::new(config, conn, session, plan);
            let result = steps(&mut attempt);
            self.absorb(attempt);
            result
        });

        match result {
            Ok(()) => {
                info!("handshake with {}:{} complete", config.addr(), config.port());
                self.state = HandshakeState::Complete;
                true
            }
            Err(err) => {
                error!("handshake failed after {:?}: {}", self.progress, err);
                self.state = HandshakeState::Failed;
                self.failure = Some(err);
                false
            }
        }
    }

    fn reset(&mut self) {
        self.state = HandshakeState::Start;
        self.progress = HandshakeState::Start;
        self.certificate = None;
        self.http_response = None;
        self.master_secret = None;
        self.ticket = None;
        self.failure = None;
    }

    fn absorb<S: Stream>(&mut self, attempt: Attempt<'_, '_, S>) {
        if attempt.injector.is_armed() {
            warn!("fault plan never reached its target send");
        }

        self.progress = attempt.state;
        self.state = attempt.state;
        self.master_secret = attempt.session.master_secret().map(<[u8]>::to_vec);
        self.certificate = attempt.certificate;
        self.ticket = attempt.ticket;
        self.http_response = attempt.http_response;
    }

    /// `Complete` or `Failed` once an operation returned.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The last step the most recent attempt reached.
    pub fn progress(&self) -> HandshakeState {
        self.progress
    }

    /// Why the most recent attempt failed.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Leaf certificate of the most recent full handshake.
    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn certificate_record(&self) -> Result<CertificateRecord, Error> {
        let cert = self
            .certificate
            .as_ref()
            .ok_or_else(|| Error::Certificate("no server certificate captured".to_string()))?;
        CertificateRecord::from_der(&cert.0)
    }

    fn captured_record(&self) -> Result<CertificateRecord, Error> {
        assert!(
            self.certificate.is_some(),
            "certificate check without a captured server certificate"
        );
        self.certificate_record()
    }

    /// Checks the issuer CommonName of the captured certificate by suffix.
    ///
    /// # Panics
    ///
    /// If no full handshake captured a certificate.
    pub fn x509_check_cn(&self, cn: &str) -> Result<bool, Error> {
        self.captured_record()?.check_cn(cn)
    }

    /// Checks the issuer OrganizationName of the captured certificate by
    /// suffix.
    ///
    /// # Panics
    ///
    /// If no full handshake captured a certificate.
    pub fn x509_check_issuer(&self, issuer: &str) -> Result<bool, Error> {
        self.captured_record()?.check_issuer(issuer)
    }

    pub fn http_response(&self) -> Option<&[u8]> {
        self.http_response.as_deref()
    }

    pub fn master_secret(&self) -> Option<&[u8]> {
        self.master_secret.as_deref()
    }

    /// Ticket from the server's NewSessionTicket, if it sent one.
    pub fn ticket(&self) -> Option<&[u8]> {
        self.ticket.as_deref()
    }
}
