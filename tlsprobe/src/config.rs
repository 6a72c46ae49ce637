//! Handshake configuration.
//!
//! A [`HandshakeConfig`] is produced once by [`HandshakeConfigBuilder`] and
//! never changes afterwards. Profiles can be kept in TOML files:
//!
//! ```toml
//! addr = "127.0.0.1"
//! port = 8443
//! chunk = 8
//! server_names = ["tempesta-tech.com"]
//! signature_algorithms = [0x0403]
//! ticket = { mode = "value", hex = "7469636b6574" }
//!
//! [[extensions]]
//! typ = 0x1234
//! hex = "00"
//! ```

use std::{fs, path::Path, time::Duration};

use log::debug;
use serde::Deserialize;

use crate::{
    codec::Codec,
    error::Error,
    handshake::MessageBuilder,
    tls::msgs::{
        base::Payload,
        enums::{CipherSuite, Compression, ExtensionType, NamedGroup, SignatureScheme},
        handshake::{ClientExtension, UnknownExtension},
    },
};

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_SERVER_NAME: &str = "localhost";
pub const DEFAULT_TICKET: &[u8] = b"ticket_data";

/// Shortest pause between two chunks of a fragmented send.
pub const MIN_PACING: Duration = Duration::from_millis(1);

/// Amount of data a chunked send must be able to push within the I/O timeout
/// at one chunk per millisecond.
const CHUNKED_BYTES_PER_TIMEOUT: u64 = 10_000;

/// Payload of the session ticket extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketMode {
    /// The extension is omitted.
    Disabled,
    /// The extension is present with an empty body.
    Empty,
    /// The extension carries these bytes.
    Value(Vec<u8>),
}

impl Default for TicketMode {
    fn default() -> Self {
        TicketMode::Value(DEFAULT_TICKET.to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    addr: String,
    port: u16,
    io_timeout: Duration,
    chunk: Option<usize>,
    pacing: Duration,
    verbose: bool,
    deterministic: bool,
    server_names: Vec<String>,
    host: Option<String>,
    extra_extensions: Vec<ClientExtension>,
    signature_algorithms: Option<Vec<SignatureScheme>>,
    supported_groups: Option<Vec<NamedGroup>>,
    renegotiation_info: Option<Vec<u8>>,
    cipher_suites: Vec<CipherSuite>,
    compressions: Vec<Compression>,
    ticket: TicketMode,
    session_id: Vec<u8>,
    strict_resumption: bool,
}

impl HandshakeConfig {
    pub fn builder() -> HandshakeConfigBuilder {
        HandshakeConfigBuilder::default()
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        HandshakeConfigBuilder::from_toml_file(path)?.build()
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Effective timeout for connect, send and receive.
    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    pub fn chunk(&self) -> Option<usize> {
        self.chunk
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn deterministic(&self) -> bool {
        self.deterministic
    }

    pub fn server_names(&self) -> &[String] {
        &self.server_names
    }

    /// Value of the Host header: the configured host, else the first server
    /// name, else [`DEFAULT_SERVER_NAME`].
    pub fn http_host(&self) -> &str {
        self.host
            .as_deref()
            .or_else(|| self.server_names.first().map(String::as_str))
            .unwrap_or(DEFAULT_SERVER_NAME)
    }

    pub fn extra_extensions(&self) -> &[ClientExtension] {
        &self.extra_extensions
    }

    pub fn signature_algorithms(&self) -> Option<&[SignatureScheme]> {
        self.signature_algorithms.as_deref()
    }

    pub fn supported_groups(&self) -> Option<&[NamedGroup]> {
        self.supported_groups.as_deref()
    }

    pub fn renegotiation_info(&self) -> Option<&[u8]> {
        self.renegotiation_info.as_deref()
    }

    /// Suites offered after the mandatory baseline suite.
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Compression methods offered after NULL.
    pub fn compressions(&self) -> &[Compression] {
        &self.compressions
    }

    pub fn ticket(&self) -> &TicketMode {
        &self.ticket
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn strict_resumption(&self) -> bool {
        self.strict_resumption
    }

    /// The configuration an abbreviated handshake runs with: the given
    /// ticket, a non-empty session id and no compression besides NULL.
    /// Fails with [`Error::Config`] when the ticket pushes the ClientHello
    /// past its length prefixes.
    pub(crate) fn for_resumption(&self, ticket: &[u8], session_id: Vec<u8>) -> Result<Self, Error> {
        let mut resumed = self.clone();
        resumed.ticket = TicketMode::Value(ticket.to_vec());
        resumed.session_id = session_id;
        resumed.compressions.clear();
        resumed.check_lengths()?;
        Ok(resumed)
    }

    /// Every variable-length ClientHello field must fit its length prefix,
    /// otherwise the encoder would truncate the prefix and desync the record.
    fn check_lengths(&self) -> Result<(), Error> {
        let too_long = |what: &str, len: usize, max: usize| {
            Error::Config(format!("{} of {} bytes exceeds the {} byte limit", what, len, max))
        };

        if self.session_id.len() > u8::MAX as usize {
            return Err(too_long("session id", self.session_id.len(), u8::MAX as usize));
        }
        if let Some(ref info) = self.renegotiation_info {
            if info.len() > u8::MAX as usize {
                return Err(too_long("renegotiation info", info.len(), u8::MAX as usize));
            }
        }

        let suites_len = (self.cipher_suites.len() + 1) * 2;
        if suites_len > u16::MAX as usize {
            return Err(too_long("cipher suite list", suites_len, u16::MAX as usize));
        }
        let compressions_len = self.compressions.len() + 1;
        if compressions_len > u8::MAX as usize {
            return Err(too_long("compression list", compressions_len, u8::MAX as usize));
        }

        let extensions_len: usize = MessageBuilder::new(self)
            .hello_extensions()
            .iter()
            .map(|ext| ext.get_encoding().len())
            .sum();
        if extensions_len > u16::MAX as usize {
            return Err(too_long("extension block", extensions_len, u16::MAX as usize));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HandshakeConfigBuilder {
    addr: String,
    port: u16,
    io_timeout: Duration,
    chunk: Option<usize>,
    pacing: Duration,
    verbose: bool,
    deterministic: bool,
    server_names: Option<Vec<String>>,
    host: Option<String>,
    extra_extensions: Vec<ClientExtension>,
    signature_algorithms: Option<Vec<SignatureScheme>>,
    supported_groups: Option<Vec<NamedGroup>>,
    renegotiation_info: Option<Vec<u8>>,
    cipher_suites: Vec<CipherSuite>,
    compressions: Vec<Compression>,
    ticket: TicketMode,
    session_id: Vec<u8>,
    strict_resumption: bool,
}

impl Default for HandshakeConfigBuilder {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            chunk: None,
            pacing: MIN_PACING,
            verbose: false,
            deterministic: true,
            server_names: None,
            host: None,
            extra_extensions: Vec::new(),
            signature_algorithms: None,
            supported_groups: None,
            renegotiation_info: None,
            cipher_suites: Vec::new(),
            compressions: Vec::new(),
            ticket: TicketMode::default(),
            session_id: Vec::new(),
            strict_resumption: false,
        }
    }
}

impl HandshakeConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Splits every transmission into writes of `chunk` bytes.
    pub fn chunk(mut self, chunk: usize) -> Self {
        self.chunk = Some(chunk);
        self
    }

    /// Pause after every chunk; never shorter than [`MIN_PACING`].
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Fixed client random and ephemeral key, for servers built to replay
    /// deterministic handshakes.
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Replaces the SNI list. An empty list omits the extension.
    pub fn server_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.server_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Appends an extension placed before all generated ones.
    pub fn extension(mut self, extension: ClientExtension) -> Self {
        self.extra_extensions.push(extension);
        self
    }

    pub fn signature_algorithms(mut self, schemes: Vec<SignatureScheme>) -> Self {
        self.signature_algorithms = Some(schemes);
        self
    }

    pub fn supported_groups(mut self, groups: Vec<NamedGroup>) -> Self {
        self.supported_groups = Some(groups);
        self
    }

    pub fn renegotiation_info(mut self, info: Vec<u8>) -> Self {
        self.renegotiation_info = Some(info);
        self
    }

    pub fn cipher_suite(mut self, suite: CipherSuite) -> Self {
        self.cipher_suites.push(suite);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compressions.push(compression);
        self
    }

    pub fn ticket(mut self, ticket: TicketMode) -> Self {
        self.ticket = ticket;
        self
    }

    pub fn session_id(mut self, session_id: Vec<u8>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Require the server's ChangeCipherSpec and a valid Finished after an
    /// abbreviated handshake.
    pub fn strict_resumption(mut self, strict: bool) -> Self {
        self.strict_resumption = strict;
        self
    }

    pub fn build(self) -> Result<HandshakeConfig, Error> {
        if self.chunk == Some(0) {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }

        let server_names = self
            .server_names
            .unwrap_or_else(|| vec![DEFAULT_SERVER_NAME.to_string()]);
        for name in &server_names {
            if webpki::DnsNameRef::try_from_ascii_str(name).is_err() {
                debug!("server name {:?} is not a valid DNS name, sending as is", name);
            }
        }

        let pacing = self.pacing.max(MIN_PACING);
        let io_timeout = match self.chunk {
            Some(chunk) if (chunk as u64) < CHUNKED_BYTES_PER_TIMEOUT => {
                let needed = Duration::from_millis(CHUNKED_BYTES_PER_TIMEOUT / chunk as u64);
                self.io_timeout.max(needed)
            }
            _ => self.io_timeout,
        };

        let config = HandshakeConfig {
            addr: self.addr,
            port: self.port,
            io_timeout,
            chunk: self.chunk,
            pacing,
            verbose: self.verbose,
            deterministic: self.deterministic,
            server_names,
            host: self.host,
            extra_extensions: self.extra_extensions,
            signature_algorithms: self.signature_algorithms,
            supported_groups: self.supported_groups,
            renegotiation_info: self.renegotiation_info,
            cipher_suites: self.cipher_suites,
            compressions: self.compressions,
            ticket: self.ticket,
            session_id: self.session_id,
            strict_resumption: self.strict_resumption,
        };
        config.check_lengths()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let file: ConfigFile = toml::from_str(content)?;
        file.into_builder()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", content = "hex", rename_all = "lowercase")]
enum TicketFile {
    Disabled,
    Empty,
    Value(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtensionFile {
    typ: u16,
    #[serde(default)]
    hex: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    addr: Option<String>,
    port: Option<u16>,
    timeout_ms: Option<u64>,
    chunk: Option<usize>,
    pacing_ms: Option<u64>,
    verbose: Option<bool>,
    deterministic: Option<bool>,
    server_names: Option<Vec<String>>,
    host: Option<String>,
    #[serde(default)]
    extensions: Vec<ExtensionFile>,
    signature_algorithms: Option<Vec<u16>>,
    supported_groups: Option<Vec<u16>>,
    renegotiation_info: Option<String>,
    #[serde(default)]
    cipher_suites: Vec<u16>,
    #[serde(default)]
    compressions: Vec<u8>,
    ticket: Option<TicketFile>,
    session_id: Option<String>,
    strict_resumption: Option<bool>,
}

impl ConfigFile {
    fn into_builder(self) -> Result<HandshakeConfigBuilder, Error> {
        let mut builder = HandshakeConfigBuilder::default();

        if let Some(addr) = self.addr {
            builder = builder.addr(addr);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(ms) = self.timeout_ms {
            builder = builder.io_timeout(Duration::from_millis(ms));
        }
        if let Some(chunk) = self.chunk {
            builder = builder.chunk(chunk);
        }
        if let Some(ms) = self.pacing_ms {
            builder = builder.pacing(Duration::from_millis(ms));
        }
        if let Some(verbose) = self.verbose {
            builder = builder.verbose(verbose);
        }
        if let Some(deterministic) = self.deterministic {
            builder = builder.deterministic(deterministic);
        }
        if let Some(names) = self.server_names {
            builder = builder.server_names(names);
        }
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        for ext in self.extensions {
            builder = builder.extension(ClientExtension::Unknown(UnknownExtension {
                typ: ExtensionType::from(ext.typ),
                payload: Payload::new(hex::decode(ext.hex)?),
            }));
        }
        if let Some(schemes) = self.signature_algorithms {
            builder =
                builder.signature_algorithms(schemes.into_iter().map(SignatureScheme::from).collect());
        }
        if let Some(groups) = self.supported_groups {
            builder = builder.supported_groups(groups.into_iter().map(NamedGroup::from).collect());
        }
        if let Some(info) = self.renegotiation_info {
            builder = builder.renegotiation_info(hex::decode(info)?);
        }
        for suite in self.cipher_suites {
            builder = builder.cipher_suite(CipherSuite::from(suite));
        }
        for compression in self.compressions {
            builder = builder.compression(Compression::from(compression));
        }
        if let Some(ticket) = self.ticket {
            builder = builder.ticket(match ticket {
                TicketFile::Disabled => TicketMode::Disabled,
                TicketFile::Empty => TicketMode::Empty,
                TicketFile::Value(data) => TicketMode::Value(hex::decode(data)?),
            });
        }
        if let Some(session_id) = self.session_id {
            builder = builder.session_id(hex::decode(session_id)?);
        }
        if let Some(strict) = self.strict_resumption {
            builder = builder.strict_resumption(strict);
        }

        Ok(builder)
    }
}
