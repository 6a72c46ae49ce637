//! Per-attempt cryptographic state of the client side of a TLS 1.2 connection.

use log::{debug, trace};
use ring::rand::{SecureRandom, SystemRandom};

use crate::{
    error::Error,
    tls::{
        cipher::{GcmMessageDecrypter, GcmMessageEncrypter, KeyBlock, Side},
        hash_hs::HandshakeHash,
        key_exchange::KeyExchange,
        msgs::{
            enums::{CipherSuite, ContentType},
            handshake::{Random, ServerECDHParams, ServerHelloPayload},
            message::{OpaqueMessage, PlainMessage},
        },
        prf,
    },
};

/// Suites whose record protection is implemented.
pub const SUPPORTED_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
];

/// The client random used when runs must be reproducible: a fixed
/// `gmt_unix_time` followed by 28 fixed bytes.
pub fn deterministic_random() -> Random {
    let mut bytes = [0x11u8; 32];
    bytes[..4].copy_from_slice(&0x2222_2222u32.to_be_bytes());
    Random(bytes)
}

fn fresh_random() -> Result<Random, Error> {
    let mut bytes = [0u8; 32];
    SystemRandom::new().fill(&mut bytes)?;
    Ok(Random(bytes))
}

/// One direction of record protection with its sequence number.
struct Direction<T> {
    cipher: Option<T>,
    seq: u64,
}

impl<T> Direction<T> {
    fn new() -> Self {
        Self {
            cipher: None,
            seq: 0,
        }
    }

    fn activate(&mut self, cipher: T) {
        self.cipher = Some(cipher);
        self.seq = 0;
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }
}

/// Outcome of checking the peer's Finished message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerFinished {
    NotReceived,
    Verified,
    Mismatch,
}

pub struct CryptoSession {
    deterministic: bool,
    client_random: Random,
    server_random: Option<Random>,
    suite: Option<CipherSuite>,
    master_secret: Option<Vec<u8>>,
    resumed: bool,
    transcript: HandshakeHash,
    keys: Option<KeyBlock>,
    write: Direction<GcmMessageEncrypter>,
    read: Direction<GcmMessageDecrypter>,
    peer_finished: PeerFinished,
}

impl CryptoSession {
    /// A session for a full handshake.
    pub fn new(deterministic: bool) -> Result<Self, Error> {
        let client_random = if deterministic {
            deterministic_random()
        } else {
            fresh_random()?
        };

        Ok(Self {
            deterministic,
            client_random,
            server_random: None,
            suite: None,
            master_secret: None,
            resumed: false,
            transcript: HandshakeHash::new(),
            keys: None,
            write: Direction::new(),
            read: Direction::new(),
            peer_finished: PeerFinished::NotReceived,
        })
    }

    /// A session seeded with the master secret of an earlier connection. Key
    /// exchange never runs for it.
    pub fn resume(master_secret: &[u8], deterministic: bool) -> Result<Self, Error> {
        if master_secret.len() != prf::MASTER_SECRET_LEN {
            return Err(Error::Crypto(format!(
                "master secret must be {} bytes, got {}",
                prf::MASTER_SECRET_LEN,
                master_secret.len()
            )));
        }

        let mut session = Self::new(deterministic)?;
        session.master_secret = Some(master_secret.to_vec());
        session.resumed = true;
        Ok(session)
    }

    pub fn client_random(&self) -> Random {
        self.client_random
    }

    pub fn suite(&self) -> Option<CipherSuite> {
        self.suite
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn master_secret(&self) -> Option<&[u8]> {
        self.master_secret.as_deref()
    }

    pub fn transcript(&self) -> &HandshakeHash {
        &self.transcript
    }

    /// Appends one encoded handshake message to the transcript.
    pub fn add_handshake(&mut self, encoded: &[u8]) {
        self.transcript.update_raw(encoded);
    }

    /// Records the server's choice. A resumed session derives its keys here
    /// since the master secret is already known.
    pub fn on_server_hello(&mut self, hello: &ServerHelloPayload) -> Result<(), Error> {
        if !SUPPORTED_SUITES.contains(&hello.cipher_suite) {
            return Err(Error::Crypto(format!(
                "server selected unsupported suite {:?}",
                hello.cipher_suite
            )));
        }

        debug!("server selected {:?}", hello.cipher_suite);
        self.suite = Some(hello.cipher_suite);
        self.server_random = Some(hello.random);

        if self.master_secret.is_some() {
            self.derive_keys()?;
        }
        Ok(())
    }

    /// Runs ECDHE against the server's parameters and derives the master
    /// secret and key block. Returns the public point for ClientKeyExchange.
    pub fn client_key_exchange(&mut self, params: &ServerECDHParams) -> Result<Vec<u8>, Error> {
        if self.resumed {
            return Err(Error::Crypto(
                "key exchange requested on a resumed session".to_string(),
            ));
        }

        let server_random = self.server_random()?;
        let group = params.curve_params.named_group;
        let kx = KeyExchange::start(group, self.deterministic)?;
        let pubkey = kx.pubkey().to_vec();
        let premaster = kx.complete(&params.public.0)?;

        let master = prf::master_secret(&premaster, &self.client_random.0, &server_random.0);
        trace!("master secret {}", hex::encode(master));
        self.master_secret = Some(master.to_vec());
        self.derive_keys()?;

        Ok(pubkey)
    }

    fn server_random(&self) -> Result<Random, Error> {
        self.server_random
            .ok_or_else(|| Error::structure("no ServerHello received"))
    }

    fn master(&self) -> Result<&[u8], Error> {
        self.master_secret
            .as_deref()
            .ok_or_else(|| Error::Crypto("no master secret established".to_string()))
    }

    fn derive_keys(&mut self) -> Result<(), Error> {
        let server_random = self.server_random()?;
        let keys = KeyBlock::derive(self.master()?, &self.client_random.0, &server_random.0);
        self.keys = Some(keys);
        Ok(())
    }

    fn key_block(&self) -> Result<&KeyBlock, Error> {
        self.keys
            .as_ref()
            .ok_or_else(|| Error::Crypto("session keys are not derived yet".to_string()))
    }

    /// Switches outgoing records to encryption, right after our ChangeCipherSpec.
    pub fn activate_write(&mut self) -> Result<(), Error> {
        let (encrypter, _) = self.key_block()?.split(Side::Client)?;
        self.write.activate(encrypter);
        debug!("write encryption active");
        Ok(())
    }

    /// Switches incoming records to decryption, right after the server's
    /// ChangeCipherSpec.
    pub fn activate_read(&mut self) -> Result<(), Error> {
        let (_, decrypter) = self.key_block()?.split(Side::Client)?;
        self.read.activate(decrypter);
        debug!("read decryption active");
        Ok(())
    }

    pub fn is_write_encrypted(&self) -> bool {
        self.write.cipher.is_some()
    }

    pub fn is_read_encrypted(&self) -> bool {
        self.read.cipher.is_some()
    }

    /// verify_data for our Finished over the transcript so far.
    pub fn client_verify_data(&self) -> Result<Vec<u8>, Error> {
        let hash = self.transcript.get_current_hash();
        Ok(prf::verify_data(
            self.master()?,
            prf::CLIENT_FINISHED_LABEL,
            hash.as_ref(),
        ))
    }

    /// verify_data the server's Finished must carry, given the transcript so
    /// far.
    pub fn server_verify_data(&self) -> Result<Vec<u8>, Error> {
        let hash = self.transcript.get_current_hash();
        Ok(prf::verify_data(
            self.master()?,
            prf::SERVER_FINISHED_LABEL,
            hash.as_ref(),
        ))
    }

    /// Checks a received server Finished against the transcript that
    /// precedes it. Must run before the message joins the transcript.
    pub fn check_server_finished(&mut self, verify_data: &[u8]) -> PeerFinished {
        self.peer_finished = match self.server_verify_data() {
            Ok(expected) if expected == verify_data => PeerFinished::Verified,
            _ => PeerFinished::Mismatch,
        };
        debug!("server Finished: {:?}", self.peer_finished);
        self.peer_finished
    }

    pub fn peer_finished(&self) -> PeerFinished {
        self.peer_finished
    }

    /// Encrypts the record if write encryption is active.
    pub fn encrypt(&mut self, msg: PlainMessage) -> Result<OpaqueMessage, Error> {
        let seq = self.write.next_seq();
        match self.write.cipher {
            Some(ref encrypter) => encrypter.encrypt(&msg, seq),
            None => Ok(msg.into_unencrypted_opaque()),
        }
    }

    /// Decrypts the record if read encryption is active. ChangeCipherSpec is
    /// never protected.
    pub fn decrypt(&mut self, msg: OpaqueMessage) -> Result<PlainMessage, Error> {
        if msg.typ == ContentType::ChangeCipherSpec {
            return Ok(msg.into_plain_message());
        }

        if self.read.cipher.is_none() {
            return Ok(msg.into_plain_message());
        }

        let seq = self.read.next_seq();
        match self.read.cipher {
            Some(ref decrypter) => decrypter.decrypt(msg, seq),
            None => Ok(msg.into_plain_message()),
        }
    }
}
