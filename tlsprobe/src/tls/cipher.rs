//! AES-128-GCM record protection for TLS 1.2.

use ring::aead;

use crate::{
    error::Error,
    tls::{
        msgs::{
            base::Payload,
            enums::{ContentType, ProtocolVersion},
            message::{OpaqueMessage, PlainMessage},
        },
        prf,
    },
};

const GCM_EXPLICIT_NONCE_LEN: usize = 8;
const GCM_TAG_LEN: usize = 16;
const GCM_OVERHEAD: usize = GCM_EXPLICIT_NONCE_LEN + GCM_TAG_LEN;

const TLS12_AAD_SIZE: usize = 8 + 1 + 2 + 2;

const ENC_KEY_LEN: usize = 16;
const FIXED_IV_LEN: usize = 4;

/// Length of the key block for an AES-128-GCM suite, which has no MAC keys.
pub const KEY_BLOCK_LEN: usize = 2 * ENC_KEY_LEN + 2 * FIXED_IV_LEN;

fn make_tls12_aad(
    seq: u64,
    typ: ContentType,
    vers: ProtocolVersion,
    len: usize,
) -> aead::Aad<[u8; TLS12_AAD_SIZE]> {
    let mut out = [0; TLS12_AAD_SIZE];
    out[..8].copy_from_slice(&seq.to_be_bytes());
    out[8] = typ.get_u8();
    out[9..11].copy_from_slice(&vers.get_u16().to_be_bytes());
    out[11..].copy_from_slice(&(len as u16).to_be_bytes());
    aead::Aad::from(out)
}

fn make_nonce(salt: &[u8; FIXED_IV_LEN], explicit: &[u8]) -> Result<aead::Nonce, Error> {
    let mut nonce = [0u8; 12];
    nonce[..FIXED_IV_LEN].copy_from_slice(salt);
    nonce[FIXED_IV_LEN..].copy_from_slice(explicit);
    aead::Nonce::try_assume_unique_for_key(&nonce).map_err(Error::from)
}

fn make_key(key: &[u8]) -> Result<aead::LessSafeKey, Error> {
    let unbound = aead::UnboundKey::new(&aead::AES_128_GCM, key)?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Which end of the connection a set of keys protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// The write keys and implicit IVs for both directions of a connection.
#[derive(Clone)]
pub struct KeyBlock {
    client_key: [u8; ENC_KEY_LEN],
    server_key: [u8; ENC_KEY_LEN],
    client_iv: [u8; FIXED_IV_LEN],
    server_iv: [u8; FIXED_IV_LEN],
}

impl KeyBlock {
    pub fn derive(master_secret: &[u8], client_random: &[u8; 32], server_random: &[u8; 32]) -> Self {
        let block = prf::key_block(master_secret, client_random, server_random, KEY_BLOCK_LEN);

        let mut ret = Self {
            client_key: [0; ENC_KEY_LEN],
            server_key: [0; ENC_KEY_LEN],
            client_iv: [0; FIXED_IV_LEN],
            server_iv: [0; FIXED_IV_LEN],
        };

        let (client_key, rest) = block.split_at(ENC_KEY_LEN);
        let (server_key, rest) = rest.split_at(ENC_KEY_LEN);
        let (client_iv, server_iv) = rest.split_at(FIXED_IV_LEN);
        ret.client_key.copy_from_slice(client_key);
        ret.server_key.copy_from_slice(server_key);
        ret.client_iv.copy_from_slice(client_iv);
        ret.server_iv.copy_from_slice(server_iv);
        ret
    }

    /// Record protection for the given side: it writes with its own keys and
    /// reads with the peer's.
    pub fn split(&self, side: Side) -> Result<(GcmMessageEncrypter, GcmMessageDecrypter), Error> {
        let (ours, theirs) = match side {
            Side::Client => ((&self.client_key, self.client_iv), (&self.server_key, self.server_iv)),
            Side::Server => ((&self.server_key, self.server_iv), (&self.client_key, self.client_iv)),
        };

        Ok((
            GcmMessageEncrypter::new(ours.0, ours.1)?,
            GcmMessageDecrypter::new(theirs.0, theirs.1)?,
        ))
    }
}

pub struct GcmMessageEncrypter {
    enc_key: aead::LessSafeKey,
    iv: [u8; FIXED_IV_LEN],
}

impl GcmMessageEncrypter {
    fn new(key: &[u8], iv: [u8; FIXED_IV_LEN]) -> Result<Self, Error> {
        Ok(Self {
            enc_key: make_key(key)?,
            iv,
        })
    }

    /// The explicit part of the nonce is the record sequence number.
    pub fn encrypt(&self, msg: &PlainMessage, seq: u64) -> Result<OpaqueMessage, Error> {
        let explicit = seq.to_be_bytes();
        let nonce = make_nonce(&self.iv, &explicit)?;
        let aad = make_tls12_aad(seq, msg.typ, msg.version, msg.payload.0.len());

        let mut payload = Vec::with_capacity(GCM_OVERHEAD + msg.payload.0.len());
        payload.extend_from_slice(&explicit);
        payload.extend_from_slice(&msg.payload.0);

        let tag = self
            .enc_key
            .seal_in_place_separate_tag(nonce, aad, &mut payload[GCM_EXPLICIT_NONCE_LEN..])
            .map_err(|_| Error::Crypto("encrypt failed".to_string()))?;
        payload.extend_from_slice(tag.as_ref());

        Ok(OpaqueMessage {
            typ: msg.typ,
            version: msg.version,
            payload: Payload::new(payload),
        })
    }
}

pub struct GcmMessageDecrypter {
    dec_key: aead::LessSafeKey,
    dec_salt: [u8; FIXED_IV_LEN],
}

impl GcmMessageDecrypter {
    fn new(key: &[u8], salt: [u8; FIXED_IV_LEN]) -> Result<Self, Error> {
        Ok(Self {
            dec_key: make_key(key)?,
            dec_salt: salt,
        })
    }

    pub fn decrypt(&self, mut msg: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error> {
        let payload = &mut msg.payload.0;
        if payload.len() < GCM_OVERHEAD {
            return Err(Error::Crypto("record too short to decrypt".to_string()));
        }

        let nonce = make_nonce(&self.dec_salt, &payload[..GCM_EXPLICIT_NONCE_LEN])?;
        let aad = make_tls12_aad(seq, msg.typ, msg.version, payload.len() - GCM_OVERHEAD);

        let plain_len = self
            .dec_key
            .open_within(nonce, aad, payload, GCM_EXPLICIT_NONCE_LEN..)
            .map_err(|_| Error::Crypto("decrypt failed".to_string()))?
            .len();

        payload.truncate(plain_len);
        Ok(msg.into_plain_message())
    }
}
