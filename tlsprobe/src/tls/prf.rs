//! The TLS 1.2 pseudo-random function and the values derived through it.

use ring::hmac;

pub const MASTER_SECRET_LEN: usize = 48;
pub const VERIFY_DATA_LEN: usize = 12;

pub const MASTER_SECRET_LABEL: &[u8] = b"master secret";
pub const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";
pub const CLIENT_FINISHED_LABEL: &[u8] = b"client finished";
pub const SERVER_FINISHED_LABEL: &[u8] = b"server finished";

fn concat_sign(key: &hmac::Key, a: &[u8], b: &[u8]) -> hmac::Tag {
    let mut ctx = hmac::Context::with_key(key);
    ctx.update(a);
    ctx.update(b);
    ctx.sign()
}

fn p(out: &mut [u8], alg: hmac::Algorithm, secret: &[u8], seed: &[u8]) {
    let hmac_key = hmac::Key::new(alg, secret);

    // A(1)
    let mut current_a = hmac::sign(&hmac_key, seed);
    let chunk_size = alg.digest_algorithm().output_len;
    for chunk in out.chunks_mut(chunk_size) {
        // P_hash[i] = HMAC_hash(secret, A(i) + seed)
        let p_term = concat_sign(&hmac_key, current_a.as_ref(), seed);
        chunk.copy_from_slice(&p_term.as_ref()[..chunk.len()]);

        // A(i+1) = HMAC_hash(secret, A(i))
        current_a = hmac::sign(&hmac_key, current_a.as_ref());
    }
}

fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut ret = Vec::with_capacity(a.len() + b.len());
    ret.extend_from_slice(a);
    ret.extend_from_slice(b);
    ret
}

pub fn prf(out: &mut [u8], alg: hmac::Algorithm, secret: &[u8], label: &[u8], seed: &[u8]) {
    let joined_seed = concat(label, seed);
    p(out, alg, secret, &joined_seed);
}

/// master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)
pub fn master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> [u8; MASTER_SECRET_LEN] {
    let mut out = [0u8; MASTER_SECRET_LEN];
    prf(
        &mut out,
        hmac::HMAC_SHA256,
        pre_master_secret,
        MASTER_SECRET_LABEL,
        &concat(client_random, server_random),
    );
    out
}

/// The key block is seeded with the randoms in the opposite order to the
/// master secret.
pub fn key_block(
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    len: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; len];
    prf(
        &mut out,
        hmac::HMAC_SHA256,
        master_secret,
        KEY_EXPANSION_LABEL,
        &concat(server_random, client_random),
    );
    out
}

pub fn verify_data(master_secret: &[u8], label: &[u8], handshake_hash: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; VERIFY_DATA_LEN];
    prf(
        &mut out,
        hmac::HMAC_SHA256,
        master_secret,
        label,
        handshake_hash,
    );
    out
}
