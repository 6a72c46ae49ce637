//! TLS 1.2 wire structures and the client-side cryptographic state needed to
//! finish a handshake.

pub mod cert;
pub mod cipher;
pub mod hash_hs;
pub mod key;
pub mod key_exchange;
pub mod msgs;
pub mod prf;
pub mod session;
