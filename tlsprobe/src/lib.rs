//! A TLS 1.2 client that builds every handshake message itself, so that
//! each field, every record boundary and the timing of the transmission stay
//! under the caller's control.
//!
//! ### Layers
//!
//! - [`tls::msgs`] encodes and decodes the records and handshake messages,
//!   following the rustls message types.
//! - [`tls::session::CryptoSession`] holds the key exchange, the TLS 1.2 PRF,
//!   AES-GCM record protection and the transcript hash, on top of
//!   [ring](https://github.com/briansmith/ring).
//! - [`net`] owns the socket and the record layer, which can split a
//!   transmission into paced chunks.
//! - [`handshake::TlsHandshake`] drives full and abbreviated handshakes and
//!   an HTTP request over the result. An optional [`inject::FaultPlan`]
//!   replaces one scheduled transmission by a corrupt record.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod handshake;
pub mod inject;
pub mod log;
pub mod net;
#[allow(clippy::ptr_arg)]
pub mod tls;
