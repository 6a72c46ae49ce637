#![allow(clippy::upper_case_acronyms)]

#[macro_use]
mod macros;

pub mod alert;
pub mod base;
pub mod ccs;
pub mod deframer;
#[allow(non_camel_case_types)]
pub mod enums;
#[allow(non_camel_case_types)]
pub mod handshake;
pub mod message;
