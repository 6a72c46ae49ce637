use std::fmt;

use crate::codec::{self, Codec, Reader};

/// This type contains a single certificate by value.
///
/// The certificate is DER-encoded X.509 as it was found on the wire; nothing
/// guarantees that it parses.
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Certificate(pub Vec<u8>);

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Certificate")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

impl Codec for Certificate {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::u24(self.0.len() as u32).encode(bytes);
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader) -> Option<Self> {
        let len = usize::from(codec::u24::read(r)?);
        let mut sub = r.sub(len)?;
        let body = sub.rest().to_vec();
        Some(Self(body))
    }
}

#[cfg(test)]
mod test {
    use super::Certificate;

    #[test]
    fn certificate_debug() {
        assert_eq!(
            "Certificate(2 bytes)",
            format!("{:?}", Certificate(b"ab".to_vec()))
        );
    }
}
