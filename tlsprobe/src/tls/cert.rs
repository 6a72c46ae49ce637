use std::fmt;

use x509_parser::{
    oid_registry::{Oid, OID_X509_COMMON_NAME, OID_X509_ORGANIZATION_NAME},
    prelude::{FromDer, X509Certificate, X509Name},
};

use crate::{error::Error, tls::key::Certificate};

/// The server's leaf certificate as retained after a handshake.
///
/// Only the two attributes the checks need are extracted; they are looked up
/// by attribute type, so a certificate whose distinguished names use
/// unusual encodings still yields them.
#[derive(Clone)]
pub struct CertificateRecord {
    der: Certificate,
    issuer_common_name: Option<String>,
    issuer_organization: Option<String>,
}

impl fmt::Debug for CertificateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRecord")
            .field("issuer_common_name", &self.issuer_common_name)
            .field("issuer_organization", &self.issuer_organization)
            .finish()
    }
}

fn first_attribute<'a>(name: &X509Name<'a>, oid: &Oid<'a>) -> Result<Option<String>, Error> {
    match name.iter_by_oid(oid).next() {
        Some(attr) => attr
            .as_str()
            .map(|value| Some(value.to_owned()))
            .map_err(|err| Error::Certificate(format!("attribute {} is not a string: {}", oid, err))),
        None => Ok(None),
    }
}

impl CertificateRecord {
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|err| Error::Certificate(format!("failed to parse certificate: {}", err)))?;

        Ok(Self {
            der: Certificate(der.to_vec()),
            issuer_common_name: first_attribute(cert.issuer(), &OID_X509_COMMON_NAME)?,
            issuer_organization: first_attribute(cert.issuer(), &OID_X509_ORGANIZATION_NAME)?,
        })
    }

    pub fn der(&self) -> &Certificate {
        &self.der
    }

    /// CommonName (2.5.4.3) of the issuer.
    pub fn issuer_common_name(&self) -> Option<&str> {
        self.issuer_common_name.as_deref()
    }

    /// OrganizationName (2.5.4.10) of the issuer.
    pub fn issuer_organization(&self) -> Option<&str> {
        self.issuer_organization.as_deref()
    }

    /// Whether the issuer CommonName ends with `expected`. A certificate
    /// without one is an error, not a mismatch.
    pub fn check_cn(&self, expected: &str) -> Result<bool, Error> {
        self.issuer_common_name()
            .map(|cn| cn.ends_with(expected))
            .ok_or_else(|| Error::Certificate("certificate has no CommonName".to_string()))
    }

    /// Whether the issuer OrganizationName ends with `expected`.
    pub fn check_issuer(&self, expected: &str) -> Result<bool, Error> {
        self.issuer_organization()
            .map(|org| org.ends_with(expected))
            .ok_or_else(|| {
                Error::Certificate("certificate has no issuer OrganizationName".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const EXAMPLE_COM: &[u8] = include_bytes!("../../assets/example-com.der");
    const NAMELESS: &[u8] = include_bytes!("../../assets/nameless.der");
    const CA_ISSUED: &[u8] = include_bytes!("../../assets/ca-issued.der");

    #[test]
    fn common_name_matches_by_suffix() {
        let cert = CertificateRecord::from_der(EXAMPLE_COM).unwrap();
        assert_eq!(cert.issuer_common_name(), Some("www.example.com"));
        assert_eq!(cert.check_cn("example.com"), Ok(true));
        assert_eq!(cert.check_cn("www.example.com"), Ok(true));
        assert_eq!(cert.check_cn("example.org"), Ok(false));
    }

    #[test]
    fn issuer_organization_matches_by_suffix() {
        let cert = CertificateRecord::from_der(EXAMPLE_COM).unwrap();
        assert_eq!(cert.check_issuer("Org"), Ok(true));
        assert_eq!(cert.check_issuer("Tempesta"), Ok(false));
    }

    #[test]
    fn common_name_comes_from_the_issuer() {
        let cert = CertificateRecord::from_der(CA_ISSUED).unwrap();
        assert_eq!(cert.issuer_common_name(), Some("Example Root CA"));
        assert_eq!(cert.check_cn("Root CA"), Ok(true));
        assert_eq!(cert.check_cn("www.example.com"), Ok(false));
        assert_eq!(cert.check_issuer("Example Org"), Ok(true));
        assert_eq!(cert.check_issuer("Leaf Services"), Ok(false));
    }

    #[test]
    fn missing_attributes_are_errors() {
        let cert = CertificateRecord::from_der(NAMELESS).unwrap();
        assert!(matches!(cert.check_cn("example.com"), Err(Error::Certificate(_))));
        assert!(matches!(cert.check_issuer("Org"), Err(Error::Certificate(_))));
    }

    #[test]
    fn garbage_is_not_a_certificate() {
        assert!(CertificateRecord::from_der(&[0x30, 0x03, 0x01, 0x01, 0xff]).is_err());
    }
}
