use ring::{
    agreement,
    rand::{SecureRandom, SystemRandom},
    test::rand::FixedByteRandom,
};

use crate::{error::Error, tls::msgs::enums::NamedGroup};

/// Byte every ephemeral private key is made of when runs must be reproducible.
const DETERMINISTIC_KEY_BYTE: u8 = 42;

fn agreement_algorithm(group: NamedGroup) -> Option<&'static agreement::Algorithm> {
    match group {
        NamedGroup::secp256r1 => Some(&agreement::ECDH_P256),
        NamedGroup::secp384r1 => Some(&agreement::ECDH_P384),
        NamedGroup::X25519 => Some(&agreement::X25519),
        _ => None,
    }
}

/// An in-progress ECDHE key exchange.
pub struct KeyExchange {
    pub group: NamedGroup,
    privkey: agreement::EphemeralPrivateKey,
    pub pubkey: agreement::PublicKey,
}

impl KeyExchange {
    pub fn is_supported(group: NamedGroup) -> bool {
        agreement_algorithm(group).is_some()
    }

    /// Generates an ephemeral key pair for `group`. In deterministic mode the
    /// same key is produced on every call.
    pub fn start(group: NamedGroup, deterministic: bool) -> Result<Self, Error> {
        let alg = agreement_algorithm(group)
            .ok_or_else(|| Error::Crypto(format!("unsupported key exchange group {:?}", group)))?;

        let fixed;
        let system;
        let rng: &dyn SecureRandom = if deterministic {
            fixed = FixedByteRandom {
                byte: DETERMINISTIC_KEY_BYTE,
            };
            &fixed
        } else {
            system = SystemRandom::new();
            &system
        };

        let privkey = agreement::EphemeralPrivateKey::generate(alg, rng)
            .map_err(|_| Error::Crypto("failed to generate ephemeral key".to_string()))?;
        let pubkey = privkey
            .compute_public_key()
            .map_err(|_| Error::Crypto("failed to compute public key".to_string()))?;

        Ok(Self {
            group,
            privkey,
            pubkey,
        })
    }

    pub fn pubkey(&self) -> &[u8] {
        self.pubkey.as_ref()
    }

    /// Completes the exchange with the peer's public point, yielding the
    /// premaster secret.
    pub fn complete(self, peer: &[u8]) -> Result<Vec<u8>, Error> {
        let peer_key = agreement::UnparsedPublicKey::new(self.privkey.algorithm(), peer);
        agreement::agree_ephemeral(
            self.privkey,
            &peer_key,
            Error::Crypto("key agreement failed".to_string()),
            |secret| Ok(Vec::from(secret)),
        )
    }
}
