use openssl::{
    ec::{EcGroup, EcKey},
    nid::Nid,
    pkey::{PKey, Private},
    rsa::Rsa,
};
use zeroize::Zeroizing;

use crate::core::{error::IssuanceError, types::KeyAlgorithm};

const DEFAULT_RSA_BITS: u32 = 2048;

/// A freshly generated private key and its PEM serialization.
///
/// RSA keys serialize as PKCS#1 (`RSA PRIVATE KEY`), EC keys as SEC1
/// (`EC PRIVATE KEY`), matching what the certificate tooling on the other end
/// already consumes.
pub struct KeyPair {
    algorithm: KeyAlgorithm,
    pkey: PKey<Private>,
    private_key_pem: Zeroizing<Vec<u8>>,
}

impl KeyPair {
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn pkey(&self) -> &PKey<Private> {
        &self.pkey
    }

    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key_pem
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

/// Generates a private key for `algorithm`. `rsa_bits` only applies to RSA
/// and defaults to 2048.
pub fn generate_key_pair(
    algorithm: KeyAlgorithm,
    rsa_bits: Option<u32>,
) -> Result<KeyPair, IssuanceError> {
    let keygen = |e: openssl::error::ErrorStack| IssuanceError::KeyGeneration(e.to_string());

    let (pkey, pem) = match algorithm {
        KeyAlgorithm::Rsa => {
            let bits = rsa_bits.unwrap_or(DEFAULT_RSA_BITS);
            let rsa = Rsa::generate(bits).map_err(keygen)?;
            let pem = rsa.private_key_to_pem().map_err(keygen)?;
            (PKey::from_rsa(rsa).map_err(keygen)?, pem)
        }
        KeyAlgorithm::EcP224 => generate_ec(Nid::SECP224R1).map_err(keygen)?,
        KeyAlgorithm::EcP256 => generate_ec(Nid::X9_62_PRIME256V1).map_err(keygen)?,
        KeyAlgorithm::EcP384 => generate_ec(Nid::SECP384R1).map_err(keygen)?,
        KeyAlgorithm::EcP521 => generate_ec(Nid::SECP521R1).map_err(keygen)?,
    };

    log::debug!("[keys] generated {} private key", algorithm.as_str());
    Ok(KeyPair {
        algorithm,
        pkey,
        private_key_pem: Zeroizing::new(pem),
    })
}

fn generate_ec(
    curve: Nid,
) -> Result<(PKey<Private>, Vec<u8>), openssl::error::ErrorStack> {
    let group = EcGroup::from_curve_name(curve)?;
    let ec = EcKey::generate(&group)?;
    let pem = ec.private_key_to_pem()?;
    Ok((PKey::from_ec_key(ec)?, pem))
}
