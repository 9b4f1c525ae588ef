use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use pem::Pem;
use sha2::{Digest, Sha256};
use x509_parser::parse_x509_certificate;

use crate::core::types::CertificateSummary;

/// Summarizes the leaf (first `CERTIFICATE` block) of a PEM chain.
pub fn summarize_chain(chain_pem: &str) -> Result<CertificateSummary> {
    let blocks = pem::parse_many(chain_pem)
        .map_err(|err| anyhow!("failed to parse certificate chain PEM: {err}"))?;
    let certs: Vec<Pem> = blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .collect();
    let leaf = certs
        .first()
        .ok_or_else(|| anyhow!("no certificate PEM blocks found"))?;

    let (_, cert) = parse_x509_certificate(leaf.contents())
        .map_err(|err| anyhow!("failed to parse leaf certificate: {err}"))?;
    let not_before = Utc
        .timestamp_opt(cert.validity().not_before.timestamp(), 0)
        .single()
        .ok_or_else(|| anyhow!("leaf notBefore out of range"))?;
    let not_after = Utc
        .timestamp_opt(cert.validity().not_after.timestamp(), 0)
        .single()
        .ok_or_else(|| anyhow!("leaf notAfter out of range"))?;
    let fingerprint = {
        let mut hasher = Sha256::new();
        hasher.update(leaf.contents());
        hex::encode(hasher.finalize())
    };

    Ok(CertificateSummary {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        not_before,
        not_after,
        fingerprint,
        chain_length: certs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};

    fn sample_chain() -> String {
        let mut ca_params =
            CertificateParams::new(vec!["ca.example.com".to_string()]).expect("ca params");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_key = KeyPair::generate().expect("ca key");
        let ca = ca_params.self_signed(&ca_key).expect("create ca cert");

        let leaf_params =
            CertificateParams::new(vec!["example.com".to_string()]).expect("leaf params");
        let leaf_key = KeyPair::generate().expect("leaf key");
        let leaf = leaf_params
            .signed_by(&leaf_key, &ca, &ca_key)
            .expect("sign leaf");
        format!("{}{}", leaf.pem(), ca.pem())
    }

    #[test]
    fn summarizes_leaf_of_chain() {
        let chain = sample_chain();
        let summary = summarize_chain(&chain).unwrap();
        assert_eq!(summary.chain_length, 2);
        assert_eq!(summary.fingerprint.len(), 64);
        assert!(summary.not_after > summary.not_before);
        assert!(!summary.serial.is_empty());
    }

    #[test]
    fn fingerprint_is_over_leaf_der() {
        let chain = sample_chain();
        let leaf_der = pem::parse_many(&chain).unwrap()[0].contents().to_vec();
        let summary = summarize_chain(&chain).unwrap();
        assert_eq!(summary.fingerprint, hex::encode(Sha256::digest(&leaf_der)));
    }

    #[test]
    fn rejects_bodies_without_certificates() {
        assert!(summarize_chain("{\"code\":0}").is_err());
        assert!(summarize_chain("").is_err());
    }
}
