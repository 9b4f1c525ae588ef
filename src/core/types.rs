use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::IssuanceError;

/// Key algorithms the certificate manager accepts for enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "EC-P224")]
    EcP224,
    #[serde(rename = "EC-P256")]
    EcP256,
    #[serde(rename = "EC-P384")]
    EcP384,
    #[serde(rename = "EC-P521")]
    EcP521,
}

impl KeyAlgorithm {
    /// Resolves the configured curve name. An empty name selects RSA.
    pub fn from_curve_name(curve: &str) -> Result<Self, IssuanceError> {
        match curve.trim().to_ascii_uppercase().as_str() {
            "" => Ok(KeyAlgorithm::Rsa),
            "P224" | "P-224" => Ok(KeyAlgorithm::EcP224),
            "P256" | "P-256" => Ok(KeyAlgorithm::EcP256),
            "P384" | "P-384" => Ok(KeyAlgorithm::EcP384),
            "P521" | "P-521" => Ok(KeyAlgorithm::EcP521),
            _ => Err(IssuanceError::Configuration(format!(
                "unrecognized elliptic curve: {curve:?} (allowed: P224, P256, P384, P521)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::EcP224 => "EC-P224",
            KeyAlgorithm::EcP256 => "EC-P256",
            KeyAlgorithm::EcP384 => "EC-P384",
            KeyAlgorithm::EcP521 => "EC-P521",
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyAlgorithm::Rsa)
    }
}

/// Distinguished name attributes placed in the CSR subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SubjectAttributes {
    pub common_name: String,
    pub country: String,
    pub province: String,
    pub locality: String,
    pub organization: String,
    pub org_unit: String,
    pub email_address: String,
}

/// Identifiers assigned by the certificate manager for an accepted enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    pub ssl_id: u64,
    pub renew_id: Option<String>,
}

/// Certificate chain exactly as the certificate manager returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub pem: String,
}

/// Result of a collect attempt, or of a whole polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Issued(IssuedCertificate),
    /// Still processing; `code` is `0` or `-1400`.
    Pending { code: i64, description: String },
    TimedOut { last_code: i64, waited_secs: u64 },
}

/// Details extracted from the leaf of an issued chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    /// Serial number as a hex string
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// SHA-256 over the leaf DER
    pub fingerprint: String,
    pub chain_length: usize,
}
