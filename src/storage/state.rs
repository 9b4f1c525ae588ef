use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    error::IssuanceError,
    types::{CertificateSummary, KeyAlgorithm},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Issued,
    /// Enrolled, but the certificate manager had not finished issuing when
    /// polling gave up. Resume with a collect.
    Pending,
}

/// What a managed certificate resource remembers between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub domain: String,
    pub ssl_id: u64,
    pub renew_id: Option<String>,
    pub status: CertificateStatus,
    pub key_algorithm: KeyAlgorithm,
    /// PEM chain exactly as downloaded
    pub certificate_pem: Option<String>,
    pub certificate: Option<CertificateSummary>,
    /// Last CA status code and accumulated wait while pending
    #[serde(default)]
    pub last_code: Option<i64>,
    #[serde(default)]
    pub waited_secs: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    /// Fails with `TimeoutExceeded` unless the certificate was issued.
    pub fn ensure_issued(&self) -> Result<(), IssuanceError> {
        match self.status {
            CertificateStatus::Issued => Ok(()),
            CertificateStatus::Pending => Err(IssuanceError::TimeoutExceeded {
                last_code: self.last_code.unwrap_or_default(),
                waited_secs: self.waited_secs.unwrap_or_default(),
            }),
        }
    }
}
