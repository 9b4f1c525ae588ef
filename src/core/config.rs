use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    core::{
        error::IssuanceError,
        types::{KeyAlgorithm, SubjectAttributes},
    },
    domain::normalize_domain_for_storage,
    issuance::poll::PollPolicy,
};

pub const BASE_URL_ENV: &str = "SECTIGO_CM_BASE_URL";

const DEFAULT_RSA_BITS: u32 = 2048;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_TIMEOUT_SECS: u64 = 600;
const DEFAULT_REVOKE_REASON: &str = "Terraform destroy";

/// Everything one issuance run needs, loaded from a JSON resource file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    pub domain: String,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default)]
    pub base_url: String,
    pub org_id: u64,
    pub cert_type: u64,
    #[serde(default = "default_number_servers")]
    pub number_servers: u32,
    #[serde(default = "default_server_type")]
    pub server_type: i64,
    #[serde(default = "default_term_days")]
    pub term_days: u32,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub external_requester: String,
    #[serde(default)]
    pub subject: SubjectConfig,
    /// Sent verbatim as the enrollment `subjAltNames` and embedded as a single
    /// DNS name in the CSR.
    #[serde(default)]
    pub subject_alt_names: String,
    #[serde(default)]
    pub key: KeyConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default = "default_revoke_reason")]
    pub revoke_reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectConfig {
    pub country: String,
    pub province: String,
    pub locality: String,
    pub organization: String,
    pub org_unit: String,
    pub email_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Empty selects RSA.
    pub ecdsa_curve: String,
    pub rsa_bits: u32,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            ecdsa_curve: String::new(),
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_timeout_secs: DEFAULT_MAX_TIMEOUT_SECS,
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_number_servers() -> u32 {
    1
}

fn default_server_type() -> i64 {
    -1
}

fn default_term_days() -> u32 {
    365
}

fn default_revoke_reason() -> String {
    DEFAULT_REVOKE_REASON.to_string()
}

impl IssuanceConfig {
    /// Reads the config file and resolves it against the process environment.
    pub fn load(path: &Path) -> Result<Self, IssuanceError> {
        let raw = fs::read_to_string(path).map_err(|err| IssuanceError::filesystem(path, err))?;
        let config: IssuanceConfig = serde_json::from_str(&raw).map_err(|err| {
            IssuanceError::Configuration(format!("{}: {err}", path.display()))
        })?;
        config.resolve(|key| std::env::var(key).ok())
    }

    /// Fills environment fallbacks, normalizes the domain and validates
    /// every parameter. Runs before any key material or network I/O.
    pub fn resolve<F>(mut self, lookup: F) -> Result<Self, IssuanceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.domain = normalize_domain_for_storage(&self.domain)
            .map_err(|err| IssuanceError::Configuration(err.to_string()))?;
        self.base_url = resolve_param("base_url", &self.base_url, BASE_URL_ENV, &lookup)?;
        reqwest::Url::parse(&self.base_url).map_err(|err| {
            IssuanceError::Configuration(format!("invalid base_url {:?}: {err}", self.base_url))
        })?;
        if self.poll.interval_secs == 0 {
            return Err(IssuanceError::Configuration(
                "poll interval must be at least one second".to_string(),
            ));
        }
        self.key_algorithm()?;
        Ok(self)
    }

    /// Resolves the configured key algorithm and RSA modulus size.
    pub fn key_algorithm(&self) -> Result<(KeyAlgorithm, Option<u32>), IssuanceError> {
        let algorithm = KeyAlgorithm::from_curve_name(&self.key.ecdsa_curve)?;
        if !algorithm.is_rsa() {
            return Ok((algorithm, None));
        }
        let bits = self.key.rsa_bits;
        if !matches!(bits, 2048 | 3072 | 4096) {
            return Err(IssuanceError::Configuration(format!(
                "Unsupported RSA key size {bits}. Allowed: 2048, 3072, 4096"
            )));
        }
        Ok((algorithm, Some(bits)))
    }

    pub fn subject_attributes(&self) -> SubjectAttributes {
        SubjectAttributes {
            common_name: self.domain.clone(),
            country: self.subject.country.clone(),
            province: self.subject.province.clone(),
            locality: self.subject.locality.clone(),
            organization: self.subject.organization.clone(),
            org_unit: self.subject.org_unit.clone(),
            email_address: self.subject.email_address.clone(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll.interval_secs),
            max_wait: Duration::from_secs(self.poll.max_timeout_secs),
        }
    }
}

/// Returns `value`, or the environment variable `env_key` when `value` is
/// empty. Carriage returns are stripped from the result.
pub fn resolve_param<F>(
    param: &str,
    value: &str,
    env_key: &str,
    lookup: F,
) -> Result<String, IssuanceError>
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = if value.is_empty() {
        lookup(env_key).filter(|v| !v.is_empty()).ok_or_else(|| {
            IssuanceError::Configuration(format!(
                "{param} is empty and environment variable {env_key:?} is not set"
            ))
        })?
    } else {
        value.to_string()
    };
    Ok(resolved.replace('\r', ""))
}
