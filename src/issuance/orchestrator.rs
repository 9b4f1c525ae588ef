use log::{debug, info, warn};

use crate::{
    core::{
        config::IssuanceConfig,
        error::IssuanceError,
        types::{DownloadOutcome, EnrollmentResult},
    },
    issuance::{
        client::{CaClient, EnrollRequest},
        csr::{CertificateRequest, build_csr},
        http::CaTransport,
        keys::{KeyPair, generate_key_pair},
        poll::{PollClock, PollPolicy, poll_until_issued},
    },
    storage::{ActivityJournal, ArtifactStore},
};

/// Progress of one issuance run. `Issued`, `TimedOut` and `Fatal` are
/// terminal; only `Polling` repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceState {
    Init,
    KeyGenerated,
    CsrBuilt,
    Enrolled,
    Polling,
    Issued,
    TimedOut,
    Fatal,
}

impl IssuanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IssuanceState::Issued | IssuanceState::TimedOut | IssuanceState::Fatal
        )
    }
}

/// Everything a successful (or timed out) run produced.
#[derive(Debug)]
pub struct IssuanceReport {
    pub key: KeyPair,
    pub csr: CertificateRequest,
    pub enrollment: EnrollmentResult,
    /// `Issued` or `TimedOut`
    pub outcome: DownloadOutcome,
}

/// Drives key generation, CSR, enrollment and download for one domain.
pub struct IssuanceOrchestrator<'a, T> {
    config: &'a IssuanceConfig,
    client: &'a CaClient<T>,
    artifacts: &'a ArtifactStore,
    clock: &'a dyn PollClock,
    journal: ActivityJournal,
    state: IssuanceState,
}

impl<'a, T: CaTransport> IssuanceOrchestrator<'a, T> {
    pub fn new(
        config: &'a IssuanceConfig,
        client: &'a CaClient<T>,
        artifacts: &'a ArtifactStore,
        clock: &'a dyn PollClock,
    ) -> Self {
        Self {
            config,
            client,
            artifacts,
            clock,
            journal: artifacts.journal(&config.domain),
            state: IssuanceState::Init,
        }
    }

    pub fn state(&self) -> IssuanceState {
        self.state
    }

    /// Runs the state machine to a terminal state. On error the state is
    /// `Fatal`; artifacts written so far are left for the caller to clean up.
    pub fn run(&mut self) -> Result<IssuanceReport, IssuanceError> {
        if self.state != IssuanceState::Init {
            return Err(IssuanceError::Configuration(format!(
                "issuance for {} already ran (state {:?})",
                self.config.domain, self.state
            )));
        }
        match self.drive() {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("[issuance] {} failed in {:?}: {err}", self.config.domain, self.state);
                self.journal.record(&format!("Issuance failed: {err}"));
                self.transition(IssuanceState::Fatal);
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<IssuanceReport, IssuanceError> {
        let config = self.config;
        let domain = config.domain.as_str();
        let (algorithm, rsa_bits) = config.key_algorithm()?;

        info!("[issuance] generating {} key for {domain}", algorithm.as_str());
        self.journal
            .record(&format!("Generating {} key for {domain}", algorithm.as_str()));
        let key = generate_key_pair(algorithm, rsa_bits)?;
        self.artifacts.write_private_key(domain, key.private_key_pem())?;
        self.transition(IssuanceState::KeyGenerated);

        self.journal.record(&format!("Generating CSR for {domain}"));
        let csr = build_csr(&key, &config.subject_attributes(), &config.subject_alt_names)?;
        self.artifacts.write_csr(domain, csr.pem())?;
        self.transition(IssuanceState::CsrBuilt);

        info!("[issuance] enrolling certificate for {domain}");
        self.journal.record(&format!("Enrolling certificate for {domain}"));
        let request = EnrollRequest::from_config(config, csr.pem_single_line());
        let enrollment = self.client.enroll(&request)?;
        self.journal.record(&format!(
            "Certificate enrolled with sslId {}",
            enrollment.ssl_id
        ));
        self.transition(IssuanceState::Enrolled);

        self.transition(IssuanceState::Polling);
        let outcome = download_certificate(
            self.client,
            self.artifacts,
            &self.journal,
            domain,
            enrollment.ssl_id,
            config.poll_policy(),
            self.clock,
        )?;
        match outcome {
            DownloadOutcome::Issued(_) => self.transition(IssuanceState::Issued),
            _ => self.transition(IssuanceState::TimedOut),
        }

        Ok(IssuanceReport {
            key,
            csr,
            enrollment,
            outcome,
        })
    }

    fn transition(&mut self, next: IssuanceState) {
        debug!(
            "[issuance] {}: {:?} -> {:?}",
            self.config.domain, self.state, next
        );
        self.state = next;
    }
}

/// Polls `collect` for `ssl_id` and writes `{domain}.crt` once issued.
/// Returns `Issued` or `TimedOut`.
pub fn download_certificate<T: CaTransport>(
    client: &CaClient<T>,
    artifacts: &ArtifactStore,
    journal: &ActivityJournal,
    domain: &str,
    ssl_id: u64,
    policy: PollPolicy,
    clock: &dyn PollClock,
) -> Result<DownloadOutcome, IssuanceError> {
    journal.record(&format!("Downloading certificate for {domain} (sslId {ssl_id})"));
    let outcome = poll_until_issued(&format!("sslId {ssl_id}"), policy, clock, || {
        let attempt = client.collect(ssl_id);
        if let Ok(DownloadOutcome::Pending { code, .. }) = &attempt {
            journal.record(&format!("Certificate not ready yet (code {code})"));
        }
        attempt
    })?;

    match &outcome {
        DownloadOutcome::Issued(cert) => {
            let path = artifacts.write_certificate(domain, &cert.pem)?;
            info!("[issuance] certificate for {domain} written to {}", path.display());
            journal.record(&format!(
                "Certificate downloaded ({} bytes written)",
                cert.pem.len()
            ));
        }
        DownloadOutcome::TimedOut {
            last_code,
            waited_secs,
        } => {
            journal.record(&format!(
                "Timed out after waiting {waited_secs}/{}s (last code {last_code}); state saved as pending",
                policy.max_wait.as_secs()
            ));
        }
        DownloadOutcome::Pending { .. } => {}
    }
    Ok(outcome)
}
