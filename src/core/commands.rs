use chrono::Utc;
use log::{info, warn};

use crate::{
    core::{
        config::IssuanceConfig,
        error::IssuanceError,
        types::DownloadOutcome,
    },
    issuance::{
        CaClient, CaTransport, IssuanceOrchestrator, PollClock,
        inspect::summarize_chain,
        orchestrator::download_certificate,
    },
    storage::{ArtifactStore, CertificateStatus, ResourceState},
};

/// Issues a certificate for `config.domain` and persists its resource state.
///
/// `replace_domain` names a previous domain of the same resource whose
/// artifacts are removed first. A poll timeout is not an error: the state is
/// saved as `pending` and can be resumed with [`collect_certificate`]. On
/// failure the key, CSR and certificate files of the domain are removed.
pub fn create_certificate<T: CaTransport>(
    config: &IssuanceConfig,
    client: &CaClient<T>,
    artifacts: &ArtifactStore,
    clock: &dyn PollClock,
    replace_domain: Option<&str>,
) -> Result<ResourceState, IssuanceError> {
    let domain = config.domain.as_str();
    let journal = artifacts.journal(domain);

    if let Some(previous) = replace_domain.filter(|previous| *previous != domain) {
        artifacts.cleanup(previous);
        artifacts.remove_state(previous)?;
        journal.record(&format!(
            "Deleting any previous CSR/KEY/CERT that was generated for {previous}"
        ));
    }

    issue_and_record(config, client, artifacts, clock).inspect_err(|_| {
        artifacts.cleanup(domain);
        journal.record(
            "Could not complete the process. Deleting any CSR/KEY/CERT that was generated",
        );
    })
}

fn issue_and_record<T: CaTransport>(
    config: &IssuanceConfig,
    client: &CaClient<T>,
    artifacts: &ArtifactStore,
    clock: &dyn PollClock,
) -> Result<ResourceState, IssuanceError> {
    let mut orchestrator = IssuanceOrchestrator::new(config, client, artifacts, clock);
    let report = orchestrator.run()?;

    let mut state = ResourceState {
        domain: config.domain.clone(),
        ssl_id: report.enrollment.ssl_id,
        renew_id: report.enrollment.renew_id.clone(),
        status: CertificateStatus::Pending,
        key_algorithm: report.key.algorithm(),
        certificate_pem: None,
        certificate: None,
        last_code: None,
        waited_secs: None,
        updated_at: Utc::now(),
    };
    apply_outcome(&mut state, &report.outcome);
    artifacts.save_state(&state)?;
    Ok(state)
}

/// Resumes polling for a resource saved as `pending`. An already issued
/// resource is returned unchanged.
pub fn collect_certificate<T: CaTransport>(
    config: &IssuanceConfig,
    client: &CaClient<T>,
    artifacts: &ArtifactStore,
    clock: &dyn PollClock,
) -> Result<ResourceState, IssuanceError> {
    let domain = config.domain.as_str();
    let mut state = artifacts.load_state(domain)?.ok_or_else(|| {
        IssuanceError::Configuration(format!("no saved certificate state for {domain}"))
    })?;
    if state.status == CertificateStatus::Issued {
        info!("[issuance] certificate for {domain} already issued (sslId {})", state.ssl_id);
        return Ok(state);
    }

    let journal = artifacts.journal(domain);
    let outcome = download_certificate(
        client,
        artifacts,
        &journal,
        domain,
        state.ssl_id,
        config.poll_policy(),
        clock,
    )
    .inspect_err(|err| journal.record(&format!("Download failed: {err}")))?;

    apply_outcome(&mut state, &outcome);
    artifacts.save_state(&state)?;
    Ok(state)
}

/// Revokes `ssl_id`, or the saved resource's `sslId` when none is given,
/// then removes the domain's artifacts and state. Returns the revoked id.
pub fn revoke_certificate<T: CaTransport>(
    config: &IssuanceConfig,
    client: &CaClient<T>,
    artifacts: &ArtifactStore,
    ssl_id: Option<u64>,
) -> Result<u64, IssuanceError> {
    let domain = config.domain.as_str();
    let ssl_id = match ssl_id {
        Some(id) => id,
        None => artifacts
            .load_state(domain)?
            .map(|state| state.ssl_id)
            .ok_or_else(|| {
                IssuanceError::Configuration(format!(
                    "no saved certificate state for {domain}; pass an sslId to revoke"
                ))
            })?,
    };

    let journal = artifacts.journal(domain);
    journal.record(&format!("Revoking certificate sslId {ssl_id} for {domain}"));
    client
        .revoke(ssl_id, &config.revoke_reason)
        .inspect_err(|err| journal.record(&format!("Revocation failed: {err}")))?;
    journal.record("Certificate successfully revoked");

    artifacts.cleanup(domain);
    artifacts.remove_state(domain)?;
    Ok(ssl_id)
}

fn apply_outcome(state: &mut ResourceState, outcome: &DownloadOutcome) {
    state.updated_at = Utc::now();
    match outcome {
        DownloadOutcome::Issued(cert) => {
            state.status = CertificateStatus::Issued;
            state.certificate = match summarize_chain(&cert.pem) {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!("[issuance] issued certificate for {} could not be inspected: {err}", state.domain);
                    None
                }
            };
            state.certificate_pem = Some(cert.pem.clone());
            state.last_code = None;
            state.waited_secs = None;
        }
        DownloadOutcome::Pending { code, .. } => {
            state.status = CertificateStatus::Pending;
            state.last_code = Some(*code);
        }
        DownloadOutcome::TimedOut {
            last_code,
            waited_secs,
        } => {
            state.status = CertificateStatus::Pending;
            state.last_code = Some(*last_code);
            state.waited_secs = Some(*waited_secs);
        }
    }
}

/// Human-readable one-liner for CLI output.
pub fn describe_state(state: &ResourceState) -> String {
    let algorithm = state.key_algorithm.as_str();
    match (&state.status, &state.certificate) {
        (CertificateStatus::Issued, Some(summary)) => format!(
            "{} issued: sslId {}, {} key, serial {}, expires {}",
            state.domain,
            state.ssl_id,
            algorithm,
            summary.serial,
            summary.not_after.format("%Y-%m-%d")
        ),
        (CertificateStatus::Issued, None) => format!(
            "{} issued: sslId {}, {} key",
            state.domain,
            state.ssl_id,
            algorithm
        ),
        (CertificateStatus::Pending, _) => format!(
            "{} pending: sslId {} not issued yet; run collect later",
            state.domain, state.ssl_id
        ),
    }
}
