#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};

use sectigo_certctl_lib::{
    IssuanceConfig, IssuanceError,
    issuance::{
        CaClient, PollClock,
        http::{CaRequest, CaResponse, CaTransport},
    },
    secrets::CredentialSet,
};
use uuid::Uuid;

pub const CERT_PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBfake\n-----END CERTIFICATE-----\n";

/// Replays canned certificate manager responses and records every request.
#[derive(Default)]
pub struct FakeCertManager {
    responses: Mutex<VecDeque<CaResponse>>,
    requests: Mutex<Vec<CaRequest>>,
}

impl FakeCertManager {
    pub fn new(responses: &[(u16, &str)]) -> Self {
        let manager = Self::default();
        for (status, body) in responses {
            manager.push(*status, body);
        }
        manager
    }

    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(CaResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<CaRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl CaTransport for FakeCertManager {
    fn execute(&self, request: CaRequest) -> Result<CaResponse, IssuanceError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| IssuanceError::Transport(format!("unexpected request to {url}")))
    }
}

/// Records requested sleeps instead of blocking.
#[derive(Default)]
pub struct FakeClock {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl PollClock for FakeClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("sectigo-flow-{}", Uuid::new_v4()))
}

pub fn config(dir: &PathBuf, curve: &str) -> IssuanceConfig {
    let raw = serde_json::json!({
        "domain": "example.com",
        "artifact_dir": dir,
        "base_url": "https://cert-manager.com/api/ssl/v1/",
        "org_id": 1234,
        "cert_type": 224,
        "comments": "created by infrastructure pipeline",
        "external_requester": "ops@example.com",
        "subject": {
            "country": "US",
            "province": "Washington",
            "locality": "Seattle",
            "organization": "Example Inc",
            "org_unit": "Platform",
            "email_address": "pki@example.com"
        },
        "subject_alt_names": "www.example.com",
        "key": { "ecdsa_curve": curve },
        "poll": { "interval_secs": 10, "max_timeout_secs": 30 }
    });
    serde_json::from_value::<IssuanceConfig>(raw)
        .unwrap()
        .resolve(|_| None)
        .unwrap()
}

pub fn client(manager: &FakeCertManager) -> CaClient<&FakeCertManager> {
    CaClient::new(
        manager,
        "https://cert-manager.com/api/ssl/v1/",
        CredentialSet::new("svc-terraform", "hunter2", "example-corp"),
    )
}
