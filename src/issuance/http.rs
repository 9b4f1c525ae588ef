use std::sync::OnceLock;
use std::time::Duration;

use log::warn;
use reqwest::Method;
use reqwest::blocking::Client;

use crate::core::error::IssuanceError;

pub const HTTP_TIMEOUT_ENV: &str = "SECTIGO_HTTP_TIMEOUT_SECS";

/// One request to the certificate manager API.
#[derive(Clone)]
pub struct CaRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl CaRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl std::fmt::Debug for CaRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("password") {
                    (key.as_str(), "<redacted>")
                } else {
                    (key.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("CaRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body_len", &self.body.as_ref().map(String::len))
            .finish()
    }
}

/// Status and raw body of a certificate manager response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaResponse {
    pub status: u16,
    pub body: String,
}

/// Executes requests against the certificate manager. Blocking by contract:
/// issuance runs on the calling thread from start to finish.
pub trait CaTransport {
    fn execute(&self, request: CaRequest) -> Result<CaResponse, IssuanceError>;
}

impl<T: CaTransport + ?Sized> CaTransport for &T {
    fn execute(&self, request: CaRequest) -> Result<CaResponse, IssuanceError> {
        (**self).execute(request)
    }
}

pub struct HttpClient;

impl HttpClient {
    pub fn shared() -> &'static Client {
        static CLIENT: OnceLock<Client> = OnceLock::new();
        CLIENT.get_or_init(|| {
            let timeout = resolve_timeout(std::env::var(HTTP_TIMEOUT_ENV).ok().as_deref());
            reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|err| {
                    warn!("[ca-http] failed to build shared client: {err}");
                    reqwest::blocking::Client::new()
                })
        })
    }
}

fn resolve_timeout(raw: Option<&str>) -> Duration {
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    let timeout = raw
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout == 0 {
        warn!("[ca-http] invalid timeout value; using default");
        return Duration::from_secs(DEFAULT_TIMEOUT_SECS);
    }
    Duration::from_secs(timeout)
}

/// Production transport backed by the shared blocking reqwest client.
#[derive(Clone, Copy, Default)]
pub struct ReqwestTransport;

impl CaTransport for ReqwestTransport {
    fn execute(&self, request: CaRequest) -> Result<CaResponse, IssuanceError> {
        let client = HttpClient::shared();
        let mut builder = client.request(request.method.clone(), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().map_err(|err| {
            IssuanceError::Transport(format!("{} {}: {err}", request.method, request.url))
        })?;
        let status = response.status().as_u16();
        let bytes = response.bytes().map_err(|err| {
            IssuanceError::Transport(format!("failed to read response from {}: {err}", request.url))
        })?;
        let body = decode_body(&request.url, bytes.to_vec())?;
        Ok(CaResponse { status, body })
    }
}

/// Keeps the body exactly as sent; certificate chains are written out byte
/// for byte, so no charset conversion or lossy replacement is applied.
fn decode_body(url: &str, bytes: Vec<u8>) -> Result<String, IssuanceError> {
    String::from_utf8(bytes).map_err(|err| {
        IssuanceError::CaProtocol(format!(
            "response from {url} is not valid UTF-8 ({} bytes)",
            err.as_bytes().len()
        ))
    })
}
