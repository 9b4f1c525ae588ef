use log::{debug, info, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        config::IssuanceConfig,
        error::IssuanceError,
        types::{DownloadOutcome, EnrollmentResult, IssuedCertificate},
    },
    issuance::http::{CaRequest, CaResponse, CaTransport},
    secrets::CredentialSet,
};

/// CA codes meaning "still processing, ask again later".
pub const PROCESSING_CODES: [i64; 2] = [0, -1400];

pub fn is_processing_code(code: i64) -> bool {
    PROCESSING_CODES.contains(&code)
}

/// Body of `POST enroll`. Field order matches the API documentation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    pub org_id: u64,
    pub csr: String,
    pub cert_type: u64,
    pub number_servers: u32,
    pub server_type: i64,
    pub term: u32,
    pub comments: String,
    pub external_requester: String,
    pub subj_alt_names: String,
}

impl EnrollRequest {
    pub fn from_config(config: &IssuanceConfig, csr_single_line: String) -> Self {
        Self {
            org_id: config.org_id,
            csr: csr_single_line,
            cert_type: config.cert_type,
            number_servers: config.number_servers,
            server_type: config.server_type,
            term: config.term_days,
            comments: config.comments.clone(),
            external_requester: config.external_requester.clone(),
            subj_alt_names: config.subject_alt_names.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollResponse {
    #[serde(default)]
    ssl_id: i64,
    #[serde(default)]
    renew_id: Option<serde_json::Value>,
}

impl EnrollResponse {
    /// `renewId` is documented as a string but some tenants return a number.
    fn renew_id(&self) -> Option<String> {
        match self.renew_id.as_ref()? {
            serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// `{code, description}` status body the API returns while a certificate is
/// not downloadable and on most errors.
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    description: String,
}

#[derive(Serialize)]
struct RevokeRequest<'a> {
    reason: &'a str,
}

/// Client for the SSL endpoints of the certificate manager REST API.
pub struct CaClient<T> {
    transport: T,
    base_url: String,
    credentials: CredentialSet,
}

impl<T: CaTransport> CaClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, credentials: CredentialSet) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            credentials,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn send(&self, method: Method, url: String, body: Option<String>) -> Result<CaResponse, IssuanceError> {
        debug!("[ca-client] {method} {url}");
        let request = CaRequest {
            method,
            url,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Login".to_string(), self.credentials.username.clone()),
                ("Password".to_string(), self.credentials.password.as_str().to_string()),
                ("Customeruri".to_string(), self.credentials.customer_uri.clone()),
            ],
            body,
        };
        self.transport.execute(request)
    }

    /// Submits a CSR. Success requires HTTP 200, a body mentioning `"sslId"`,
    /// and a positive `sslId` once decoded.
    pub fn enroll(&self, request: &EnrollRequest) -> Result<EnrollmentResult, IssuanceError> {
        let body = serde_json::to_string(request)
            .map_err(|err| IssuanceError::CaProtocol(format!("failed to encode enroll request: {err}")))?;
        let response = self.send(Method::POST, self.endpoint("enroll"), Some(body))?;
        info!("[ca-client] enroll responded with HTTP {}", response.status);

        if response.status != 200 || !response.body.contains("\"sslId\"") {
            return Err(IssuanceError::CaProtocol(format!(
                "certificate enrollment failed with HTTP {}: {}",
                response.status,
                describe_body(&response.body)
            )));
        }

        let parsed: EnrollResponse = serde_json::from_str(&response.body).map_err(|err| {
            IssuanceError::CaProtocol(format!("failed to parse enroll response: {err}"))
        })?;
        if parsed.ssl_id <= 0 {
            return Err(IssuanceError::CaProtocol(format!(
                "enrollment returned invalid sslId {}",
                parsed.ssl_id
            )));
        }
        Ok(EnrollmentResult {
            ssl_id: parsed.ssl_id as u64,
            renew_id: parsed.renew_id(),
        })
    }

    /// One download attempt. HTTP 200 means the body is the PEM chain, kept
    /// byte for byte. A status code outside [`PROCESSING_CODES`] is a
    /// permanent rejection, whatever the HTTP status.
    pub fn collect(&self, ssl_id: u64) -> Result<DownloadOutcome, IssuanceError> {
        let response = self.send(
            Method::GET,
            self.endpoint(&format!("collect/{ssl_id}/x509CO")),
            None,
        )?;
        let status_body = serde_json::from_str::<StatusBody>(&response.body).ok();
        let (code, description) = status_body
            .as_ref()
            .map(|body| (body.code, body.description.clone()))
            .unwrap_or((0, String::new()));

        if !is_processing_code(code) {
            warn!("[ca-client] sslId {ssl_id} rejected with code {code}: {description}");
            return Err(IssuanceError::PermanentRejection { code, description });
        }
        if response.status == 200 {
            info!("[ca-client] sslId {ssl_id} certificate downloaded");
            return Ok(DownloadOutcome::Issued(IssuedCertificate {
                pem: response.body,
            }));
        }
        if status_body.is_none() {
            return Err(IssuanceError::CaProtocol(format!(
                "collect for sslId {ssl_id} returned HTTP {} with an unreadable body",
                response.status
            )));
        }
        debug!(
            "[ca-client] sslId {ssl_id} not ready (HTTP {}, code {code})",
            response.status
        );
        Ok(DownloadOutcome::Pending { code, description })
    }

    /// Revokes a certificate. Only HTTP 204 counts as success.
    pub fn revoke(&self, ssl_id: u64, reason: &str) -> Result<(), IssuanceError> {
        let body = serde_json::to_string(&RevokeRequest { reason })
            .map_err(|err| IssuanceError::CaProtocol(format!("failed to encode revoke request: {err}")))?;
        let response = self.send(
            Method::POST,
            self.endpoint(&format!("revoke/{ssl_id}")),
            Some(body),
        )?;
        info!("[ca-client] revoke responded with HTTP {}", response.status);
        if response.status != 204 {
            return Err(IssuanceError::CaProtocol(format!(
                "revocation of sslId {ssl_id} failed with HTTP {}: {}",
                response.status,
                describe_body(&response.body)
            )));
        }
        Ok(())
    }
}

/// Renders an error body without echoing arbitrary payloads.
fn describe_body(body: &str) -> String {
    match serde_json::from_str::<StatusBody>(body) {
        Ok(status) if !status.description.is_empty() => {
            format!("code {}: {}", status.code, status.description)
        }
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => format!("unexpected response body ({} bytes)", body.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::VecDeque, sync::Mutex};

    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<CaResponse>>,
        requests: Mutex<Vec<CaRequest>>,
    }

    impl ScriptedTransport {
        fn with(responses: &[(u16, &str)]) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .iter()
                        .map(|(status, body)| CaResponse {
                            status: *status,
                            body: body.to_string(),
                        })
                        .collect(),
                ),
                requests: Mutex::default(),
            }
        }
    }

    impl CaTransport for ScriptedTransport {
        fn execute(&self, request: CaRequest) -> Result<CaResponse, IssuanceError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| IssuanceError::Transport("no scripted response".into()))
        }
    }

    fn client(transport: &ScriptedTransport) -> CaClient<&ScriptedTransport> {
        CaClient::new(
            transport,
            "https://cert-manager.com/api/ssl/v1/",
            CredentialSet::new("svc", "pw", "acme"),
        )
    }

    fn enroll_request() -> EnrollRequest {
        EnrollRequest {
            org_id: 1234,
            csr: "-----BEGIN CERTIFICATE REQUEST-----MIIB-----END CERTIFICATE REQUEST-----".into(),
            cert_type: 224,
            number_servers: 1,
            server_type: -1,
            term: 365,
            comments: "managed by \"terraform\"".into(),
            external_requester: "ops@example.com".into(),
            subj_alt_names: "www.example.com".into(),
        }
    }

    #[test]
    fn enroll_request_serializes_api_field_names() {
        let json = serde_json::to_string(&enroll_request()).unwrap();
        assert!(json.starts_with("{\"orgId\":1234,\"csr\":\"-----BEGIN"));
        for key in [
            "\"certType\":224",
            "\"numberServers\":1",
            "\"serverType\":-1",
            "\"term\":365",
            "\"externalRequester\":\"ops@example.com\"",
            "\"subjAltNames\":\"www.example.com\"",
            "\"comments\":\"managed by \\\"terraform\\\"\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn numeric_renew_id_does_not_fail_enrollment() {
        let transport = ScriptedTransport::with(&[(200, r#"{"sslId":42,"renewId":12345}"#)]);
        let result = client(&transport).enroll(&enroll_request()).unwrap();
        assert_eq!(result.ssl_id, 42);
        assert_eq!(result.renew_id.as_deref(), Some("12345"));

        let transport = ScriptedTransport::with(&[(200, r#"{"sslId":43,"renewId":null}"#)]);
        let result = client(&transport).enroll(&enroll_request()).unwrap();
        assert_eq!(result.renew_id, None);
    }

    #[test]
    fn enroll_success_decodes_identifiers() {
        let transport = ScriptedTransport::with(&[(200, r#"{"sslId":42,"renewId":"r1"}"#)]);
        let result = client(&transport).enroll(&enroll_request()).unwrap();
        assert_eq!(
            result,
            EnrollmentResult {
                ssl_id: 42,
                renew_id: Some("r1".into())
            }
        );

        let requests = transport.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://cert-manager.com/api/ssl/v1/enroll");
        assert_eq!(request.header("Login"), Some("svc"));
        assert_eq!(request.header("Password"), Some("pw"));
        assert_eq!(request.header("Customeruri"), Some("acme"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn enroll_requires_http_200() {
        let transport = ScriptedTransport::with(&[(201, r#"{"sslId":42}"#)]);
        let err = client(&transport).enroll(&enroll_request()).unwrap_err();
        assert!(matches!(err, IssuanceError::CaProtocol(_)));
    }

    #[test]
    fn enroll_requires_ssl_id_in_body() {
        let transport = ScriptedTransport::with(&[(
            200,
            r#"{"code":-16,"description":"Unknown user"}"#,
        )]);
        let err = client(&transport).enroll(&enroll_request()).unwrap_err();
        assert!(matches!(err, IssuanceError::CaProtocol(_)));
        assert!(err.to_string().contains("Unknown user"));
    }

    #[test]
    fn enroll_rejects_non_positive_ssl_id() {
        let transport = ScriptedTransport::with(&[(200, r#"{"sslId":0}"#)]);
        let err = client(&transport).enroll(&enroll_request()).unwrap_err();
        assert!(matches!(err, IssuanceError::CaProtocol(_)));
    }

    #[test]
    fn collect_returns_body_verbatim_on_200() {
        let pem = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        let transport = ScriptedTransport::with(&[(200, pem)]);
        let outcome = client(&transport).collect(42).unwrap();
        assert_eq!(
            outcome,
            DownloadOutcome::Issued(IssuedCertificate { pem: pem.into() })
        );
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(
            requests[0].url,
            "https://cert-manager.com/api/ssl/v1/collect/42/x509CO"
        );
    }

    #[test]
    fn collect_processing_codes_are_pending() {
        for body in [
            r#"{"code":0,"description":"pending"}"#,
            r#"{"code":-1400,"description":"Being processed by Sectigo"}"#,
        ] {
            let transport = ScriptedTransport::with(&[(400, body)]);
            let outcome = client(&transport).collect(42).unwrap();
            assert!(matches!(outcome, DownloadOutcome::Pending { .. }));
        }
    }

    #[test]
    fn collect_other_codes_are_permanent_rejections() {
        let transport = ScriptedTransport::with(&[(400, r#"{"code":-1500,"description":"rejected"}"#)]);
        let err = client(&transport).collect(42).unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::PermanentRejection { code: -1500, ref description } if description == "rejected"
        ));
    }

    #[test]
    fn collect_unreadable_error_body_is_protocol_error() {
        let transport = ScriptedTransport::with(&[(502, "<html>Bad Gateway</html>")]);
        let err = client(&transport).collect(42).unwrap_err();
        assert!(matches!(err, IssuanceError::CaProtocol(_)));
    }

    #[test]
    fn revoke_succeeds_only_on_204() {
        let transport = ScriptedTransport::with(&[(204, "")]);
        client(&transport).revoke(42, "Terraform destroy").unwrap();
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://cert-manager.com/api/ssl/v1/revoke/42");
        assert_eq!(
            requests[0].body.as_deref(),
            Some(r#"{"reason":"Terraform destroy"}"#)
        );
        drop(requests);

        for status in [200, 202, 400] {
            let transport = ScriptedTransport::with(&[(status, "")]);
            let err = client(&transport).revoke(42, "Terraform destroy").unwrap_err();
            assert!(matches!(err, IssuanceError::CaProtocol(_)));
        }
    }

    #[test]
    fn describe_body_never_echoes_unstructured_payloads() {
        assert_eq!(describe_body(""), "empty response body");
        assert_eq!(
            describe_body(r#"{"code":-1400,"description":"busy"}"#),
            "code -1400: busy"
        );
        assert!(describe_body("secret stuff").contains("12 bytes"));
    }
}
