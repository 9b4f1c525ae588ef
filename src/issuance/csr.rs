use openssl::{
    asn1::Asn1Type,
    hash::MessageDigest,
    nid::Nid,
    stack::Stack,
    x509::{X509Extension, X509NameBuilder, X509Req, X509ReqBuilder, extension::SubjectAlternativeName},
};

use crate::{
    core::{error::IssuanceError, types::SubjectAttributes},
    issuance::keys::KeyPair,
};

/// A signed PKCS#10 request.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    der: Vec<u8>,
    pem: String,
}

impl CertificateRequest {
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// PEM with every newline removed, the form the enroll endpoint expects
    /// inside its JSON body.
    pub fn pem_single_line(&self) -> String {
        self.pem.replace(['\n', '\r'], "")
    }

    pub fn to_x509_req(&self) -> Result<X509Req, IssuanceError> {
        X509Req::from_der(&self.der).map_err(csr_error)
    }
}

fn csr_error(e: openssl::error::ErrorStack) -> IssuanceError {
    IssuanceError::CsrBuild(e.to_string())
}

/// Builds and signs a CSR for `key`.
///
/// Subject order is C, ST, L, O, OU, CN, then emailAddress (PKCS#9, encoded
/// as IA5String). Empty attributes are left out of the subject rather than
/// encoded as empty values, and OpenSSL validates what remains: a
/// `country` that is not a two-letter code fails with
/// [`IssuanceError::CsrBuild`] instead of being passed through. A non-empty
/// `subject_alt_name` is embedded as a single DNS name. The request is signed
/// with SHA-256 using the key's own algorithm.
pub fn build_csr(
    key: &KeyPair,
    subject: &SubjectAttributes,
    subject_alt_name: &str,
) -> Result<CertificateRequest, IssuanceError> {
    let mut name = X509NameBuilder::new().map_err(csr_error)?;
    let entries = [
        (Nid::COUNTRYNAME, "country", &subject.country),
        (Nid::STATEORPROVINCENAME, "province", &subject.province),
        (Nid::LOCALITYNAME, "locality", &subject.locality),
        (Nid::ORGANIZATIONNAME, "organization", &subject.organization),
        (Nid::ORGANIZATIONALUNITNAME, "org_unit", &subject.org_unit),
        (Nid::COMMONNAME, "common_name", &subject.common_name),
    ];
    for (nid, label, value) in entries {
        if value.is_empty() {
            continue;
        }
        name.append_entry_by_nid(nid, value).map_err(|e| {
            IssuanceError::CsrBuild(format!("invalid subject {label} {value:?}: {e}"))
        })?;
    }
    if !subject.email_address.is_empty() {
        name.append_entry_by_nid_with_type(
            Nid::PKCS9_EMAILADDRESS,
            &subject.email_address,
            Asn1Type::IA5STRING,
        )
        .map_err(|e| {
            IssuanceError::CsrBuild(format!(
                "invalid subject email_address {:?}: {e}",
                subject.email_address
            ))
        })?;
    }
    let name = name.build();

    let mut builder = X509ReqBuilder::new().map_err(csr_error)?;
    builder.set_version(0).map_err(csr_error)?;
    builder.set_subject_name(&name).map_err(csr_error)?;
    builder.set_pubkey(key.pkey()).map_err(csr_error)?;

    let san = subject_alt_name.trim();
    if !san.is_empty() {
        let extension = SubjectAlternativeName::new()
            .dns(san)
            .build(&builder.x509v3_context(None))
            .map_err(csr_error)?;
        let mut extensions = Stack::<X509Extension>::new().map_err(csr_error)?;
        extensions.push(extension).map_err(csr_error)?;
        builder.add_extensions(&extensions).map_err(csr_error)?;
    }

    builder
        .sign(key.pkey(), MessageDigest::sha256())
        .map_err(csr_error)?;
    let req = builder.build();

    let der = req.to_der().map_err(csr_error)?;
    let pem = String::from_utf8(req.to_pem().map_err(csr_error)?)
        .map_err(|_| IssuanceError::CsrBuild("CSR PEM contained invalid UTF-8".to_string()))?;

    log::debug!(
        "[csr] built {} request for {}",
        key.algorithm().as_str(),
        subject.common_name
    );
    Ok(CertificateRequest { der, pem })
}
