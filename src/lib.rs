//! Certificate lifecycle automation for the Sectigo Certificate Manager:
//! key and CSR generation, enrollment, polled download and revocation.

pub mod core;
pub mod domain;
pub mod issuance;
pub mod secrets;
pub mod storage;

pub use crate::core::{
    commands::{collect_certificate, create_certificate, describe_state, revoke_certificate},
    config::IssuanceConfig,
    error::IssuanceError,
};
