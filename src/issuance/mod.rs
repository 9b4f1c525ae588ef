pub mod client;
pub mod csr;
pub mod http;
pub mod inspect;
pub mod keys;
pub mod orchestrator;
pub mod poll;

pub use client::CaClient;
pub use http::{CaTransport, ReqwestTransport};
pub use orchestrator::{IssuanceOrchestrator, IssuanceReport, IssuanceState};
pub use poll::{PollClock, PollPolicy, ThreadClock};
