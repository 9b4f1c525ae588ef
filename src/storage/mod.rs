pub mod artifacts;
pub mod journal;
pub mod state;

pub use artifacts::{ArtifactKind, ArtifactStore};
pub use journal::ActivityJournal;
pub use state::{CertificateStatus, ResourceState};
