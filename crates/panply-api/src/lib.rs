// panply-api: Async Rust client for the PAN-OS firewall management API

pub mod auth;
pub mod client;
pub mod commit;
pub mod entries;
pub mod error;
pub mod models;
pub mod retry;
pub mod transport;

pub use client::{DEFAULT_API_VERSION, DEFAULT_VSYS, DeviceClient};
pub use commit::CommitRequest;
pub use entries::entry_names;
pub use error::Error;
pub use models::{JobResult, JobState, JobStatus, RulePosition, UpsertOutcome};
pub use retry::RetryPolicy;
pub use transport::{TlsMode, TransportConfig};
