pub mod config;
pub mod dates;
pub mod error;
pub mod payload;
pub mod reconcile;
pub mod record;
pub mod sanitize;
pub mod schema;
pub mod wire;

pub use config::Settings;
pub use error::{ConfigError, ErrorKind, ValidationFailure};
pub use payload::{CandidateEdits, SubmissionPayload, build_payload};
pub use reconcile::{Field, MergedCandidate, Source, reconcile};
pub use record::{CanonicalRecord, Founder, Reference, SearchHit, SmartContract, Website};
pub use schema::{Category, DevStatus, ExtractedRecord, OrgStructure, SchemaViolation};
pub use wire::{ToWire, Wire};
