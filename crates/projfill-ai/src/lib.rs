//! AI layer: grounded, schema-constrained extraction of project fields.

pub mod capability;
pub mod extractor;
pub mod openai;
pub mod prompt;

pub use capability::{CapabilityError, SearchContext, StructuredGenerator, StructuredRequest};
pub use extractor::{ExtractionError, Extractor};
pub use openai::OpenAiResponses;
