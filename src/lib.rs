//! # sbdh-envelope
//!
//! Reading, validating and writing **Standard Business Document Headers**
//! (SBDH), the envelope that wraps business documents such as UBL invoices
//! for transport.
//!
//! ## Overview
//!
//! - [`SbdhReader`] parses a Standard Business Document, runs a [`RuleSet`]
//!   over the header and extracts an [`EnvelopeData`]
//! - [`SbdhWriter`] turns a complete [`EnvelopeData`] back into a
//!   [`StandardBusinessDocument`]
//! - [`SbdhErrorKind`] is the catalog of coded validation errors
//! - [`IdentifierFactory`] is the extension point deciding which participant
//!   identifiers are acceptable
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sbdh_envelope::prelude::*;
//!
//! let reader = SbdhReader::new(Arc::new(SimpleIdentifierFactory::new()));
//! let envelope = reader.extract_from_path("invoice.sbd.xml")?;
//!
//! let xml = SbdhWriter::new().write_to_string(&envelope)?;
//! ```
//!
//! ## Overriding rules
//!
//! Every default rule is registered under a field path. Registering another
//! rule for the same path replaces it:
//!
//! ```rust
//! use std::sync::Arc;
//! use sbdh_envelope::{RuleSet, SimpleIdentifierFactory, ValidationRule};
//!
//! let factory = Arc::new(SimpleIdentifierFactory::new());
//! let mut rules = RuleSet::defaults("1.0", "iso6523-actorid-upis", factory);
//! rules.register(ValidationRule::header_version(|version| version.starts_with("1.")));
//! assert_eq!(rules.len(), 10);
//! ```

mod catalog;
mod config;
mod envelope;
mod error;
mod identifier;
mod reader;
mod report;
pub mod rules;
pub mod sbd;
mod writer;
pub mod xml;

pub mod prelude;

// Re-export core types
pub use catalog::SbdhErrorKind;
pub use config::{SbdhConfig, DEFAULT_HEADER_VERSION};
pub use envelope::{truncate_to_millis, EnvelopeData, UBL_21_TYPE_VERSION};
pub use error::{SbdhError, SbdhResult};
pub use identifier::{
    Identifier, IdentifierFactory, IdentifierFactoryExt, SimpleIdentifierFactory,
    DEFAULT_DOCUMENT_TYPE_SCHEME, DEFAULT_PARTICIPANT_SCHEME, DEFAULT_PROCESS_SCHEME,
};
pub use reader::SbdhReader;
pub use report::{ErrorLevel, ErrorReport, ValidationEntry};
pub use rules::{RuleInput, RuleSet, RuleSetBuilder, ValidationRule};
pub use sbd::{StandardBusinessDocument, StandardBusinessDocumentHeader};
pub use writer::SbdhWriter;
pub use xml::{SharedElement, XmlElement};
