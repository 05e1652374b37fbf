//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use sbdh_envelope::prelude::*;
//!
//! let writer = SbdhWriter::from_config(&SbdhConfig::new());
//! assert_eq!(writer.header_version(), "1.0");
//! ```

// Reading and writing
pub use crate::reader::SbdhReader;
pub use crate::writer::SbdhWriter;

// Data model
pub use crate::envelope::EnvelopeData;
pub use crate::identifier::{
    Identifier, IdentifierFactory, IdentifierFactoryExt, SimpleIdentifierFactory,
};
pub use crate::sbd::StandardBusinessDocument;
pub use crate::xml::{SharedElement, XmlElement};

// Validation
pub use crate::catalog::SbdhErrorKind;
pub use crate::report::{ErrorLevel, ErrorReport, ValidationEntry};
pub use crate::rules::{RuleSet, RuleSetBuilder, ValidationRule};

// Configuration
pub use crate::config::SbdhConfig;

// Errors
pub use crate::error::{SbdhError, SbdhResult};
