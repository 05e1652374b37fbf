//! Routing identifiers and the identifier factory extension point.
//!
//! The reader never decides on its own whether a `(scheme, value)` pair forms
//! a valid participant identifier. It asks an [`IdentifierFactory`], which
//! is where identifier-scheme registries and syntax rules plug in.

use std::any::Any;
use std::fmt::{self, Debug};

use uuid::Uuid;

/// Default scheme of PEPPOL participant identifiers.
pub const DEFAULT_PARTICIPANT_SCHEME: &str = "iso6523-actorid-upis";
/// Default scheme of PEPPOL document type identifiers.
pub const DEFAULT_DOCUMENT_TYPE_SCHEME: &str = "busdox-docid-qns";
/// Default scheme of PEPPOL process identifiers.
pub const DEFAULT_PROCESS_SCHEME: &str = "cenbii-procid-ubl";

/// A `(scheme, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    scheme: String,
    value: String,
}

impl Identifier {
    /// Create an identifier without any validation.
    pub fn new(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// `scheme::value` notation.
    pub fn uri_encoded(&self) -> String {
        format!("{}::{}", self.scheme, self.value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scheme, self.value)
    }
}

/// Creates validated identifiers from raw `(scheme, value)` pairs.
///
/// A factory returns `None` when it rejects a pair. Scheme and value may each
/// look acceptable on their own and still be rejected together.
///
/// # Example
///
/// ```rust
/// use sbdh_envelope::{Identifier, IdentifierFactory};
/// use std::any::Any;
///
/// #[derive(Debug)]
/// struct UpperCaseOnly;
///
/// impl IdentifierFactory for UpperCaseOnly {
///     fn name(&self) -> &str {
///         "upper-case-only"
///     }
///
///     fn create_participant_identifier(&self, scheme: &str, value: &str) -> Option<Identifier> {
///         (value == value.to_uppercase()).then(|| Identifier::new(scheme, value))
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// let factory = UpperCaseOnly;
/// assert!(factory.create_participant_identifier("x", "ABC").is_some());
/// assert!(factory.create_participant_identifier("x", "abc").is_none());
/// ```
pub trait IdentifierFactory: Send + Sync + Debug {
    /// Name of this factory, used in log output.
    fn name(&self) -> &str;

    /// Create a participant identifier, or `None` if the pair is rejected.
    fn create_participant_identifier(&self, scheme: &str, value: &str) -> Option<Identifier>;

    /// Create a document type identifier, or `None` if the pair is rejected.
    fn create_document_type_identifier(&self, scheme: &str, value: &str) -> Option<Identifier> {
        non_empty_pair(scheme, value)
    }

    /// Create a process identifier, or `None` if the pair is rejected.
    fn create_process_identifier(&self, scheme: &str, value: &str) -> Option<Identifier> {
        non_empty_pair(scheme, value)
    }

    /// Generate a new envelope instance identifier.
    fn new_instance_identifier(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Downcast to concrete type for advanced usage.
    fn as_any(&self) -> &dyn Any;
}

fn non_empty_pair(scheme: &str, value: &str) -> Option<Identifier> {
    (!scheme.trim().is_empty() && !value.trim().is_empty()).then(|| Identifier::new(scheme, value))
}

/// Extension trait for factory type checking.
pub trait IdentifierFactoryExt: IdentifierFactory {
    /// Downcast to type T.
    fn downcast_ref<T: IdentifierFactory + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl<F: IdentifierFactory + ?Sized> IdentifierFactoryExt for F {}

/// Factory that accepts any pair whose scheme and value are not blank
/// and do not exceed the configured maximum lengths.
#[derive(Debug, Clone)]
pub struct SimpleIdentifierFactory {
    max_scheme_length: usize,
    max_value_length: usize,
}

impl SimpleIdentifierFactory {
    pub fn new() -> Self {
        Self {
            max_scheme_length: 25,
            max_value_length: 135,
        }
    }

    /// Set the maximum participant scheme length.
    pub fn with_max_scheme_length(mut self, max: usize) -> Self {
        self.max_scheme_length = max;
        self
    }

    /// Set the maximum participant value length.
    pub fn with_max_value_length(mut self, max: usize) -> Self {
        self.max_value_length = max;
        self
    }
}

impl Default for SimpleIdentifierFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierFactory for SimpleIdentifierFactory {
    fn name(&self) -> &str {
        "simple"
    }

    fn create_participant_identifier(&self, scheme: &str, value: &str) -> Option<Identifier> {
        if scheme.chars().count() > self.max_scheme_length
            || value.chars().count() > self.max_value_length
        {
            return None;
        }
        non_empty_pair(scheme, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
