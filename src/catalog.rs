//! Catalog of SBDH read errors.
//!
//! Every failure the reader can report is one of the [`SbdhErrorKind`]
//! variants. Each kind has a stable code that survives serialization and an
//! English message template with positional placeholders (`{0}`, `{1}`, ...).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The closed set of SBDH read error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SbdhErrorKind {
    /// The input is not a well-formed Standard Business Document.
    InvalidSbdXml,
    /// The Standard Business Document has no header.
    MissingSbdh,
    /// The header version is not the expected one.
    InvalidHeaderVersion,
    /// Not exactly one sender is present.
    SenderNotExactlyOne,
    /// The sender identifier authority is not accepted.
    InvalidSenderAuthority,
    /// The sender identifier value is not accepted.
    InvalidSenderValue,
    /// Not exactly one receiver is present.
    ReceiverNotExactlyOne,
    /// The receiver identifier authority is not accepted.
    InvalidReceiverAuthority,
    /// The receiver identifier value is not accepted.
    InvalidReceiverValue,
    /// The embedded business message is missing or rejected.
    InvalidBusinessMessage,
    /// The document instance identifier is rejected.
    InvalidInstanceIdentifier,
    /// The document creation date time is rejected.
    InvalidCreationDateTime,
    /// Fallback for codes that cannot be resolved. Never raised by the default rules.
    Generic,
}

impl SbdhErrorKind {
    /// All kinds, in catalog order.
    pub const ALL: [SbdhErrorKind; 13] = [
        Self::InvalidSbdXml,
        Self::MissingSbdh,
        Self::InvalidHeaderVersion,
        Self::SenderNotExactlyOne,
        Self::InvalidSenderAuthority,
        Self::InvalidSenderValue,
        Self::ReceiverNotExactlyOne,
        Self::InvalidReceiverAuthority,
        Self::InvalidReceiverValue,
        Self::InvalidBusinessMessage,
        Self::InvalidInstanceIdentifier,
        Self::InvalidCreationDateTime,
        Self::Generic,
    ];

    /// Stable short code used for matching and serialized reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSbdXml => "SBDH-001",
            Self::MissingSbdh => "SBDH-002",
            Self::InvalidHeaderVersion => "SBDH-003",
            Self::SenderNotExactlyOne => "SBDH-004",
            Self::InvalidSenderAuthority => "SBDH-005",
            Self::InvalidSenderValue => "SBDH-006",
            Self::ReceiverNotExactlyOne => "SBDH-007",
            Self::InvalidReceiverAuthority => "SBDH-008",
            Self::InvalidReceiverValue => "SBDH-009",
            Self::InvalidBusinessMessage => "SBDH-010",
            Self::InvalidInstanceIdentifier => "SBDH-011",
            Self::InvalidCreationDateTime => "SBDH-012",
            Self::Generic => "SBDH-000",
        }
    }

    /// Message template with positional placeholders.
    pub fn template(&self) -> &'static str {
        match self {
            Self::InvalidSbdXml => "The provided XML is not a valid Standard Business Document",
            Self::MissingSbdh => "The Standard Business Document does not contain a header",
            Self::InvalidHeaderVersion => "Invalid SBDH header version '{0}' found",
            Self::SenderNotExactlyOne => "Expected exactly one SBDH sender but found {0}",
            Self::InvalidSenderAuthority => "Invalid SBDH sender identifier authority '{0}'",
            Self::InvalidSenderValue => "Invalid SBDH sender identifier value '{0}'",
            Self::ReceiverNotExactlyOne => "Expected exactly one SBDH receiver but found {0}",
            Self::InvalidReceiverAuthority => "Invalid SBDH receiver identifier authority '{0}'",
            Self::InvalidReceiverValue => "Invalid SBDH receiver identifier value '{0}'",
            Self::InvalidBusinessMessage => "The SBDH business message is missing or invalid",
            Self::InvalidInstanceIdentifier => "Invalid SBDH instance identifier '{0}'",
            Self::InvalidCreationDateTime => "Invalid SBDH creation date time '{0}'",
            Self::Generic => "An unknown SBDH read error occurred",
        }
    }

    /// Fill the template with `args`.
    ///
    /// Placeholders without a matching argument are left in place; surplus
    /// arguments are ignored.
    pub fn format<S: AsRef<str>>(&self, args: &[S]) -> String {
        let mut message = self.template().to_string();
        for (index, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{index}}}"), arg.as_ref());
        }
        message
    }

    /// Resolve a code, returning `None` when it is unknown.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    /// Resolve a code, falling back to [`SbdhErrorKind::Generic`].
    pub fn from_code_or_generic(code: &str) -> Self {
        Self::from_code(code).unwrap_or(Self::Generic)
    }
}

impl fmt::Display for SbdhErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for SbdhErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for SbdhErrorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_code_or_generic(&code))
    }
}
