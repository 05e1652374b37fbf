//! Validation rules for Standard Business Document Headers.
//!
//! A [`RuleSet`] is an ordered list of [`ValidationRule`]s, each keyed by the
//! path of the field it checks. Every rule runs on every validation; a
//! failing rule adds one entry to the [`ErrorReport`] and never stops the
//! remaining rules. Replacing a rule keeps its position, so a stricter or
//! looser check is a matter of registering another rule under the same path.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::catalog::SbdhErrorKind;
use crate::config::SbdhConfig;
use crate::error::{SbdhError, SbdhResult};
use crate::identifier::IdentifierFactory;
use crate::report::{ErrorLevel, ErrorReport, ValidationEntry};
use crate::sbd::{format_date_time, Partner, StandardBusinessDocumentHeader};
use crate::xml::XmlElement;

/// Field paths of the default rules.
pub mod field {
    pub const HEADER_VERSION: &str = "StandardBusinessDocumentHeader/HeaderVersion";
    pub const SENDER: &str = "StandardBusinessDocumentHeader/Sender";
    pub const SENDER_AUTHORITY: &str =
        "StandardBusinessDocumentHeader/Sender/Identifier/@Authority";
    pub const SENDER_VALUE: &str = "StandardBusinessDocumentHeader/Sender/Identifier";
    pub const RECEIVER: &str = "StandardBusinessDocumentHeader/Receiver";
    pub const RECEIVER_AUTHORITY: &str =
        "StandardBusinessDocumentHeader/Receiver/Identifier/@Authority";
    pub const RECEIVER_VALUE: &str = "StandardBusinessDocumentHeader/Receiver/Identifier";
    pub const BUSINESS_MESSAGE: &str = "StandardBusinessDocument/BusinessMessage";
    pub const INSTANCE_IDENTIFIER: &str =
        "StandardBusinessDocumentHeader/DocumentIdentification/InstanceIdentifier";
    pub const CREATION_DATE_TIME: &str =
        "StandardBusinessDocumentHeader/DocumentIdentification/CreationDateAndTime";
}

/// What a rule looks at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub header: &'a StandardBusinessDocumentHeader,
    pub business_message: Option<&'a XmlElement>,
}

/// A rule check. `Err` carries the arguments for the message template.
pub type RuleCheck = Arc<dyn Fn(&RuleInput<'_>) -> Result<(), Vec<String>> + Send + Sync>;

fn verdict(accepted: bool, args: impl FnOnce() -> Vec<String>) -> Result<(), Vec<String>> {
    if accepted {
        Ok(())
    } else {
        Err(args())
    }
}

/// A single check on one field.
#[derive(Clone)]
pub struct ValidationRule {
    field_path: String,
    kind: SbdhErrorKind,
    level: ErrorLevel,
    check: RuleCheck,
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("field_path", &self.field_path)
            .field("kind", &self.kind)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl ValidationRule {
    /// Create an error-level rule.
    pub fn new<F>(field_path: impl Into<String>, kind: SbdhErrorKind, check: F) -> Self
    where
        F: Fn(&RuleInput<'_>) -> Result<(), Vec<String>> + Send + Sync + 'static,
    {
        Self {
            field_path: field_path.into(),
            kind,
            level: ErrorLevel::Error,
            check: Arc::new(check),
        }
    }

    /// Report violations of this rule as warnings.
    pub fn as_warning(mut self) -> Self {
        self.level = ErrorLevel::Warning;
        self
    }

    pub fn field_path(&self) -> &str {
        &self.field_path
    }

    pub fn kind(&self) -> SbdhErrorKind {
        self.kind
    }

    pub fn level(&self) -> ErrorLevel {
        self.level
    }

    /// Run the check, returning the finding if it fails.
    pub fn evaluate(&self, input: &RuleInput<'_>) -> Option<ValidationEntry> {
        (self.check)(input).err().map(|args| ValidationEntry {
            level: self.level,
            field_path: self.field_path.clone(),
            kind: self.kind,
            message: self.kind.format(&args),
        })
    }

    /// Header version accepted by `accept`.
    pub fn header_version<P>(accept: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::new(
            field::HEADER_VERSION,
            SbdhErrorKind::InvalidHeaderVersion,
            move |input| {
                let version = &input.header.header_version;
                verdict(accept(version.as_str()), || vec![version.clone()])
            },
        )
    }

    /// Number of senders accepted by `accept`.
    pub fn sender_count<P>(accept: P) -> Self
    where
        P: Fn(usize) -> bool + Send + Sync + 'static,
    {
        Party::Sender.count_rule(accept)
    }

    /// Authority of the first sender accepted by `accept`. Skipped without sender.
    pub fn sender_authority<P>(accept: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Party::Sender.authority_rule(accept)
    }

    /// Value of the first sender accepted by `accept` and, if so, by `factory`.
    pub fn sender_value<P>(accept: P, factory: Arc<dyn IdentifierFactory>) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Party::Sender.value_rule(accept, factory)
    }

    /// Number of receivers accepted by `accept`.
    pub fn receiver_count<P>(accept: P) -> Self
    where
        P: Fn(usize) -> bool + Send + Sync + 'static,
    {
        Party::Receiver.count_rule(accept)
    }

    /// Authority of the first receiver accepted by `accept`. Skipped without receiver.
    pub fn receiver_authority<P>(accept: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Party::Receiver.authority_rule(accept)
    }

    /// Value of the first receiver accepted by `accept` and, if so, by `factory`.
    pub fn receiver_value<P>(accept: P, factory: Arc<dyn IdentifierFactory>) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Party::Receiver.value_rule(accept, factory)
    }

    /// Business message present and accepted by `accept`.
    pub fn business_message<P>(accept: P) -> Self
    where
        P: Fn(&XmlElement) -> bool + Send + Sync + 'static,
    {
        Self::new(
            field::BUSINESS_MESSAGE,
            SbdhErrorKind::InvalidBusinessMessage,
            move |input| match input.business_message {
                Some(message) => verdict(accept(message), Vec::new),
                None => Err(Vec::new()),
            },
        )
    }

    /// Instance identifier accepted by `accept`.
    pub fn instance_identifier<P>(accept: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::new(
            field::INSTANCE_IDENTIFIER,
            SbdhErrorKind::InvalidInstanceIdentifier,
            move |input| {
                let identifier = &input.header.document_identification.instance_identifier;
                verdict(accept(identifier.as_str()), || vec![identifier.clone()])
            },
        )
    }

    /// Creation date time accepted by `accept`.
    pub fn creation_date_time<P>(accept: P) -> Self
    where
        P: Fn(&DateTime<FixedOffset>) -> bool + Send + Sync + 'static,
    {
        Self::new(
            field::CREATION_DATE_TIME,
            SbdhErrorKind::InvalidCreationDateTime,
            move |input| {
                let created = &input.header.document_identification.creation_date_and_time;
                verdict(accept(created), || vec![format_date_time(created)])
            },
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Party {
    Sender,
    Receiver,
}

impl Party {
    fn partners(self, header: &StandardBusinessDocumentHeader) -> &[Partner] {
        match self {
            Party::Sender => &header.senders,
            Party::Receiver => &header.receivers,
        }
    }

    fn count_rule<P>(self, accept: P) -> ValidationRule
    where
        P: Fn(usize) -> bool + Send + Sync + 'static,
    {
        let (path, kind) = match self {
            Party::Sender => (field::SENDER, SbdhErrorKind::SenderNotExactlyOne),
            Party::Receiver => (field::RECEIVER, SbdhErrorKind::ReceiverNotExactlyOne),
        };
        ValidationRule::new(path, kind, move |input| {
            let count = self.partners(input.header).len();
            verdict(accept(count), || vec![count.to_string()])
        })
    }

    fn authority_rule<P>(self, accept: P) -> ValidationRule
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (path, kind) = match self {
            Party::Sender => (field::SENDER_AUTHORITY, SbdhErrorKind::InvalidSenderAuthority),
            Party::Receiver => (
                field::RECEIVER_AUTHORITY,
                SbdhErrorKind::InvalidReceiverAuthority,
            ),
        };
        ValidationRule::new(path, kind, move |input| {
            let Some(partner) = self.partners(input.header).first() else {
                return Ok(());
            };
            let authority = partner.identifier.authority.as_deref().unwrap_or_default();
            verdict(accept(authority), || vec![authority.to_string()])
        })
    }

    fn value_rule<P>(self, accept: P, factory: Arc<dyn IdentifierFactory>) -> ValidationRule
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (path, kind) = match self {
            Party::Sender => (field::SENDER_VALUE, SbdhErrorKind::InvalidSenderValue),
            Party::Receiver => (field::RECEIVER_VALUE, SbdhErrorKind::InvalidReceiverValue),
        };
        ValidationRule::new(path, kind, move |input| {
            let Some(partner) = self.partners(input.header).first() else {
                return Ok(());
            };
            let identifier = &partner.identifier;
            let value = identifier.value.as_str();
            let accepted = accept(value)
                && factory
                    .create_participant_identifier(
                        identifier.authority.as_deref().unwrap_or_default(),
                        value,
                    )
                    .is_some();
            verdict(accepted, || vec![value.to_string()])
        })
    }
}

/// An ordered set of validation rules, keyed by field path.
///
/// # Example
///
/// ```rust
/// use sbdh_envelope::{RuleSet, SbdhConfig, SimpleIdentifierFactory, ValidationRule};
/// use std::sync::Arc;
///
/// let factory = Arc::new(SimpleIdentifierFactory::new());
/// let mut rules = RuleSet::from_config(&SbdhConfig::default(), factory);
/// // Accept every header version from now on.
/// rules.register(ValidationRule::header_version(|_| true));
///
/// assert_eq!(rules.len(), 10);
/// assert_eq!(rules.names()[0], "StandardBusinessDocumentHeader/HeaderVersion");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ValidationRule>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The default rules, in evaluation order.
    ///
    /// - header version equals `expected_header_version`
    /// - exactly one sender and one receiver
    /// - sender and receiver authority equal `participant_scheme`
    /// - sender and receiver value non-empty and accepted by `factory`
    /// - business message present
    /// - instance identifier non-empty
    /// - creation date time present
    pub fn defaults(
        expected_header_version: impl Into<String>,
        participant_scheme: impl Into<String>,
        factory: Arc<dyn IdentifierFactory>,
    ) -> Self {
        let expected_header_version = expected_header_version.into();
        let participant_scheme: String = participant_scheme.into();
        let participant_scheme: Arc<str> = Arc::from(participant_scheme);
        let receiver_scheme = Arc::clone(&participant_scheme);

        RuleSetBuilder::new()
            .with(ValidationRule::header_version(move |version| {
                version == expected_header_version
            }))
            .with(ValidationRule::sender_count(|count| count == 1))
            .with(ValidationRule::sender_authority(move |authority| {
                authority == &*participant_scheme
            }))
            .with(ValidationRule::sender_value(
                |value| !value.is_empty(),
                Arc::clone(&factory),
            ))
            .with(ValidationRule::receiver_count(|count| count == 1))
            .with(ValidationRule::receiver_authority(move |authority| {
                authority == &*receiver_scheme
            }))
            .with(ValidationRule::receiver_value(
                |value| !value.is_empty(),
                factory,
            ))
            .with(ValidationRule::business_message(|_| true))
            .with(ValidationRule::instance_identifier(|id| !id.is_empty()))
            .with(ValidationRule::creation_date_time(|_| true))
            .build()
    }

    /// The default rules with expectations taken from `config`.
    pub fn from_config(config: &SbdhConfig, factory: Arc<dyn IdentifierFactory>) -> Self {
        Self::defaults(
            config.expected_header_version.clone(),
            config.default_participant_scheme.clone(),
            factory,
        )
    }

    /// Register a rule.
    ///
    /// A rule with the same field path is replaced in place; otherwise the
    /// rule is appended.
    pub fn register(&mut self, rule: ValidationRule) {
        match self
            .rules
            .iter_mut()
            .find(|r| r.field_path == rule.field_path)
        {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Register a rule, returning an error if its field path is taken.
    pub fn register_unique(&mut self, rule: ValidationRule) -> SbdhResult<()> {
        if self.contains(&rule.field_path) {
            return Err(SbdhError::DuplicateRule(rule.field_path));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Get a rule by field path.
    pub fn get(&self, field_path: &str) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.field_path == field_path)
    }

    pub fn contains(&self, field_path: &str) -> bool {
        self.get(field_path).is_some()
    }

    /// Remove a rule by field path.
    pub fn remove(&mut self, field_path: &str) -> Option<ValidationRule> {
        let index = self.rules.iter().position(|r| r.field_path == field_path)?;
        Some(self.rules.remove(index))
    }

    /// Field paths of all rules, in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.field_path.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationRule> {
        self.rules.iter()
    }

    /// Run every rule and collect all findings.
    pub fn validate(
        &self,
        header: &StandardBusinessDocumentHeader,
        business_message: Option<&XmlElement>,
    ) -> ErrorReport {
        let input = RuleInput {
            header,
            business_message,
        };
        let mut report = ErrorReport::new();
        for entry in self.rules.iter().filter_map(|rule| rule.evaluate(&input)) {
            report.push(entry);
        }
        report
    }
}

/// Builder for creating rule sets with fluent API.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rule_set: RuleSet,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing rule set.
    pub fn from_rules(rule_set: RuleSet) -> Self {
        Self { rule_set }
    }

    /// Add or replace a rule.
    pub fn with(mut self, rule: ValidationRule) -> Self {
        self.rule_set.register(rule);
        self
    }

    /// Drop the rule for `field_path`.
    pub fn without(mut self, field_path: &str) -> Self {
        self.rule_set.remove(field_path);
        self
    }

    pub fn build(self) -> RuleSet {
        self.rule_set
    }
}
