//! Extraction of [`EnvelopeData`] from Standard Business Documents.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::catalog::SbdhErrorKind;
use crate::config::SbdhConfig;
use crate::envelope::EnvelopeData;
use crate::error::{SbdhError, SbdhResult};
use crate::identifier::{
    IdentifierFactory, DEFAULT_DOCUMENT_TYPE_SCHEME, DEFAULT_PROCESS_SCHEME,
};
use crate::report::ErrorReport;
use crate::rules::RuleSet;
use crate::sbd::{
    MarshalError, StandardBusinessDocument, StandardBusinessDocumentHeader, SCOPE_DOCUMENT_ID,
    SCOPE_PROCESS_ID,
};
use crate::xml::{SharedElement, XmlElement};

/// Reads, validates and extracts SBDH envelopes.
///
/// Every input form is turned into a header plus business message and then
/// handed to [`SbdhReader::extract`]. A reader holds only its rules and the
/// value-check switch; once configured it can be shared between threads.
///
/// # Example
///
/// ```rust,ignore
/// use sbdh_envelope::prelude::*;
/// use std::sync::Arc;
///
/// let reader = SbdhReader::new(Arc::new(SimpleIdentifierFactory::new()));
/// let data = reader.extract_from_path("incoming/invoice.xml")?;
/// assert!(data.are_all_fields_set());
/// ```
#[derive(Debug, Clone)]
pub struct SbdhReader {
    rules: RuleSet,
    factory: Arc<dyn IdentifierFactory>,
    perform_value_checks: bool,
}

fn malformed(err: MarshalError) -> SbdhError {
    debug!(%err, "discarding SBD marshalling diagnostics");
    SbdhError::read::<&str>(SbdhErrorKind::InvalidSbdXml, &[])
}

fn copied<T>(field: &str, result: SbdhResult<T>) {
    if let Err(err) = result {
        debug!(field, %err, "SBDH field not copied");
    }
}

impl SbdhReader {
    /// Create a reader with the default rules and value checks enabled.
    pub fn new(factory: Arc<dyn IdentifierFactory>) -> Self {
        Self::from_config(&SbdhConfig::default(), factory)
    }

    /// Create a reader with the default rules configured by `config`.
    pub fn from_config(config: &SbdhConfig, factory: Arc<dyn IdentifierFactory>) -> Self {
        Self {
            rules: RuleSet::from_config(config, Arc::clone(&factory)),
            factory,
            perform_value_checks: config.perform_value_checks,
        }
    }

    /// Create a reader with a custom rule set and value checks enabled.
    ///
    /// `factory` builds the business scope identifiers; the rules carry
    /// their own.
    pub fn with_rules(rules: RuleSet, factory: Arc<dyn IdentifierFactory>) -> Self {
        Self {
            rules,
            factory,
            perform_value_checks: true,
        }
    }

    /// Enable or disable the validation rules.
    pub fn with_perform_value_checks(mut self, enabled: bool) -> Self {
        self.perform_value_checks = enabled;
        self
    }

    pub fn set_perform_value_checks(&mut self, enabled: bool) -> &mut Self {
        self.perform_value_checks = enabled;
        self
    }

    pub fn perform_value_checks(&self) -> bool {
        self.perform_value_checks
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    pub fn factory(&self) -> &dyn IdentifierFactory {
        self.factory.as_ref()
    }

    /// Extract from a byte stream.
    ///
    /// The stream is consumed and closed on every exit path.
    pub fn extract_from_reader<R: Read>(&self, source: R) -> SbdhResult<EnvelopeData> {
        let document =
            StandardBusinessDocument::parse_reader(BufReader::new(source)).map_err(malformed)?;
        self.extract_from_document(&document)
    }

    /// Extract from a file. A file that cannot be opened counts as malformed input.
    pub fn extract_from_path(&self, path: impl AsRef<Path>) -> SbdhResult<EnvelopeData> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading SBD");
        let file = File::open(path).map_err(|err| {
            debug!(path = %path.display(), %err, "SBD resource not readable");
            SbdhError::read::<&str>(SbdhErrorKind::InvalidSbdXml, &[])
        })?;
        self.extract_from_reader(file)
    }

    /// Extract from serialized XML.
    pub fn extract_from_bytes(&self, xml: &[u8]) -> SbdhResult<EnvelopeData> {
        let document = StandardBusinessDocument::parse_reader(xml).map_err(malformed)?;
        self.extract_from_document(&document)
    }

    /// Extract from serialized XML.
    pub fn extract_from_str(&self, xml: &str) -> SbdhResult<EnvelopeData> {
        self.extract_from_bytes(xml.as_bytes())
    }

    /// Extract from a parsed `StandardBusinessDocument` element.
    pub fn extract_from_element(&self, element: &XmlElement) -> SbdhResult<EnvelopeData> {
        let document =
            StandardBusinessDocument::from_element(element.clone()).map_err(malformed)?;
        self.extract_from_document(&document)
    }

    /// Extract from a mapped document. Fails if it has no header.
    pub fn extract_from_document(
        &self,
        document: &StandardBusinessDocument,
    ) -> SbdhResult<EnvelopeData> {
        let Some(header) = &document.header else {
            return Err(SbdhError::read::<&str>(SbdhErrorKind::MissingSbdh, &[]));
        };
        let business_message = document.business_message.as_ref().map(SharedElement::read);
        self.extract(header, business_message.as_deref())
    }

    /// Validate (if enabled) and extract.
    ///
    /// On validation failure every error-level finding is logged and the
    /// returned error carries the kind of the first one together with all
    /// messages, newline-joined. Warnings never fail extraction.
    pub fn extract(
        &self,
        header: &StandardBusinessDocumentHeader,
        business_message: Option<&XmlElement>,
    ) -> SbdhResult<EnvelopeData> {
        if self.perform_value_checks {
            let report = self.validate(header, business_message);
            for warning in report.warnings() {
                warn!(
                    field = %warning.field_path,
                    code = warning.kind.code(),
                    "{}",
                    warning.message
                );
            }
            if let Some(first) = report.first_error() {
                for entry in report.errors() {
                    error!(
                        field = %entry.field_path,
                        code = entry.kind.code(),
                        "{}",
                        entry.message
                    );
                }
                return Err(SbdhError::Read {
                    kind: first.kind,
                    message: report.error_text(),
                });
            }
        }
        Ok(self.extract_unchecked(header, business_message))
    }

    /// Run every rule and return all findings.
    pub fn validate(
        &self,
        header: &StandardBusinessDocumentHeader,
        business_message: Option<&XmlElement>,
    ) -> ErrorReport {
        self.rules.validate(header, business_message)
    }

    /// Extract without validation.
    ///
    /// Sender and receiver are taken from the first entry, if any. Empty
    /// values are left unset. The business message is always deep-copied.
    /// Business scope identifiers are built by the reader's factory and
    /// left unset if it rejects them.
    pub fn extract_unchecked(
        &self,
        header: &StandardBusinessDocumentHeader,
        business_message: Option<&XmlElement>,
    ) -> EnvelopeData {
        let mut data = EnvelopeData::new();

        if let Some(sender) = header.senders.first() {
            let identifier = &sender.identifier;
            copied(
                "sender",
                data.set_sender(
                    identifier.authority.as_deref().unwrap_or_default(),
                    &identifier.value,
                ),
            );
        }
        if let Some(receiver) = header.receivers.first() {
            let identifier = &receiver.identifier;
            copied(
                "receiver",
                data.set_receiver(
                    identifier.authority.as_deref().unwrap_or_default(),
                    &identifier.value,
                ),
            );
        }

        if let Some(business_message) = business_message {
            data.set_business_message(business_message);
        }

        let identification = &header.document_identification;
        copied("standard", data.set_standard(&identification.standard));
        copied(
            "type version",
            data.set_type_version(&identification.type_version),
        );
        copied(
            "type",
            data.set_document_type_name(&identification.document_type),
        );
        copied(
            "instance identifier",
            data.set_instance_identifier(&identification.instance_identifier),
        );
        data.set_creation_date_time(identification.creation_date_and_time);

        if let Some(scope) = &header.business_scope {
            if let Some(document_type) = scope.find(SCOPE_DOCUMENT_ID) {
                let scheme = document_type
                    .identifier
                    .as_deref()
                    .unwrap_or(DEFAULT_DOCUMENT_TYPE_SCHEME);
                let value = &document_type.instance_identifier;
                match self.factory.create_document_type_identifier(scheme, value) {
                    Some(identifier) => copied(
                        "document type",
                        data.set_document_type(identifier.scheme(), identifier.value()),
                    ),
                    None => debug!(
                        factory = self.factory.name(),
                        scheme,
                        value = value.as_str(),
                        "document type identifier rejected"
                    ),
                }
            }
            if let Some(process) = scope.find(SCOPE_PROCESS_ID) {
                let scheme = process
                    .identifier
                    .as_deref()
                    .unwrap_or(DEFAULT_PROCESS_SCHEME);
                let value = &process.instance_identifier;
                match self.factory.create_process_identifier(scheme, value) {
                    Some(identifier) => copied(
                        "process",
                        data.set_process(identifier.scheme(), identifier.value()),
                    ),
                    None => debug!(
                        factory = self.factory.name(),
                        scheme,
                        value = value.as_str(),
                        "process identifier rejected"
                    ),
                }
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{Identifier, SimpleIdentifierFactory};
    use crate::sbd::{BusinessScope, DocumentIdentification, Partner, Scope};
    use std::any::Any;
    use chrono::{FixedOffset, TimeZone};

    const SCHEME: &str = "iso6523-actorid-upis";

    fn reader() -> SbdhReader {
        SbdhReader::new(Arc::new(SimpleIdentifierFactory::new()))
    }

    fn header() -> StandardBusinessDocumentHeader {
        StandardBusinessDocumentHeader {
            header_version: "1.0".to_string(),
            senders: vec![Partner::new(SCHEME, "0088:sender")],
            receivers: vec![Partner::new(SCHEME, "0088:receiver")],
            document_identification: DocumentIdentification {
                standard: "urn:x".to_string(),
                type_version: "2.1".to_string(),
                instance_identifier: "id-1".to_string(),
                document_type: "Invoice".to_string(),
                multiple_type: None,
                creation_date_and_time: FixedOffset::west_opt(5 * 3600)
                    .unwrap()
                    .with_ymd_and_hms(2024, 2, 29, 23, 59, 59)
                    .unwrap(),
            },
            business_scope: None,
        }
    }

    fn payload() -> XmlElement {
        XmlElement::new_ns("urn:x", "Invoice")
    }

    #[test]
    fn test_extract_conforming() {
        let data = reader().extract(&header(), Some(&payload())).unwrap();
        assert!(data.are_all_fields_set());
        assert_eq!(data.sender_value(), Some("0088:sender"));
        assert_eq!(data.receiver_scheme(), Some(SCHEME));
        assert_eq!(data.instance_identifier(), Some("id-1"));
        assert_eq!(data.business_message(), Some(payload()));
    }

    #[test]
    fn test_extract_aggregates_messages() {
        let mut header = header();
        header.header_version = "0.9".to_string();
        header.document_identification.instance_identifier.clear();

        let err = reader().extract(&header, Some(&payload())).unwrap_err();
        assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidHeaderVersion));
        assert_eq!(
            err.to_string(),
            "Invalid SBDH header version '0.9' found\nInvalid SBDH instance identifier ''"
        );
    }

    #[test]
    fn test_checks_disabled_skips_validation() {
        let mut header = header();
        header.header_version = "0.9".to_string();

        let reader = reader().with_perform_value_checks(false);
        assert!(!reader.perform_value_checks());
        let data = reader.extract(&header, Some(&payload())).unwrap();
        assert!(data.are_all_fields_set());
    }

    #[test]
    fn test_extract_unchecked_tolerates_missing_parts() {
        let mut header = header();
        header.senders.clear();
        header.receivers[0].identifier.authority = None;
        header.document_identification.instance_identifier.clear();

        let data = reader().extract_unchecked(&header, None);
        assert!(data.sender().is_none());
        assert!(data.receiver().is_none());
        assert!(data.instance_identifier().is_none());
        assert!(!data.has_business_message());
        assert_eq!(data.standard(), Some("urn:x"));
    }

    #[test]
    fn test_extract_unchecked_copies_business_message() {
        let mut source = payload();
        let data = reader().extract_unchecked(&header(), Some(&source));
        source.set_attribute("changed", "yes");
        assert_eq!(data.business_message(), Some(payload()));
    }

    #[derive(Debug)]
    struct NoProcesses;

    impl IdentifierFactory for NoProcesses {
        fn name(&self) -> &str {
            "no-processes"
        }

        fn create_participant_identifier(&self, scheme: &str, value: &str) -> Option<Identifier> {
            Some(Identifier::new(scheme, value))
        }

        fn create_process_identifier(&self, _scheme: &str, _value: &str) -> Option<Identifier> {
            None
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn scoped_header() -> StandardBusinessDocumentHeader {
        let mut header = header();
        header.business_scope = Some(BusinessScope {
            scopes: vec![
                Scope {
                    scope_type: SCOPE_DOCUMENT_ID.to_string(),
                    instance_identifier: "urn:x::Invoice##2.1".to_string(),
                    identifier: None,
                },
                Scope {
                    scope_type: SCOPE_PROCESS_ID.to_string(),
                    instance_identifier: "urn:x:process".to_string(),
                    identifier: Some("custom-procid".to_string()),
                },
            ],
        });
        header
    }

    #[test]
    fn test_extract_unchecked_builds_scope_identifiers() {
        let data = reader().extract_unchecked(&scoped_header(), None);
        assert_eq!(
            data.document_type(),
            Some(&Identifier::new(DEFAULT_DOCUMENT_TYPE_SCHEME, "urn:x::Invoice##2.1"))
        );
        assert_eq!(
            data.process(),
            Some(&Identifier::new("custom-procid", "urn:x:process"))
        );
    }

    #[test]
    fn test_rejected_scope_identifier_is_left_unset() {
        let reader = SbdhReader::new(Arc::new(NoProcesses));
        assert_eq!(reader.factory().name(), "no-processes");

        let data = reader.extract(&scoped_header(), Some(&payload())).unwrap();
        assert!(data.document_type().is_some());
        assert!(data.process().is_none());
        assert!(data.are_all_fields_set());
    }

    #[test]
    fn test_missing_header() {
        let document = StandardBusinessDocument {
            header: None,
            business_message: Some(SharedElement::new(payload())),
        };
        let err = reader().extract_from_document(&document).unwrap_err();
        assert_eq!(err.kind(), Some(SbdhErrorKind::MissingSbdh));
    }

    #[test]
    fn test_malformed_input() {
        let err = reader().extract_from_str("<not-closed>").unwrap_err();
        assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidSbdXml));

        let err = reader().extract_from_str("<Invoice/>").unwrap_err();
        assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidSbdXml));
        assert_eq!(err.to_string(), SbdhErrorKind::InvalidSbdXml.template());
    }

    #[test]
    fn test_missing_file_is_invalid_sbd_xml() {
        let dir = tempfile::tempdir().unwrap();
        let err = reader()
            .extract_from_path(dir.path().join("absent.xml"))
            .unwrap_err();
        assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidSbdXml));
    }
}
