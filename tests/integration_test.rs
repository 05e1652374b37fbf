//! Integration tests for sbdh-envelope
//!
//! These tests run complete documents through the reader and writer.

use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{FixedOffset, TimeZone, Timelike};
use sbdh_envelope::prelude::*;
use sbdh_envelope::rules::field;

const INVOICE: &str = include_str!("fixtures/invoice.sbd.xml");
const TWO_SENDERS: &str = include_str!("fixtures/two_senders.sbd.xml");

fn reader() -> SbdhReader {
    SbdhReader::new(Arc::new(SimpleIdentifierFactory::new()))
}

fn unchecked_reader() -> SbdhReader {
    reader().with_perform_value_checks(false)
}

// =============================================================================
// Reading
// =============================================================================

#[test]
fn test_extract_conforming_document() {
    let data = reader().extract_from_str(INVOICE).unwrap();

    assert!(data.are_all_fields_set());
    assert_eq!(data.sender_scheme(), Some("iso6523-actorid-upis"));
    assert_eq!(data.sender_value(), Some("0088:5798000000001"));
    assert_eq!(data.receiver_value(), Some("0088:5798000000002"));
    assert_eq!(
        data.standard(),
        Some("urn:oasis:names:specification:ubl:schema:xsd:Invoice-2")
    );
    assert_eq!(data.type_version(), Some("2.1"));
    assert_eq!(data.document_type_name(), Some("Invoice"));
    assert_eq!(
        data.instance_identifier(),
        Some("4b8a9c3e-2f1d-4c6b-9a7e-1d2c3b4a5f60")
    );
    assert_eq!(data.process().unwrap().scheme(), "cenbii-procid-ubl");
    assert_eq!(data.document_type().unwrap().scheme(), "busdox-docid-qns");

    let created = data.creation_date_time().unwrap();
    let expected = FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 5, 10, 15, 30)
        .unwrap()
        .with_nanosecond(123_000_000)
        .unwrap();
    assert_eq!(created, expected);
    assert_eq!(created.offset().local_minus_utc(), 3600);

    let message = data.business_message().unwrap();
    assert_eq!(message.local_name(), "Invoice");
    assert_eq!(message.child_elements().count(), 3);
    assert_eq!(
        message.child_elements().last().unwrap().text(),
        "Payment within 30 days & no discount"
    );
}

#[test]
fn test_wrong_header_version_reports_single_error() {
    let xml = INVOICE.replace(
        "<sh:HeaderVersion>1.0</sh:HeaderVersion>",
        "<sh:HeaderVersion>0.9</sh:HeaderVersion>",
    );

    let err = reader().extract_from_str(&xml).unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidHeaderVersion));
    assert_eq!(err.to_string(), "Invalid SBDH header version '0.9' found");

    let document = StandardBusinessDocument::parse_str(&xml).unwrap();
    let message = document
        .business_message
        .as_ref()
        .map(SharedElement::to_element);
    let report = reader().validate(document.header.as_ref().unwrap(), message.as_ref());
    assert_eq!(report.len(), 1);
    assert_eq!(report.entries()[0].field_path, field::HEADER_VERSION);
}

#[test]
fn test_two_senders_rejected() {
    let err = reader().extract_from_str(TWO_SENDERS).unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::SenderNotExactlyOne));
    assert_eq!(
        err.to_string(),
        "Expected exactly one SBDH sender but found 2"
    );
}

#[test]
fn test_unchecked_extraction_takes_first_sender() {
    let document = StandardBusinessDocument::parse_str(TWO_SENDERS).unwrap();
    let header = document.header.as_ref().unwrap();
    let message = document
        .business_message
        .as_ref()
        .map(SharedElement::to_element);

    let data = unchecked_reader().extract_unchecked(header, message.as_ref());
    assert_eq!(data.sender_value(), Some("0088:first"));
    assert!(data.are_all_fields_set());

    let data = unchecked_reader().extract_from_str(TWO_SENDERS).unwrap();
    assert_eq!(data.sender_value(), Some("0088:first"));
}

#[test]
fn test_all_errors_reported() {
    let xml = INVOICE
        .replace(
            "<sh:HeaderVersion>1.0</sh:HeaderVersion>",
            "<sh:HeaderVersion>2.0</sh:HeaderVersion>",
        )
        .replace(
            r#"<sh:Identifier Authority="iso6523-actorid-upis">0088:5798000000002"#,
            r#"<sh:Identifier Authority="gln">0088:5798000000002"#,
        )
        .replace(
            "<sh:InstanceIdentifier>4b8a9c3e-2f1d-4c6b-9a7e-1d2c3b4a5f60</sh:InstanceIdentifier>",
            "<sh:InstanceIdentifier></sh:InstanceIdentifier>",
        );

    let err = reader().extract_from_str(&xml).unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidHeaderVersion));
    assert_eq!(err.to_string().lines().count(), 3);

    let document = StandardBusinessDocument::parse_str(&xml).unwrap();
    let message = document
        .business_message
        .as_ref()
        .map(SharedElement::to_element);
    let report = reader().validate(document.header.as_ref().unwrap(), message.as_ref());
    assert!(report.contains_kind(SbdhErrorKind::InvalidHeaderVersion));
    assert!(report.contains_kind(SbdhErrorKind::InvalidReceiverAuthority));
    assert!(report.contains_kind(SbdhErrorKind::InvalidInstanceIdentifier));
    assert!(report.len() >= 3);
}

#[test]
fn test_zero_senders_reported_with_other_errors() {
    let mut document = StandardBusinessDocument::parse_str(INVOICE).unwrap();
    let header = document.header.as_mut().unwrap();
    header.header_version = "0.9".to_string();
    header.senders.clear();
    header.document_identification.instance_identifier.clear();

    let message = document
        .business_message
        .as_ref()
        .map(SharedElement::to_element);
    let report = reader().validate(document.header.as_ref().unwrap(), message.as_ref());
    let kinds: Vec<SbdhErrorKind> = report.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SbdhErrorKind::InvalidHeaderVersion,
            SbdhErrorKind::SenderNotExactlyOne,
            SbdhErrorKind::InvalidInstanceIdentifier,
        ]
    );

    let err = reader().extract_from_document(&document).unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidHeaderVersion));
    assert_eq!(err.to_string().lines().count(), 3);
}

#[test]
fn test_malformed_input() {
    let err = reader().extract_from_str("<not-closed>").unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidSbdXml));

    let err = reader()
        .extract_from_str(r#"<Invoice xmlns="urn:x"/>"#)
        .unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidSbdXml));
}

#[test]
fn test_missing_header() {
    let xml = r#"<StandardBusinessDocument xmlns="http://www.unece.org/cefact/namespaces/StandardBusinessDocumentHeader"><Invoice xmlns="urn:x"/></StandardBusinessDocument>"#;
    let err = unchecked_reader().extract_from_str(xml).unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::MissingSbdh));
}

// =============================================================================
// Rule customization
// =============================================================================

#[test]
fn test_override_header_version_rule() {
    let xml = INVOICE.replace(
        "<sh:HeaderVersion>1.0</sh:HeaderVersion>",
        "<sh:HeaderVersion>0.9</sh:HeaderVersion>",
    );

    let mut reader = reader();
    reader
        .rules_mut()
        .register(ValidationRule::header_version(|v| v == "1.0" || v == "0.9"));

    let data = reader.extract_from_str(&xml).unwrap();
    assert!(data.are_all_fields_set());
    assert_eq!(reader.rules().len(), 10);
}

#[test]
fn test_warning_rule_does_not_fail_extraction() {
    let rules = RuleSetBuilder::from_rules(reader().rules().clone())
        .with(
            ValidationRule::new(
                "Invoice/Note",
                SbdhErrorKind::InvalidBusinessMessage,
                |input| match input.business_message {
                    Some(message) if message.child_elements().count() > 2 => {
                        Err(Vec::new())
                    }
                    _ => Ok(()),
                },
            )
            .as_warning(),
        )
        .build();
    let reader = SbdhReader::with_rules(rules, Arc::new(SimpleIdentifierFactory::new()));

    assert!(reader.extract_from_str(INVOICE).is_ok());

    let document = StandardBusinessDocument::parse_str(INVOICE).unwrap();
    let message = document
        .business_message
        .as_ref()
        .map(SharedElement::to_element);
    let report = reader.validate(document.header.as_ref().unwrap(), message.as_ref());
    assert!(!report.has_errors());
    assert_eq!(report.warnings().count(), 1);
}

#[test]
fn test_removed_rule_is_not_evaluated() {
    let rules = RuleSetBuilder::from_rules(reader().rules().clone())
        .without(field::SENDER)
        .build();
    let reader = SbdhReader::with_rules(rules, Arc::new(SimpleIdentifierFactory::new()));

    let data = reader.extract_from_str(TWO_SENDERS).unwrap();
    assert_eq!(data.sender_value(), Some("0088:first"));
}

// =============================================================================
// Writing
// =============================================================================

#[test]
fn test_round_trip_in_both_ownership_modes() {
    let data = unchecked_reader().extract_from_str(INVOICE).unwrap();

    for writer in [SbdhWriter::new(), SbdhWriter::new().with_favour_speed(true)] {
        let xml = writer.write_to_string(&data).unwrap();
        let again = unchecked_reader().extract_from_str(&xml).unwrap();
        assert_eq!(again, data);
    }
}

#[test]
fn test_round_trip_keeps_whitespace_text() {
    let note = XmlElement::parse_str(r#"<Note xmlns="urn:x">a <b>x</b> <i>y</i></Note>"#).unwrap();
    let payload = XmlElement::new_ns("urn:x", "Invoice")
        .with_child(note.clone())
        .with_child(XmlElement::new_ns("urn:x", "Blank").with_text(" "));

    let mut data = unchecked_reader().extract_from_str(INVOICE).unwrap();
    data.set_business_message(&payload).set_standard(" ").unwrap();

    for writer in [SbdhWriter::new(), SbdhWriter::new().with_favour_speed(true)] {
        let xml = writer.write_to_string(&data).unwrap();
        assert!(xml.contains("a <b>x</b> <i>y</i>"));

        let again = unchecked_reader().extract_from_str(&xml).unwrap();
        assert!(again.missing_fields().is_empty());
        assert_eq!(again.standard(), Some(" "));
        assert_eq!(again.business_message(), Some(payload.clone()));
        assert_eq!(again, data);
    }
}

#[test]
fn test_extract_keeps_mixed_content() {
    let xml = INVOICE.replace(
        "<cbc:IssueDate>2024-03-05</cbc:IssueDate>",
        "<cbc:IssueDate>2024-03-05</cbc:IssueDate><Text>a <b>x</b> <i>y</i></Text>",
    );

    let data = reader().extract_from_str(&xml).unwrap();
    let message = data.business_message().unwrap();
    let text = message
        .first_child(
            Some("urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"),
            "Text",
        )
        .unwrap();
    assert_eq!(text.text(), "a  ");
    assert_eq!(text.children().len(), 4);
}

#[test]
fn test_millisecond_truncation_is_idempotent() {
    let data = reader().extract_from_str(INVOICE).unwrap();
    let created = data.creation_date_time().unwrap();
    assert_eq!(created.nanosecond() % 1_000_000, 0);

    let xml = SbdhWriter::new().write_to_string(&data).unwrap();
    assert!(xml.contains("2024-03-05T10:15:30.123+01:00"));

    let again = reader().extract_from_str(&xml).unwrap();
    assert_eq!(again.creation_date_time(), Some(created));
}

#[test]
fn test_speed_mode_write_shares_business_message() {
    let data = reader().extract_from_str(INVOICE).unwrap();

    let shared = SbdhWriter::new().with_favour_speed(true).write(&data).unwrap();
    shared
        .business_message
        .as_ref()
        .unwrap()
        .write()
        .set_attribute("touched", "yes");
    assert_eq!(
        data.business_message().unwrap().attribute("touched"),
        Some("yes")
    );

    let copied = SbdhWriter::new().write(&data).unwrap();
    copied
        .business_message
        .as_ref()
        .unwrap()
        .write()
        .set_attribute("touched", "again");
    assert_eq!(
        data.business_message().unwrap().attribute("touched"),
        Some("yes")
    );
}

#[test]
fn test_write_new_ubl_envelope() {
    let factory = SimpleIdentifierFactory::new();
    let invoice = XmlElement::new_ns(
        "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2",
        "Invoice",
    )
    .with_child(XmlElement::new("ID").with_text("1"));

    let mut data = EnvelopeData::create_ubl21(&invoice, &factory).unwrap();
    assert!(!data.are_all_fields_set());
    data.set_sender("iso6523-actorid-upis", "0088:sender")
        .unwrap()
        .set_receiver("iso6523-actorid-upis", "0088:receiver")
        .unwrap();

    let xml = SbdhWriter::new().write_to_string(&data).unwrap();
    let read = reader().extract_from_str(&xml).unwrap();
    assert_eq!(read.document_type_name(), Some("Invoice"));
    assert_eq!(read.instance_identifier(), data.instance_identifier());
}

// =============================================================================
// Resources and configuration
// =============================================================================

/// Reader that records whether it was dropped.
struct TrackedSource {
    inner: Cursor<Vec<u8>>,
    closed: Arc<AtomicBool>,
}

impl Read for TrackedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn tracked(xml: &str) -> (TrackedSource, Arc<AtomicBool>) {
    let closed = Arc::new(AtomicBool::new(false));
    let source = TrackedSource {
        inner: Cursor::new(xml.as_bytes().to_vec()),
        closed: Arc::clone(&closed),
    };
    (source, closed)
}

#[test]
fn test_stream_closed_on_every_path() {
    let (source, closed) = tracked("<broken");
    assert!(reader().extract_from_reader(source).is_err());
    assert!(closed.load(Ordering::SeqCst));

    let (source, closed) = tracked(TWO_SENDERS);
    assert!(reader().extract_from_reader(source).is_err());
    assert!(closed.load(Ordering::SeqCst));

    let (source, closed) = tracked(INVOICE);
    assert!(reader().extract_from_reader(source).is_ok());
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn test_extract_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.sbd.xml");
    std::fs::write(&path, INVOICE).unwrap();

    let data = reader().extract_from_path(&path).unwrap();
    assert_eq!(data.document_type_name(), Some("Invoice"));

    let err = reader()
        .extract_from_path(dir.path().join("missing.xml"))
        .unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidSbdXml));
}

#[test]
fn test_config_file_drives_reader_and_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sbdh.json");
    SbdhConfig::new()
        .with_expected_header_version("0.9")
        .with_header_version_to_write("0.9")
        .to_file(&path)
        .unwrap();

    let config = SbdhConfig::from_file(&path).unwrap();
    let reader = SbdhReader::from_config(&config, Arc::new(SimpleIdentifierFactory::new()));
    let writer = SbdhWriter::from_config(&config);

    let err = reader.extract_from_str(INVOICE).unwrap_err();
    assert_eq!(err.kind(), Some(SbdhErrorKind::InvalidHeaderVersion));

    let data = unchecked_reader().extract_from_str(INVOICE).unwrap();
    let xml = writer.write_to_string(&data).unwrap();
    assert_eq!(reader.extract_from_str(&xml).unwrap(), data);
}

#[test]
fn test_reader_shared_between_threads() {
    let reader = reader();
    let writer = SbdhWriter::new();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let data = reader.extract_from_str(INVOICE).unwrap();
                    writer.write_to_string(&data).unwrap()
                })
            })
            .collect();

        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    });
}
