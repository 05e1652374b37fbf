//! Reconstruction of Standard Business Documents from [`EnvelopeData`].

use std::io;

use tracing::debug;

use crate::config::{SbdhConfig, DEFAULT_HEADER_VERSION};
use crate::envelope::EnvelopeData;
use crate::error::{SbdhError, SbdhResult};
use crate::sbd::{
    BusinessScope, DocumentIdentification, Partner, Scope, StandardBusinessDocument,
    StandardBusinessDocumentHeader, SCOPE_DOCUMENT_ID, SCOPE_PROCESS_ID,
};

/// Writes complete [`EnvelopeData`] as Standard Business Documents.
#[derive(Debug, Clone)]
pub struct SbdhWriter {
    header_version: String,
    favour_speed: bool,
}

impl Default for SbdhWriter {
    fn default() -> Self {
        Self {
            header_version: DEFAULT_HEADER_VERSION.to_string(),
            favour_speed: false,
        }
    }
}

impl SbdhWriter {
    /// Create a writer emitting header version `1.0` with copied business messages.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SbdhConfig) -> Self {
        Self {
            header_version: config.header_version_to_write.clone(),
            favour_speed: config.favour_speed,
        }
    }

    /// Set the header version to emit.
    pub fn with_header_version(mut self, version: impl Into<String>) -> Self {
        self.header_version = version.into();
        self
    }

    pub fn header_version(&self) -> &str {
        &self.header_version
    }

    /// Share the business message with the written document instead of copying it.
    ///
    /// Only enable this when the envelope is discarded right after writing:
    /// otherwise later changes to its business message show up in the
    /// written document and vice versa.
    pub fn with_favour_speed(mut self, enabled: bool) -> Self {
        self.favour_speed = enabled;
        self
    }

    pub fn favour_speed(&self) -> bool {
        self.favour_speed
    }

    /// Build the document for `data`.
    ///
    /// Fails with [`SbdhError::InvalidArgument`] unless
    /// [`EnvelopeData::are_all_fields_set`] holds.
    pub fn write(&self, data: &EnvelopeData) -> SbdhResult<StandardBusinessDocument> {
        let (
            Some(sender),
            Some(receiver),
            Some(standard),
            Some(type_version),
            Some(document_type),
            Some(instance_identifier),
            Some(created),
            Some(business_message),
        ) = (
            data.sender(),
            data.receiver(),
            data.standard(),
            data.type_version(),
            data.document_type_name(),
            data.instance_identifier(),
            data.creation_date_time(),
            data.business_message_no_clone(),
        )
        else {
            return Err(SbdhError::InvalidArgument(format!(
                "not all SBDH fields are set, missing: {}",
                data.missing_fields().join(", ")
            )));
        };

        let mut scopes = Vec::new();
        if let Some(document_type) = data.document_type() {
            scopes.push(Scope {
                scope_type: SCOPE_DOCUMENT_ID.to_string(),
                instance_identifier: document_type.value().to_string(),
                identifier: Some(document_type.scheme().to_string()),
            });
        }
        if let Some(process) = data.process() {
            scopes.push(Scope {
                scope_type: SCOPE_PROCESS_ID.to_string(),
                instance_identifier: process.value().to_string(),
                identifier: Some(process.scheme().to_string()),
            });
        }

        let header = StandardBusinessDocumentHeader {
            header_version: self.header_version.clone(),
            senders: vec![Partner::new(sender.scheme(), sender.value())],
            receivers: vec![Partner::new(receiver.scheme(), receiver.value())],
            document_identification: DocumentIdentification {
                standard: standard.to_string(),
                type_version: type_version.to_string(),
                instance_identifier: instance_identifier.to_string(),
                document_type: document_type.to_string(),
                multiple_type: None,
                creation_date_and_time: created,
            },
            business_scope: (!scopes.is_empty()).then_some(BusinessScope { scopes }),
        };

        debug!(
            instance_identifier,
            favour_speed = self.favour_speed,
            "writing SBD"
        );
        let business_message = if self.favour_speed {
            business_message
        } else {
            business_message.deep_copy()
        };

        Ok(StandardBusinessDocument {
            header: Some(header),
            business_message: Some(business_message),
        })
    }

    /// Write `data` as an XML string.
    pub fn write_to_string(&self, data: &EnvelopeData) -> SbdhResult<String> {
        Ok(self.write(data)?.to_xml_string())
    }

    /// Write `data` as XML to `writer`.
    pub fn write_to<W: io::Write>(&self, data: &EnvelopeData, writer: W) -> SbdhResult<()> {
        self.write(data)?.write_to(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{SharedElement, XmlElement};
    use chrono::{FixedOffset, TimeZone};

    fn payload() -> XmlElement {
        XmlElement::new_ns("urn:x", "Invoice")
            .with_child(XmlElement::new_ns("urn:x", "ID").with_text("7"))
    }

    fn complete() -> EnvelopeData {
        let mut data = EnvelopeData::new();
        data.set_sender("iso6523-actorid-upis", "0088:sender")
            .unwrap()
            .set_receiver("iso6523-actorid-upis", "0088:receiver")
            .unwrap()
            .set_document_identification(
                "urn:x",
                "2.1",
                "Invoice",
                "id-1",
                FixedOffset::east_opt(0)
                    .unwrap()
                    .with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
                    .unwrap(),
            )
            .unwrap()
            .set_business_message(&payload());
        data
    }

    #[test]
    fn test_incomplete_envelope_is_rejected() {
        let mut data = EnvelopeData::new();
        data.set_standard("urn:x").unwrap();

        let err = SbdhWriter::new().write(&data).unwrap_err();
        assert!(matches!(err, SbdhError::InvalidArgument(_)));
        assert!(err.to_string().contains("sender identifier"));
        assert!(!err.to_string().contains("standard,"));
    }

    #[test]
    fn test_write_header() {
        let document = SbdhWriter::new().write(&complete()).unwrap();
        let header = document.header.unwrap();

        assert_eq!(header.header_version, "1.0");
        assert_eq!(header.senders, vec![Partner::new("iso6523-actorid-upis", "0088:sender")]);
        assert_eq!(header.receivers.len(), 1);
        assert_eq!(header.document_identification.document_type, "Invoice");
        assert!(header.business_scope.is_none());
    }

    #[test]
    fn test_header_version_is_configurable() {
        let config = SbdhConfig::new().with_header_version_to_write("1.1");
        let writer = SbdhWriter::from_config(&config);
        let document = writer.write(&complete()).unwrap();
        assert_eq!(document.header.unwrap().header_version, "1.1");
    }

    #[test]
    fn test_business_scope_written_when_set() {
        let mut data = complete();
        data.set_document_type("busdox-docid-qns", "urn:x::Invoice##2.1")
            .unwrap()
            .set_process("cenbii-procid-ubl", "urn:www.cenbii.eu:profile:bii04:ver2.0")
            .unwrap();

        let document = SbdhWriter::new().write(&data).unwrap();
        let scope = document.header.unwrap().business_scope.unwrap();
        assert_eq!(scope.scopes.len(), 2);
        assert_eq!(
            scope.find(SCOPE_PROCESS_ID).unwrap().identifier.as_deref(),
            Some("cenbii-procid-ubl")
        );
    }

    #[test]
    fn test_default_write_copies_business_message() {
        let data = complete();
        let document = SbdhWriter::new().write(&data).unwrap();
        let written = document.business_message.as_ref().unwrap();
        let source = data.business_message_no_clone().unwrap();

        assert!(!written.ptr_eq(&source));
        source.write().set_attribute("changed", "yes");
        assert_eq!(written.read().attribute("changed"), None);
    }

    #[test]
    fn test_favour_speed_shares_business_message() {
        let data = complete();
        let writer = SbdhWriter::new().with_favour_speed(true);
        let document = writer.write(&data).unwrap();
        let written = document.business_message.as_ref().unwrap();
        let source = data.business_message_no_clone().unwrap();

        assert!(written.ptr_eq(&source));
        source.write().set_attribute("changed", "yes");
        assert_eq!(written.read().attribute("changed"), Some("yes"));
    }

    #[test]
    fn test_write_to_string() {
        let xml = SbdhWriter::new().write_to_string(&complete()).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<HeaderVersion>1.0</HeaderVersion>"));
        assert!(xml.contains(r#"<Invoice xmlns="urn:x"><ID>7</ID></Invoice>"#));

        let mut data = complete();
        data.set_business_message_no_clone(&SharedElement::new(payload()));
        let mut buffer = Vec::new();
        SbdhWriter::new().write_to(&data, &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), xml);
    }
}
