//! Standard Business Document domain objects and their XML mapping.
//!
//! These types mirror the wire schema one to one. They are what the reader
//! validates and what the writer produces; conversion from and to
//! [`XmlElement`] trees is done here.

use std::io::{self, BufRead};

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;

use crate::xml::{SharedElement, XmlElement, XmlError, XmlNode};

/// Namespace of the Standard Business Document Header schema.
pub const SBDH_NAMESPACE: &str =
    "http://www.unece.org/cefact/namespaces/StandardBusinessDocumentHeader";

/// Scope type carrying the document type identifier.
pub const SCOPE_DOCUMENT_ID: &str = "DOCUMENTID";
/// Scope type carrying the process identifier.
pub const SCOPE_PROCESS_ID: &str = "PROCESSID";

/// Errors raised when XML does not match the Standard Business Document schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    /// The XML itself could not be parsed
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The root element is not a Standard Business Document
    #[error("Expected StandardBusinessDocument root element but found {0}")]
    UnexpectedRoot(String),

    /// A mandatory element is absent
    #[error("Missing mandatory element {0}")]
    MissingElement(&'static str),

    /// An element appears where the schema does not allow it
    #[error("Unexpected element {0}")]
    UnexpectedElement(String),

    /// A date time value could not be parsed
    #[error("Invalid date time '{0}'")]
    InvalidDateTime(String),

    /// A boolean value could not be parsed
    #[error("Invalid boolean '{0}'")]
    InvalidBoolean(String),
}

/// Identifier of a sender or receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerIdentification {
    /// `Authority` attribute, i.e. the identifier scheme
    pub authority: Option<String>,
    /// Identifier value
    pub value: String,
}

/// A `Sender` or `Receiver` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partner {
    pub identifier: PartnerIdentification,
}

impl Partner {
    pub fn new(authority: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            identifier: PartnerIdentification {
                authority: Some(authority.into()),
                value: value.into(),
            },
        }
    }
}

/// The `DocumentIdentification` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentification {
    pub standard: String,
    pub type_version: String,
    pub instance_identifier: String,
    /// Local name of the business message root element
    pub document_type: String,
    pub multiple_type: Option<bool>,
    pub creation_date_and_time: DateTime<FixedOffset>,
}

/// One `Scope` of the business scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// e.g. [`SCOPE_DOCUMENT_ID`] or [`SCOPE_PROCESS_ID`]
    pub scope_type: String,
    pub instance_identifier: String,
    /// Scheme of `instance_identifier`
    pub identifier: Option<String>,
}

/// The `BusinessScope` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessScope {
    pub scopes: Vec<Scope>,
}

impl BusinessScope {
    /// First scope of the given type.
    pub fn find(&self, scope_type: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.scope_type == scope_type)
    }
}

/// The `StandardBusinessDocumentHeader` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardBusinessDocumentHeader {
    pub header_version: String,
    pub senders: Vec<Partner>,
    pub receivers: Vec<Partner>,
    pub document_identification: DocumentIdentification,
    pub business_scope: Option<BusinessScope>,
}

/// A Standard Business Document: optional header plus business message.
#[derive(Debug, PartialEq, Eq)]
pub struct StandardBusinessDocument {
    pub header: Option<StandardBusinessDocumentHeader>,
    pub business_message: Option<SharedElement>,
}

impl StandardBusinessDocument {
    /// Map a parsed `StandardBusinessDocument` element.
    ///
    /// The business message subtree is moved, not copied.
    pub fn from_element(root: XmlElement) -> Result<Self, MarshalError> {
        if !root.is(Some(SBDH_NAMESPACE), "StandardBusinessDocument") {
            return Err(MarshalError::UnexpectedRoot(display_name(&root)));
        }

        let mut header = None;
        let mut business_message: Option<SharedElement> = None;
        for node in root.into_children() {
            let XmlNode::Element(element) = node else {
                continue;
            };
            if element.is(Some(SBDH_NAMESPACE), "StandardBusinessDocumentHeader") {
                if header.is_some() || business_message.is_some() {
                    return Err(MarshalError::UnexpectedElement(display_name(&element)));
                }
                header = Some(read_header(&element)?);
            } else if element.namespace() == Some(SBDH_NAMESPACE) || business_message.is_some() {
                return Err(MarshalError::UnexpectedElement(display_name(&element)));
            } else {
                business_message = Some(SharedElement::new(element));
            }
        }

        Ok(Self {
            header,
            business_message,
        })
    }

    /// Parse and map a document from a string.
    pub fn parse_str(xml: &str) -> Result<Self, MarshalError> {
        Self::from_element(XmlElement::parse_str(xml)?)
    }

    /// Parse and map a document from a buffered reader.
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<Self, MarshalError> {
        Self::from_element(XmlElement::parse_reader(reader)?)
    }

    /// Build the XML tree. The business message is copied into the tree.
    pub fn to_element(&self) -> XmlElement {
        let mut root = sbdh("StandardBusinessDocument");
        if let Some(header) = &self.header {
            root.push_child(write_header(header));
        }
        if let Some(business_message) = &self.business_message {
            root.push_child(business_message.to_element());
        }
        root
    }

    /// Serialize as an XML document.
    pub fn to_xml_string(&self) -> String {
        self.to_element().to_xml_document()
    }

    /// Write the serialized document to `writer`.
    pub fn write_to<W: io::Write>(&self, writer: W) -> io::Result<()> {
        self.to_element().write_to(writer)
    }
}

fn display_name(element: &XmlElement) -> String {
    match element.namespace() {
        Some(namespace) => format!("{{{namespace}}}{}", element.local_name()),
        None => element.local_name().to_string(),
    }
}

fn sbdh(local_name: &str) -> XmlElement {
    XmlElement::new_ns(SBDH_NAMESPACE, local_name)
}

fn sbdh_text(local_name: &str, text: &str) -> XmlElement {
    let element = sbdh(local_name);
    if text.is_empty() {
        element
    } else {
        element.with_text(text)
    }
}

fn child<'a>(parent: &'a XmlElement, name: &'static str) -> Result<&'a XmlElement, MarshalError> {
    parent
        .first_child(Some(SBDH_NAMESPACE), name)
        .ok_or(MarshalError::MissingElement(name))
}

fn child_text(parent: &XmlElement, name: &'static str) -> Result<String, MarshalError> {
    child(parent, name).map(XmlElement::text)
}

fn read_header(element: &XmlElement) -> Result<StandardBusinessDocumentHeader, MarshalError> {
    let partners = |name: &'static str| {
        element
            .children_named(Some(SBDH_NAMESPACE), name)
            .map(read_partner)
            .collect::<Result<Vec<_>, _>>()
    };

    let business_scope = match element.first_child(Some(SBDH_NAMESPACE), "BusinessScope") {
        Some(scope) => Some(read_business_scope(scope)?),
        None => None,
    };

    Ok(StandardBusinessDocumentHeader {
        header_version: child_text(element, "HeaderVersion")?,
        senders: partners("Sender")?,
        receivers: partners("Receiver")?,
        document_identification: read_document_identification(child(
            element,
            "DocumentIdentification",
        )?)?,
        business_scope,
    })
}

fn read_partner(element: &XmlElement) -> Result<Partner, MarshalError> {
    let identifier = child(element, "Identifier")?;
    Ok(Partner {
        identifier: PartnerIdentification {
            authority: identifier.attribute("Authority").map(str::to_string),
            value: identifier.text(),
        },
    })
}

fn read_document_identification(
    element: &XmlElement,
) -> Result<DocumentIdentification, MarshalError> {
    let multiple_type = match element.first_child(Some(SBDH_NAMESPACE), "MultipleType") {
        Some(flag) => Some(parse_boolean(&flag.text())?),
        None => None,
    };
    Ok(DocumentIdentification {
        standard: child_text(element, "Standard")?,
        type_version: child_text(element, "TypeVersion")?,
        instance_identifier: child_text(element, "InstanceIdentifier")?,
        document_type: child_text(element, "Type")?,
        multiple_type,
        creation_date_and_time: parse_date_time(&child_text(element, "CreationDateAndTime")?)?,
    })
}

fn read_business_scope(element: &XmlElement) -> Result<BusinessScope, MarshalError> {
    let scopes = element
        .children_named(Some(SBDH_NAMESPACE), "Scope")
        .map(|scope| -> Result<Scope, MarshalError> {
            Ok(Scope {
                scope_type: child_text(scope, "Type")?,
                instance_identifier: child_text(scope, "InstanceIdentifier")?,
                identifier: scope
                    .first_child(Some(SBDH_NAMESPACE), "Identifier")
                    .map(XmlElement::text),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BusinessScope { scopes })
}

fn parse_boolean(text: &str) -> Result<bool, MarshalError> {
    match text.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(MarshalError::InvalidBoolean(other.to_string())),
    }
}

/// Parse an `xs:dateTime`. Values without offset are taken as UTC.
pub fn parse_date_time(text: &str) -> Result<DateTime<FixedOffset>, MarshalError> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
        })
        .map_err(|_| MarshalError::InvalidDateTime(text.to_string()))
}

/// Format an `xs:dateTime` with millisecond precision and explicit offset.
pub fn format_date_time(date_time: &DateTime<FixedOffset>) -> String {
    date_time.to_rfc3339_opts(SecondsFormat::Millis, false)
}

fn write_partner(local_name: &str, partner: &Partner) -> XmlElement {
    let mut identifier = sbdh_text("Identifier", &partner.identifier.value);
    if let Some(authority) = &partner.identifier.authority {
        identifier.set_attribute("Authority", authority.as_str());
    }
    sbdh(local_name).with_child(identifier)
}

fn write_header(header: &StandardBusinessDocumentHeader) -> XmlElement {
    let mut element = sbdh("StandardBusinessDocumentHeader")
        .with_child(sbdh_text("HeaderVersion", &header.header_version));
    for sender in &header.senders {
        element.push_child(write_partner("Sender", sender));
    }
    for receiver in &header.receivers {
        element.push_child(write_partner("Receiver", receiver));
    }

    let identification = &header.document_identification;
    let mut document = sbdh("DocumentIdentification")
        .with_child(sbdh_text("Standard", &identification.standard))
        .with_child(sbdh_text("TypeVersion", &identification.type_version))
        .with_child(sbdh_text(
            "InstanceIdentifier",
            &identification.instance_identifier,
        ))
        .with_child(sbdh_text("Type", &identification.document_type));
    if let Some(multiple_type) = identification.multiple_type {
        document.push_child(sbdh_text("MultipleType", &multiple_type.to_string()));
    }
    document.push_child(sbdh_text(
        "CreationDateAndTime",
        &format_date_time(&identification.creation_date_and_time),
    ));
    element.push_child(document);

    if let Some(business_scope) = &header.business_scope {
        let mut scopes = sbdh("BusinessScope");
        for scope in &business_scope.scopes {
            let mut entry = sbdh("Scope")
                .with_child(sbdh_text("Type", &scope.scope_type))
                .with_child(sbdh_text("InstanceIdentifier", &scope.instance_identifier));
            if let Some(identifier) = &scope.identifier {
                entry.push_child(sbdh_text("Identifier", identifier));
            }
            scopes.push_child(entry);
        }
        element.push_child(scopes);
    }
    element
}
