//! The canonical in-memory envelope.
//!
//! [`EnvelopeData`] is the contract between [`SbdhReader`](crate::SbdhReader)
//! and [`SbdhWriter`](crate::SbdhWriter). It may be filled in field by field;
//! only [`EnvelopeData::are_all_fields_set`] decides whether it is complete
//! enough to be written.

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use tracing::warn;

use crate::error::{SbdhError, SbdhResult};
use crate::identifier::{Identifier, IdentifierFactory};
use crate::xml::{SharedElement, XmlElement};

/// Type version used by [`EnvelopeData::create_ubl21`].
pub const UBL_21_TYPE_VERSION: &str = "2.1";

/// Sender, receiver, document identification and business message of one envelope.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EnvelopeData {
    sender: Option<Identifier>,
    receiver: Option<Identifier>,
    document_type: Option<Identifier>,
    process: Option<Identifier>,
    standard: Option<String>,
    type_version: Option<String>,
    document_type_name: Option<String>,
    instance_identifier: Option<String>,
    creation_date_time: Option<DateTime<FixedOffset>>,
    business_message: Option<SharedElement>,
}

fn require(name: &str, value: &str) -> SbdhResult<()> {
    if value.is_empty() {
        return Err(SbdhError::empty_argument(name));
    }
    Ok(())
}

fn pair(name: &str, scheme: &str, value: &str) -> SbdhResult<Identifier> {
    require(&format!("{name} scheme"), scheme)?;
    require(&format!("{name} value"), value)?;
    Ok(Identifier::new(scheme, value))
}

/// Truncate to millisecond precision.
pub fn truncate_to_millis(date_time: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    date_time.trunc_subsecs(3)
}

impl EnvelopeData {
    /// Create an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an envelope for a UBL 2.1 business message.
    ///
    /// Standard and type are taken from the namespace and local name of
    /// `business_message`, the instance identifier comes from `factory`, the
    /// creation time is now and the type version is [`UBL_21_TYPE_VERSION`].
    /// Sender, receiver, document type and process are left to the caller.
    pub fn create_ubl21(
        business_message: &XmlElement,
        factory: &dyn IdentifierFactory,
    ) -> SbdhResult<Self> {
        let standard = business_message.namespace().unwrap_or_default();
        let mut data = Self::new();
        data.set_document_identification(
            standard,
            UBL_21_TYPE_VERSION,
            business_message.local_name(),
            &factory.new_instance_identifier(),
            Utc::now().fixed_offset(),
        )?
        .set_business_message(business_message);
        Ok(data)
    }

    pub fn sender(&self) -> Option<&Identifier> {
        self.sender.as_ref()
    }

    pub fn sender_scheme(&self) -> Option<&str> {
        self.sender.as_ref().map(Identifier::scheme)
    }

    pub fn sender_value(&self) -> Option<&str> {
        self.sender.as_ref().map(Identifier::value)
    }

    /// Set the sender. Both parts must be non-empty.
    pub fn set_sender(&mut self, scheme: &str, value: &str) -> SbdhResult<&mut Self> {
        self.sender = Some(pair("sender", scheme, value)?);
        Ok(self)
    }

    pub fn receiver(&self) -> Option<&Identifier> {
        self.receiver.as_ref()
    }

    pub fn receiver_scheme(&self) -> Option<&str> {
        self.receiver.as_ref().map(Identifier::scheme)
    }

    pub fn receiver_value(&self) -> Option<&str> {
        self.receiver.as_ref().map(Identifier::value)
    }

    /// Set the receiver. Both parts must be non-empty.
    pub fn set_receiver(&mut self, scheme: &str, value: &str) -> SbdhResult<&mut Self> {
        self.receiver = Some(pair("receiver", scheme, value)?);
        Ok(self)
    }

    /// Document type identifier carried in the business scope.
    pub fn document_type(&self) -> Option<&Identifier> {
        self.document_type.as_ref()
    }

    pub fn set_document_type(&mut self, scheme: &str, value: &str) -> SbdhResult<&mut Self> {
        self.document_type = Some(pair("document type", scheme, value)?);
        Ok(self)
    }

    /// Process identifier carried in the business scope.
    pub fn process(&self) -> Option<&Identifier> {
        self.process.as_ref()
    }

    pub fn set_process(&mut self, scheme: &str, value: &str) -> SbdhResult<&mut Self> {
        self.process = Some(pair("process", scheme, value)?);
        Ok(self)
    }

    pub fn standard(&self) -> Option<&str> {
        self.standard.as_deref()
    }

    pub fn set_standard(&mut self, standard: &str) -> SbdhResult<&mut Self> {
        require("standard", standard)?;
        self.standard = Some(standard.to_string());
        Ok(self)
    }

    pub fn type_version(&self) -> Option<&str> {
        self.type_version.as_deref()
    }

    pub fn set_type_version(&mut self, type_version: &str) -> SbdhResult<&mut Self> {
        require("type version", type_version)?;
        self.type_version = Some(type_version.to_string());
        Ok(self)
    }

    /// Local name of the document type, e.g. `Invoice`.
    pub fn document_type_name(&self) -> Option<&str> {
        self.document_type_name.as_deref()
    }

    pub fn set_document_type_name(&mut self, name: &str) -> SbdhResult<&mut Self> {
        require("type", name)?;
        self.document_type_name = Some(name.to_string());
        Ok(self)
    }

    pub fn instance_identifier(&self) -> Option<&str> {
        self.instance_identifier.as_deref()
    }

    pub fn set_instance_identifier(&mut self, identifier: &str) -> SbdhResult<&mut Self> {
        require("instance identifier", identifier)?;
        self.instance_identifier = Some(identifier.to_string());
        Ok(self)
    }

    /// Creation time, always at millisecond precision.
    pub fn creation_date_time(&self) -> Option<DateTime<FixedOffset>> {
        self.creation_date_time
    }

    /// Set the creation time. Sub-millisecond precision is truncated.
    pub fn set_creation_date_time(&mut self, date_time: DateTime<FixedOffset>) -> &mut Self {
        self.creation_date_time = Some(truncate_to_millis(date_time));
        self
    }

    /// Set standard, type version, type, instance identifier and creation time at once.
    pub fn set_document_identification(
        &mut self,
        standard: &str,
        type_version: &str,
        type_name: &str,
        instance_identifier: &str,
        creation_date_time: DateTime<FixedOffset>,
    ) -> SbdhResult<&mut Self> {
        self.set_standard(standard)?
            .set_type_version(type_version)?
            .set_document_type_name(type_name)?
            .set_instance_identifier(instance_identifier)?
            .set_creation_date_time(creation_date_time);
        Ok(self)
    }

    pub fn has_business_message(&self) -> bool {
        self.business_message.is_some()
    }

    /// A fresh copy of the business message.
    pub fn business_message(&self) -> Option<XmlElement> {
        self.business_message.as_ref().map(SharedElement::to_element)
    }

    /// The live business message, without copying.
    ///
    /// Mutations through the returned handle change this envelope.
    pub fn business_message_no_clone(&self) -> Option<SharedElement> {
        self.business_message.as_ref().map(SharedElement::share)
    }

    /// Store a deep copy of `element`.
    ///
    /// The caller may keep mutating `element` afterwards without affecting
    /// this envelope.
    pub fn set_business_message(&mut self, element: &XmlElement) -> &mut Self {
        self.business_message = Some(SharedElement::new(element.clone()));
        self
    }

    /// Store `element` without copying.
    ///
    /// Only use this when the caller will not mutate `element` afterwards:
    /// every later mutation through any handle to the same tree is visible
    /// in this envelope.
    pub fn set_business_message_no_clone(&mut self, element: &SharedElement) -> &mut Self {
        self.business_message = Some(element.share());
        self
    }

    /// Check that every required field is set, reporting each missing one.
    ///
    /// Fields are checked in a fixed order and `on_missing` is called once per
    /// missing field. Document type and process identifiers are not required.
    pub fn are_all_fields_set_with<F>(&self, mut on_missing: F) -> bool
    where
        F: FnMut(&str),
    {
        let checks: [(bool, &str); 8] = [
            (self.sender.is_some(), "sender identifier"),
            (self.receiver.is_some(), "receiver identifier"),
            (self.standard.is_some(), "standard"),
            (self.type_version.is_some(), "type version"),
            (self.document_type_name.is_some(), "type"),
            (self.instance_identifier.is_some(), "instance identifier"),
            (self.creation_date_time.is_some(), "creation date time"),
            (self.business_message.is_some(), "business message"),
        ];

        let mut missing = 0;
        for (is_set, field) in checks {
            if !is_set {
                on_missing(field);
                missing += 1;
            }
        }
        missing == 0
    }

    /// Check that every required field is set.
    pub fn are_all_fields_set(&self) -> bool {
        self.are_all_fields_set_with(|_| {})
    }

    /// Check that every required field is set, logging each missing one.
    pub fn are_all_fields_set_logged(&self) -> bool {
        self.are_all_fields_set_with(|field| warn!(field, "SBDH field is not set"))
    }

    /// Descriptions of all missing required fields.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        self.are_all_fields_set_with(|field| missing.push(field.to_string()));
        missing
    }
}

impl Clone for EnvelopeData {
    /// Clones deep-copy the business message.
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            document_type: self.document_type.clone(),
            process: self.process.clone(),
            standard: self.standard.clone(),
            type_version: self.type_version.clone(),
            document_type_name: self.document_type_name.clone(),
            instance_identifier: self.instance_identifier.clone(),
            creation_date_time: self.creation_date_time,
            business_message: self.business_message.as_ref().map(SharedElement::deep_copy),
        }
    }
}
