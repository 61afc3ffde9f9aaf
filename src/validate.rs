//! Validation of raw form submissions.
//!
//! Payloads arrive as untyped JSON so that every violated constraint can be
//! reported at once, grouped by the field name the form used.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::application::NewApplication;
use crate::models::contact::NewContactMessage;

pub const KITCHEN_CERTIFICATE_MESSAGE: &str =
    "Kitchen roles require a Level 2 Food Hygiene Certificate.";

/// Every constraint a submission violated.
///
/// Serializes as `{ "formErrors": [..], "fieldErrors": { <field>: [..] } }`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.is_empty()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.field_errors
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Reads fields out of a JSON object, recording violations as it goes.
struct Fields<'a> {
    body: &'a Map<String, Value>,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    fn new(body: &'a Map<String, Value>) -> Self {
        Self {
            body,
            errors: FieldErrors::default(),
        }
    }

    /// The string at `field` exactly as submitted, with missing and null
    /// collapsing to `None`.
    fn string(&mut self, field: &str) -> Option<String> {
        match self.body.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) => Some(value.clone()),
            Some(other) => {
                self.errors.add(
                    field,
                    format!("Expected string, received {}", json_type(other)),
                );
                None
            }
        }
    }

    fn check_length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let length = value.chars().count();
        if length < min {
            self.errors.add(
                field,
                format!("String must contain at least {min} character(s)"),
            );
        }
        if length > max {
            self.errors.add(
                field,
                format!("String must contain at most {max} character(s)"),
            );
        }
    }

    fn required(&mut self, field: &str, min: usize, max: usize) -> String {
        if self.body.get(field).map_or(true, Value::is_null) {
            self.errors.add(field, "Required");
            return String::new();
        }

        let Some(value) = self.string(field) else {
            return String::new();
        };
        self.check_length(field, &value, min, max);
        value
    }

    /// Blank optional answers are treated as unanswered.
    fn optional(&mut self, field: &str, max: usize) -> Option<String> {
        let value = self.string(field).filter(|value| !value.trim().is_empty())?;
        self.check_length(field, &value, 0, max);
        Some(value)
    }

    fn required_email(&mut self, field: &str, max: usize) -> String {
        let value = self.required(field, 1, max);
        if !value.is_empty() && !is_valid_email(&value) {
            self.errors.add(field, "Invalid email");
        }
        value
    }

    fn optional_email(&mut self, field: &str, max: usize) -> Option<String> {
        let value = self.optional(field, max)?;
        if !is_valid_email(&value) {
            self.errors.add(field, "Invalid email");
        }
        Some(value)
    }

    fn consent(&mut self, field: &str) -> bool {
        match self.body.get(field) {
            Some(Value::Bool(true)) => true,
            Some(Value::Bool(false)) => {
                self.errors.add(field, "Consent required");
                false
            }
            None | Some(Value::Null) => {
                self.errors.add(field, "Required");
                false
            }
            Some(other) => {
                self.errors.add(
                    field,
                    format!("Expected boolean, received {}", json_type(other)),
                );
                false
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, FieldErrors> {
    body.as_object().ok_or_else(|| FieldErrors {
        form_errors: vec![format!("Expected object, received {}", json_type(body))],
        field_errors: BTreeMap::new(),
    })
}

/// Validate and normalize a volunteer application.
pub fn application(body: &Value) -> Result<NewApplication, FieldErrors> {
    let mut fields = Fields::new(as_object(body)?);

    let mut application = NewApplication {
        full_name: fields.required("fullName", 2, 120),
        email: fields.required_email("email", 160),
        address: fields.required("address", 5, 250),
        postcode: fields.required("postcode", 3, 20),
        phone: fields.required("phone", 6, 30),
        emergency_name: fields.required("emergencyName", 2, 120),
        emergency_phone: fields.required("emergencyPhone", 6, 30),
        role: fields.required("role", 2, 80),
        availability: fields.required("availability", 5, 600),
        experience: fields.optional("experience", 2000),
        support_needs: fields.optional("supportNeeds", 2000),
        why_work_here: fields.optional("whyWorkHere", 2000),
        how_did_you_find_out: fields.optional("howDidYouFindOut", 300),
        nationality_visa: fields.optional("nationalityVisa", 200),
        food_hygiene_certificate: fields.optional("foodHygieneCertificate", 20),
        food_hygiene_certificate_bring: fields.optional("foodHygieneBring", 20),
        referee1_name: fields.optional("referee1Name", 120),
        referee1_address: fields.optional("referee1Address", 250),
        referee1_postcode: fields.optional("referee1Postcode", 20),
        referee1_email: fields.optional_email("referee1Email", 160),
        referee1_phone: fields.optional("referee1Phone", 30),
        referee1_relationship: fields.optional("referee1Relationship", 200),
        referee2_name: fields.optional("referee2Name", 120),
        referee2_address: fields.optional("referee2Address", 250),
        referee2_postcode: fields.optional("referee2Postcode", 20),
        referee2_email: fields.optional_email("referee2Email", 160),
        referee2_phone: fields.optional("referee2Phone", 30),
        referee2_relationship: fields.optional("referee2Relationship", 200),
        referee_name: fields.optional("refereeName", 120),
        referee_email: fields.optional_email("refereeEmail", 160),
        referee_relationship: fields.optional("refereeRelationship", 200),
        signature: fields.optional("signature", 120),
        signature_date: fields.optional("signatureDate", 20),
        consent: fields.consent("consent"),
    };

    if application.needs_kitchen_certificate()
        && application.food_hygiene_certificate.as_deref() != Some("Yes")
    {
        fields
            .errors
            .add("foodHygieneCertificate", KITCHEN_CERTIFICATE_MESSAGE);
    }

    application.mirror_primary_referee();
    fields.finish(application)
}

/// Validate and normalize a contact form message.
pub fn contact(body: &Value) -> Result<NewContactMessage, FieldErrors> {
    let mut fields = Fields::new(as_object(body)?);

    let message = NewContactMessage {
        name: fields.required("name", 1, 120),
        email: fields.required_email("email", 160),
        phone: fields.optional("phone", 30),
        subject: fields.optional("subject", 200),
        message: fields.required("message", 1, 5000),
    };

    fields.finish(message)
}
