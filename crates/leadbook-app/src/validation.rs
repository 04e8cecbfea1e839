// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use validator::ValidateEmail;

use crate::{LeadStatus, NewContact, NewEmail, NewLead};

pub const NAME_PATH: &str = "name";
pub const DOMAIN_PATH: &str = "domain";
pub const STATUS_PATH: &str = "status";
pub const EMAILS_PATH: &str = "primary_contact.emails";

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9.-]+\.[a-z]{2,}$").expect("domain pattern is valid")
});

pub fn email_value_path(index: usize) -> String {
    format!("{EMAILS_PATH}[{index}].value")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldErrorKind {
    Required,
    InvalidFormat,
    InvariantViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub message: String,
}

/// Field path to messages, in path order. Never contains an empty entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn get(&self, path: &str) -> &[FieldError] {
        self.fields.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, path: &str, kind: FieldErrorKind) -> bool {
        self.get(path).iter().any(|error| error.kind == kind)
    }

    pub fn messages(&self, path: &str) -> String {
        self.get(path)
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.fields
            .iter()
            .flat_map(|(path, errors)| errors.iter().map(move |error| (path.as_str(), error)))
    }

    fn push(&mut self, path: impl Into<String>, kind: FieldErrorKind, message: &str) {
        self.fields.entry(path.into()).or_default().push(FieldError {
            kind,
            message: message.to_owned(),
        });
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = self
            .fields
            .keys()
            .map(|path| format!("{path}: {}", self.messages(path)))
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Lead-shaped input as assembled from the form, before any rule ran.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeadCandidate {
    pub name: String,
    pub domain: Option<String>,
    pub status: Option<String>,
    pub primary_contact: Option<ContactCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactCandidate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub emails: Vec<EmailCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmailCandidate {
    pub value: String,
    pub is_primary: bool,
}

/// Runs every rule and reports all violations together. On success the
/// candidate is returned in wire shape with `status` defaulted to `new`.
pub fn validate(candidate: &LeadCandidate) -> Result<NewLead, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = candidate.name.trim();
    if name.is_empty() {
        errors.push(NAME_PATH, FieldErrorKind::Required, "name is required");
    }

    let domain = candidate
        .domain
        .as_deref()
        .filter(|domain| !domain.is_empty());
    if let Some(domain) = domain
        && !DOMAIN_PATTERN.is_match(domain)
    {
        errors.push(DOMAIN_PATH, FieldErrorKind::InvalidFormat, "invalid domain");
    }

    let status = match candidate.status.as_deref() {
        None => Some(LeadStatus::New),
        Some(raw) => {
            let parsed = LeadStatus::parse(raw);
            if parsed.is_none() {
                errors.push(
                    STATUS_PATH,
                    FieldErrorKind::InvalidFormat,
                    "status must be one of new, qualified, lost",
                );
            }
            parsed
        }
    };

    let contact = candidate
        .primary_contact
        .as_ref()
        .map(|contact| validate_contact(contact, &mut errors));

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewLead {
        name: name.to_owned(),
        domain: domain.map(str::to_owned),
        status: status.unwrap_or_default(),
        primary_contact: contact,
    })
}

fn validate_contact(contact: &ContactCandidate, errors: &mut ValidationErrors) -> NewContact {
    if contact.emails.is_empty() {
        errors.push(
            EMAILS_PATH,
            FieldErrorKind::Required,
            "at least one email is required",
        );
    }

    let mut emails = Vec::with_capacity(contact.emails.len());
    for (index, email) in contact.emails.iter().enumerate() {
        let value = email.value.trim();
        if value.is_empty() {
            errors.push(
                email_value_path(index),
                FieldErrorKind::Required,
                "email must not be empty",
            );
        } else if !value.validate_email() {
            errors.push(
                email_value_path(index),
                FieldErrorKind::InvalidFormat,
                "invalid email",
            );
        }
        emails.push(NewEmail {
            value: value.to_owned(),
            is_primary: email.is_primary,
        });
    }

    let primaries = contact.emails.iter().filter(|email| email.is_primary).count();
    if primaries != 1 {
        errors.push(
            EMAILS_PATH,
            FieldErrorKind::InvariantViolation,
            "must have exactly one primary email",
        );
    }

    NewContact {
        first_name: non_blank(contact.first_name.as_deref()),
        last_name: non_blank(contact.last_name.as_deref()),
        emails,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
