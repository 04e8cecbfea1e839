// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{info, warn};

use crate::{
    ContactCandidate, EmailCandidate, Lead, LeadCandidate, LeadStatus, MutationError, NewLead,
    Resource, ValidationErrors, validate,
};

pub const SUBMIT_FAILED_MESSAGE: &str = "could not create lead, please try again";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDraft {
    pub value: String,
    pub is_primary: bool,
}

/// Flat editing state of the creation form. Whenever `emails` is
/// non-empty exactly one row is primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadDraft {
    pub name: String,
    pub domain: String,
    pub status: LeadStatus,
    pub first_name: String,
    pub last_name: String,
    emails: Vec<EmailDraft>,
}

impl Default for LeadDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            domain: String::new(),
            status: LeadStatus::New,
            first_name: String::new(),
            last_name: String::new(),
            emails: vec![EmailDraft {
                value: String::new(),
                is_primary: true,
            }],
        }
    }
}

/// Text inputs of the creation form, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Domain,
    Status,
    FirstName,
    LastName,
    Email(usize),
}

impl FormField {
    pub fn label(self) -> String {
        match self {
            Self::Name => "name".to_owned(),
            Self::Domain => "domain".to_owned(),
            Self::Status => "status".to_owned(),
            Self::FirstName => "first name".to_owned(),
            Self::LastName => "last name".to_owned(),
            Self::Email(index) => format!("email {}", index + 1),
        }
    }
}

impl LeadDraft {
    pub fn emails(&self) -> &[EmailDraft] {
        &self.emails
    }

    pub fn primary_index(&self) -> Option<usize> {
        self.emails.iter().position(|email| email.is_primary)
    }

    /// Position a row takes in the assembled candidate; blank rows are
    /// dropped there, so error paths must be mapped back through this.
    pub fn assembled_email_index(&self, row: usize) -> Option<usize> {
        let email = self.emails.get(row)?;
        if email.value.trim().is_empty() {
            return None;
        }
        Some(
            self.emails[..row]
                .iter()
                .filter(|email| !email.value.trim().is_empty())
                .count(),
        )
    }

    /// Tab order given the current number of email rows.
    pub fn fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::Name,
            FormField::Domain,
            FormField::Status,
            FormField::FirstName,
            FormField::LastName,
        ];
        fields.extend((0..self.emails.len()).map(FormField::Email));
        fields
    }

    pub fn text(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Domain => &self.domain,
            FormField::Status => self.status.as_str(),
            FormField::FirstName => &self.first_name,
            FormField::LastName => &self.last_name,
            FormField::Email(index) => self
                .emails
                .get(index)
                .map(|email| email.value.as_str())
                .unwrap_or(""),
        }
    }

    /// Replaces a text field. Status is picked, not typed, and is ignored.
    pub fn set_text(&mut self, field: FormField, value: &str) {
        match field {
            FormField::Name => value.clone_into(&mut self.name),
            FormField::Domain => value.clone_into(&mut self.domain),
            FormField::Status => {}
            FormField::FirstName => value.clone_into(&mut self.first_name),
            FormField::LastName => value.clone_into(&mut self.last_name),
            FormField::Email(index) => {
                self.set_email_value(index, value);
            }
        }
    }

    pub fn cycle_status(&mut self) {
        let next = LeadStatus::ALL
            .iter()
            .position(|status| *status == self.status)
            .map_or(0, |index| (index + 1) % LeadStatus::ALL.len());
        self.status = LeadStatus::ALL[next];
    }

    pub fn set_email_value(&mut self, index: usize, value: &str) -> bool {
        let Some(email) = self.emails.get_mut(index) else {
            return false;
        };
        value.clone_into(&mut email.value);
        true
    }

    /// Makes `index` the only primary row.
    pub fn mark_primary(&mut self, index: usize) -> bool {
        if index >= self.emails.len() {
            return false;
        }
        for (position, email) in self.emails.iter_mut().enumerate() {
            email.is_primary = position == index;
        }
        true
    }

    /// Appends a non-primary row, or a primary one if the list was empty.
    pub fn add_email(&mut self) -> usize {
        let is_primary = self.emails.is_empty();
        self.emails.push(EmailDraft {
            value: String::new(),
            is_primary,
        });
        self.emails.len() - 1
    }

    /// Removes a row, promoting the first remaining row when the primary
    /// goes. The last row cannot be removed.
    pub fn remove_email(&mut self, index: usize) -> bool {
        if self.emails.len() <= 1 || index >= self.emails.len() {
            return false;
        }
        let removed = self.emails.remove(index);
        if removed.is_primary
            && let Some(first) = self.emails.first_mut()
        {
            first.is_primary = true;
        }
        true
    }
}

/// Draft to lead-shaped candidate. The contact is omitted only when every
/// contact field is empty; whitespace counts as input. Blank email rows are
/// dropped.
pub fn assemble(draft: &LeadDraft) -> LeadCandidate {
    let touched = !draft.first_name.is_empty()
        || !draft.last_name.is_empty()
        || draft.emails.iter().any(|email| !email.value.is_empty());
    let first_name = non_blank(&draft.first_name);
    let last_name = non_blank(&draft.last_name);
    let emails: Vec<EmailCandidate> = draft
        .emails
        .iter()
        .filter(|email| !email.value.trim().is_empty())
        .map(|email| EmailCandidate {
            value: email.value.trim().to_owned(),
            is_primary: email.is_primary,
        })
        .collect();

    let primary_contact = touched.then_some(ContactCandidate {
        first_name,
        last_name,
        emails,
    });

    LeadCandidate {
        name: draft.name.clone(),
        domain: non_blank(&draft.domain),
        status: Some(draft.status.as_str().to_owned()),
        primary_contact,
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Editing,
    Submitting,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    CreateRequested(NewLead),
    ValidationFailed(usize),
    Closed,
    Invalidate(Resource),
    SubmitFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadForm {
    draft: LeadDraft,
    phase: FormPhase,
    errors: ValidationErrors,
    submit_error: Option<String>,
}

impl Default for LeadForm {
    fn default() -> Self {
        Self::new()
    }
}

impl LeadForm {
    pub fn new() -> Self {
        Self {
            draft: LeadDraft::default(),
            phase: FormPhase::Editing,
            errors: ValidationErrors::default(),
            submit_error: None,
        }
    }

    pub fn draft(&self) -> &LeadDraft {
        &self.draft
    }

    /// Draft access for edits; `None` once submitted or closed.
    pub fn edit(&mut self) -> Option<&mut LeadDraft> {
        (self.phase == FormPhase::Editing).then_some(&mut self.draft)
    }

    pub const fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    pub fn submit(&mut self) -> Vec<FormEvent> {
        if self.phase != FormPhase::Editing {
            return Vec::new();
        }
        self.submit_error = None;
        match validate(&assemble(&self.draft)) {
            Ok(payload) => {
                self.errors = ValidationErrors::default();
                self.phase = FormPhase::Submitting;
                vec![FormEvent::CreateRequested(payload)]
            }
            Err(errors) => {
                let count = errors.len();
                self.errors = errors;
                vec![FormEvent::ValidationFailed(count)]
            }
        }
    }

    pub fn created(&mut self, lead: &Lead) -> Vec<FormEvent> {
        if self.phase != FormPhase::Submitting {
            return Vec::new();
        }
        info!(lead_id = lead.id.get(), "lead created");
        self.phase = FormPhase::Closed;
        vec![FormEvent::Closed, FormEvent::Invalidate(Resource::Leads)]
    }

    pub fn create_failed(&mut self, error: &MutationError) -> Vec<FormEvent> {
        if self.phase != FormPhase::Submitting {
            return Vec::new();
        }
        warn!(%error, "create failed");
        self.phase = FormPhase::Editing;
        self.submit_error = Some(SUBMIT_FAILED_MESSAGE.to_owned());
        vec![FormEvent::SubmitFailed(SUBMIT_FAILED_MESSAGE.to_owned())]
    }

    pub fn close(&mut self) -> Vec<FormEvent> {
        if self.phase == FormPhase::Closed {
            return Vec::new();
        }
        self.phase = FormPhase::Closed;
        vec![FormEvent::Closed]
    }
}
