// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::fmt;

use crate::{FetchParams, FetchTicket, Lead, LeadId, LeadStatus, NewLead, Page, QueryKey, RequestId};

/// Server collaborator for the leads resource.
pub trait LeadApi {
    fn list_leads(&self, params: &FetchParams) -> Result<Page<Lead>>;
    fn create_lead(&self, payload: &NewLead) -> Result<Lead>;
    fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<Lead>;
}

/// A list fetch failed; the key stays in the error state until retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_report(error: &anyhow::Error) -> Self {
        Self::new(format!("{error:#}"))
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load leads: {}", self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    SetStatus,
}

impl MutationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create lead",
            Self::SetStatus => "change status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationError {
    pub kind: MutationKind,
    pub message: String,
}

impl MutationError {
    pub fn new(kind: MutationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_report(kind: MutationKind, error: &anyhow::Error) -> Self {
        Self::new(kind, format!("{error:#}"))
    }
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for MutationError {}

/// Work the view asks the runtime to perform off the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch(FetchTicket),
    CreateLead(NewLead),
    SetStatus { lead_id: LeadId, status: LeadStatus },
}

/// Result of an [`Effect`], fed back into the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Fetched {
        request_id: RequestId,
        key: QueryKey,
        result: std::result::Result<Page<Lead>, FetchError>,
    },
    Created(std::result::Result<Lead, MutationError>),
    StatusChanged {
        lead_id: LeadId,
        result: std::result::Result<Lead, MutationError>,
    },
}

/// Runs one effect against the API, turning every failure into
/// component-local error state.
pub fn perform<A: LeadApi + ?Sized>(api: &A, effect: Effect) -> Completion {
    match effect {
        Effect::Fetch(ticket) => Completion::Fetched {
            result: api
                .list_leads(&ticket.params)
                .map_err(|error| FetchError::from_report(&error)),
            request_id: ticket.request_id,
            key: ticket.key,
        },
        Effect::CreateLead(payload) => Completion::Created(
            api.create_lead(&payload)
                .map_err(|error| MutationError::from_report(MutationKind::Create, &error)),
        ),
        Effect::SetStatus { lead_id, status } => Completion::StatusChanged {
            lead_id,
            result: api
                .set_status(lead_id, status)
                .map_err(|error| MutationError::from_report(MutationKind::SetStatus, &error)),
        },
    }
}
