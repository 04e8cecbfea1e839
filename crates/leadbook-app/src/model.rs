// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::ids::*;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Qualified,
    Lost,
}

impl LeadStatus {
    pub const ALL: [Self; 3] = [Self::New, Self::Qualified, Self::Lost];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Qualified => "qualified",
            Self::Lost => "lost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "qualified" => Some(Self::Qualified),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

/// Status filter applied server-side; `All` sends no status parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(LeadStatus),
}

impl StatusFilter {
    pub const fn status(self) -> Option<LeadStatus> {
        match self {
            Self::All => None,
            Self::Only(status) => Some(status),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(status) => status.as_str(),
        }
    }

    pub const fn next(self) -> Self {
        match self {
            Self::All => Self::Only(LeadStatus::New),
            Self::Only(LeadStatus::New) => Self::Only(LeadStatus::Qualified),
            Self::Only(LeadStatus::Qualified) => Self::Only(LeadStatus::Lost),
            Self::Only(LeadStatus::Lost) => Self::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SortField {
    Name,
    Domain,
    Status,
    PrimaryContact,
}

impl SortField {
    /// Display order of the list columns.
    pub const ALL: [Self; 4] = [
        Self::Name,
        Self::Domain,
        Self::Status,
        Self::PrimaryContact,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Domain => "domain",
            Self::Status => "status",
            Self::PrimaryContact => "contact",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::Name,
            direction: SortDirection::Asc,
        }
    }
}

impl SortSpec {
    /// Header-click semantics: the active column flips order, any other
    /// column becomes active ascending.
    pub fn clicked(self, field: SortField) -> Self {
        if self.field == field {
            Self {
                field,
                direction: self.direction.toggled(),
            }
        } else {
            Self {
                field,
                direction: SortDirection::Asc,
            }
        }
    }
}

/// Server resources a mutation can invalidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Leads,
}

impl Resource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leads => "leads",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EmailId>,
    pub value: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ContactId>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub emails: Vec<Email>,
}

impl Contact {
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_owned()
    }

    pub fn primary_email(&self) -> Option<&Email> {
        self.emails
            .iter()
            .find(|email| email.is_primary)
            .or_else(|| self.emails.first())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    pub status: LeadStatus,
    #[serde(with = "timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub primary_contact: Option<Contact>,
}

impl Lead {
    pub fn contact_label(&self) -> String {
        let Some(contact) = &self.primary_contact else {
            return "-".to_owned();
        };
        let name = contact.full_name();
        match contact.primary_email() {
            Some(email) if name.is_empty() => email.value.clone(),
            Some(email) => format!("{name} • {}", email.value),
            None => name,
        }
    }
}

/// One server page; `total` counts every match, not just `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Validated create payload in wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLead {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub status: LeadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_contact: Option<NewContact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub emails: Vec<NewEmail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEmail {
    pub value: String,
    pub is_primary: bool,
}

/// Parses RFC 3339 timestamps, reading offset-less values as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(raw, &naive)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

mod timestamp {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let raw = value
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&raw)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
    }
}
