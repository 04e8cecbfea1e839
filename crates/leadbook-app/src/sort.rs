// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use crate::{Lead, SortDirection, SortField, SortSpec};

/// Reorders one fetched page. Ties keep server order in both directions.
pub fn sort_page(items: &[Lead], spec: SortSpec) -> Vec<&Lead> {
    let mut sorted: Vec<&Lead> = items.iter().collect();
    sorted.sort_by(|left, right| {
        let ordering = compare(left, right, spec.field);
        match spec.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    sorted
}

fn compare(left: &Lead, right: &Lead, field: SortField) -> Ordering {
    match field {
        SortField::Name => left.name.to_lowercase().cmp(&right.name.to_lowercase()),
        SortField::Domain => domain_key(left).cmp(&domain_key(right)),
        SortField::Status => left.status.as_str().cmp(right.status.as_str()),
        SortField::PrimaryContact => contact_key(left).cmp(&contact_key(right)),
    }
}

fn domain_key(lead: &Lead) -> String {
    lead.domain.as_deref().unwrap_or("").to_lowercase()
}

// first+last with no separator; missing parts are empty.
fn contact_key(lead: &Lead) -> String {
    let Some(contact) = &lead.primary_contact else {
        return String::new();
    };
    let first = contact.first_name.as_deref().unwrap_or("");
    let last = contact.last_name.as_deref().unwrap_or("");
    format!("{first}{last}").to_lowercase()
}
