// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use leadbook_app::{
    Contact, ContactId, Email, EmailId, FetchParams, Lead, LeadApi, LeadId, LeadStatus, NewLead,
    Page,
};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use time::{Date, Duration, Month, OffsetDateTime, Time};

const COMPANY_STEMS: [&str; 16] = [
    "Acme", "Globex", "Initech", "Umbrella", "Hooli", "Vandelay", "Stark", "Wayne", "Tyrell",
    "Cyberdyne", "Soylent", "Wonka", "Gringotts", "Oscorp", "Aperture", "Monarch",
];
const COMPANY_SUFFIXES: [&str; 8] = [
    "Labs", "Systems", "Group", "Partners", "Works", "Analytics", "Logistics", "Foods",
];
const TLDS: [&str; 6] = ["com", "io", "dev", "co", "net", "de"];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of plausible leads. Same seed, same sequence.
#[derive(Debug, Clone)]
pub struct LeadFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl LeadFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 1,
        }
    }

    pub fn company_name(&mut self) -> String {
        format!(
            "{} {}",
            self.pick(&COMPANY_STEMS),
            self.pick(&COMPANY_SUFFIXES)
        )
    }

    pub fn domain_for(&mut self, company: &str) -> String {
        let stem: String = company
            .split_whitespace()
            .next()
            .unwrap_or("example")
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        format!("{}.{}", stem.to_ascii_lowercase(), self.pick(&TLDS))
    }

    pub fn status(&mut self) -> LeadStatus {
        LeadStatus::ALL[self.rng.int_n(LeadStatus::ALL.len())]
    }

    /// A contact with one to three emails, exactly one primary.
    pub fn contact(&mut self, domain: &str) -> Contact {
        let first = self.pick(&FIRST_NAMES).to_owned();
        let last = self.pick(&LAST_NAMES).to_owned();
        let count = 1 + self.rng.int_n(3);
        let primary = self.rng.int_n(count);
        let local_parts = [
            first.to_ascii_lowercase(),
            format!("{}.{}", first.to_ascii_lowercase(), last.to_ascii_lowercase()),
            format!("{}{}", &first[..1].to_ascii_lowercase(), last.to_ascii_lowercase()),
        ];
        let emails = local_parts
            .iter()
            .take(count)
            .enumerate()
            .map(|(index, local)| Email {
                id: Some(EmailId::new(self.next_id * 10 + index as i64)),
                value: format!("{local}@{domain}"),
                is_primary: index == primary,
            })
            .collect();
        Contact {
            id: Some(ContactId::new(self.next_id)),
            first_name: Some(first),
            last_name: Some(last),
            emails,
        }
    }

    pub fn lead(&mut self) -> Lead {
        let name = self.company_name();
        let domain = if self.rng.int_n(4) == 0 {
            None
        } else {
            Some(self.domain_for(&name))
        };
        let primary_contact = if self.rng.bool() {
            let contact_domain = domain.clone().unwrap_or_else(|| "example.com".to_owned());
            Some(self.contact(&contact_domain))
        } else {
            None
        };
        let status = self.status();
        let created_at = self.created_at();
        let id = LeadId::new(self.next_id);
        self.next_id += 1;
        Lead {
            id,
            name,
            domain,
            status,
            created_at,
            primary_contact,
        }
    }

    pub fn leads(&mut self, count: usize) -> Vec<Lead> {
        (0..count).map(|_| self.lead()).collect()
    }

    pub fn created_at(&mut self) -> OffsetDateTime {
        let start = midnight_utc(REFERENCE_YEAR, Month::January, 1);
        let end = midnight_utc(REFERENCE_YEAR, Month::December, 31) + Duration::days(1)
            - Duration::seconds(1);
        self.random_datetime_between(start, end)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn random_datetime_between(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> OffsetDateTime {
        let start_ts = start.unix_timestamp();
        let end_ts = end.unix_timestamp();
        if end_ts <= start_ts {
            return start;
        }
        let span = (end_ts - start_ts) as u64;
        let offset = self.rng.next_u64() % (span + 1);
        OffsetDateTime::from_unix_timestamp(start_ts + offset as i64).expect("valid unix timestamp")
    }
}

/// Calls observed by [`FakeApi`], per endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub set_status: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    leads: Vec<Lead>,
    calls: CallCounts,
    fail_list: Option<String>,
    fail_mutation: Option<String>,
}

/// In-memory leads server. Lists newest first and matches `q` against
/// name or domain, case-insensitively.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new(leads: Vec<Lead>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                leads,
                ..FakeState::default()
            }),
        }
    }

    pub fn seeded(seed: u64, count: usize) -> Self {
        Self::new(LeadFaker::new(seed).leads(count))
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().map(|state| state.calls).unwrap_or_default()
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.lock()
            .map(|state| state.leads.clone())
            .unwrap_or_default()
    }

    /// Makes the next list call fail with `message`.
    pub fn fail_next_list(&self, message: &str) {
        if let Ok(mut state) = self.lock() {
            state.fail_list = Some(message.to_owned());
        }
    }

    /// Makes the next create or status call fail with `message`.
    pub fn fail_next_mutation(&self, message: &str) {
        if let Ok(mut state) = self.lock() {
            state.fail_mutation = Some(message.to_owned());
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FakeState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("fake api state poisoned"))
    }
}

impl LeadApi for FakeApi {
    fn list_leads(&self, params: &FetchParams) -> Result<Page<Lead>> {
        let mut state = self.lock()?;
        state.calls.list += 1;
        if let Some(message) = state.fail_list.take() {
            bail!("server error (500): {message}");
        }

        let needle = params.q.as_deref().map(str::to_lowercase);
        let mut matches: Vec<&Lead> = state
            .leads
            .iter()
            .filter(|lead| params.status.is_none_or(|status| lead.status == status))
            .filter(|lead| {
                needle.as_deref().is_none_or(|needle| {
                    lead.name.to_lowercase().contains(needle)
                        || lead
                            .domain
                            .as_deref()
                            .is_some_and(|domain| domain.to_lowercase().contains(needle))
                })
            })
            .collect();
        matches.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });

        Ok(Page {
            total: matches.len(),
            items: matches
                .into_iter()
                .skip(params.offset)
                .take(params.limit)
                .cloned()
                .collect(),
        })
    }

    fn create_lead(&self, payload: &NewLead) -> Result<Lead> {
        let mut state = self.lock()?;
        state.calls.create += 1;
        if let Some(message) = state.fail_mutation.take() {
            bail!("server error (400): {message}");
        }

        let id = state.leads.iter().map(|lead| lead.id.get()).max().unwrap_or(0) + 1;
        let primary_contact = payload.primary_contact.as_ref().map(|contact| Contact {
            id: Some(ContactId::new(id)),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            emails: contact
                .emails
                .iter()
                .enumerate()
                .map(|(index, email)| Email {
                    id: Some(EmailId::new(id * 10 + index as i64)),
                    value: email.value.clone(),
                    is_primary: email.is_primary,
                })
                .collect(),
        });
        let lead = Lead {
            id: LeadId::new(id),
            name: payload.name.clone(),
            domain: payload.domain.clone(),
            status: payload.status,
            created_at: OffsetDateTime::now_utc(),
            primary_contact,
        };
        state.leads.push(lead.clone());
        Ok(lead)
    }

    fn set_status(&self, id: LeadId, status: LeadStatus) -> Result<Lead> {
        let mut state = self.lock()?;
        state.calls.set_status += 1;
        if let Some(message) = state.fail_mutation.take() {
            bail!("server error (500): {message}");
        }
        let lead = state
            .leads
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or_else(|| anyhow!("server error (404): Lead not found"))?;
        lead.status = status;
        Ok(lead.clone())
    }
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

fn midnight_utc(year: i32, month: Month, day: u8) -> OffsetDateTime {
    let date = Date::from_calendar_date(year, month, day).expect("valid calendar date");
    let midnight = Time::from_hms(0, 0, 0).expect("valid midnight");
    date.with_time(midnight).assume_utc()
}
