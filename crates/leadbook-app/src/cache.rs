// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

use crate::{FetchError, FetchParams, Lead, Page, QueryKey, Resource};

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u32);

/// Settled keys nobody watches that are kept for quick return visits.
const MAX_RETIRED: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheEntry {
    #[default]
    Absent,
    /// `previous` is the last ready page for this key, kept for display
    /// while a refetch runs. `stale` marks a request overtaken by
    /// invalidation.
    Loading {
        request_id: RequestId,
        stale: bool,
        previous: Option<Page<Lead>>,
    },
    Ready(Page<Lead>),
    Error(FetchError),
}

impl CacheEntry {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Page suitable for rendering, including a placeholder during refetch.
    pub fn page(&self) -> Option<&Page<Lead>> {
        match self {
            Self::Ready(page) => Some(page),
            Self::Loading { previous, .. } => previous.as_ref(),
            Self::Absent | Self::Error(_) => None,
        }
    }

    const fn state_name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Loading { .. } => "loading",
            Self::Ready(_) => "ready",
            Self::Error(_) => "error",
        }
    }
}

/// One network request the runtime must issue on behalf of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub request_id: RequestId,
    pub key: QueryKey,
    pub params: FetchParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Superseded,
    Unsubscribed,
    Invalidated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    FetchRequested(FetchTicket),
    Updated(QueryKey),
    Discarded {
        request_id: RequestId,
        key: QueryKey,
        reason: DiscardReason,
    },
}

/// Keyed store of list pages. Each subscriber watches at most one key.
#[derive(Debug, Default)]
pub struct ListCache {
    entries: BTreeMap<QueryKey, CacheEntry>,
    subscribers: BTreeMap<SubscriberId, QueryKey>,
    /// Unwatched keys, oldest first.
    retired: VecDeque<QueryKey>,
    next_request_id: RequestId,
}

static ABSENT: CacheEntry = CacheEntry::Absent;

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: &QueryKey) -> &CacheEntry {
        self.entries.get(key).unwrap_or(&ABSENT)
    }

    pub fn is_subscribed(&self, key: &QueryKey) -> bool {
        self.subscribers.values().any(|watched| watched == key)
    }

    pub fn in_flight(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.is_loading())
            .count()
    }

    /// Points `subscriber` at `key`. Absent and failed keys start a fetch;
    /// a key already loading joins the outstanding request. When the old
    /// key differs only by sort, its page is shown while the fetch runs.
    pub fn subscribe(&mut self, subscriber: SubscriberId, key: QueryKey) -> Vec<CacheEvent> {
        let old = self
            .subscribers
            .insert(subscriber, key.clone())
            .filter(|old| *old != key);
        self.retired.retain(|retired| *retired != key);
        let placeholder = old
            .as_ref()
            .filter(|old| old.fetch_params() == key.fetch_params())
            .and_then(|old| self.entry(old).page().cloned());
        if let Some(old) = old {
            self.retire(old);
        }
        let entry = self.entry(&key);
        if entry.is_loading() {
            return Vec::new();
        }
        if matches!(entry, CacheEntry::Ready(_)) {
            return vec![CacheEvent::Updated(key)];
        }
        vec![self.start_fetch(key, placeholder)]
    }

    pub fn unsubscribe(&mut self, subscriber: SubscriberId) {
        if let Some(old) = self.subscribers.remove(&subscriber) {
            self.retire(old);
        }
    }

    /// Remembers a key that just lost a subscriber and evicts the oldest
    /// unwatched entries beyond `MAX_RETIRED`.
    fn retire(&mut self, key: QueryKey) {
        if self.is_subscribed(&key) {
            return;
        }
        self.retired.retain(|retired| *retired != key);
        self.retired.push_back(key);
        while self.retired.len() > MAX_RETIRED {
            let Some(oldest) = self.retired.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                debug!(offset = oldest.offset, "evicted unwatched list query");
            }
        }
    }

    /// Applies a response. Only the request currently in flight for a
    /// subscribed key may settle it.
    pub fn complete(
        &mut self,
        request_id: RequestId,
        key: &QueryKey,
        result: Result<Page<Lead>, FetchError>,
    ) -> Vec<CacheEvent> {
        let (current, stale, previous) = match self.entries.get(key) {
            Some(CacheEntry::Loading {
                request_id: current,
                stale,
                previous,
            }) => (*current, *stale, previous.clone()),
            _ => {
                return vec![discarded(request_id, key, DiscardReason::Superseded)];
            }
        };
        if current != request_id {
            return vec![discarded(request_id, key, DiscardReason::Superseded)];
        }

        let subscribed = self.is_subscribed(key);
        if !subscribed {
            self.entries.remove(key);
            return vec![discarded(request_id, key, DiscardReason::Unsubscribed)];
        }
        if stale {
            let refetch = self.start_fetch(key.clone(), previous);
            return vec![
                discarded(request_id, key, DiscardReason::Invalidated),
                refetch,
            ];
        }

        let entry = match result {
            Ok(page) => CacheEntry::Ready(page),
            Err(error) => CacheEntry::Error(error),
        };
        debug!(
            request_id,
            state = entry.state_name(),
            offset = key.offset,
            "list query settled"
        );
        self.entries.insert(key.clone(), entry);
        vec![CacheEvent::Updated(key.clone())]
    }

    /// Drops every settled page of `resource` and refetches the keys that
    /// still have a subscriber. Requests in flight are marked stale.
    pub fn invalidate(&mut self, resource: Resource) -> Vec<CacheEvent> {
        let keys: Vec<QueryKey> = self
            .entries
            .keys()
            .filter(|key| key.resource == resource)
            .cloned()
            .collect();
        debug!(resource = resource.as_str(), keys = keys.len(), "invalidating");

        let mut events = Vec::new();
        for key in keys {
            let previous = match self.entries.get_mut(&key) {
                Some(CacheEntry::Loading { stale, .. }) => {
                    *stale = true;
                    continue;
                }
                Some(CacheEntry::Ready(page)) => Some(std::mem::take(page)),
                _ => None,
            };
            self.entries.remove(&key);
            if self.is_subscribed(&key) {
                events.push(self.start_fetch(key, previous));
            }
        }
        self.retired.retain(|retired| self.entries.contains_key(retired));
        events
    }

    fn start_fetch(&mut self, key: QueryKey, previous: Option<Page<Lead>>) -> CacheEvent {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        debug!(request_id, offset = key.offset, limit = key.limit, "fetching leads");
        self.entries.insert(
            key.clone(),
            CacheEntry::Loading {
                request_id,
                stale: false,
                previous,
            },
        );
        CacheEvent::FetchRequested(FetchTicket {
            request_id,
            params: key.fetch_params(),
            key,
        })
    }
}

fn discarded(request_id: RequestId, key: &QueryKey, reason: DiscardReason) -> CacheEvent {
    debug!(request_id, ?reason, "discarding list response");
    CacheEvent::Discarded {
        request_id,
        key: key.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CacheEntry, CacheEvent, DiscardReason, FetchTicket, ListCache, MAX_RETIRED, SubscriberId,
    };
    use crate::{
        FetchError, Lead, LeadId, LeadStatus, Page, QueryKey, Resource, SortSpec, StatusFilter,
        compose,
    };
    use time::OffsetDateTime;

    const LIST: SubscriberId = SubscriberId(1);
    const BADGE: SubscriberId = SubscriberId(2);

    fn key(search: &str, page: usize) -> QueryKey {
        compose(search, StatusFilter::All, page, 10, SortSpec::default()).0
    }

    fn page_of(names: &[&str]) -> Page<Lead> {
        Page {
            items: names
                .iter()
                .zip(1..)
                .map(|(name, id)| Lead {
                    id: LeadId::new(id),
                    name: (*name).to_owned(),
                    domain: None,
                    status: LeadStatus::New,
                    created_at: OffsetDateTime::UNIX_EPOCH,
                    primary_contact: None,
                })
                .collect(),
            total: names.len(),
        }
    }

    fn tickets(events: &[CacheEvent]) -> Vec<FetchTicket> {
        events
            .iter()
            .filter_map(|event| match event {
                CacheEvent::FetchRequested(ticket) => Some(ticket.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn concurrent_subscriptions_share_one_request() {
        let mut cache = ListCache::new();
        let first = cache.subscribe(LIST, key("acme", 0));
        let second = cache.subscribe(BADGE, key("acme", 0));

        assert_eq!(tickets(&first).len(), 1);
        assert!(second.is_empty());
        assert_eq!(cache.in_flight(), 1);

        let ticket = &tickets(&first)[0];
        let events = cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["Acme"])));
        assert_eq!(events, vec![CacheEvent::Updated(key("acme", 0))]);
        assert!(matches!(cache.entry(&key("acme", 0)), CacheEntry::Ready(page) if page.total == 1));
    }

    #[test]
    fn ready_key_is_served_without_fetching() {
        let mut cache = ListCache::new();
        let ticket = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);
        cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["a"])));

        cache.subscribe(LIST, key("", 1));
        let back = cache.subscribe(LIST, key("", 0));
        assert_eq!(back, vec![CacheEvent::Updated(key("", 0))]);
    }

    #[test]
    fn response_for_abandoned_key_is_discarded() {
        let mut cache = ListCache::new();
        let slow = tickets(&cache.subscribe(LIST, key("ac", 0))).remove(0);
        let fast = tickets(&cache.subscribe(LIST, key("acme", 0))).remove(0);

        cache.complete(fast.request_id, &fast.key, Ok(page_of(&["Acme"])));
        let late = cache.complete(slow.request_id, &slow.key, Ok(page_of(&["Acme", "Acorn"])));

        assert_eq!(
            late,
            vec![CacheEvent::Discarded {
                request_id: slow.request_id,
                key: key("ac", 0),
                reason: DiscardReason::Unsubscribed,
            }]
        );
        assert_eq!(cache.entry(&key("ac", 0)), &CacheEntry::Absent);
        assert!(matches!(cache.entry(&key("acme", 0)), CacheEntry::Ready(page) if page.total == 1));
    }

    #[test]
    fn superseded_request_id_is_discarded() {
        let mut cache = ListCache::new();
        let first = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);
        cache.complete(first.request_id, &first.key, Err(FetchError::new("timeout")));
        let retry = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);
        assert_ne!(first.request_id, retry.request_id);

        let events = cache.complete(first.request_id, &first.key, Ok(page_of(&["x"])));
        assert!(matches!(
            events.as_slice(),
            [CacheEvent::Discarded {
                reason: DiscardReason::Superseded,
                ..
            }]
        ));
        assert!(cache.entry(&key("", 0)).is_loading());
    }

    #[test]
    fn failure_keeps_error_until_resubscribed() {
        let mut cache = ListCache::new();
        let ticket = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);
        cache.complete(ticket.request_id, &ticket.key, Err(FetchError::new("HTTP 500")));
        assert_eq!(
            cache.entry(&key("", 0)),
            &CacheEntry::Error(FetchError::new("HTTP 500"))
        );

        let retry = cache.subscribe(LIST, key("", 0));
        assert_eq!(tickets(&retry).len(), 1);
    }

    #[test]
    fn invalidation_refetches_only_subscribed_keys() {
        let mut cache = ListCache::new();
        for page in [0, 1] {
            let ticket = tickets(&cache.subscribe(LIST, key("", page))).remove(0);
            cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["a"])));
        }

        let events = cache.invalidate(Resource::Leads);
        let refetched = tickets(&events);
        assert_eq!(refetched.len(), 1);
        assert_eq!(refetched[0].key, key("", 1));
        assert_eq!(cache.entry(&key("", 0)), &CacheEntry::Absent);
        assert!(cache.entry(&key("", 1)).page().is_some());
    }

    #[test]
    fn invalidation_during_load_discards_and_reissues() {
        let mut cache = ListCache::new();
        let before = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);

        assert!(cache.invalidate(Resource::Leads).is_empty());
        assert_eq!(cache.in_flight(), 1);

        let events = cache.complete(before.request_id, &before.key, Ok(page_of(&["old"])));
        let reissued = tickets(&events);
        assert_eq!(reissued.len(), 1);
        assert!(reissued[0].request_id > before.request_id);
        assert!(cache.entry(&key("", 0)).is_loading());

        cache.complete(reissued[0].request_id, &reissued[0].key, Ok(page_of(&["new"])));
        let names: Vec<&str> = cache
            .entry(&key("", 0))
            .page()
            .map(|page| page.items.iter().map(|lead| lead.name.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(names, vec!["new"]);
    }

    #[test]
    fn resort_keeps_rows_visible_while_fetching() {
        let mut cache = ListCache::new();
        let ticket = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);
        cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["a", "b"])));

        let mut resorted = key("", 0);
        resorted.sort = resorted.sort.clicked(crate::SortField::Name);
        let events = cache.subscribe(LIST, resorted.clone());
        assert_eq!(tickets(&events).len(), 1);
        assert_eq!(cache.entry(&resorted).page().map(|page| page.total), Some(2));

        cache.subscribe(LIST, key("", 1));
        assert!(cache.entry(&key("", 1)).page().is_none());
    }

    #[test]
    fn unwatched_keys_are_evicted_oldest_first() {
        let mut cache = ListCache::new();
        for index in 0..500 {
            let search = format!("lead {index}");
            let ticket = tickets(&cache.subscribe(LIST, key(&search, 0))).remove(0);
            cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["a"])));
        }

        let retained = cache.entries.len();
        assert!(retained <= MAX_RETIRED + 1, "retained {retained}");
        assert_eq!(cache.entry(&key("lead 0", 0)), &CacheEntry::Absent);
        assert_eq!(
            cache.subscribe(LIST, key("lead 498", 0)),
            vec![CacheEvent::Updated(key("lead 498", 0))]
        );
    }

    #[test]
    fn unsubscribed_key_is_retired_not_dropped() {
        let mut cache = ListCache::new();
        let ticket = tickets(&cache.subscribe(LIST, key("", 0))).remove(0);
        cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["a"])));
        cache.unsubscribe(LIST);
        assert!(matches!(cache.entry(&key("", 0)), CacheEntry::Ready(_)));

        for page in 1..=MAX_RETIRED + 1 {
            let ticket = tickets(&cache.subscribe(BADGE, key("", page))).remove(0);
            cache.complete(ticket.request_id, &ticket.key, Ok(page_of(&["b"])));
        }
        assert_eq!(cache.entry(&key("", 0)), &CacheEntry::Absent);
    }

    #[test]
    fn tickets_carry_params_rebuilt_from_key() {
        let mut cache = ListCache::new();
        let ticket = tickets(&cache.subscribe(LIST, key(" acme ", 2))).remove(0);
        assert_eq!(ticket.params.q.as_deref(), Some("acme"));
        assert_eq!(ticket.params.offset, 20);
    }
}
