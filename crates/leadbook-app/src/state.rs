// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::{
    CacheEntry, CacheEvent, Completion, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE, Debouncer,
    EditorCommand, EditorEvent, Effect, FetchError, FormEvent, Lead, LeadForm, LeadId, LeadStatus,
    ListCache, PageWindow, QueryKey, Resource, SortField, SortSpec, StatusEditor, StatusFilter,
    SubscriberId, compose, sort_page,
};

pub const LIST_SUBSCRIBER: SubscriberId = SubscriberId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub page_size: usize,
    pub search_debounce: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    Mount,
    Unmount,
    SearchTyped { text: String, at: Instant },
    Tick(Instant),
    SetStatusFilter(StatusFilter),
    CycleStatusFilter,
    SortBy(SortField),
    NextPage,
    PrevPage,
    Retry,
    BeginStatusEdit(LeadId),
    SelectStatus(LeadStatus),
    BlurStatusEdit,
    CancelStatusEdit,
    OpenForm,
    CloseForm,
    SubmitForm,
    ClearStatus,
}

/// What the list area should show right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListDisplay<'a> {
    Loading,
    Failed(&'a FetchError),
    Empty,
    Rows(Vec<&'a Lead>),
}

/// Composition root: owns filter/sort/page state, the list cache, the
/// status editor and the creation form.
#[derive(Debug)]
pub struct LeadsView {
    search_input: String,
    search: String,
    status_filter: StatusFilter,
    page: usize,
    limit: usize,
    sort: SortSpec,
    cache: ListCache,
    editor: StatusEditor,
    form: Option<LeadForm>,
    debouncer: Debouncer<String>,
    status_line: Option<String>,
    mounted: bool,
}

impl Default for LeadsView {
    fn default() -> Self {
        Self::new(ViewOptions::default())
    }
}

impl LeadsView {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            search_input: String::new(),
            search: String::new(),
            status_filter: StatusFilter::All,
            page: 0,
            limit: options.page_size.max(1),
            sort: SortSpec::default(),
            cache: ListCache::new(),
            editor: StatusEditor::default(),
            form: None,
            debouncer: Debouncer::new(options.search_debounce),
            status_line: None,
            mounted: false,
        }
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub const fn status_filter(&self) -> StatusFilter {
        self.status_filter
    }

    pub const fn page(&self) -> usize {
        self.page
    }

    pub const fn limit(&self) -> usize {
        self.limit
    }

    pub const fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn editor(&self) -> &StatusEditor {
        &self.editor
    }

    pub fn form(&self) -> Option<&LeadForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut LeadForm> {
        self.form.as_mut()
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn cache(&self) -> &ListCache {
        &self.cache
    }

    /// Next instant a `Tick` would release debounced search text.
    pub fn search_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn key(&self) -> QueryKey {
        compose(
            &self.search,
            self.status_filter,
            self.page,
            self.limit,
            self.sort,
        )
        .0
    }

    pub fn entry(&self) -> &CacheEntry {
        self.cache.entry(&self.key())
    }

    pub fn window(&self) -> PageWindow {
        let total = self.entry().page().map_or(0, |page| page.total);
        PageWindow::new(self.page, self.limit, total)
    }

    pub fn display(&self) -> ListDisplay<'_> {
        let entry = self.entry();
        if let Some(page) = entry.page() {
            if page.is_empty() {
                if entry.is_loading() {
                    return ListDisplay::Loading;
                }
                return ListDisplay::Empty;
            }
            return ListDisplay::Rows(sort_page(&page.items, self.sort));
        }
        match entry {
            CacheEntry::Error(error) => ListDisplay::Failed(error),
            _ => ListDisplay::Loading,
        }
    }

    pub fn dispatch(&mut self, command: ViewCommand) -> Vec<Effect> {
        match command {
            ViewCommand::Mount => {
                self.mounted = true;
                self.resubscribe()
            }
            ViewCommand::Unmount => {
                self.mounted = false;
                self.debouncer.cancel();
                self.cache.unsubscribe(LIST_SUBSCRIBER);
                Vec::new()
            }
            ViewCommand::SearchTyped { text, at } => {
                self.search_input.clone_from(&text);
                self.debouncer.push(text, at);
                Vec::new()
            }
            ViewCommand::Tick(now) => match self.debouncer.poll(now) {
                Some(text) if text != self.search => {
                    debug!(search = %text, "search committed");
                    self.search = text;
                    self.page = 0;
                    self.resubscribe()
                }
                _ => Vec::new(),
            },
            ViewCommand::SetStatusFilter(filter) => self.apply_filter(filter),
            ViewCommand::CycleStatusFilter => self.apply_filter(self.status_filter.next()),
            ViewCommand::SortBy(field) => {
                self.sort = self.sort.clicked(field);
                self.set_status(format!(
                    "sort {} {}",
                    field.label(),
                    self.sort.direction.as_str()
                ));
                self.resubscribe()
            }
            ViewCommand::NextPage => {
                if !self.window().has_next() {
                    return Vec::new();
                }
                self.page += 1;
                self.resubscribe()
            }
            ViewCommand::PrevPage => {
                if !self.window().has_prev() {
                    return Vec::new();
                }
                self.page -= 1;
                self.resubscribe()
            }
            ViewCommand::Retry => self.resubscribe(),
            ViewCommand::BeginStatusEdit(lead_id) => {
                let Some(current) = self.find_lead(lead_id).map(|lead| lead.status) else {
                    return Vec::new();
                };
                let events = self
                    .editor
                    .dispatch(EditorCommand::Begin { lead_id, current });
                self.apply_editor_events(events)
            }
            ViewCommand::SelectStatus(status) => {
                let events = self.editor.dispatch(EditorCommand::Select(status));
                self.apply_editor_events(events)
            }
            ViewCommand::BlurStatusEdit => {
                let events = self.editor.dispatch(EditorCommand::Blur);
                self.apply_editor_events(events)
            }
            ViewCommand::CancelStatusEdit => {
                let events = self.editor.dispatch(EditorCommand::Cancel);
                self.apply_editor_events(events)
            }
            ViewCommand::OpenForm => {
                if self.form.is_none() {
                    self.form = Some(LeadForm::new());
                }
                Vec::new()
            }
            ViewCommand::CloseForm => {
                let events = self.form.as_mut().map(LeadForm::close).unwrap_or_default();
                self.apply_form_events(events)
            }
            ViewCommand::SubmitForm => {
                let events = self.form.as_mut().map(LeadForm::submit).unwrap_or_default();
                self.apply_form_events(events)
            }
            ViewCommand::ClearStatus => {
                self.status_line = None;
                Vec::new()
            }
        }
    }

    pub fn apply(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Fetched {
                request_id,
                key,
                result,
            } => {
                let events = self.cache.complete(request_id, &key, result);
                self.apply_cache_events(events)
            }
            Completion::Created(Ok(lead)) => {
                let events = self
                    .form
                    .as_mut()
                    .map(|form| form.created(&lead))
                    .unwrap_or_default();
                if events.is_empty() {
                    // Form was dismissed while the request ran; the lead exists regardless.
                    return self.invalidate(Resource::Leads);
                }
                self.set_status(format!("created {}", lead.name));
                self.apply_form_events(events)
            }
            Completion::Created(Err(error)) => {
                let events = self
                    .form
                    .as_mut()
                    .map(|form| form.create_failed(&error))
                    .unwrap_or_default();
                if events.is_empty() {
                    self.set_status(error.to_string());
                }
                self.apply_form_events(events)
            }
            Completion::StatusChanged { lead_id, result } => {
                let command = match result {
                    Ok(lead) => {
                        self.set_status(format!("{} is {}", lead.name, lead.status.as_str()));
                        EditorCommand::Succeeded { lead_id }
                    }
                    Err(error) => EditorCommand::Failed { lead_id, error },
                };
                let events = self.editor.dispatch(command);
                self.apply_editor_events(events)
            }
        }
    }

    fn find_lead(&self, lead_id: LeadId) -> Option<&Lead> {
        self.entry()
            .page()
            .and_then(|page| page.items.iter().find(|lead| lead.id == lead_id))
    }

    fn apply_filter(&mut self, filter: StatusFilter) -> Vec<Effect> {
        if filter == self.status_filter {
            return Vec::new();
        }
        self.status_filter = filter;
        self.page = 0;
        self.set_status(format!("status {}", filter.label()));
        self.resubscribe()
    }

    fn resubscribe(&mut self) -> Vec<Effect> {
        if !self.mounted {
            return Vec::new();
        }
        let events = self.cache.subscribe(LIST_SUBSCRIBER, self.key());
        self.apply_cache_events(events)
    }

    fn invalidate(&mut self, resource: Resource) -> Vec<Effect> {
        let events = self.cache.invalidate(resource);
        self.apply_cache_events(events)
    }

    fn apply_cache_events(&mut self, events: Vec<CacheEvent>) -> Vec<Effect> {
        events
            .into_iter()
            .filter_map(|event| match event {
                CacheEvent::FetchRequested(ticket) => Some(Effect::Fetch(ticket)),
                CacheEvent::Updated(_) | CacheEvent::Discarded { .. } => None,
            })
            .collect()
    }

    fn apply_editor_events(&mut self, events: Vec<EditorEvent>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for event in events {
            match event {
                EditorEvent::SetStatusRequested { lead_id, status } => {
                    effects.push(Effect::SetStatus { lead_id, status });
                }
                EditorEvent::Invalidate(resource) => effects.extend(self.invalidate(resource)),
                EditorEvent::Failed { message, .. } => self.set_status(message),
                EditorEvent::Editing(_) | EditorEvent::Display(_) => {}
            }
        }
        effects
    }

    fn apply_form_events(&mut self, events: Vec<FormEvent>) -> Vec<Effect> {
        let mut effects = Vec::new();
        for event in events {
            match event {
                FormEvent::CreateRequested(payload) => {
                    info!(name = %payload.name, "submitting lead");
                    effects.push(Effect::CreateLead(payload));
                }
                FormEvent::ValidationFailed(count) => {
                    self.set_status(format!("{count} field error(s)"));
                }
                FormEvent::Closed => self.form = None,
                FormEvent::Invalidate(resource) => effects.extend(self.invalidate(resource)),
                FormEvent::SubmitFailed(message) => self.set_status(message),
            }
        }
        effects
    }

    fn set_status(&mut self, message: String) {
        self.status_line = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::{LeadsView, ListDisplay, ViewCommand, ViewOptions};
    use crate::{
        CacheEntry, Completion, Effect, FetchError, FetchTicket, Lead, LeadId, LeadStatus,
        MutationError, MutationKind, Page, SortField, StatusFilter,
    };
    use std::time::{Duration, Instant};
    use time::OffsetDateTime;

    fn lead(id: i64, name: &str, status: LeadStatus) -> Lead {
        Lead {
            id: LeadId::new(id),
            name: name.to_owned(),
            domain: None,
            status,
            created_at: OffsetDateTime::UNIX_EPOCH,
            primary_contact: None,
        }
    }

    fn fetch_ticket(effects: &[Effect]) -> FetchTicket {
        match effects {
            [Effect::Fetch(ticket)] => ticket.clone(),
            other => panic!("expected one fetch, got {other:?}"),
        }
    }

    fn settle(
        view: &mut LeadsView,
        ticket: &FetchTicket,
        items: Vec<Lead>,
        total: usize,
    ) -> Vec<Effect> {
        view.apply(Completion::Fetched {
            request_id: ticket.request_id,
            key: ticket.key.clone(),
            result: Ok(Page { items, total }),
        })
    }

    fn mounted_with(items: Vec<Lead>, total: usize) -> LeadsView {
        let mut view = LeadsView::default();
        let ticket = fetch_ticket(&view.dispatch(ViewCommand::Mount));
        settle(&mut view, &ticket, items, total);
        view
    }

    #[test]
    fn mount_fetches_first_page_and_shows_loading() {
        let mut view = LeadsView::default();
        let ticket = fetch_ticket(&view.dispatch(ViewCommand::Mount));
        assert_eq!(ticket.params.offset, 0);
        assert_eq!(ticket.params.limit, 10);
        assert_eq!(view.display(), ListDisplay::Loading);
    }

    #[test]
    fn empty_result_is_distinct_from_error() {
        let view = mounted_with(Vec::new(), 0);
        assert_eq!(view.display(), ListDisplay::Empty);
        assert_eq!(view.window().label(), "0 - 0 of 0");

        let mut failing = LeadsView::default();
        let ticket = fetch_ticket(&failing.dispatch(ViewCommand::Mount));
        failing.apply(Completion::Fetched {
            request_id: ticket.request_id,
            key: ticket.key,
            result: Err(FetchError::new("HTTP 502")),
        });
        assert!(matches!(failing.display(), ListDisplay::Failed(_)));
        assert_eq!(fetch_ticket(&failing.dispatch(ViewCommand::Retry)).params.offset, 0);
    }

    #[test]
    fn search_is_debounced_and_resets_page() {
        let mut view = mounted_with(vec![lead(1, "a", LeadStatus::New)], 30);
        let ticket = fetch_ticket(&view.dispatch(ViewCommand::NextPage));
        settle(&mut view, &ticket, vec![lead(11, "k", LeadStatus::New)], 30);
        assert_eq!(view.page(), 1);

        let start = Instant::now();
        let typed = view.dispatch(ViewCommand::SearchTyped {
            text: "ac".to_owned(),
            at: start,
        });
        assert!(typed.is_empty());
        view.dispatch(ViewCommand::SearchTyped {
            text: "acme".to_owned(),
            at: start + Duration::from_millis(100),
        });
        let early = view.dispatch(ViewCommand::Tick(start + Duration::from_millis(300)));
        assert!(early.is_empty());

        let committed = view.dispatch(ViewCommand::Tick(start + Duration::from_secs(1)));
        let ticket = fetch_ticket(&committed);
        assert_eq!(view.page(), 0);
        assert_eq!(ticket.params.q.as_deref(), Some("acme"));
        assert_eq!(ticket.params.offset, 0);
    }

    #[test]
    fn filter_change_resets_page_and_omits_nothing_else() {
        let mut view = mounted_with(vec![lead(1, "a", LeadStatus::New)], 30);
        view.dispatch(ViewCommand::NextPage);
        let ticket = fetch_ticket(&view.dispatch(ViewCommand::SetStatusFilter(
            StatusFilter::Only(LeadStatus::Lost),
        )));
        assert_eq!(view.page(), 0);
        assert_eq!(ticket.params.status, Some(LeadStatus::Lost));
    }

    #[test]
    fn paging_respects_total() {
        let mut view = mounted_with(vec![lead(1, "a", LeadStatus::New)], 5);
        assert!(view.dispatch(ViewCommand::NextPage).is_empty());
        assert!(view.dispatch(ViewCommand::PrevPage).is_empty());
        assert_eq!(view.page(), 0);
    }

    #[test]
    fn sorting_reorders_rows_locally() {
        let mut view = mounted_with(
            vec![lead(1, "beta", LeadStatus::New), lead(2, "Alpha", LeadStatus::New)],
            2,
        );
        let ListDisplay::Rows(rows) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].id.get(), 2);

        // Sort is part of the key, so a new key fetches once.
        let effects = view.dispatch(ViewCommand::SortBy(SortField::Name));
        let ticket = fetch_ticket(&effects);
        assert_eq!(ticket.params.offset, 0);
        settle(
            &mut view,
            &ticket,
            vec![lead(1, "beta", LeadStatus::New), lead(2, "Alpha", LeadStatus::New)],
            2,
        );
        let ListDisplay::Rows(rows) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].id.get(), 1);
    }

    #[test]
    fn status_change_success_returns_row_to_display_and_refetches() {
        let mut view = mounted_with(vec![lead(7, "Acme", LeadStatus::New)], 1);
        view.dispatch(ViewCommand::BeginStatusEdit(LeadId::new(7)));
        let effects = view.dispatch(ViewCommand::SelectStatus(LeadStatus::Qualified));
        assert_eq!(
            effects,
            vec![Effect::SetStatus {
                lead_id: LeadId::new(7),
                status: LeadStatus::Qualified,
            }]
        );

        let refetch = view.apply(Completion::StatusChanged {
            lead_id: LeadId::new(7),
            result: Ok(lead(7, "Acme", LeadStatus::Qualified)),
        });
        let ticket = fetch_ticket(&refetch);
        assert!(!view.editor().is_editing(LeadId::new(7)));

        settle(&mut view, &ticket, vec![lead(7, "Acme", LeadStatus::Qualified)], 1);
        let ListDisplay::Rows(rows) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].status, LeadStatus::Qualified);
    }

    #[test]
    fn status_change_failure_keeps_selection_and_reports() {
        let mut view = mounted_with(vec![lead(7, "Acme", LeadStatus::New)], 1);
        view.dispatch(ViewCommand::BeginStatusEdit(LeadId::new(7)));
        view.dispatch(ViewCommand::SelectStatus(LeadStatus::Lost));
        let effects = view.apply(Completion::StatusChanged {
            lead_id: LeadId::new(7),
            result: Err(MutationError::new(MutationKind::SetStatus, "HTTP 500")),
        });
        assert!(effects.is_empty());
        let edit = view.editor().editing().expect("row stays editing");
        assert_eq!(edit.selection, Some(LeadStatus::Lost));
        assert_eq!(view.status_line(), Some("change status: HTTP 500"));
    }

    #[test]
    fn create_round_trip_closes_form_and_invalidates() {
        let mut view = mounted_with(Vec::new(), 0);
        view.dispatch(ViewCommand::OpenForm);
        if let Some(draft) = view.form_mut().and_then(|form| form.edit()) {
            draft.name = "Acme".to_owned();
        }
        let effects = view.dispatch(ViewCommand::SubmitForm);
        assert!(matches!(effects.as_slice(), [Effect::CreateLead(_)]));

        let refetch = view.apply(Completion::Created(Ok(lead(1, "Acme", LeadStatus::New))));
        assert_eq!(fetch_ticket(&refetch).params.offset, 0);
        assert!(view.form().is_none());
        assert!(view.entry().is_loading());
    }

    #[test]
    fn create_failure_keeps_form_open() {
        let mut view = mounted_with(Vec::new(), 0);
        view.dispatch(ViewCommand::OpenForm);
        if let Some(draft) = view.form_mut().and_then(|form| form.edit()) {
            draft.name = "Acme".to_owned();
        }
        view.dispatch(ViewCommand::SubmitForm);
        let effects = view.apply(Completion::Created(Err(MutationError::new(
            MutationKind::Create,
            "HTTP 422",
        ))));
        assert!(effects.is_empty());
        let form = view.form().expect("form stays open");
        assert_eq!(form.draft().name, "Acme");
        assert!(form.submit_error().is_some());
    }

    #[test]
    fn unmount_drops_late_responses() {
        let mut view = LeadsView::new(ViewOptions {
            page_size: 25,
            search_debounce: Duration::from_millis(10),
        });
        let ticket = fetch_ticket(&view.dispatch(ViewCommand::Mount));
        assert_eq!(ticket.params.limit, 25);
        view.dispatch(ViewCommand::Unmount);
        settle(&mut view, &ticket, vec![lead(1, "a", LeadStatus::New)], 1);
        assert_eq!(view.entry(), &CacheEntry::Absent);
    }

    #[test]
    fn unmount_cancels_pending_search() {
        let mut view = mounted_with(vec![lead(1, "a", LeadStatus::New)], 1);
        let start = Instant::now();
        view.dispatch(ViewCommand::SearchTyped {
            text: "acme".to_owned(),
            at: start,
        });
        assert!(view.search_deadline().is_some());

        view.dispatch(ViewCommand::Unmount);
        assert_eq!(view.search_deadline(), None);
        let late = view.dispatch(ViewCommand::Tick(start + Duration::from_secs(5)));
        assert!(late.is_empty());
    }
}
