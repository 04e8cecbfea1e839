// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{LeadStatus, Resource, SortSpec, StatusFilter};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 200;

/// Cache identity for one filter/sort/page combination. Sort is local-only
/// but still part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    pub resource: Resource,
    pub search: String,
    pub status: StatusFilter,
    pub limit: usize,
    pub offset: usize,
    pub sort: SortSpec,
}

impl QueryKey {
    pub fn fetch_params(&self) -> FetchParams {
        let q = self.search.trim();
        FetchParams {
            q: (!q.is_empty()).then(|| q.to_owned()),
            status: self.status.status(),
            limit: self.limit,
            offset: self.offset,
        }
    }

    pub fn page(&self) -> usize {
        self.offset.checked_div(self.limit).unwrap_or(0)
    }
}

/// Parameters the list endpoint understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchParams {
    pub q: Option<String>,
    pub status: Option<LeadStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl FetchParams {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(4);
        if let Some(q) = &self.q {
            pairs.push(("q", q.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

pub fn compose(
    search: &str,
    status: StatusFilter,
    page: usize,
    limit: usize,
    sort: SortSpec,
) -> (QueryKey, FetchParams) {
    let key = QueryKey {
        resource: Resource::Leads,
        search: search.to_owned(),
        status,
        limit,
        offset: page.saturating_mul(limit),
        sort,
    };
    let params = key.fetch_params();
    (key, params)
}

/// Pagination math over the server-reported total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

impl PageWindow {
    pub const fn new(page: usize, limit: usize, total: usize) -> Self {
        Self { page, limit, total }
    }

    pub const fn has_prev(self) -> bool {
        self.page > 0
    }

    pub fn has_next(self) -> bool {
        (self.page + 1).saturating_mul(self.limit) < self.total
    }

    pub fn first_row(self) -> usize {
        if self.total == 0 {
            return 0;
        }
        (self.page.saturating_mul(self.limit) + 1).min(self.total)
    }

    pub fn last_row(self) -> usize {
        (self.page + 1).saturating_mul(self.limit).min(self.total)
    }

    pub fn label(self) -> String {
        format!("{} - {} of {}", self.first_row(), self.last_row(), self.total)
    }
}
