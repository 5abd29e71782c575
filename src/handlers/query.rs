//! List-page query strings: parsing into `ListParams` and building sort/page links.

use crate::registry::ModelView;
use crate::sql::ListParams;
use serde::Serialize;
use std::collections::HashMap;

pub const FILTER_PREFIX: &str = "flt_";

/// Percent-encode everything outside RFC 3986 unreserved characters.
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Parsed list request plus the zero-based page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub params: ListParams,
    pub page: u64,
}

impl ListQuery {
    /// Parse `search`, `sort`, `desc`, `page` and `flt_<column>` keys. Filters follow the
    /// view's filterable column order; unknown columns and empty values are dropped.
    pub fn parse(view: &ModelView, raw: &HashMap<String, String>) -> Self {
        let search = raw
            .get("search")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let sort = raw
            .get("sort")
            .filter(|c| view.config.can_sort(c))
            .cloned();
        let desc = raw
            .get("desc")
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        let page = raw
            .get("page")
            .and_then(|p| p.parse::<u64>().ok())
            .unwrap_or(0);

        let filters = view
            .config
            .filterable_columns
            .iter()
            .flatten()
            .filter_map(|col| {
                raw.get(&format!("{}{}", FILTER_PREFIX, col))
                    .filter(|v| !v.is_empty())
                    .map(|v| (col.clone(), v.clone()))
            })
            .collect();

        ListQuery {
            params: ListParams {
                search,
                filters,
                sort,
                desc,
            },
            page,
        }
    }

    /// Query string reproducing this request, with `page` omitted when zero.
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(String, String)> = Vec::new();
        if let Some(s) = &self.params.search {
            pairs.push(("search".into(), s.clone()));
        }
        for (col, v) in &self.params.filters {
            pairs.push((format!("{}{}", FILTER_PREFIX, col), v.clone()));
        }
        if let Some(s) = &self.params.sort {
            pairs.push(("sort".into(), s.clone()));
            if self.params.desc {
                pairs.push(("desc".into(), "1".into()));
            }
        }
        if self.page > 0 {
            pairs.push(("page".into(), self.page.to_string()));
        }
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Link for a column header: sort ascending, or flip direction if already sorted by it.
    pub fn sort_link(&self, column: &str) -> String {
        let mut next = self.clone();
        next.page = 0;
        next.params.desc = self.params.sort.as_deref() == Some(column) && !self.params.desc;
        next.params.sort = Some(column.to_string());
        next.to_query_string()
    }

    pub fn page_link(&self, page: u64) -> String {
        let mut next = self.clone();
        next.page = page;
        next.to_query_string()
    }

    /// Filters keyed by column, for refilling the filter inputs.
    pub fn filter_values(&self) -> HashMap<String, String> {
        self.params.filters.iter().cloned().collect()
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct PageLink {
    pub label: String,
    pub query: String,
    pub current: bool,
}

/// Pagination window of up to seven pages around `page`, with first/last jumps.
pub fn page_links(query: &ListQuery, page: u64, page_count: u64) -> Vec<PageLink> {
    let start = page.saturating_sub(3);
    let end = (page + 4).min(page_count);
    let mut links = Vec::new();
    if start > 0 {
        links.push(PageLink {
            label: "«".into(),
            query: query.page_link(0),
            current: false,
        });
    }
    for p in start..end {
        links.push(PageLink {
            label: (p + 1).to_string(),
            query: query.page_link(p),
            current: p == page,
        });
    }
    if end < page_count {
        links.push(PageLink {
            label: "»".into(),
            query: query.page_link(page_count - 1),
            current: false,
        });
    }
    links
}
