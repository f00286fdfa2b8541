/// Shared types used across the codebase

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::config;

/// Paginated list payload returned by every list endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Common list query string: `?page=2&limit=50&search=jo&branch_id=...&church_id=...`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub branch_id: Option<Uuid>,
    /// Only honored for superadmins
    pub church_id: Option<Uuid>,
}

impl ListQuery {
    /// 1-based page, clamped to at least 1
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, defaulted and capped by config
    pub fn limit(&self) -> i64 {
        let api = &config::config().api;
        self.limit
            .unwrap_or(api.default_page_size)
            .clamp(1, api.max_page_size)
    }

    /// `%term%` for ILIKE, with LIKE wildcards in the term escaped
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

/// `?from=2024-01-01&to=2024-01-31`, both ends inclusive
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub const DEFAULT_DAYS: i64 = 30;

    pub fn is_ordered(&self) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        }
    }

    /// Closed window for aggregates: missing ends default to the last
    /// `DEFAULT_DAYS` days up to today.
    pub fn closed(&self) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or_else(|| Utc::now().date_naive());
        let from = self.from.unwrap_or(to - Duration::days(Self::DEFAULT_DAYS));
        (from, to)
    }
}

/// For PATCH-style payloads: distinguishes a missing field (`None`) from an
/// explicit `null` (`Some(None)`).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_limit_defaults() {
        let q = ListQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), config::config().api.default_page_size);
    }

    #[test]
    fn limit_is_clamped() {
        let q = ListQuery { page: Some(0), limit: Some(1_000_000), ..Default::default() };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), config::config().api.max_page_size);
        let q = ListQuery { limit: Some(-5), ..Default::default() };
        assert_eq!(q.limit(), 1);
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        let q = ListQuery { search: Some(" 100%_sure ".to_string()), ..Default::default() };
        assert_eq!(q.search_pattern().unwrap(), "%100\\%\\_sure%");
        let blank = ListQuery { search: Some("   ".to_string()), ..Default::default() };
        assert!(blank.search_pattern().is_none());
    }

    #[test]
    fn date_window_defaults_and_order() {
        let open = DateWindow::default();
        let (from, to) = open.closed();
        assert_eq!((to - from).num_days(), DateWindow::DEFAULT_DAYS);

        let backwards = DateWindow {
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: NaiveDate::from_ymd_opt(2024, 2, 1),
        };
        assert!(!backwards.is_ordered());
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        phone: Option<Option<String>>,
    }

    #[test]
    fn double_option_tells_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.phone, None);
        let cleared: Patch = serde_json::from_str(r#"{"phone":null}"#).unwrap();
        assert_eq!(cleared.phone, Some(None));
        let set: Patch = serde_json::from_str(r#"{"phone":"555"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("555".to_string())));
    }
}
