//! # Query Model
//!
//! Conjunctive filter and offset pagination for range queries.
//!
//! | Field | Absent | Present |
//! |-------|--------|---------|
//! | `category` | any category | exact match |
//! | `start` | no lower bound | `date >= start` |
//! | `end` | no upper bound | `date <= end` |

use super::errors::StoreError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use shared_types::{Transaction, UserId};
use std::cmp::Ordering;

/// Filter applied by `TransactionStore::query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    pub user_id: UserId,
    pub category: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    /// Match every transaction of `user_id`.
    pub fn for_user(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            category: None,
            start: None,
            end: None,
        }
    }

    /// Restrict to one category. Empty strings impose no restriction.
    #[must_use]
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category.filter(|c| !c.is_empty());
        self
    }

    #[must_use]
    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Restrict to whole calendar days: `start` from midnight, `end` through
    /// the last instant of that day.
    #[must_use]
    pub fn with_day_range(self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.with_range(start.map(start_of_day), end.map(end_of_day))
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if tx.user_id != self.user_id {
            return false;
        }
        if let Some(category) = &self.category {
            if &tx.category != category {
                return false;
            }
        }
        if let Some(start) = self.start {
            if tx.date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if tx.date > end {
                return false;
            }
        }
        true
    }
}

/// First instant of `day` in UTC.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `day` in UTC.
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    match day.succ_opt() {
        Some(next) => start_of_day(next) - chrono::Duration::nanoseconds(1),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    page_size: u32,
}

impl Page {
    /// Validate 1-based `page` and `page_size`.
    pub fn new(page: i64, page_size: i64) -> Result<Self, StoreError> {
        match (u32::try_from(page), u32::try_from(page_size)) {
            (Ok(p), Ok(s)) if p > 0 && s > 0 => Ok(Self {
                page: p,
                page_size: s,
            }),
            _ => Err(StoreError::InvalidPage { page, page_size }),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// `(page - 1) * page_size`
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

/// Canonical result order: ascending date, ties broken by id.
pub fn canonical_order(a: &Transaction, b: &Transaction) -> Ordering {
    a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id))
}

/// Sort matches canonically and cut out the requested page.
pub fn paginate(mut matches: Vec<Transaction>, page: Option<Page>) -> Vec<Transaction> {
    matches.sort_by(canonical_order);
    match page {
        Some(page) => matches
            .into_iter()
            .skip(page.offset())
            .take(page.limit())
            .collect(),
        None => matches,
    }
}
