//! # Query Parameters
//!
//! Raw query strings are taken as text and parsed here so malformed values
//! produce the JSON error body instead of the framework's rejection.
//! Empty values count as absent.

use crate::error::ApiError;
use chrono::NaiveDate;
use ft_01_transaction_store::{Page, TransactionFilter};
use ft_05_report_engine::ReportRequest;
use serde::Deserialize;

/// `GET /transactions?user_id&category&start_date&end_date&page&page_size`
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// `GET /reports?user_id&report_type&start_date&end_date`
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub user_id: Option<String>,
    pub report_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 10;

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required_user(value: &Option<String>) -> Result<String, ApiError> {
    present(value)
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("user_id is required"))
}

/// Parse an optional `YYYY-MM-DD` parameter.
pub fn parse_date(name: &str, value: &Option<String>) -> Result<Option<NaiveDate>, ApiError> {
    present(value)
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request(format!("{name} must be YYYY-MM-DD, got {raw:?}")))
        })
        .transpose()
}

fn parse_int(name: &str, value: &Option<String>, default: i64) -> Result<i64, ApiError> {
    match present(value) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{name} must be an integer, got {raw:?}"))),
        None => Ok(default),
    }
}

impl TransactionQuery {
    pub fn into_filter(self) -> Result<(TransactionFilter, Page), ApiError> {
        let user_id = required_user(&self.user_id)?;
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        let page = Page::new(
            parse_int("page", &self.page, DEFAULT_PAGE)?,
            parse_int("page_size", &self.page_size, DEFAULT_PAGE_SIZE)?,
        )?;

        let filter = TransactionFilter::for_user(user_id)
            .with_category(present(&self.category).map(str::to_string))
            .with_day_range(start, end);
        Ok((filter, page))
    }
}

impl ReportQuery {
    pub fn into_request(self) -> Result<ReportRequest, ApiError> {
        Ok(ReportRequest::new(
            required_user(&self.user_id)?,
            present(&self.report_type).unwrap_or_default(),
            parse_date("start_date", &self.start_date)?,
            parse_date("end_date", &self.end_date)?,
        ))
    }
}
