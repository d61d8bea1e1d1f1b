//! Pagination query parameters and shared query-string decoders.

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;

/// Page-based pagination query parameters.
///
/// Uses `serde_with` to parse numbers from query strings.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl PaginationParams {
    /// Validates the parameters.
    ///
    /// # Defaults
    ///
    /// - `page`: 1
    /// - `limit`: 10, values above 100 are clamped to 100
    ///
    /// # Errors
    ///
    /// Page and limit must both be at least 1.
    pub fn validate(&self) -> Result<Page, String> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page < 1 {
            return Err("Page must be greater than 0".to_string());
        }

        if limit < 1 {
            return Err("Limit must be greater than 0".to_string());
        }

        Ok(Page {
            page,
            limit: limit.min(MAX_PAGE_LIMIT),
        })
    }
}

/// Custom Serde deserializer for RFC3339 datetime strings.
pub(crate) mod optional_rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}
