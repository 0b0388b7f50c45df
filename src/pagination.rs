//! Opaque page cursors and navigation links.
//!
//! A cursor is the base64 encoding of `{"limit": n, "offset": m}`. Decoding is
//! the exact inverse of encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::{PageLinks, PaginationInfo, DEFAULT_LIMIT};
use crate::validation::RequestParams;

/// Maximum page size unless configured otherwise.
pub const DEFAULT_MAX_LIMIT: u64 = 1000;

/// Decoded page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub limit: u64,
    pub offset: u64,
}

impl PageCursor {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(cursor.trim())
            .map_err(|e| EngineError::InvalidCursor {
                message: e.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::InvalidCursor {
            message: e.to_string(),
        })
    }
}

/// Resolves request paging parameters and builds navigation links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    default_limit: u64,
    max_limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_MAX_LIMIT)
    }
}

impl Pagination {
    pub fn new(default_limit: u64, max_limit: u64) -> Self {
        Self {
            default_limit,
            max_limit: max_limit.max(1),
        }
    }

    /// Read `page`, or else `limit`/`offset`, from request parameters.
    ///
    /// A `page` cursor overrides explicit values. Limits above the configured
    /// maximum are clamped.
    pub fn get(&self, params: &RequestParams) -> Result<PageCursor> {
        let cursor = match params.get("page") {
            Some(page) if !page.is_empty() => PageCursor::decode(page)?,
            _ => PageCursor::new(
                parse_u64(params, "limit")?.unwrap_or(self.default_limit),
                parse_u64(params, "offset")?.unwrap_or(0),
            ),
        };
        Ok(PageCursor::new(cursor.limit.min(self.max_limit), cursor.offset))
    }

    /// Encode a cursor for the given position.
    pub fn set(limit: u64, offset: u64) -> String {
        PageCursor::new(limit, offset).encode()
    }

    /// Build navigation links for a page of a result set of `total` rows.
    pub fn page(limit: u64, offset: u64, total: u64) -> PaginationInfo {
        let prev = (offset >= limit).then(|| Self::set(limit, offset - limit));
        let next = (offset.saturating_add(limit) < total).then(|| Self::set(limit, offset + limit));
        let last = if total <= limit {
            Self::set(limit, 0)
        } else {
            Self::set(limit, total - limit)
        };
        PaginationInfo {
            total,
            page: PageLinks {
                current: Self::set(limit, offset),
                prev,
                next,
                first: Self::set(limit, 0),
                last,
            },
        }
    }
}

fn parse_u64(params: &RequestParams, key: &str) -> Result<Option<u64>> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| EngineError::InvalidValue {
                column: key.to_string(),
                expected: "non-negative integer".to_string(),
                value: raw.to_string(),
            }),
    }
}
