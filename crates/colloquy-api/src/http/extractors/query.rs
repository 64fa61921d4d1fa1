//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// `?page=&limit=` for session listings. Missing values take engine defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `?limit=` for message listings. Absent or 0 means the whole history.
#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}
