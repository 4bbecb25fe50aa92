use derive_more::with_trait::Display;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Number of items the server puts on one page.
pub const PAGE_SIZE: u64 = 50;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[serde(rename_all = "lowercase")]
pub enum ListId {
    #[display("blocklist")]
    Blocklist,
    #[display("allowlist")]
    Allowlist,
}

#[derive(Debug, Error)]
#[error("unknown list `{0}`, expected blocklist or allowlist")]
pub struct UnknownList(pub String);

#[derive(Debug, Error)]
#[error("unknown view `{0}`, expected blocklist, allowlist or global")]
pub struct UnknownView(pub String);

impl ListId {
    pub const ALL: [ListId; 2] = [ListId::Blocklist, ListId::Allowlist];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListId::Blocklist => "blocklist",
            ListId::Allowlist => "allowlist",
        }
    }

    pub fn items_id(&self) -> String {
        format!("{self}Items")
    }

    pub fn input_id(&self) -> String {
        format!("{self}Input")
    }

    pub fn search_id(&self) -> String {
        format!("{self}Search")
    }

    pub fn upload_id(&self) -> String {
        format!("{self}Upload")
    }

    pub fn pagination_id(&self) -> String {
        format!("{self}Pagination")
    }

    pub fn status_id(&self) -> String {
        format!("{self}Status")
    }

    /// Location the browser is sent to for an export of this list.
    pub fn download_location(&self) -> String {
        format!("/api/download?list={self}")
    }
}

impl FromStr for ListId {
    type Err = UnknownList;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blocklist" => Ok(ListId::Blocklist),
            "allowlist" => Ok(ListId::Allowlist),
            other => Err(UnknownList(other.to_string())),
        }
    }
}

/// Which screen a controller drives: one of the two paginated list views,
/// or the legacy view that shows both lists from `/api/list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ViewKind {
    #[display("{_0}")]
    List(ListId),
    #[display("global")]
    Global,
}

impl ViewKind {
    pub fn pagination_id(&self) -> String {
        match self {
            ViewKind::List(list) => list.pagination_id(),
            ViewKind::Global => "globalPagination".to_string(),
        }
    }
}

impl FromStr for ViewKind {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("global") {
            return Ok(ViewKind::Global);
        }
        ListId::from_str(s)
            .map(ViewKind::List)
            .map_err(|e| UnknownView(e.0))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default, Display)]
#[serde(rename_all = "camelCase")]
#[display("{} items, {total_count} total", list.len())]
pub struct PageResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub list: Vec<String>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default, Display)]
#[serde(rename_all = "camelCase")]
#[display("{} blocked, {} allowed, {total_pages} pages", blocklist.len(), allowlist.len())]
pub struct CombinedResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub blocklist: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub total_pages: u64,
}

impl CombinedResponse {
    pub fn items(&self, list: ListId) -> &[String] {
        match list {
            ListId::Blocklist => &self.blocklist,
            ListId::Allowlist => &self.allowlist,
        }
    }
}

/// Body of `/api/add` and `/api/remove`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Display)]
#[display("{domain} ({list})")]
pub struct ItemRequest {
    pub domain: String,
    pub list: ListId,
}

// The server encodes an empty list as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub fn page_count(total_count: u64) -> u64 {
    total_count.div_ceil(PAGE_SIZE)
}
