use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::PathBuf;
use derive_more::with_trait::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sequence number stamped on a fetch. Only the latest ticket of a view may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("#{_0}")]
pub struct Ticket(pub u64);

/// Per-view state handed to the fetch-and-render cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    page: u32,
    issued: u64,
}

impl ViewState {
    pub fn new(page: u32) -> Self {
        Self {
            page: page.max(1),
            issued: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<Ticket> {
        (self.issued > 0).then_some(Ticket(self.issued))
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(1)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot serialize page state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Where a view keeps its current page between runs.
pub trait PageStore: Send {
    fn load(&self, key: &str) -> Option<u32>;
    fn save(&mut self, key: &str, page: u32) -> Result<(), StoreError>;
}

/// Forgets everything when the process ends.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: HashMap<String, u32>,
}

impl PageStore for MemoryPageStore {
    fn load(&self, key: &str) -> Option<u32> {
        self.pages.get(key).copied()
    }

    fn save(&mut self, key: &str, page: u32) -> Result<(), StoreError> {
        self.pages.insert(key.to_string(), page);
        Ok(())
    }
}

/// Keeps nothing, so the view opens on page one every time.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPageStore;

impl PageStore for NoPageStore {
    fn load(&self, _key: &str) -> Option<u32> {
        None
    }

    fn save(&mut self, _key: &str, _page: u32) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PageFile {
    #[serde(default)]
    pub pages: BTreeMap<String, u32>,
}

/// Keeps pages in a TOML file. Every save re-reads the file so several
/// views may share one file.
#[derive(Debug, Clone)]
pub struct FilePageStore {
    path: PathBuf,
}

impl FilePageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<PageFile, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(PageFile::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl PageStore for FilePageStore {
    fn load(&self, key: &str) -> Option<u32> {
        match self.read() {
            Ok(file) => file.pages.get(key).copied(),
            Err(e) => {
                log::warn!("Ignoring saved page state: {e}");
                None
            }
        }
    }

    fn save(&mut self, key: &str, page: u32) -> Result<(), StoreError> {
        let mut file = self.read().unwrap_or_default();
        file.pages.insert(key.to_string(), page);
        let toml_str = toml::to_string_pretty(&file)?;
        fs::write(&self.path, toml_str).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
