use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use derive_more::with_trait::Display;
use crate::modules::client::{ApiError, ListApi};
use crate::modules::state::Ticket;
use crate::modules::types::{CombinedResponse, ListId, PageResponse, ViewKind};

/// A network request a controller wants performed.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Request {
    #[display("fetch {list} page {page} search={search:?} {ticket}")]
    FetchPage {
        list: ListId,
        ticket: Ticket,
        page: u32,
        search: String,
    },
    #[display("fetch all lists page {page} {ticket}")]
    FetchCombined { ticket: Ticket, page: u32 },
    #[display("add {domain} to {list}")]
    Add { list: ListId, domain: String },
    #[display("remove {domain} from {list}")]
    Remove { list: ListId, domain: String },
    #[display("upload {} to {list}", file.display())]
    Upload { list: ListId, file: PathBuf },
    #[display("download {location}")]
    Download { list: ListId, location: String },
}

/// A request together with the view whose action produced it.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("[{origin}] {request}")]
pub struct Command {
    pub origin: ViewKind,
    pub request: Request,
}

#[derive(Debug)]
pub enum Response {
    Page {
        list: ListId,
        ticket: Ticket,
        page: u32,
        result: Result<PageResponse, ApiError>,
    },
    Combined {
        ticket: Ticket,
        page: u32,
        result: Result<CombinedResponse, ApiError>,
    },
    Added {
        list: ListId,
        domain: String,
        result: Result<(), ApiError>,
    },
    Removed {
        list: ListId,
        domain: String,
        result: Result<(), ApiError>,
    },
    Uploaded {
        list: ListId,
        result: Result<(), ApiError>,
    },
    Downloaded {
        list: ListId,
        result: Result<PathBuf, ApiError>,
    },
}

impl Response {
    /// Page reads, as opposed to changes to a list.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Response::Page { .. } | Response::Combined { .. })
    }
}

/// A finished request, routed back to `origin`.
#[derive(Debug)]
pub struct Outcome {
    pub origin: ViewKind,
    pub response: Response,
}

/// Runs one command to completion. Failures travel inside the outcome.
pub fn execute(api: &dyn ListApi, command: Command, download_dir: &Path) -> Outcome {
    let response = match command.request {
        Request::FetchPage {
            list,
            ticket,
            page,
            search,
        } => Response::Page {
            list,
            ticket,
            page,
            result: api.fetch_page(list, page, &search),
        },
        Request::FetchCombined { ticket, page } => Response::Combined {
            ticket,
            page,
            result: api.fetch_combined(page),
        },
        Request::Add { list, domain } => {
            let result = api.add(list, &domain);
            Response::Added { list, domain, result }
        }
        Request::Remove { list, domain } => {
            let result = api.remove(list, &domain);
            Response::Removed { list, domain, result }
        }
        Request::Upload { list, file } => Response::Uploaded {
            list,
            result: api.upload(list, &file),
        },
        Request::Download { list, location } => Response::Downloaded {
            list,
            result: save_attachment(api, list, &location, download_dir),
        },
    };
    Outcome {
        origin: command.origin,
        response,
    }
}

fn save_attachment(
    api: &dyn ListApi,
    list: ListId,
    location: &str,
    download_dir: &Path,
) -> Result<PathBuf, ApiError> {
    let attachment = api.download(location)?;
    let name = attachment
        .filename
        .unwrap_or_else(|| format!("{list}.txt"));
    let (path, mut file) = create_unused(download_dir, &name).map_err(|source| ApiError::Io {
        path: download_dir.join(&name),
        source,
    })?;
    file.write_all(&attachment.bytes).map_err(|source| ApiError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Creates `name` in `dir`, or `stem (1).ext`, `stem (2).ext` and so on when
/// it is taken. Existing files are never opened for writing.
fn create_unused(dir: &Path, name: &str) -> io::Result<(PathBuf, File)> {
    let original = Path::new(name);
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let extension = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut copy = 0u32;
    loop {
        let candidate = match copy {
            0 => dir.join(name),
            n => dir.join(format!("{stem} ({n}){extension}")),
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && copy < u32::MAX => copy += 1,
            Err(e) => return Err(e),
        }
    }
}
