use std::path::{Path, PathBuf};
use std::time::Duration;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderValue, CONTENT_DISPOSITION};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;
use crate::modules::types::{CombinedResponse, ItemRequest, ListId, PageResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[error("cannot decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// A file attachment returned by the download endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// The list management endpoints, one method per endpoint.
pub trait ListApi: Send + Sync {
    fn fetch_combined(&self, page: u32) -> Result<CombinedResponse, ApiError>;
    fn fetch_page(&self, list: ListId, page: u32, search: &str) -> Result<PageResponse, ApiError>;
    fn add(&self, list: ListId, domain: &str) -> Result<(), ApiError>;
    fn remove(&self, list: ListId, domain: &str) -> Result<(), ApiError>;
    fn upload(&self, list: ListId, file: &Path) -> Result<(), ApiError>;
    /// Follows a location such as `/api/download?list=blocklist`.
    fn download(&self, location: &str) -> Result<Attachment, ApiError>;
}

pub struct HttpListApi {
    base: Url,
    client: Client,
}

impl HttpListApi {
    pub fn new(base_url: &str, timeout: Option<Duration>, user_agent: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // No timeout unless configured; a slow list server should still answer.
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { base, client })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.client.get(url.as_str()).send()?;
        let text = check_status("GET", &url, response)?.text()?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn post_item(&self, path: &str, list: ListId, domain: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        let body = ItemRequest {
            domain: domain.to_string(),
            list,
        };
        let response = self.client.post(url.as_str()).json(&body).send()?;
        check_status("POST", &url, response)?;
        Ok(())
    }
}

impl ListApi for HttpListApi {
    fn fetch_combined(&self, page: u32) -> Result<CombinedResponse, ApiError> {
        let mut url = self.endpoint("/api/list")?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        self.get_json(url)
    }

    fn fetch_page(&self, list: ListId, page: u32, search: &str) -> Result<PageResponse, ApiError> {
        let mut url = self.endpoint("/api/paginated-list")?;
        url.query_pairs_mut()
            .append_pair("list", list.as_str())
            .append_pair("page", &page.to_string())
            .append_pair("search", search);
        self.get_json(url)
    }

    fn add(&self, list: ListId, domain: &str) -> Result<(), ApiError> {
        self.post_item("/api/add", list, domain)
    }

    fn remove(&self, list: ListId, domain: &str) -> Result<(), ApiError> {
        self.post_item("/api/remove", list, domain)
    }

    fn upload(&self, list: ListId, file: &Path) -> Result<(), ApiError> {
        let mut url = self.endpoint("/api/upload")?;
        url.query_pairs_mut().append_pair("list", list.as_str());

        let form = multipart::Form::new()
            .file("file", file)
            .map_err(|source| ApiError::Io {
                path: file.to_path_buf(),
                source,
            })?;
        let response = self.client.post(url.as_str()).multipart(form).send()?;
        check_status("POST", &url, response)?;
        Ok(())
    }

    fn download(&self, location: &str) -> Result<Attachment, ApiError> {
        let url = self.endpoint(location)?;
        let response = check_status("GET", &url, self.client.get(url.as_str()).send()?)?;
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(attachment_filename);
        let bytes = response.bytes()?.to_vec();
        Ok(Attachment { filename, bytes })
    }
}

fn check_status(method: &'static str, url: &Url, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ApiError::Status {
        method,
        url: url.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

/// Extracts the file name from `attachment; filename=...`, keeping only the
/// final path component.
pub fn attachment_filename(header: &HeaderValue) -> Option<String> {
    let header = header.to_str().ok()?;
    let raw = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name = raw.trim_matches('"');
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
