use axum::extract::{Multipart, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use listpanel::modules::client::{ApiError, HttpListApi, ListApi};
use listpanel::modules::session::{Action, Controllers, Session};
use listpanel::modules::types::{CombinedResponse, ItemRequest, ListId, PageResponse, ViewKind, PAGE_SIZE};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

const BLOCK: ViewKind = ViewKind::List(ListId::Blocklist);
const ALLOW: ViewKind = ViewKind::List(ListId::Allowlist);

/// What the fake list server holds and everything it was asked.
#[derive(Default)]
struct Backend {
    lists: BTreeMap<String, Vec<String>>,
    requests: Vec<String>,
    reject_uploads: bool,
    broken_reads: bool,
    attachment_name: Option<String>,
}

type Shared = Arc<Mutex<Backend>>;

fn query_map(raw: &Option<String>) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw.as_deref().unwrap_or("").as_bytes())
        .into_owned()
        .collect()
}

async fn paginated_list(State(backend): State<Shared>, RawQuery(raw): RawQuery) -> Response {
    let mut backend = backend.lock().unwrap();
    backend
        .requests
        .push(format!("GET /api/paginated-list?{}", raw.clone().unwrap_or_default()));
    if backend.broken_reads {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response();
    }

    let query = query_map(&raw);
    let Some(items) = query.get("list").and_then(|l| backend.lists.get(l)) else {
        return (StatusCode::BAD_REQUEST, "Invalid list type").into_response();
    };
    let search = query.get("search").cloned().unwrap_or_default().to_lowercase();
    let mut matching: Vec<String> = items
        .iter()
        .filter(|d| d.to_lowercase().contains(&search))
        .cloned()
        .collect();
    matching.sort();

    let page = query
        .get("page")
        .and_then(|p| p.parse::<usize>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let size = PAGE_SIZE as usize;
    let start = ((page - 1) * size).min(matching.len());
    let end = (start + size).min(matching.len());

    Json(PageResponse {
        list: matching[start..end].to_vec(),
        total_count: matching.len() as u64,
    })
    .into_response()
}

// Like the real server: no totalPages field and no paging at all.
async fn combined_list(State(backend): State<Shared>, RawQuery(raw): RawQuery) -> Response {
    let mut backend = backend.lock().unwrap();
    backend
        .requests
        .push(format!("GET /api/list?{}", raw.unwrap_or_default()));
    let body = serde_json::json!({
        "blocklist": backend.lists.get("blocklist"),
        "allowlist": backend.lists.get("allowlist"),
    });
    Json(body).into_response()
}

async fn add_item(State(backend): State<Shared>, Json(request): Json<ItemRequest>) -> StatusCode {
    let mut backend = backend.lock().unwrap();
    backend.requests.push(format!(
        "POST /api/add {}",
        serde_json::to_string(&request).unwrap_or_default()
    ));
    backend
        .lists
        .entry(request.list.to_string())
        .or_default()
        .push(request.domain);
    StatusCode::OK
}

async fn remove_item(State(backend): State<Shared>, Json(request): Json<ItemRequest>) -> StatusCode {
    let mut backend = backend.lock().unwrap();
    backend.requests.push(format!(
        "POST /api/remove {}",
        serde_json::to_string(&request).unwrap_or_default()
    ));
    if let Some(items) = backend.lists.get_mut(request.list.as_str()) {
        if let Some(pos) = items.iter().position(|d| *d == request.domain) {
            items.remove(pos);
        }
    }
    StatusCode::OK
}

async fn upload_list(
    State(backend): State<Shared>,
    RawQuery(raw): RawQuery,
    mut multipart: Multipart,
) -> StatusCode {
    let mut uploaded = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            uploaded = field.text().await.ok();
        }
    }

    let mut backend = backend.lock().unwrap();
    backend
        .requests
        .push(format!("POST /api/upload?{}", raw.clone().unwrap_or_default()));
    if backend.reject_uploads {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let (Some(list), Some(text)) = (query_map(&raw).remove("list"), uploaded) else {
        return StatusCode::BAD_REQUEST;
    };
    backend
        .lists
        .insert(list, text.lines().map(str::to_string).collect());
    StatusCode::OK
}

async fn download_list(State(backend): State<Shared>, RawQuery(raw): RawQuery) -> Response {
    let mut backend = backend.lock().unwrap();
    backend
        .requests
        .push(format!("GET /api/download?{}", raw.clone().unwrap_or_default()));
    let list = query_map(&raw).remove("list").unwrap_or_default();
    let Some(items) = backend.lists.get(&list) else {
        return (StatusCode::BAD_REQUEST, "Invalid list type").into_response();
    };
    let mut body = items.join("\n");
    body.push('\n');
    let filename = backend
        .attachment_name
        .clone()
        .unwrap_or_else(|| format!("{list}.txt"));
    (
        [
            (header::CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
            (header::CONTENT_TYPE, "text/plain".to_string()),
        ],
        body,
    )
        .into_response()
}

fn router(backend: Shared) -> Router {
    Router::new()
        .route("/api/list", get(combined_list))
        .route("/api/paginated-list", get(paginated_list))
        .route("/api/add", post(add_item))
        .route("/api/remove", post(remove_item))
        .route("/api/upload", post(upload_list))
        .route("/api/download", get(download_list))
        .with_state(backend)
}

struct Server {
    backend: Shared,
    base_url: String,
}

impl Server {
    fn start(block: &[&str], allow: &[&str]) -> Self {
        let mut backend = Backend::default();
        backend.lists.insert(
            "blocklist".into(),
            block.iter().map(|s| s.to_string()).collect(),
        );
        backend.lists.insert(
            "allowlist".into(),
            allow.iter().map(|s| s.to_string()).collect(),
        );
        let backend = Arc::new(Mutex::new(backend));

        let (tx, rx) = mpsc::channel::<SocketAddr>();
        let app = router(backend.clone());
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        let addr = rx.recv().unwrap();

        Self {
            backend,
            base_url: format!("http://{addr}"),
        }
    }

    fn api(&self) -> HttpListApi {
        HttpListApi::new(&self.base_url, None, "listpanel-tests").unwrap()
    }

    fn session(&self, download_dir: &std::path::Path) -> Session {
        Session::new(Arc::new(self.api()), Controllers::in_memory(), download_dir)
    }

    fn requests(&self) -> Vec<String> {
        self.backend.lock().unwrap().requests.clone()
    }

    fn clear_requests(&self) {
        self.backend.lock().unwrap().requests.clear();
    }

    fn list(&self, list: &str) -> Vec<String> {
        self.backend.lock().unwrap().lists[list].clone()
    }
}

fn domains(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i:03}.com")).collect()
}

fn as_refs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}

#[test]
fn pages_render_rows_and_buttons() {
    let block = domains("ads", 120);
    let server = Server::start(&as_refs(&block), &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());

    let commands = session.act(BLOCK, Action::Load);
    session.run(commands);
    assert_eq!(session.document().rows("blocklistItems").len(), 50);
    assert_eq!(session.document().buttons("blocklistPagination").len(), 3);

    let commands = session.act(BLOCK, Action::Page(3));
    assert_eq!(session.run(commands), 1);
    let doc = session.document();
    assert_eq!(doc.rows("blocklistItems").len(), 20);
    assert_eq!(doc.rows("blocklistItems")[0].text, "ads100.com");
    let disabled: Vec<u32> = doc
        .buttons("blocklistPagination")
        .iter()
        .filter(|b| b.disabled)
        .map(|b| b.page)
        .collect();
    assert_eq!(disabled, vec![3]);
    assert_eq!(
        server.requests().last().unwrap(),
        "GET /api/paginated-list?list=blocklist&page=3&search="
    );
}

#[test]
fn add_posts_once_then_refreshes_first_page() {
    let server = Server::start(&[], &["ok.org"]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());

    session.document_mut().set_value("allowlistInput", "example.com");
    let commands = session.act(ALLOW, Action::Add(ListId::Allowlist));
    session.run(commands);

    assert_eq!(
        server.requests(),
        vec![
            r#"POST /api/add {"domain":"example.com","list":"allowlist"}"#,
            "GET /api/paginated-list?list=allowlist&page=1&search=",
        ]
    );
    assert_eq!(session.document().value("allowlistInput"), "");
    assert_eq!(session.document().rows("allowlistItems").len(), 2);
}

#[test]
fn blank_add_is_not_sent() {
    let server = Server::start(&[], &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());

    session.document_mut().set_value("blocklistInput", "   ");
    let commands = session.act(BLOCK, Action::Add(ListId::Blocklist));
    assert_eq!(session.run(commands), 0);
    assert!(server.requests().is_empty());
    assert_eq!(session.document().value("blocklistInput"), "   ");
}

#[test]
fn remove_posts_exact_item() {
    let server = Server::start(&["bad.com", "bad.com.evil"], &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());
    let commands = session.act(BLOCK, Action::Load);
    session.run(commands);
    server.clear_requests();

    let item = session
        .document()
        .remove_control("blocklistItems", "bad.com")
        .unwrap()
        .to_string();
    let commands = session.act(BLOCK, Action::Remove(ListId::Blocklist, item));
    session.run(commands);

    assert_eq!(
        server.requests(),
        vec![
            r#"POST /api/remove {"domain":"bad.com","list":"blocklist"}"#,
            "GET /api/paginated-list?list=blocklist&page=1&search=",
        ]
    );
    assert_eq!(server.list("blocklist"), vec!["bad.com.evil"]);
}

#[test]
fn search_starts_at_page_one_and_is_encoded() {
    let block = domains("foo", 130);
    let server = Server::start(&as_refs(&block), &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());
    let commands = session.act(BLOCK, Action::Load);
    session.run(commands);
    let commands = session.act(BLOCK, Action::Page(2));
    session.run(commands);

    session.document_mut().set_value("blocklistSearch", "foo");
    let commands = session.act(BLOCK, Action::KeyPress(ListId::Blocklist, "Enter".into()));
    session.run(commands);
    assert_eq!(
        server.requests().last().unwrap(),
        "GET /api/paginated-list?list=blocklist&page=1&search=foo"
    );
    assert!(session.document().buttons("blocklistPagination")[0].disabled);

    session.document_mut().set_value("blocklistSearch", " a&b c ");
    let commands = session.act(BLOCK, Action::KeyPress(ListId::Blocklist, "Enter".into()));
    session.run(commands);
    assert_eq!(
        server.requests().last().unwrap(),
        "GET /api/paginated-list?list=blocklist&page=1&search=a%26b+c"
    );
    assert!(session.document().rows("blocklistItems").is_empty());
    assert!(session.document().buttons("blocklistPagination").is_empty());
}

#[test]
fn upload_without_file_sends_nothing() {
    let server = Server::start(&[], &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());

    let commands = session.act(BLOCK, Action::Upload(ListId::Blocklist));
    assert_eq!(session.run(commands), 0);
    assert!(server.requests().is_empty());
}

#[test]
fn upload_replaces_list_and_refreshes() {
    let server = Server::start(&["old.com"], &[]);
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("import.txt");
    std::fs::write(&file, "one.com\ntwo.com\n").unwrap();
    let mut session = server.session(dir.path());

    session
        .document_mut()
        .select_file("blocklistUpload", Some(file.as_path()));
    let commands = session.act(BLOCK, Action::Upload(ListId::Blocklist));
    assert_eq!(session.run(commands), 2);

    assert_eq!(
        server.requests(),
        vec![
            "POST /api/upload?list=blocklist",
            "GET /api/paginated-list?list=blocklist&page=1&search=",
        ]
    );
    assert_eq!(server.list("blocklist"), vec!["one.com", "two.com"]);
    assert_eq!(session.document().rows("blocklistItems").len(), 2);
}

#[test]
fn rejected_upload_does_not_refresh() {
    let server = Server::start(&[], &["keep.org"]);
    server.backend.lock().unwrap().reject_uploads = true;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("import.txt");
    std::fs::write(&file, "x.org\n").unwrap();
    let mut session = server.session(dir.path());

    session
        .document_mut()
        .select_file("allowlistUpload", Some(file.as_path()));
    let commands = session.act(ALLOW, Action::Upload(ListId::Allowlist));
    assert_eq!(session.run(commands), 1);
    assert_eq!(server.requests(), vec!["POST /api/upload?list=allowlist"]);
    assert_eq!(server.list("allowlist"), vec!["keep.org"]);
}

#[test]
fn download_saves_attachment_under_server_name() {
    let server = Server::start(&["a.com", "b.com"], &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());

    let commands = session.act(BLOCK, Action::Download(ListId::Blocklist));
    session.run(commands);
    let saved = std::fs::read_to_string(dir.path().join("blocklist.txt")).unwrap();
    assert_eq!(saved, "a.com\nb.com\n");
    assert_eq!(server.requests(), vec!["GET /api/download?list=blocklist"]);
}

#[test]
fn download_never_replaces_local_files() {
    let server = Server::start(&["a.com"], &[]);
    server.backend.lock().unwrap().attachment_name = Some("listpanel.toml".into());
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("listpanel.toml");
    std::fs::write(&config, "download_dir = \".\"\n").unwrap();
    let mut session = server.session(dir.path());

    let commands = session.act(BLOCK, Action::Download(ListId::Blocklist));
    session.run(commands);
    assert_eq!(std::fs::read_to_string(&config).unwrap(), "download_dir = \".\"\n");
    let saved = std::fs::read_to_string(dir.path().join("listpanel (1).toml")).unwrap();
    assert_eq!(saved, "a.com\n");
}

#[test]
fn failed_read_keeps_previous_view() {
    let server = Server::start(&["stay.com"], &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());
    let commands = session.act(BLOCK, Action::Load);
    session.run(commands);

    server.backend.lock().unwrap().broken_reads = true;
    session.document_mut().set_value("blocklistSearch", "zzz");
    let commands = session.act(BLOCK, Action::KeyPress(ListId::Blocklist, "Enter".into()));
    session.run(commands);

    assert_eq!(session.document().rows("blocklistItems")[0].text, "stay.com");
    assert_eq!(session.document().buttons("blocklistPagination").len(), 1);
}

#[test]
fn status_errors_are_typed() {
    let server = Server::start(&[], &[]);
    server.backend.lock().unwrap().broken_reads = true;
    let err = server
        .api()
        .fetch_page(ListId::Blocklist, 1, "")
        .unwrap_err();
    match err {
        ApiError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "Failed to read file");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn blocklist_page_survives_restart() {
    let block = domains("ads", 150);
    let allow = domains("ok", 150);
    let server = Server::start(&as_refs(&block), &as_refs(&allow));
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.toml");

    let mut first = Session::new(
        Arc::new(server.api()),
        Controllers::with_state_file(&state_file),
        dir.path(),
    );
    for view in [BLOCK, ALLOW] {
        let commands = first.act(view, Action::Load);
        first.run(commands);
        let commands = first.act(view, Action::Page(2));
        first.run(commands);
    }
    server.clear_requests();

    let mut second = Session::new(
        Arc::new(server.api()),
        Controllers::with_state_file(&state_file),
        dir.path(),
    );
    for view in [BLOCK, ALLOW] {
        let commands = second.act(view, Action::Load);
        second.run(commands);
    }
    assert_eq!(
        server.requests(),
        vec![
            "GET /api/paginated-list?list=blocklist&page=2&search=",
            "GET /api/paginated-list?list=allowlist&page=1&search=",
        ]
    );
}

#[test]
fn global_view_uses_combined_endpoint() {
    let server = Server::start(&["ads.com", "track.net"], &[]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = server.session(dir.path());

    let commands = session.act(ViewKind::Global, Action::Load);
    session.run(commands);
    assert_eq!(server.requests(), vec!["GET /api/list?page=1"]);
    assert_eq!(session.document().rows("blocklistItems").len(), 2);
    assert!(session.document().rows("allowlistItems").is_empty());
    assert!(session.document().buttons("globalPagination").is_empty());

    let combined: CombinedResponse = server.api().fetch_combined(1).unwrap();
    assert_eq!(combined.total_pages, 0);
}
