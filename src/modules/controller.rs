use log::{debug, error, info, warn};
use crate::modules::client::ApiError;
use crate::modules::command::{Command, Request, Response};
use crate::modules::document::Document;
use crate::modules::render::{page_buttons, render_list, render_pagination};
use crate::modules::state::{PageStore, Ticket, ViewState};
use crate::modules::types::{ListId, ViewKind};

/// Drives one paginated list view. Both lists use this type; they differ only
/// in the list id and the page store handed in.
pub struct ListController {
    list: ListId,
    state: ViewState,
    store: Box<dyn PageStore>,
}

impl ListController {
    pub fn new(list: ListId, store: Box<dyn PageStore>) -> Self {
        let page = store.load(list.as_str()).unwrap_or(1);
        Self {
            list,
            state: ViewState::new(page),
            store,
        }
    }

    pub fn list(&self) -> ListId {
        self.list
    }

    pub fn view(&self) -> ViewKind {
        ViewKind::List(self.list)
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    fn command(&self, request: Request) -> Command {
        Command {
            origin: self.view(),
            request,
        }
    }

    /// First fetch after the view is opened, at the page the store
    /// remembers or page one.
    pub fn load(&mut self) -> Command {
        let page = self.store.load(self.list.as_str()).unwrap_or(1);
        self.state.set_page(page);
        self.fetch(page, "")
    }

    pub fn fetch(&mut self, page: u32, search: &str) -> Command {
        let ticket = self.state.issue();
        self.command(Request::FetchPage {
            list: self.list,
            ticket,
            page: page.max(1),
            search: search.to_string(),
        })
    }

    /// Page one, no search.
    pub fn refresh(&mut self) -> Command {
        self.fetch(1, "")
    }

    pub fn add(&self, doc: &Document) -> Option<Command> {
        let domain = doc.value(&self.list.input_id()).trim().to_string();
        if domain.is_empty() {
            return None;
        }
        Some(self.command(Request::Add {
            list: self.list,
            domain,
        }))
    }

    pub fn remove(&self, item: &str) -> Command {
        self.command(Request::Remove {
            list: self.list,
            domain: item.to_string(),
        })
    }

    pub fn upload(&self, doc: &Document) -> Option<Command> {
        let file = doc.selected_file(&self.list.upload_id())?;
        Some(self.command(Request::Upload {
            list: self.list,
            file,
        }))
    }

    pub fn download(&self, doc: &mut Document) {
        doc.navigate(self.list.download_location());
    }

    /// Key pressed inside the search box. Only Enter searches.
    pub fn key_pressed(&mut self, doc: &Document, key: &str) -> Option<Command> {
        if key != "Enter" {
            return None;
        }
        let query = doc.value(&self.list.search_id()).trim().to_string();
        Some(self.fetch(1, &query))
    }

    /// Activates pagination button `page`. Disabled or absent buttons do nothing.
    pub fn goto_page(&mut self, doc: &Document, page: u32) -> Option<Command> {
        let clickable = doc
            .buttons(&self.list.pagination_id())
            .iter()
            .any(|b| b.page == page && !b.disabled);
        if !clickable {
            return None;
        }
        let query = doc.value(&self.list.search_id()).trim().to_string();
        Some(self.fetch(page, &query))
    }

    pub fn apply(&mut self, doc: &mut Document, response: Response) -> Vec<Command> {
        match response {
            Response::Page {
                list,
                ticket,
                page,
                result,
            } if list == self.list => {
                if !self.state.is_current(ticket) {
                    debug!("Dropping stale {list} response {ticket}");
                    return Vec::new();
                }
                match result {
                    Ok(data) => {
                        info!("Rendering {list} page {page}: {data}");
                        render_list(doc, &self.list.items_id(), &data.list);
                        render_pagination(doc, &self.list.pagination_id(), data.total_count, page);
                        self.remember_page(page);
                    }
                    Err(e) => error!("Error fetching {list}: {e}"),
                }
                Vec::new()
            }
            Response::Added { list, domain, result } if list == self.list => {
                settle_add(doc, list, &domain, result);
                vec![self.refresh()]
            }
            Response::Removed { list, domain, result } if list == self.list => {
                settle_remove(doc, list, &domain, result);
                vec![self.refresh()]
            }
            Response::Uploaded { list, result } if list == self.list => match result {
                Ok(()) => vec![self.refresh()],
                Err(e) => {
                    error!("Error uploading {list}: {e}");
                    Vec::new()
                }
            },
            Response::Downloaded { list, result } => {
                log_download(list, result);
                Vec::new()
            }
            other => {
                warn!("{} view ignoring unrelated response {other:?}", self.list);
                Vec::new()
            }
        }
    }

    fn remember_page(&mut self, page: u32) {
        self.state.set_page(page);
        if let Err(e) = self.store.save(self.list.as_str(), page) {
            warn!("Cannot remember {} page: {e}", self.list);
        }
    }
}

/// The legacy view: both lists from `/api/list`, one shared pagination bar
/// drawn from the server's page count.
pub struct GlobalController {
    state: ViewState,
    store: Box<dyn PageStore>,
}

const GLOBAL_KEY: &str = "global";

impl GlobalController {
    pub fn new(store: Box<dyn PageStore>) -> Self {
        let page = store.load(GLOBAL_KEY).unwrap_or(1);
        Self {
            state: ViewState::new(page),
            store,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    fn command(&self, request: Request) -> Command {
        Command {
            origin: ViewKind::Global,
            request,
        }
    }

    pub fn load(&mut self) -> Command {
        let page = self.store.load(GLOBAL_KEY).unwrap_or(1);
        self.state.set_page(page);
        self.fetch(page)
    }

    pub fn fetch(&mut self, page: u32) -> Command {
        let ticket: Ticket = self.state.issue();
        self.command(Request::FetchCombined {
            ticket,
            page: page.max(1),
        })
    }

    pub fn refresh(&mut self) -> Command {
        self.fetch(1)
    }

    pub fn add(&self, doc: &Document, list: ListId) -> Option<Command> {
        let domain = doc.value(&list.input_id()).trim().to_string();
        if domain.is_empty() {
            return None;
        }
        Some(self.command(Request::Add { list, domain }))
    }

    pub fn remove(&self, list: ListId, item: &str) -> Command {
        self.command(Request::Remove {
            list,
            domain: item.to_string(),
        })
    }

    pub fn upload(&self, doc: &Document, list: ListId) -> Option<Command> {
        let file = doc.selected_file(&list.upload_id())?;
        Some(self.command(Request::Upload { list, file }))
    }

    pub fn download(&self, doc: &mut Document, list: ListId) {
        doc.navigate(list.download_location());
    }

    pub fn goto_page(&mut self, doc: &Document, page: u32) -> Option<Command> {
        let clickable = doc
            .buttons(&ViewKind::Global.pagination_id())
            .iter()
            .any(|b| b.page == page && !b.disabled);
        clickable.then(|| self.fetch(page))
    }

    pub fn apply(&mut self, doc: &mut Document, response: Response) -> Vec<Command> {
        match response {
            Response::Combined {
                ticket,
                page,
                result,
            } => {
                if !self.state.is_current(ticket) {
                    debug!("Dropping stale combined response {ticket}");
                    return Vec::new();
                }
                match result {
                    Ok(data) => {
                        info!("Rendering all lists page {page}: {data}");
                        for list in ListId::ALL {
                            render_list(doc, &list.items_id(), data.items(list));
                        }
                        doc.replace_buttons(
                            &ViewKind::Global.pagination_id(),
                            page_buttons(data.total_pages, page),
                        );
                        self.state.set_page(page);
                        if let Err(e) = self.store.save(GLOBAL_KEY, page) {
                            warn!("Cannot remember global page: {e}");
                        }
                    }
                    Err(e) => error!("Error fetching lists: {e}"),
                }
                Vec::new()
            }
            Response::Added { list, domain, result } => {
                settle_add(doc, list, &domain, result);
                vec![self.refresh()]
            }
            Response::Removed { list, domain, result } => {
                settle_remove(doc, list, &domain, result);
                vec![self.refresh()]
            }
            Response::Uploaded { list, result } => match result {
                Ok(()) => vec![self.refresh()],
                Err(e) => {
                    error!("Error uploading {list}: {e}");
                    Vec::new()
                }
            },
            Response::Downloaded { list, result } => {
                log_download(list, result);
                Vec::new()
            }
            other => {
                warn!("Global view ignoring unrelated response {other:?}");
                Vec::new()
            }
        }
    }
}

// A failed add keeps the typed text so it can be retried; the refresh that
// follows still shows what the server really holds.
fn settle_add(doc: &mut Document, list: ListId, domain: &str, result: Result<(), ApiError>) {
    match result {
        Ok(()) => {
            info!("Added {domain} to {list}");
            doc.set_value(&list.input_id(), "");
            doc.set_status(&list.status_id(), None);
        }
        Err(e) => {
            error!("Error adding {domain} to {list}: {e}");
            doc.set_status(&list.status_id(), Some(format!("could not add {domain}: {e}")));
        }
    }
}

fn settle_remove(doc: &mut Document, list: ListId, domain: &str, result: Result<(), ApiError>) {
    match result {
        Ok(()) => {
            info!("Removed {domain} from {list}");
            doc.set_status(&list.status_id(), None);
        }
        Err(e) => {
            error!("Error removing {domain} from {list}: {e}");
            doc.set_status(&list.status_id(), Some(format!("could not remove {domain}: {e}")));
        }
    }
}

fn log_download(list: ListId, result: Result<std::path::PathBuf, ApiError>) {
    match result {
        Ok(path) => info!("Saved {list} to {}", path.display()),
        Err(e) => error!("Error downloading {list}: {e}"),
    }
}
