use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use log::{debug, info, warn};
use crate::modules::client::ListApi;
use crate::modules::command::{execute, Command, Outcome, Request};
use crate::modules::controller::{GlobalController, ListController};
use crate::modules::document::Document;
use crate::modules::state::{FilePageStore, MemoryPageStore, NoPageStore};
use crate::modules::types::{ListId, ViewKind};

/// Something the user did inside a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Load,
    Add(ListId),
    Remove(ListId, String),
    Upload(ListId),
    Download(ListId),
    KeyPress(ListId, String),
    Page(u32),
}

pub struct Controllers {
    pub blocklist: ListController,
    pub allowlist: ListController,
    pub global: GlobalController,
}

impl Controllers {
    /// Nothing survives a restart. The allowlist view opens on page one
    /// every time.
    pub fn in_memory() -> Self {
        Self {
            blocklist: ListController::new(ListId::Blocklist, Box::new(MemoryPageStore::default())),
            allowlist: ListController::new(ListId::Allowlist, Box::new(NoPageStore)),
            global: GlobalController::new(Box::new(MemoryPageStore::default())),
        }
    }

    /// The blocklist and global views remember their page in `state_file`;
    /// the allowlist view always opens on page one.
    pub fn with_state_file(state_file: &Path) -> Self {
        Self {
            blocklist: ListController::new(ListId::Blocklist, Box::new(FilePageStore::new(state_file))),
            allowlist: ListController::new(ListId::Allowlist, Box::new(NoPageStore)),
            global: GlobalController::new(Box::new(FilePageStore::new(state_file))),
        }
    }

    #[cfg(test)]
    pub fn list(&self, list: ListId) -> &ListController {
        match list {
            ListId::Blocklist => &self.blocklist,
            ListId::Allowlist => &self.allowlist,
        }
    }

    fn list_mut(&mut self, list: ListId) -> &mut ListController {
        match list {
            ListId::Blocklist => &mut self.blocklist,
            ListId::Allowlist => &mut self.allowlist,
        }
    }
}

/// Owns the document and the controllers, and plays the browser: it turns
/// actions into commands, runs them against the API and feeds the outcomes
/// back to the view that asked.
///
/// Only one view is open at a time. The last view acted on is the open one,
/// and fetches that finish after their view was left are not drawn.
pub struct Session {
    api: Arc<dyn ListApi>,
    document: Document,
    controllers: Controllers,
    active: ViewKind,
    download_dir: PathBuf,
}

impl Session {
    pub fn new(api: Arc<dyn ListApi>, controllers: Controllers, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            document: Document::with_list_surfaces(),
            controllers,
            active: ViewKind::List(ListId::Blocklist),
            download_dir: download_dir.into(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn controllers(&self) -> &Controllers {
        &self.controllers
    }

    pub fn act(&mut self, view: ViewKind, action: Action) -> Vec<Command> {
        if view != self.active {
            info!("Switching from {} view to {view} view", self.active);
            self.active = view;
        }
        let mut commands = match view {
            ViewKind::List(list) => self.act_on_list(list, action),
            ViewKind::Global => self.act_on_global(action),
        };
        if let Some(location) = self.document.take_location() {
            if let Some(list) = location_list(&location) {
                commands.push(Command {
                    origin: view,
                    request: Request::Download { list, location },
                });
            } else {
                warn!("Ignoring navigation to {location}");
            }
        }
        commands
    }

    fn act_on_list(&mut self, list: ListId, action: Action) -> Vec<Command> {
        if let Some(other) = action_list(&action).filter(|other| *other != list) {
            warn!("{list} view cannot act on {other}");
            return Vec::new();
        }
        let doc = &mut self.document;
        let ctl = self.controllers.list_mut(list);
        match action {
            Action::Load => vec![ctl.load()],
            Action::Add(_) => ctl.add(doc).into_iter().collect(),
            Action::Remove(_, item) => vec![ctl.remove(&item)],
            Action::Upload(_) => ctl.upload(doc).into_iter().collect(),
            Action::Download(_) => {
                ctl.download(doc);
                Vec::new()
            }
            Action::KeyPress(_, key) => ctl.key_pressed(doc, &key).into_iter().collect(),
            Action::Page(page) => ctl.goto_page(doc, page).into_iter().collect(),
        }
    }

    fn act_on_global(&mut self, action: Action) -> Vec<Command> {
        let doc = &mut self.document;
        let ctl = &mut self.controllers.global;
        match action {
            Action::Load => vec![ctl.load()],
            Action::Add(list) => ctl.add(doc, list).into_iter().collect(),
            Action::Remove(list, item) => vec![ctl.remove(list, &item)],
            Action::Upload(list) => ctl.upload(doc, list).into_iter().collect(),
            Action::Download(list) => {
                ctl.download(doc, list);
                Vec::new()
            }
            // `/api/list` has no search parameter.
            Action::KeyPress(..) => Vec::new(),
            Action::Page(page) => ctl.goto_page(doc, page).into_iter().collect(),
        }
    }

    /// Hands a finished request to its view and returns the follow-up commands.
    /// A view that is no longer open draws nothing and asks for no refresh;
    /// it fetches again when it is reopened.
    pub fn complete(&mut self, outcome: Outcome) -> Vec<Command> {
        let Outcome { origin, response } = outcome;
        let open = origin == self.active;
        if !open && response.is_fetch() {
            debug!("Dropping {origin} fetch, the {} view is open", self.active);
            return Vec::new();
        }
        let doc = &mut self.document;
        let follow = match origin {
            ViewKind::List(list) => self.controllers.list_mut(list).apply(doc, response),
            ViewKind::Global => self.controllers.global.apply(doc, response),
        };
        if open { follow } else { Vec::new() }
    }

    pub fn execute(&self, command: Command) -> Outcome {
        info!("Sending {command}");
        execute(self.api.as_ref(), command, &self.download_dir)
    }

    /// Runs commands and their follow-ups on the calling thread until none
    /// are left. Returns how many requests were made.
    pub fn run(&mut self, commands: Vec<Command>) -> usize {
        let mut queue = VecDeque::from(commands);
        let mut sent = 0;
        while let Some(command) = queue.pop_front() {
            let outcome = self.execute(command);
            sent += 1;
            queue.extend(self.complete(outcome));
        }
        sent
    }

    /// Runs `command` on a worker thread; the outcome arrives on `tx`.
    pub fn spawn<T>(&self, command: Command, tx: Sender<T>)
    where
        T: From<Outcome> + Send + 'static,
    {
        info!("Sending {command}");
        let api = Arc::clone(&self.api);
        let download_dir = self.download_dir.clone();
        thread::spawn(move || {
            let outcome = execute(api.as_ref(), command, &download_dir);
            // The receiver is gone when the front end has already quit.
            let _ = tx.send(T::from(outcome));
        });
    }
}

fn action_list(action: &Action) -> Option<ListId> {
    match action {
        Action::Add(list)
        | Action::Remove(list, _)
        | Action::Upload(list)
        | Action::Download(list)
        | Action::KeyPress(list, _) => Some(*list),
        Action::Load | Action::Page(_) => None,
    }
}

fn location_list(location: &str) -> Option<ListId> {
    let (_, query) = location.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "list")
        .and_then(|(_, value)| value.parse().ok())
}
