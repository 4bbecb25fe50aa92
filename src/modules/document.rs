use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use derive_more::with_trait::Display;
use crate::modules::types::ListId;

/// One rendered list entry. `item` is the value its removal control is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{text} [×]")]
pub struct Row {
    pub text: String,
    pub item: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageButton {
    pub page: u32,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    List(Vec<Row>),
    Pagination(Vec<PageButton>),
    Input(String),
    FileInput(Option<PathBuf>),
    Status(Option<String>),
}

/// In-process stand-in for the page the controllers draw into: elements are
/// addressed by id, plus a location that is set when the user is sent
/// somewhere else (downloads).
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: BTreeMap<String, Element>,
    location: Option<String>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document carrying every element the list and global views use.
    pub fn with_list_surfaces() -> Self {
        let mut doc = Self::new();
        for list in ListId::ALL {
            doc.elements.insert(list.items_id(), Element::List(Vec::new()));
            doc.elements.insert(list.pagination_id(), Element::Pagination(Vec::new()));
            doc.elements.insert(list.input_id(), Element::Input(String::new()));
            doc.elements.insert(list.search_id(), Element::Input(String::new()));
            doc.elements.insert(list.upload_id(), Element::FileInput(None));
            doc.elements.insert(list.status_id(), Element::Status(None));
        }
        doc.elements
            .insert("globalPagination".to_string(), Element::Pagination(Vec::new()));
        doc
    }

    #[cfg(test)]
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Current text of an input; empty when the input does not exist.
    pub fn value(&self, id: &str) -> String {
        match self.elements.get(id) {
            Some(Element::Input(value)) => value.clone(),
            _ => String::new(),
        }
    }

    pub fn set_value(&mut self, id: &str, value: impl Into<String>) {
        self.elements.insert(id.to_string(), Element::Input(value.into()));
    }

    pub fn selected_file(&self, id: &str) -> Option<PathBuf> {
        match self.elements.get(id) {
            Some(Element::FileInput(file)) => file.clone(),
            _ => None,
        }
    }

    pub fn select_file(&mut self, id: &str, file: Option<&Path>) {
        self.elements
            .insert(id.to_string(), Element::FileInput(file.map(Path::to_path_buf)));
    }

    pub fn rows(&self, id: &str) -> &[Row] {
        match self.elements.get(id) {
            Some(Element::List(rows)) => rows,
            _ => &[],
        }
    }

    pub fn replace_rows(&mut self, id: &str, rows: Vec<Row>) {
        self.elements.insert(id.to_string(), Element::List(rows));
    }

    /// The value bound to the removal control of the row showing `text`.
    pub fn remove_control(&self, id: &str, text: &str) -> Option<&str> {
        self.rows(id)
            .iter()
            .find(|row| row.text == text)
            .map(|row| row.item.as_str())
    }

    pub fn buttons(&self, id: &str) -> &[PageButton] {
        match self.elements.get(id) {
            Some(Element::Pagination(buttons)) => buttons,
            _ => &[],
        }
    }

    pub fn replace_buttons(&mut self, id: &str, buttons: Vec<PageButton>) {
        self.elements.insert(id.to_string(), Element::Pagination(buttons));
    }

    pub fn status(&self, id: &str) -> Option<&str> {
        match self.elements.get(id) {
            Some(Element::Status(message)) => message.as_deref(),
            _ => None,
        }
    }

    pub fn set_status(&mut self, id: &str, message: Option<String>) {
        self.elements.insert(id.to_string(), Element::Status(message));
    }

    pub fn navigate(&mut self, location: impl Into<String>) {
        self.location = Some(location.into());
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn take_location(&mut self) -> Option<String> {
        self.location.take()
    }

    /// Plain-text picture of one list as the terminal shows it.
    pub fn outline(&self, list: ListId, pagination_id: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {list} ==");

        let rows = self.rows(&list.items_id());
        if rows.is_empty() {
            let _ = writeln!(out, "  (empty)");
        }
        for row in rows {
            let _ = writeln!(out, "  {row}");
        }

        let buttons = self.buttons(pagination_id);
        if !buttons.is_empty() {
            let pages: Vec<String> = buttons
                .iter()
                .map(|b| {
                    if b.disabled {
                        format!("[{}]", b.page)
                    } else {
                        b.page.to_string()
                    }
                })
                .collect();
            let _ = writeln!(out, "  pages: {}", pages.join(" "));
        }

        if let Some(message) = self.status(&list.status_id()) {
            let _ = writeln!(out, "  ! {message}");
        }
        out
    }
}
