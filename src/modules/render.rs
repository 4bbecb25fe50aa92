use crate::modules::document::{Document, PageButton, Row};
use crate::modules::types::page_count;

/// Most buttons a bar will hold; 500 000 items at 50 per page.
pub const MAX_PAGE_BUTTONS: u32 = 10_000;

/// Replaces everything in `container` with one row per item.
pub fn render_list(doc: &mut Document, container: &str, items: &[String]) {
    let rows = items
        .iter()
        .map(|item| Row {
            text: item.clone(),
            item: item.clone(),
        })
        .collect();
    doc.replace_rows(container, rows);
}

/// Buttons for pages `1..=pages`, at most [`MAX_PAGE_BUTTONS`]; the current
/// one is disabled.
pub fn page_buttons(pages: u64, current_page: u32) -> Vec<PageButton> {
    let shown = u32::try_from(pages).unwrap_or(u32::MAX).min(MAX_PAGE_BUTTONS);
    if u64::from(shown) < pages {
        log::warn!("Server reported {pages} pages, showing the first {shown}");
    }
    (1..=shown)
        .map(|page| PageButton {
            page,
            disabled: page == current_page,
        })
        .collect()
}

pub fn render_pagination(doc: &mut Document, container: &str, total_count: u64, current_page: u32) {
    doc.replace_buttons(container, page_buttons(page_count(total_count), current_page));
}
