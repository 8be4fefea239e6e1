//! Markup document extractors.
//!
//! Elements are located by id-scoped containers and positional children.
//! A locator that matches nothing yields `None` for that field; the rest of
//! the document is still extracted.

mod calendar;
mod index;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

pub use calendar::{
    ClassCalendarDoc, LocationCalendarDoc, PersonalCalendarDoc, extract_class_calendar,
    extract_location_calendar, extract_personal_calendar,
};
pub use index::{IndexDocument, extract_index};

/// Id of the course `<select>` on the index page.
pub const COURSE_SELECT: &str = "cbstg";

/// Id of the room `<select>` on the index page.
pub const ROOM_SELECT: &str = "cbraum";

/// Parse a markup response body.
pub fn parse_document(body: &str) -> Html {
    Html::parse_document(body)
}

/// An entry of a `<select>` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub id: String,
    pub title: Option<String>,
    pub name: Option<String>,
}

/// Options of `<select id="{select_id}">`, without the leading "no selection"
/// placeholder. Options without a `value` are skipped.
pub fn select_options(doc: &Html, select_id: &str) -> Vec<SelectOption> {
    let Ok(sel) = Selector::parse(&format!("#{select_id} > option")) else {
        return Vec::new();
    };

    doc.select(&sel)
        .skip(1)
        .filter_map(|el| {
            let id = el.value().attr("value")?.trim();
            if id.is_empty() {
                return None;
            }
            Some(SelectOption {
                id: id.to_string(),
                title: el.value().attr("title").map(str::to_string),
                name: own_text(&el),
            })
        })
        .collect()
}

/// Option values of `<select id="{select_id}">`, placeholder skipped.
pub fn option_ids(doc: &Html, select_id: &str) -> Vec<String> {
    select_options(doc, select_id)
        .into_iter()
        .map(|opt| opt.id)
        .collect()
}

/// First own (non-descendant) non-blank text node of an element, trimmed.
pub(crate) fn own_text(el: &ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Own text of the first element matching `css`.
pub(crate) fn first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    doc.select(&sel).next().and_then(|el| own_text(&el))
}

/// Concatenated text of all inline scripts in `<head>`.
pub(crate) fn head_scripts(doc: &Html) -> String {
    let sel = Selector::parse("head > script").unwrap();
    doc.select(&sel)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
