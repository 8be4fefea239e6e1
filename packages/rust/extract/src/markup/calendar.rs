//! Calendar grid pages (class, location, personal).

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde::Serialize;

use super::first_text;

static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Beschreibung:\s*(.*)$").expect("description regex"));

static ROOM_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Raumtyp:\s*(.*)$").expect("room type regex"));

const TITLE: &str = "#content_title > h2";

/// Header of a class (student group) calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCalendarDoc {
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

/// Header of a room calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCalendarDoc {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub room_type: Option<String>,
}

/// Header of the logged-in user's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalCalendarDoc {
    pub title: Option<String>,
}

pub fn extract_class_calendar(doc: &Html) -> ClassCalendarDoc {
    ClassCalendarDoc {
        title: first_text(doc, TITLE),
        subtitle: first_text(doc, "#content_subtitle > div"),
    }
}

/// The room header lists subtitle, `Beschreibung: ...` and `Raumtyp: ...`
/// as the first three children of `#content_subtitle > div`.
pub fn extract_location_calendar(doc: &Html) -> LocationCalendarDoc {
    let line = |n: usize| first_text(doc, &format!("#content_subtitle > div > div:nth-child({n})"));

    LocationCalendarDoc {
        title: first_text(doc, TITLE),
        subtitle: line(1),
        description: line(2).and_then(|text| labelled(&DESCRIPTION_RE, &text)),
        room_type: line(3).and_then(|text| labelled(&ROOM_TYPE_RE, &text)),
    }
}

pub fn extract_personal_calendar(doc: &Html) -> PersonalCalendarDoc {
    PersonalCalendarDoc {
        title: first_text(doc, TITLE),
    }
}

fn labelled(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|value| !value.is_empty())
}
