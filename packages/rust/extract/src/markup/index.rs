//! The semester index page.

use scraper::Html;
use serde::Serialize;

use super::{ROOM_SELECT, SelectOption, first_text, head_scripts, select_options};
use crate::script::{ScriptVar, TimeSlot, time_slots};

/// Normalized content of the index page of one semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    pub title: Option<String>,
    pub index_link: Option<String>,
    pub frontend_dir: Option<String>,
    pub stpl_index_link: Option<String>,
    pub lecture_start: Option<String>,
    pub lecture_end: Option<String>,
    pub semester_start: Option<String>,
    pub semester_end: Option<String>,
    pub time_slots: Vec<TimeSlot>,
    pub rooms: Vec<SelectOption>,
}

/// Extract the index page: document title, script-configured dates and
/// links, the time grid and the selectable rooms.
pub fn extract_index(doc: &Html) -> IndexDocument {
    let script = head_scripts(doc);

    IndexDocument {
        title: first_text(doc, "head > title"),
        index_link: ScriptVar::IndexLink.extract(&script),
        frontend_dir: ScriptVar::FrontendDir.extract(&script),
        stpl_index_link: ScriptVar::StplIndexLink.extract(&script),
        lecture_start: ScriptVar::LectureStart.extract(&script),
        lecture_end: ScriptVar::LectureEnd.extract(&script),
        semester_start: ScriptVar::SemesterStart.extract(&script),
        semester_end: ScriptVar::SemesterEnd.extract(&script),
        time_slots: time_slots(&script),
        rooms: select_options(doc, ROOM_SELECT),
    }
}
