//! Document extractors for myStundenplan responses.
//!
//! This crate provides:
//! - [`json`]: decoding and field-path queries over structured-data payloads
//! - [`markup`]: selector-based extractors for the HTML pages
//! - [`script`]: named regex rules over inline script variables
//!
//! Every extractor is a pure function of its input.

pub mod json;
pub mod markup;
pub mod script;

pub use json::{Semester, collect_field, collect_ids, decode, identifier, lookup, semesters};
pub use markup::{
    COURSE_SELECT, ClassCalendarDoc, IndexDocument, LocationCalendarDoc, PersonalCalendarDoc,
    ROOM_SELECT, SelectOption, extract_class_calendar, extract_index, extract_location_calendar,
    extract_personal_calendar, option_ids, parse_document, select_options,
};
pub use script::{ScriptVar, TimeSlot, time_slots};
