//! Core domain types for the crawl tree.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

/// Length every valid session token has.
pub const SESSION_TOKEN_LEN: usize = 40;

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

/// A named dimension of the crawl hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Semester,
    Course,
    Class,
    Location,
}

impl Axis {
    /// Stable lowercase name used in records and log output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Semester => "semester",
            Self::Course => "course",
            Self::Class => "class",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Position of a node in the hierarchy: an ordered, append-only path of
/// axis → identifier pairs.
///
/// A child context is always a fresh copy of its parent with one more axis, so
/// sibling branches never observe each other's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Context {
    entries: Vec<(Axis, String)>,
}

impl Context {
    /// The empty context of the crawl root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Return a copy of this context extended by `axis = value`.
    ///
    /// Each axis appears at most once along a path; the crawl tree never
    /// re-adds an axis its ancestors already set.
    pub fn with(&self, axis: Axis, value: impl Into<String>) -> Self {
        debug_assert!(self.get(axis).is_none(), "axis {axis} already set");
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.extend(self.entries.iter().cloned());
        entries.push((axis, value.into()));
        Self { entries }
    }

    /// Identifier for `axis`, if this path has one.
    pub fn get(&self, axis: Axis) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate pairs in the order they were added (root to leaf).
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &str)> {
        self.entries.iter().map(|(a, v)| (*a, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (axis, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{axis}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (axis, value) in &self.entries {
            map.serialize_entry(axis.name(), value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// SessionDescriptor
// ---------------------------------------------------------------------------

/// Validated credential bundle produced by the login handshake.
///
/// Immutable after creation and shared read-only by every branch of a crawl.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    /// Landing URL with every query parameter stripped.
    pub base_url: Url,
    /// Tenant (`FH`).
    pub tenant: String,
    /// Interface language (`Lang`).
    pub locale: String,
    /// Application user id (`User`).
    pub user_id: String,
    /// Session token (`Session`), [`SESSION_TOKEN_LEN`] characters.
    pub token: String,
}

impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("base_url", &self.base_url.as_str())
            .field("tenant", &self.tenant)
            .field("locale", &self.locale)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Endpoint kinds of the crawl tree. The tag doubles as a record's content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    SemesterList,
    IndexDocument,
    CourseData,
    ClassCalendarDoc,
    ClassCalendarData,
    LocationCalendarDoc,
    LocationCalendarData,
    CourseSelectionData,
    ClassSelectionData,
    PersonalCalendarDoc,
    PersonalCalendarData,
}

impl NodeKind {
    pub const ALL: [NodeKind; 11] = [
        Self::SemesterList,
        Self::IndexDocument,
        Self::CourseData,
        Self::ClassCalendarDoc,
        Self::ClassCalendarData,
        Self::LocationCalendarDoc,
        Self::LocationCalendarData,
        Self::CourseSelectionData,
        Self::ClassSelectionData,
        Self::PersonalCalendarDoc,
        Self::PersonalCalendarData,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SemesterList => "semesterList",
            Self::IndexDocument => "indexDocument",
            Self::CourseData => "courseData",
            Self::ClassCalendarDoc => "classCalendarDoc",
            Self::ClassCalendarData => "classCalendarData",
            Self::LocationCalendarDoc => "locationCalendarDoc",
            Self::LocationCalendarData => "locationCalendarData",
            Self::CourseSelectionData => "courseSelectionData",
            Self::ClassSelectionData => "classSelectionData",
            Self::PersonalCalendarDoc => "personalCalendarDoc",
            Self::PersonalCalendarData => "personalCalendarData",
        }
    }

    /// Endpoints whose content depends on the logged-in user rather than
    /// only on the tenant.
    pub fn is_user_scoped(self) -> bool {
        matches!(
            self,
            Self::CourseSelectionData | Self::PersonalCalendarDoc | Self::PersonalCalendarData
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Extracted content of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Decoded structured data or an extracted markup tree.
    Tree(serde_json::Value),
    /// Raw document text.
    Text(String),
}

/// Who a record belongs to beyond its hierarchy position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordScope {
    pub tenant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A tagged, context-stamped unit of extracted output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// `<contentKind>(<context>)`, unique per node of one run.
    pub id: String,
    pub content_kind: NodeKind,
    pub context: Context,
    pub scope: RecordScope,
    /// SHA-256 of the response body the record was extracted from.
    pub source_hash: String,
    pub payload: Payload,
}

impl Record {
    pub fn new(
        content_kind: NodeKind,
        context: Context,
        scope: RecordScope,
        source_hash: String,
        payload: Payload,
    ) -> Self {
        Self {
            id: node_id(content_kind, &context),
            content_kind,
            context,
            scope,
            source_hash,
            payload,
        }
    }
}

/// Human-readable node identifier, e.g. `courseData(semester=2023W,course=7)`.
pub fn node_id(kind: NodeKind, context: &Context) -> String {
    format!("{kind}({context})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_with_copies_parent() {
        let parent = Context::root().with(Axis::Semester, "2023W");
        let a = parent.with(Axis::Course, "1");
        let b = parent.with(Axis::Course, "2");

        assert_eq!(parent.len(), 1);
        assert_eq!(parent.get(Axis::Course), None);
        assert_eq!(a.get(Axis::Course), Some("1"));
        assert_eq!(b.get(Axis::Course), Some("2"));
        assert_eq!(a.get(Axis::Semester), b.get(Axis::Semester));
        assert_ne!(a, b);
    }

    #[test]
    fn context_serializes_in_path_order() {
        let ctx = Context::root()
            .with(Axis::Semester, "2023W")
            .with(Axis::Location, "R1.07");
        let json = serde_json::to_string(&ctx).expect("serialize");
        assert_eq!(json, r#"{"semester":"2023W","location":"R1.07"}"#);
        assert_eq!(ctx.to_string(), "semester=2023W,location=R1.07");
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = SessionDescriptor {
            base_url: Url::parse("https://app.example.com/stpl/index.php").unwrap(),
            tenant: "fhin".into(),
            locale: "de".into(),
            user_id: "alice".into(),
            token: "x".repeat(SESSION_TOKEN_LEN),
        };
        let debug = format!("{session:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&"x".repeat(SESSION_TOKEN_LEN)));
    }

    #[test]
    fn record_serialization_shape() {
        let record = Record::new(
            NodeKind::PersonalCalendarData,
            Context::root().with(Axis::Semester, "2023W"),
            RecordScope {
                tenant: "fhin".into(),
                user: Some("alice".into()),
            },
            "abc".into(),
            Payload::Tree(serde_json::json!([])),
        );
        assert_eq!(record.id, "personalCalendarData(semester=2023W)");

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["contentKind"], "personalCalendarData");
        assert_eq!(value["context"]["semester"], "2023W");
        assert_eq!(value["scope"]["user"], "alice");
        assert_eq!(value["payload"], serde_json::json!([]));
    }

    #[test]
    fn node_kind_names_match_serde() {
        for kind in NodeKind::ALL {
            let json = serde_json::to_value(kind).expect("serialize");
            assert_eq!(json, kind.name());
        }
    }
}
