//! The crawl tree: which node kinds fan out into which children, and the
//! per-node visit step.
//!
//! A visit is a pure function of the request and the response body. It either
//! yields one record plus the child requests, or an error, in which case the
//! node contributes nothing and its subtree is skipped.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::Html;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use stundenplan_extract as extract;
use stundenplan_shared::{
    Axis, Context, CrawlConfig, MarkupPayload, NodeKind, Payload, Record, RecordScope, Result,
    SessionDescriptor, StundenplanError,
};

use crate::request::{CrawlRequest, Format, endpoint, request_for};

// ---------------------------------------------------------------------------
// Tree table
// ---------------------------------------------------------------------------

/// Where a fan-out takes its child identifiers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// Entries of the semester listing admitted by the [`SemesterPolicy`].
    Semesters,
    /// Option values of a `<select>`, placeholder skipped.
    Options(&'static str),
    /// Values of `field` exactly `depth` object levels deep.
    Collect { field: &'static str, depth: usize },
}

/// One child axis of a node kind.
#[derive(Debug)]
pub struct Fanout {
    pub axis: Axis,
    pub source: IdSource,
    /// Requested once per identifier, in this order.
    pub children: &'static [NodeKind],
}

const SEMESTER_CHILDREN: &[Fanout] = &[Fanout {
    axis: Axis::Semester,
    source: IdSource::Semesters,
    children: &[
        NodeKind::IndexDocument,
        NodeKind::CourseSelectionData,
        NodeKind::PersonalCalendarDoc,
        NodeKind::PersonalCalendarData,
    ],
}];

const INDEX_CHILDREN: &[Fanout] = &[
    Fanout {
        axis: Axis::Course,
        source: IdSource::Options(extract::COURSE_SELECT),
        children: &[NodeKind::CourseData],
    },
    Fanout {
        axis: Axis::Location,
        source: IdSource::Options(extract::ROOM_SELECT),
        children: &[NodeKind::LocationCalendarDoc, NodeKind::LocationCalendarData],
    },
];

const COURSE_CHILDREN: &[Fanout] = &[Fanout {
    axis: Axis::Class,
    source: IdSource::Collect {
        field: "studiengruppen_id",
        depth: 1,
    },
    children: &[NodeKind::ClassCalendarDoc, NodeKind::ClassCalendarData],
}];

const SELECTION_CHILDREN: &[Fanout] = &[Fanout {
    axis: Axis::Class,
    source: IdSource::Collect {
        field: "studiengruppen_id",
        depth: 6,
    },
    children: &[NodeKind::ClassSelectionData],
}];

/// Child axes of `kind`. Empty for terminal kinds.
pub fn fanouts(kind: NodeKind) -> &'static [Fanout] {
    match kind {
        NodeKind::SemesterList => SEMESTER_CHILDREN,
        NodeKind::IndexDocument => INDEX_CHILDREN,
        NodeKind::CourseData => COURSE_CHILDREN,
        NodeKind::CourseSelectionData => SELECTION_CHILDREN,
        _ => &[],
    }
}

/// Which semesters of the listing are crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemesterPolicy {
    /// Only the semester flagged as current.
    #[default]
    Current,
    /// Every listed semester.
    All,
}

impl SemesterPolicy {
    fn admits(self, semester: &extract::Semester) -> bool {
        match self {
            Self::Current => semester.is_current,
            Self::All => true,
        }
    }
}

impl From<bool> for SemesterPolicy {
    fn from(all_semesters: bool) -> Self {
        if all_semesters { Self::All } else { Self::Current }
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Output of a successful visit.
#[derive(Debug, Clone)]
pub struct Visit {
    pub record: Record,
    pub children: Vec<CrawlRequest>,
}

enum Document {
    Json(Value),
    Markup(Html),
}

/// Crawl-tree state machine bound to one session.
#[derive(Debug, Clone)]
pub struct Traversal {
    session: Arc<SessionDescriptor>,
    policy: SemesterPolicy,
    markup_payload: MarkupPayload,
}

impl Traversal {
    pub fn new(session: Arc<SessionDescriptor>, config: &CrawlConfig) -> Self {
        Self {
            session,
            policy: SemesterPolicy::from(config.all_semesters),
            markup_payload: config.markup_payload,
        }
    }

    pub fn with_policy(mut self, policy: SemesterPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session(&self) -> &SessionDescriptor {
        &self.session
    }

    /// The semester listing request every crawl starts from.
    pub fn root(&self) -> Result<CrawlRequest> {
        request_for(&self.session, NodeKind::SemesterList, &Context::root())
    }

    /// Process the response body of `request`.
    pub fn visit(&self, request: &CrawlRequest, body: &str) -> Result<Visit> {
        let kind = request.kind;
        let doc = match endpoint(kind).format {
            Format::Json => Document::Json(extract::decode(body)?),
            Format::Markup => Document::Markup(extract::parse_document(body)),
        };

        let mut children = Vec::new();
        for fanout in fanouts(kind) {
            let ids = dedupe(self.child_ids(fanout.source, &doc)?);
            info!(
                node = %request.id(),
                axis = %fanout.axis,
                count = ids.len(),
                "selected child identifiers"
            );
            for id in ids {
                let context = request.context.with(fanout.axis, id);
                for child in fanout.children {
                    children.push(request_for(&self.session, *child, &context)?);
                }
            }
        }

        let payload = match (doc, self.markup_payload) {
            (Document::Json(value), _) => Payload::Tree(value),
            (Document::Markup(_), MarkupPayload::Raw) => Payload::Text(body.to_string()),
            (Document::Markup(html), MarkupPayload::Extracted) => {
                Payload::Tree(extract_markup(kind, &html)?)
            }
        };

        let scope = RecordScope {
            tenant: self.session.tenant.clone(),
            user: kind
                .is_user_scoped()
                .then(|| self.session.user_id.clone()),
        };
        let record = Record::new(
            kind,
            request.context.clone(),
            scope,
            compute_hash(body),
            payload,
        );

        info!(node = %record.id, children = children.len(), "processed");
        Ok(Visit { record, children })
    }

    fn child_ids(&self, source: IdSource, doc: &Document) -> Result<Vec<String>> {
        match (source, doc) {
            (IdSource::Semesters, Document::Json(value)) => Ok(extract::semesters(value)?
                .into_iter()
                .filter(|s| self.policy.admits(s))
                .map(|s| s.id)
                .collect()),
            (IdSource::Options(select_id), Document::Markup(html)) => {
                Ok(extract::option_ids(html, select_id))
            }
            (IdSource::Collect { field, depth }, Document::Json(value)) => {
                extract::collect_ids(value, field, depth)
            }
            (source, _) => Err(StundenplanError::validation(format!(
                "{source:?} does not apply to this document format"
            ))),
        }
    }
}

/// Extracted tree of a markup node.
fn extract_markup(kind: NodeKind, html: &Html) -> Result<Value> {
    let value = match kind {
        NodeKind::IndexDocument => serde_json::to_value(extract::extract_index(html)),
        NodeKind::ClassCalendarDoc => serde_json::to_value(extract::extract_class_calendar(html)),
        NodeKind::LocationCalendarDoc => {
            serde_json::to_value(extract::extract_location_calendar(html))
        }
        NodeKind::PersonalCalendarDoc => {
            serde_json::to_value(extract::extract_personal_calendar(html))
        }
        other => {
            return Err(StundenplanError::validation(format!(
                "{other} is not a markup document"
            )));
        }
    };
    value.map_err(|e| StundenplanError::Output(format!("{kind}: {e}")))
}

/// Drop repeated identifiers, keeping the first occurrence.
fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// SHA-256 of a response body, hex encoded.
pub fn compute_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}
