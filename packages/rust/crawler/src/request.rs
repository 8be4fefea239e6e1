//! Context-propagating request builder.
//!
//! Every endpoint is one POST to the session's base URL; endpoints differ only
//! in which fixed and axis-derived parameters go into the query string and the
//! form body. [`build`] then stamps the session onto the request.

use std::collections::BTreeMap;

use url::Url;

use stundenplan_shared::{
    Axis, Context, NodeKind, Result, SessionDescriptor, StundenplanError, node_id,
};

// ---------------------------------------------------------------------------
// Endpoint table
// ---------------------------------------------------------------------------

/// How a response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Structured data (JSON).
    Json,
    /// HTML document.
    Markup,
}

/// A request parameter of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Constant `name=value`.
    Fixed(&'static str, &'static str),
    /// `name=<context value of axis>`.
    Axis(&'static str, Axis),
}

/// Wire description of one node kind.
#[derive(Debug)]
pub struct Endpoint {
    pub kind: NodeKind,
    pub format: Format,
    pub query: &'static [Param],
    pub form: &'static [Param],
}

use Param::{Axis as A, Fixed as F};

const SEM: Param = A("sem", Axis::Semester);
const LIST: Param = F("method", "list");
const GRID: Param = F("mode", "cbGrid");
const CALENDAR: Param = F("mode", "calendar");

static ENDPOINTS: [Endpoint; 11] = [
    Endpoint {
        kind: NodeKind::SemesterList,
        format: Format::Json,
        query: &[],
        form: &[F("mode", "cbsem")],
    },
    Endpoint {
        kind: NodeKind::IndexDocument,
        format: Format::Markup,
        query: &[],
        form: &[SEM],
    },
    Endpoint {
        kind: NodeKind::CourseData,
        format: Format::Json,
        query: &[SEM],
        form: &[F("mode", "cbstg"), A("stg", Axis::Course)],
    },
    Endpoint {
        kind: NodeKind::ClassCalendarDoc,
        format: Format::Markup,
        query: &[SEM, A("stgru", Axis::Class)],
        form: &[GRID],
    },
    Endpoint {
        kind: NodeKind::ClassCalendarData,
        format: Format::Json,
        query: &[SEM, LIST],
        form: &[CALENDAR, A("stgru", Axis::Class)],
    },
    Endpoint {
        kind: NodeKind::LocationCalendarDoc,
        format: Format::Markup,
        query: &[SEM, A("raum", Axis::Location)],
        form: &[GRID],
    },
    Endpoint {
        kind: NodeKind::LocationCalendarData,
        format: Format::Json,
        query: &[SEM, LIST],
        form: &[CALENDAR, A("raum", Axis::Location)],
    },
    Endpoint {
        kind: NodeKind::CourseSelectionData,
        format: Format::Json,
        query: &[SEM],
        form: &[F("mode", "faecherauswahlstg")],
    },
    Endpoint {
        kind: NodeKind::ClassSelectionData,
        format: Format::Json,
        query: &[SEM],
        form: &[
            F("mode", "faecherauswahllv"),
            A("faecherauswahlstgru", Axis::Class),
        ],
    },
    Endpoint {
        kind: NodeKind::PersonalCalendarDoc,
        format: Format::Markup,
        query: &[SEM],
        form: &[GRID],
    },
    Endpoint {
        kind: NodeKind::PersonalCalendarData,
        format: Format::Json,
        query: &[SEM, LIST],
        form: &[CALENDAR],
    },
];

/// Wire description of `kind`.
pub fn endpoint(kind: NodeKind) -> &'static Endpoint {
    // ENDPOINTS is in declaration order of NodeKind
    &ENDPOINTS[kind as usize]
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A fully parameterized, self-authenticating form POST for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    pub kind: NodeKind,
    pub context: Context,
    /// Base URL with the merged query string.
    pub url: Url,
    pub form: BTreeMap<String, String>,
}

impl CrawlRequest {
    /// Node identifier used in logs and records.
    pub fn id(&self) -> String {
        node_id(self.kind, &self.context)
    }
}

/// Merge session state, caller parameters and context into a request.
///
/// The query string of `session.base_url` is replaced by `extra_query` plus
/// `FH`; the form is `extra_form` plus `User` and `Session`. Session values
/// always win over caller values with the same key.
pub fn build(
    session: &SessionDescriptor,
    kind: NodeKind,
    context: &Context,
    extra_query: BTreeMap<String, String>,
    extra_form: BTreeMap<String, String>,
) -> CrawlRequest {
    let mut query = extra_query;
    query.insert("FH".into(), session.tenant.clone());

    let mut url = session.base_url.clone();
    url.set_query(None);
    url.query_pairs_mut().extend_pairs(&query);

    let mut form = extra_form;
    form.insert("User".into(), session.user_id.clone());
    form.insert("Session".into(), session.token.clone());

    CrawlRequest {
        kind,
        context: context.clone(),
        url,
        form,
    }
}

/// Build the request for node `kind` at position `context`.
pub fn request_for(
    session: &SessionDescriptor,
    kind: NodeKind,
    context: &Context,
) -> Result<CrawlRequest> {
    let ep = endpoint(kind);
    let query = resolve(ep.query, kind, context)?;
    let form = resolve(ep.form, kind, context)?;
    Ok(build(session, kind, context, query, form))
}

fn resolve(
    params: &[Param],
    kind: NodeKind,
    context: &Context,
) -> Result<BTreeMap<String, String>> {
    params
        .iter()
        .map(|param| match *param {
            Param::Fixed(name, value) => Ok((name.to_string(), value.to_string())),
            Param::Axis(name, axis) => context
                .get(axis)
                .map(|value| (name.to_string(), value.to_string()))
                .ok_or_else(|| {
                    StundenplanError::validation(format!(
                        "{kind} needs a {axis} in its context, got ({context})"
                    ))
                }),
        })
        .collect()
}
