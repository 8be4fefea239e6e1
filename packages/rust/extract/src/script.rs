//! Named extraction rules over inline script text.
//!
//! The index page configures its client-side calendar through JavaScript
//! assignments (`Semesteranfang = '...';`, `stundenraster[3] = [...]`).
//! Each rule either yields a value or `None`; a missing assignment is never
//! an error because tenants omit some of them.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

static INDEX_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bindexLink\s*=\s*'([^']*)'\s*;").expect("indexLink regex"));

static FRONTEND_DIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfrontendDir\s*=\s*'([^']*)'\s*;").expect("frontendDir regex")
});

static STPL_INDEX_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"STPL\.IndexLink\s*=\s*'([^']*)'\s*;").expect("STPL.IndexLink regex")
});

static LECTURE_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Vorlesungsanfang\s*=\s*'([^']*)'\s*;").expect("Vorlesungsanfang regex")
});

static LECTURE_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Vorlesungsende\s*=\s*'([^']*)'\s*;").expect("Vorlesungsende regex")
});

static SEMESTER_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Semesteranfang\s*=\s*'([^']*)'\s*;").expect("Semesteranfang regex")
});

static SEMESTER_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Semesterende\s*=\s*'([^']*)'\s*;").expect("Semesterende regex")
});

/// Matches `stundenraster[N] = ['08.15', '09.45', '1'];`.
static TIME_SLOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"stundenraster\[\d+\]\s*=\s*\[\s*'(?P<starts>\d{2}.\d{2})'\s*,\s*'(?P<ends>\d{2}.\d{2})'\s*,\s*'(?P<slot>\d+)'\s*\]\s*;",
    )
    .expect("stundenraster regex")
});

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A single-valued script variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptVar {
    IndexLink,
    FrontendDir,
    StplIndexLink,
    LectureStart,
    LectureEnd,
    SemesterStart,
    SemesterEnd,
}

impl ScriptVar {
    pub const ALL: [ScriptVar; 7] = [
        Self::IndexLink,
        Self::FrontendDir,
        Self::StplIndexLink,
        Self::LectureStart,
        Self::LectureEnd,
        Self::SemesterStart,
        Self::SemesterEnd,
    ];

    /// Output field name.
    pub fn field(self) -> &'static str {
        match self {
            Self::IndexLink => "indexLink",
            Self::FrontendDir => "frontendDir",
            Self::StplIndexLink => "stplIndexLink",
            Self::LectureStart => "lectureStart",
            Self::LectureEnd => "lectureEnd",
            Self::SemesterStart => "semesterStart",
            Self::SemesterEnd => "semesterEnd",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::IndexLink => &*INDEX_LINK_RE,
            Self::FrontendDir => &*FRONTEND_DIR_RE,
            Self::StplIndexLink => &*STPL_INDEX_LINK_RE,
            Self::LectureStart => &*LECTURE_START_RE,
            Self::LectureEnd => &*LECTURE_END_RE,
            Self::SemesterStart => &*SEMESTER_START_RE,
            Self::SemesterEnd => &*SEMESTER_END_RE,
        }
    }

    /// First assignment of this variable in `script`.
    pub fn extract(self, script: &str) -> Option<String> {
        self.pattern()
            .captures(script)
            .map(|caps| caps[1].to_string())
    }
}

/// One row of the lecture time grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub slot: u32,
    pub starts: String,
    pub ends: String,
}

/// Every `stundenraster` row in `script`, in source order.
pub fn time_slots(script: &str) -> Vec<TimeSlot> {
    TIME_SLOT_RE
        .captures_iter(script)
        .filter_map(|caps| {
            Some(TimeSlot {
                slot: caps["slot"].parse().ok()?,
                starts: caps["starts"].to_string(),
                ends: caps["ends"].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
        var indexLink = 'index.php?FH=fhin';
        var frontendDir = '/stpl/frontend';
        STPL.IndexLink = 'https://www3.example.com/stpl/index.php';
        STPL.Vorlesungsanfang = '02.10.2023';
        STPL.Vorlesungsende = '02.02.2024';
        STPL.Semesteranfang = '01.10.2023';
        STPL.Semesterende = '15.03.2024';
        stundenraster[0] = ['08.15', '09.45', '1'];
        stundenraster[1] = ['10.00', '11.30', '2'];
        stundenraster[2] = ['broken'];
    "#;

    #[test]
    fn test_each_variable() {
        assert_eq!(
            ScriptVar::IndexLink.extract(SCRIPT).as_deref(),
            Some("index.php?FH=fhin")
        );
        assert_eq!(
            ScriptVar::FrontendDir.extract(SCRIPT).as_deref(),
            Some("/stpl/frontend")
        );
        assert_eq!(
            ScriptVar::StplIndexLink.extract(SCRIPT).as_deref(),
            Some("https://www3.example.com/stpl/index.php")
        );
        assert_eq!(ScriptVar::LectureStart.extract(SCRIPT).as_deref(), Some("02.10.2023"));
        assert_eq!(ScriptVar::LectureEnd.extract(SCRIPT).as_deref(), Some("02.02.2024"));
        assert_eq!(ScriptVar::SemesterStart.extract(SCRIPT).as_deref(), Some("01.10.2023"));
        assert_eq!(ScriptVar::SemesterEnd.extract(SCRIPT).as_deref(), Some("15.03.2024"));
    }

    #[test]
    fn test_missing_variable_is_none() {
        for var in ScriptVar::ALL {
            assert_eq!(var.extract("var unrelated = 1;"), None, "{}", var.field());
        }
    }

    #[test]
    fn test_time_slots_skip_malformed_rows() {
        let slots = time_slots(SCRIPT);
        assert_eq!(
            slots,
            vec![
                TimeSlot {
                    slot: 1,
                    starts: "08.15".into(),
                    ends: "09.45".into()
                },
                TimeSlot {
                    slot: 2,
                    starts: "10.00".into(),
                    ends: "11.30".into()
                },
            ]
        );
    }
}
