//! Run orchestration for the Stundenplan crawler.
//!
//! Ties the login handshake, the crawl engine and record output together
//! into a single workflow ([`run_crawl`]).

pub mod output;
pub mod pipeline;

pub use output::JsonLinesSink;
pub use pipeline::{ProgressReporter, RunConfig, RunResult, SilentProgress, run_crawl};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use stundenplan_crawler::VecSink;
    use stundenplan_shared::{
        Axis, CrawlConfig, Credentials, NodeKind, SessionError, StundenplanError,
    };
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn run_config(server: &MockServer) -> RunConfig {
        RunConfig {
            login_url: Url::parse(&format!("{}/stpl/login.php", server.uri())).unwrap(),
            credentials: Credentials {
                tenant: "fhin".into(),
                username: "alice".into(),
                password: "secret".into(),
            },
            crawl: CrawlConfig {
                rate_limit_ms: 0,
                ..CrawlConfig::default()
            },
        }
    }

    async fn mount_login(server: &MockServer) {
        let landing = format!(
            "{}/stpl/index.php?FH=fhin&Lang=de&User=alice&Session={TOKEN}",
            server.uri()
        );
        Mock::given(method("POST"))
            .and(path("/stpl/login.php"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", landing.as_str()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stpl/index.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(server)
            .await;
    }

    async fn mount_node(server: &MockServer, needle: &str, body: String) {
        Mock::given(method("POST"))
            .and(path("/stpl/index.php"))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn mount_application(server: &MockServer) {
        mount_login(server).await;
        mount_node(server, "mode=cbsem", load_fixture("json/semesters.json")).await;
        mount_node(server, "sem=2023W", load_fixture("html/index.html")).await;
        mount_node(server, "mode=cbstg", load_fixture("json/course.json")).await;
        mount_node(
            server,
            "mode=faecherauswahlstg",
            load_fixture("json/course-selection.json"),
        )
        .await;
        mount_node(server, "mode=faecherauswahllv", "{}".into()).await;
        mount_node(server, "mode=cbGrid", load_fixture("html/class-calendar.html")).await;
        mount_node(server, "mode=calendar", "[]".into()).await;
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
        emitted: Mutex<usize>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn record_emitted(&self, _kind: NodeKind, _id: &str, count: usize) {
            *self.emitted.lock().unwrap() = count;
        }
        fn done(&self, _result: &RunResult) {
            self.phases.lock().unwrap().push("done".into());
        }
    }

    #[tokio::test]
    async fn full_run_covers_the_tree() {
        let server = MockServer::start().await;
        mount_application(&server).await;

        let mut sink = VecSink::default();
        let progress = RecordingProgress::default();
        let result = run_crawl(&run_config(&server), &mut sink, &progress)
            .await
            .unwrap();

        assert!(result.summary.failures.is_empty(), "{:?}", result.summary.failures);
        // 1 listing, 1 index, 3 courses, 12 class nodes, 6 location nodes,
        // 1 selection, 2 class selections, 2 personal nodes
        assert_eq!(result.summary.records_emitted, 28);
        assert_eq!(sink.records.len(), 28);
        assert_eq!(result.tenant, "fhin");
        assert_eq!(result.user_id, "alice");
        assert_eq!(*progress.emitted.lock().unwrap(), 28);
        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec!["Logging in", "Crawling", "done"]
        );

        let class_data = sink
            .records
            .iter()
            .find(|r| {
                r.content_kind == NodeKind::ClassCalendarData
                    && r.context.get(Axis::Course) == Some("9")
                    && r.context.get(Axis::Class) == Some("INF3")
            })
            .expect("class calendar record");
        assert_eq!(class_data.context.get(Axis::Semester), Some("2023W"));
        assert_eq!(class_data.scope.user, None);

        // Sibling classes of one course: only the class axis (and so the id)
        // tells their records apart.
        let siblings: Vec<_> = sink
            .records
            .iter()
            .filter(|r| {
                r.content_kind == NodeKind::ClassCalendarData
                    && r.context.get(Axis::Course) == Some("9")
            })
            .collect();
        assert_eq!(siblings.len(), 2);
        let (a, b) = (siblings[0], siblings[1]);
        assert_ne!(a.context.get(Axis::Class), b.context.get(Axis::Class));
        assert_ne!(a.id, b.id);
        assert_eq!(a.context.len(), b.context.len());
        for axis in [Axis::Semester, Axis::Course, Axis::Location] {
            assert_eq!(a.context.get(axis), b.context.get(axis), "{axis}");
        }
        assert_eq!(a.scope, b.scope);
        assert_eq!(a.source_hash, b.source_hash);
        assert_eq!(a.payload, b.payload);

        let personal = sink
            .records
            .iter()
            .find(|r| r.content_kind == NodeKind::PersonalCalendarData)
            .unwrap();
        assert_eq!(personal.scope.user.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn rejected_login_sends_no_crawl_requests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stpl/login.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
            .mount(&server)
            .await;

        let mut sink = VecSink::default();
        let err = run_crawl(&run_config(&server), &mut sink, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StundenplanError::Session(SessionError::MissingField("FH"))
        ));
        assert!(sink.records.is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_semesters_widens_the_root_fanout() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_node(&server, "mode=cbsem", load_fixture("json/semesters.json")).await;
        mount_node(&server, "mode=calendar", "[]".into()).await;

        let mut config = run_config(&server);
        config.crawl.all_semesters = true;

        let mut sink = VecSink::default();
        let result = run_crawl(&config, &mut sink, &SilentProgress).await.unwrap();

        // Only the listing and the three personal calendars answer; the
        // other nine children hit the mock server's 404.
        assert_eq!(result.summary.records_emitted, 4);
        assert_eq!(result.summary.failures.len(), 9);
    }
}
