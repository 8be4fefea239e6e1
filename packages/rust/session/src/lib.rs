//! Login handshake for the myStundenplan application.
//!
//! The login form answers with a redirect to a landing page whose query string
//! carries the session (`FH`, `Lang`, `User`, `Session`). We validate those
//! fields and turn them into an immutable [`SessionDescriptor`] that every
//! later request is built from. A failed handshake is never retried.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use stundenplan_shared::{
    CrawlConfig, Credentials, Result, SESSION_TOKEN_LEN, SessionDescriptor, SessionError,
    StundenplanError,
};

/// Maximum number of redirects to follow for any request.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("stundenplan-crawler/", env!("CARGO_PKG_VERSION"));

/// Query fields the landing URL must carry, in validation order.
const SESSION_FIELDS: [&str; 4] = ["FH", "Lang", "User", "Session"];

/// Build the HTTP client shared by the handshake and the crawl.
pub fn build_client(config: &CrawlConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| StundenplanError::Network(format!("failed to build HTTP client: {e}")))
}

/// Log in and return the validated session.
///
/// Submits `{user, pwd, mode=login, FH}` to `login_url`, follows the redirect
/// and validates the landing URL with [`session_from_landing`].
#[instrument(skip_all, fields(login_url = %login_url, tenant = %credentials.tenant))]
pub async fn authenticate(
    client: &Client,
    login_url: &Url,
    credentials: &Credentials,
) -> Result<SessionDescriptor> {
    debug!(username = %credentials.username, "attempting login");

    let form = [
        ("user", credentials.username.as_str()),
        ("pwd", credentials.password.as_str()),
        ("mode", "login"),
        ("FH", credentials.tenant.as_str()),
    ];

    let response = client
        .post(login_url.as_str())
        .form(&form)
        .send()
        .await
        .map_err(|e| StundenplanError::Network(format!("{login_url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StundenplanError::Network(format!(
            "{login_url}: HTTP {status}"
        )));
    }

    let session = session_from_landing(login_url, response.url())?;
    info!(session = ?session, "stored session");
    Ok(session)
}

/// Validate a landing URL and build the session descriptor from it.
///
/// Checks, in order: all four session fields are present and non-empty,
/// the landing page is not the login page, and the token has
/// [`SESSION_TOKEN_LEN`] characters.
pub fn session_from_landing(
    login_url: &Url,
    landing_url: &Url,
) -> std::result::Result<SessionDescriptor, SessionError> {
    let mut values = SESSION_FIELDS.map(|_| None::<String>);
    for (key, value) in landing_url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        if let Some(idx) = SESSION_FIELDS.iter().position(|f| *f == key) {
            // first occurrence wins
            if values[idx].is_none() {
                values[idx] = Some(value.into_owned());
            }
        }
    }

    let [tenant, locale, user_id, token] = values;
    let tenant = tenant.ok_or(SessionError::MissingField("FH"))?;
    let locale = locale.ok_or(SessionError::MissingField("Lang"))?;
    let user_id = user_id.ok_or(SessionError::MissingField("User"))?;
    let token = token.ok_or(SessionError::MissingField("Session"))?;

    let base_url = strip_query(landing_url);
    if base_url == strip_query(login_url) {
        return Err(SessionError::LoginRejected(base_url.to_string()));
    }

    let actual = token.chars().count();
    if actual != SESSION_TOKEN_LEN {
        return Err(SessionError::InvalidToken {
            expected: SESSION_TOKEN_LEN,
            actual,
        });
    }

    Ok(SessionDescriptor {
        base_url,
        tenant,
        locale,
        user_id,
        token,
    })
}

/// Copy of `url` without query string or fragment.
pub fn strip_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef01234567";

    fn login() -> Url {
        Url::parse("https://www3.example.com/stpl/login.php").unwrap()
    }

    fn landing(query: &str) -> Url {
        Url::parse(&format!("https://www3.example.com/stpl/index.php?{query}")).unwrap()
    }

    fn full_query() -> String {
        format!("FH=fhin&Lang=de&User=alice&Session={TOKEN}")
    }

    #[test]
    fn test_valid_landing_strips_query() {
        let session = session_from_landing(&login(), &landing(&full_query())).unwrap();
        assert_eq!(
            session.base_url.as_str(),
            "https://www3.example.com/stpl/index.php"
        );
        assert_eq!(session.tenant, "fhin");
        assert_eq!(session.locale, "de");
        assert_eq!(session.user_id, "alice");
        assert_eq!(session.token, TOKEN);
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        for field in SESSION_FIELDS {
            let query: Vec<String> = full_query()
                .split('&')
                .filter(|pair| !pair.starts_with(&format!("{field}=")))
                .map(String::from)
                .collect();
            let err = session_from_landing(&login(), &landing(&query.join("&"))).unwrap_err();
            assert_eq!(err, SessionError::MissingField(field));
        }
    }

    #[test]
    fn test_empty_field_counts_as_missing() {
        let query = format!("FH=fhin&Lang=&User=alice&Session={TOKEN}");
        let err = session_from_landing(&login(), &landing(&query)).unwrap_err();
        assert_eq!(err, SessionError::MissingField("Lang"));
    }

    #[test]
    fn test_redirect_back_to_login_is_rejected() {
        let back = Url::parse(&format!(
            "https://www3.example.com/stpl/login.php?{}",
            full_query()
        ))
        .unwrap();
        let err = session_from_landing(&login(), &back).unwrap_err();
        assert!(matches!(err, SessionError::LoginRejected(_)));
    }

    #[test]
    fn test_missing_field_checked_before_rejection() {
        let back = Url::parse("https://www3.example.com/stpl/login.php?FH=fhin").unwrap();
        let err = session_from_landing(&login(), &back).unwrap_err();
        assert_eq!(err, SessionError::MissingField("Lang"));
    }

    #[test]
    fn test_short_token_is_invalid() {
        let query = "FH=fhin&Lang=de&User=alice&Session=deadbeef";
        let err = session_from_landing(&login(), &landing(query)).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidToken {
                expected: 40,
                actual: 8
            }
        );
    }

    #[tokio::test]
    async fn test_authenticate_with_mock_server() {
        let server = wiremock::MockServer::start().await;
        let landing_url = format!("{}/stpl/index.php?{}", server.uri(), full_query());

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/stpl/login.php"))
            .and(wiremock::matchers::body_string_contains("mode=login"))
            .and(wiremock::matchers::body_string_contains("user=alice"))
            .and(wiremock::matchers::body_string_contains("pwd=secret"))
            .and(wiremock::matchers::body_string_contains("FH=fhin"))
            .respond_with(
                wiremock::ResponseTemplate::new(302).insert_header("Location", landing_url.as_str()),
            )
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/stpl/index.php"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = build_client(&CrawlConfig::default()).unwrap();
        let login_url = Url::parse(&format!("{}/stpl/login.php", server.uri())).unwrap();
        let credentials = Credentials {
            tenant: "fhin".into(),
            username: "alice".into(),
            password: "secret".into(),
        };

        let session = authenticate(&client, &login_url, &credentials).await.unwrap();
        assert_eq!(
            session.base_url.as_str(),
            format!("{}/stpl/index.php", server.uri())
        );
        assert_eq!(session.token, TOKEN);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_credentials() {
        let server = wiremock::MockServer::start().await;

        // The application just re-renders the login form.
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/stpl/login.php"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<form></form>"))
            .mount(&server)
            .await;

        let client = build_client(&CrawlConfig::default()).unwrap();
        let login_url = Url::parse(&format!("{}/stpl/login.php", server.uri())).unwrap();
        let credentials = Credentials {
            tenant: "fhin".into(),
            username: "alice".into(),
            password: "wrong".into(),
        };

        let err = authenticate(&client, &login_url, &credentials)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StundenplanError::Session(SessionError::MissingField("FH"))
        ));
    }
}
