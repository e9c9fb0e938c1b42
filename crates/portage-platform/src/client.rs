//! Authenticated JSON client for AWX/AAP REST APIs.
//!
//! Every request carries HTTP Basic auth. Redirects are followed manually so
//! the auth header is re-applied on each hop (reqwest strips credentials on
//! cross-host redirects, and the gateway in front of AAP redirects freely).

use std::time::Duration;

use portage_core::{Connection, Resource};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Certificate, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::PlatformError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;
const ERROR_BODY_LIMIT: usize = 200;

/// Shared HTTP client bound to one connection's base URL and credentials.
pub struct ApiClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

/// The standard AWX/AAP paginated response envelope.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    #[allow(dead_code)]
    count: i64,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<Resource>,
}

impl ApiClient {
    /// Creates a client for a connection, honoring its TLS settings.
    pub fn new(conn: &Connection) -> Result<Self, PlatformError> {
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none());

        if conn.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        } else if !conn.ca_cert.is_empty() {
            let cert = Certificate::from_pem(conn.ca_cert.as_bytes())
                .map_err(|e| PlatformError::ClientBuild(format!("invalid CA bundle: {e}")))?;
            builder = builder.tls_built_in_root_certs(false).add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| PlatformError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: conn.base_url(),
            username: conn.username.clone(),
            password: conn.password.clone(),
            http,
        })
    }

    /// Client against an explicit base URL (mock servers in tests).
    pub fn with_credentials(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PlatformError::ClientBuild(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn absolute_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, PlatformError> {
        let raw = format!("{}{}", self.base_url, path);
        let mut url = Url::parse(&raw).map_err(|e| PlatformError::InvalidUrl {
            url: raw,
            detail: e.to_string(),
        })?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Sends a request, re-applying Basic auth across redirects.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        mut url: Url,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, PlatformError> {
        for _ in 0..MAX_REDIRECTS {
            debug!("{} {}", method, url);
            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .basic_auth(&self.username, Some(&self.password))
                .header(CONTENT_TYPE, "application/json");
            if let Some(payload) = body {
                req = req.json(payload);
            }
            let resp = req.send().await.map_err(|e| PlatformError::Request {
                method: method.to_string(),
                path: path.to_string(),
                source: e,
            })?;

            if resp.status().is_redirection() {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| PlatformError::Parse {
                        path: path.to_string(),
                        detail: "redirect without Location header".to_string(),
                    })?
                    .to_string();
                url = url.join(&location).map_err(|e| PlatformError::InvalidUrl {
                    url: location,
                    detail: e.to_string(),
                })?;
                continue;
            }
            return Ok(resp);
        }
        Err(PlatformError::TooManyRedirects {
            path: path.to_string(),
        })
    }

    /// Reads the body and maps non-2xx statuses to an error carrying a
    /// truncated body.
    async fn into_checked_body(
        &self,
        method: &str,
        path: &str,
        resp: reqwest::Response,
    ) -> Result<(String, u16), PlatformError> {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(PlatformError::Http {
                method: method.to_string(),
                path: path.to_string(),
                status,
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }
        Ok((body, status))
    }

    /// Authenticated GET; returns the raw response body.
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<String, PlatformError> {
        let url = self.absolute_url(path, params)?;
        let resp = self.execute(Method::GET, path, url, None).await?;
        let (body, _) = self.into_checked_body("GET", path, resp).await?;
        Ok(body)
    }

    /// Authenticated GET, deserialized.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let body = self.get(path, params).await?;
        serde_json::from_str(&body).map_err(|e| PlatformError::Parse {
            path: path.to_string(),
            detail: e.to_string(),
        })
    }

    /// Fetches all pages of a paginated endpoint, in page order.
    pub async fn get_all(&self, path: &str) -> Result<Vec<Resource>, PlatformError> {
        let mut all = Vec::new();
        let mut current = self.absolute_url(path, &[])?;

        loop {
            let resp = self.execute(Method::GET, path, current, None).await?;
            let (body, _) = self.into_checked_body("GET", path, resp).await?;
            let page: Page = serde_json::from_str(&body).map_err(|e| PlatformError::Parse {
                path: path.to_string(),
                detail: e.to_string(),
            })?;
            all.extend(page.results);

            match page.next {
                Some(next) if !next.is_empty() => {
                    // Relative `next` URLs are resolved against the base URL.
                    let raw = if next.starts_with('/') {
                        format!("{}{}", self.base_url, next)
                    } else {
                        next
                    };
                    current = Url::parse(&raw).map_err(|e| PlatformError::InvalidUrl {
                        url: raw,
                        detail: e.to_string(),
                    })?;
                }
                _ => break,
            }
        }
        Ok(all)
    }

    /// Authenticated POST with a JSON body; returns `(body, status)`.
    pub async fn post(&self, path: &str, payload: &Value) -> Result<(String, u16), PlatformError> {
        let url = self.absolute_url(path, &[])?;
        let resp = self.execute(Method::POST, path, url, Some(payload)).await?;
        self.into_checked_body("POST", path, resp).await
    }

    /// Authenticated PATCH with a JSON body; returns `(body, status)`.
    pub async fn patch(&self, path: &str, payload: &Value) -> Result<(String, u16), PlatformError> {
        let url = self.absolute_url(path, &[])?;
        let resp = self.execute(Method::PATCH, path, url, Some(payload)).await?;
        self.into_checked_body("PATCH", path, resp).await
    }

    /// Authenticated DELETE. 204/202 succeed; 404 counts as already gone.
    pub async fn delete(&self, path: &str) -> Result<(), PlatformError> {
        let url = self.absolute_url(path, &[])?;
        let resp = self.execute(Method::DELETE, path, url, None).await?;
        let status = resp.status().as_u16();
        match status {
            204 | 202 | 404 => Ok(()),
            _ => Err(PlatformError::Http {
                method: "DELETE".to_string(),
                path: path.to_string(),
                status,
                body: String::new(),
            }),
        }
    }

    /// Searches by `?name=`; returns the first match, `None` on zero results.
    pub async fn find_by_name(
        &self,
        path: &str,
        name: &str,
    ) -> Result<Option<Resource>, PlatformError> {
        self.find_by_param(path, "name", name).await
    }

    /// Searches by `?username=`; returns the first match, `None` on zero results.
    pub async fn find_by_username(
        &self,
        path: &str,
        username: &str,
    ) -> Result<Option<Resource>, PlatformError> {
        self.find_by_param(path, "username", username).await
    }

    async fn find_by_param(
        &self,
        path: &str,
        param: &str,
        value: &str,
    ) -> Result<Option<Resource>, PlatformError> {
        let body = self.get(path, &[(param, value)]).await?;
        let page: Page = serde_json::from_str(&body).map_err(|e| PlatformError::Parse {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
        Ok(page.results.into_iter().next())
    }

    /// Checks connectivity by hitting an API path.
    pub async fn ping(&self, path: &str) -> Result<(), PlatformError> {
        self.get(path, &[]).await.map(|_| ())
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn test_new_from_connection() {
        let conn = Connection {
            scheme: "https".to_string(),
            host: "example.com".to_string(),
            port: 443,
            username: "user".to_string(),
            password: "pass".to_string(),
            insecure: true,
            ..Default::default()
        };
        let client = ApiClient::new(&conn).unwrap();
        assert_eq!(client.base_url(), "https://example.com:443");
        assert_eq!(client.username, "user");
        assert_eq!(client.password, "pass");
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> ApiClient {
        ApiClient::with_credentials(server.uri(), "admin", "secret").unwrap()
    }

    #[tokio::test]
    async fn test_get_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ping/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .mount(&server)
            .await;

        let body = test_client(&server).get("/api/v2/ping/", &[]).await.unwrap();
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_get_sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/test"))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server).get("/test", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_error_status_includes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/me/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"detail":"Invalid username/password."}"#),
            )
            .mount(&server)
            .await;

        let err = test_client(&server).get("/api/v2/me/", &[]).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Invalid username/password"));
    }

    #[tokio::test]
    async fn test_get_all_follows_relative_next() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/orgs/"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "next": null,
                "results": [{"id": 2, "name": "Org2"}, {"id": 3, "name": "Org3"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/orgs/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "next": "/api/v2/orgs/?page=2",
                "results": [{"id": 1, "name": "Org1"}]
            })))
            .mount(&server)
            .await;

        let results = test_client(&server).get_all("/api/v2/orgs/").await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name(), "Org1");
        assert_eq!(results[2].name(), "Org3");
    }

    #[tokio::test]
    async fn test_get_all_empty_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/teams/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 0, "next": null, "results": []
            })))
            .mount(&server)
            .await;

        let results = test_client(&server).get_all("/api/v2/teams/").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_post_returns_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/organizations/"))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":1}"#))
            .mount(&server)
            .await;

        let (body, status) = test_client(&server)
            .post("/api/v2/organizations/", &json!({"name": "Test"}))
            .await
            .unwrap();
        assert_eq!(status, 201);
        assert_eq!(body, r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_delete_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/organizations/1/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        test_client(&server)
            .delete("/api/v2/organizations/1/")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_not_found_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/organizations/999/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        test_client(&server)
            .delete("/api/v2/organizations/999/")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_by_name_zero_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/"))
            .and(query_param("name", "Ghost"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 0, "next": null, "results": []
            })))
            .mount(&server)
            .await;

        let found = test_client(&server)
            .find_by_name("/api/v2/organizations/", "Ghost")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_by_name_returns_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/organizations/"))
            .and(query_param("name", "Acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1, "next": null,
                "results": [{"id": 7, "name": "Acme"}]
            })))
            .mount(&server)
            .await;

        let found = test_client(&server)
            .find_by_name("/api/v2/organizations/", "Acme")
            .await
            .unwrap()
            .expect("expected a result");
        assert_eq!(found.id(), 7);
    }

    #[tokio::test]
    async fn test_redirect_reapplies_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old/"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "/new/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new/"))
            .and(basic_auth("admin", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server).get("/old/", &[]).await.unwrap();
    }
}
