//! Authenticates a proxy key and pages through `/proxy/config` (spec §4.4).
//! The HTTP client shape mirrors the teacher's `UnleashClient`: a
//! `reqwest::Client` built once, status codes classified into `RelayError`
//! variants rather than bubbled up raw.

use std::sync::RwLock;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use relay_types::{ConfigObject, ProxyAuthRequest, ProxyAuthResponse, ProxyConfigPage, RelayError, RelayResult};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

const PAGE_SIZE: u32 = 10;

/// Whole-call deadline for `authenticate()` (spec §5: "Authenticate has a
/// 30s deadline").
const AUTHENTICATE_DEADLINE: Duration = Duration::from_secs(30);

/// Whole-operation deadline for `load()`'s paging loop (spec §5:
/// "PageProxyConfig has a 5-minute whole-operation deadline").
const LOAD_DEADLINE: Duration = Duration::from_secs(5 * 60);

/// Two-step upstream client: authenticate once, then page through config
/// while refreshing the bearer token as needed.
pub struct RemoteConfigLoader {
    client: Client,
    base_url: String,
    proxy_key: String,
    token: RwLock<Option<String>>,
    cluster_identifier: RwLock<Option<String>>,
}

impl RemoteConfigLoader {
    pub fn new(base_url: impl Into<String>, proxy_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client with a static config never fails to build"),
            base_url: base_url.into(),
            proxy_key: proxy_key.into(),
            token: RwLock::new(None),
            cluster_identifier: RwLock::new(None),
        }
    }

    /// POSTs `/proxy/auth` and caches the returned bearer token. The token is
    /// a JWT; on top of trusting the response body's `cluster_identifier`,
    /// the loader also decodes the token's payload segment as a fallback, in
    /// case the body omits it. The whole call is bounded by a 30s deadline
    /// (spec §5).
    pub async fn authenticate(&self) -> RelayResult<String> {
        match tokio::time::timeout(AUTHENTICATE_DEADLINE, self.authenticate_inner()).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::transient("proxy auth timed out after 30s")),
        }
    }

    async fn authenticate_inner(&self) -> RelayResult<String> {
        let url = format!("{}/proxy/auth", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ProxyAuthRequest {
                proxy_key: self.proxy_key.clone(),
            })
            .send()
            .await
            .map_err(|e| RelayError::internal(format!("proxy auth request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "proxy auth"));
        }

        let body: ProxyAuthResponse = response
            .json()
            .await
            .map_err(|e| RelayError::internal(format!("malformed proxy auth response: {e}")))?;

        let cluster_identifier = if body.cluster_identifier.is_empty() {
            decode_cluster_identifier(&body.auth_token).unwrap_or_default()
        } else {
            body.cluster_identifier.clone()
        };
        debug!(cluster_identifier, "authenticated proxy key");

        *self.token.write().expect("token lock poisoned") = Some(body.auth_token.clone());
        *self.cluster_identifier.write().expect("cluster identifier lock poisoned") = Some(cluster_identifier);
        Ok(body.auth_token)
    }

    /// Forces re-authentication without a full config fetch cycle (spec
    /// §4.4, "Token is refreshable without a full fetch cycle").
    pub async fn refresh_token(&self) -> RelayResult<()> {
        self.authenticate().await.map(|_| ())
    }

    /// The cluster identifier extracted during the last successful
    /// `authenticate()`, used to build the `POST /metrics/<envID>?cluster=<id>`
    /// URL (spec §6). `None` until the loader has authenticated at least once.
    pub fn cluster_identifier(&self) -> Option<String> {
        self.cluster_identifier.read().expect("cluster identifier lock poisoned").clone()
    }

    fn current_token(&self) -> RelayResult<String> {
        self.token
            .read()
            .expect("token lock poisoned")
            .clone()
            .ok_or_else(|| RelayError::unauthorized("not authenticated yet"))
    }

    /// The base URL this loader was constructed with, so other upstream
    /// clients sharing the same SaaS endpoint (e.g. the metrics flush sink)
    /// don't need their own copy of it.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The currently cached bearer token, for callers outside this loader
    /// that need to authenticate against the same SaaS backend (e.g.
    /// `MetricService`'s upstream flush, spec §6).
    pub fn token(&self) -> RelayResult<String> {
        self.current_token()
    }

    /// Pages through `GET /proxy/config` with `page_size=10`, continuing
    /// while the server returns a non-empty `environments` array. The whole
    /// paging operation is bounded by a 5-minute deadline (spec §5), not
    /// just each individual page request.
    pub async fn load(&self) -> RelayResult<Vec<ConfigObject>> {
        match tokio::time::timeout(LOAD_DEADLINE, self.load_inner()).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::transient("proxy config paging timed out after 5m")),
        }
    }

    async fn load_inner(&self) -> RelayResult<Vec<ConfigObject>> {
        let mut environments = Vec::new();
        let mut page_number = 0u32;

        loop {
            let page = self.fetch_page(page_number).await?;
            if page.is_empty() {
                break;
            }
            environments.extend(page.environments);
            page_number += 1;
        }

        Ok(environments)
    }

    async fn fetch_page(&self, page_number: u32) -> RelayResult<ProxyConfigPage> {
        let token = self.current_token()?;
        let url = format!("{}/proxy/config", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("page_number", page_number), ("page_size", PAGE_SIZE)])
            .send()
            .await
            .map_err(|e| RelayError::internal(format!("proxy config request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "proxy config"));
        }

        response
            .json()
            .await
            .map_err(|e| RelayError::internal(format!("malformed proxy config page: {e}")))
    }
}

fn classify_status(status: StatusCode, what: &str) -> RelayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RelayError::unauthorized(format!("{what} rejected: {status}"))
        }
        StatusCode::NOT_FOUND => RelayError::not_found(format!("{what}: {status}")),
        status if status.is_server_error() => RelayError::internal(format!("{what} server error: {status}")),
        status => RelayError::internal(format!("{what} unexpected status: {status}")),
    }
}

/// Decodes the second, base64url-encoded segment of a JWT and pulls
/// `cluster_identifier` out of it, without verifying the signature: this is
/// a fallback for when the auth response body doesn't carry the field
/// itself, not a trust boundary.
fn decode_cluster_identifier(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value
        .get("cluster_identifier")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(StatusCode::UNAUTHORIZED, "unauthorized")]
    #[test_case(StatusCode::FORBIDDEN, "unauthorized")]
    #[test_case(StatusCode::NOT_FOUND, "not_found")]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, "internal")]
    #[test_case(StatusCode::BAD_GATEWAY, "internal")]
    #[test_case(StatusCode::BAD_REQUEST, "internal")]
    fn classifies_status_codes(status: StatusCode, expected_kind: &str) {
        let kind = match classify_status(status, "x") {
            RelayError::Unauthorized(_) => "unauthorized",
            RelayError::NotFound(_) => "not_found",
            RelayError::Transient(_) => "transient",
            RelayError::Internal(_) => "internal",
            RelayError::Config(_) => "config",
        };
        assert_eq!(kind, expected_kind);
    }

    fn make_jwt_payload(json: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"HS256\"}");
        let payload = URL_SAFE_NO_PAD.encode(json.as_bytes());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn decodes_cluster_identifier_from_token_payload() {
        let token = make_jwt_payload(r#"{"cluster_identifier":"cluster-a"}"#);
        assert_eq!(decode_cluster_identifier(&token), Some("cluster-a".to_string()));
    }

    #[test]
    fn missing_cluster_identifier_field_is_none() {
        let token = make_jwt_payload(r#"{"other":"value"}"#);
        assert_eq!(decode_cluster_identifier(&token), None);
    }

    #[test]
    fn garbage_token_is_none_not_an_error() {
        assert_eq!(decode_cluster_identifier("not-a-jwt"), None);
    }

    #[tokio::test]
    async fn fetch_page_without_authenticating_is_unauthorized() {
        let loader = RemoteConfigLoader::new("http://127.0.0.1:0", "proxy-key");
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, RelayError::Unauthorized(_)));
    }

    #[test]
    fn cluster_identifier_is_none_before_authenticating() {
        let loader = RemoteConfigLoader::new("http://127.0.0.1:0", "proxy-key");
        assert_eq!(loader.cluster_identifier(), None);
    }

    // Scenario B (spec §8): `/proxy/auth` returning 401 surfaces as
    // `Unauthorized` and leaves the loader with no cached token, so a
    // subsequent `load()` also fails closed rather than using a stale one.
    mod against_mock_server {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::*;

        #[tokio::test]
        async fn auth_rejection_is_unauthorized_and_caches_no_token() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/proxy/auth"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;

            let loader = RemoteConfigLoader::new(server.uri(), "proxy-key");
            let err = loader.authenticate().await.unwrap_err();
            assert!(matches!(err, RelayError::Unauthorized(_)));
            assert_eq!(loader.cluster_identifier(), None);

            let load_err = loader.load().await.unwrap_err();
            assert!(matches!(load_err, RelayError::Unauthorized(_)));
        }

        #[tokio::test]
        async fn successful_auth_caches_token_and_falls_back_to_decoding_cluster_identifier() {
            let server = MockServer::start().await;
            let token = make_jwt_payload(r#"{"cluster_identifier":"cluster-from-token"}"#);
            Mock::given(method("POST"))
                .and(path("/proxy/auth"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "auth_token": token,
                    "cluster_identifier": "",
                })))
                .mount(&server)
                .await;

            let loader = RemoteConfigLoader::new(server.uri(), "proxy-key");
            let returned = loader.authenticate().await.unwrap();
            assert_eq!(returned, token);
            assert_eq!(loader.cluster_identifier(), Some("cluster-from-token".to_string()));
        }

        #[tokio::test]
        async fn load_pages_until_an_empty_page_is_returned() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/proxy/auth"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "auth_token": make_jwt_payload(r#"{"cluster_identifier":"c"}"#),
                    "cluster_identifier": "c",
                })))
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path("/proxy/config"))
                .and(wiremock::matchers::query_param("page_number", "0"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "environments": [{"id": "env-a", "apiKeys": ["key-a"], "featureConfigs": [], "segments": []}],
                    "page_index": 0,
                    "page_count": 2,
                    "item_count": 1,
                })))
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path("/proxy/config"))
                .and(wiremock::matchers::query_param("page_number", "1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "environments": [],
                    "page_index": 1,
                    "page_count": 2,
                    "item_count": 1,
                })))
                .mount(&server)
                .await;

            let loader = RemoteConfigLoader::new(server.uri(), "proxy-key");
            loader.authenticate().await.unwrap();
            let environments = loader.load().await.unwrap();
            assert_eq!(environments.len(), 1);
            assert_eq!(environments[0].id, relay_types::EnvironmentId::new("env-a"));
        }
    }
}
