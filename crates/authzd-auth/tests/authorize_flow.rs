//! End-to-end tests of the authorization engine over real HTTP.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::request::Parts;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;
use url::Url;

use authzd_auth::{
    AccessTokenClaims, AuthError, AuthServerBuilder, AuthnCallback, Client, GrantType,
    IdentityProvider, MemoryStateKeeper, StaticAuthz, StaticClientRegistry, User,
};
use authzd_jose::JwkSet;

/// A provider that sends the user agent to a fake login page carrying the
/// reference in a `ref` parameter, and resolves the callback from query
/// parameters: `uid` selects the user, `fail` simulates a transport error.
struct TestIdp;

#[async_trait]
impl IdentityProvider for TestIdp {
    fn id(&self) -> &str {
        "testidp"
    }

    async fn authn_redirect(&self, authz_ref: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse("http://testidp/login").unwrap();
        url.query_pairs_mut().append_pair("ref", authz_ref);
        Ok(url)
    }

    async fn authn_callback(&self, request: &Parts) -> Result<AuthnCallback, AuthError> {
        let query: HashMap<String, String> = request
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        if query.contains_key("fail") {
            return Err(AuthError::identity_provider("upstream unreachable"));
        }
        Ok(AuthnCallback {
            authz_ref: query.get("ref").cloned().unwrap_or_default(),
            user: query.get("uid").map(|uid| User::new(uid.clone())),
        })
    }
}

/// A provider whose redirect construction always fails.
struct BrokenIdp;

#[async_trait]
impl IdentityProvider for BrokenIdp {
    fn id(&self) -> &str {
        "brokenidp"
    }

    async fn authn_redirect(&self, _authz_ref: &str) -> Result<Url, AuthError> {
        Err(AuthError::identity_provider("cannot build redirect"))
    }

    async fn authn_callback(&self, _request: &Parts) -> Result<AuthnCallback, AuthError> {
        Ok(AuthnCallback {
            authz_ref: String::new(),
            user: None,
        })
    }
}

fn test_jwks() -> JwkSet {
    let doc = json!({"keys": [{
        "kty": "oct",
        "kid": "access-token-key",
        "alg": "HS256",
        "key_ops": ["sign", "verify"],
        "k": URL_SAFE_NO_PAD.encode(b"0123456789abcdef0123456789abcdef"),
    }]});
    JwkSet::from_json(&doc.to_string()).unwrap()
}

fn clients() -> Arc<StaticClientRegistry> {
    Arc::new(StaticClientRegistry::new([
        Client {
            id: "testclient1".to_string(),
            redirects: vec![
                "http://testclient/".to_string(),
                "http://testclient/wildcard/*".to_string(),
                "http://testclient/specific/url".to_string(),
            ],
            secret: None,
            grant_type: GrantType::Token,
        },
        Client {
            id: "testclient2".to_string(),
            redirects: vec![
                "http://testclient2/a".to_string(),
                "http://testclient2/b".to_string(),
            ],
            secret: None,
            grant_type: GrantType::Token,
        },
        // Broken registration; should be caught at configuration time, but
        // the engine still has to fail closed.
        Client {
            id: "testclient3".to_string(),
            redirects: vec![":".to_string()],
            secret: None,
            grant_type: GrantType::Token,
        },
    ]))
}

fn authz() -> Arc<StaticAuthz> {
    Arc::new(StaticAuthz::new(
        ["scope:1", "scope:2", "scope:3"].map(String::from),
        [(
            "user:1".to_string(),
            vec!["scope:1".to_string(), "scope:2".to_string()],
        )],
    ))
}

async fn build_engine(state_lifetime: Duration) -> Router {
    AuthServerBuilder::new(test_jwks())
        .state_keeper(Box::new(MemoryStateKeeper::new()), state_lifetime)
        .clients(clients())
        .authz_provider(authz())
        .identity_provider(Arc::new(TestIdp))
        .identity_provider(Arc::new(BrokenIdp))
        .token_issuer("http://authzd.test")
        .token_lifetime(600)
        .build()
        .await
        .unwrap()
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn serve_engine() -> (String, reqwest::Client) {
    let base = serve(build_engine(Duration::from_secs(60)).await).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    (base, client)
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

fn fragment_params(location: &str) -> HashMap<String, String> {
    let url = Url::parse(location).unwrap();
    let fragment = url.fragment().unwrap_or_default().to_string();
    url::form_urlencoded::parse(fragment.as_bytes())
        .into_owned()
        .collect()
}

/// A valid authorize URL against testclient1 and testidp; callers tweak
/// individual parameters per scenario.
fn authorize_url(base: &str, overrides: &[(&str, Option<&str>)]) -> String {
    let mut params: Vec<(String, String)> = vec![
        ("client_id".into(), "testclient1".into()),
        ("redirect_uri".into(), "http://testclient/wildcard/anything".into()),
        ("response_type".into(), "token".into()),
        ("idp_id".into(), "testidp".into()),
    ];
    for (key, value) in overrides {
        params.retain(|(k, _)| k != key);
        if let Some(value) = value {
            params.push(((*key).to_string(), (*value).to_string()));
        }
    }
    let mut url = Url::parse(base).unwrap();
    url.set_path("/oauth2/authorize");
    url.query_pairs_mut().extend_pairs(params);
    url.to_string()
}

#[tokio::test]
async fn authorize_without_client_id() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(&base, &[("client_id", None)]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "missing client_id\n");
}

#[tokio::test]
async fn authorize_with_unknown_client_id() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(&base, &[("client_id", Some("bad"))]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "invalid client_id\n");
}

#[tokio::test]
async fn authorize_without_redirect_for_multi_redirect_client() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(
            &base,
            &[("client_id", Some("testclient2")), ("redirect_uri", None)],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.text().await.unwrap(),
        "missing or invalid redirect_uri\n"
    );
}

#[tokio::test]
async fn authorize_with_unregistered_redirect() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(&base, &[("redirect_uri", Some("http://bad/"))]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.text().await.unwrap(),
        "missing or invalid redirect_uri\n"
    );
}

#[tokio::test]
async fn authorize_with_unparseable_registered_redirect() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(
            &base,
            &[("client_id", Some("testclient3")), ("redirect_uri", Some(":"))],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn authorize_with_wildcard_redirect_reaches_idp() {
    let (base, http) = serve_engine().await;
    let response = http.get(authorize_url(&base, &[])).send().await.unwrap();
    assert_eq!(response.status(), 303);
    let location = location(&response);
    assert!(
        location.starts_with("http://testidp/login?ref="),
        "{location}"
    );
}

#[tokio::test]
async fn authorize_without_response_type() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(
            &base,
            &[("response_type", None), ("redirect_uri", Some("http://testclient/"))],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        "http://testclient/?error=invalid_request&error_description=response_type+missing"
    );
}

#[tokio::test]
async fn authorize_with_unsupported_response_type() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(
            &base,
            &[("response_type", Some("code")), ("redirect_uri", Some("http://testclient/"))],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        "http://testclient/?error=unsupported_response_type&error_description=response_type+not+supported+for+client"
    );
}

#[tokio::test]
async fn authorize_with_invalid_scope() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(
            &base,
            &[("scope", Some("scope:1 thisisnoscope")), ("redirect_uri", Some("http://testclient/"))],
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        "http://testclient/?error=invalid_scope&error_description=invalid+scope%3A+thisisnoscope"
    );
}

#[tokio::test]
async fn authorize_without_idp_id() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(&base, &[("idp_id", None)]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    let location = location(&response);
    assert!(
        location.ends_with("?error=invalid_request&error_description=idp_id+missing"),
        "{location}"
    );
}

#[tokio::test]
async fn authorize_with_unknown_idp_id() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(&base, &[("idp_id", Some("nope"))]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    let location = location(&response);
    assert!(
        location.ends_with("?error=invalid_request&error_description=unknown+idp_id"),
        "{location}"
    );
}

#[tokio::test]
async fn authorize_with_failing_idp_redirect() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(authorize_url(&base, &[("idp_id", Some("brokenidp"))]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    let location = location(&response);
    assert!(
        location.ends_with("?error=server_error&error_description=internal+server+error"),
        "{location}"
    );
}

#[tokio::test]
async fn authorize_rejects_non_get_methods() {
    let (base, http) = serve_engine().await;
    let response = http
        .post(format!("{base}/oauth2/authorize"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn callback_for_unknown_idp() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(format!("{base}/oauth2/callback/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn callback_without_reference() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(format!("{base}/oauth2/callback/testidp"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.text().await.unwrap(),
        "Can't relate callback to authorization request\n"
    );
}

#[tokio::test]
async fn callback_with_unknown_reference() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(format!("{base}/oauth2/callback/testidp?ref=never-issued&uid=user:1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "invalid state token\n");
}

#[tokio::test]
async fn callback_with_idp_transport_error() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(format!("{base}/oauth2/callback/testidp?fail=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}

/// Drives authorize and returns the reference the engine handed the IDP.
async fn start_authorization(
    base: &str,
    http: &reqwest::Client,
    overrides: &[(&str, Option<&str>)],
) -> String {
    let response = http
        .get(authorize_url(base, overrides))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    let idp_url = Url::parse(&location(&response)).unwrap();
    idp_url
        .query_pairs()
        .find(|(k, _)| k == "ref")
        .map(|(_, v)| v.into_owned())
        .expect("reference in IdP redirect")
}

#[tokio::test]
async fn full_implicit_flow_issues_a_verifiable_token() {
    let (base, http) = serve_engine().await;
    let authz_ref = start_authorization(
        &base,
        &http,
        &[
            ("scope", Some("scope:1 scope:2 scope:3")),
            ("state", Some("oauth-state-echo")),
        ],
    )
    .await;

    let response = http
        .get(format!(
            "{base}/oauth2/callback/testidp?ref={authz_ref}&uid=user:1"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);

    let location = location(&response);
    assert!(
        location.starts_with("http://testclient/wildcard/anything#"),
        "{location}"
    );
    let fragment = fragment_params(&location);
    assert_eq!(fragment["token_type"], "bearer");
    assert_eq!(fragment["expires_in"], "600");
    assert_eq!(fragment["scope"], "scope:1 scope:2");
    assert_eq!(fragment["state"], "oauth-state-echo");

    // The token verifies against the server's key set and carries the
    // granted scopes in request order.
    let claims: AccessTokenClaims = test_jwks().decode(&fragment["access_token"]).unwrap();
    assert_eq!(claims.sub, "user:1");
    assert_eq!(claims.iss, "http://authzd.test");
    assert_eq!(claims.scopes, vec!["scope:1", "scope:2"]);
    assert_eq!(claims.exp - claims.iat, 600);
    assert_eq!(claims.iat - claims.nbf, 10);
}

#[tokio::test]
async fn requested_scope_duplicates_are_coalesced() {
    let (base, http) = serve_engine().await;
    let authz_ref = start_authorization(
        &base,
        &http,
        &[("scope", Some("scope:2 scope:1 scope:2 scope:1"))],
    )
    .await;

    let response = http
        .get(format!(
            "{base}/oauth2/callback/testidp?ref={authz_ref}&uid=user:1"
        ))
        .send()
        .await
        .unwrap();
    let fragment = fragment_params(&location(&response));
    assert_eq!(fragment["scope"], "scope:2 scope:1");
}

#[tokio::test]
async fn flow_without_scope_grants_nothing() {
    let (base, http) = serve_engine().await;
    let authz_ref = start_authorization(&base, &http, &[]).await;

    let response = http
        .get(format!(
            "{base}/oauth2/callback/testidp?ref={authz_ref}&uid=user:1"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    let fragment = fragment_params(&location(&response));
    assert_eq!(fragment["scope"], "");
    assert!(!fragment.contains_key("state"));
}

#[tokio::test]
async fn callback_with_refused_authentication() {
    let (base, http) = serve_engine().await;
    let authz_ref = start_authorization(&base, &http, &[]).await;

    let response = http
        .get(format!("{base}/oauth2/callback/testidp?ref={authz_ref}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(
        location(&response),
        "http://testclient/wildcard/anything?error=access_denied&error_description=couldn%27t+authenticate+user"
    );
}

#[tokio::test]
async fn replayed_callback_is_rejected() {
    let (base, http) = serve_engine().await;
    let authz_ref = start_authorization(&base, &http, &[]).await;
    let callback = format!("{base}/oauth2/callback/testidp?ref={authz_ref}&uid=user:1");

    let first = http.get(&callback).send().await.unwrap();
    assert_eq!(first.status(), 303);

    let second = http.get(&callback).send().await.unwrap();
    assert_eq!(second.status(), 400);
    assert_eq!(second.text().await.unwrap(), "invalid state token\n");
}

#[tokio::test]
async fn callback_after_state_lifetime_is_rejected() {
    let base = serve(build_engine(Duration::from_millis(30)).await).await;
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let authz_ref = start_authorization(&base, &http, &[]).await;

    tokio::time::sleep(Duration::from_millis(60)).await;

    let response = http
        .get(format!(
            "{base}/oauth2/callback/testidp?ref={authz_ref}&uid=user:1"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.text().await.unwrap(), "invalid state token\n");
}

#[tokio::test]
async fn distinct_requests_get_distinct_references() {
    let (base, http) = serve_engine().await;
    let mut seen = std::collections::HashSet::new();
    for _ in 0..16 {
        let reference = start_authorization(&base, &http, &[]).await;
        assert!(seen.insert(reference), "reference collision");
    }
}

#[tokio::test]
async fn jwks_endpoint_serves_public_keys_only() {
    let (base, http) = serve_engine().await;
    let response = http
        .get(format!("{base}/.well-known/jwks.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    // The test set is symmetric-only; nothing is publishable.
    assert_eq!(body, json!({ "keys": [] }));
}
