use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use skillsync_core::config::{AuthConfig, Secret};
use skillsync_core::{SkillId, SkillProviderId, UserId};
use rstest::rstest;
use skillsync_sync::{
    upsert_skill, BearerToken, ClientCredentialsProvider, ErrorClass, HttpMembersService,
    HttpProfileStore, MembersService, ProfileStore, SyncError, TokenProvider, UpsertOutcome,
    WriteThrottle,
};

#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<(String, Value)>>,
    token_grants: AtomicUsize,
}

impl Recorder {
    fn record(&self, line: String, body: Value) {
        self.requests.lock().unwrap().push((line, body));
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

type Shared = Arc<Recorder>;

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn skill_providers(
    State(rec): State<Shared>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    rec.record(format!("GET /skillsProviders {}", bearer(&headers)), Value::Null);
    match q.get("name").map(String::as_str) {
        Some("Topcoder") => (
            StatusCode::OK,
            Json(json!([
                {"id": "P1", "name": "Topcoder", "created": "2020-01-01"},
                {"id": "P2", "name": "Topcoder Academy"}
            ])),
        ),
        Some("Broken") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "boom"})),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))),
    }
}

async fn search_skills(
    State(rec): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    let line = format!(
        "GET /skills skillProviderId={} name={}",
        q.get("skillProviderId").cloned().unwrap_or_default(),
        q.get("name").cloned().unwrap_or_default()
    );
    rec.record(line, Value::Null);
    Json(json!([{"id": "S1", "skillProviderId": "P1", "name": "C++"}]))
}

async fn get_user_skill(
    State(rec): State<Shared>,
    Path((user_id, skill_id)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    rec.record(format!("GET /users/{user_id}/skills/{skill_id}"), Value::Null);
    match skill_id.as_str() {
        "S1" => (
            StatusCode::OK,
            Json(json!({"id": "A1", "userId": user_id, "skillId": skill_id, "metricValue": "3"})),
        ),
        // 2xx without a record id
        "S2" => (StatusCode::OK, Json(json!({}))),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))),
    }
}

async fn search_users(
    State(rec): State<Shared>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    let handle = q.get("handle").cloned().unwrap_or_default();
    rec.record(format!("GET /users handle={handle}"), Value::Null);
    if handle == "slow" {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Json(json!([{"id": "U1", "handle": handle}]))
}

async fn patch_user_skill(
    State(rec): State<Shared>,
    Path((user_id, skill_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.record(format!("PATCH /users/{user_id}/skills/{skill_id}"), body.clone());
    Json(json!({"userId": user_id, "skillId": skill_id, "metricValue": body["metricValue"]}))
}

async fn create_user_skill(
    State(rec): State<Shared>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    rec.record(format!("POST /users/{user_id}/skills"), body.clone());
    match user_id.as_str() {
        "locked" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"message": "rate limited"})),
        )
            .into_response(),
        // Bare record without user/skill ids.
        "bare" => (
            StatusCode::CREATED,
            Json(json!({"id": "A1", "metricValue": body["metricValue"]})),
        )
            .into_response(),
        "empty" => StatusCode::NO_CONTENT.into_response(),
        _ => (
            StatusCode::CREATED,
            Json(json!({
                "userId": user_id,
                "skillId": body["skillId"],
                "metricValue": body["metricValue"]
            })),
        )
            .into_response(),
    }
}

async fn member_skills(
    State(rec): State<Shared>,
    headers: HeaderMap,
    Path(handle): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    rec.record(
        format!(
            "GET /members/{handle}/skills fields={} {}",
            q.get("fields").cloned().unwrap_or_default(),
            bearer(&headers)
        ),
        Value::Null,
    );
    match handle.as_str() {
        "jdoe" => (
            StatusCode::OK,
            Json(json!({
                "handle": "jdoe",
                "skills": {"286": {"tagName": "Java", "score": 4.2}}
            })),
        ),
        "flaky" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "try later"})),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "no member"}))),
    }
}

async fn token(State(rec): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let n = rec.token_grants.fetch_add(1, Ordering::SeqCst) + 1;
    rec.record("POST /oauth/token".to_string(), body);
    Json(json!({"access_token": format!("m2m-{n}"), "expires_in": 86400, "token_type": "Bearer"}))
}

async fn serve() -> (SocketAddr, Shared) {
    let rec: Shared = Arc::new(Recorder::default());
    let app = Router::new()
        .route("/v5/skillsProviders", get(skill_providers))
        .route("/v5/users", get(search_users))
        .route("/v5/skills", get(search_skills))
        .route(
            "/v5/users/:user_id/skills/:skill_id",
            get(get_user_skill).patch(patch_user_skill),
        )
        .route("/v5/users/:user_id/skills", post(create_user_skill))
        .route("/members/:handle/skills", get(member_skills))
        .route("/oauth/token", post(token))
        .route("/proxy", post(token))
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, rec)
}

fn store(addr: SocketAddr) -> HttpProfileStore {
    HttpProfileStore::from_url(&format!("http://{addr}/v5/"), Duration::from_secs(5))
        .expect("store client")
}

fn token_for_tests() -> BearerToken {
    BearerToken::new("abc")
}

fn auth_config(addr: SocketAddr, proxy: bool) -> AuthConfig {
    AuthConfig {
        url: format!("http://{addr}/oauth/token"),
        ubahn_audience: "https://u-bahn.topcoder.com".into(),
        topcoder_audience: "https://m2m.topcoder-dev.com/".into(),
        client_id: Some("client".into()),
        client_secret: Some(Secret::new("shh")),
        proxy_server_url: proxy.then(|| format!("http://{addr}/proxy")),
        token_cache_time_secs: None,
    }
}

// ---------------------------------------------------------------------------
// Profile store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_returns_every_candidate_with_bearer_auth() {
    let (addr, rec) = serve().await;

    let providers = store(addr)
        .search_skill_providers("Topcoder", &token_for_tests())
        .await
        .expect("search");

    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].id, SkillProviderId::from("P1"));
    assert_eq!(rec.requests()[0].0, "GET /skillsProviders Bearer abc");
}

#[tokio::test]
async fn search_404_is_zero_matches() {
    let (addr, _rec) = serve().await;

    let providers = store(addr)
        .search_skill_providers("Nobody", &token_for_tests())
        .await
        .expect("search");

    assert!(providers.is_empty());
}

#[tokio::test]
async fn search_server_error_is_transient_read_failure() {
    let (addr, _rec) = serve().await;

    let err = store(addr)
        .search_skill_providers("Broken", &token_for_tests())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DownstreamRead { .. }));
    assert_eq!(err.class(), ErrorClass::Transient);
    assert!(err.to_string().contains("/skillsProviders?name=Broken"));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn skill_search_encodes_query_parameters() {
    let (addr, rec) = serve().await;

    let skills = store(addr)
        .search_skills(&SkillProviderId::from("P1"), "C++", &token_for_tests())
        .await
        .expect("search");

    assert_eq!(skills[0].id, SkillId::from("S1"));
    assert_eq!(rec.requests()[0].0, "GET /skills skillProviderId=P1 name=C++");
}

#[tokio::test]
async fn point_lookup_maps_404_to_none() {
    let (addr, _rec) = serve().await;
    let store = store(addr);
    let user = UserId::from("U1");

    let found = store
        .get_user_skill(&user, &SkillId::from("S1"), &token_for_tests())
        .await
        .expect("lookup");
    assert_eq!(found.and_then(|a| a.metric_value).as_deref(), Some("3"));

    let missing = store
        .get_user_skill(&user, &SkillId::from("S9"), &token_for_tests())
        .await
        .expect("lookup");
    assert!(missing.is_none());
}

#[tokio::test]
async fn create_and_update_send_camel_case_bodies() {
    let (addr, rec) = serve().await;
    let store = store(addr);
    let user = UserId::from("U1");
    let skill = SkillId::from("S1");

    store
        .create_user_skill(&user, &skill, "4.2", &token_for_tests())
        .await
        .expect("create");

    store
        .update_user_skill(&user, &skill, "5", &token_for_tests())
        .await
        .expect("update");

    let requests = rec.requests();
    assert_eq!(requests[0].0, "POST /users/U1/skills");
    assert_eq!(requests[0].1, json!({"skillId": "S1", "metricValue": "4.2"}));
    assert_eq!(requests[1].0, "PATCH /users/U1/skills/S1");
    assert_eq!(requests[1].1, json!({"metricValue": "5"}));
}

#[tokio::test]
async fn rejected_write_is_a_downstream_write_error() {
    let (addr, _rec) = serve().await;

    let err = store(addr)
        .create_user_skill(
            &UserId::from("locked"),
            &SkillId::from("S1"),
            "1",
            &token_for_tests(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DownstreamWrite { method: "POST", .. }));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn unreachable_store_is_transient() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = store(addr)
        .search_users("jdoe", &token_for_tests())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Transient);
}

#[tokio::test]
async fn point_lookup_without_record_id_is_absent() {
    let (addr, _rec) = serve().await;

    let found = store(addr)
        .get_user_skill(&UserId::from("U1"), &SkillId::from("S2"), &token_for_tests())
        .await
        .expect("lookup");

    assert!(found.is_none());
}

#[rstest]
#[case::bare_record("bare")]
#[case::no_content("empty")]
#[tokio::test]
async fn accepted_write_with_unexpected_body_succeeds_and_pauses(#[case] user: &str) {
    let (addr, rec) = serve().await;
    let store = store(addr);
    let throttle = WriteThrottle::fixed(Duration::from_millis(300));

    let started = std::time::Instant::now();
    let outcome = upsert_skill(
        &store,
        &throttle,
        &UserId::from(user),
        &SkillId::from("S9"),
        4.2,
        &token_for_tests(),
    )
    .await
    .expect("write accepted by the store");

    assert_eq!(
        outcome,
        UpsertOutcome::Created {
            skill_id: "S9".into(),
            metric_value: "4.2".into(),
        }
    );
    assert!(started.elapsed() >= Duration::from_millis(300));
    let posts = rec
        .requests()
        .iter()
        .filter(|(line, _)| line.starts_with("POST"))
        .count();
    assert_eq!(posts, 1);
}

#[tokio::test]
async fn request_timeout_is_transient() {
    let (addr, _rec) = serve().await;
    let store = HttpProfileStore::from_url(&format!("http://{addr}/v5/"), Duration::from_millis(50))
        .expect("store client");

    let err = store
        .search_users("slow", &token_for_tests())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::DownstreamRead { .. }));
    assert_eq!(err.class(), ErrorClass::Transient);
    assert!(err.is_retryable());
    assert!(err.to_string().contains("timed out"));
}

// ---------------------------------------------------------------------------
// Members service
// ---------------------------------------------------------------------------

fn members(addr: SocketAddr) -> HttpMembersService {
    HttpMembersService::from_url(&format!("http://{addr}/members"), Duration::from_secs(5))
        .expect("members client")
}

#[tokio::test]
async fn member_skills_requests_only_the_skills_field() {
    let (addr, rec) = serve().await;

    let skills = members(addr)
        .member_skills("jdoe", &token_for_tests())
        .await
        .expect("fetch")
        .expect("member exists");

    assert_eq!(skills["286"].tag_name, "Java");
    assert_eq!(skills["286"].score, 4.2);
    assert_eq!(
        rec.requests()[0].0,
        "GET /members/jdoe/skills fields=skills Bearer abc"
    );
}

#[tokio::test]
async fn unknown_member_is_none() {
    let (addr, _rec) = serve().await;

    let skills = members(addr)
        .member_skills("ghost", &token_for_tests())
        .await
        .expect("fetch");

    assert!(skills.is_none());
}

#[tokio::test]
async fn members_server_error_is_upstream_failure() {
    let (addr, _rec) = serve().await;

    let err = members(addr)
        .member_skills("flaky", &token_for_tests())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Upstream { ref handle, .. } if handle == "flaky"));
    assert!(err.is_retryable());
}

// ---------------------------------------------------------------------------
// Token provider
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_credentials_token_is_cached() {
    let (addr, rec) = serve().await;
    let auth = auth_config(addr, false);
    let provider =
        ClientCredentialsProvider::from_config(&auth, &auth.ubahn_audience, Duration::from_secs(5))
            .expect("provider");

    let first = provider.token().await.expect("token");
    let second = provider.token().await.expect("token");

    assert_eq!(first.expose(), "m2m-1");
    assert_eq!(second.expose(), "m2m-1");
    assert_eq!(rec.token_grants.load(Ordering::SeqCst), 1);

    let (line, body) = rec.requests().remove(0);
    assert_eq!(line, "POST /oauth/token");
    assert_eq!(body["grant_type"], "client_credentials");
    assert_eq!(body["client_id"], "client");
    assert_eq!(body["client_secret"], "shh");
    assert_eq!(body["audience"], "https://u-bahn.topcoder.com");
    assert!(body.get("auth0_url").is_none());
}

#[tokio::test]
async fn proxy_receives_the_real_token_url() {
    let (addr, rec) = serve().await;
    let auth = auth_config(addr, true);
    let provider = ClientCredentialsProvider::from_config(
        &auth,
        &auth.topcoder_audience,
        Duration::from_secs(5),
    )
    .expect("provider");

    provider.token().await.expect("token");

    let (_, body) = rec.requests().remove(0);
    assert_eq!(body["auth0_url"], format!("http://{addr}/oauth/token"));
    assert_eq!(body["audience"], "https://m2m.topcoder-dev.com/");
}

#[tokio::test]
async fn token_cache_time_forces_refresh() {
    let (addr, rec) = serve().await;
    let mut auth = auth_config(addr, false);
    // Shorter than the refresh margin: every call fetches.
    auth.token_cache_time_secs = Some(1);
    let provider =
        ClientCredentialsProvider::from_config(&auth, &auth.ubahn_audience, Duration::from_secs(5))
            .expect("provider");

    let first = provider.token().await.expect("token");
    let second = provider.token().await.expect("token");

    assert_ne!(first, second);
    assert_eq!(rec.token_grants.load(Ordering::SeqCst), 2);
}
