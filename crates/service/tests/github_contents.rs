use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use configs::GithubConfig;
use service::content::{ContentStore, GithubContents};
use service::credentials::Credential;
use service::errors::{ConflictKind, ServiceError};

const TOKEN: &str = "test-token";

#[derive(Default)]
struct FakeRepo {
    files: Mutex<HashMap<String, (String, String)>>,
    next_sha: Mutex<u64>,
}

impl FakeRepo {
    fn sha(&self) -> String {
        let mut n = self.next_sha.lock().unwrap();
        *n += 1;
        format!("{:040x}", *n)
    }
}

#[derive(Deserialize)]
struct PutBody {
    message: String,
    content: String,
    branch: String,
    sha: Option<String>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false)
}

fn wrap60(b64: &str) -> String {
    b64.as_bytes()
        .chunks(60)
        .map(|c| format!("{}\n", String::from_utf8_lossy(c)))
        .collect()
}

async fn get_contents(
    State(repo): State<Arc<FakeRepo>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
    }
    if path == "boom.json" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "Server Error"})));
    }
    assert_eq!(q.get("ref").map(String::as_str), Some("main"));
    match repo.files.lock().unwrap().get(&path) {
        Some((content, sha)) => (
            StatusCode::OK,
            Json(json!({"sha": sha, "content": wrap60(content), "encoding": "base64"})),
        ),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))),
    }
}

async fn put_contents(
    State(repo): State<Arc<FakeRepo>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<PutBody>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Bad credentials"})));
    }
    assert_eq!(body.branch, "main");
    assert!(!body.message.is_empty());
    let new_sha = repo.sha();
    let mut files = repo.files.lock().unwrap();
    let current = files.get(&path).map(|(_, sha)| sha.clone());
    match (current, body.sha) {
        (Some(_), None) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": "\"sha\" wasn't supplied."})));
        }
        (Some(cur), Some(sent)) if cur != sent => {
            return (StatusCode::CONFLICT, Json(json!({"message": format!("{path} does not match {sent}")})));
        }
        (None, Some(_)) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": "sha does not match any file"})));
        }
        _ => {}
    }
    files.insert(path, (body.content, new_sha.clone()));
    (
        StatusCode::OK,
        Json(json!({
            "content": {"sha": new_sha},
            "commit": {"html_url": format!("https://example.test/commit/{new_sha}")}
        })),
    )
}

async fn start_fake() -> anyhow::Result<String> {
    let repo = Arc::new(FakeRepo::default());
    let app = Router::new()
        .route("/repos/:owner/:repo/contents/*path", get(get_contents).put(put_contents))
        .with_state(repo);
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("fake api error: {}", e); }
    });
    Ok(format!("http://{}:{}", addr.ip(), addr.port()))
}

fn client(base: &str, token: Option<&str>) -> GithubContents {
    let cfg = GithubConfig {
        api_base: base.to_string(),
        owner: "grafer".into(),
        repo: "site".into(),
        request_timeout_secs: 5,
        ..GithubConfig::default()
    };
    GithubContents::new(&cfg, Credential::new(token.map(str::to_string))).expect("client")
}

#[tokio::test]
async fn create_read_update_round_trip() -> anyhow::Result<()> {
    let base = start_fake().await?;
    let gh = client(&base, Some(TOKEN));

    assert!(gh.read("prisutvikling/versions.json").await?.is_none());

    let text = "{\n  \"versions\": {\n    \"mork\": {\"name\": \"Mørk – 16:9 📈\"}\n  }\n}\n";
    let created = gh.write("prisutvikling/versions.json", text, "Save version \"Mørk\" (prisutvikling)", None).await?;
    assert!(created.commit_url.as_deref().unwrap_or_default().contains(created.tag.as_str()));

    let read = gh.read("prisutvikling/versions.json").await?.expect("file exists");
    assert_eq!(read.content, text);
    assert_eq!(read.tag, created.tag);

    let updated = gh.write("prisutvikling/versions.json", "{}\n", "Delete version", Some(&read.tag)).await?;
    assert_ne!(updated.tag, read.tag);
    Ok(())
}

#[tokio::test]
async fn stale_and_conflicting_writes_are_distinct() -> anyhow::Result<()> {
    let base = start_fake().await?;
    let alice = client(&base, Some(TOKEN));
    let bob = client(&base, Some(TOKEN));

    alice.write("v.json", "{}", "create", None).await?;
    let a = alice.read("v.json").await?.expect("exists");
    let b = bob.read("v.json").await?.expect("exists");

    alice.write("v.json", "{\"a\":1}", "alice", Some(&a.tag)).await?;
    let err = bob.write("v.json", "{\"b\":1}", "bob", Some(&b.tag)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { kind: ConflictKind::ChangedRemotely, .. }));

    let err = bob.write("v.json", "{\"b\":1}", "bob create", None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { kind: ConflictKind::Stale, .. }));

    let fresh = bob.read("v.json").await?.expect("exists");
    bob.write("v.json", "{\"b\":1}", "bob retry", Some(&fresh.tag)).await?;
    Ok(())
}

#[tokio::test]
async fn bad_token_and_server_errors_map_to_taxonomy() -> anyhow::Result<()> {
    let base = start_fake().await?;

    let wrong = client(&base, Some("expired"));
    assert!(matches!(wrong.read("v.json").await, Err(ServiceError::Auth(_))));
    assert!(matches!(wrong.write("v.json", "{}", "m", None).await, Err(ServiceError::Auth(_))));

    let gh = client(&base, Some(TOKEN));
    match gh.read("boom.json").await {
        Err(ServiceError::Transport { status: Some(500), .. }) => {}
        other => panic!("expected transport error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_api_is_transport_error_without_status() {
    let gh = client("http://127.0.0.1:9", Some(TOKEN));
    match gh.read("v.json").await {
        Err(ServiceError::Transport { status: None, .. }) => {}
        other => panic!("expected transport error, got {other:?}"),
    }
}
