use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::StatusCode as HttpStatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use configs::{AppConfig, ChartConfig};
use server::routes;
use server::state::AppState;
use service::content::MemoryContents;
use service::storage::{TokenStore, VersionCache};

struct TestApp {
    base_url: String,
    remote: Arc<MemoryContents>,
    state: AppState,
    site_dir: PathBuf,
}

fn cors() -> CorsLayer { CorsLayer::very_permissive() }

/// Router over an in-memory repository; `token` seeds the credential.
async fn start_server(token: Option<&str>, variant: &str) -> anyhow::Result<TestApp> {
    let root = std::env::temp_dir().join(format!("grafer_e2e_{}", Uuid::new_v4()));
    let site_dir = root.join("site");
    let data_dir = root.join("data");
    tokio::fs::create_dir_all(site_dir.join("prisutvikling")).await?;
    tokio::fs::create_dir_all(&data_dir).await?;
    tokio::fs::write(site_dir.join("prisutvikling/index.html"), "<h1>Prisutvikling</h1>").await?;

    let mut cfg = AppConfig::default();
    cfg.site.public_base_url = "https://grafer.example.org".into();
    cfg.charts = vec![ChartConfig::new("prisutvikling")];
    cfg.embed.variant = variant.into();
    cfg.storage.site_dir = site_dir.to_string_lossy().into_owned();
    cfg.storage.data_dir = data_dir.to_string_lossy().into_owned();

    let cache = VersionCache::open(data_dir.join("version_cache.json")).await?;
    let tokens = TokenStore::open(data_dir.join("settings.json"), token.map(str::to_string)).await?;
    let remote = Arc::new(MemoryContents::requiring(tokens.credential()));

    let state = AppState::build(&cfg, remote.clone(), remote.clone(), cache, tokens);
    let app = routes::build_router(state.clone(), &cfg.storage.site_dir, cors());

    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let base_url = format!("http://{}:{}", addr.ip(), addr.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await { eprintln!("server error: {}", e); }
    });

    Ok(TestApp { base_url, remote, state, site_dir })
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn e2e_public_health() -> anyhow::Result<()> {
    let app = start_server(None, "standard").await?;
    let res = client().get(format!("{}/health", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn e2e_save_list_update_delete() -> anyhow::Result<()> {
    let app = start_server(Some("t0ken"), "standard").await?;
    let c = client();
    let versions = format!("{}/api/charts/prisutvikling/versions", app.base_url);

    let res = c.post(&versions)
        .json(&json!({"name": "Mørk 16:9", "config": {"theme": "dark"}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["id"], "mork-16-9");
    assert_eq!(body["success"], true);
    assert_eq!(body["url"], "https://grafer.example.org/prisutvikling/?version=mork-16-9");

    let res = c.post(&versions)
        .json(&json!({"name": "Lys", "config": {"theme": "light"}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);

    let list = c.get(&versions).send().await?.json::<Value>().await?;
    let items = list["versions"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "lys");
    assert_eq!(items[1]["name"], "Mørk 16:9");
    assert_eq!(items[1]["publicUrl"], "https://grafer.example.org/prisutvikling/?version=mork-16-9");
    assert!(items[1]["embedSnippet"].as_str().unwrap_or_default().contains("data-grafer-src"));
    assert!(items[1]["createdAt"].is_string());

    let res = c.put(format!("{versions}/mork-16-9"))
        .json(&json!({"config": {"theme": "darker"}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let one = c.get(format!("{versions}/mork-16-9")).send().await?.json::<Value>().await?;
    assert_eq!(one["config"]["theme"], "darker");
    assert!(one["updatedAt"].is_string());

    let res = c.patch(format!("{versions}/lys"))
        .json(&json!({"name": "Lys tema"}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = c.delete(format!("{versions}/mork-16-9")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NO_CONTENT);
    let res = c.get(format!("{versions}/mork-16-9")).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);

    let stored = app.remote.content("prisutvikling/versions.json").await.unwrap_or_default();
    assert!(stored.contains("Lys tema"));
    assert!(!stored.contains("mork-16-9"));
    assert!(app.remote.last_message("prisutvikling/versions.json").await.unwrap_or_default().starts_with("Delete"));
    Ok(())
}

#[tokio::test]
async fn e2e_missing_token_is_unauthorized_until_set() -> anyhow::Result<()> {
    let app = start_server(None, "standard").await?;
    let c = client();
    let versions = format!("{}/api/charts/prisutvikling/versions", app.base_url);

    let res = c.post(&versions).json(&json!({"name": "A", "config": {}})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::UNAUTHORIZED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "auth");

    let status = c.get(format!("{}/api/settings/token", app.base_url)).send().await?.json::<Value>().await?;
    assert_eq!(status["configured"], false);

    let res = c.put(format!("{}/api/settings/token", app.base_url)).json(&json!({"token": "  "})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    let res = c.put(format!("{}/api/settings/token", app.base_url)).json(&json!({"token": "ghp_x"})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);

    let res = c.post(&versions).json(&json!({"name": "A", "config": {}})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::CREATED);

    let res = c.delete(format!("{}/api/settings/token", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NO_CONTENT);
    assert!(!app.state.tokens.credential().is_configured());
    Ok(())
}

#[tokio::test]
async fn e2e_unknown_chart_and_bad_input() -> anyhow::Result<()> {
    let app = start_server(Some("t0ken"), "standard").await?;
    let c = client();

    let res = c.get(format!("{}/api/charts/nope/versions", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);

    let res = c.post(format!("{}/api/charts/prisutvikling/versions", app.base_url))
        .json(&json!({"name": "   ", "config": {}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["kind"], "validation");

    let res = c.put(format!("{}/api/charts/prisutvikling/versions/ghost", app.base_url))
        .json(&json!({"config": {}}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn e2e_reload_prefers_published_file() -> anyhow::Result<()> {
    let app = start_server(Some("t0ken"), "standard").await?;
    app.remote.put_unchecked(
        "prisutvikling/versions.json",
        r#"{"versions": {"a": {"id": "a", "name": "A", "createdAt": "2024-01-01T00:00:00Z", "config": {}}}}"#,
    ).await;

    let res = client().post(format!("{}/api/charts/prisutvikling/reload", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["source"], "published");
    assert_eq!(body["count"], 1);
    Ok(())
}

#[tokio::test]
async fn e2e_embed_script_follows_variant() -> anyhow::Result<()> {
    let app = start_server(None, "padded").await?;
    let res = client().get(format!("{}/embed.js", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let ct = res.headers().get("content-type").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
    assert!(ct.starts_with("application/javascript"));
    let js = res.text().await?;
    assert!(js.contains("var DEFAULT_HEIGHT = 600;"));
    assert!(js.contains("var BUFFER = 5;"));
    Ok(())
}

#[tokio::test]
async fn e2e_static_site_and_metrics() -> anyhow::Result<()> {
    let app = start_server(None, "standard").await?;
    let c = client();
    let page = c.get(format!("{}/prisutvikling/index.html", app.base_url)).send().await?;
    assert_eq!(page.status(), HttpStatusCode::OK);
    assert!(page.text().await?.contains("Prisutvikling"));

    let res = c.get(format!("{}/metrics", app.base_url)).send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn e2e_csv_saves() -> anyhow::Result<()> {
    let app = start_server(Some("t0ken"), "standard").await?;
    let c = client();

    let res = c.post(format!("{}/save-csv", app.base_url))
        .json(&json!({"csv": "år;pris\n2024;10\n", "folder": "prisutvikling"}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let res = c.post(format!("{}/save-csv", app.base_url))
        .json(&json!({"csv": "år;pris\n2024;11\n", "folder": "prisutvikling"}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    assert_eq!(res.json::<Value>().await?["success"], true);
    let backup = tokio::fs::read_to_string(app.site_dir.join("prisutvikling/data_backup.csv")).await?;
    assert_eq!(backup, "år;pris\n2024;10\n");

    let res = c.post(format!("{}/save-csv", app.base_url)).json(&json!({"folder": "prisutvikling"})).send().await?;
    assert_eq!(res.status(), HttpStatusCode::BAD_REQUEST);

    let res = c.post(format!("{}/api/charts/prisutvikling/csv", app.base_url))
        .json(&json!({"csv": "a;b\n1;2\n", "message": "Nye tall"}))
        .send().await?;
    assert_eq!(res.status(), HttpStatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["path"], "prisutvikling/data.csv");
    assert_eq!(app.remote.content("prisutvikling/data.csv").await.as_deref(), Some("a;b\n1;2\n"));

    let _ = tokio::fs::remove_dir_all(app.site_dir.parent().unwrap_or(&app.site_dir)).await;
    Ok(())
}

#[tokio::test]
async fn startup_bootstraps_from_site_dir_without_published_url() -> anyhow::Result<()> {
    let root = std::env::temp_dir().join(format!("grafer_boot_{}", Uuid::new_v4()));
    let site_dir = root.join("site");
    tokio::fs::create_dir_all(site_dir.join("prisutvikling")).await?;
    tokio::fs::write(
        site_dir.join("prisutvikling/versions.json"),
        r#"{"versions": {"lys": {"id": "lys", "name": "Lys", "createdAt": "2024-03-01T00:00:00Z", "config": {}}}}"#,
    )
    .await?;

    let mut cfg = AppConfig::default();
    cfg.charts = vec![ChartConfig::new("prisutvikling")];
    cfg.storage.site_dir = site_dir.to_string_lossy().into_owned();
    cfg.storage.data_dir = root.join("data").to_string_lossy().into_owned();
    tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
    assert_eq!(cfg.site.published_base(), None);

    let (state, _app) = server::startup::build_app(&cfg).await?;
    state.load_all().await;

    let versions = state.chart("prisutvikling")?.list_sorted_by_recency().await;
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].name, "Lys");

    let _ = tokio::fs::remove_dir_all(&root).await;
    Ok(())
}
