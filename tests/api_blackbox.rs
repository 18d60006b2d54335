use std::{
    net::TcpListener as StdTcpListener,
    process::{Child, Command, ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Mutex;

const TEST_TOKEN: &str = "abc123";

fn pick_free_port() -> u16 {
    // Bind to port 0 to let OS pick a free port.
    // We drop it immediately; slight race risk, but good enough for tests.
    let l = StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    l.local_addr().unwrap().port()
}

/// Environment every spawned server starts from. Inherited variables that
/// would change behaviour are removed.
fn base_command(tmp: &TempDir) -> Command {
    // NOTE: env!("CARGO_BIN_EXE_popdesk") is provided by Cargo for integration tests
    // and points at the compiled binary.
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_popdesk"));
    cmd.current_dir(tmp.path())
        .env_remove("PORT")
        .env_remove("WEBHOOK_PORT")
        .env_remove("WEBHOOK_AUTH_TOKEN")
        .env_remove("NGROK_AUTH_TOKEN")
        .env_remove("NGROK_DOMAIN")
        .env_remove("POPDESK_NOTIFIER")
        .env_remove("POPDESK_NTFY_URL")
        .env_remove("POPDESK_LOG_FILE")
        .env_remove("POPDESK_NO_TUNNEL")
        .env_remove("POPDESK_NGROK_BIN")
        .env("POPDESK_BIND_HOST", "127.0.0.1")
        // keep output quiet unless test fails
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

struct TestServer {
    _tmp: TempDir,
    port: u16,
    child: Child,
}

impl TestServer {
    /// Serves locally (no tunnel) and relays notifications to `ntfy_url`.
    fn start(ntfy_url: &str) -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let port = pick_free_port();

        let child = base_command(&tmp)
            .env("WEBHOOK_PORT", port.to_string())
            .env("WEBHOOK_AUTH_TOKEN", TEST_TOKEN)
            .env("POPDESK_NO_TUNNEL", "true")
            .env("POPDESK_NOTIFIER", "ntfy")
            .env("POPDESK_NTFY_URL", ntfy_url)
            .env(
                "POPDESK_LOG_FILE",
                tmp.path().join("test.log").to_string_lossy().to_string(),
            )
            .spawn()
            .expect("spawn popdesk");

        Self {
            _tmp: tmp,
            port,
            child,
        }
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Best effort cleanup
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Minimal HTTP server that captures POSTs, used to mock an ntfy endpoint.
struct MockNtfy {
    port: u16,
    received: Arc<Mutex<Vec<(Option<String>, String)>>>,
}

impl MockNtfy {
    async fn start() -> Self {
        Self::start_with_status(axum::http::StatusCode::OK).await
    }

    async fn start_with_status(status: axum::http::StatusCode) -> Self {
        use axum::{Router, extract::Query, routing::post};
        use std::collections::HashMap;

        let received: Arc<Mutex<Vec<(Option<String>, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let store = received.clone();

        let app = Router::new().route(
            "/{*path}",
            post(
                move |Query(q): Query<HashMap<String, String>>, body: String| {
                    let store = store.clone();
                    async move {
                        store.lock().await.push((q.get("title").cloned(), body));
                        status
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock ntfy");
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(axum::serve(listener, app).into_future());

        Self { port, received }
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}/test-topic", self.port)
    }

    async fn messages(&self) -> Vec<(Option<String>, String)> {
        self.received.lock().await.clone()
    }
}

async fn wait_ready(base: &str) {
    let client = reqwest::Client::new();
    let mut waited = Duration::from_millis(0);

    loop {
        match client.get(format!("{base}/")).send().await {
            Ok(resp) if resp.status().is_success() => return,
            _ => {}
        }

        if waited >= Duration::from_secs(5) {
            panic!("server did not become ready (GET /)");
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
}

/// Polls the child until it exits or `timeout` elapses.
async fn wait_exit(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        if std::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn health_ok() {
    let mock = MockNtfy::start().await;
    let srv = TestServer::start(&mock.url());
    let base = srv.base_url();
    wait_ready(&base).await;

    let body = reqwest::get(format!("{base}/"))
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    assert_eq!(
        body,
        json!({"status":"healthy","message":"PopDesk webhook server is running"})
    );
}

#[tokio::test]
async fn authorized_post_reaches_ntfy() {
    let mock = MockNtfy::start().await;
    let srv = TestServer::start(&mock.url());
    let base = srv.base_url();
    wait_ready(&base).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .bearer_auth(TEST_TOKEN)
        .json(&json!({"title": "Test", "message": "Hello"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body, json!({"status":"success","message":"Notification sent"}));

    // The relay answers only after ntfy accepted the message.
    assert_eq!(
        mock.messages().await,
        vec![(Some("Test".to_owned()), "Hello".to_owned())]
    );
}

#[tokio::test]
async fn wrong_token_never_reaches_ntfy() {
    let mock = MockNtfy::start().await;
    let srv = TestServer::start(&mock.url());
    let base = srv.base_url();
    wait_ready(&base).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .bearer_auth("wrong")
        .json(&json!({"title": "Test", "message": "Hello"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
    assert!(mock.messages().await.is_empty());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let mock = MockNtfy::start().await;
    let srv = TestServer::start(&mock.url());
    let base = srv.base_url();
    wait_ready(&base).await;

    let client = reqwest::Client::new();
    for body in ["not-json", r#"["T","M"]"#] {
        let resp = client
            .post(format!("{base}/"))
            .bearer_auth(TEST_TOKEN)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST, "body {body:?}");
    }
    assert!(mock.messages().await.is_empty());
}

#[tokio::test]
async fn ntfy_rejection_is_reported_and_server_survives() {
    let mock = MockNtfy::start_with_status(axum::http::StatusCode::SERVICE_UNAVAILABLE).await;
    let srv = TestServer::start(&mock.url());
    let base = srv.base_url();
    wait_ready(&base).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .bearer_auth(TEST_TOKEN)
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("503"));

    // Defaults were applied before delivery was attempted.
    assert_eq!(
        mock.messages().await,
        vec![(
            Some("Webhook Notification".to_owned()),
            "You received a webhook notification!".to_owned()
        )]
    );

    wait_ready(&base).await;
}

#[tokio::test]
async fn missing_auth_token_exits_with_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut child = base_command(&tmp)
        .env("WEBHOOK_PORT", pick_free_port().to_string())
        .env("POPDESK_NO_TUNNEL", "true")
        .spawn()
        .expect("spawn popdesk");

    let status = wait_exit(&mut child, Duration::from_secs(5))
        .await
        .expect("process should exit on invalid configuration");
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn placeholder_tokens_exit_with_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut child = base_command(&tmp)
        .env("WEBHOOK_PORT", pick_free_port().to_string())
        .env("WEBHOOK_AUTH_TOKEN", "your_webhook_auth_token_here")
        .env("NGROK_AUTH_TOKEN", "your_ngrok_auth_token_here")
        .spawn()
        .expect("spawn popdesk");

    let status = wait_exit(&mut child, Duration::from_secs(5))
        .await
        .expect("process should exit on placeholder configuration");
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn tunnel_failure_exits_with_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut child = base_command(&tmp)
        .env("WEBHOOK_PORT", pick_free_port().to_string())
        .env("WEBHOOK_AUTH_TOKEN", TEST_TOKEN)
        .env("NGROK_AUTH_TOKEN", "ngrok-test-token")
        .env(
            "POPDESK_NGROK_BIN",
            tmp.path().join("no-such-ngrok").to_string_lossy().to_string(),
        )
        .spawn()
        .expect("spawn popdesk");

    let status = wait_exit(&mut child, Duration::from_secs(5))
        .await
        .expect("process should exit when the tunnel cannot start");
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn dotenv_file_is_loaded() {
    let mock = MockNtfy::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let port = pick_free_port();
    std::fs::write(
        tmp.path().join(".env"),
        format!(
            "WEBHOOK_PORT={port}\nWEBHOOK_AUTH_TOKEN=from-dotenv\nPOPDESK_NO_TUNNEL=true\n\
             POPDESK_NOTIFIER=ntfy\nPOPDESK_NTFY_URL={}\n",
            mock.url()
        ),
    )
    .unwrap();

    let mut child = base_command(&tmp).spawn().expect("spawn popdesk");
    let base = format!("http://127.0.0.1:{port}");
    wait_ready(&base).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .bearer_auth("from-dotenv")
        .json(&json!({"message": "configured by .env"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
#[tokio::test]
async fn sigint_shuts_down_cleanly() {
    let mock = MockNtfy::start().await;
    let mut srv = TestServer::start(&mock.url());
    let base = srv.base_url();
    wait_ready(&base).await;

    let killed = Command::new("kill")
        .args(["-INT", &srv.child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let status = wait_exit(&mut srv.child, Duration::from_secs(5))
        .await
        .expect("server should stop after SIGINT");
    assert_eq!(status.code(), Some(0));
}
