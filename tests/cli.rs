use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use serial_test::serial;
use std::env;
use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slack_file_harvest::cli::{run, Cli, Commands};

#[test]
#[serial]
fn harvest_cli_fails_without_token() {
    let out = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("slack-file-harvest").expect("Binary exists");

    cmd.current_dir(out.path())
        .arg("harvest")
        .arg("--output-dir")
        .arg(out.path().join("harvest"))
        .env_remove("SLACK_BOT_TOKEN")
        .env("SLACK_API_BASE_URL", "http://127.0.0.1:9/api/");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("SLACK_BOT_TOKEN"));
    assert!(!out.path().join("harvest").exists());
}

/// Logs go to stderr and name the crate version; stdout stays empty.
#[test]
#[serial]
fn binary_logs_startup_with_version_on_stderr() {
    let out = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("slack-file-harvest").expect("Binary exists");

    cmd.current_dir(out.path())
        .arg("channels")
        .env_remove("SLACK_BOT_TOKEN")
        .env("RUST_LOG", "info");

    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("slack-file-harvest starting"))
        .stderr(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stderr(predicate::str::contains("slack-file-harvest aborted"));
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn missing_token_fails_before_any_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    env::remove_var("SLACK_BOT_TOKEN");
    env::set_var("SLACK_API_BASE_URL", format!("{}/api/", server.uri()));

    let out = tempfile::tempdir().unwrap();
    let cli = Cli {
        command: Commands::Harvest {
            config: None,
            output_dir: Some(out.path().join("harvest")),
        },
    };
    let result = run(cli).await;
    env::remove_var("SLACK_API_BASE_URL");

    let err = result.expect_err("run must fail without a token");
    assert!(format!("{err:#}").contains("SLACK_BOT_TOKEN"), "got: {err:#}");
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "no request may be sent: {received:?}");
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn channels_cli_prints_private_index() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [
                {"id": "C1", "name": "a", "is_private": true},
                {"id": "C7", "name": "town-square", "is_private": false}
            ]
        })))
        .mount(&server)
        .await;

    let api_base = format!("{}/api/", server.uri());
    let output = tokio::task::spawn_blocking(move || {
        let out = tempfile::tempdir().unwrap();
        Command::cargo_bin("slack-file-harvest")
            .expect("Binary exists")
            .current_dir(out.path())
            .arg("channels")
            .env("SLACK_BOT_TOKEN", "xoxb-cli-test")
            .env("SLACK_API_BASE_URL", api_base)
            .output()
            .expect("binary runs")
    })
    .await
    .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("a\tC1"), "stdout: {stdout}");
    assert!(!stdout.contains("town-square\tC7"), "stdout: {stdout}");
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
#[serial]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    env::remove_var("SLACK_BOT_TOKEN");
    let cli = Cli {
        command: Commands::Channels { config: None },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
