//! End-to-end test: spawns the real `ledger-server` binary against a
//! temporary config and SQLite file, and drives it over HTTP exactly the
//! way a registering instance would.

use ledger_core::{Clock, KeyScope, SystemClock, bootstrap_canonical_message, derive_instance_key, instance_canonical_message, sign};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const BOOTSTRAP_TOKEN: &str = "billing-bootstrap-secret";
const BOOTSTRAP_KID: &str = "v1";
const BOOTSTRAP_REF: &str = "ref-billing";
const START_TIMEOUT: Duration = Duration::from_secs(15);

struct Harness {
    _tmp: tempfile::TempDir,
    base: String,
    child: Child,
}

impl Harness {
    async fn start() -> Self {
        let tmp = tempfile::tempdir().expect("temp dir");
        let port = choose_port();
        let config_path = write_config(tmp.path(), port);
        let child = spawn(&config_path);

        let base = format!("http://127.0.0.1:{port}");
        wait_for_health(&format!("{base}/healthz")).await;

        Self { _tmp: tmp, base, child }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn choose_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .unwrap()
        .port()
}

fn write_config(dir: &Path, port: u16) -> PathBuf {
    let sqlite = dir.join("ledger.db");
    let config_path = dir.join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
name = "ledger-test"
env = "test"
sqlite = "{sqlite}"
bootstrap_ts_window_secs = 60
instance_ts_window_secs = 60

[bind.http]
ip = "127.0.0.1"
port = {port}

[bootstrap_secrets.{secret_ref}]
kid = "{kid}"
token = "{token}"
"#,
            sqlite = sqlite.display(),
            port = port,
            secret_ref = BOOTSTRAP_REF,
            kid = BOOTSTRAP_KID,
            token = BOOTSTRAP_TOKEN,
        ),
    )
    .expect("write config");
    config_path
}

fn spawn(config_path: &Path) -> Child {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_ledger-server"));
    Command::new(bin)
        .arg("--config")
        .arg(config_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn ledger-server")
}

async fn wait_for_health(url: &str) {
    let client = reqwest::Client::new();
    let deadline = Instant::now() + START_TIMEOUT;
    loop {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server never became healthy at {url}");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

fn bootstrap_headers(ts: i64, nonce: &str, body: &[u8]) -> (String, String, String) {
    let sig = sign(BOOTSTRAP_TOKEN.as_bytes(), &bootstrap_canonical_message(ts, nonce, body));
    (ts.to_string(), nonce.to_string(), sig)
}

fn instance_headers(method: &str, path: &str, ts: i64, nonce: &str, body: &[u8], instance_id: &str) -> String {
    let key = derive_instance_key(KeyScope::Client, BOOTSTRAP_TOKEN.as_bytes(), instance_id);
    sign(&key, &instance_canonical_message(method, path, ts, nonce, body))
}

#[tokio::test]
async fn register_then_heartbeat_then_snapshot_round_trip() {
    let harness = Harness::start().await;
    let client = reqwest::Client::new();
    let clock = SystemClock;

    let register_body = serde_json::json!({
        "service_name": "billing",
        "base_url": "http://127.0.0.1:9",
        "bootstrap_secret_ref": BOOTSTRAP_REF,
        "heartbeat_interval_sec": 10,
        "boot_id": "boot-1",
        "node_id": "node-1",
    });
    let raw_body = serde_json::to_vec(&register_body).unwrap();
    let ts = clock.now_unix();
    let (ts_h, nonce_h, sig_h) = bootstrap_headers(ts, "register-nonce-1", &raw_body);

    let register_resp = client
        .post(format!("{}/v1/services/register", harness.base))
        .header("authorization", format!("Bearer {BOOTSTRAP_TOKEN}"))
        .header("x-timestamp", ts_h)
        .header("x-nonce", nonce_h)
        .header("x-signature", sig_h)
        .header("content-type", "application/json")
        .body(raw_body)
        .send()
        .await
        .expect("register request");

    assert_eq!(register_resp.status(), 200);
    let register_json: serde_json::Value = register_resp.json().await.unwrap();
    let instance_id = register_json["instance_id"].as_str().unwrap().to_string();
    assert_eq!(register_json["push_kid"], BOOTSTRAP_KID);
    assert_eq!(register_json["registry_version"], 1);

    // Heartbeat, signed as the now-registered instance.
    let hb_path = format!("/v1/services/{instance_id}/heartbeat");
    let hb_ts = clock.now_unix();
    let hb_sig = instance_headers("POST", &hb_path, hb_ts, "hb-nonce-1", b"", &instance_id);

    let hb_resp = client
        .post(format!("{}{hb_path}", harness.base))
        .header("x-timestamp", hb_ts.to_string())
        .header("x-nonce", "hb-nonce-1")
        .header("x-key-id", BOOTSTRAP_KID)
        .header("x-signature", hb_sig)
        .send()
        .await
        .expect("heartbeat request");

    assert_eq!(hb_resp.status(), 200);
    let hb_json: serde_json::Value = hb_resp.json().await.unwrap();
    assert_eq!(hb_json["instance_id"], instance_id);
    assert_eq!(hb_json["status"], "UP");

    // Snapshot pull, authenticated via X-Instance-Id instead of a path segment.
    let snap_ts = clock.now_unix();
    let snap_sig = instance_headers("GET", "/v1/services/snapshot", snap_ts, "snap-nonce-1", b"", &instance_id);

    let snap_resp = client
        .get(format!("{}/v1/services/snapshot", harness.base))
        .header("x-instance-id", &instance_id)
        .header("x-timestamp", snap_ts.to_string())
        .header("x-nonce", "snap-nonce-1")
        .header("x-key-id", BOOTSTRAP_KID)
        .header("x-signature", snap_sig)
        .send()
        .await
        .expect("snapshot request");

    assert_eq!(snap_resp.status(), 200);
    let snap_json: serde_json::Value = snap_resp.json().await.unwrap();
    assert_eq!(snap_json["version"], 1);
    assert_eq!(snap_json["services"][0]["name"], "billing");
}

#[tokio::test]
async fn register_with_bad_signature_is_rejected() {
    let harness = Harness::start().await;
    let client = reqwest::Client::new();
    let clock = SystemClock;

    let register_body = serde_json::json!({
        "service_name": "billing",
        "base_url": "http://127.0.0.1:9",
        "bootstrap_secret_ref": BOOTSTRAP_REF,
        "heartbeat_interval_sec": 10,
    });
    let raw_body = serde_json::to_vec(&register_body).unwrap();
    let ts = clock.now_unix();

    let resp = client
        .post(format!("{}/v1/services/register", harness.base))
        .header("authorization", format!("Bearer {BOOTSTRAP_TOKEN}"))
        .header("x-timestamp", ts.to_string())
        .header("x-nonce", "bad-sig-nonce")
        .header("x-signature", "sha256=deadbeef")
        .body(raw_body)
        .send()
        .await
        .expect("register request");

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn register_without_authorization_header_is_rejected() {
    let harness = Harness::start().await;
    let client = reqwest::Client::new();
    let clock = SystemClock;

    let register_body = serde_json::json!({
        "service_name": "billing",
        "base_url": "http://127.0.0.1:9",
        "bootstrap_secret_ref": BOOTSTRAP_REF,
        "heartbeat_interval_sec": 10,
    });
    let raw_body = serde_json::to_vec(&register_body).unwrap();
    let ts = clock.now_unix();
    let (ts_h, nonce_h, sig_h) = bootstrap_headers(ts, "no-auth-nonce", &raw_body);

    let resp = client
        .post(format!("{}/v1/services/register", harness.base))
        .header("x-timestamp", ts_h)
        .header("x-nonce", nonce_h)
        .header("x-signature", sig_h)
        .body(raw_body)
        .send()
        .await
        .expect("register request");

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn admin_reads_reflect_registry_state() {
    let harness = Harness::start().await;
    let client = reqwest::Client::new();

    let version_before: serde_json::Value = client
        .get(format!("{}/v1/registry/version", harness.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(version_before["registry_version"], 0);

    let services: serde_json::Value = client
        .get(format!("{}/v1/services", harness.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(services.as_array().unwrap().len(), 0);

    let unknown = client
        .get(format!("{}/v1/services/by-name/nonexistent", harness.base))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 400);
}
