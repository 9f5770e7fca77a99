//! End-to-end smoke tests for blockchain_service.
//!
//! Each test spawns a real node process with its own database and drives it
//! over HTTP, asserting the externally visible contract: admission codes,
//! mining, history and provenance verification.
//!
//! Run with:
//!   cargo test -p provenant-node --test smoke

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use provenant_core::{time, Action, Transaction};
use provenant_crypto::{sign_transaction, KeyPair};

// ── Key fixtures ──────────────────────────────────────────────────────────────

struct TestKeys {
    dir: PathBuf,
    supplier: KeyPair,
    distributor: KeyPair,
    retailer: KeyPair,
}

static KEYS: Lazy<TestKeys> = Lazy::new(|| {
    let dir = std::env::temp_dir().join(format!("provenant_smoke_keys_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let supplier = KeyPair::generate("Supplier_A").unwrap();
    let distributor = KeyPair::generate("Distributor_B").unwrap();
    let retailer = KeyPair::generate("Retailer_C").unwrap();
    for kp in [&supplier, &distributor, &retailer] {
        kp.write_to_dir(&dir).unwrap();
    }
    TestKeys {
        dir,
        supplier,
        distributor,
        retailer,
    }
});

fn keypair_for(actor: &str) -> &'static KeyPair {
    match actor {
        "Supplier_A" => &KEYS.supplier,
        "Distributor_B" => &KEYS.distributor,
        "Retailer_C" => &KEYS.retailer,
        other => panic!("no test key pair for {other}"),
    }
}

fn signed_tx(actor: &str, batch: &str, action: Action, metadata: &[(&str, &str)]) -> Transaction {
    let mut tx = Transaction {
        batch_id: batch.into(),
        action,
        actor: actor.into(),
        timestamp: time::now(),
        metadata: metadata
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        signature: None,
        public_key: None,
    };
    sign_transaction(keypair_for(actor), &mut tx).unwrap();
    tx
}

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_node(tag: &str, port: u16, difficulty: u32) -> NodeGuard {
    let data_dir =
        std::env::temp_dir().join(format!("provenant_smoke_{tag}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let node_bin = env!("CARGO_BIN_EXE_blockchain_service");
    let child = Command::new(node_bin)
        .args([
            "--port",
            &port.to_string(),
            "--difficulty",
            &difficulty.to_string(),
            "--db",
            data_dir.join("chain.db").to_str().unwrap(),
            "--keys-dir",
            KEYS.dir.to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn blockchain_service");

    NodeGuard { child, data_dir }
}

/// Poll `/status` until the node answers or the timeout elapses.
async fn wait_for_node(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.get(format!("{url}/status")).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

async fn chain_length(client: &reqwest::Client, url: &str) -> u64 {
    let body: serde_json::Value = client
        .get(format!("{url}/chain"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["length"].as_u64().unwrap()
}

async fn submit(client: &reqwest::Client, url: &str, tx: &Transaction) -> (u16, serde_json::Value) {
    let resp = client
        .post(format!("{url}/add-transaction"))
        .json(tx)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(serde_json::Value::Null);
    (status, body)
}

// ── Scenario: full lifecycle, history, verify ─────────────────────────────────

#[tokio::test]
async fn lifecycle_history_and_verify() {
    let port = free_port();
    let url = format!("http://127.0.0.1:{port}");
    let _guard = spawn_node("lifecycle", port, 1);

    let http = reqwest::Client::new();
    assert!(
        wait_for_node(&http, &url, Duration::from_secs(20)).await,
        "node did not become ready within 20 seconds"
    );

    // The eight lifecycle events, signed by the acting role. Admission
    // replays pending entries, so the whole path can sit in one mempool.
    let events = [
        signed_tx("Supplier_A", "COMPLETE_1", Action::Registered, &[("product", "olive oil")]),
        signed_tx("Supplier_A", "COMPLETE_1", Action::QualityChecked, &[("result", "passed"), ("inspector", "QA-7")]),
        signed_tx("Supplier_A", "COMPLETE_1", Action::Shipped, &[("from", "Supplier_A"), ("to", "Distributor_B")]),
        signed_tx("Distributor_B", "COMPLETE_1", Action::Received, &[]),
        signed_tx("Distributor_B", "COMPLETE_1", Action::Stored, &[("location", "warehouse 4")]),
        signed_tx("Distributor_B", "COMPLETE_1", Action::Delivered, &[("from", "Distributor_B"), ("to", "Retailer_C")]),
        signed_tx("Retailer_C", "COMPLETE_1", Action::ReceivedRetail, &[]),
        signed_tx("Retailer_C", "COMPLETE_1", Action::Sold, &[]),
    ];
    for tx in &events {
        let (status, body) = submit(&http, &url, tx).await;
        assert_eq!(status, 200, "submission rejected: {body}");
        assert_eq!(body["accepted"], true);
    }

    // Force a mining attempt; all eight seal into block 1.
    let resp = http.post(format!("{url}/mine")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let mined: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(mined["mined"], true);
    assert_eq!(mined["index"], 1);

    let history: serde_json::Value = http
        .get(format!("{url}/history/COMPLETE_1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["transaction_count"], 8);
    assert_eq!(history["history"][0]["action"], "registered");
    assert_eq!(history["history"][7]["action"], "sold");

    let verify: serde_json::Value = http
        .get(format!("{url}/verify/COMPLETE_1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(verify["verified"], true, "verify said: {}", verify["message"]);

    let status: serde_json::Value = http
        .get(format!("{url}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["chain_length"], 2);
    assert_eq!(status["chain_valid"], true);
    assert_eq!(status["mempool_size"], 0);
    assert_eq!(status["difficulty"], 1);

    // Nothing left to seal.
    let resp = http.post(format!("{url}/mine")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 204);
}

// ── Scenario: admission rejections ────────────────────────────────────────────

#[tokio::test]
async fn admission_rejections() {
    let port = free_port();
    let url = format!("http://127.0.0.1:{port}");
    let _guard = spawn_node("rejections", port, 1);

    let http = reqwest::Client::new();
    assert!(wait_for_node(&http, &url, Duration::from_secs(20)).await);

    // Order violation: shipped with no prior registration → 400, "Cannot…".
    let tx = signed_tx("Supplier_A", "VAL_1", Action::Shipped, &[]);
    let (status, body) = submit(&http, &url, &tx).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("Cannot"));
    assert_eq!(chain_length(&http, &url).await, 1);

    // Signature tamper: flip a metadata byte after signing → 401.
    let mut tampered = signed_tx("Supplier_A", "TAMPER_1", Action::Registered, &[("product", "sealant")]);
    tampered
        .metadata
        .insert("product".into(), "sealanT".into());
    let (status, _) = submit(&http, &url, &tampered).await;
    assert_eq!(status, 401);

    // Unsigned submission → 401 while signatures are required.
    let mut unsigned = signed_tx("Supplier_A", "UNSIGNED_1", Action::Registered, &[]);
    unsigned.signature = None;
    unsigned.public_key = None;
    let (status, _) = submit(&http, &url, &unsigned).await;
    assert_eq!(status, 401);

    // Actor not present in the key registry → 401 even with a valid
    // signature under the embedded key.
    let mut foreign = Transaction {
        batch_id: "GHOST_1".into(),
        action: Action::Registered,
        actor: "Ghost_X".into(),
        timestamp: time::now(),
        metadata: BTreeMap::new(),
        signature: None,
        public_key: None,
    };
    sign_transaction(&KEYS.supplier, &mut foreign).unwrap();
    let (status, _) = submit(&http, &url, &foreign).await;
    assert_eq!(status, 401);

    // Duplicate: identical signed fields twice → 400, once sealed → still 400.
    let dup = signed_tx("Supplier_A", "DUP_1", Action::Registered, &[]);
    let (status, _) = submit(&http, &url, &dup).await;
    assert_eq!(status, 200);
    let (status, _) = submit(&http, &url, &dup).await;
    assert_eq!(status, 400);
    let resp = http.post(format!("{url}/mine")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let (status, _) = submit(&http, &url, &dup).await;
    assert_eq!(status, 400);
}

// ── Scenario: mempool threshold triggers auto-mining ──────────────────────────

#[tokio::test]
async fn threshold_triggers_auto_mine() {
    let port = free_port();
    let url = format!("http://127.0.0.1:{port}");
    let _guard = spawn_node("threshold", port, 1);

    let http = reqwest::Client::new();
    assert!(wait_for_node(&http, &url, Duration::from_secs(20)).await);

    // Twelve distinct batches; the default threshold is ten, so the miner
    // must fire without any explicit /mine call.
    for i in 0..12 {
        let tx = signed_tx("Supplier_A", &format!("BULK_{i}"), Action::Registered, &[]);
        let (status, body) = submit(&http, &url, &tx).await;
        assert_eq!(status, 200, "submission {i} rejected: {body}");
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut sealed = false;
    while Instant::now() < deadline {
        let status: serde_json::Value = http
            .get(format!("{url}/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if status["chain_length"].as_u64().unwrap() >= 2
            && status["mempool_size"].as_u64().unwrap() < 12
        {
            sealed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert!(sealed, "auto-mine did not fire within 5 seconds of the threshold");
}
