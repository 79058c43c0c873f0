//! Edit session lifecycle against the in-memory backend.

use std::sync::Arc;

use ucf_model::{SectionRecord, Value, is_temp_id};
use ucf_overlay::EditSession;
use ucf_rpc::RpcClient;
use ucf_store::{MemoryBackend, StoreClient};

fn session_with(backend: MemoryBackend) -> EditSession {
    let rpc = Arc::new(RpcClient::new(Arc::new(backend), "test-session"));
    EditSession::new(StoreClient::new(rpc), "network")
}

fn network_fixture() -> MemoryBackend {
    let mut lan = SectionRecord::new("lan", "interface");
    lan.options.insert("proto".into(), Value::from("dhcp"));
    let mut wan = SectionRecord::new("wan", "interface");
    wan.options.insert("proto".into(), Value::from("pppoe"));

    MemoryBackend::new().with_config("network", vec![lan, wan])
}

#[tokio::test]
async fn load_populates_snapshot_and_clears_overlay() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    assert_eq!(
        session.resolve("network", "lan", "proto"),
        Some(&Value::from("dhcp"))
    );
    assert!(session.overlay().is_empty());
}

#[tokio::test]
async fn staged_set_resolves_before_save() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    session
        .overlay_mut()
        .stage_set("network", "lan", "proto", Some(Value::from("static")));
    assert_eq!(
        session.resolve("network", "lan", "proto"),
        Some(&Value::from("static"))
    );
}

#[tokio::test]
async fn save_applies_overlay_and_reloads() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    session
        .overlay_mut()
        .stage_set("network", "lan", "proto", Some(Value::from("static")));
    session.overlay_mut().stage_remove_section("network", "wan");
    session.save().await.unwrap();

    // Overlay folded into the new snapshot.
    assert!(session.overlay().is_empty());
    assert_eq!(
        session.resolve("network", "lan", "proto"),
        Some(&Value::from("static"))
    );
    assert!(session.snapshot().section("network", "wan").is_none());
}

#[tokio::test]
async fn save_substitutes_real_ids_for_reordered_creates() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    let temp = session
        .overlay_mut()
        .stage_create("network", "interface", None);
    session
        .overlay_mut()
        .stage_set("network", &temp, "proto", Some(Value::from("none")));
    session.overlay_mut().stage_reorder(
        "network",
        &[temp.clone(), "lan".to_string(), "wan".to_string()],
    );

    let assigned = session.save().await.unwrap();
    let real = assigned.get(&temp).expect("assigned id for create");
    assert!(!is_temp_id(real));

    // The new section landed first in the persisted order.
    let sections = session.sections("network");
    assert_eq!(sections[0].id, *real);
    assert_eq!(
        session.resolve("network", real, "proto"),
        Some(&Value::from("none"))
    );
}

#[tokio::test]
async fn apply_executes_the_plan_but_keeps_the_overlay() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    session
        .overlay_mut()
        .stage_set("network", "lan", "proto", Some(Value::from("static")));
    session.apply().await.unwrap();

    // The write reached the store, but the staged edit survives until
    // a reload folds it into a fresh snapshot.
    assert!(!session.store().changes("network").await.unwrap().is_empty());
    assert!(!session.overlay().is_empty());

    session.load().await.unwrap();
    assert!(session.overlay().is_empty());
    assert_eq!(
        session.resolve("network", "lan", "proto"),
        Some(&Value::from("static"))
    );
}

#[tokio::test]
async fn save_without_staging_issues_no_calls_but_reloads() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    let assigned = session.save().await.unwrap();
    assert!(assigned.is_empty());
    assert!(session.store().changes("network").await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_save_leaves_overlay_and_snapshot_intact() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    // A set on a section the store does not know fails with a status
    // error at execution time.
    session
        .overlay_mut()
        .stage_set("network", "ghost", "proto", Some(Value::from("static")));
    session.save().await.unwrap_err();

    assert!(!session.overlay().is_empty());
    assert_eq!(
        session.resolve("network", "lan", "proto"),
        Some(&Value::from("dhcp"))
    );
}

#[tokio::test]
async fn auxiliary_configs_load_in_the_same_batch() {
    let backend = network_fixture().with_config(
        "dhcp",
        vec![{
            let mut s = SectionRecord::new("lan", "dhcp");
            s.options.insert("leasetime".into(), Value::from("12h"));
            s
        }],
    );
    let mut session = session_with(backend);
    session.require_config("dhcp");
    session.load().await.unwrap();

    assert_eq!(
        session.resolve("dhcp", "lan", "leasetime"),
        Some(&Value::from("12h"))
    );
}

#[tokio::test]
async fn commit_makes_server_staging_durable() {
    let mut session = session_with(network_fixture());
    session.load().await.unwrap();

    session
        .overlay_mut()
        .stage_set("network", "lan", "proto", Some(Value::from("static")));
    session.save().await.unwrap();

    assert!(!session.store().changes("network").await.unwrap().is_empty());
    session.commit().await.unwrap();
    assert!(session.store().changes("network").await.unwrap().is_empty());
}
