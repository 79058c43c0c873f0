//! Form lifecycle against the in-memory backend.

use std::sync::Arc;

use ucf_form::{FieldSpec, Form, FormError, FormSession, FormState, SectionSpec, TabSpec};
use ucf_model::{SectionRecord, Value};
use ucf_rpc::RpcClient;
use ucf_store::{MemoryBackend, StoreClient};
use ucf_validate::DepRule;

fn network_backend() -> MemoryBackend {
    let mut lan = SectionRecord::new("lan", "interface");
    lan.options.insert("proto".into(), Value::from("dhcp"));
    let mut wan = SectionRecord::new("wan", "interface");
    wan.options.insert("proto".into(), Value::from("pppoe"));

    MemoryBackend::new().with_config("network", vec![lan, wan])
}

fn interface_form() -> Form {
    Form::new("network").section(
        SectionSpec::new("interface")
            .addremove(true)
            .sortable(true)
            .field(FieldSpec::new("proto"))
            .field(
                FieldSpec::new("ipaddr")
                    .datatype("ip4addr")
                    .depends(DepRule::equals("proto", "static")),
            )
            .field(
                FieldSpec::new("metric")
                    .datatype("range(0,10)")
                    .optional(true),
            ),
    )
}

fn session_with(backend: MemoryBackend, form: Form) -> FormSession {
    let rpc = Arc::new(RpcClient::new(Arc::new(backend), "test-session"));
    FormSession::new(StoreClient::new(rpc), form).unwrap()
}

#[tokio::test]
async fn load_reaches_ready_and_exposes_instances() {
    let mut form = session_with(network_backend(), interface_form());
    assert_eq!(form.state(), FormState::Unloaded);

    form.load().await.unwrap();
    assert_eq!(form.state(), FormState::Ready);

    let spec = form.form().sections[0].clone();
    let ids: Vec<String> = form.instances(&spec).into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["lan".to_string(), "wan".to_string()]);
}

#[tokio::test]
async fn values_fall_back_to_the_store() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    assert_eq!(
        form.value("lan", "proto").unwrap(),
        Some(Value::from("dhcp"))
    );
    form.set_value("lan", "proto", Some(Value::from("static")))
        .unwrap();
    assert_eq!(
        form.value("lan", "proto").unwrap(),
        Some(Value::from("static"))
    );
}

#[tokio::test]
async fn dependent_field_toggles_with_its_controller() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    assert!(!form.field_active("lan", "ipaddr").unwrap());

    form.set_value("lan", "proto", Some(Value::from("static")))
        .unwrap();
    assert!(form.field_active("lan", "ipaddr").unwrap());
}

#[tokio::test]
async fn validation_blocks_save_and_rolls_errors_up() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    form.set_value("lan", "proto", Some(Value::from("static")))
        .unwrap();
    // ipaddr is now active, required and empty.
    match form.save().await.unwrap_err() {
        FormError::Validation { errors } => assert_eq!(errors, 1),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(form.state(), FormState::Ready);
    assert_eq!(
        form.field_error("lan", "ipaddr"),
        Some("Field must not be empty")
    );
    assert_eq!(form.section_error_count("lan"), 1);

    form.set_value("lan", "ipaddr", Some(Value::from("not-an-ip")))
        .unwrap();
    assert_eq!(
        form.field_error("lan", "ipaddr"),
        Some("Must be a valid IPv4 address")
    );

    form.set_value("lan", "ipaddr", Some(Value::from("10.0.0.1")))
        .unwrap();
    assert_eq!(form.field_error("lan", "ipaddr"), None);
    assert_eq!(form.error_count(), 0);
}

#[tokio::test]
async fn inactive_fields_skip_validation() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    // proto is dhcp, so ipaddr is inactive; a bad staged value must
    // not block saving.
    form.set_value("lan", "ipaddr", Some(Value::from("garbage")))
        .unwrap();
    assert_eq!(form.field_error("lan", "ipaddr"), None);
    form.save().await.unwrap();
}

#[tokio::test]
async fn save_persists_only_changed_values() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    // Writing back the unchanged value stages nothing.
    form.set_value("wan", "proto", Some(Value::from("pppoe")))
        .unwrap();
    form.set_value("lan", "proto", Some(Value::from("static")))
        .unwrap();
    form.set_value("lan", "ipaddr", Some(Value::from("10.0.0.1")))
        .unwrap();
    form.save().await.unwrap();

    let changes = form.session().store().changes("network").await.unwrap();
    assert!(changes.iter().all(|row| row[1] == "lan"));
    assert_eq!(
        form.value("lan", "ipaddr").unwrap(),
        Some(Value::from("10.0.0.1"))
    );
}

#[tokio::test]
async fn unkept_fields_are_deleted_when_inactive() {
    let form_spec = Form::new("network").section(
        SectionSpec::new("interface")
            .field(FieldSpec::new("proto"))
            .field(
                FieldSpec::new("ipaddr")
                    .datatype("ip4addr")
                    .keep(false)
                    .depends(DepRule::equals("proto", "static")),
            ),
    );

    let mut lan = SectionRecord::new("lan", "interface");
    lan.options.insert("proto".into(), Value::from("dhcp"));
    lan.options.insert("ipaddr".into(), Value::from("10.0.0.1"));
    let backend = MemoryBackend::new().with_config("network", vec![lan]);

    let mut form = session_with(backend, form_spec);
    form.load().await.unwrap();

    // ipaddr is inactive under proto=dhcp and keep=false, so saving
    // drops the stale stored value.
    form.save().await.unwrap();
    assert_eq!(form.value("lan", "ipaddr").unwrap(), None);
}

#[tokio::test]
async fn tabbed_fields_resolve_and_validate_like_direct_ones() {
    let form_spec = Form::new("network").section(
        SectionSpec::new("interface")
            .field(FieldSpec::new("proto"))
            .tab(
                TabSpec::new("advanced")
                    .caption("Advanced Settings")
                    .field(
                        FieldSpec::new("metric")
                            .datatype("uinteger")
                            .optional(true),
                    )
                    .field(FieldSpec::new("mtu").datatype("range(576,9200)")),
            ),
    );

    let mut form = session_with(network_backend(), form_spec);
    form.load().await.unwrap();

    form.set_value("lan", "mtu", Some(Value::from("64"))).unwrap();
    assert_eq!(
        form.field_error("lan", "mtu"),
        Some("Must be a number between 576 and 9200")
    );

    form.set_value("lan", "mtu", Some(Value::from("1500")))
        .unwrap();
    form.set_value("wan", "mtu", Some(Value::from("1492")))
        .unwrap();
    form.save().await.unwrap();
    assert_eq!(form.value("lan", "mtu").unwrap(), Some(Value::from("1500")));
}

#[tokio::test]
async fn execution_failure_returns_to_ready_with_edits_intact() {
    // The section override points at a section the store does not
    // know, so the staged set fails at execution time.
    let form_spec = Form::new("network").section(
        SectionSpec::new("interface")
            .field(FieldSpec::new("proto"))
            .field(FieldSpec::new("dns").section("ghost").optional(true)),
    );
    let mut form = session_with(network_backend(), form_spec);
    form.load().await.unwrap();

    form.set_value("lan", "dns", Some(Value::from("10.0.0.53")))
        .unwrap();
    form.save().await.unwrap_err();

    assert_eq!(form.state(), FormState::Ready);
    assert_eq!(
        form.value("lan", "dns").unwrap(),
        Some(Value::from("10.0.0.53"))
    );
}

#[tokio::test]
async fn add_and_remove_respect_the_capability_flag() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    let temp = form.add_section("interface", None).unwrap();
    form.set_value(&temp, "proto", Some(Value::from("none")))
        .unwrap();

    let assigned = form.save().await.unwrap();
    let real = assigned.get(&temp).unwrap();
    assert_eq!(form.value(real, "proto").unwrap(), Some(Value::from("none")));

    form.remove_section(real).unwrap();
    form.save().await.unwrap();
    let spec = form.form().sections[0].clone();
    assert_eq!(form.instances(&spec).len(), 2);
}

#[tokio::test]
async fn add_is_rejected_without_the_capability() {
    let form_spec =
        Form::new("network").section(SectionSpec::new("interface").field(FieldSpec::new("proto")));
    let mut form = session_with(network_backend(), form_spec);
    form.load().await.unwrap();

    assert!(matches!(
        form.add_section("interface", None),
        Err(FormError::AddRemoveDisabled(_))
    ));
}

#[tokio::test]
async fn readonly_forms_refuse_to_save() {
    let mut form = session_with(network_backend(), interface_form().readonly(true));
    form.load().await.unwrap();

    assert!(matches!(form.save().await, Err(FormError::ReadOnly)));
}

#[tokio::test]
async fn discard_drops_edits_and_unloads() {
    let mut form = session_with(network_backend(), interface_form());
    form.load().await.unwrap();

    form.set_value("lan", "proto", Some(Value::from("static")))
        .unwrap();
    form.discard();
    assert_eq!(form.state(), FormState::Unloaded);
    assert!(matches!(
        form.set_value("lan", "proto", Some(Value::from("static"))),
        Err(FormError::NotLoaded)
    ));

    form.load().await.unwrap();
    assert_eq!(
        form.value("lan", "proto").unwrap(),
        Some(Value::from("dhcp"))
    );
}

#[tokio::test]
async fn auxiliary_config_fields_load_and_save() {
    let backend = network_backend().with_config(
        "dhcp",
        vec![{
            let mut s = SectionRecord::new("lan", "dhcp");
            s.options.insert("leasetime".into(), Value::from("12h"));
            s
        }],
    );

    let form_spec = Form::new("network").section(
        SectionSpec::new("interface")
            .filter(|record| record.id == "lan")
            .field(FieldSpec::new("proto"))
            .field(
                FieldSpec::new("leasetime")
                    .config("dhcp")
                    .section("lan")
                    .optional(true),
            ),
    );

    let mut form = session_with(backend, form_spec);
    form.load().await.unwrap();

    assert_eq!(
        form.value("lan", "leasetime").unwrap(),
        Some(Value::from("12h"))
    );
    form.set_value("lan", "leasetime", Some(Value::from("24h")))
        .unwrap();
    form.save().await.unwrap();
    assert_eq!(
        form.value("lan", "leasetime").unwrap(),
        Some(Value::from("24h"))
    );
}

#[tokio::test]
async fn compile_errors_surface_at_construction() {
    let rpc = Arc::new(RpcClient::new(Arc::new(network_backend()), "test-session"));
    let form_spec = Form::new("network").section(
        SectionSpec::new("interface").field(FieldSpec::new("proto").datatype("bogus")),
    );
    assert!(matches!(
        FormSession::new(StoreClient::new(rpc), form_spec),
        Err(FormError::Compile(_))
    ));
}
