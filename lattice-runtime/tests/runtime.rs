//! End-to-end incremental resolution over the shared web-app fixture.

use crate::utils::{test_resolver, webapp_definition, webapp_instance};
use lattice_runtime::{GraphBuilder, ResourceState, Runtime};
use serde_json::json;

fn built_graph() -> lattice_runtime::Graph {
    GraphBuilder::new(test_resolver())
        .build(&webapp_definition())
        .unwrap()
}

#[test]
fn static_variables_resolve_at_construction() {
    let graph = built_graph();
    let runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    // The configmap only needs the instance spec.
    let (object, state) = runtime.get_resource("configmap").unwrap();
    assert_eq!(state, ResourceState::Resolved);
    let object = object.unwrap();
    assert_eq!(object["metadata"]["name"], json!("shop-config"));
    assert_eq!(object["data"]["DB_NAME"], json!("db-shop"));

    // The secret still waits on the configmap's observed state.
    let (object, state) = runtime.get_resource("secret").unwrap();
    assert_eq!(state, ResourceState::WaitingOnDependencies);
    assert!(object.is_none());
}

#[test]
fn resolution_cascades_along_the_topological_order() {
    let graph = built_graph();
    let mut runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    runtime
        .set_resource(
            "configmap",
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "shop-config"},
                "data": {"DB_NAME": "db-shop"},
            }),
        )
        .unwrap();
    assert!(runtime.synchronize().unwrap());

    let (object, state) = runtime.get_resource("secret").unwrap();
    assert_eq!(state, ResourceState::Resolved);
    assert_eq!(
        object.unwrap()["stringData"]["DB_URL"],
        json!("postgres://db-shop.cluster.local")
    );

    runtime
        .set_resource(
            "secret",
            json!({
                "apiVersion": "v1",
                "kind": "Secret",
                "metadata": {"name": "shop-secret"},
            }),
        )
        .unwrap();
    assert!(runtime.synchronize().unwrap());

    let (object, state) = runtime.get_resource("deployment").unwrap();
    assert_eq!(state, ResourceState::Resolved);
    let deployment = object.unwrap();
    // Standalone substitution keeps the native integer type.
    assert_eq!(deployment["spec"]["replicas"], json!(2));
    assert_eq!(
        deployment["spec"]["template"]["spec"]["containers"][0]["envFrom"][0]["secretRef"]
            ["name"],
        json!("shop-secret")
    );
    assert_eq!(
        deployment["spec"]["template"]["spec"]["containers"][0]["image"],
        json!("nginx:1.27")
    );
}

#[test]
fn synchronize_reaches_a_fixed_point() {
    let graph = built_graph();
    let mut runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    runtime
        .set_resource("configmap", json!({"data": {"DB_NAME": "db-shop"}}))
        .unwrap();
    runtime
        .set_resource("secret", json!({"metadata": {"name": "shop-secret"}}))
        .unwrap();
    runtime
        .set_resource("deployment", json!({"status": {"readyReplicas": 2}}))
        .unwrap();

    // Reporting every vertex lets a synchronize pass resolve every cached
    // expression; the pass after that reports the fixed point.
    assert!(runtime.synchronize().unwrap());
    assert!(!runtime.synchronize().unwrap());
    assert!(!runtime.synchronize().unwrap());
}

#[test]
fn status_aggregates_partially() {
    let graph = built_graph();
    let mut runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    runtime
        .set_resource("configmap", json!({"data": {"DB_NAME": "db-shop"}}))
        .unwrap();
    assert!(runtime.synchronize().unwrap());

    // The configmap-derived status field is set; the deployment-derived
    // one is still absent.
    let status = &runtime.instance()["status"];
    assert_eq!(status["dbName"], json!("db-shop"));
    assert!(status.get("ready").is_none());

    runtime
        .set_resource("deployment", json!({"status": {"readyReplicas": 0}}))
        .unwrap();
    assert!(runtime.synchronize().unwrap());
    assert_eq!(runtime.instance()["status"]["ready"], json!(false));
}

#[test]
fn readiness_follows_ready_when() {
    let graph = built_graph();
    let mut runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    let (ready, reason) = runtime.is_resource_ready("deployment").unwrap();
    assert!(!ready);
    assert!(reason.unwrap().contains("not been observed"));

    runtime
        .set_resource("deployment", json!({"status": {"readyReplicas": 0}}))
        .unwrap();
    let (ready, reason) = runtime.is_resource_ready("deployment").unwrap();
    assert!(!ready);
    assert_eq!(reason.unwrap(), "deployment.status.readyReplicas > 0");

    runtime
        .set_resource("deployment", json!({"status": {"readyReplicas": 2}}))
        .unwrap();
    let (ready, reason) = runtime.is_resource_ready("deployment").unwrap();
    assert!(ready);
    assert!(reason.is_none());

    // A resource with no readyWhen conditions is ready once observed.
    runtime.set_resource("configmap", json!({})).unwrap();
    assert!(runtime.is_resource_ready("configmap").unwrap().0);
}

#[test]
fn include_when_cascades_to_dependents() {
    let mut definition = webapp_definition();
    definition.resources[1].include_when = vec!["${schema.spec.enabled}".to_string()];
    let graph = GraphBuilder::new(test_resolver()).build(&definition).unwrap();

    let mut disabled = webapp_instance("shop");
    disabled["spec"]["enabled"] = json!(false);
    let mut runtime = Runtime::new(&graph, disabled).unwrap();

    // configmap is ignored by its own condition; secret and deployment
    // follow transitively.
    assert!(!runtime.want_to_create_resource("configmap").unwrap());
    assert!(!runtime.want_to_create_resource("secret").unwrap());
    assert!(!runtime.want_to_create_resource("deployment").unwrap());
    assert_eq!(runtime.ignored_by_condition().len(), 3);

    let enabled = webapp_instance("shop");
    let mut runtime = Runtime::new(&graph, enabled).unwrap();
    assert!(runtime.want_to_create_resource("configmap").unwrap());
    assert!(runtime.want_to_create_resource("secret").unwrap());
    assert!(runtime.ignored_by_condition().is_empty());
}

#[test]
fn ignored_resources_do_not_block_the_fixed_point() {
    let mut definition = webapp_definition();
    definition.resources[1].include_when = vec!["${schema.spec.enabled}".to_string()];
    let graph = GraphBuilder::new(test_resolver()).build(&definition).unwrap();

    let mut disabled = webapp_instance("shop");
    disabled["spec"]["enabled"] = json!(false);
    let mut runtime = Runtime::new(&graph, disabled).unwrap();

    for id in ["configmap", "secret", "deployment"] {
        assert!(!runtime.want_to_create_resource(id).unwrap());
    }

    // Nothing will ever be reported and the dynamic expressions can
    // never resolve, so the loop keeps asking without erroring.
    assert!(runtime.synchronize().unwrap());
}

#[test]
fn unknown_ids_are_rejected() {
    let graph = built_graph();
    let mut runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    assert!(runtime.get_resource("ghost").is_err());
    assert!(runtime.set_resource("ghost", json!({})).is_err());
    assert!(runtime.is_resource_ready("ghost").is_err());
    assert!(runtime.want_to_create_resource("ghost").is_err());
}

#[test]
fn repeated_synchronize_without_reports_is_stable() {
    let graph = built_graph();
    let mut runtime = Runtime::new(&graph, webapp_instance("shop")).unwrap();

    let first = runtime.synchronize().unwrap();
    let second = runtime.synchronize().unwrap();
    assert_eq!(first, second);

    let (_, state_before) = runtime.get_resource("secret").unwrap();
    runtime.synchronize().unwrap();
    let (_, state_after) = runtime.get_resource("secret").unwrap();
    assert_eq!(state_before, state_after);
}
