// Registry mutation rules and concurrency
use pipetopo::error::RegistryError;
use pipetopo::registry::PipelineRegistry;
use pipetopo::topology::{PipelineDefinition, ServiceNode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn registry_with(names: &[&str]) -> PipelineRegistry {
    let pipelines: BTreeMap<String, PipelineDefinition> = names
        .iter()
        .map(|name| (name.to_string(), PipelineDefinition::new(*name)))
        .collect();
    PipelineRegistry::new(pipelines, names.first().copied().unwrap_or("pipeline1"))
}

fn assert_forwards_resolve(pipeline: &PipelineDefinition) {
    for node in pipeline.services.values() {
        for target in node.forward_targets() {
            assert!(
                pipeline.contains_service(target),
                "'{}' forwards to missing '{}'",
                node.name,
                target
            );
        }
    }
}

#[test]
fn test_list_and_get() {
    let registry = registry_with(&["p1", "p2"]);
    assert_eq!(
        registry.list_pipeline_names(),
        BTreeSet::from(["p1".to_string(), "p2".to_string()])
    );
    assert!(registry.get_pipeline("p2").is_some());
    assert!(registry.get_pipeline("p3").is_none());
}

#[test]
fn test_add_returns_created_stubs() {
    let registry = registry_with(&["p1"]);
    registry
        .add_or_update_service("p1", ServiceNode::new("existing"))
        .unwrap();

    let created = registry
        .add_or_update_service(
            "p1",
            ServiceNode::new("router").with_forward_to(["existing", "new-a", "new-b"]),
        )
        .unwrap();

    assert_eq!(
        created,
        BTreeSet::from(["new-a".to_string(), "new-b".to_string()])
    );
    assert!(registry.contains_service("p1", "new-a"));
    assert_forwards_resolve(&registry.get_pipeline("p1").unwrap());
}

#[test]
fn test_add_is_idempotent() {
    let registry = registry_with(&["p1"]);
    let node = ServiceNode::new("a")
        .with_listen_topics(["in"])
        .with_forward_to(["b"]);

    registry.add_or_update_service("p1", node.clone()).unwrap();
    let once = registry.get_pipeline("p1").unwrap();
    let created = registry.add_or_update_service("p1", node).unwrap();
    let twice = registry.get_pipeline("p1").unwrap();

    assert!(created.is_empty());
    assert_eq!(*once, *twice);
}

#[test]
fn test_update_replaces_but_stub_survives() {
    let registry = registry_with(&["p1"]);
    registry
        .add_or_update_service("p1", ServiceNode::new("a").with_forward_to(["b"]))
        .unwrap();
    registry
        .add_or_update_service("p1", ServiceNode::new("a").with_publish_topics(["out"]))
        .unwrap();

    let p1 = registry.get_pipeline("p1").unwrap();
    assert_eq!(p1.service("a").unwrap().grpc_forward_to, None);
    assert!(p1.contains_service("b"));
}

#[test]
fn test_stub_never_overwrites_real_service() {
    let registry = registry_with(&["p1"]);
    let real = ServiceNode::new("b").with_listen_topics(["t"]);
    registry.add_or_update_service("p1", real.clone()).unwrap();
    registry
        .add_or_update_service("p1", ServiceNode::new("a").with_forward_to(["b"]))
        .unwrap();
    assert_eq!(registry.get_pipeline("p1").unwrap().service("b"), Some(&real));
}

#[test]
fn test_null_forward_is_not_vivified() {
    let registry = registry_with(&["p1"]);
    let created = registry
        .add_or_update_service("p1", ServiceNode::new("a").with_forward_to(["null"]))
        .unwrap();
    assert!(created.is_empty());
    assert!(!registry.contains_service("p1", "null"));
}

#[test]
fn test_add_to_unknown_pipeline() {
    let registry = registry_with(&["p1"]);
    let err = registry
        .add_or_update_service("nope", ServiceNode::new("a"))
        .unwrap_err();
    assert_eq!(err, RegistryError::UnknownPipeline("nope".to_string()));
}

#[test]
fn test_set_active_ignores_unknown() {
    let registry = registry_with(&["p1", "p2"]);
    assert!(registry.set_active("p2"));
    assert!(!registry.set_active("missing"));
    assert_eq!(registry.active_pipeline_name().as_deref(), Some("p2"));
    assert_eq!(registry.get_active_pipeline().unwrap().name, "p2");
}

#[test]
fn test_active_service_goes_to_active_pipeline() {
    let registry = registry_with(&["p1", "p2"]);
    registry.set_active("p2");
    let (pipeline, created) = registry
        .add_or_update_active_service(ServiceNode::new("x").with_forward_to(["y"]))
        .unwrap();
    assert_eq!(pipeline, "p2");
    assert_eq!(created, BTreeSet::from(["y".to_string()]));
    assert!(!registry.contains_service("p1", "x"));
}

#[test]
fn test_no_active_pipeline() {
    let registry = PipelineRegistry::new(BTreeMap::new(), "p1");
    assert_eq!(
        registry
            .add_or_update_active_service(ServiceNode::new("x"))
            .unwrap_err(),
        RegistryError::NoActivePipeline
    );
}

#[test]
fn test_concurrent_writers_keep_invariants() {
    let registry = Arc::new(registry_with(&["p1"]));

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let registry = Arc::clone(&registry);
            scope.spawn(move || {
                for i in 0..50 {
                    let node = ServiceNode::new(format!("w{worker}-{i}"))
                        .with_forward_to([format!("w{worker}-{}", i + 1), "shared".to_string()]);
                    registry.add_or_update_service("p1", node).unwrap();
                }
            });
        }
        let reader = Arc::clone(&registry);
        scope.spawn(move || {
            for _ in 0..200 {
                assert_forwards_resolve(&reader.get_pipeline("p1").unwrap());
            }
        });
    });

    let p1 = registry.get_pipeline("p1").unwrap();
    assert_forwards_resolve(&p1);
    // 4 workers x 51 names each, plus the shared stub
    assert_eq!(p1.services.len(), 4 * 51 + 1);
}
