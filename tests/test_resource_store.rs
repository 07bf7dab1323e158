use std::sync::Arc;

use cluster_capacity::core::common::ObjectMeta;
use cluster_capacity::core::events::WatchEventType;
use cluster_capacity::core::node::Node;
use cluster_capacity::core::object::{Object, ResourceKind};
use cluster_capacity::core::objects::Namespace;
use cluster_capacity::core::pod::Pod;
use cluster_capacity::core::resource_store::{ResourceStore, StoreError};
use cluster_capacity::core::rest_client::{FakeRestClient, RestError};

fn pods(count: usize) -> Vec<Object> {
    (0..count)
        .map(|idx| Pod::new(&format!("pod_{}", idx), "default", 100, 100).into())
        .collect()
}

#[test]
fn test_replace_then_list_and_get() {
    let store = ResourceStore::new();
    store
        .add(ResourceKind::Pods, Pod::new("stale", "default", 1, 1).into())
        .unwrap();

    let items = pods(5);
    store.replace(ResourceKind::Pods, items.clone(), "42").unwrap();

    let listed = store.list(ResourceKind::Pods).unwrap();
    assert_eq!(items.len(), listed.len());
    for item in items.iter() {
        assert!(listed.contains(item));
        let found = store
            .get(ResourceKind::Pods, item.metadata())
            .unwrap()
            .unwrap();
        assert_eq!(item, &found);
    }
    assert!(store
        .get(ResourceKind::Pods, &ObjectMeta::new("stale", "default"))
        .unwrap()
        .is_none());
    assert_eq!("42", store.resource_version(ResourceKind::Pods).unwrap());
}

#[test]
fn test_untracked_kind_is_rejected() {
    let store = ResourceStore::new();
    assert!(!store.resources().contains(&ResourceKind::Namespaces));
    assert_eq!(
        Err(StoreError::UnsupportedResource(ResourceKind::Namespaces)),
        store.replace(
            ResourceKind::Namespaces,
            vec![Namespace::new("default").into()],
            "1"
        )
    );
}

#[test]
fn test_rest_client_over_store() {
    let store = Arc::new(ResourceStore::new());
    let client = FakeRestClient::new(store.clone()).unwrap();
    let watch = client
        .watch_all(&[ResourceKind::Pods, ResourceKind::Nodes])
        .unwrap();

    client.create(Node::new("node_1", 1000, 1000).into()).unwrap();
    client
        .create(Pod::new("pod_1", "default", 1, 1).into())
        .unwrap();
    assert!(client
        .get(ResourceKind::Pods, "default", "pod_1")
        .is_ok());
    assert!(client
        .get(ResourceKind::Pods, "default", "pod_2")
        .unwrap_err()
        .is_not_found());
    client.delete(ResourceKind::Nodes, "", "node_1").unwrap();

    let events: Vec<(WatchEventType, ResourceKind)> = watch
        .try_iter()
        .map(|event| (event.event_type, event.kind))
        .collect();
    assert_eq!(
        vec![
            (WatchEventType::Added, ResourceKind::Nodes),
            (WatchEventType::Added, ResourceKind::Pods),
            (WatchEventType::Deleted, ResourceKind::Nodes),
        ],
        events
    );

    client.close();
    client.close();
    assert!(watch.recv().is_err());
    assert_eq!(Err(RestError::Closed), client.watch(ResourceKind::Pods).map(|_| ()));
    // The store itself stays usable
    client
        .create(Pod::new("pod_2", "default", 1, 1).into())
        .unwrap();
    assert_eq!(2, store.count(ResourceKind::Pods));
}
