//! Implementation of the fake REST client through which schedulers talk to the simulated cluster.
//! It plays the role of kube-api-server: reads are served from the resource store, writes are
//! redirected to the resource store and every store mutation is turned into a watch event for
//! the active watchers of the mutated kind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::Mutex;
use thiserror::Error;

use crate::core::common::ObjectMeta;
use crate::core::events::{WatchEvent, WatchEventType};
use crate::core::object::{Object, ResourceKind};
use crate::core::resource_store::{ResourceEventHandler, ResourceStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RestError {
    #[error("{kind} {name:?} not found in namespace {namespace:?}")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },
    #[error("the server could not find the requested resource ({0})")]
    UnsupportedResource(ResourceKind),
    #[error("{kind} {key:?} already exists")]
    AlreadyExists { kind: ResourceKind, key: String },
    #[error("invalid object: {0}")]
    Invalid(String),
    #[error("rest client is closed")]
    Closed,
}

impl RestError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RestError::NotFound { .. })
    }
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnsupportedResource(kind) => RestError::UnsupportedResource(kind),
            StoreError::AlreadyExists { kind, key } => RestError::AlreadyExists { kind, key },
            StoreError::NotFound { kind, key } => {
                let (namespace, name) = match key.split_once('/') {
                    Some((namespace, name)) => (namespace.to_string(), name.to_string()),
                    None => (String::new(), key),
                };
                RestError::NotFound {
                    kind,
                    namespace,
                    name,
                }
            }
            err @ StoreError::KindMismatch { .. } => RestError::Invalid(err.to_string()),
        }
    }
}

/// Receiving end of a watch, disconnects when the client is closed.
pub type WatchReceiver = Receiver<WatchEvent>;

pub struct FakeRestClient {
    store: Arc<ResourceStore>,
    watchers: Mutex<HashMap<ResourceKind, Vec<Sender<WatchEvent>>>>,
    closed: AtomicBool,
}

// Store handler forwarding mutations of one kind to the client's watchers.
struct WatchEmitter {
    client: Weak<FakeRestClient>,
    kind: ResourceKind,
}

impl WatchEmitter {
    fn emit(&self, event_type: WatchEventType, obj: &Object) {
        if let Some(client) = self.client.upgrade() {
            client.emit_object_watch_event(self.kind, event_type, obj.clone());
        }
    }
}

impl ResourceEventHandler for WatchEmitter {
    fn on_add(&self, obj: &Object) {
        self.emit(WatchEventType::Added, obj);
    }

    fn on_update(&self, _old: &Object, new: &Object) {
        self.emit(WatchEventType::Modified, new);
    }

    fn on_delete(&self, obj: &Object) {
        self.emit(WatchEventType::Deleted, obj);
    }
}

impl FakeRestClient {
    pub fn new(store: Arc<ResourceStore>) -> Result<Arc<Self>, RestError> {
        let client = Arc::new(Self {
            store: store.clone(),
            watchers: Default::default(),
            closed: AtomicBool::new(false),
        });
        for kind in store.resources() {
            store.register_event_handler(
                kind,
                Arc::new(WatchEmitter {
                    client: Arc::downgrade(&client),
                    kind,
                }),
            )?;
        }
        Ok(client)
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn list(&self, kind: ResourceKind) -> Result<Vec<Object>, RestError> {
        Ok(self.store.list(kind)?)
    }

    pub fn get(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Object, RestError> {
        self.store
            .get(kind, &ObjectMeta::new(name, namespace))?
            .ok_or_else(|| RestError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    pub fn create(&self, obj: Object) -> Result<(), RestError> {
        Ok(self.store.add(obj.kind(), obj)?)
    }

    pub fn update(&self, obj: Object) -> Result<(), RestError> {
        Ok(self.store.update(obj.kind(), obj)?)
    }

    pub fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<Object, RestError> {
        Ok(self.store.delete(kind, &ObjectMeta::new(name, namespace))?)
    }

    pub fn watch(&self, kind: ResourceKind) -> Result<WatchReceiver, RestError> {
        self.watch_all(&[kind])
    }

    /// Single stream multiplexing watch events of several kinds.
    pub fn watch_all(&self, kinds: &[ResourceKind]) -> Result<WatchReceiver, RestError> {
        if let Some(kind) = kinds.iter().find(|kind| !self.store.tracks(**kind)) {
            return Err(RestError::UnsupportedResource(*kind));
        }

        let mut watchers = self.watchers.lock();
        // Checked under the lock so that close() can not race with a new watch.
        if self.is_closed() {
            return Err(RestError::Closed);
        }
        let (sender, receiver) = channel();
        for kind in kinds.iter() {
            watchers.entry(*kind).or_default().push(sender.clone());
        }
        debug!("Started watch of {:?}", kinds);
        Ok(receiver)
    }

    pub fn emit_object_watch_event(
        &self,
        kind: ResourceKind,
        event_type: WatchEventType,
        object: Object,
    ) {
        let mut watchers = self.watchers.lock();
        let Some(senders) = watchers.get_mut(&kind) else {
            return;
        };
        trace!("Emitting {:?} {} {:?}", event_type, kind, object.key());
        let event = WatchEvent {
            event_type,
            kind,
            object,
        };
        // Watchers which hung up are forgotten.
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Stops every watch. Idempotent.
    pub fn close(&self) {
        let mut watchers = self.watchers.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        watchers.clear();
        debug!("Fake rest client closed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::events::WatchEventType;
    use crate::core::node::Node;
    use crate::core::object::{Object, ResourceKind};
    use crate::core::pod::Pod;
    use crate::core::resource_store::ResourceStore;
    use crate::core::rest_client::{FakeRestClient, RestError};

    #[test]
    fn test_store_mutations_become_watch_events() {
        let store = Arc::new(ResourceStore::new());
        let client = FakeRestClient::new(store.clone()).unwrap();
        let pods = client.watch(ResourceKind::Pods).unwrap();

        let mut pod = Pod::new("pod_1", "default", 100, 100);
        store.add(ResourceKind::Pods, pod.clone().into()).unwrap();
        pod.spec.node_name = "node_1".to_string();
        client.update(pod.clone().into()).unwrap();
        client.delete(ResourceKind::Pods, "default", "pod_1").unwrap();
        // Not watched
        store
            .add(ResourceKind::Nodes, Node::new("node_1", 1, 1).into())
            .unwrap();

        let events: Vec<WatchEventType> = pods.try_iter().map(|e| e.event_type).collect();
        assert_eq!(
            vec![
                WatchEventType::Added,
                WatchEventType::Modified,
                WatchEventType::Deleted
            ],
            events
        );
    }

    #[test]
    fn test_errors_have_client_shapes() {
        let store = Arc::new(ResourceStore::new());
        let client = FakeRestClient::new(store).unwrap();

        let err = client.get(ResourceKind::Pods, "default", "missing").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            RestError::UnsupportedResource(ResourceKind::Namespaces),
            client.list(ResourceKind::Namespaces).unwrap_err()
        );
        assert_eq!(
            RestError::UnsupportedResource(ResourceKind::Namespaces),
            client.watch(ResourceKind::Namespaces).unwrap_err()
        );
        assert_eq!(
            RestError::NotFound {
                kind: ResourceKind::Pods,
                namespace: "default".to_string(),
                name: "missing".to_string(),
            },
            client
                .update(Object::from(Pod::new("missing", "default", 1, 1)))
                .unwrap_err()
        );
    }

    #[test]
    fn test_close_disconnects_watchers() {
        let store = Arc::new(ResourceStore::new());
        let client = FakeRestClient::new(store.clone()).unwrap();
        let receiver = client
            .watch_all(&[ResourceKind::Pods, ResourceKind::Nodes])
            .unwrap();

        client.close();
        client.close();

        store
            .add(ResourceKind::Pods, Pod::new("pod_1", "default", 1, 1).into())
            .unwrap();
        assert!(receiver.recv().is_err());
        assert_eq!(
            RestError::Closed,
            client.watch(ResourceKind::Pods).unwrap_err()
        );
    }
}
