//! Implementation of the resource store keeping all information about kubernetes objects of the
//! simulated cluster. In k8s etcd plus informer caches play this role, in our simulator it is a
//! simple in-memory storage partitioned by resource kind which notifies registered handlers about
//! every change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use thiserror::Error;

use crate::core::common::ObjectMeta;
use crate::core::object::{Object, ResourceKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("resource {0} is not supported by the store")]
    UnsupportedResource(ResourceKind),
    #[error("object {key:?} of kind {actual} can not be stored as {expected}")]
    KindMismatch {
        key: String,
        expected: ResourceKind,
        actual: ResourceKind,
    },
    #[error("{kind} {key:?} already exists")]
    AlreadyExists { kind: ResourceKind, key: String },
    #[error("{kind} {key:?} not found")]
    NotFound { kind: ResourceKind, key: String },
}

/// Callbacks invoked synchronously after a mutation of the kind they are registered for.
pub trait ResourceEventHandler: Send + Sync {
    fn on_add(&self, _obj: &Object) {}
    fn on_update(&self, _old: &Object, _new: &Object) {}
    fn on_delete(&self, _obj: &Object) {}
}

type AddFunc = Box<dyn Fn(&Object) + Send + Sync>;
type UpdateFunc = Box<dyn Fn(&Object, &Object) + Send + Sync>;
type DeleteFunc = Box<dyn Fn(&Object) + Send + Sync>;

/// Closure based handler, any of the callbacks may be omitted.
#[derive(Default)]
pub struct ResourceEventHandlerFuncs {
    pub add_func: Option<AddFunc>,
    pub update_func: Option<UpdateFunc>,
    pub delete_func: Option<DeleteFunc>,
}

impl ResourceEventHandler for ResourceEventHandlerFuncs {
    fn on_add(&self, obj: &Object) {
        if let Some(add_func) = &self.add_func {
            add_func(obj);
        }
    }

    fn on_update(&self, old: &Object, new: &Object) {
        if let Some(update_func) = &self.update_func {
            update_func(old, new);
        }
    }

    fn on_delete(&self, obj: &Object) {
        if let Some(delete_func) = &self.delete_func {
            delete_func(obj);
        }
    }
}

#[derive(Default)]
struct KindStore {
    // Objects in insertion order
    items: Vec<Object>,
    // Object key -> position in items
    index: HashMap<String, usize>,
    // Version of the listing passed to the last replace
    resource_version: String,
}

impl KindStore {
    fn rebuild_index(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, obj)| (obj.key(), pos))
            .collect();
    }
}

pub struct ResourceStore {
    data: RwLock<HashMap<ResourceKind, KindStore>>,
    handlers: RwLock<HashMap<ResourceKind, Vec<Arc<dyn ResourceEventHandler>>>>,
    version_counter: AtomicU64,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore {
    /// Store tracking the kinds the scheduler consumes.
    pub fn new() -> Self {
        Self::with_kinds(&ResourceKind::TRACKED)
    }

    pub fn with_kinds(kinds: &[ResourceKind]) -> Self {
        Self {
            data: RwLock::new(
                kinds
                    .iter()
                    .map(|kind| (*kind, KindStore::default()))
                    .collect(),
            ),
            handlers: Default::default(),
            version_counter: AtomicU64::new(0),
        }
    }

    pub fn resources(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = self.data.read().keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn tracks(&self, kind: ResourceKind) -> bool {
        self.data.read().contains_key(&kind)
    }

    pub fn register_event_handler(
        &self,
        kind: ResourceKind,
        handler: Arc<dyn ResourceEventHandler>,
    ) -> Result<(), StoreError> {
        if !self.tracks(kind) {
            return Err(StoreError::UnsupportedResource(kind));
        }
        self.handlers.write().entry(kind).or_default().push(handler);
        Ok(())
    }

    /// Replaces the whole collection of `kind`. Handlers are not notified, replace is used to
    /// load the initial state before anybody watches the store.
    pub fn replace(
        &self,
        kind: ResourceKind,
        items: Vec<Object>,
        resource_version: &str,
    ) -> Result<(), StoreError> {
        for item in items.iter() {
            check_kind(kind, item)?;
        }

        let mut data = self.data.write();
        let kind_store = data
            .get_mut(&kind)
            .ok_or(StoreError::UnsupportedResource(kind))?;

        let mut replaced = KindStore {
            items: Vec::with_capacity(items.len()),
            index: Default::default(),
            resource_version: resource_version.to_string(),
        };
        for item in items.into_iter() {
            // Later duplicates win, keeping the position of the first occurrence.
            match replaced.index.get(&item.key()) {
                Some(&pos) => replaced.items[pos] = item,
                None => {
                    replaced.index.insert(item.key(), replaced.items.len());
                    replaced.items.push(item);
                }
            }
        }
        debug!(
            "Replaced {} with {} objects at version {:?}",
            kind,
            replaced.items.len(),
            resource_version
        );
        *kind_store = replaced;
        Ok(())
    }

    pub fn add(&self, kind: ResourceKind, mut obj: Object) -> Result<(), StoreError> {
        check_kind(kind, &obj)?;
        let key = obj.key();
        {
            let mut data = self.data.write();
            let kind_store = data
                .get_mut(&kind)
                .ok_or(StoreError::UnsupportedResource(kind))?;
            if kind_store.index.contains_key(&key) {
                return Err(StoreError::AlreadyExists { kind, key });
            }
            obj.metadata_mut().resource_version = self.next_resource_version();
            kind_store.index.insert(key, kind_store.items.len());
            kind_store.items.push(obj.clone());
        }

        for handler in self.handlers_of(kind) {
            handler.on_add(&obj);
        }
        Ok(())
    }

    pub fn update(&self, kind: ResourceKind, mut obj: Object) -> Result<(), StoreError> {
        check_kind(kind, &obj)?;
        let key = obj.key();
        let old = {
            let mut data = self.data.write();
            let kind_store = data
                .get_mut(&kind)
                .ok_or(StoreError::UnsupportedResource(kind))?;
            let pos = *kind_store
                .index
                .get(&key)
                .ok_or(StoreError::NotFound { kind, key })?;
            obj.metadata_mut().resource_version = self.next_resource_version();
            std::mem::replace(&mut kind_store.items[pos], obj.clone())
        };

        for handler in self.handlers_of(kind) {
            handler.on_update(&old, &obj);
        }
        Ok(())
    }

    pub fn delete(&self, kind: ResourceKind, key_obj: &ObjectMeta) -> Result<Object, StoreError> {
        let key = key_obj.key();
        let deleted = {
            let mut data = self.data.write();
            let kind_store = data
                .get_mut(&kind)
                .ok_or(StoreError::UnsupportedResource(kind))?;
            let pos = kind_store
                .index
                .remove(&key)
                .ok_or(StoreError::NotFound { kind, key })?;
            let deleted = kind_store.items.remove(pos);
            kind_store.rebuild_index();
            deleted
        };

        for handler in self.handlers_of(kind) {
            handler.on_delete(&deleted);
        }
        Ok(deleted)
    }

    pub fn get(&self, kind: ResourceKind, key_obj: &ObjectMeta) -> Result<Option<Object>, StoreError> {
        let data = self.data.read();
        let kind_store = data
            .get(&kind)
            .ok_or(StoreError::UnsupportedResource(kind))?;
        Ok(kind_store
            .index
            .get(&key_obj.key())
            .map(|&pos| kind_store.items[pos].clone()))
    }

    pub fn list(&self, kind: ResourceKind) -> Result<Vec<Object>, StoreError> {
        let data = self.data.read();
        let kind_store = data
            .get(&kind)
            .ok_or(StoreError::UnsupportedResource(kind))?;
        Ok(kind_store.items.clone())
    }

    /// Version passed to the last `replace` of the kind.
    pub fn resource_version(&self, kind: ResourceKind) -> Result<String, StoreError> {
        let data = self.data.read();
        let kind_store = data
            .get(&kind)
            .ok_or(StoreError::UnsupportedResource(kind))?;
        Ok(kind_store.resource_version.clone())
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.data
            .read()
            .get(&kind)
            .map(|kind_store| kind_store.items.len())
            .unwrap_or(0)
    }

    fn next_resource_version(&self) -> String {
        (self.version_counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn handlers_of(&self, kind: ResourceKind) -> Vec<Arc<dyn ResourceEventHandler>> {
        self.handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

fn check_kind(kind: ResourceKind, obj: &Object) -> Result<(), StoreError> {
    if obj.kind() != kind {
        return Err(StoreError::KindMismatch {
            key: obj.key(),
            expected: kind,
            actual: obj.kind(),
        });
    }
    Ok(())
}
