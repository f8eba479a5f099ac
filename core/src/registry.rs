//! Handle registry
//!
//! Live handles (and action nodes) with their type and lifecycle record.
//! The registry only answers membership questions; cascade and call pruning
//! are coordinated by [`Reconstruction`](crate::Reconstruction).

use hashbrown::HashMap;

use crate::handle::{Handle, NodeKey, ObjectType};
use crate::lifecycle::{ObjectKind, ObjectRecord};

#[derive(Debug, Default)]
pub struct HandleRegistry {
    objects: HashMap<NodeKey, ObjectRecord>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key. Returns false (and changes nothing) if already live.
    pub fn insert(&mut self, key: NodeKey, kind: ObjectKind) -> bool {
        if self.objects.contains_key(&key) {
            return false;
        }
        self.objects.insert(key, ObjectRecord::new(kind));
        true
    }

    /// Register an existing record under a new key. Returns false (and
    /// changes nothing) if the key is taken.
    pub fn insert_record(&mut self, key: NodeKey, record: ObjectRecord) -> bool {
        if self.objects.contains_key(&key) {
            return false;
        }
        self.objects.insert(key, record);
        true
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<ObjectRecord> {
        self.objects.remove(&key)
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.objects.contains_key(&key)
    }

    pub fn get(&self, key: NodeKey) -> Option<&ObjectRecord> {
        self.objects.get(&key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut ObjectRecord> {
        self.objects.get_mut(&key)
    }

    /// Declared type of a live handle
    pub fn object_type(&self, handle: Handle) -> Option<ObjectType> {
        self.get(NodeKey::Object(handle))
            .and_then(ObjectRecord::object_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &ObjectRecord)> {
        self.objects.iter()
    }

    /// Live object handles, sorted
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.objects.keys().filter_map(|key| key.handle()).collect();
        handles.sort_unstable();
        handles
    }

    /// Retired records still waiting on dependents of `handle`
    pub fn retired(&self, handle: Handle) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .objects
            .keys()
            .copied()
            .filter(|key| matches!(key, NodeKey::Retired(h, _) if *h == handle))
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Number of live entries (objects and action nodes)
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}
