//! Id-keyed map that keeps insertion order.
//!
//! Projection output order is the order entities were encountered, so the
//! entity tables cannot be plain hash maps.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Ordered `id -> T` table. Serializes as a JSON object in insertion order.
#[derive(Debug, Clone)]
pub struct EntityMap<T> {
    entries: Vec<(String, T)>,
    /// id -> position in `entries`.
    index: HashMap<String, usize>,
}

impl<T> EntityMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    /// Insert or replace. A replaced value keeps its original position.
    pub fn insert(&mut self, id: impl Into<String>, value: T) -> Option<T> {
        let id = id.into();
        if let Some(&pos) = self.index.get(&id) {
            return Some(std::mem::replace(&mut self.entries[pos].1, value));
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, value));
        None
    }

    /// Remove by id; later entries move up one position.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.index.remove(id)?;
        let (_, value) = self.entries.remove(pos);
        for (i, (key, _)) in self.entries.iter().enumerate().skip(pos) {
            self.index.insert(key.clone(), i);
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|(_, v)| v)
    }
}

impl<T> Default for EntityMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for EntityMap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for EntityMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<T: Serialize> Serialize for EntityMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct EntityMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for EntityMapVisitor<T> {
    type Value = EntityMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of entity id to record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = EntityMap::new();
        while let Some((k, v)) = access.next_entry::<String, T>()? {
            map.insert(k, v);
        }
        Ok(map)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for EntityMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntityMapVisitor(PhantomData))
    }
}
