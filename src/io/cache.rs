use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::types::MatchResult;

/// Bounded cache of decoded variables keyed by name, owned by one reader.
/// Entries leave in load order; a cache hit does not renew an entry.
#[derive(Debug)]
pub struct ArrayCache<T> {
    capacity: usize,
    entries: HashMap<String, Arc<T>>,
    order: VecDeque<String>,
}

impl<T> ArrayCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns the cached entry or stores the result of `load`
    pub fn get_or_load<F>(&mut self, name: &str, load: F) -> MatchResult<Arc<T>>
    where
        F: FnOnce() -> MatchResult<T>,
    {
        if let Some(entry) = self.entries.get(name) {
            return Ok(Arc::clone(entry));
        }

        let entry = Arc::new(load()?);
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    log::trace!("Evicting '{}' from array cache", oldest);
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(name.to_string(), Arc::clone(&entry));
        self.order.push_back(name.to_string());
        Ok(entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn invalidate(&mut self, name: &str) -> bool {
        self.order.retain(|entry| entry != name);
        self.entries.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
