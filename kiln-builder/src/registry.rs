//! Active pipeline registry
//!
//! [`ActivePipelines`] is the shared list of pipelines this process knows
//! about as active. It is constructed once at startup and handed out as an
//! `Arc`. Readers take a shared lock, appends take an exclusive lock, so a
//! reader either sees a whole appended entry or none of it.
//!
//! `contains` followed by `append` is not atomic: two callers can both see
//! `false` and both append. Use [`ActivePipelines::append_if_absent`] or a
//! [`BuildLease`] from [`BuildLocks`] when at most one entry or one build per
//! name is required.

use kiln_core::domain::pipeline::Pipeline;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// All active pipelines. Safe to share between tasks.
#[derive(Debug, Default)]
pub struct ActivePipelines {
    pipelines: RwLock<Vec<Pipeline>>,
}

impl ActivePipelines {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(Vec::new()),
        }
    }

    /// Appends a pipeline to the end of the registry
    ///
    /// No uniqueness check is performed.
    pub fn append(&self, pipeline: Pipeline) {
        let mut pipelines = self.pipelines.write();
        debug!(
            "Appending pipeline '{}' to active pipelines (size: {})",
            pipeline.name,
            pipelines.len() + 1
        );
        pipelines.push(pipeline);
    }

    /// Appends the pipeline unless an entry with the same name exists
    ///
    /// Check and insert happen under one exclusive lock.
    ///
    /// # Returns
    /// `true` if the pipeline was appended
    pub fn append_if_absent(&self, pipeline: Pipeline) -> bool {
        let mut pipelines = self.pipelines.write();
        if pipelines.iter().any(|p| p.name == pipeline.name) {
            return false;
        }
        pipelines.push(pipeline);
        true
    }

    /// Checks if a pipeline with the given name has been appended
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.read().iter().any(|p| p.name == name)
    }

    /// Returns the most recently appended pipeline with the given name
    pub fn get(&self, name: &str) -> Option<Pipeline> {
        self.pipelines
            .read()
            .iter()
            .rev()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Iterates over the pipelines present at the time of the call
    ///
    /// The iterator owns a snapshot and holds no lock while it is consumed.
    /// Call `iter` again for a fresh traversal.
    pub fn iter(&self) -> Iter {
        let snapshot = self.pipelines.read().clone();
        Iter {
            inner: snapshot.into_iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }
}

/// Single-pass iterator over a registry snapshot
#[derive(Debug)]
pub struct Iter {
    inner: std::vec::IntoIter<Pipeline>,
}

impl Iterator for Iter {
    type Item = Pipeline;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter {}

/// Per-name advisory locks for builds
///
/// Cloning shares the same set of held names.
#[derive(Debug, Clone, Default)]
pub struct BuildLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the name for one build
    ///
    /// # Returns
    /// A lease releasing the name on drop, or `None` if the name is held
    pub fn try_acquire(&self, name: &str) -> Option<BuildLease> {
        let mut held = self.held.lock();
        if !held.insert(name.to_string()) {
            return None;
        }
        Some(BuildLease {
            name: name.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    /// Checks if a build currently holds the name
    pub fn is_building(&self, name: &str) -> bool {
        self.held.lock().contains(name)
    }

    /// Number of names currently held
    pub fn in_flight(&self) -> usize {
        self.held.lock().len()
    }
}

/// Exclusive build rights for one pipeline name
#[derive(Debug)]
pub struct BuildLease {
    name: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl BuildLease {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for BuildLease {
    fn drop(&mut self) {
        self.held.lock().remove(&self.name);
        debug!("Released build lease for '{}'", self.name);
    }
}
