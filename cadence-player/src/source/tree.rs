//! Id-keyed cache of resolved sources
//!
//! Resolution is memoized by node id: once an id has been resolved the
//! cached node is returned for every later reference, because composite
//! nodes carry mutable state (children, shuffle order) that the engine holds
//! on to. Children are resolved before their parent is cached, so a failing
//! subtree never leaves a half-built parent behind.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::descriptor::{descriptor_id, NodeId, SourceDescriptor};
use super::node::{ConcatenatingSource, MediaKind, MediaNode, MediaSource};
use super::shuffle::ShuffleOrderManager;
use crate::error::{PlayerError, Result};

#[derive(Debug, Default)]
pub struct AudioSourceTree {
    cache: HashMap<NodeId, MediaSource>,
    /// Id of the descriptor most recently loaded as the top-level playlist
    root_id: Option<NodeId>,
}

impl AudioSourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one descriptor, reusing the cached node for a known id
    pub fn resolve(&mut self, value: &Value, shuffle: &mut ShuffleOrderManager) -> Result<MediaSource> {
        let id = descriptor_id(value)?;
        if let Some(cached) = self.cache.get(&id) {
            return Ok(Arc::clone(cached));
        }

        let (id, descriptor) = SourceDescriptor::parse(value)?;
        let kind = match descriptor {
            SourceDescriptor::Progressive { uri, data_source, extractor } => {
                MediaKind::Progressive { uri, data_source, extractor }
            }
            SourceDescriptor::Dash { uri, data_source } => MediaKind::Dash { uri, data_source },
            SourceDescriptor::Hls { uri, data_source } => MediaKind::Hls { uri, data_source },
            SourceDescriptor::Silence { duration_us } => MediaKind::Silence { duration_us },
            SourceDescriptor::Concatenating { children, shuffle_order } => {
                let children = self.resolve_all(&children, shuffle)?;
                let order = shuffle.decode(&shuffle_order, children.len())?;
                MediaKind::Concatenating(ConcatenatingSource::new(children, order)?)
            }
            SourceDescriptor::Clipping { child, start_us, end_us } => {
                let child = self.resolve(&child, shuffle)?;
                MediaKind::Clipping { child, start_us, end_us }
            }
            SourceDescriptor::Looping { child, count } => {
                let child = self.resolve(&child, shuffle)?;
                MediaKind::Concatenating(ConcatenatingSource::looping(child, count))
            }
        };

        let node = MediaNode::new(id.clone(), kind);
        debug!("Resolved audio source {}", id);
        self.cache.insert(id, Arc::clone(&node));
        Ok(node)
    }

    /// Resolve a list of descriptors in order, stopping at the first failure
    pub fn resolve_all(&mut self, values: &[Value], shuffle: &mut ShuffleOrderManager) -> Result<Vec<MediaSource>> {
        values.iter().map(|value| self.resolve(value, shuffle)).collect()
    }

    pub fn get(&self, id: &str) -> Option<MediaSource> {
        self.cache.get(id).cloned()
    }

    /// Look up a cached composite that accepts playlist edits
    pub fn concatenating(&self, id: &str) -> Result<MediaSource> {
        match self.cache.get(id) {
            Some(node) if node.as_concatenating().is_some() => Ok(Arc::clone(node)),
            Some(_) => Err(PlayerError::InvalidCommandArgument(format!(
                "audio source {} is not a concatenation",
                id
            ))),
            None => Err(PlayerError::InvalidCommandArgument(format!("unknown audio source {}", id))),
        }
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    pub fn set_root_id(&mut self, id: Option<NodeId>) {
        self.root_id = id;
    }

    /// Drop every cache entry not reachable from `roots`
    pub fn retain_reachable(&mut self, roots: &[MediaSource]) {
        let mut reachable: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<MediaSource> = roots.to_vec();
        while let Some(node) = stack.pop() {
            if reachable.insert(node.id().to_string()) {
                stack.extend(node.children());
            }
        }

        let before = self.cache.len();
        self.cache.retain(|id, _| reachable.contains(id));
        if before != self.cache.len() {
            debug!("Pruned {} unreachable audio sources", before - self.cache.len());
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.root_id = None;
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
