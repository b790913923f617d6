//! Resolved media nodes handed to the engine
//!
//! Nodes are reference counted so that a looping node can repeat the very
//! same child instance. Composite nodes keep their children and shuffle order
//! behind one lock; every mutation replaces both together.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::descriptor::{DataSourceSpec, ExtractorOptions, NodeId};
use super::shuffle::ShuffleOrder;
use crate::error::{PlayerError, Result};

/// Shared handle to a resolved node
pub type MediaSource = Arc<MediaNode>;

/// One resolved source, keyed by its host-assigned id
#[derive(Debug)]
pub struct MediaNode {
    id: NodeId,
    kind: MediaKind,
}

#[derive(Debug)]
pub enum MediaKind {
    Progressive {
        uri: String,
        data_source: DataSourceSpec,
        extractor: ExtractorOptions,
    },
    Dash {
        uri: String,
        data_source: DataSourceSpec,
    },
    Hls {
        uri: String,
        data_source: DataSourceSpec,
    },
    Silence {
        duration_us: u64,
    },
    Concatenating(ConcatenatingSource),
    Clipping {
        child: MediaSource,
        start_us: u64,
        end_us: Option<u64>,
    },
}

impl MediaNode {
    pub fn new(id: impl Into<NodeId>, kind: MediaKind) -> MediaSource {
        Arc::new(Self { id: id.into(), kind })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &MediaKind {
        &self.kind
    }

    /// Composite view, if this node has children
    pub fn as_concatenating(&self) -> Option<&ConcatenatingSource> {
        match &self.kind {
            MediaKind::Concatenating(source) => Some(source),
            _ => None,
        }
    }

    /// Direct children (empty for leaves)
    pub fn children(&self) -> Vec<MediaSource> {
        match &self.kind {
            MediaKind::Concatenating(source) => source.children(),
            MediaKind::Clipping { child, .. } => vec![Arc::clone(child)],
            _ => Vec::new(),
        }
    }
}

/// What a concatenation was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompositeOrigin {
    /// Host-declared playlist; accepts mutations
    Playlist,
    /// Expansion of a looping node; fixed shape
    Loop,
}

#[derive(Debug)]
struct CompositeState {
    children: Vec<MediaSource>,
    shuffle: ShuffleOrder,
}

/// Ordered children with a shuffle order of matching length
#[derive(Debug)]
pub struct ConcatenatingSource {
    origin: CompositeOrigin,
    state: Mutex<CompositeState>,
}

impl ConcatenatingSource {
    pub fn new(children: Vec<MediaSource>, shuffle: ShuffleOrder) -> Result<Self> {
        check_shuffle_len(&shuffle, children.len())?;
        Ok(Self {
            origin: CompositeOrigin::Playlist,
            state: Mutex::new(CompositeState { children, shuffle }),
        })
    }

    /// `count` references to the same `child`, played in order
    pub fn looping(child: MediaSource, count: usize) -> Self {
        let children = vec![child; count];
        Self {
            origin: CompositeOrigin::Loop,
            state: Mutex::new(CompositeState {
                children,
                shuffle: ShuffleOrder::identity(count),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CompositeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn children(&self) -> Vec<MediaSource> {
        self.lock().children.clone()
    }

    pub fn shuffle_order(&self) -> ShuffleOrder {
        self.lock().shuffle.clone()
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.origin {
            CompositeOrigin::Playlist => Ok(()),
            CompositeOrigin::Loop => Err(PlayerError::InvalidCommandArgument(
                "looping sources cannot be edited".to_string(),
            )),
        }
    }

    pub fn set_shuffle_order(&self, shuffle: ShuffleOrder) -> Result<()> {
        let mut state = self.lock();
        check_shuffle_len(&shuffle, state.children.len())?;
        state.shuffle = shuffle;
        Ok(())
    }

    /// Insert `sources` at `index`; `shuffle` must cover the grown list
    pub fn insert_all(&self, index: usize, sources: Vec<MediaSource>, shuffle: ShuffleOrder) -> Result<()> {
        self.ensure_mutable()?;
        let mut state = self.lock();
        if index > state.children.len() {
            return Err(out_of_range(index, state.children.len()));
        }
        check_shuffle_len(&shuffle, state.children.len() + sources.len())?;

        state.children.splice(index..index, sources);
        state.shuffle = shuffle;
        Ok(())
    }

    /// Remove children `[start, end)`; `shuffle` must cover the shrunk list
    pub fn remove_range(&self, start: usize, end: usize, shuffle: ShuffleOrder) -> Result<()> {
        self.ensure_mutable()?;
        let mut state = self.lock();
        let len = state.children.len();
        if start > end || end > len {
            return Err(PlayerError::InvalidCommandArgument(format!(
                "range {}..{} out of bounds for {} children",
                start, end, len
            )));
        }
        check_shuffle_len(&shuffle, len - (end - start))?;

        state.children.drain(start..end);
        state.shuffle = shuffle;
        Ok(())
    }

    pub fn move_child(&self, from: usize, to: usize, shuffle: ShuffleOrder) -> Result<()> {
        self.ensure_mutable()?;
        let mut state = self.lock();
        let len = state.children.len();
        if from >= len {
            return Err(out_of_range(from, len));
        }
        if to >= len {
            return Err(out_of_range(to, len));
        }
        check_shuffle_len(&shuffle, len)?;

        let child = state.children.remove(from);
        state.children.insert(to, child);
        state.shuffle = shuffle;
        Ok(())
    }
}

fn check_shuffle_len(shuffle: &ShuffleOrder, len: usize) -> Result<()> {
    if shuffle.len() != len {
        return Err(PlayerError::InvalidCommandArgument(format!(
            "shuffle order of length {} for {} children",
            shuffle.len(),
            len
        )));
    }
    Ok(())
}

fn out_of_range(index: usize, len: usize) -> PlayerError {
    PlayerError::InvalidCommandArgument(format!("index {} out of range for {} children", index, len))
}
