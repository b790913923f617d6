//! Composable audio sources
//!
//! Descriptors arrive as untyped JSON, are decoded by [`descriptor`], built
//! into shared [`node`]s and memoized by id in the [`tree`].

pub mod descriptor;
pub mod node;
pub mod shuffle;
pub mod tree;

pub use descriptor::{DataSourceSpec, ExtractorOptions, NodeId, SourceDescriptor};
pub use node::{ConcatenatingSource, MediaKind, MediaNode, MediaSource};
pub use shuffle::{ShuffleOrder, ShuffleOrderManager};
pub use tree::AudioSourceTree;
