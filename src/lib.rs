// ABOUTME: Public library API for folio post sync
// ABOUTME: Re-exports core modules for external use

pub mod api;
pub mod cli;
pub mod codec;
pub mod error;
pub mod frontmatter;
pub mod model;
pub mod post;
pub mod references;
pub mod settings;
pub mod storage;
pub mod sync;
pub mod util;

pub use codec::{pack, unpack, PostMarkdownMetadata, UnpackedPost};
pub use error::{Error, Result};
pub use model::{PostRecord, PostUpdate, Resource};
pub use post::Post;
pub use references::{ReferenceMap, TranslationReport};
pub use sync::{BulkReport, SyncOptions, Syncer};
