//! Deferred visions: the SQLite-backed queue and the filesystem archive.

pub mod archive;
pub mod queue;
pub mod render;
pub mod types;

pub use archive::{IndexEntry, VisionArchive};
pub use queue::VisionQueue;
pub use render::render_vision_markdown;
pub use types::{
    ArchiveLocation, ArchiveMetadata, Disposition, EnrichedContext, QueueStatus, SearchCriteria,
    VisionRecord, VisionRequest, VisionStatus, VisionTrigger, generate_vision_id,
};
