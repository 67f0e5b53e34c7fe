pub mod dedup;
pub mod jobs;
pub mod metadata;
pub mod naming;
pub mod parser;
pub mod poll;
pub mod writer;

pub use dedup::{DedupOutput, deduplicate};
pub use metadata::{MetadataMap, SequenceInfo, SequenceMetadata};
pub use parser::Alignment;
pub use poll::{JobPoller, PollState};
