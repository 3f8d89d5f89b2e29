mod document;

pub use document::{ListWrite, MetadataDoc};
