pub mod models;
pub mod walk;

pub use models::{FieldmapScan, Scan};
pub use walk::{find_task_documents, subject_root_of, SessionLayout};
