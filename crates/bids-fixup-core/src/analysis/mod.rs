pub mod fieldmap;
pub mod task_names;
pub mod volumes;
