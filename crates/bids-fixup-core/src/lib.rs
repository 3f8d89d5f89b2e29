pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod progress;
pub mod scanner;

pub use config::AppConfig;
pub use engine::{SessionEngine, SessionResult};
pub use error::Error;
pub use imaging::ImageInfoProvider;
pub use progress::{ProgressReporter, SilentReporter};
