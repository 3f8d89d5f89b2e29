use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// No usable image info provider could be set up. Fatal.
    #[error("Startup configuration error: {0}")]
    StartupConfiguration(String),

    #[error("Not a session directory: {}", .0.display())]
    InvalidSession(PathBuf),

    #[error("Invalid metadata document {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("No paired image for {}", .0.display())]
    MissingPairedImage(PathBuf),

    #[error("Image info failed for {}: {message}", path.display())]
    ImageInfo { path: PathBuf, message: String },

    #[error("Could not replace document: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl Error {
    /// Errors caused by the content of a single document or scan. Others
    /// (I/O, replacing a file) point at the environment and log as errors;
    /// the session keeps going either way.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::InvalidDocument { .. } | Error::MissingPairedImage(_) | Error::ImageInfo { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_errors_are_local() {
        assert!(Error::MissingPairedImage(PathBuf::from("x.json")).is_local());
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        assert!(!io.is_local());
        assert!(!Error::InvalidSession(PathBuf::from("/nowhere")).is_local());
    }
}
