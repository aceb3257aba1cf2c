use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the directory-watch service and the command-line
/// front end. The model itself never fails; stale input is dropped.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from reading directories or file metadata.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The platform watcher could not be created or refused a path.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The event loop's channel was closed.
    #[error("Event channel closed")]
    ChannelClosed,

    /// Notifications could not be encoded for output.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn watch_error_conversion() {
        let err: AppError = notify::Error::generic("inotify limit reached").into();
        assert!(matches!(err, AppError::Watch(_)));
        assert!(err.to_string().starts_with("Watch error:"));
    }

    #[test]
    fn invalid_path_error_display() {
        let err = AppError::InvalidPath("/nonexistent".into());
        assert_eq!(err.to_string(), "Invalid path: /nonexistent");
    }

    #[test]
    fn channel_closed_display() {
        assert_eq!(AppError::ChannelClosed.to_string(), "Event channel closed");
    }
}
