/// Error types for Forum Service
///
/// Every failure inside the service is an `AppError`. Only the kinds listed in
/// `ErrorKind` ever cross the service boundary; storage connectivity,
/// serialization and timeout failures collapse into `ErrorKind::InternalServer`
/// and are logged rather than detailed to the caller.
use std::fmt;
use thiserror::Error;

/// Result type for forum-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("post not found")]
    PostNotFound,

    #[error("comment not found")]
    CommentNotFound,

    #[error("parent comment not found")]
    ParentCommentNotFound,

    #[error("comments disabled for this post")]
    CommentsRestricted,

    #[error("comment is deleted")]
    CommentDeleted,

    #[error("cannot reply to deleted comment")]
    ParentCommentDeleted,

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("id must be valid integer")]
    InvalidId,

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Request deadline elapsed before the store answered
    #[error("Operation timed out: {operation} after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (catch-all)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error annotated with the call site that observed it
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

/// The fixed set of error kinds exposed to API layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PostNotFound,
    CommentNotFound,
    ParentCommentNotFound,
    CommentsRestricted,
    CommentDeleted,
    ParentCommentDeleted,
    InvalidCursor,
    InvalidId,
    InternalServer,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::PostNotFound,
        ErrorKind::CommentNotFound,
        ErrorKind::ParentCommentNotFound,
        ErrorKind::CommentsRestricted,
        ErrorKind::CommentDeleted,
        ErrorKind::ParentCommentDeleted,
        ErrorKind::InvalidCursor,
        ErrorKind::InvalidId,
        ErrorKind::InternalServer,
    ];

    /// User-facing message for this kind
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::PostNotFound => "post not found",
            ErrorKind::CommentNotFound => "comment not found",
            ErrorKind::ParentCommentNotFound => "parent comment not found",
            ErrorKind::CommentsRestricted => "comments disabled for this post",
            ErrorKind::CommentDeleted => "comment is deleted",
            ErrorKind::ParentCommentDeleted => "cannot reply to deleted comment",
            ErrorKind::InvalidCursor => "invalid cursor",
            ErrorKind::InvalidId => "id must be valid integer",
            ErrorKind::InternalServer => "internal server error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl AppError {
    /// Classify into the exposable kind. Wrapped errors report the kind of
    /// their innermost source.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::PostNotFound => ErrorKind::PostNotFound,
            AppError::CommentNotFound => ErrorKind::CommentNotFound,
            AppError::ParentCommentNotFound => ErrorKind::ParentCommentNotFound,
            AppError::CommentsRestricted => ErrorKind::CommentsRestricted,
            AppError::CommentDeleted => ErrorKind::CommentDeleted,
            AppError::ParentCommentDeleted => ErrorKind::ParentCommentDeleted,
            AppError::InvalidCursor => ErrorKind::InvalidCursor,
            AppError::InvalidId => ErrorKind::InvalidId,
            AppError::Context { source, .. } => source.kind(),
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Timeout { .. }
            | AppError::Config(_)
            | AppError::Internal(_) => ErrorKind::InternalServer,
        }
    }

    /// Wrap with call-site context, keeping the classification intact
    pub fn context(self, context: &'static str) -> Self {
        AppError::Context {
            context,
            source: Box::new(self),
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::InternalServer
    }

    /// Log error with appropriate level and context
    pub fn log(&self) {
        if self.is_internal() {
            tracing::error!(error = %self, "Server error");
        } else {
            tracing::debug!(error = %self, kind = ?self.kind(), "Client error");
        }
    }
}

/// Extension for attaching call-site context to store results
pub trait ResultExt<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
}
