use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("not initialized: run 'kanban init'")]
    NotInitialized,

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("board not found: {0}")]
    BoardNotFound(String),

    #[error("board already exists: {0}")]
    BoardExists(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("comment not found: {0}")]
    CommentNotFound(String),

    #[error("attachment not found: {0}")]
    AttachmentNotFound(String),

    #[error("invite not found or expired: {0}")]
    InviteNotFound(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid column: {0}")]
    InvalidColumn(String),

    #[error("invalid position {index}: column '{column}' accepts 0..={max}")]
    InvalidPosition {
        column: String,
        index: i64,
        max: usize,
    },

    #[error("column '{column}' is full: at most {limit} tasks allowed")]
    CapacityExceeded { column: String, limit: usize },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Signed in, but not allowed to act on this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl KanbanError {
    /// True for the conditions a caller can fix by choosing another column or index.
    pub fn is_invalid_destination(&self) -> bool {
        matches!(
            self,
            KanbanError::InvalidColumn(_) | KanbanError::InvalidPosition { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KanbanError>;
