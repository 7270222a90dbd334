//! Application error types with stable, client-facing error codes.

use std::fmt;

use thiserror::Error;

/// Entities addressable by id. Not-found responses always carry the
/// entity-specific code, never a generic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Project,
    Member,
    Bug,
    Comment,
    Attachment,
}

impl Resource {
    pub fn not_found_code(&self) -> &'static str {
        match self {
            Resource::User => "USER_NOT_FOUND",
            Resource::Project => "PROJECT_NOT_FOUND",
            Resource::Member => "MEMBER_NOT_FOUND",
            Resource::Bug => "BUG_NOT_FOUND",
            Resource::Comment => "COMMENT_NOT_FOUND",
            Resource::Attachment => "ATTACHMENT_NOT_FOUND",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Resource::User => "User",
            Resource::Project => "Project",
            Resource::Member => "Member",
            Resource::Bug => "Bug",
            Resource::Comment => "Comment",
            Resource::Attachment => "Attachment",
        };
        f.write_str(label)
    }
}

/// Entities referenced in a request body. A dangling reference is a client
/// mistake in the payload, so these reject with 400 rather than 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Project,
    Owner,
    Reporter,
    Assignee,
}

impl Reference {
    pub fn not_found_code(&self) -> &'static str {
        match self {
            Reference::Project => "PROJECT_NOT_FOUND",
            Reference::Owner => "OWNER_NOT_FOUND",
            Reference::Reporter => "REPORTER_NOT_FOUND",
            Reference::Assignee => "ASSIGNEE_NOT_FOUND",
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Reference::Project => "Project",
            Reference::Owner => "Owner",
            Reference::Reporter => "Reporter",
            Reference::Assignee => "Assignee",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query execution failed: {0}")]
    Query(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Foreign key violation: {0}")]
    ForeignKey(String),
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),
    #[error("Migration failed: {0}")]
    Migration(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid ID")]
    InvalidId,
    #[error("Validation failed")]
    Validation { details: serde_json::Value },
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("{0} not found")]
    MissingReference(Reference),
    #[error("User is already a member of this project")]
    MemberExists,
    #[error("User with this email already exists")]
    DuplicateEmail,
    #[error("Project with this key already exists")]
    DuplicateKey,
    #[error("File is required")]
    MissingFile,
    #[error("File type {0} is not allowed")]
    InvalidFileType(String),
    #[error("File size exceeds {limit_mb}MB limit")]
    FileTooLarge { limit_mb: u64 },
    #[error("Too many requests")]
    RateLimited { retry_after_ms: u64 },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidId => "INVALID_ID",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound(resource) => resource.not_found_code(),
            AppError::MissingReference(reference) => reference.not_found_code(),
            AppError::MemberExists => "MEMBER_EXISTS",
            AppError::DuplicateEmail => "DUPLICATE_EMAIL",
            AppError::DuplicateKey => "DUPLICATE_KEY",
            AppError::MissingFile => "MISSING_FILE",
            AppError::InvalidFileType(_) => "INVALID_FILE_TYPE",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Validation failure for a single field, in the same details shape
    /// as derive-based validation.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        AppError::Validation {
            details: serde_json::json!({ field: [message] }),
        }
    }

    /// True when the client is at fault and the message is safe to expose.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_)
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(&err).unwrap_or(serde_json::Value::Null);
        AppError::Validation { details }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted("Pool timed out".to_string()),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string());
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::Duplicate(constraint),
                    Some("23503") => DatabaseError::ForeignKey(constraint),
                    _ => DatabaseError::Query(db_err.message().to_string()),
                }
            }
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(DatabaseError::from(err))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(DatabaseError::Migration(err.to_string()))
    }
}
