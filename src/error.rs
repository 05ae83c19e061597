use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgendaError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Database error: {message}")]
    Database { message: String },
}

impl From<rusqlite::Error> for AgendaError {
    fn from(err: rusqlite::Error) -> Self {
        AgendaError::Database {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgendaError>;
