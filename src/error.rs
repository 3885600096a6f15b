use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Result too large: {count} records exceed the cap of {cap}")]
    ResultTooLarge { count: usize, cap: usize },
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("Dataset not found: {0}")]
    NotFound(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl InsightError {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
    pub fn is_invalid_query(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }
    pub fn is_result_too_large(&self) -> bool {
        matches!(self, Self::ResultTooLarge { .. })
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;

// Helper conversions
impl From<config::ConfigError> for InsightError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for InsightError {
    fn from(e: serde_json::Error) -> Self { Self::InvalidDataset(e.to_string()) }
}
impl From<std::io::Error> for InsightError {
    fn from(e: std::io::Error) -> Self { Self::Io(e.to_string()) }
}
