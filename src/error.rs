use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP status error: {0}")]
    HttpStatus(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Task graph error: {0}")]
    TaskGraph(String),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Run cancelled before {0} completed")]
    Cancelled(String),
}

impl Error {
    /// Whether the failure came from reaching or reading the data source.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::HttpStatus(_)
                | Error::Request(_)
                | Error::Csv(_)
                | Error::Url(_)
                | Error::Fetch(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Fetch(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
