use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Insufficient history: need {needed} bars, have {have}")]
    InsufficientHistory { needed: usize, have: usize },

    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Parameter validation failed: {0}")]
    ParameterValidation(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Strategy internal error: {0}")]
    StrategyInternal(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

/// Errors surfaced by a market-data provider.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Timeout fetching {0}")]
    Timeout(String),

    #[error("No data returned for {0}")]
    Empty(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Errors surfaced by a notification sink.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification transport error: {0}")]
    Transport(String),
}
