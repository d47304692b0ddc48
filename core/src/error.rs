use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid period: month {month}, year {year}")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("Financial report for {month}/{year} not found")]
    ReportNotFound { month: u32, year: i32 },

    #[error("Job '{job}' panicked")]
    JobPanicked { job: String },

    #[error("Job '{job}' lock poisoned by an earlier panic")]
    LockPoisoned { job: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
