// Error taxonomy shared by the pipeline
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("series is empty")]
    EmptySeries,

    #[error("sample at {got} ms is older than series tail at {tail} ms")]
    OutOfOrderSample { tail: i64, got: i64 },

    #[error("subscriber callback failed: {0}")]
    SubscriberCallback(String),

    #[error("data source failure: {0}")]
    DataSourceFailure(String),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("unknown display mode '{0}'")]
    UnknownMode(String),

    #[error("unknown system '{0}'")]
    UnknownSystem(String),
}
