use thiserror::Error;

/// Failures raised while wiring the process together or talking to the
/// outside world: sockets, Postgres, the tracing stack, bad settings.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("invalid configuration: {message}")]
    Configuration { message: String },
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
    #[error("database failure: {message}")]
    Database { message: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}
