use traffic_signals::ConfigError;

#[derive(thiserror::Error, Debug)]
pub enum SignalError {
    #[error("signal controller already started")]
    AlreadyStarted,
    #[error("signal controller has been shut down")]
    Shutdown,
    #[error("invalid signal config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn cycle thread: {0}")]
    Spawn(#[from] std::io::Error),
}
