//! Traffic signal core: a phase-cycling controller publishing its
//! transitions through a blocking hand-off queue.

pub use traffic_signals::{BlockingQueue, ConfigError, Phase, SignalConfig};

mod cycle;

pub mod controller;
pub use controller::SignalController;

pub mod error;
pub use error::SignalError;

pub mod shutdown;
pub use shutdown::ShutdownSignal;
