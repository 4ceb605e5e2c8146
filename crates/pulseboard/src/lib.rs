//! Service composition for the feedback scoring engine: YAML configuration,
//! response/schema storage, logging setup, and the bridge that rescoring
//! rides between the realtime distributor and the scoring core.

pub mod bridge;
pub mod config;
pub mod store;
pub mod telemetry;

pub use bridge::ScoreBridge;
pub use config::{ConfigError, PulseboardConfig};
pub use store::{MemoryResponseStore, ResponseStore, StoreError};
