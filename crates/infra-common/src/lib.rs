//! # RVOIP Infrastructure Common
//!
//! Shared plumbing for the signaling crates:
//!
//! - [`logging`]: `tracing-subscriber` setup driven by a [`LoggingConfig`]
//! - [`config`]: TOML + environment configuration loading
//! - [`timer`]: the [`TimerSource`] contract and its tokio implementation
//! - [`errors`]: the crate-wide [`Error`] type

pub mod config;
pub mod errors;
pub mod logging;
pub mod timer;

pub use config::{load_config, load_config_str};
pub use errors::{Error, Result};
pub use logging::{LoggingConfig, setup_logging};
pub use timer::{TimerCallback, TimerHandle, TimerSource, TokioTimerSource};
