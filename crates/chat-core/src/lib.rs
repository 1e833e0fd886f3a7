//! # RVOIP Chat Core
//!
//! Per-conversation helpers for instant messaging sessions. Currently the
//! is-composing machine of RFC 3994: local typing is announced to the peer
//! and the peer's announcements are tracked with expiring timers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_chat_core::{ComposingConfig, IsComposing, IsComposingListener};
//! use rvoip_infra_common::TokioTimerSource;
//! use rvoip_signaling_core::IdentityAddress;
//!
//! struct Chat;
//!
//! impl IsComposingListener for Chat {
//!     fn send_indication(&self, content: String) {
//!         // hand to the MESSAGE sender
//!     }
//!     fn remote_is_composing(&self, peer: &IdentityAddress) {}
//!     fn remote_composing_stopped(&self, peer: &IdentityAddress) {}
//! }
//!
//! # async fn example() -> rvoip_infra_common::Result<()> {
//! let timers = Arc::new(TokioTimerSource::current()?);
//! let composing = IsComposing::new(ComposingConfig::default(), timers, Arc::new(Chat));
//! composing.start_composing();
//! composing.stop_composing();
//! # Ok(())
//! # }
//! ```

pub mod composing;
pub mod config;
pub mod errors;

pub use composing::{ComposingIndication, ComposingMode, IsComposing, IsComposingListener};
pub use config::ComposingConfig;
pub use errors::{ComposingError, ComposingResult};
