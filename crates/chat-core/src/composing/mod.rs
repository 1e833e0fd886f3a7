//! is-composing indications (RFC 3994)
//!
//! Three timers per conversation:
//!
//! | Timer          | Default | Started by                  | On expiry                     |
//! |----------------|---------|-----------------------------|-------------------------------|
//! | idle           | 15 s    | every local keystroke       | send `idle`                   |
//! | refresh        | 60 s    | local idle -> active        | re-send `active`, reschedule  |
//! | remote refresh | 120 s   | `active` received from peer | report peer stopped composing |

pub mod machine;
pub mod payload;

use rvoip_signaling_core::IdentityAddress;

pub use machine::IsComposing;
pub use payload::{CONTENT_TYPE, ComposingIndication, ComposingMode, NAMESPACE};

/// Application side of an [`IsComposing`] machine
///
/// Called on the timer source's context or the caller's, never with the
/// machine's lock held.
pub trait IsComposingListener: Send + Sync {
    /// Deliver a payload to the peer, as a message of type [`CONTENT_TYPE`]
    fn send_indication(&self, content: String);

    /// `peer` announced `active`
    fn remote_is_composing(&self, peer: &IdentityAddress);

    /// `peer` announced `idle`, its `active` was not refreshed in time, or
    /// another peer's payload took over
    fn remote_composing_stopped(&self, peer: &IdentityAddress);
}
