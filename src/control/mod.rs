//! Control channel
//!
//! The TCP side of a call: slash commands typed on one endpoint are
//! relayed to the other so mute, pause and hang-up stay in sync.

pub mod channel;
pub mod router;

pub use channel::{ControlDialer, ControlLink, ControlListener};
pub use router::{Command, CommandRouter};
