//! Registry & broadcast engine.
//!
//! One task owns the live connection set, the position cache and the event
//! catalog, and performs every fan-out. Everything else reaches it through
//! a [`HubHandle`], so the state is never observed mid-mutation.

pub mod command;
pub mod error;
pub mod handle;
pub mod registry;

pub use command::{Audience, Connection, HubCommand, HubStats};
pub use error::HubError;
pub use handle::{spawn, HubHandle};
pub use registry::{Delivery, Registry};
