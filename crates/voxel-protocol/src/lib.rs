pub mod envelope;
pub mod error;
pub mod kinds;
pub mod messages;

pub use envelope::{ClientMessage, Envelope, RelayKind};
pub use error::ProtocolError;
pub use messages::{ErrorShape, Frame, LeavePayload, ServerMessage};
