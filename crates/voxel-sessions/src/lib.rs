pub mod error;
pub mod manager;
pub mod table;

pub use error::{Rejection, SessionError};
pub use manager::SessionManager;
pub use table::SessionTable;
