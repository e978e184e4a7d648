pub mod connection;
pub mod dispatch;
