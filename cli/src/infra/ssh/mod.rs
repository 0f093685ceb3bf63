//! SSH transport: one connection, buffered and streamed commands, and
//! single-file uploads.

pub mod connect;
pub mod exec;
pub mod scp;

pub use connect::{ConnectParams, SshConnection};
