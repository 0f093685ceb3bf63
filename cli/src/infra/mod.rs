//! Infrastructure layer: concrete implementations of application port traits.
//!
//! All I/O-performing code lives here: the SSH transport and local filesystem
//! access.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod fs;
pub mod ssh;
