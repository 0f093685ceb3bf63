//! Application services: use-case orchestration.
//!
//! Each service module implements one step of a deployment by composing
//! domain logic with port trait calls. Services import only from
//! `crate::domain` and `crate::application::ports`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod backup;
pub mod compose;
pub mod deploy;
pub mod network;
pub mod prune;
pub mod registry;
pub mod remote;
pub mod requirements;
pub mod stack;
pub mod upload;
