#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::missing_crate_level_docs)]
//! Transient kernel patching with ordered fallback.
//!
//! A [`Strategy`](strategy::Strategy) resolves the address of a kernel routine, corrupts one
//! instruction through a [`Patcher`](patcher::Patcher) backend, issues the privileged call while
//! the patch is live and reverts the patch on every exit path. The
//! [`Orchestrator`](orchestrator::Orchestrator) tries strategies in priority order until one succeeds.

pub mod address;
pub mod config;
pub mod elevate;
pub mod neutralizer;
pub mod orchestrator;
pub mod patcher;
pub mod resolver;
pub mod strategy;
pub mod transaction;
pub mod unlinked;
pub mod window;

#[cfg(test)]
mod testing;

pub use address::KernelAddress;
