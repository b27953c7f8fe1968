//! netrpc server - exposes a [`Registry`](netrpc_core::Registry) over JSON-RPC.
//!
//! Hosts build a registry, register their services, then hand it to
//! [`serve_stdio`] to answer a plugin on the process's own stdin/stdout, or
//! to [`serve_with`] for any other stream pair.

mod handlers;
pub mod server;

pub use server::{serve_stdio, serve_with, AppState};
