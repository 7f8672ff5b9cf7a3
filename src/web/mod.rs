//! JSON control surface over HTTP.
//!
//! A thin shell: every handler calls straight into the [`Supervisor`](crate::supervisor::Supervisor)
//! and maps its answer onto a status code.

mod routes;
mod server;

pub use server::{router, serve};
