//! filesyncd — the protocol runtime: authentication, per-connection
//! sessions, frame dispatch, and the TLS listener.

pub mod auth;
pub mod handlers;
pub mod mux;
pub mod server;
pub mod session;

pub use auth::{AuthError, Authenticator};
pub use mux::{Mux, Request};
pub use server::FileServer;
pub use session::Session;
