//! Pattern routing
//!
//! A [`Router`] binds patterns with named wildcards to handlers and hooks
//! itself into the client's dispatch chain as a [`Route`].

mod handler;
mod registry;
mod route;
mod router;

pub use handler::{Handler, SyncHandler, handler_fn};
pub use route::Route;
pub use router::{Router, RouterOptions};
