//! HTTP service exposing name resolution and archived attribute reads.

pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;

pub use routes::build_router;
pub use state::AppState;
