//! HTTP handlers for different API endpoints.

pub mod health;
pub mod names;
pub mod series;

pub use health::healthz;
pub use names::names;
pub use series::{attributes, read, refresh, write};
