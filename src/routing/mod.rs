//! Consumer routing subsystem.

pub mod router;

pub use router::{resolve, RouteMatch};
