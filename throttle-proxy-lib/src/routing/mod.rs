//! Longest-prefix routing from request paths to upstream targets.

mod table;
mod target;

pub use table::{RouteEntry, RouteMatch, RouteTable};
pub use target::{parse_target, Target};
