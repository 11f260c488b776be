//! Graph module
//!
//! Maps, the single-source shortest-path computation over them, the
//! immutable registry the path engine serves from, and the map file loader.

mod loader;
mod map;
mod registry;

pub use self::loader::{load_registry, parse_maps};
pub use self::map::Map;
pub use self::registry::{MapRegistry, MapSummary};
