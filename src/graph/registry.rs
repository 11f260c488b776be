use std::collections::BTreeMap;

use crate::core::{Error, MapId, Result, VertexId};
use crate::protocol::ShortestPathResult;

use super::map::Map;

/// Vertex and edge totals of one map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSummary {
    /// Map identifier
    pub id: MapId,
    /// Number of vertices
    pub vertices: usize,
    /// Number of undirected edges
    pub edges: usize,
}

/// Immutable lookup from map identifier to map
///
/// Built once before the path engine starts serving and never changed
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct MapRegistry {
    maps: BTreeMap<MapId, Map>,
}

impl MapRegistry {
    /// Builds a registry, rejecting duplicate identifiers
    pub fn new(maps: impl IntoIterator<Item = Map>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for map in maps {
            let id = map.info().id;
            if by_id.insert(id, map).is_some() {
                return Err(Error::config(format!("duplicate map id {}", id)));
            }
        }
        Ok(MapRegistry { maps: by_id })
    }

    /// Looks up a map
    pub fn get(&self, id: MapId) -> Result<&Map> {
        self.maps.get(&id).ok_or(Error::MapNotFound(id))
    }

    /// Shortest paths from `source` on map `id`
    pub fn shortest_paths(&self, id: MapId, source: VertexId) -> Result<ShortestPathResult> {
        self.get(id)?.shortest_paths(source)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Per-map totals, in identifier order
    pub fn summaries(&self) -> Vec<MapSummary> {
        self.maps
            .values()
            .map(|map| MapSummary {
                id: map.info().id,
                vertices: map.vertex_count(),
                edges: map.edge_count(),
            })
            .collect()
    }
}
