use std::collections::{BTreeMap, BTreeSet};

use crate::core::{Distance, Error, Result, VertexId};
use crate::protocol::{MapInfo, ShortestPathResult};

/// Undirected weighted graph plus its per-map speeds
///
/// Vertices exist only as edge endpoints. Adjacency is kept in ordered maps,
/// so vertex iteration order, and with it Dijkstra's tie-breaking, is stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    /// Identifier and speeds
    info: MapInfo,
    /// Vertex to (neighbour to weight)
    adjacency: BTreeMap<VertexId, BTreeMap<VertexId, Distance>>,
}

impl Map {
    /// Creates a map without edges
    ///
    /// Both speeds must be finite and positive; they are divisors in every
    /// delay computed on this map.
    pub fn new(info: MapInfo) -> Result<Self> {
        for (name, speed) in [
            ("propagation", info.propagation_speed),
            ("transmission", info.transmission_speed),
        ] {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(Error::config(format!(
                    "map {}: {} speed must be positive, got {}",
                    info.id, name, speed
                )));
            }
        }

        Ok(Map {
            info,
            adjacency: BTreeMap::new(),
        })
    }

    /// Identifier and speeds of this map
    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    /// Adds an undirected edge, replacing any earlier weight for the same pair
    pub fn add_edge(&mut self, a: VertexId, b: VertexId, weight: Distance) -> Result<()> {
        if a == b {
            return Err(Error::invalid_argument(format!("self-loop on vertex {}", a)));
        }
        if weight < 0 {
            return Err(Error::invalid_argument(format!(
                "negative weight {} on edge {}-{}",
                weight, a, b
            )));
        }

        self.adjacency.entry(a).or_default().insert(b, weight);
        self.adjacency.entry(b).or_default().insert(a, weight);
        Ok(())
    }

    /// Whether `vertex` is an endpoint of some edge
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.adjacency.contains_key(&vertex)
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    /// Neighbours of `vertex` with edge weights
    pub fn neighbours(&self, vertex: VertexId) -> impl Iterator<Item = (VertexId, Distance)> + '_ {
        self.adjacency
            .get(&vertex)
            .into_iter()
            .flat_map(|edges| edges.iter().map(|(&v, &w)| (v, w)))
    }

    /// Shortest distances from `source` to every reachable vertex
    ///
    /// Dijkstra with linear minimum selection. Only query-local state is
    /// mutated, so a shared `&Map` serves any number of queries.
    pub fn shortest_paths(&self, source: VertexId) -> Result<ShortestPathResult> {
        if !self.contains(source) {
            return Err(Error::VertexNotFound(source));
        }

        let mut tentative: BTreeMap<VertexId, Distance> = BTreeMap::new();
        let mut visited: BTreeSet<VertexId> = BTreeSet::new();
        tentative.insert(source, 0);

        loop {
            // First minimum in vertex order wins ties
            let nearest = tentative
                .iter()
                .filter(|&(v, _)| !visited.contains(v))
                .min_by_key(|&(_, &d)| d)
                .map(|(&v, &d)| (v, d));
            let Some((vertex, distance)) = nearest else {
                break;
            };
            visited.insert(vertex);

            for (next, weight) in self.neighbours(vertex) {
                if visited.contains(&next) {
                    continue;
                }
                let candidate = distance.saturating_add(weight);
                let better = tentative.get(&next).map_or(true, |&known| candidate < known);
                if better {
                    tentative.insert(next, candidate);
                }
            }
        }

        tentative.remove(&source);
        Ok(ShortestPathResult {
            map: self.info,
            source,
            distances: tentative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MapId;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn info() -> MapInfo {
        MapInfo {
            id: MapId::new('A').unwrap(),
            propagation_speed: 2.0,
            transmission_speed: 100.0,
        }
    }

    fn map_with(edges: &[(VertexId, VertexId, Distance)]) -> Map {
        let mut map = Map::new(info()).unwrap();
        for &(a, b, w) in edges {
            map.add_edge(a, b, w).unwrap();
        }
        map
    }

    /// Minimum over every simple path, by exhaustive search
    fn brute_force(map: &Map, source: VertexId) -> BTreeMap<VertexId, Distance> {
        fn walk(
            map: &Map,
            at: VertexId,
            length: Distance,
            on_path: &mut BTreeSet<VertexId>,
            best: &mut BTreeMap<VertexId, Distance>,
        ) {
            for (next, w) in map.neighbours(at) {
                if on_path.contains(&next) {
                    continue;
                }
                let total = length + w;
                let entry = best.entry(next).or_insert(total);
                *entry = (*entry).min(total);
                on_path.insert(next);
                walk(map, next, total, on_path, best);
                on_path.remove(&next);
            }
        }

        let mut best = BTreeMap::new();
        let mut on_path = BTreeSet::from([source]);
        walk(map, source, 0, &mut on_path, &mut best);
        best.remove(&source);
        best
    }

    #[test]
    fn test_line_graph() {
        let map = map_with(&[(1, 2, 10), (2, 3, 5)]);
        let result = map.shortest_paths(1).unwrap();

        assert_eq!(result.source, 1);
        assert_eq!(result.map, info());
        assert_eq!(result.distances, BTreeMap::from([(2, 10), (3, 15)]));
    }

    #[test]
    fn test_prefers_cheaper_detour() {
        let map = map_with(&[(1, 2, 100), (1, 3, 1), (3, 4, 1), (4, 2, 1)]);
        let result = map.shortest_paths(1).unwrap();
        assert_eq!(result.distances[&2], 3);
    }

    #[test]
    fn test_source_excluded_and_unreachable_absent() {
        let map = map_with(&[(1, 2, 4), (7, 8, 1)]);
        let result = map.shortest_paths(1).unwrap();

        assert!(!result.distances.contains_key(&1));
        assert!(!result.distances.contains_key(&7));
        assert!(!result.distances.contains_key(&8));
        assert_eq!(result.distances.len(), 1);
    }

    #[test]
    fn test_zero_weight_edges() {
        let map = map_with(&[(1, 2, 0), (2, 3, 0)]);
        let result = map.shortest_paths(3).unwrap();
        assert_eq!(result.distances, BTreeMap::from([(1, 0), (2, 0)]));
    }

    #[test]
    fn test_unknown_source() {
        let map = map_with(&[(1, 2, 4)]);
        assert!(matches!(map.shortest_paths(9), Err(Error::VertexNotFound(9))));
    }

    #[test]
    fn test_edge_validation() {
        let mut map = Map::new(info()).unwrap();
        assert!(map.add_edge(1, 1, 3).is_err());
        assert!(map.add_edge(1, 2, -1).is_err());
        assert_eq!(map.vertex_count(), 0);

        map.add_edge(1, 2, 5).unwrap();
        map.add_edge(2, 1, 3).unwrap();
        assert_eq!(map.edge_count(), 1);
        assert_eq!(map.shortest_paths(1).unwrap().distances[&2], 3);
    }

    #[test]
    fn test_speed_validation() {
        let mut bad = info();
        bad.propagation_speed = 0.0;
        assert!(Map::new(bad).is_err());

        let mut bad = info();
        bad.transmission_speed = f64::NAN;
        assert!(Map::new(bad).is_err());
    }

    #[test]
    fn test_counts() {
        let map = map_with(&[(1, 2, 1), (2, 3, 1), (3, 1, 1), (3, 4, 1)]);
        assert_eq!(map.vertex_count(), 4);
        assert_eq!(map.edge_count(), 4);
    }

    #[test]
    fn test_matches_brute_force_on_random_graphs() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..50 {
            let vertices = rng.gen_range(2..8);
            let mut map = Map::new(info()).unwrap();
            for a in 0..vertices {
                for b in (a + 1)..vertices {
                    if rng.gen_bool(0.4) {
                        map.add_edge(a, b, rng.gen_range(0..20)).unwrap();
                    }
                }
            }

            for source in 0..vertices {
                if !map.contains(source) {
                    assert!(map.shortest_paths(source).is_err());
                    continue;
                }
                let result = map.shortest_paths(source).unwrap();
                assert_eq!(result.distances, brute_force(&map, source));
            }
        }
    }

    #[test]
    fn test_repeated_queries_are_stable() {
        let map = map_with(&[(1, 2, 2), (1, 3, 2), (2, 4, 1), (3, 4, 1)]);
        let first = map.shortest_paths(1).unwrap();
        for _ in 0..5 {
            assert_eq!(map.shortest_paths(1).unwrap(), first);
        }
    }
}
