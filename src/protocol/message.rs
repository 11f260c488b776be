use std::collections::BTreeMap;

use crate::core::{
    Distance, Error, FileSize, MapId, Result, Seconds, VertexId, BITS_PER_BYTE, MAX_DATAGRAM_SIZE,
};

/// Per-map metadata carried alongside shortest-path results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapInfo {
    /// Map identifier
    pub id: MapId,
    /// Propagation speed in distance units per second
    pub propagation_speed: f64,
    /// Transmission speed in bytes per second
    pub transmission_speed: f64,
}

/// A requester's question: delays from `source` on `map` for a file of `file_size` bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    /// Map to search
    pub map: MapId,
    /// Source vertex
    pub source: VertexId,
    /// File size in bits
    pub file_size: FileSize,
}

/// Shortest distances from one source to every reachable destination
///
/// The source itself is never a key, and unreachable vertices are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPathResult {
    /// Map the distances were computed on
    pub map: MapInfo,
    /// Source vertex
    pub source: VertexId,
    /// Destination to shortest distance
    pub distances: BTreeMap<VertexId, Distance>,
}

impl ShortestPathResult {
    /// Creates an empty result
    pub fn new(map: MapInfo, source: VertexId) -> Self {
        ShortestPathResult {
            map,
            source,
            distances: BTreeMap::new(),
        }
    }
}

/// Transfer delay towards one destination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delay {
    /// Seconds to put the file on the wire
    pub transmission: Seconds,
    /// Seconds for the signal to cover the distance
    pub propagation: Seconds,
}

impl Delay {
    /// Computes the delay for a file of `file_size` bits over `distance`
    pub fn new(file_size: FileSize, map: &MapInfo, distance: Distance) -> Self {
        Delay {
            transmission: file_size as f64 / BITS_PER_BYTE / map.transmission_speed,
            propagation: distance as f64 / map.propagation_speed,
        }
    }

    /// End-to-end delay
    pub fn total(&self) -> Seconds {
        self.transmission + self.propagation
    }
}

/// Delays to every destination of a [`ShortestPathResult`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayResult {
    /// Destination to delay
    pub delays: BTreeMap<VertexId, Delay>,
}

/// Distance and delays towards one destination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombinedEntry {
    /// Shortest distance
    pub distance: Distance,
    /// Transmission delay in seconds
    pub transmission: Seconds,
    /// Propagation delay in seconds
    pub propagation: Seconds,
}

impl CombinedEntry {
    /// End-to-end delay
    pub fn total(&self) -> Seconds {
        self.transmission + self.propagation
    }
}

/// Shortest distances and delays joined on destination vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedResult {
    /// Destination to joined entry
    pub entries: BTreeMap<VertexId, CombinedEntry>,
}

impl CombinedResult {
    /// Joins distances and delays
    ///
    /// Both inputs must cover exactly the same destinations. Any vertex
    /// present on one side only is reported in [`Error::ResultMismatch`].
    pub fn join(paths: &ShortestPathResult, delays: &DelayResult) -> Result<Self> {
        let missing_delay: Vec<VertexId> = paths
            .distances
            .keys()
            .filter(|v| !delays.delays.contains_key(v))
            .copied()
            .collect();
        let missing_distance: Vec<VertexId> = delays
            .delays
            .keys()
            .filter(|v| !paths.distances.contains_key(v))
            .copied()
            .collect();

        if !missing_delay.is_empty() || !missing_distance.is_empty() {
            return Err(Error::ResultMismatch {
                missing_delay,
                missing_distance,
            });
        }

        let entries = paths
            .distances
            .iter()
            .zip(delays.delays.values())
            .map(|((&vertex, &distance), delay)| {
                (
                    vertex,
                    CombinedEntry {
                        distance,
                        transmission: delay.transmission,
                        propagation: delay.propagation,
                    },
                )
            })
            .collect();

        Ok(CombinedResult { entries })
    }
}

/// Outcome an engine puts in front of every reply
///
/// The result follows in the same datagram only when the status is
/// [`ReplyStatus::Ok`]. Failures carry the key that caused them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Result follows
    Ok,
    /// The query named a map the engine does not have
    MapNotFound(MapId),
    /// The source vertex is not on the map
    VertexNotFound(VertexId),
    /// The result did not fit in one datagram
    Oversized { len: usize },
    /// Any other failure, such as an undecodable request
    Failed,
}

impl ReplyStatus {
    /// Status reporting `err` back to the requesting peer
    pub fn from_error(err: &Error) -> Self {
        match *err {
            Error::MapNotFound(id) => ReplyStatus::MapNotFound(id),
            Error::VertexNotFound(vertex) => ReplyStatus::VertexNotFound(vertex),
            Error::Oversized { len, .. } => ReplyStatus::Oversized { len },
            _ => ReplyStatus::Failed,
        }
    }

    /// Turns a failure status from `engine` back into its error
    pub fn into_result(self, engine: &str) -> Result<()> {
        match self {
            ReplyStatus::Ok => Ok(()),
            ReplyStatus::MapNotFound(id) => Err(Error::MapNotFound(id)),
            ReplyStatus::VertexNotFound(vertex) => Err(Error::VertexNotFound(vertex)),
            ReplyStatus::Oversized { len } => Err(Error::Oversized {
                len,
                capacity: MAX_DATAGRAM_SIZE,
            }),
            ReplyStatus::Failed => Err(Error::EngineFailed {
                engine: engine.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_a() -> MapInfo {
        MapInfo {
            id: MapId::new('A').unwrap(),
            propagation_speed: 2.0,
            transmission_speed: 100.0,
        }
    }

    fn paths(distances: &[(VertexId, Distance)]) -> ShortestPathResult {
        let mut result = ShortestPathResult::new(map_a(), 1);
        result.distances.extend(distances.iter().copied());
        result
    }

    fn delays(vertices: &[VertexId]) -> DelayResult {
        DelayResult {
            delays: vertices
                .iter()
                .map(|&v| (v, Delay { transmission: 1.0, propagation: v as f64 }))
                .collect(),
        }
    }

    #[test]
    fn test_delay_formula() {
        let delay = Delay::new(800, &map_a(), 15);
        assert_eq!(delay.transmission, 1.0);
        assert_eq!(delay.propagation, 7.5);
        assert_eq!(delay.total(), 8.5);
    }

    #[test]
    fn test_join_matching_keys() {
        let joined = CombinedResult::join(&paths(&[(2, 10), (3, 15)]), &delays(&[2, 3])).unwrap();

        assert_eq!(joined.entries.len(), 2);
        assert_eq!(
            joined.entries[&3],
            CombinedEntry {
                distance: 15,
                transmission: 1.0,
                propagation: 3.0,
            }
        );
        assert_eq!(joined.entries[&3].total(), 4.0);
    }

    #[test]
    fn test_join_mismatch_reports_vertices() {
        let err = CombinedResult::join(&paths(&[(2, 10), (3, 15)]), &delays(&[3, 4])).unwrap_err();

        match err {
            Error::ResultMismatch {
                missing_delay,
                missing_distance,
            } => {
                assert_eq!(missing_delay, vec![2]);
                assert_eq!(missing_distance, vec![4]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_join_empty() {
        let joined = CombinedResult::join(&paths(&[]), &DelayResult::default()).unwrap();
        assert!(joined.entries.is_empty());

        assert!(CombinedResult::join(&paths(&[]), &delays(&[9])).is_err());
    }

    #[test]
    fn test_reply_status_keeps_key() {
        let map = MapId::new('Z').unwrap();
        let status = ReplyStatus::from_error(&Error::MapNotFound(map));
        assert_eq!(status, ReplyStatus::MapNotFound(map));
        assert!(matches!(status.into_result("engine"), Err(Error::MapNotFound(id)) if id == map));

        let status = ReplyStatus::from_error(&Error::VertexNotFound(99));
        assert!(matches!(status.into_result("engine"), Err(Error::VertexNotFound(99))));

        let oversized = Error::Oversized { len: 70_000, capacity: MAX_DATAGRAM_SIZE };
        assert_eq!(ReplyStatus::from_error(&oversized), ReplyStatus::Oversized { len: 70_000 });

        let truncated = Error::DatagramUnderRead { requested: 8, remaining: 2 };
        let status = ReplyStatus::from_error(&truncated);
        assert_eq!(status, ReplyStatus::Failed);
        assert!(matches!(
            status.into_result("127.0.0.1:21943"),
            Err(Error::EngineFailed { engine }) if engine == "127.0.0.1:21943"
        ));

        assert!(ReplyStatus::Ok.into_result("engine").is_ok());
    }
}
