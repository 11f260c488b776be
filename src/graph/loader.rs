use std::path::Path;

use tracing::{debug, info};

use crate::core::{Distance, Error, MapId, Result, VertexId};
use crate::protocol::MapInfo;

use super::map::Map;
use super::registry::MapRegistry;

/// What the next non-blank line must be
enum Expect {
    /// A map identifier or an edge of the current map
    HeaderOrEdge,
    /// Propagation speed of the map just opened
    PropagationSpeed { id: MapId },
    /// Transmission speed of the map just opened
    TransmissionSpeed { id: MapId, propagation: f64 },
}

/// Parses map descriptions
///
/// Each map is an identifier line, a propagation-speed line, a
/// transmission-speed line, then any number of `src dest distance` lines.
/// Blank lines are ignored. Errors name the 1-based offending line.
pub fn parse_maps(text: &str) -> Result<Vec<Map>> {
    let mut maps = Vec::new();
    let mut current: Option<Map> = None;
    let mut expect = Expect::HeaderOrEdge;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        expect = match expect {
            Expect::HeaderOrEdge => match tokens.as_slice() {
                [id] => {
                    maps.extend(current.take());
                    let id = id
                        .parse::<MapId>()
                        .map_err(|e| Error::map_format(line_no, e.to_string()))?;
                    Expect::PropagationSpeed { id }
                }
                [src, dest, distance] => {
                    let map = current.as_mut().ok_or_else(|| {
                        Error::map_format(line_no, "edge before any map identifier")
                    })?;
                    let src: VertexId = parse_number(line_no, "source vertex", src)?;
                    let dest: VertexId = parse_number(line_no, "destination vertex", dest)?;
                    let distance: Distance = parse_number(line_no, "distance", distance)?;
                    map.add_edge(src, dest, distance)
                        .map_err(|e| Error::map_format(line_no, e.to_string()))?;
                    Expect::HeaderOrEdge
                }
                other => {
                    return Err(Error::map_format(
                        line_no,
                        format!("expected 1 or 3 fields, found {}", other.len()),
                    ))
                }
            },
            Expect::PropagationSpeed { id } => {
                let propagation = parse_speed(line_no, "propagation speed", &tokens)?;
                Expect::TransmissionSpeed { id, propagation }
            }
            Expect::TransmissionSpeed { id, propagation } => {
                let transmission = parse_speed(line_no, "transmission speed", &tokens)?;
                let info = MapInfo {
                    id,
                    propagation_speed: propagation,
                    transmission_speed: transmission,
                };
                current = Some(Map::new(info).map_err(|e| Error::map_format(line_no, e.to_string()))?);
                Expect::HeaderOrEdge
            }
        };
    }

    match expect {
        Expect::HeaderOrEdge => {}
        _ => {
            return Err(Error::map_format(
                text.lines().count(),
                "file ends before both speeds of the last map",
            ))
        }
    }
    maps.extend(current);

    Ok(maps)
}

/// Reads and parses a map file into a registry
pub fn load_registry(path: impl AsRef<Path>) -> Result<MapRegistry> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read map file {}: {}", path.display(), e)))?;

    let maps = parse_maps(&text)?;
    debug!(path = %path.display(), maps = maps.len(), "map file parsed");

    let registry = MapRegistry::new(maps)?;
    for summary in registry.summaries() {
        info!(
            map = %summary.id,
            vertices = summary.vertices,
            edges = summary.edges,
            "map loaded"
        );
    }
    Ok(registry)
}

fn parse_number<T: std::str::FromStr>(line_no: usize, what: &str, token: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    token
        .parse()
        .map_err(|e| Error::map_format(line_no, format!("invalid {} {:?}: {}", what, token, e)))
}

fn parse_speed(line_no: usize, what: &str, tokens: &[&str]) -> Result<f64> {
    match tokens {
        [token] => parse_number(line_no, what, token),
        _ => Err(Error::map_format(
            line_no,
            format!("expected a single {}, found {} fields", what, tokens.len()),
        )),
    }
}
