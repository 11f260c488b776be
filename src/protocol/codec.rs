use std::collections::BTreeMap;
use std::future::Future;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

use super::message::{
    CombinedEntry, CombinedResult, Delay, DelayResult, MapInfo, Query, ReplyStatus,
    ShortestPathResult,
};
use crate::core::{Error, MapId, Result};
use crate::network::{FrameReader, FrameWriter};

/// A message with a fixed binary layout
///
/// Fields are native-endian and written in declaration order. Collections are
/// a `u32` count followed by that many fixed-size entries. There is no tag:
/// both ends know which message comes next.
pub trait WireMessage: Sized + Send + Sync {
    /// Name used in logs
    const KIND: &'static str;

    /// Appends the encoded message to `dst`
    fn encode(&self, dst: &mut BytesMut) -> Result<()>;

    /// Reads one message from `src`, field by field
    fn decode<R: FrameReader>(src: &mut R) -> impl Future<Output = Result<Self>> + Send;
}

/// Protocol message codec for encoding network messages
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Creates a new message codec
    pub fn new() -> Self {
        MessageCodec
    }
}

impl<'a, M: WireMessage> Encoder<&'a M> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, item: &'a M, dst: &mut BytesMut) -> Result<()> {
        item.encode(dst)
    }
}

/// Writes `message` without flushing, so it can share a frame with the next one
pub async fn write_message<W, M>(dst: &mut W, message: &M) -> Result<()>
where
    W: FrameWriter,
    M: WireMessage,
{
    let mut buf = BytesMut::new();
    MessageCodec::new().encode(message, &mut buf)?;
    dst.write(&buf).await
}

/// Writes `message` and flushes it
pub async fn send_message<W, M>(dst: &mut W, message: &M) -> Result<()>
where
    W: FrameWriter,
    M: WireMessage,
{
    write_message(dst, message).await?;
    dst.flush().await
}

/// Reads one `M` from `src`
pub async fn read_message<R, M>(src: &mut R) -> Result<M>
where
    R: FrameReader,
    M: WireMessage,
{
    M::decode(src).await
}

async fn read_u8<R: FrameReader>(src: &mut R) -> Result<u8> {
    Ok(src.read(1).await?.get_u8())
}

async fn read_u32<R: FrameReader>(src: &mut R) -> Result<u32> {
    Ok(src.read(4).await?.get_u32_ne())
}

async fn read_i64<R: FrameReader>(src: &mut R) -> Result<i64> {
    Ok(src.read(8).await?.get_i64_ne())
}

async fn read_f64<R: FrameReader>(src: &mut R) -> Result<f64> {
    Ok(src.read(8).await?.get_f64_ne())
}

// Reply status codes, followed by an i64 detail
const STATUS_OK: u8 = 0;
const STATUS_MAP_NOT_FOUND: u8 = 1;
const STATUS_VERTEX_NOT_FOUND: u8 = 2;
const STATUS_OVERSIZED: u8 = 3;
const STATUS_FAILED: u8 = 4;

fn put_count(dst: &mut BytesMut, len: usize) -> Result<()> {
    let count = u32::try_from(len).map_err(|_| Error::Oversized {
        len,
        capacity: u32::MAX as usize,
    })?;
    dst.put_u32_ne(count);
    Ok(())
}

fn put_map_info(dst: &mut BytesMut, info: &MapInfo) {
    dst.put_u8(info.id.as_byte());
    dst.put_f64_ne(info.propagation_speed);
    dst.put_f64_ne(info.transmission_speed);
}

async fn read_map_id<R: FrameReader>(src: &mut R, kind: &'static str) -> Result<MapId> {
    let byte = read_u8(src).await?;
    MapId::from_byte(byte).map_err(|e| Error::malformed(kind, e))
}

async fn read_map_info<R: FrameReader>(src: &mut R) -> Result<MapInfo> {
    Ok(MapInfo {
        id: read_map_id(src, ShortestPathResult::KIND).await?,
        propagation_speed: read_f64(src).await?,
        transmission_speed: read_f64(src).await?,
    })
}

impl WireMessage for Query {
    const KIND: &'static str = "query";

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(self.map.as_byte());
        dst.put_i64_ne(self.source);
        dst.put_i64_ne(self.file_size);
        Ok(())
    }

    async fn decode<R: FrameReader>(src: &mut R) -> Result<Self> {
        Ok(Query {
            map: read_map_id(src, Self::KIND).await?,
            source: read_i64(src).await?,
            file_size: read_i64(src).await?,
        })
    }
}

impl WireMessage for ShortestPathResult {
    const KIND: &'static str = "shortest-path result";

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        put_map_info(dst, &self.map);
        dst.put_i64_ne(self.source);
        put_count(dst, self.distances.len())?;
        for (&vertex, &distance) in &self.distances {
            dst.put_i64_ne(vertex);
            dst.put_i64_ne(distance);
        }
        Ok(())
    }

    async fn decode<R: FrameReader>(src: &mut R) -> Result<Self> {
        let map = read_map_info(src).await?;
        let source = read_i64(src).await?;
        let count = read_u32(src).await?;

        let mut distances = BTreeMap::new();
        for _ in 0..count {
            let vertex = read_i64(src).await?;
            let distance = read_i64(src).await?;
            distances.insert(vertex, distance);
        }

        Ok(ShortestPathResult {
            map,
            source,
            distances,
        })
    }
}

impl WireMessage for DelayResult {
    const KIND: &'static str = "delay result";

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        put_count(dst, self.delays.len())?;
        for (&vertex, delay) in &self.delays {
            dst.put_i64_ne(vertex);
            dst.put_f64_ne(delay.transmission);
            dst.put_f64_ne(delay.propagation);
        }
        Ok(())
    }

    async fn decode<R: FrameReader>(src: &mut R) -> Result<Self> {
        let count = read_u32(src).await?;

        let mut delays = BTreeMap::new();
        for _ in 0..count {
            let vertex = read_i64(src).await?;
            let delay = Delay {
                transmission: read_f64(src).await?,
                propagation: read_f64(src).await?,
            };
            delays.insert(vertex, delay);
        }

        Ok(DelayResult { delays })
    }
}

impl WireMessage for ReplyStatus {
    const KIND: &'static str = "reply status";

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let (code, detail) = match *self {
            ReplyStatus::Ok => (STATUS_OK, 0),
            ReplyStatus::MapNotFound(id) => (STATUS_MAP_NOT_FOUND, i64::from(id.as_byte())),
            ReplyStatus::VertexNotFound(vertex) => (STATUS_VERTEX_NOT_FOUND, vertex),
            ReplyStatus::Oversized { len } => (STATUS_OVERSIZED, len as i64),
            ReplyStatus::Failed => (STATUS_FAILED, 0),
        };
        dst.put_u8(code);
        dst.put_i64_ne(detail);
        Ok(())
    }

    async fn decode<R: FrameReader>(src: &mut R) -> Result<Self> {
        let code = read_u8(src).await?;
        let detail = read_i64(src).await?;

        match code {
            STATUS_OK => Ok(ReplyStatus::Ok),
            STATUS_MAP_NOT_FOUND => {
                let byte = u8::try_from(detail)
                    .map_err(|_| Error::malformed(Self::KIND, format!("map id {}", detail)))?;
                let id = MapId::from_byte(byte).map_err(|e| Error::malformed(Self::KIND, e))?;
                Ok(ReplyStatus::MapNotFound(id))
            }
            STATUS_VERTEX_NOT_FOUND => Ok(ReplyStatus::VertexNotFound(detail)),
            STATUS_OVERSIZED => {
                let len = usize::try_from(detail)
                    .map_err(|_| Error::malformed(Self::KIND, format!("length {}", detail)))?;
                Ok(ReplyStatus::Oversized { len })
            }
            STATUS_FAILED => Ok(ReplyStatus::Failed),
            other => Err(Error::malformed(Self::KIND, format!("unknown code {}", other))),
        }
    }
}

impl WireMessage for CombinedResult {
    const KIND: &'static str = "combined result";

    fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        put_count(dst, self.entries.len())?;
        for (&vertex, entry) in &self.entries {
            dst.put_i64_ne(vertex);
            dst.put_i64_ne(entry.distance);
            dst.put_f64_ne(entry.transmission);
            dst.put_f64_ne(entry.propagation);
        }
        Ok(())
    }

    async fn decode<R: FrameReader>(src: &mut R) -> Result<Self> {
        let count = read_u32(src).await?;

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let vertex = read_i64(src).await?;
            let entry = CombinedEntry {
                distance: read_i64(src).await?,
                transmission: read_f64(src).await?,
                propagation: read_f64(src).await?,
            };
            entries.insert(vertex, entry);
        }

        Ok(CombinedResult { entries })
    }
}
