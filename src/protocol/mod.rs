//! Protocol implementation module
//!
//! This module defines the four message kinds exchanged between the
//! requester, the relay and the engines, the status engines put in front of
//! every reply, and their fixed binary layouts.

pub mod codec;
pub mod message;

pub use self::codec::{read_message, send_message, write_message, MessageCodec, WireMessage};
pub use self::message::{
    CombinedEntry, CombinedResult, Delay, DelayResult, MapInfo, Query, ReplyStatus,
    ShortestPathResult,
};
