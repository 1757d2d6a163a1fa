//! Wire format for input and correction messages
//!
//! # Wire Format
//!
//! ```text
//! envelope:   [entity_id, kind:u8, body...]
//! input:      [sender_tick: Option<Tick>, count: u8, (tick, payload) x count]
//! correction: [tick, payload]
//! ```
//!
//! Integers use bincode's varint encoding. The record count of an input
//! message is checked against the configured maximum before any record is
//! decoded, so an oversized batch costs the receiver nothing beyond the header.

use crate::{Error, Result};
use bincode::Options;
use rewind_core::{EntityId, InputRecord, Snapshot, Tick};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Upper bound on any single decoded value, in bytes
pub const MAX_MESSAGE_BYTES: u64 = 64 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_MESSAGE_BYTES)
}

/// Message kind byte following the entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Redundant batch of input records
    Input = 1,
    /// Authoritative state correction
    Correction = 2,
}

impl TryFrom<u8> for MessageKind {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(MessageKind::Input),
            2 => Ok(MessageKind::Correction),
            other => Err(Error::UnknownMessageKind(other)),
        }
    }
}

/// Routing header of every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    /// Target entity
    pub entity: EntityId,
    /// Kind of body that follows
    pub kind: MessageKind,
}

/// Prefix `body` with its routing header
pub fn encode_envelope(entity: EntityId, kind: MessageKind, body: &[u8]) -> Result<Vec<u8>> {
    let mut bytes = options()
        .serialize(&(entity.raw(), kind as u8))
        .map_err(|e| Error::Serialization(e.to_string()))?;
    bytes.extend_from_slice(body);
    Ok(bytes)
}

/// Bytes the routing header adds in front of a body
pub fn envelope_len(entity: EntityId, kind: MessageKind) -> Result<usize> {
    Ok(encode_envelope(entity, kind, &[])?.len())
}

/// Split a message into its routing header and body
pub fn decode_envelope(bytes: &[u8]) -> Result<(Envelope, &[u8])> {
    let mut cursor = Cursor::new(bytes);
    let (entity, kind): (u64, u8) = options()
        .deserialize_from(&mut cursor)
        .map_err(|e| Error::protocol(format!("malformed envelope: {e}")))?;
    let kind = MessageKind::try_from(kind)?;
    let body = &bytes[cursor.position() as usize..];
    Ok((
        Envelope {
            entity: EntityId::new(entity),
            kind,
        },
        body,
    ))
}

#[derive(Serialize, Deserialize)]
struct InputHeader {
    sender_tick: Option<Tick>,
    count: u8,
}

/// Decoded input message
#[derive(Debug, Clone, PartialEq)]
pub struct InputBatch<T> {
    /// Sender's local tick when the message was written
    pub sender_tick: Option<Tick>,
    /// Records, oldest first
    pub records: Vec<(Tick, T)>,
}

/// Encode an input message from `records`, oldest first
///
/// At most 255 records are written; callers bound the count by redundancy.
pub fn encode_inputs<'a, T, I>(sender_tick: Option<Tick>, records: I) -> Result<Vec<u8>>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a InputRecord<T>>,
    I::IntoIter: ExactSizeIterator,
{
    let records = records.into_iter();
    let count = u8::try_from(records.len())
        .map_err(|_| Error::Serialization(format!("{} records in one message", records.len())))?;

    let mut bytes = Vec::new();
    options()
        .serialize_into(&mut bytes, &InputHeader { sender_tick, count })
        .map_err(|e| Error::Serialization(e.to_string()))?;
    for record in records {
        options()
            .serialize_into(&mut bytes, &(record.tick, &record.payload))
            .map_err(|e| Error::Serialization(e.to_string()))?;
    }
    Ok(bytes)
}

/// Decode an input message, rejecting batches larger than `max_count`
pub fn decode_inputs<T: DeserializeOwned>(body: &[u8], max_count: u8) -> Result<InputBatch<T>> {
    let mut cursor = Cursor::new(body);
    let header: InputHeader = options()
        .deserialize_from(&mut cursor)
        .map_err(|e| Error::protocol(format!("malformed input header: {e}")))?;
    if header.count > max_count {
        return Err(Error::protocol(format!(
            "input batch of {} records exceeds maximum {}",
            header.count, max_count
        )));
    }

    let mut records = Vec::with_capacity(header.count as usize);
    for _ in 0..header.count {
        let (tick, payload): (Tick, T) = options()
            .deserialize_from(&mut cursor)
            .map_err(|e| Error::protocol(format!("malformed input record: {e}")))?;
        records.push((tick.validated()?, payload));
    }

    Ok(InputBatch {
        sender_tick: header.sender_tick.filter(|tick| tick.is_set()),
        records,
    })
}

/// Encode a correction message
pub fn encode_correction<S: Serialize>(tick: Tick, state: &S) -> Result<Vec<u8>> {
    options()
        .serialize(&(tick, state))
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a correction message
pub fn decode_correction<S: DeserializeOwned>(body: &[u8]) -> Result<Snapshot<S>> {
    let (tick, state): (Tick, S) = options()
        .deserialize_from(&mut Cursor::new(body))
        .map_err(|e| Error::protocol(format!("malformed correction: {e}")))?;
    Ok(Snapshot::new(tick.validated()?, state))
}
