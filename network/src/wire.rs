// Copyright (c) The RAFDP Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wire frames of the datagram protocol.
//!
//! | Frame                    | Layout                                              |
//! |--------------------------|-----------------------------------------------------|
//! | PING                     | literal `"RAFDPPING"`                               |
//! | PONG                     | literal `"RAFDPPONG"`                               |
//! | REQUEST                  | `0x00 ++ identifier bytes`                          |
//! | RESPONSE-NONBINARY       | `0x01 0x00 ++ ASCII payload`                        |
//! | RESPONSE-BINARY-FRAGMENT | `0x01 0x01 ++ varint(index) ++ varint(count)`       |
//! |                          | `++ varint(id_len) ++ id ++ fragment bytes`         |


use rafdp_storage::CHUNK_SIZE;
use rafdp_types::{
    identifier::IdentifierError,
    varint::{parse_varint, to_varint, VarintError, MAX_HEX_DIGITS},
    Identifier,
};
use thiserror::Error;

/// Liveness probe, answered by [`PONG`].
pub const PING: &[u8] = b"RAFDPPING";
/// Liveness reply.
pub const PONG: &[u8] = b"RAFDPPONG";

const OPCODE_REQUEST: u8 = 0x00;
const OPCODE_RESPONSE: u8 = 0x01;
const RESPONSE_NONBINARY: u8 = 0x00;
const RESPONSE_BINARY_FRAGMENT: u8 = 0x01;

/// Fragment payload cap, conservative enough to fit any sane MTU.
pub const FRAGMENT_PAYLOAD_SIZE: usize = 508;

/// Largest leaf payload a peer can legitimately serve: the varint chunk
/// index prefix plus one full chunk.
const MAX_LEAF_PAYLOAD: usize = 1 + MAX_HEX_DIGITS + CHUNK_SIZE;

/// Largest fragment count a legitimate leaf can split into. The declared
/// count sizes the reassembly buffer, so anything above this is rejected
/// at decode before an allocation can happen.
pub const MAX_FRAGMENT_COUNT: u64 =
    ((MAX_LEAF_PAYLOAD + FRAGMENT_PAYLOAD_SIZE - 1) / FRAGMENT_PAYLOAD_SIZE) as u64;

/// Largest datagram the transport will accept. Platforms whose default UDP
/// maximum is smaller must be raised by the operator.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Error thrown when a datagram fails to parse as a frame.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum WireError {
    #[error("empty datagram")]
    EmptyDatagram,

    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("truncated frame")]
    Truncated,

    #[error("fragment index {index} outside fragment count {count}")]
    FragmentOutOfRange { index: u64, count: u64 },

    #[error("fragment count {0} exceeds the largest possible leaf")]
    OversizeFragmentCount(u64),

    #[error(transparent)]
    Varint(#[from] VarintError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

/// A parsed datagram.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Frame {
    Ping,
    Pong,
    /// Ask the peer for the payload of an identifier.
    Request(Identifier),
    /// The ASCII payload of an internal node.
    NonBinaryResponse(Vec<u8>),
    /// One datagram-sized piece of a leaf's materialized bytes.
    BinaryFragment {
        index: u64,
        count: u64,
        id: Identifier,
        bytes: Vec<u8>,
    },
}

impl Frame {
    /// Parses a raw datagram.
    pub fn decode(data: &[u8]) -> Result<Frame, WireError> {
        if data == PING {
            return Ok(Frame::Ping);
        }
        if data == PONG {
            return Ok(Frame::Pong);
        }
        let (&opcode, rest) = data.split_first().ok_or(WireError::EmptyDatagram)?;
        match opcode {
            OPCODE_REQUEST => Ok(Frame::Request(Identifier::from_wire(rest)?)),
            OPCODE_RESPONSE => {
                let (&kind, rest) = rest.split_first().ok_or(WireError::Truncated)?;
                match kind {
                    RESPONSE_NONBINARY => Ok(Frame::NonBinaryResponse(rest.to_vec())),
                    RESPONSE_BINARY_FRAGMENT => decode_fragment(rest),
                    other => Err(WireError::UnknownOpcode(other)),
                }
            }
            other => Err(WireError::UnknownOpcode(other)),
        }
    }

    /// Encodes the frame into a datagram.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            Frame::Ping => Ok(PING.to_vec()),
            Frame::Pong => Ok(PONG.to_vec()),
            Frame::Request(id) => {
                let mut out = Vec::with_capacity(1 + id.len());
                out.push(OPCODE_REQUEST);
                out.extend_from_slice(id.as_bytes());
                Ok(out)
            }
            Frame::NonBinaryResponse(payload) => {
                let mut out = Vec::with_capacity(2 + payload.len());
                out.push(OPCODE_RESPONSE);
                out.push(RESPONSE_NONBINARY);
                out.extend_from_slice(payload);
                Ok(out)
            }
            Frame::BinaryFragment {
                index,
                count,
                id,
                bytes,
            } => {
                let mut out = Vec::with_capacity(2 + 24 + id.len() + bytes.len());
                out.push(OPCODE_RESPONSE);
                out.push(RESPONSE_BINARY_FRAGMENT);
                out.extend_from_slice(&to_varint(*index)?);
                out.extend_from_slice(&to_varint(*count)?);
                out.extend_from_slice(&to_varint(id.len() as u64)?);
                out.extend_from_slice(id.as_bytes());
                out.extend_from_slice(bytes);
                Ok(out)
            }
        }
    }
}

fn decode_fragment(data: &[u8]) -> Result<Frame, WireError> {
    let (index, data) = parse_varint(data)?;
    let (count, data) = parse_varint(data)?;
    let (id_len, data) = parse_varint(data)?;
    if count > MAX_FRAGMENT_COUNT {
        return Err(WireError::OversizeFragmentCount(count));
    }
    if index >= count {
        return Err(WireError::FragmentOutOfRange { index, count });
    }
    let id_len = id_len as usize;
    if data.len() < id_len {
        return Err(WireError::Truncated);
    }
    let (id_bytes, bytes) = data.split_at(id_len);
    Ok(Frame::BinaryFragment {
        index,
        count,
        id: Identifier::from_wire(id_bytes)?,
        bytes: bytes.to_vec(),
    })
}

/// Splits a leaf's materialized payload into the fragment frames that carry
/// it, each holding at most [`FRAGMENT_PAYLOAD_SIZE`] payload bytes.
pub fn fragment_series(id: &Identifier, payload: &[u8]) -> Vec<Frame> {
    let fragments: Vec<&[u8]> = payload.chunks(FRAGMENT_PAYLOAD_SIZE).collect();
    let count = fragments.len() as u64;
    fragments
        .into_iter()
        .enumerate()
        .map(|(index, bytes)| Frame::BinaryFragment {
            index: index as u64,
            count,
            id: id.clone(),
            bytes: bytes.to_vec(),
        })
        .collect()
}
