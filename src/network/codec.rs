//! Frame encoding for both membership protocol versions.
//!
//! # v1 frame
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ LEN: u32 BE  │ bincode(V1Message)           │
//! └──────────────┴──────────────────────────────┘
//! ```
//!
//! # v2 frame
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ MAGIC: [u8; 2] = "RG"                           │
//! ├─────────────────────────────────────────────────┤
//! │ VERSION: u8 = 2                                 │
//! ├─────────────────────────────────────────────────┤
//! │ KIND: u8 (1=query, 2=reply, 3=error)            │
//! ├─────────────────────────────────────────────────┤
//! │ FLAGS: u32 (reserved)                           │
//! ├─────────────────────────────────────────────────┤
//! │ REQUEST_ID: u64                                 │
//! ├─────────────────────────────────────────────────┤
//! │ LEN: u32                                        │
//! ├─────────────────────────────────────────────────┤
//! │ CRC32: u32 (CRC-32/ISCSI of payload)            │
//! ├─────────────────────────────────────────────────┤
//! │ PAYLOAD: bincode                                │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian.

use crate::network::rpc::{
    ErrorReplyV2, MembershipQueryV2, MembershipReplyV2, Request, Response, V1MembershipReply,
    V1Message,
};
use crate::ring::SnapshotError;
use crate::types::ProtocolVersion;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_32_ISCSI};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Default upper bound on a frame payload.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// v2 magic bytes.
pub const MAGIC_V2: [u8; 2] = [b'R', b'G'];

/// v2 header size in bytes.
pub const HEADER_SIZE_V2: usize = 24;

const KIND_QUERY: u8 = 1;
const KIND_REPLY: u8 = 2;
const KIND_ERROR: u8 = 3;

/// Frame encoding and decoding errors.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed mid-frame")]
    Truncated,

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown frame kind: {0}")]
    UnknownKind(u8),

    #[error("checksum mismatch: header {expected:#010x}, payload {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
}

/// Fixed header preceding every v2 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeaderV2 {
    pub kind: u8,
    pub flags: u32,
    pub request_id: u64,
    pub len: u32,
    pub crc: u32,
}

impl FrameHeaderV2 {
    fn for_payload(kind: u8, request_id: u64, payload: &[u8]) -> Self {
        Self {
            kind,
            flags: 0,
            request_id,
            len: payload.len() as u32,
            crc: CRC32.checksum(payload),
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE_V2] {
        let mut buf = [0u8; HEADER_SIZE_V2];
        let mut out = &mut buf[..];
        out.put_slice(&MAGIC_V2);
        out.put_u8(2);
        out.put_u8(self.kind);
        out.put_u32(self.flags);
        out.put_u64(self.request_id);
        out.put_u32(self.len);
        out.put_u32(self.crc);
        buf
    }

    /// Parse header from bytes.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE_V2]) -> Result<Self, CodecError> {
        if buf[0..2] != MAGIC_V2 {
            return Err(CodecError::InvalidMagic);
        }
        let mut buf = &buf[2..];
        let version = buf.get_u8();
        if version != 2 {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let kind = buf.get_u8();
        if !matches!(kind, KIND_QUERY | KIND_REPLY | KIND_ERROR) {
            return Err(CodecError::UnknownKind(kind));
        }
        Ok(Self {
            kind,
            flags: buf.get_u32(),
            request_id: buf.get_u64(),
            len: buf.get_u32(),
            crc: buf.get_u32(),
        })
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn deserialize<'a, T: serde::Deserialize<'a>>(data: &'a [u8]) -> Result<T, CodecError> {
    bincode::deserialize(data).map_err(|e| CodecError::Deserialization(e.to_string()))
}

fn frame_v1(message: &V1Message) -> Result<Bytes, CodecError> {
    let data = serialize(message)?;
    let mut framed = BytesMut::with_capacity(4 + data.len());
    framed.put_u32(data.len() as u32);
    framed.put_slice(&data);
    Ok(framed.freeze())
}

fn frame_v2(kind: u8, request_id: u64, payload: &[u8]) -> Bytes {
    let header = FrameHeaderV2::for_payload(kind, request_id, payload);
    let mut framed = BytesMut::with_capacity(HEADER_SIZE_V2 + payload.len());
    framed.put_slice(&header.to_bytes());
    framed.put_slice(payload);
    framed.freeze()
}

/// Encode a request into a complete frame.
pub fn encode_request(version: ProtocolVersion, request: &Request) -> Result<Bytes, CodecError> {
    match (version, request) {
        (ProtocolVersion::V1, Request::Membership { request_id, .. }) => {
            frame_v1(&V1Message::MembershipQuery {
                request_id: *request_id,
            })
        }
        (
            ProtocolVersion::V2,
            Request::Membership {
                request_id,
                include_faulty,
            },
        ) => {
            let payload = serialize(&MembershipQueryV2 {
                include_faulty: *include_faulty,
            })?;
            Ok(frame_v2(KIND_QUERY, *request_id, &payload))
        }
    }
}

/// Encode a response into a complete frame.
pub fn encode_response(version: ProtocolVersion, response: &Response) -> Result<Bytes, CodecError> {
    match version {
        ProtocolVersion::V1 => {
            let message = match response {
                Response::Membership {
                    request_id,
                    snapshot,
                } => V1Message::MembershipReply(V1MembershipReply::from_snapshot(
                    *request_id,
                    snapshot,
                )),
                Response::Error {
                    request_id,
                    message,
                } => V1Message::Error {
                    request_id: *request_id,
                    message: message.clone(),
                },
            };
            frame_v1(&message)
        }
        ProtocolVersion::V2 => match response {
            Response::Membership {
                request_id,
                snapshot,
            } => {
                let payload = serialize(&MembershipReplyV2::from_snapshot(snapshot))?;
                Ok(frame_v2(KIND_REPLY, *request_id, &payload))
            }
            Response::Error {
                request_id,
                message,
            } => {
                let payload = serialize(&ErrorReplyV2 {
                    message: message.clone(),
                })?;
                Ok(frame_v2(KIND_ERROR, *request_id, &payload))
            }
        },
    }
}

/// A raw frame read off the stream, before payload decoding.
enum RawFrame {
    V1(Vec<u8>),
    V2(FrameHeaderV2, Vec<u8>),
}

async fn read_exact_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool, CodecError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(CodecError::Io(e)),
    }
}

/// Read one frame. Returns `None` if the stream ended cleanly before it.
async fn read_frame<R>(
    reader: &mut R,
    version: ProtocolVersion,
    max_frame_size: usize,
) -> Result<Option<RawFrame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let (header, len) = match version {
        ProtocolVersion::V1 => {
            let mut len_buf = [0u8; 4];
            if !read_exact_or_eof(reader, &mut len_buf).await? {
                return Ok(None);
            }
            (None, u32::from_be_bytes(len_buf) as usize)
        }
        ProtocolVersion::V2 => {
            let mut header_buf = [0u8; HEADER_SIZE_V2];
            if !read_exact_or_eof(reader, &mut header_buf).await? {
                return Ok(None);
            }
            let header = FrameHeaderV2::from_bytes(&header_buf)?;
            (Some(header), header.len as usize)
        }
    };

    if len > max_frame_size {
        return Err(CodecError::FrameTooLarge {
            len,
            max: max_frame_size,
        });
    }

    let mut data = vec![0u8; len];
    if !read_exact_or_eof(reader, &mut data).await? {
        return Err(CodecError::Truncated);
    }

    match header {
        None => Ok(Some(RawFrame::V1(data))),
        Some(header) => {
            let actual = CRC32.checksum(&data);
            if actual != header.crc {
                return Err(CodecError::ChecksumMismatch {
                    expected: header.crc,
                    actual,
                });
            }
            Ok(Some(RawFrame::V2(header, data)))
        }
    }
}

/// Read a request frame. Returns `None` when the peer closed the connection.
pub async fn read_request<R>(
    reader: &mut R,
    version: ProtocolVersion,
    max_frame_size: usize,
) -> Result<Option<Request>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let frame = match read_frame(reader, version, max_frame_size).await? {
        Some(frame) => frame,
        None => return Ok(None),
    };

    match frame {
        RawFrame::V1(data) => match deserialize::<V1Message>(&data)? {
            V1Message::MembershipQuery { request_id } => Ok(Some(Request::membership(request_id))),
            _ => Err(CodecError::UnexpectedMessage("expected membership query")),
        },
        RawFrame::V2(header, data) => {
            if header.kind != KIND_QUERY {
                return Err(CodecError::UnexpectedMessage("expected membership query"));
            }
            let query: MembershipQueryV2 = deserialize(&data)?;
            Ok(Some(Request::Membership {
                request_id: header.request_id,
                include_faulty: query.include_faulty,
            }))
        }
    }
}

/// Read a response frame.
pub async fn read_response<R>(
    reader: &mut R,
    version: ProtocolVersion,
    max_frame_size: usize,
) -> Result<Response, CodecError>
where
    R: AsyncRead + Unpin,
{
    let frame = read_frame(reader, version, max_frame_size)
        .await?
        .ok_or(CodecError::Truncated)?;

    match frame {
        RawFrame::V1(data) => match deserialize::<V1Message>(&data)? {
            V1Message::MembershipReply(reply) => Ok(Response::Membership {
                request_id: reply.request_id,
                snapshot: reply.into_snapshot()?,
            }),
            V1Message::Error {
                request_id,
                message,
            } => Ok(Response::Error {
                request_id,
                message,
            }),
            V1Message::MembershipQuery { .. } => {
                Err(CodecError::UnexpectedMessage("expected membership reply"))
            }
        },
        RawFrame::V2(header, data) => match header.kind {
            KIND_REPLY => {
                let reply: MembershipReplyV2 = deserialize(&data)?;
                Ok(Response::Membership {
                    request_id: header.request_id,
                    snapshot: reply.into_snapshot()?,
                })
            }
            KIND_ERROR => {
                let reply: ErrorReplyV2 = deserialize(&data)?;
                Ok(Response::Error {
                    request_id: header.request_id,
                    message: reply.message,
                })
            }
            _ => Err(CodecError::UnexpectedMessage("expected membership reply")),
        },
    }
}

/// Write a complete frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
