//! Wire records exchanged over the control and results channels.
//!
//! Request layouts (type tag first):
//! ```text
//! TrackAssemblyRequest       type:i32 | module:u16[512] | assembly:u16[512]   2052 bytes
//! GetSequencePointsRequest   type:i32 | token:i32 | module:u16[512]           1032 bytes
//! ```
//! Response layouts (no tag):
//! ```text
//! TrackAssemblyResponse      track:bool32                                        4 bytes
//! GetSequencePointsResponse  more:bool32 | count:i32 | SequencePointRecord[count]
//! SequencePointRecord        unique_id:u32 | offset:i32                          8 bytes
//! ```
//! Results batch:
//! ```text
//! count:u32 | VisitRecord[count]     VisitRecord = unique_id:u32 | kind:i32  8 bytes
//! ```

use super::marshal::{
    self, get_bool, get_fixed_string, get_i32, get_u32, put_bool, put_fixed_string, put_i32,
    put_u32, WireRecord, FIXED_STRING_BYTES,
};
use crate::Core::error::{ChannelError, Result};

/// Number of sequence points carried by one response page.
pub const PAGE_CAPACITY: usize = 5;

/// Leading tag of every request.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    TrackAssembly = 1,
    GetSequencePoints = 2,
}

impl TryFrom<i32> for MessageType {
    type Error = ChannelError;

    fn try_from(tag: i32) -> Result<Self> {
        match tag {
            1 => Ok(MessageType::TrackAssembly),
            2 => Ok(MessageType::GetSequencePoints),
            other => Err(ChannelError::UnknownMessageType(other)),
        }
    }
}

/// Should the agent instrument this assembly?
///
/// The type tag is written on encode; [`Request::decode`] is what inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackAssemblyRequest {
    pub module_name: String,
    pub assembly_name: String,
}

impl TrackAssemblyRequest {
    pub fn new(module_name: impl Into<String>, assembly_name: impl Into<String>) -> Result<Self> {
        let request = Self {
            module_name: module_name.into(),
            assembly_name: assembly_name.into(),
        };
        marshal::validate_fixed_string(&request.module_name)?;
        marshal::validate_fixed_string(&request.assembly_name)?;
        Ok(request)
    }
}

impl WireRecord for TrackAssemblyRequest {
    const SIZE: usize = 4 + FIXED_STRING_BYTES + FIXED_STRING_BYTES;

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        put_i32(dst, 0, MessageType::TrackAssembly as i32);
        put_fixed_string(dst, 4, &self.module_name)?;
        put_fixed_string(dst, 4 + FIXED_STRING_BYTES, &self.assembly_name)
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Ok(Self {
            module_name: get_fixed_string(src, 4)?,
            assembly_name: get_fixed_string(src, 4 + FIXED_STRING_BYTES)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackAssemblyResponse {
    pub track: bool,
}

impl WireRecord for TrackAssemblyResponse {
    const SIZE: usize = 4;

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        put_bool(dst, 0, self.track);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Ok(Self {
            track: get_bool(src, 0),
        })
    }
}

/// Enumerate the sequence points of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetSequencePointsRequest {
    pub function_token: i32,
    pub module_name: String,
}

impl GetSequencePointsRequest {
    pub fn new(function_token: i32, module_name: impl Into<String>) -> Result<Self> {
        let request = Self {
            function_token,
            module_name: module_name.into(),
        };
        marshal::validate_fixed_string(&request.module_name)?;
        Ok(request)
    }
}

impl WireRecord for GetSequencePointsRequest {
    const SIZE: usize = 4 + 4 + FIXED_STRING_BYTES;

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        put_i32(dst, 0, MessageType::GetSequencePoints as i32);
        put_i32(dst, 4, self.function_token);
        put_fixed_string(dst, 8, &self.module_name)
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Ok(Self {
            function_token: get_i32(src, 4),
            module_name: get_fixed_string(src, 8)?,
        })
    }
}

/// Header of one page of sequence points; `count` records follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetSequencePointsResponse {
    pub more: bool,
    pub count: i32,
}

impl WireRecord for GetSequencePointsResponse {
    const SIZE: usize = 4 + 4;

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        put_bool(dst, 0, self.more);
        put_i32(dst, 4, self.count);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Ok(Self {
            more: get_bool(src, 0),
            count: get_i32(src, 4),
        })
    }
}

/// An instrumentable location within a function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencePointRecord {
    pub unique_id: u32,
    pub offset: i32,
}

impl WireRecord for SequencePointRecord {
    const SIZE: usize = 4 + 4;

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        put_u32(dst, 0, self.unique_id);
        put_i32(dst, 4, self.offset);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Ok(Self {
            unique_id: get_u32(src, 0),
            offset: get_i32(src, 4),
        })
    }
}

/// Size of one full page: header plus `PAGE_CAPACITY` records.
pub const fn full_page_size() -> usize {
    GetSequencePointsResponse::SIZE + PAGE_CAPACITY * SequencePointRecord::SIZE
}

/// Encode a page header and its records at the start of `buffer`.
/// Returns the number of bytes written.
pub fn encode_page(buffer: &mut [u8], more: bool, points: &[SequencePointRecord]) -> Result<usize> {
    let header = GetSequencePointsResponse {
        more,
        count: points.len() as i32,
    };
    let mut offset = marshal::write(&header, buffer, 0)?;
    for point in points {
        offset = marshal::write(point, buffer, offset)?;
    }
    Ok(offset)
}

/// Decode a page, appending its records to `out`. Returns the page header.
pub fn decode_page(buffer: &[u8], out: &mut Vec<SequencePointRecord>) -> Result<GetSequencePointsResponse> {
    let header: GetSequencePointsResponse = marshal::read(buffer, 0)?;
    if header.count < 0 || header.count as usize > PAGE_CAPACITY {
        return Err(ChannelError::BadPageCount(header.count));
    }
    let mut offset = GetSequencePointsResponse::SIZE;
    for _ in 0..header.count {
        out.push(marshal::read(buffer, offset)?);
        offset += SequencePointRecord::SIZE;
    }
    Ok(header)
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitKind {
    SequencePoint = 0,
    MethodEnter = 1,
    MethodLeave = 2,
}

impl TryFrom<i32> for VisitKind {
    type Error = ChannelError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(VisitKind::SequencePoint),
            1 => Ok(VisitKind::MethodEnter),
            2 => Ok(VisitKind::MethodLeave),
            other => Err(ChannelError::UnknownVisitKind(other)),
        }
    }
}

/// One observation that an instrumentation point executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitRecord {
    pub unique_id: u32,
    pub kind: VisitKind,
}

impl VisitRecord {
    pub fn new(unique_id: u32, kind: VisitKind) -> Self {
        Self { unique_id, kind }
    }
}

impl WireRecord for VisitRecord {
    const SIZE: usize = 4 + 4;

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        put_u32(dst, 0, self.unique_id);
        put_i32(dst, 4, self.kind as i32);
        Ok(())
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Ok(Self {
            unique_id: get_u32(src, 0),
            kind: VisitKind::try_from(get_i32(src, 4))?,
        })
    }
}

/// A decoded control-channel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    TrackAssembly(TrackAssemblyRequest),
    GetSequencePoints(GetSequencePointsRequest),
}

impl Request {
    /// Inspect the type tag, then decode the matching payload shape.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        let tag = buffer
            .get(0..4)
            .map(|raw| get_i32(raw, 0))
            .ok_or(ChannelError::Overrun {
                offset: 0,
                needed: 4,
                capacity: buffer.len(),
            })?;
        match MessageType::try_from(tag)? {
            MessageType::TrackAssembly => Ok(Request::TrackAssembly(marshal::read(buffer, 0)?)),
            MessageType::GetSequencePoints => {
                Ok(Request::GetSequencePoints(marshal::read(buffer, 0)?))
            }
        }
    }

    /// Encode at the start of `buffer`; returns the bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize> {
        match self {
            Request::TrackAssembly(request) => marshal::write(request, buffer, 0),
            Request::GetSequencePoints(request) => marshal::write(request, buffer, 0),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Request::TrackAssembly(_) => MessageType::TrackAssembly,
            Request::GetSequencePoints(_) => MessageType::GetSequencePoints,
        }
    }
}
