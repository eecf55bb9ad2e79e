//! GLB (binary glTF) container reading and writing
use nom::{
    bytes::complete::{tag, take},
    combinator::verify,
    multi::many0,
    number::complete::le_u32,
    sequence::tuple,
    IResult,
};

use crate::error::{ExportError, ExportResult};

pub const GLB_MAGIC: &[u8; 4] = b"glTF";
pub const GLB_VERSION: u32 = 2;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: u32,
    pub data: &'a [u8],
}

/// A parsed GLB container borrowing from the input bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlbContainer<'a> {
    pub version: u32,
    pub length: u32,
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

impl<'a> GlbContainer<'a> {
    /// Parse a complete container; the declared length must match the input
    pub fn parse(data: &'a [u8]) -> ExportResult<Self> {
        let (_, (version, length)) = parse_header(data)
            .map_err(|e| ExportError::Container(format!("bad header: {e:?}")))?;
        if version != GLB_VERSION {
            return Err(ExportError::Container(format!(
                "unsupported GLB version {version}"
            )));
        }
        if length as usize != data.len() {
            return Err(ExportError::Container(format!(
                "declared length {length} but {} bytes present",
                data.len()
            )));
        }

        let body = &data[HEADER_LEN..];
        let (rest, chunks) = many0(parse_chunk)(body)
            .map_err(|e| ExportError::Container(format!("bad chunk: {e:?}")))?;
        if !rest.is_empty() {
            return Err(ExportError::Container(format!(
                "{} trailing bytes after last chunk",
                rest.len()
            )));
        }

        let mut chunks = chunks.into_iter();
        let json = match chunks.next() {
            Some(chunk) if chunk.kind == CHUNK_TYPE_JSON => chunk.data,
            _ => {
                return Err(ExportError::Container(
                    "first chunk must be JSON".to_string(),
                ))
            }
        };
        let bin = match chunks.next() {
            Some(chunk) if chunk.kind == CHUNK_TYPE_BIN => Some(chunk.data),
            Some(chunk) => {
                return Err(ExportError::Container(format!(
                    "unexpected chunk type {:#010x}",
                    chunk.kind
                )))
            }
            None => None,
        };

        Ok(Self {
            version,
            length,
            json,
            bin,
        })
    }

    pub fn json_value(&self) -> ExportResult<serde_json::Value> {
        Ok(serde_json::from_slice(self.json)?)
    }
}

/// Cheap check for the GLB magic
pub fn is_glb(data: &[u8]) -> bool {
    data.len() >= 4 && &data[..4] == GLB_MAGIC
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (u32, u32)> {
    let (input, _) = tag(&GLB_MAGIC[..])(input)?;
    let (input, version) = le_u32(input)?;
    let (input, length) = le_u32(input)?;
    Ok((input, (version, length)))
}

fn parse_chunk(input: &[u8]) -> IResult<&[u8], Chunk<'_>> {
    let (input, (length, kind)) =
        tuple((verify(le_u32, |len: &u32| len % 4 == 0), le_u32))(input)?;
    let (input, data) = take(length)(input)?;
    Ok((input, Chunk { kind, data }))
}

/// Assemble a GLB container. JSON is padded with spaces, BIN with zeros.
pub fn write_glb(json: &[u8], bin: Option<&[u8]>) -> ExportResult<Vec<u8>> {
    let json_len = padded_len(json.len());
    let bin_len = bin.map(|b| padded_len(b.len()));
    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_len
        + bin_len.map_or(0, |len| CHUNK_HEADER_LEN + len);
    let total_u32 = u32::try_from(total)
        .map_err(|_| ExportError::Container(format!("{total} bytes exceeds GLB size limit")))?;

    let mut glb = Vec::with_capacity(total);

    // Header
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_u32.to_le_bytes());

    // JSON chunk
    glb.extend_from_slice(&(json_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_TYPE_JSON.to_le_bytes());
    glb.extend_from_slice(json);
    glb.resize(glb.len() + json_len - json.len(), b' ');

    // BIN chunk
    if let (Some(bin), Some(bin_len)) = (bin, bin_len) {
        glb.extend_from_slice(&(bin_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_TYPE_BIN.to_le_bytes());
        glb.extend_from_slice(bin);
        glb.resize(glb.len() + bin_len - bin.len(), 0);
    }

    Ok(glb)
}

pub fn padded_len(len: usize) -> usize {
    len.div_ceil(4) * 4
}
