// src/tlv.rs
//! TLV element encoding used by the DV wire formats.
//!
//! Every element is `Type(1) | Length(varnum) | Value`. The length uses the
//! usual variable-size number encoding:
//! - `< 253`: one byte
//! - `0xFD` followed by a big-endian u16
//! - `0xFE` followed by a big-endian u32
//!
//! Non-negative integers are carried in the shortest of 1, 2, 4 or 8 bytes,
//! so encoding a given value always yields the same bytes.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::{Cursor, Read};
use thiserror::Error;

use crate::name::Name;

// Element types.
pub const NAME: u8 = 0x07;
pub const NAME_COMPONENT: u8 = 0x08;

pub const ADVERTISEMENT: u8 = 0xC9;
pub const ADV_LINK: u8 = 0xCA;
pub const INTERFACE_ID: u8 = 0xCB;
pub const NEIGHBOR: u8 = 0xCC;
pub const ADV_ENTRY: u8 = 0xCD;
pub const DESTINATION: u8 = 0xCE;
pub const NEXT_HOP: u8 = 0xCF;
pub const COST: u8 = 0xD0;
pub const OTHER_COST: u8 = 0xD1;

pub const PREFIX_OP_LIST: u8 = 0xD2;
pub const EXIT_ROUTER: u8 = 0xD3;
pub const PREFIX_OP_RESET: u8 = 0xD4;
pub const PREFIX_OP_ADD: u8 = 0xD5;
pub const PREFIX_OP_REMOVE: u8 = 0xD6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of buffer")]
    Truncated,
    #[error("element length {len} exceeds remaining {remaining} bytes")]
    LengthOverflow { len: usize, remaining: usize },
    #[error("expected TLV type {expected:#04x}, found {found:#04x}")]
    UnexpectedType { expected: u8, found: u8 },
    #[error("unknown TLV type {0:#04x}")]
    UnknownType(u8),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("duplicate field: {0}")]
    DuplicateField(&'static str),
    #[error("invalid non-negative integer length {0}")]
    BadInteger(usize),
    #[error("name component is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} trailing bytes after element")]
    TrailingBytes(usize),
}

impl From<std::io::Error> for DecodeError {
    fn from(_: std::io::Error) -> Self {
        // Cursor reads over a slice only ever fail on EOF.
        DecodeError::Truncated
    }
}

/// A single decoded TLV element. Nested structures keep their children
/// encoded in `value` until [`Tlv::children`] is called.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Tlv {
    pub tlv_type: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tlv_type: u8, value: Vec<u8>) -> Self {
        Tlv { tlv_type, value }
    }

    /// An element with no value (used as a flag).
    pub fn empty(tlv_type: u8) -> Self {
        Tlv::new(tlv_type, Vec::new())
    }

    /// An element carrying a non-negative integer in its shortest form.
    pub fn nonneg(tlv_type: u8, n: u64) -> Self {
        let value = if n <= u8::MAX as u64 {
            vec![n as u8]
        } else if n <= u16::MAX as u64 {
            let mut b = [0u8; 2];
            BigEndian::write_u16(&mut b, n as u16);
            b.to_vec()
        } else if n <= u32::MAX as u64 {
            let mut b = [0u8; 4];
            BigEndian::write_u32(&mut b, n as u32);
            b.to_vec()
        } else {
            let mut b = [0u8; 8];
            BigEndian::write_u64(&mut b, n);
            b.to_vec()
        };
        Tlv::new(tlv_type, value)
    }

    /// An element whose value is the concatenation of `children`.
    pub fn nested(tlv_type: u8, children: &[Tlv]) -> Self {
        let mut value = Vec::new();
        for c in children {
            c.write_to(&mut value);
        }
        Tlv::new(tlv_type, value)
    }

    /// Wrap a name in an outer element of type `tlv_type`.
    pub fn wrapped_name(tlv_type: u8, name: &Name) -> Self {
        Tlv::nested(tlv_type, &[encode_name(name)])
    }

    /// Parse a single TLV at the cursor position, advancing the cursor.
    pub fn parse(cur: &mut Cursor<&[u8]>) -> Result<Tlv, DecodeError> {
        let tlv_type = cur.read_u8()?;
        let len = read_varnum(cur)?;

        let pos = cur.position() as usize;
        let total = cur.get_ref().len();
        if len > total - pos {
            return Err(DecodeError::LengthOverflow {
                len,
                remaining: total - pos,
            });
        }
        let mut value = vec![0u8; len];
        cur.read_exact(&mut value)?;
        Ok(Tlv { tlv_type, value })
    }

    /// Parse all TLVs in `buf`. Unlike a lenient reader, any malformed
    /// element fails the whole buffer.
    pub fn parse_all(buf: &[u8]) -> Result<Vec<Tlv>, DecodeError> {
        let mut out = Vec::new();
        let mut cur = Cursor::new(buf);
        while (cur.position() as usize) < buf.len() {
            out.push(Tlv::parse(&mut cur)?);
        }
        Ok(out)
    }

    /// Parse exactly one element of type `expected` spanning all of `buf`.
    pub fn parse_exact(buf: &[u8], expected: u8) -> Result<Tlv, DecodeError> {
        let mut cur = Cursor::new(buf);
        let tlv = Tlv::parse(&mut cur)?;
        let rest = buf.len() - cur.position() as usize;
        if rest != 0 {
            return Err(DecodeError::TrailingBytes(rest));
        }
        tlv.expect_type(expected)?;
        Ok(tlv)
    }

    pub fn expect_type(&self, expected: u8) -> Result<(), DecodeError> {
        if self.tlv_type != expected {
            return Err(DecodeError::UnexpectedType {
                expected,
                found: self.tlv_type,
            });
        }
        Ok(())
    }

    pub fn children(&self) -> Result<Vec<Tlv>, DecodeError> {
        Tlv::parse_all(&self.value)
    }

    pub fn as_nonneg(&self) -> Result<u64, DecodeError> {
        let v = &self.value;
        match v.len() {
            1 => Ok(v[0] as u64),
            2 => Ok(BigEndian::read_u16(v) as u64),
            4 => Ok(BigEndian::read_u32(v) as u64),
            8 => Ok(BigEndian::read_u64(v)),
            n => Err(DecodeError::BadInteger(n)),
        }
    }

    /// Decode the single name wrapped inside this element.
    pub fn as_wrapped_name(&self) -> Result<Name, DecodeError> {
        let inner = Tlv::parse_exact(&self.value, NAME)?;
        decode_name(&inner)
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.tlv_type);
        write_varnum(buf, self.value.len());
        buf.extend_from_slice(&self.value);
    }

    /// Encode this Tlv into wire-format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.value.len() + 4);
        self.write_to(&mut buf);
        buf
    }
}

pub fn encode_name(name: &Name) -> Tlv {
    let comps: Vec<Tlv> = name
        .components()
        .iter()
        .map(|c| Tlv::new(NAME_COMPONENT, c.as_bytes().to_vec()))
        .collect();
    Tlv::nested(NAME, &comps)
}

pub fn decode_name(tlv: &Tlv) -> Result<Name, DecodeError> {
    tlv.expect_type(NAME)?;
    let mut components = Vec::new();
    for c in tlv.children()? {
        c.expect_type(NAME_COMPONENT)?;
        let s = String::from_utf8(c.value).map_err(|_| DecodeError::InvalidUtf8)?;
        components.push(s);
    }
    Ok(Name::from_components(components))
}

fn write_varnum(buf: &mut Vec<u8>, n: usize) {
    if n < 253 {
        buf.push(n as u8);
    } else if n <= u16::MAX as usize {
        buf.push(0xFD);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else {
        buf.push(0xFE);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    }
}

fn read_varnum(cur: &mut Cursor<&[u8]>) -> Result<usize, DecodeError> {
    let first = cur.read_u8()?;
    match first {
        0xFD => Ok(cur.read_u16::<BigEndian>()? as usize),
        0xFE => Ok(cur.read_u32::<BigEndian>()? as usize),
        0xFF => Err(DecodeError::BadInteger(8)),
        n => Ok(n as usize),
    }
}
