//! One name/value record.
//!
//! The body is a protobuf message with field 1 (`name`, string) and an
//! optional field 2 (`value`, string), preceded by its length as a base 128
//! varint. Unknown fields are skipped.
use std::io::{Read, Write};

use byteorder::ReadBytesExt;
use bytes::{Buf, BufMut, BytesMut};

use crate::error::{PackError, Result};
use crate::pack::DataPair;

// Protobuf wire types
const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

const NAME_KEY: u64 = (1 << 3) | WIRE_LEN;
const VALUE_KEY: u64 = (2 << 3) | WIRE_LEN;

// Guard against absurd length prefixes in corrupt streams
const MAX_RECORD: u64 = 16 * 1024 * 1024;

pub fn encode_varint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

pub fn decode_varint(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        if !buf.has_remaining() {
            return Err(PackError::RecordError("truncated varint"));
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;
        if shift >= 64 {
            return Err(PackError::RecordError("varint too long"));
        }
    }
}

// Same as decode_varint but pulls one byte at a time off a stream
fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = reader.read_u8()?;
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;
        if shift >= 64 {
            return Err(PackError::RecordError("varint too long"));
        }
    }
}

fn put_string(buf: &mut BytesMut, key: u64, s: &str) {
    encode_varint(buf, key);
    encode_varint(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

/// Appends the length prefixed record to `buf`.
pub fn encode(pair: &DataPair, buf: &mut BytesMut) {
    let mut body = BytesMut::new();
    put_string(&mut body, NAME_KEY, pair.name());
    if let Some(value) = pair.value() {
        put_string(&mut body, VALUE_KEY, value);
    }

    encode_varint(buf, body.len() as u64);
    buf.put(body);
}

fn take_string(body: &mut &[u8]) -> Result<String> {
    let len = decode_varint(body)?;
    if len > body.remaining() as u64 {
        return Err(PackError::RecordError("string runs past the record"));
    }
    let whole: &[u8] = *body;
    let (s, rest) = whole.split_at(len as usize);
    *body = rest;

    String::from_utf8(s.to_vec()).map_err(|_| PackError::RecordError("string is not utf-8"))
}

fn skip_field(body: &mut &[u8], wire: u64) -> Result<()> {
    let len = match wire {
        WIRE_VARINT => {
            decode_varint(body)?;
            return Ok(());
        },
        WIRE_FIXED64 => 8,
        WIRE_FIXED32 => 4,
        WIRE_LEN => decode_varint(body)?,
        _ => return Err(PackError::RecordError("unsupported wire type")),
    };

    if len > body.remaining() as u64 {
        return Err(PackError::RecordError("field runs past the record"));
    }
    body.advance(len as usize);
    Ok(())
}

pub fn decode(mut body: &[u8]) -> Result<DataPair> {
    let mut name = None;
    let mut value = None;

    while body.has_remaining() {
        match decode_varint(&mut body)? {
            NAME_KEY => name = Some(take_string(&mut body)?),
            VALUE_KEY => value = Some(take_string(&mut body)?),
            key => skip_field(&mut body, key & 0x07)?,
        }
    }

    let name = name.ok_or(PackError::RecordError("record has no name"))?;
    DataPair::new(name, value)
}

/// Writes one record, returns the bytes written.
pub fn write_pair<W: Write + ?Sized>(writer: &mut W, pair: &DataPair) -> Result<u64> {
    let mut buf = BytesMut::new();
    encode(pair, &mut buf);
    writer.write_all(&buf)?;
    Ok(buf.len() as u64)
}

pub fn read_pair<R: Read + ?Sized>(reader: &mut R) -> Result<DataPair> {
    let len = read_varint(reader)?;
    if len > MAX_RECORD {
        return Err(PackError::RecordError("record length exceeds limit"));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    decode(&body)
}

pub fn read_pairs<R: Read + ?Sized>(reader: &mut R, count: u16) -> Result<Vec<DataPair>> {
    (0..count).map(|_| read_pair(reader)).collect()
}
