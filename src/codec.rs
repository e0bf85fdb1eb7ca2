// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Canonical Binary Codec
//!
//! Length-prefixed primitives shared by the client, the oracle, the relay and
//! the on-chain verifier. Action IDs are hashes over this encoding, so field
//! order, widths and prefixes are wire format.
//!
//! | Primitive | Encoding |
//! |-----------|----------|
//! | `int64`   | 8-byte big-endian signed integer |
//! | `bytes`   | `int64` length ∥ raw bytes |
//! | `string`  | UTF-8 bytes framed as `bytes` |
//! | `list<T>` | `int64` count ∥ concatenated `T` encodings |
//!
//! Decoding is strict: reading past the end of the buffer, negative lengths
//! and invalid UTF-8 are errors, and [`Decode::decode`] rejects trailing
//! bytes.

use crate::error::{ProtocolError, ProtocolResult};

/// Values with a canonical binary encoding.
pub trait Encode {
    fn encode_to(&self, writer: &mut Writer);

    fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.encode_to(&mut writer);
        writer.into_bytes()
    }
}

/// Values that can be read back from their canonical encoding.
pub trait Decode: Sized {
    fn decode_from(reader: &mut Reader<'_>) -> ProtocolResult<Self>;

    /// Decode a complete buffer. Trailing bytes are an error.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.i64(value.len() as i64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn list<T: Encode>(&mut self, items: &[T]) -> &mut Self {
        self.i64(items.len() as i64);
        for item in items {
            item.encode_to(self);
        }
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Strict cursor over a borrowed buffer.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, len: usize) -> ProtocolResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(ProtocolError::malformed(format!(
                "read of {len} bytes at offset {} exceeds buffer of {} bytes",
                self.offset,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn i64(&mut self) -> ProtocolResult<i64> {
        let raw: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| ProtocolError::malformed("int64 slice"))?;
        Ok(i64::from_be_bytes(raw))
    }

    fn length(&mut self, what: &str) -> ProtocolResult<usize> {
        let value = self.i64()?;
        usize::try_from(value)
            .map_err(|_| ProtocolError::malformed(format!("negative {what}: {value}")))
    }

    pub fn bytes(&mut self) -> ProtocolResult<Vec<u8>> {
        let len = self.length("length")?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn string(&mut self) -> ProtocolResult<String> {
        let raw = self.bytes()?;
        String::from_utf8(raw).map_err(|e| ProtocolError::malformed(format!("invalid UTF-8: {e}")))
    }

    pub fn list<T>(
        &mut self,
        mut read_item: impl FnMut(&mut Self) -> ProtocolResult<T>,
    ) -> ProtocolResult<Vec<T>> {
        let count = self.length("count")?;
        // Every element occupies at least one byte.
        if count > self.remaining() {
            return Err(ProtocolError::malformed(format!(
                "list of {count} items cannot fit in {} remaining bytes",
                self.remaining()
            )));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read_item(self)?);
        }
        Ok(items)
    }

    pub fn decode<T: Decode>(&mut self) -> ProtocolResult<T> {
        T::decode_from(self)
    }

    /// Fail if any bytes are left unread.
    pub fn finish(&self) -> ProtocolResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::malformed(format!("{n} trailing bytes"))),
        }
    }
}
