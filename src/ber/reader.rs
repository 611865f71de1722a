use crate::{
    ber::{BOOLEAN, INTEGER, REAL, RELATIVE_OID, RelativeOid, UTF8STRING},
    error::{Crumb, EmberResult, ErrorKind},
    site,
};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(usize),
    Indefinite,
}

/// Cursor over a TLV buffer.
///
/// Sub-readers created for definite-length values carry the absolute offset
/// of their first byte so errors anywhere in a nested decode still report a
/// position in the original message.
#[derive(Debug)]
pub struct AsnReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

/// View returned by [`AsnReader::read_sequence_start`].
///
/// A definite-length sequence yields a bounded view and the outer reader
/// advances past it immediately; an indefinite-length sequence yields an
/// alias of the outer reader, which therefore must not be used until the
/// view is dropped. Both dereference to [`AsnReader`].
#[derive(Debug)]
pub enum SeqReader<'p, 'a> {
    Bounded(AsnReader<'a>),
    Open(&'p mut AsnReader<'a>),
}

impl<'a> Deref for SeqReader<'_, 'a> {
    type Target = AsnReader<'a>;

    fn deref(&self) -> &AsnReader<'a> {
        match self {
            SeqReader::Bounded(reader) => reader,
            SeqReader::Open(reader) => reader,
        }
    }
}

impl<'a> DerefMut for SeqReader<'_, 'a> {
    fn deref_mut(&mut self) -> &mut AsnReader<'a> {
        match self {
            SeqReader::Bounded(reader) => reader,
            SeqReader::Open(reader) => reader,
        }
    }
}

impl<'a> AsnReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        AsnReader {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Remaining bytes in this view.
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes consumed from this view.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Absolute offset in the outermost buffer.
    pub fn top_offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn read_byte(&mut self) -> EmberResult<u8> {
        if self.pos >= self.data.len() {
            return Err(ErrorKind::ReaderEof {
                offset: self.top_offset(),
            }
            .into());
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn peek_tag(&self) -> EmberResult<u8> {
        if self.pos >= self.data.len() {
            return Err(ErrorKind::ReaderEof {
                offset: self.top_offset(),
            }
            .into());
        }
        Ok(self.data[self.pos])
    }

    /// Bounded view over the next `len` bytes; this reader advances past it.
    pub fn sub_reader(&mut self, len: usize) -> EmberResult<AsnReader<'a>> {
        if len > self.len() {
            return Err(ErrorKind::LengthOverflow {
                offset: self.top_offset(),
                len,
            }
            .into());
        }
        let base = self.top_offset();
        let start = self.pos;
        self.pos += len;
        Ok(AsnReader {
            data: &self.data[start..start + len],
            pos: 0,
            base,
        })
    }

    pub fn read_length(&mut self) -> EmberResult<Length> {
        let offset = self.top_offset();
        let b = self.read_byte().crumb(site!())?;
        if b & 0x80 == 0 {
            return Ok(Length::Definite(b as usize));
        }
        let count = (b & 0x7F) as usize;
        if count == 0 {
            return Ok(Length::Indefinite);
        }
        if count > 4 {
            return Err(ErrorKind::LengthOverflow { offset, len: count }.into());
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) + self.read_byte().crumb(site!())? as usize;
        }
        Ok(Length::Definite(len))
    }

    pub fn read_sequence_start<'p>(
        &'p mut self,
        expected: u8,
    ) -> EmberResult<(Length, SeqReader<'p, 'a>)> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != expected {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected,
                found: tag,
            }
            .into());
        }
        let length = self.read_length().crumb(site!())?;
        match length {
            Length::Definite(len) => {
                let sub = self.sub_reader(len).crumb(site!())?;
                Ok((length, SeqReader::Bounded(sub)))
            }
            Length::Indefinite => Ok((length, SeqReader::Open(self))),
        }
    }

    /// Non-consuming unless positioned at the end: an exhausted view or an
    /// `00 00` terminator (which is consumed) both count as the end.
    pub fn check_sequence_end(&mut self) -> EmberResult<bool> {
        if self.len() == 0 {
            return Ok(true);
        }
        if self.data[self.pos] != 0 {
            return Ok(false);
        }
        if self.len() < 2 {
            return Err(ErrorKind::ReaderEof {
                offset: self.top_offset() + 1,
            }
            .into());
        }
        if self.data[self.pos + 1] != 0 {
            return Ok(false);
        }
        self.pos += 2;
        Ok(true)
    }

    pub fn read_sequence_end(&mut self) -> EmberResult<()> {
        if self.check_sequence_end().crumb(site!())? {
            Ok(())
        } else {
            Err(ErrorKind::Deserialization(format!(
                "sequence end not found at offset {} with {} bytes left",
                self.top_offset(),
                self.len()
            ))
            .into())
        }
    }

    pub fn read_boolean(&mut self) -> EmberResult<bool> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != BOOLEAN {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected: BOOLEAN,
                found: tag,
            }
            .into());
        }
        match self.read_length().crumb(site!())? {
            Length::Definite(1) => Ok(self.read_byte().crumb(site!())? != 0),
            _ => Err(ErrorKind::Deserialization(format!(
                "invalid boolean length at offset {offset}"
            ))
            .into()),
        }
    }

    pub fn read_int(&mut self) -> EmberResult<i32> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != INTEGER {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected: INTEGER,
                found: tag,
            }
            .into());
        }
        let len = self.read_definite_length(offset).crumb(site!())?;
        if len > 4 {
            return Err(ErrorKind::LengthOverflow { offset, len }.into());
        }
        if len == 0 {
            return Ok(0);
        }
        let mut b = self.read_byte().crumb(site!())?;
        let mut val: i32 = if b & 0x80 != 0 { -1 } else { 0 };
        let mut remaining = len;
        loop {
            remaining -= 1;
            val = (val << 8) | b as i32;
            if remaining == 0 {
                break;
            }
            b = self.read_byte().crumb(site!())?;
        }
        Ok(val)
    }

    pub fn read_int64(&mut self) -> EmberResult<i64> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != INTEGER {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected: INTEGER,
                found: tag,
            }
            .into());
        }
        let len = self.read_definite_length(offset).crumb(site!())?;
        if len > 8 {
            return Err(ErrorKind::LengthOverflow { offset, len }.into());
        }
        if len == 0 {
            return Ok(0);
        }
        let mut b = self.read_byte().crumb(site!())?;
        let mut val: i64 = if b & 0x80 != 0 { -1 } else { 0 };
        let mut remaining = len;
        loop {
            remaining -= 1;
            val = (val << 8) | b as i64;
            if remaining == 0 {
                break;
            }
            b = self.read_byte().crumb(site!())?;
        }
        Ok(val)
    }

    pub fn read_string(&mut self) -> EmberResult<String> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != UTF8STRING {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected: UTF8STRING,
                found: tag,
            }
            .into());
        }
        let buf = self.read_value_buffer().crumb(site!())?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn read_octets(&mut self, expected: u8) -> EmberResult<Vec<u8>> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != expected {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected,
                found: tag,
            }
            .into());
        }
        self.read_value_buffer().crumb(site!())
    }

    pub fn read_relative_oid(&mut self) -> EmberResult<RelativeOid> {
        let buf = self.read_octets(RELATIVE_OID).crumb(site!())?;
        let mut oid = Vec::new();
        let mut value: u32 = 0;
        for b in buf {
            value = (value << 7) | (b & 0x7F) as u32;
            if b & 0x80 == 0 {
                oid.push(value);
                value = 0;
            }
        }
        Ok(RelativeOid(oid))
    }

    pub fn read_real(&mut self) -> EmberResult<f64> {
        let offset = self.top_offset();
        let tag = self.read_byte().crumb(site!())?;
        if tag != REAL {
            return Err(ErrorKind::TagMismatch {
                offset,
                expected: REAL,
                found: tag,
            }
            .into());
        }
        let buf = self.read_value_buffer().crumb(site!())?;
        if buf.is_empty() {
            return Ok(0.0);
        }

        let preamble = buf[0];
        if buf.len() == 1 {
            return match preamble {
                0x40 => Ok(f64::INFINITY),
                0x41 => Ok(f64::NEG_INFINITY),
                0x42 => Ok(f64::NAN),
                _ => Err(ErrorKind::InvalidPreamble { offset, preamble }.into()),
            };
        }

        let negative = preamble & 0x40 != 0;
        let exponent_length = 1 + (preamble & 3) as usize;
        let significand_shift = ((preamble >> 2) & 3) as u32;

        let mut pos = 1;
        if buf.len() - pos < exponent_length {
            return Err(ErrorKind::Deserialization(format!(
                "real at offset {offset} too short for its exponent"
            ))
            .into());
        }
        let mut exponent: i32 = if buf[pos] & 0x80 != 0 { -1 } else { 0 };
        for _ in 0..exponent_length {
            exponent = (exponent << 8) | buf[pos] as i32;
            pos += 1;
        }

        let mut significand: u64 = 0;
        while pos < buf.len() {
            significand = (significand << 8) | buf[pos] as u64;
            pos += 1;
        }
        significand <<= significand_shift;
        if significand == 0 {
            return Ok(0.0);
        }
        while significand & 0x7FFF_F000_0000_0000 == 0 {
            significand <<= 8;
        }
        while significand & 0x7FF0_0000_0000_0000 == 0 {
            significand <<= 1;
        }
        significand &= 0x000F_FFFF_FFFF_FFFF;

        let mut bits = (((exponent as i64 + 1023) as u64) << 52) | significand;
        if negative {
            bits |= 0x8000_0000_0000_0000;
        }
        Ok(f64::from_bits(bits))
    }

    fn read_definite_length(&mut self, offset: usize) -> EmberResult<usize> {
        match self.read_length().crumb(site!())? {
            Length::Definite(len) => Ok(len),
            Length::Indefinite => Err(ErrorKind::Deserialization(format!(
                "indefinite length primitive at offset {offset}"
            ))
            .into()),
        }
    }

    /// Value bytes after the tag: definite length or indefinite up to `00 00`.
    fn read_value_buffer(&mut self) -> EmberResult<Vec<u8>> {
        match self.read_length().crumb(site!())? {
            Length::Definite(len) => {
                if len > self.len() {
                    return Err(ErrorKind::LengthOverflow {
                        offset: self.top_offset(),
                        len,
                    }
                    .into());
                }
                let start = self.pos;
                self.pos += len;
                Ok(self.data[start..start + len].to_vec())
            }
            Length::Indefinite => {
                let mut buf = Vec::new();
                loop {
                    if self.check_sequence_end().crumb(site!())? {
                        break;
                    }
                    buf.push(self.read_byte().crumb(site!())?);
                }
                Ok(buf)
            }
        }
    }
}
