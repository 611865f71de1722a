use crate::{
    ber::{self, AsnReader, AsnWriter, Length, RelativeOid},
    error::{Crumb, EmberResult, ErrorKind},
    site,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One value slot of an element's contents.
///
/// Once a slot holds a non-[`Unset`](ContentParameter::Unset) variant, the
/// merge layer rejects assignments of a different variant as a type
/// mismatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ContentParameter {
    #[default]
    Unset,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Octets(Vec<u8>),
    RelativeOid(RelativeOid),
}

impl ContentParameter {
    pub fn type_name(&self) -> &'static str {
        match self {
            ContentParameter::Unset => "unset",
            ContentParameter::Boolean(_) => "bool",
            ContentParameter::Integer(_) => "integer",
            ContentParameter::Real(_) => "real",
            ContentParameter::String(_) => "string",
            ContentParameter::Octets(_) => "buffer",
            ContentParameter::RelativeOid(_) => "oid",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, ContentParameter::Unset)
    }

    /// Merge-layer assignment: an unset incoming value is a no-op, a set
    /// incoming value must match the variant already held.
    pub fn set(&mut self, incoming: &ContentParameter) -> EmberResult<()> {
        if !incoming.is_set() {
            return Ok(());
        }
        if self.is_set() && std::mem::discriminant(self) != std::mem::discriminant(incoming) {
            return Err(ErrorKind::ValueTypeMismatch {
                expected: self.type_name(),
                found: incoming.type_name(),
            }
            .into());
        }
        *self = incoming.clone();
        Ok(())
    }

    pub fn set_bool(&mut self, value: bool) {
        *self = ContentParameter::Boolean(value);
    }

    pub fn set_int(&mut self, value: i64) {
        *self = ContentParameter::Integer(value);
    }

    pub fn set_real(&mut self, value: f64) {
        *self = ContentParameter::Real(value);
    }

    pub fn set_string(&mut self, value: impl Into<String>) {
        *self = ContentParameter::String(value.into());
    }

    pub fn set_octets(&mut self, value: Vec<u8>) {
        *self = ContentParameter::Octets(value);
    }

    pub fn set_relative_oid(&mut self, value: RelativeOid) {
        *self = ContentParameter::RelativeOid(value);
    }

    pub fn as_bool(&self) -> EmberResult<bool> {
        match self {
            ContentParameter::Boolean(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn as_int(&self) -> EmberResult<i64> {
        match self {
            ContentParameter::Integer(i) => Ok(*i),
            other => Err(mismatch("integer", other)),
        }
    }

    pub fn as_real(&self) -> EmberResult<f64> {
        match self {
            ContentParameter::Real(r) => Ok(*r),
            other => Err(mismatch("real", other)),
        }
    }

    pub fn as_str(&self) -> EmberResult<&str> {
        match self {
            ContentParameter::String(s) => Ok(s),
            other => Err(mismatch("string", other)),
        }
    }

    pub fn as_octets(&self) -> EmberResult<&[u8]> {
        match self {
            ContentParameter::Octets(b) => Ok(b),
            other => Err(mismatch("buffer", other)),
        }
    }

    pub fn as_relative_oid(&self) -> EmberResult<&RelativeOid> {
        match self {
            ContentParameter::RelativeOid(oid) => Ok(oid),
            other => Err(mismatch("oid", other)),
        }
    }

    /// Writes `Context(ctx) { value }`; unset slots write nothing.
    pub fn encode(&self, ctx: u8, writer: &mut AsnWriter) {
        if !self.is_set() {
            return;
        }
        writer.start_sequence(ber::context(ctx));
        match self {
            ContentParameter::Unset => {}
            ContentParameter::Boolean(b) => writer.write_boolean(*b),
            ContentParameter::Integer(i) => writer.write_int64(*i),
            ContentParameter::Real(r) => writer.write_real(*r),
            ContentParameter::String(s) => writer.write_string(s),
            ContentParameter::Octets(b) => writer.write_octets(b, ber::BITSTRING),
            ContentParameter::RelativeOid(oid) => writer.write_relative_oid(oid),
        }
        writer.end_sequence();
    }

    /// Reads `Context(ctx) { value }`, dispatching on the value's tag.
    pub fn decode(reader: &mut AsnReader, ctx: u8) -> EmberResult<ContentParameter> {
        let (length, mut sub) = reader
            .read_sequence_start(ber::context(ctx))
            .crumb(site!())?;
        if length == Length::Definite(0) {
            return Ok(ContentParameter::Unset);
        }
        let tag = sub.peek_tag().crumb(site!())?;
        let value = match tag {
            ber::BOOLEAN => ContentParameter::Boolean(sub.read_boolean().crumb(site!())?),
            ber::INTEGER => ContentParameter::Integer(sub.read_int64().crumb(site!())?),
            ber::REAL => ContentParameter::Real(sub.read_real().crumb(site!())?),
            ber::BITSTRING | ber::OCTETSTRING => {
                ContentParameter::Octets(sub.read_octets(tag).crumb(site!())?)
            }
            ber::UTF8STRING => ContentParameter::String(sub.read_string().crumb(site!())?),
            ber::RELATIVE_OID => {
                ContentParameter::RelativeOid(sub.read_relative_oid().crumb(site!())?)
            }
            other => {
                return Err(ErrorKind::Deserialization(format!(
                    "unknown value type {other:#04x} at offset {}",
                    sub.top_offset()
                ))
                .into());
            }
        };
        sub.read_sequence_end().crumb(site!())?;
        Ok(value)
    }
}

fn mismatch(expected: &'static str, found: &ContentParameter) -> crate::error::EmberError {
    ErrorKind::ValueTypeMismatch {
        expected,
        found: found.type_name(),
    }
    .into()
}

impl fmt::Display for ContentParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentParameter::Unset => Ok(()),
            ContentParameter::Boolean(b) => write!(f, "{b}"),
            ContentParameter::Integer(i) => write!(f, "{i}"),
            ContentParameter::Real(r) => write!(f, "{r}"),
            ContentParameter::String(s) => write!(f, "{s}"),
            ContentParameter::Octets(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            ContentParameter::RelativeOid(oid) => write!(f, "{oid}"),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn typed_getters_reject_other_variants() {
        let mut value = ContentParameter::Unset;
        value.set_bool(true);
        assert!(value.as_bool().unwrap());
        assert!(value.as_str().is_err());
        assert!(value.as_octets().is_err());
        assert!(value.as_int().is_err());

        let mut value = ContentParameter::Unset;
        value.set_string("gdnet");
        assert_eq!("gdnet", value.as_str().unwrap());
        assert!(value.as_bool().is_err());

        let mut value = ContentParameter::Unset;
        value.set_int(77);
        assert_eq!(77, value.as_int().unwrap());
        assert!(value.as_str().is_err());
    }

    #[test]
    fn set_enforces_type_identity() {
        let mut slot = ContentParameter::Unset;
        slot.set(&ContentParameter::String("a".to_owned())).unwrap();
        slot.set(&ContentParameter::String("b".to_owned())).unwrap();
        assert_eq!("b", slot.as_str().unwrap());

        let err = slot.set(&ContentParameter::Integer(1)).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::ValueTypeMismatch {
                expected: "string",
                found: "integer"
            }
        ));

        // unset incoming values leave the slot alone
        slot.set(&ContentParameter::Unset).unwrap();
        assert_eq!("b", slot.as_str().unwrap());
    }

    #[test]
    fn encode_decode_roundtrip_works() {
        let values = [
            ContentParameter::Boolean(true),
            ContentParameter::Integer(-42),
            ContentParameter::Real(123.456),
            ContentParameter::String("gdnet".to_owned()),
            ContentParameter::Octets(vec![1, 2, 3, 4, 5, 6, 7, 8]),
            ContentParameter::RelativeOid(RelativeOid::new(vec![1, 2, 3])),
        ];
        for value in values {
            let mut writer = AsnWriter::new();
            value.encode(1, &mut writer);
            let bytes = writer.into_bytes();
            let mut reader = AsnReader::new(&bytes);
            let decoded = ContentParameter::decode(&mut reader, 1).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn unset_slots_encode_nothing() {
        let mut writer = AsnWriter::new();
        ContentParameter::Unset.encode(0, &mut writer);
        assert!(writer.is_empty());
    }

    #[test]
    fn display_formats_values() {
        assert_eq!("true", ContentParameter::Boolean(true).to_string());
        assert_eq!("77", ContentParameter::Integer(77).to_string());
        assert_eq!("1.2.3", ContentParameter::RelativeOid(RelativeOid::new(vec![1, 2, 3])).to_string());
        assert_eq!("0aff", ContentParameter::Octets(vec![0x0A, 0xFF]).to_string());
    }
}
