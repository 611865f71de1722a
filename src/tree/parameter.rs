use crate::{
    ber::{self, AsnReader, AsnWriter, RelativeOid, context},
    error::{Crumb, EmberResult},
    site,
    tree::{ContentParameter, function::ParameterType},
};

const IDENTIFIER: usize = 0;
const DESCRIPTION: usize = 1;
const VALUE: usize = 2;
const MINIMUM: usize = 3;
const MAXIMUM: usize = 4;
const ACCESS: usize = 5;
const FORMAT: usize = 6;
const ENUMERATION: usize = 7;
const FACTOR: usize = 8;
const IS_ONLINE: usize = 9;
const FORMULA: usize = 10;
const STEP: usize = 11;
const DEFAULT: usize = 12;
const TYPE: usize = 13;
const STREAM_IDENTIFIER: usize = 14;
const ENUM_MAP: usize = 15;
const STREAM_DESCRIPTOR: usize = 16;
const SCHEMA_IDENTIFIERS: usize = 17;
const PARAMETER_CONTENT_SIZE: usize = 18;

const TEMPLATE_REFERENCE_CONTEXT: u8 = context(18);

/// The 18 context-indexed value slots of a parameter, plus the template
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterContents {
    table: [ContentParameter; PARAMETER_CONTENT_SIZE],
    template_reference: Option<RelativeOid>,
}

impl Default for ParameterContents {
    fn default() -> Self {
        ParameterContents {
            table: std::array::from_fn(|_| ContentParameter::Unset),
            template_reference: None,
        }
    }
}

impl ParameterContents {
    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.table[IDENTIFIER].set_string(identifier);
    }

    pub fn identifier(&self) -> EmberResult<&str> {
        self.table[IDENTIFIER].as_str()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.table[DESCRIPTION].set_string(description);
    }

    pub fn description(&self) -> EmberResult<&str> {
        self.table[DESCRIPTION].as_str()
    }

    pub fn value(&self) -> &ContentParameter {
        &self.table[VALUE]
    }

    pub fn value_mut(&mut self) -> &mut ContentParameter {
        &mut self.table[VALUE]
    }

    pub fn minimum(&self) -> &ContentParameter {
        &self.table[MINIMUM]
    }

    pub fn minimum_mut(&mut self) -> &mut ContentParameter {
        &mut self.table[MINIMUM]
    }

    pub fn maximum(&self) -> &ContentParameter {
        &self.table[MAXIMUM]
    }

    pub fn maximum_mut(&mut self) -> &mut ContentParameter {
        &mut self.table[MAXIMUM]
    }

    pub fn default_value(&self) -> &ContentParameter {
        &self.table[DEFAULT]
    }

    pub fn default_value_mut(&mut self) -> &mut ContentParameter {
        &mut self.table[DEFAULT]
    }

    pub fn set_access(&mut self, access: impl Into<String>) {
        self.table[ACCESS].set_string(access);
    }

    pub fn access(&self) -> EmberResult<&str> {
        self.table[ACCESS].as_str()
    }

    pub fn set_format(&mut self, format: impl Into<String>) {
        self.table[FORMAT].set_string(format);
    }

    pub fn format(&self) -> EmberResult<&str> {
        self.table[FORMAT].as_str()
    }

    pub fn set_enumeration(&mut self, enumeration: impl Into<String>) {
        self.table[ENUMERATION].set_string(enumeration);
    }

    pub fn enumeration(&self) -> EmberResult<&str> {
        self.table[ENUMERATION].as_str()
    }

    pub fn set_factor(&mut self, factor: i64) {
        self.table[FACTOR].set_int(factor);
    }

    pub fn factor(&self) -> EmberResult<i64> {
        self.table[FACTOR].as_int()
    }

    pub fn set_online(&mut self, online: bool) {
        self.table[IS_ONLINE].set_bool(online);
    }

    pub fn is_online(&self) -> EmberResult<bool> {
        self.table[IS_ONLINE].as_bool()
    }

    pub fn set_formula(&mut self, formula: impl Into<String>) {
        self.table[FORMULA].set_string(formula);
    }

    pub fn formula(&self) -> EmberResult<&str> {
        self.table[FORMULA].as_str()
    }

    pub fn set_step(&mut self, step: i64) {
        self.table[STEP].set_int(step);
    }

    pub fn step(&self) -> EmberResult<i64> {
        self.table[STEP].as_int()
    }

    pub fn set_parameter_type(&mut self, ptype: ParameterType) {
        self.table[TYPE].set_int(ptype as i64);
    }

    pub fn parameter_type(&self) -> EmberResult<ParameterType> {
        ParameterType::try_from(self.table[TYPE].as_int().crumb(site!())? as i32)
    }

    pub fn set_stream_identifier(&mut self, stream_identifier: i64) {
        self.table[STREAM_IDENTIFIER].set_int(stream_identifier);
    }

    pub fn stream_identifier(&self) -> EmberResult<i64> {
        self.table[STREAM_IDENTIFIER].as_int()
    }

    pub fn enum_map(&self) -> &ContentParameter {
        &self.table[ENUM_MAP]
    }

    pub fn enum_map_mut(&mut self) -> &mut ContentParameter {
        &mut self.table[ENUM_MAP]
    }

    pub fn stream_descriptor(&self) -> &ContentParameter {
        &self.table[STREAM_DESCRIPTOR]
    }

    pub fn stream_descriptor_mut(&mut self) -> &mut ContentParameter {
        &mut self.table[STREAM_DESCRIPTOR]
    }

    pub fn set_schema_identifiers(&mut self, schema_identifiers: impl Into<String>) {
        self.table[SCHEMA_IDENTIFIERS].set_string(schema_identifiers);
    }

    pub fn schema_identifiers(&self) -> EmberResult<&str> {
        self.table[SCHEMA_IDENTIFIERS].as_str()
    }

    pub fn set_template_reference(&mut self, template_reference: RelativeOid) {
        self.template_reference = Some(template_reference);
    }

    pub fn template_reference(&self) -> Option<&RelativeOid> {
        self.template_reference.as_ref()
    }

    pub(crate) fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(ber::SET);
        for (i, slot) in self.table.iter().enumerate() {
            slot.encode(i as u8, writer);
        }
        if let Some(template_reference) = &self.template_reference {
            writer.start_sequence(TEMPLATE_REFERENCE_CONTEXT);
            writer.write_relative_oid(template_reference);
            writer.end_sequence();
        }
        writer.end_sequence();
    }

    pub(crate) fn decode(reader: &mut AsnReader) -> EmberResult<ParameterContents> {
        let mut contents = ParameterContents::default();
        let (_, mut set) = reader.read_sequence_start(ber::SET).crumb(site!())?;
        while set.len() > 0 {
            let peek = set.peek_tag().crumb(site!())?;
            let index = peek.wrapping_sub(context(0)) as usize;
            if index < PARAMETER_CONTENT_SIZE {
                let value = ContentParameter::decode(&mut set, index as u8).crumb(site!())?;
                contents.table[index].set(&value).crumb(site!())?;
            } else if peek == TEMPLATE_REFERENCE_CONTEXT {
                let (_, mut template) = set.read_sequence_start(peek).crumb(site!())?;
                contents.template_reference = Some(template.read_relative_oid().crumb(site!())?);
                template.read_sequence_end().crumb(site!())?;
            } else {
                // unknown context tag, decode and discard
                ContentParameter::decode(&mut set, peek.wrapping_sub(context(0)))
                    .crumb(site!())?;
            }
            if set.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(contents)
    }

    pub(crate) fn merge_from(&mut self, incoming: &ParameterContents) -> EmberResult<()> {
        for (slot, value) in self.table.iter_mut().zip(incoming.table.iter()) {
            slot.set(value).crumb(site!())?;
        }
        if incoming.template_reference.is_some() {
            self.template_reference = incoming.template_reference.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn parameter_contents_roundtrip_works() {
        let mut contents = ParameterContents::default();
        contents.set_identifier("gain");
        contents.set_description("input gain");
        contents.value_mut().set_real(-6.5);
        contents.minimum_mut().set_real(-128.0);
        contents.maximum_mut().set_real(15.0);
        contents.set_access("readWrite");
        contents.set_factor(10);
        contents.set_online(true);
        contents.set_step(1);
        contents.set_parameter_type(ParameterType::Real);
        contents.set_stream_identifier(4);
        contents.set_schema_identifiers("de.l-s-b.emberplus.gain");
        contents.set_template_reference(RelativeOid::new(vec![7, 7]));

        let mut writer = AsnWriter::new();
        contents.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        let decoded = ParameterContents::decode(&mut reader).unwrap();
        assert_eq!(contents, decoded);
        assert_eq!(-6.5, decoded.value().as_real().unwrap());
        assert_eq!(ParameterType::Real, decoded.parameter_type().unwrap());
        assert_eq!(
            Some(&RelativeOid::new(vec![7, 7])),
            decoded.template_reference()
        );
    }

    #[test]
    fn merge_enforces_slot_types() {
        let mut current = ParameterContents::default();
        current.value_mut().set_int(1);

        let mut incoming = ParameterContents::default();
        incoming.value_mut().set_string("one");
        assert!(current.merge_from(&incoming).is_err());

        let mut incoming = ParameterContents::default();
        incoming.value_mut().set_int(2);
        current.merge_from(&incoming).unwrap();
        assert_eq!(2, current.value().as_int().unwrap());
    }
}
