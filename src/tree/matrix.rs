use crate::{
    back_to_enum,
    ber::{self, AsnReader, AsnWriter, RelativeOid, context},
    error::{Crumb, EmberResult},
    site,
    tree::{
        ContentParameter, Label,
        label::{self, LABELS_CONTEXT},
    },
};
use serde::{Deserialize, Serialize};

const IDENTIFIER: usize = 0;
const DESCRIPTION: usize = 1;
const MATRIX_TYPE: usize = 2;
const MATRIX_MODE: usize = 3;
const TARGET_COUNT: usize = 4;
const SOURCE_COUNT: usize = 5;
const MAXIMUM_TOTAL_CONNECTS: usize = 6;
const MAXIMUM_CONNECTS_PER_TARGET: usize = 7;
const PARAMETERS_LOCATION: usize = 8;
const GAIN_PARAMETER_NUMBER: usize = 9;
const MATRIX_CONTENT_SIZE: usize = 10;

const SCHEMA_IDENTIFIER_INDEX: usize = 11;
const TEMPLATE_REFERENCE_CONTEXT: u8 = context(12);

back_to_enum! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixType {
    #[default]
    OneToN = 0,
    OneToOne = 1,
    NToN = 2,
}}

back_to_enum! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixMode {
    #[default]
    Linear = 0,
    NonLinear = 1,
}}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixContents {
    table: [ContentParameter; MATRIX_CONTENT_SIZE],
    labels: Vec<Label>,
    schema_identifier: ContentParameter,
    template_reference: Option<RelativeOid>,
}

impl Default for MatrixContents {
    fn default() -> Self {
        MatrixContents::new(MatrixType::OneToN, MatrixMode::Linear)
    }
}

impl MatrixContents {
    pub fn new(mtype: MatrixType, mode: MatrixMode) -> Self {
        let mut contents = MatrixContents {
            table: std::array::from_fn(|_| ContentParameter::Unset),
            labels: Vec::new(),
            schema_identifier: ContentParameter::Unset,
            template_reference: None,
        };
        contents.set_matrix_type(mtype);
        contents.set_matrix_mode(mode);
        contents
    }

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

    pub fn set_matrix_type(&mut self, mtype: MatrixType) {
        self.table[MATRIX_TYPE].set_int(mtype as i64);
    }

    pub fn matrix_type(&self) -> EmberResult<MatrixType> {
        MatrixType::try_from(self.table[MATRIX_TYPE].as_int().crumb(site!())? as i32)
    }

    pub fn set_matrix_mode(&mut self, mode: MatrixMode) {
        self.table[MATRIX_MODE].set_int(mode as i64);
    }

    pub fn matrix_mode(&self) -> EmberResult<MatrixMode> {
        MatrixMode::try_from(self.table[MATRIX_MODE].as_int().crumb(site!())? as i32)
    }

    pub fn set_target_count(&mut self, count: i32) {
        self.table[TARGET_COUNT].set_int(count as i64);
    }

    pub fn target_count(&self) -> EmberResult<i32> {
        Ok(self.table[TARGET_COUNT].as_int().crumb(site!())? as i32)
    }

    pub fn set_source_count(&mut self, count: i32) {
        self.table[SOURCE_COUNT].set_int(count as i64);
    }

    pub fn source_count(&self) -> EmberResult<i32> {
        Ok(self.table[SOURCE_COUNT].as_int().crumb(site!())? as i32)
    }

    pub fn set_maximum_total_connects(&mut self, count: i32) {
        self.table[MAXIMUM_TOTAL_CONNECTS].set_int(count as i64);
    }

    pub fn maximum_total_connects(&self) -> EmberResult<i32> {
        Ok(self.table[MAXIMUM_TOTAL_CONNECTS].as_int().crumb(site!())? as i32)
    }

    pub fn set_maximum_connects_per_target(&mut self, count: i32) {
        self.table[MAXIMUM_CONNECTS_PER_TARGET].set_int(count as i64);
    }

    pub fn maximum_connects_per_target(&self) -> EmberResult<i32> {
        Ok(self.table[MAXIMUM_CONNECTS_PER_TARGET]
            .as_int()
            .crumb(site!())? as i32)
    }

    pub fn set_parameters_location(&mut self, location: RelativeOid) {
        self.table[PARAMETERS_LOCATION].set_relative_oid(location);
    }

    pub fn parameters_location(&self) -> EmberResult<&RelativeOid> {
        self.table[PARAMETERS_LOCATION].as_relative_oid()
    }

    pub fn set_gain_parameter_number(&mut self, number: i32) {
        self.table[GAIN_PARAMETER_NUMBER].set_int(number as i64);
    }

    pub fn gain_parameter_number(&self) -> EmberResult<i32> {
        Ok(self.table[GAIN_PARAMETER_NUMBER].as_int().crumb(site!())? as i32)
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn set_labels(&mut self, labels: Vec<Label>) {
        self.labels = labels;
    }

    pub fn add_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn set_schema_identifier(&mut self, schema: impl Into<String>) {
        self.schema_identifier.set_string(schema);
    }

    pub fn schema_identifier(&self) -> EmberResult<&str> {
        self.schema_identifier.as_str()
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
        if !self.labels.is_empty() {
            label::encode_labels(writer, &self.labels);
        }
        self.schema_identifier
            .encode(SCHEMA_IDENTIFIER_INDEX as u8, writer);
        if let Some(template_reference) = &self.template_reference {
            writer.start_sequence(TEMPLATE_REFERENCE_CONTEXT);
            writer.write_relative_oid(template_reference);
            writer.end_sequence();
        }
        writer.end_sequence();
    }

    pub(crate) fn decode(reader: &mut AsnReader) -> EmberResult<MatrixContents> {
        let mut contents = MatrixContents {
            table: std::array::from_fn(|_| ContentParameter::Unset),
            labels: Vec::new(),
            schema_identifier: ContentParameter::Unset,
            template_reference: None,
        };
        let (_, mut set) = reader.read_sequence_start(ber::SET).crumb(site!())?;
        while set.len() > 0 {
            let peek = set.peek_tag().crumb(site!())?;
            let index = peek.wrapping_sub(context(0)) as usize;
            if index < MATRIX_CONTENT_SIZE {
                let value = ContentParameter::decode(&mut set, index as u8).crumb(site!())?;
                contents.table[index].set(&value).crumb(site!())?;
            } else if peek == LABELS_CONTEXT {
                contents.labels = label::decode_labels(&mut set).crumb(site!())?;
            } else if index == SCHEMA_IDENTIFIER_INDEX {
                let value = ContentParameter::decode(&mut set, index as u8).crumb(site!())?;
                contents.schema_identifier.set(&value).crumb(site!())?;
            } else if peek == TEMPLATE_REFERENCE_CONTEXT {
                let (_, mut template) = set.read_sequence_start(peek).crumb(site!())?;
                contents.template_reference = Some(template.read_relative_oid().crumb(site!())?);
                template.read_sequence_end().crumb(site!())?;
            } else {
                ContentParameter::decode(&mut set, peek.wrapping_sub(context(0)))
                    .crumb(site!())?;
            }
            if set.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(contents)
    }

    pub(crate) fn merge_from(&mut self, incoming: &MatrixContents) -> EmberResult<()> {
        for (slot, value) in self.table.iter_mut().zip(incoming.table.iter()) {
            slot.set(value).crumb(site!())?;
        }
        if !incoming.labels.is_empty() {
            self.labels = incoming.labels.clone();
        }
        self.schema_identifier
            .set(&incoming.schema_identifier)
            .crumb(site!())?;
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
    fn matrix_contents_roundtrip_works() {
        let mut contents = MatrixContents::new(MatrixType::NToN, MatrixMode::NonLinear);
        contents.set_identifier("router");
        contents.set_target_count(16);
        contents.set_source_count(8);
        contents.set_maximum_total_connects(64);
        contents.set_maximum_connects_per_target(4);
        contents.set_parameters_location(RelativeOid::new(vec![1, 5]));
        contents.set_gain_parameter_number(2);
        contents.add_label(Label::new(RelativeOid::new(vec![1, 6]), "primary"));
        contents.set_schema_identifier("de.l-s-b.emberplus.matrix");

        let mut writer = AsnWriter::new();
        contents.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        let decoded = MatrixContents::decode(&mut reader).unwrap();
        assert_eq!(contents, decoded);
        assert_eq!(MatrixType::NToN, decoded.matrix_type().unwrap());
        assert_eq!(MatrixMode::NonLinear, decoded.matrix_mode().unwrap());
        assert_eq!(16, decoded.target_count().unwrap());
        assert_eq!(1, decoded.labels().len());
    }

    #[test]
    fn matrix_enum_values_validate() {
        assert!(MatrixType::try_from(3).is_err());
        assert!(MatrixMode::try_from(2).is_err());
        assert_eq!(MatrixType::OneToOne, MatrixType::try_from(1).unwrap());
    }
}
