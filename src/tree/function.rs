use crate::{
    back_to_enum,
    ber::{self, AsnReader, AsnWriter, RelativeOid, application, context},
    error::{Crumb, EmberResult, ErrorKind},
    site,
    tree::ContentParameter,
};
use serde::{Deserialize, Serialize};

pub const TUPLE_DESCRIPTION: u8 = application(21);

const ARGUMENTS_CONTEXT: u8 = context(2);
const RESULT_CONTEXT: u8 = context(3);
const TEMPLATE_REFERENCE_CONTEXT: u8 = context(4);

back_to_enum! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    #[default]
    Null = 0,
    Integer = 1,
    Real = 2,
    String = 3,
    Boolean = 4,
    Trigger = 5,
    Enum = 6,
    Octets = 7,
}}

/// One argument or result slot of a function signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleDescription {
    pub ptype: ParameterType,
    pub name: String,
}

impl TupleDescription {
    pub fn new(ptype: ParameterType, name: impl Into<String>) -> Self {
        TupleDescription {
            ptype,
            name: name.into(),
        }
    }

    pub fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(TUPLE_DESCRIPTION);
        writer.start_sequence(context(0));
        writer.write_int(self.ptype as i32);
        writer.end_sequence();
        writer.start_sequence(context(1));
        writer.write_string(&self.name);
        writer.end_sequence();
        writer.end_sequence();
    }

    pub fn decode(reader: &mut AsnReader) -> EmberResult<TupleDescription> {
        let mut ptype = ParameterType::Null;
        let mut name = String::new();
        let (_, mut tuple) = reader
            .read_sequence_start(TUPLE_DESCRIPTION)
            .crumb(site!())?;
        while tuple.len() > 0 {
            let peek = tuple.peek_tag().crumb(site!())?;
            let (_, mut ctx) = tuple.read_sequence_start(peek).crumb(site!())?;
            match peek {
                t if t == context(0) => {
                    ptype = ParameterType::try_from(ctx.read_int().crumb(site!())?)
                        .crumb(site!())?;
                }
                t if t == context(1) => {
                    name = ctx.read_string().crumb(site!())?;
                }
                t => {
                    return Err(ErrorKind::Deserialization(format!(
                        "unknown tuple description tag {t:#04x}"
                    ))
                    .into());
                }
            }
            ctx.read_sequence_end().crumb(site!())?;
            if tuple.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(TupleDescription { ptype, name })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionContents {
    identifier: ContentParameter,
    description: ContentParameter,
    arguments: Vec<TupleDescription>,
    result: Vec<TupleDescription>,
    template_reference: Option<RelativeOid>,
}

impl FunctionContents {
    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier.set_string(identifier);
    }

    pub fn identifier(&self) -> EmberResult<&str> {
        self.identifier.as_str()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description.set_string(description);
    }

    pub fn description(&self) -> EmberResult<&str> {
        self.description.as_str()
    }

    pub fn set_arguments(&mut self, arguments: Vec<TupleDescription>) {
        self.arguments = arguments;
    }

    pub fn arguments(&self) -> &[TupleDescription] {
        &self.arguments
    }

    pub fn set_result(&mut self, result: Vec<TupleDescription>) {
        self.result = result;
    }

    pub fn result(&self) -> &[TupleDescription] {
        &self.result
    }

    pub fn set_template_reference(&mut self, template_reference: RelativeOid) {
        self.template_reference = Some(template_reference);
    }

    pub fn template_reference(&self) -> Option<&RelativeOid> {
        self.template_reference.as_ref()
    }

    pub(crate) fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(ber::SET);
        self.identifier.encode(0, writer);
        self.description.encode(1, writer);
        if !self.arguments.is_empty() {
            encode_tuple_descriptions(ARGUMENTS_CONTEXT, &self.arguments, writer);
        }
        if !self.result.is_empty() {
            encode_tuple_descriptions(RESULT_CONTEXT, &self.result, writer);
        }
        if let Some(template_reference) = &self.template_reference {
            writer.start_sequence(TEMPLATE_REFERENCE_CONTEXT);
            writer.write_relative_oid(template_reference);
            writer.end_sequence();
        }
        writer.end_sequence();
    }

    pub(crate) fn decode(reader: &mut AsnReader) -> EmberResult<FunctionContents> {
        let mut contents = FunctionContents::default();
        let (_, mut set) = reader.read_sequence_start(ber::SET).crumb(site!())?;
        while set.len() > 0 {
            let peek = set.peek_tag().crumb(site!())?;
            match peek {
                t if t == context(0) => {
                    let value = ContentParameter::decode(&mut set, 0).crumb(site!())?;
                    contents.identifier.set(&value).crumb(site!())?;
                }
                t if t == context(1) => {
                    let value = ContentParameter::decode(&mut set, 1).crumb(site!())?;
                    contents.description.set(&value).crumb(site!())?;
                }
                t if t == ARGUMENTS_CONTEXT => {
                    contents.arguments =
                        decode_tuple_descriptions(&mut set, ARGUMENTS_CONTEXT).crumb(site!())?;
                }
                t if t == RESULT_CONTEXT => {
                    contents.result =
                        decode_tuple_descriptions(&mut set, RESULT_CONTEXT).crumb(site!())?;
                }
                t if t == TEMPLATE_REFERENCE_CONTEXT => {
                    let (_, mut template) = set.read_sequence_start(t).crumb(site!())?;
                    contents.template_reference =
                        Some(template.read_relative_oid().crumb(site!())?);
                    template.read_sequence_end().crumb(site!())?;
                }
                t => {
                    return Err(ErrorKind::Deserialization(format!(
                        "unknown function content tag {t:#04x}"
                    ))
                    .into());
                }
            }
            if set.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(contents)
    }

    pub(crate) fn merge_from(&mut self, incoming: &FunctionContents) -> EmberResult<()> {
        self.identifier.set(&incoming.identifier).crumb(site!())?;
        self.description.set(&incoming.description).crumb(site!())?;
        if !incoming.arguments.is_empty() {
            self.arguments = incoming.arguments.clone();
        }
        if !incoming.result.is_empty() {
            self.result = incoming.result.clone();
        }
        if incoming.template_reference.is_some() {
            self.template_reference = incoming.template_reference.clone();
        }
        Ok(())
    }
}

fn encode_tuple_descriptions(ctx: u8, tuples: &[TupleDescription], writer: &mut AsnWriter) {
    writer.start_sequence(ctx);
    writer.start_sequence(ber::SEQUENCE);
    for tuple in tuples {
        writer.start_sequence(context(0));
        tuple.encode(writer);
        writer.end_sequence();
    }
    writer.end_sequence();
    writer.end_sequence();
}

fn decode_tuple_descriptions(reader: &mut AsnReader, ctx: u8) -> EmberResult<Vec<TupleDescription>> {
    let mut tuples = Vec::new();
    let (_, mut list) = reader.read_sequence_start(ctx).crumb(site!())?;
    let (_, mut seq) = list.read_sequence_start(ber::SEQUENCE).crumb(site!())?;
    while seq.len() > 0 {
        let (_, mut entry) = seq.read_sequence_start(context(0)).crumb(site!())?;
        tuples.push(TupleDescription::decode(&mut entry).crumb(site!())?);
        entry.read_sequence_end().crumb(site!())?;
        if seq.check_sequence_end().crumb(site!())? {
            break;
        }
    }
    list.read_sequence_end().crumb(site!())?;
    Ok(tuples)
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn function_contents_roundtrip_works() {
        let mut contents = FunctionContents::default();
        contents.set_identifier("fader");
        contents.set_description("set a fader level");
        contents.set_arguments(vec![
            TupleDescription::new(ParameterType::Integer, "channel"),
            TupleDescription::new(ParameterType::Real, "level"),
        ]);
        contents.set_result(vec![TupleDescription::new(ParameterType::Boolean, "ok")]);
        contents.set_template_reference(RelativeOid::new(vec![3, 1]));

        let mut writer = AsnWriter::new();
        contents.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        let decoded = FunctionContents::decode(&mut reader).unwrap();
        assert_eq!(contents, decoded);
        assert_eq!(2, decoded.arguments().len());
        assert_eq!("level", decoded.arguments()[1].name);
        assert_eq!(ParameterType::Boolean, decoded.result()[0].ptype);
    }

    #[test]
    fn tuple_description_roundtrip_works() {
        let tuple = TupleDescription::new(ParameterType::Enum, "mode");
        let mut writer = AsnWriter::new();
        tuple.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(tuple, TupleDescription::decode(&mut reader).unwrap());
    }
}
