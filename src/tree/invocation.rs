use crate::{
    ber::{self, AsnReader, AsnWriter, application, context},
    error::{Crumb, EmberResult, ErrorKind},
    site,
    tree::ContentParameter,
};
use serde::{Deserialize, Serialize};

pub const INVOCATION: u8 = application(22);

/// Call of a provider-side function, carried as a command option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub invocation_id: i32,
    pub arguments: Vec<ContentParameter>,
}

impl Invocation {
    pub fn new(invocation_id: i32, arguments: Vec<ContentParameter>) -> Self {
        Invocation {
            invocation_id,
            arguments,
        }
    }

    pub fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(INVOCATION);

        writer.start_sequence(context(0));
        writer.write_int(self.invocation_id);
        writer.end_sequence();

        if !self.arguments.is_empty() {
            writer.start_sequence(context(1));
            writer.start_sequence(ber::SEQUENCE);
            for argument in &self.arguments {
                argument.encode(0, writer);
            }
            writer.end_sequence();
            writer.end_sequence();
        }

        writer.end_sequence();
    }

    pub fn decode(reader: &mut AsnReader) -> EmberResult<Invocation> {
        let mut invocation = Invocation::default();
        let (_, mut inv) = reader.read_sequence_start(INVOCATION).crumb(site!())?;
        while inv.len() > 0 {
            let tag = inv.peek_tag().crumb(site!())?;
            match tag {
                t if t == context(0) => {
                    let (_, mut ctx) = inv.read_sequence_start(t).crumb(site!())?;
                    invocation.invocation_id = ctx.read_int().crumb(site!())?;
                    ctx.read_sequence_end().crumb(site!())?;
                }
                t if t == context(1) => {
                    let (_, mut ctx) = inv.read_sequence_start(t).crumb(site!())?;
                    let (_, mut seq) = ctx.read_sequence_start(ber::SEQUENCE).crumb(site!())?;
                    while seq.len() > 0 {
                        invocation
                            .arguments
                            .push(ContentParameter::decode(&mut seq, 0).crumb(site!())?);
                        if seq.check_sequence_end().crumb(site!())? {
                            break;
                        }
                    }
                    ctx.read_sequence_end().crumb(site!())?;
                }
                t => {
                    return Err(ErrorKind::Deserialization(format!(
                        "unknown invocation tag {t:#04x}"
                    ))
                    .into());
                }
            }
            if inv.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(invocation)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn invocation_roundtrip_works() {
        let invocation = Invocation::new(
            7,
            vec![
                ContentParameter::Integer(1),
                ContentParameter::String("gain".to_owned()),
            ],
        );
        let mut writer = AsnWriter::new();
        invocation.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(invocation, Invocation::decode(&mut reader).unwrap());
    }

    #[test]
    fn invocation_without_arguments_roundtrips() {
        let invocation = Invocation::new(3, Vec::new());
        let mut writer = AsnWriter::new();
        invocation.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(invocation, Invocation::decode(&mut reader).unwrap());
    }
}
