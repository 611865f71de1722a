use crate::{
    ber::{self, AsnReader, AsnWriter, application, context},
    error::{Crumb, EmberResult},
    site,
};
use serde::{Deserialize, Serialize};

pub const TARGET: u8 = application(14);
pub const SOURCE: u8 = application(15);
pub const TARGETS_CONTEXT: u8 = context(3);
pub const SOURCES_CONTEXT: u8 = context(4);

/// Crosspoint row of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target(pub i32);

/// Crosspoint column of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source(pub i32);

fn encode_signal(writer: &mut AsnWriter, number: i32, tag: u8) {
    writer.start_sequence(tag);
    writer.start_sequence(context(0));
    writer.write_int(number);
    writer.end_sequence();
    writer.end_sequence();
}

fn decode_signal_number(reader: &mut AsnReader, tag: u8) -> EmberResult<i32> {
    let (_, mut signal) = reader.read_sequence_start(tag).crumb(site!())?;
    let (_, mut ctx) = signal.read_sequence_start(context(0)).crumb(site!())?;
    let number = ctx.read_int().crumb(site!())?;
    ctx.read_sequence_end().crumb(site!())?;
    signal.read_sequence_end().crumb(site!())?;
    Ok(number)
}

fn encode_signals(writer: &mut AsnWriter, list_ctx: u8, tag: u8, numbers: &[i32]) {
    writer.start_sequence(list_ctx);
    writer.start_sequence(ber::SEQUENCE);
    for &number in numbers {
        writer.start_sequence(context(0));
        encode_signal(writer, number, tag);
        writer.end_sequence();
    }
    writer.end_sequence();
    writer.end_sequence();
}

fn decode_signals(reader: &mut AsnReader, list_ctx: u8, tag: u8) -> EmberResult<Vec<i32>> {
    let mut numbers = Vec::new();
    let (_, mut list) = reader.read_sequence_start(list_ctx).crumb(site!())?;
    let (_, mut seq) = list.read_sequence_start(ber::SEQUENCE).crumb(site!())?;
    while seq.len() > 0 {
        let (_, mut entry) = seq.read_sequence_start(context(0)).crumb(site!())?;
        numbers.push(decode_signal_number(&mut entry, tag).crumb(site!())?);
        entry.read_sequence_end().crumb(site!())?;
        if seq.check_sequence_end().crumb(site!())? {
            break;
        }
    }
    list.read_sequence_end().crumb(site!())?;
    Ok(numbers)
}

pub(crate) fn encode_targets(writer: &mut AsnWriter, targets: &[Target]) {
    let numbers: Vec<i32> = targets.iter().map(|t| t.0).collect();
    encode_signals(writer, TARGETS_CONTEXT, TARGET, &numbers);
}

pub(crate) fn encode_sources(writer: &mut AsnWriter, sources: &[Source]) {
    let numbers: Vec<i32> = sources.iter().map(|s| s.0).collect();
    encode_signals(writer, SOURCES_CONTEXT, SOURCE, &numbers);
}

pub(crate) fn decode_targets(reader: &mut AsnReader) -> EmberResult<Vec<Target>> {
    Ok(decode_signals(reader, TARGETS_CONTEXT, TARGET)
        .crumb(site!())?
        .into_iter()
        .map(Target)
        .collect())
}

pub(crate) fn decode_sources(reader: &mut AsnReader) -> EmberResult<Vec<Source>> {
    Ok(decode_signals(reader, SOURCES_CONTEXT, SOURCE)
        .crumb(site!())?
        .into_iter()
        .map(Source)
        .collect())
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn targets_roundtrip() {
        let targets = vec![Target(1), Target(2), Target(3)];
        let mut writer = AsnWriter::new();
        encode_targets(&mut writer, &targets);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(targets, decode_targets(&mut reader).unwrap());
    }

    #[test]
    fn sources_decode_from_definite_form() {
        // Context(4) { SEQUENCE { Context(0) { Source { Context(0) { 1 } } } } }
        let bytes = [
            164, 20, 48, 18, 160, 7, 111, 5, 160, 3, 2, 1, 1, 160, 7, 111, 5, 160, 3, 2, 1, 2,
        ];
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(
            vec![Source(1), Source(2)],
            decode_sources(&mut reader).unwrap()
        );
    }
}
