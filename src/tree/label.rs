use crate::{
    ber::{self, AsnReader, AsnWriter, RelativeOid, application, context},
    error::{Crumb, EmberResult},
    site,
};
use serde::{Deserialize, Serialize};

pub const LABEL: u8 = application(18);
pub const LABELS_CONTEXT: u8 = context(10);

/// Matrix label: where a group of signal labels lives, and what it is for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub base_path: RelativeOid,
    pub description: String,
}

impl Label {
    pub fn new(base_path: RelativeOid, description: impl Into<String>) -> Self {
        Label {
            base_path,
            description: description.into(),
        }
    }

    pub fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(LABEL);
        writer.start_sequence(context(0));
        writer.write_relative_oid(&self.base_path);
        writer.end_sequence();
        writer.start_sequence(context(1));
        writer.write_string(&self.description);
        writer.end_sequence();
        writer.end_sequence();
    }

    pub fn decode(reader: &mut AsnReader) -> EmberResult<Label> {
        let (_, mut label) = reader.read_sequence_start(LABEL).crumb(site!())?;

        let (_, mut ctx) = label.read_sequence_start(context(0)).crumb(site!())?;
        let base_path = ctx.read_relative_oid().crumb(site!())?;
        ctx.read_sequence_end().crumb(site!())?;

        let (_, mut ctx) = label.read_sequence_start(context(1)).crumb(site!())?;
        let description = ctx.read_string().crumb(site!())?;
        ctx.read_sequence_end().crumb(site!())?;

        label.read_sequence_end().crumb(site!())?;
        Ok(Label {
            base_path,
            description,
        })
    }
}

pub(crate) fn encode_labels(writer: &mut AsnWriter, labels: &[Label]) {
    writer.start_sequence(LABELS_CONTEXT);
    writer.start_sequence(ber::SEQUENCE);
    for label in labels {
        writer.start_sequence(context(0));
        label.encode(writer);
        writer.end_sequence();
    }
    writer.end_sequence();
    writer.end_sequence();
}

pub(crate) fn decode_labels(reader: &mut AsnReader) -> EmberResult<Vec<Label>> {
    let mut labels = Vec::new();
    let (_, mut list) = reader.read_sequence_start(LABELS_CONTEXT).crumb(site!())?;
    let (_, mut seq) = list.read_sequence_start(ber::SEQUENCE).crumb(site!())?;
    while seq.len() > 0 {
        let (_, mut entry) = seq.read_sequence_start(context(0)).crumb(site!())?;
        labels.push(Label::decode(&mut entry).crumb(site!())?);
        entry.read_sequence_end().crumb(site!())?;
        if seq.check_sequence_end().crumb(site!())? {
            break;
        }
    }
    list.read_sequence_end().crumb(site!())?;
    Ok(labels)
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn label_roundtrip_works() {
        let label = Label::new(RelativeOid::new(vec![1, 2]), "primary");
        let mut writer = AsnWriter::new();
        label.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(label, Label::decode(&mut reader).unwrap());
    }

    #[test]
    fn label_list_roundtrip_works() {
        let labels = vec![
            Label::new(RelativeOid::new(vec![1, 2]), "primary"),
            Label::new(RelativeOid::new(vec![1, 3]), "backup"),
        ];
        let mut writer = AsnWriter::new();
        encode_labels(&mut writer, &labels);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(labels, decode_labels(&mut reader).unwrap());
    }
}
