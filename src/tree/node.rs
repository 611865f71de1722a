use crate::{
    ber::{self, AsnReader, AsnWriter, RelativeOid, context},
    error::{Crumb, EmberResult},
    site,
    tree::ContentParameter,
};

const TEMPLATE_REFERENCE_CONTEXT: u8 = context(5);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeContents {
    identifier: ContentParameter,
    description: ContentParameter,
    is_online: ContentParameter,
    is_root: ContentParameter,
    schema_identifiers: ContentParameter,
    template_reference: Option<RelativeOid>,
}

impl NodeContents {
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

    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root.set_bool(is_root);
    }

    pub fn is_root(&self) -> EmberResult<bool> {
        self.is_root.as_bool()
    }

    pub fn set_is_online(&mut self, is_online: bool) {
        self.is_online.set_bool(is_online);
    }

    pub fn is_online(&self) -> EmberResult<bool> {
        self.is_online.as_bool()
    }

    pub fn set_schema_identifiers(&mut self, schema_identifiers: impl Into<String>) {
        self.schema_identifiers.set_string(schema_identifiers);
    }

    pub fn schema_identifiers(&self) -> EmberResult<&str> {
        self.schema_identifiers.as_str()
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
        self.is_online.encode(2, writer);
        self.is_root.encode(3, writer);
        self.schema_identifiers.encode(4, writer);
        if let Some(template_reference) = &self.template_reference {
            writer.start_sequence(TEMPLATE_REFERENCE_CONTEXT);
            writer.write_relative_oid(template_reference);
            writer.end_sequence();
        }
        writer.end_sequence();
    }

    pub(crate) fn decode(reader: &mut AsnReader) -> EmberResult<NodeContents> {
        let mut contents = NodeContents::default();
        let (_, mut set) = reader.read_sequence_start(ber::SET).crumb(site!())?;
        while set.len() > 0 {
            let peek = set.peek_tag().crumb(site!())?;
            if peek == TEMPLATE_REFERENCE_CONTEXT {
                let (_, mut template) = set.read_sequence_start(peek).crumb(site!())?;
                contents.template_reference = Some(template.read_relative_oid().crumb(site!())?);
                template.read_sequence_end().crumb(site!())?;
            } else {
                let index = peek.wrapping_sub(context(0));
                let value = ContentParameter::decode(&mut set, index).crumb(site!())?;
                match index {
                    0 => contents.identifier.set(&value).crumb(site!())?,
                    1 => contents.description.set(&value).crumb(site!())?,
                    2 => contents.is_online.set(&value).crumb(site!())?,
                    3 => contents.is_root.set(&value).crumb(site!())?,
                    4 => contents.schema_identifiers.set(&value).crumb(site!())?,
                    _ => {} // tolerated, the value is discarded
                }
            }
            if set.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(contents)
    }

    pub(crate) fn merge_from(&mut self, incoming: &NodeContents) -> EmberResult<()> {
        self.identifier.set(&incoming.identifier).crumb(site!())?;
        self.description.set(&incoming.description).crumb(site!())?;
        self.is_online.set(&incoming.is_online).crumb(site!())?;
        self.is_root.set(&incoming.is_root).crumb(site!())?;
        self.schema_identifiers
            .set(&incoming.schema_identifiers)
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
    fn node_contents_roundtrip_works() {
        let mut contents = NodeContents::default();
        contents.set_identifier("gdnet");
        contents.set_description("an example node");
        contents.set_is_root(true);
        contents.set_is_online(false);
        contents.set_template_reference(RelativeOid::new(vec![9, 1]));

        let mut writer = AsnWriter::new();
        contents.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        let decoded = NodeContents::decode(&mut reader).unwrap();
        assert_eq!(contents, decoded);
        assert_eq!("gdnet", decoded.identifier().unwrap());
        assert!(decoded.is_root().unwrap());
        assert!(!decoded.is_online().unwrap());
    }

    #[test]
    fn merge_rejects_type_changes() {
        let mut current = NodeContents::default();
        current.set_identifier("gdnet");

        let mut incoming = NodeContents::default();
        incoming.identifier.set_int(5);
        assert!(current.merge_from(&incoming).is_err());
    }

    #[test]
    fn merge_keeps_fields_the_incoming_side_left_unset() {
        let mut current = NodeContents::default();
        current.set_identifier("gdnet");
        current.set_is_online(true);

        let mut incoming = NodeContents::default();
        incoming.set_is_online(false);
        current.merge_from(&incoming).unwrap();
        assert_eq!("gdnet", current.identifier().unwrap());
        assert!(!current.is_online().unwrap());
    }
}
