use crate::{
    back_to_enum,
    ber::{AsnReader, AsnWriter},
    error::{Crumb, EmberResult},
    site,
    tree::Invocation,
};
use serde::{Deserialize, Serialize};

pub const COMMAND_SUBSCRIBE: i32 = 30;
pub const COMMAND_UNSUBSCRIBE: i32 = 31;
pub const COMMAND_GET_DIRECTORY: i32 = 32;
pub const COMMAND_INVOKE: i32 = 33;

back_to_enum! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldFlags {
    Sparse = -2,
    All = -1,
    #[default]
    Default = 0,
    Identifier = 1,
    Description = 2,
    Tree = 3,
    Value = 4,
    Connections = 5,
}}

/// Contents of a Command element: the directory field mask, plus the
/// invocation payload for Invoke commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandContents {
    field_flags: i32,
    pub invocation: Option<Invocation>,
}

impl Default for CommandContents {
    fn default() -> Self {
        CommandContents {
            field_flags: FieldFlags::Default as i32,
            invocation: None,
        }
    }
}

impl CommandContents {
    pub fn field_flags(&self) -> i32 {
        self.field_flags
    }

    pub fn set_field_flags(&mut self, flags: FieldFlags) {
        self.field_flags = flags as i32;
    }

    pub(crate) fn encode(&self, writer: &mut AsnWriter) {
        writer.write_int(self.field_flags);
    }

    pub(crate) fn decode(reader: &mut AsnReader) -> EmberResult<CommandContents> {
        Ok(CommandContents {
            field_flags: reader.read_int().crumb(site!())?,
            invocation: None,
        })
    }

    pub(crate) fn merge_from(&mut self, incoming: &CommandContents) {
        self.field_flags = incoming.field_flags;
        if incoming.invocation.is_some() {
            self.invocation = incoming.invocation.clone();
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn field_flags_convert_from_wire_integers() {
        assert_eq!(FieldFlags::All, FieldFlags::try_from(-1).unwrap());
        assert_eq!(FieldFlags::Sparse, FieldFlags::try_from(-2).unwrap());
        assert_eq!(FieldFlags::Connections, FieldFlags::try_from(5).unwrap());
        assert!(FieldFlags::try_from(6).is_err());
    }

    #[test]
    fn contents_encode_as_a_bare_integer() {
        let mut contents = CommandContents::default();
        contents.set_field_flags(FieldFlags::All);
        let mut writer = AsnWriter::new();
        contents.encode(&mut writer);
        assert_eq!(&[0x02, 0x01, 0xFF], writer.as_slice());

        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        let decoded = CommandContents::decode(&mut reader).unwrap();
        assert_eq!(-1, decoded.field_flags());
    }
}
