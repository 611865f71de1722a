use crate::{
    back_to_enum,
    ber::{self, AsnReader, AsnWriter, RelativeOid, application, context},
    error::{Crumb, EmberResult, ErrorKind},
    site,
};
use serde::{Deserialize, Serialize};

pub const CONNECTION: u8 = application(16);
pub const CONNECTIONS_CONTEXT: u8 = context(5);

back_to_enum! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionOperation {
    #[default]
    Absolute = 0,
    Connect = 1,
    Disconnect = 2,
}}

back_to_enum! {
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionDisposition {
    #[default]
    Tally = 0,
    Modified = 1,
    Pending = 2,
    Locked = 3,
}}

/// One crosspoint of a matrix: the sources routed to a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub target: i32,
    pub sources: RelativeOid,
    operation: ConnectionOperation,
    disposition: ConnectionDisposition,
}

impl Connection {
    pub fn new(target: i32) -> Self {
        Connection {
            target,
            ..Connection::default()
        }
    }

    pub fn operation(&self) -> ConnectionOperation {
        self.operation
    }

    pub fn set_operation(&mut self, operation: ConnectionOperation) {
        self.operation = operation;
    }

    pub fn disposition(&self) -> ConnectionDisposition {
        self.disposition
    }

    pub fn set_disposition(&mut self, disposition: ConnectionDisposition) {
        self.disposition = disposition;
    }

    pub fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(CONNECTION);

        writer.start_sequence(context(0));
        writer.write_int(self.target);
        writer.end_sequence();

        if !self.sources.is_empty() {
            writer.start_sequence(context(1));
            writer.write_relative_oid(&self.sources);
            writer.end_sequence();
        }

        writer.start_sequence(context(2));
        writer.write_int(self.operation as i32);
        writer.end_sequence();

        writer.start_sequence(context(3));
        writer.write_int(self.disposition as i32);
        writer.end_sequence();

        writer.end_sequence();
    }

    pub fn decode(reader: &mut AsnReader) -> EmberResult<Connection> {
        let mut connection = Connection::default();
        let (_, mut conn) = reader.read_sequence_start(CONNECTION).crumb(site!())?;

        let (_, mut target) = conn.read_sequence_start(context(0)).crumb(site!())?;
        connection.target = target.read_int().crumb(site!())?;
        target.read_sequence_end().crumb(site!())?;

        while conn.len() > 0 {
            let tag = conn.peek_tag().crumb(site!())?;
            let (_, mut ctx) = conn.read_sequence_start(tag).crumb(site!())?;
            match tag {
                t if t == context(1) => {
                    connection.sources = ctx.read_relative_oid().crumb(site!())?;
                }
                t if t == context(2) => {
                    connection.operation =
                        ConnectionOperation::try_from(ctx.read_int().crumb(site!())?)
                            .crumb(site!())?;
                }
                t if t == context(3) => {
                    connection.disposition =
                        ConnectionDisposition::try_from(ctx.read_int().crumb(site!())?)
                            .crumb(site!())?;
                }
                t => {
                    return Err(ErrorKind::Deserialization(format!(
                        "unknown connection tag {t:#04x}"
                    ))
                    .into());
                }
            }
            ctx.read_sequence_end().crumb(site!())?;
            if conn.check_sequence_end().crumb(site!())? {
                break;
            }
        }
        Ok(connection)
    }
}

pub(crate) fn encode_connections(writer: &mut AsnWriter, connections: &[Connection]) {
    writer.start_sequence(CONNECTIONS_CONTEXT);
    writer.start_sequence(ber::SEQUENCE);
    for connection in connections {
        writer.start_sequence(context(0));
        connection.encode(writer);
        writer.end_sequence();
    }
    writer.end_sequence();
    writer.end_sequence();
}

pub(crate) fn decode_connections(reader: &mut AsnReader) -> EmberResult<Vec<Connection>> {
    let mut connections = Vec::new();
    let (_, mut list) = reader
        .read_sequence_start(CONNECTIONS_CONTEXT)
        .crumb(site!())?;
    let (_, mut seq) = list.read_sequence_start(ber::SEQUENCE).crumb(site!())?;
    while seq.len() > 0 {
        let (_, mut entry) = seq.read_sequence_start(context(0)).crumb(site!())?;
        connections.push(Connection::decode(&mut entry).crumb(site!())?);
        entry.read_sequence_end().crumb(site!())?;
        if seq.check_sequence_end().crumb(site!())? {
            break;
        }
    }
    list.read_sequence_end().crumb(site!())?;
    Ok(connections)
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn connection_roundtrip_works() {
        let mut connection = Connection::new(4);
        connection.sources = RelativeOid::new(vec![1, 7]);
        connection.set_operation(ConnectionOperation::Connect);
        connection.set_disposition(ConnectionDisposition::Modified);

        let mut writer = AsnWriter::new();
        connection.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        assert_eq!(connection, Connection::decode(&mut reader).unwrap());
    }

    #[test]
    fn unknown_operation_value_is_rejected() {
        assert!(ConnectionOperation::try_from(3).is_err());
        assert!(ConnectionDisposition::try_from(4).is_err());
        assert_eq!(
            ConnectionOperation::Disconnect,
            ConnectionOperation::try_from(2).unwrap()
        );
    }

    #[test]
    fn empty_sources_are_omitted_from_the_wire() {
        let connection = Connection::new(1);
        let mut writer = AsnWriter::new();
        connection.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = AsnReader::new(&bytes);
        let decoded = Connection::decode(&mut reader).unwrap();
        assert!(decoded.sources.is_empty());
        assert_eq!(ConnectionOperation::Absolute, decoded.operation());
        assert_eq!(ConnectionDisposition::Tally, decoded.disposition());
    }
}
