use crate::{
    ber::{AsnReader, context},
    error::{Crumb, EmberResult, ErrorKind},
    site,
    tree::{
        CommandContents, Contents, ELEMENT_COLLECTION, Element, ElementTag, FunctionContents,
        Invocation, MatrixContents, NodeContents, ParameterContents, connection, signal,
    },
};

/// Decodes a single element (and its nested children) off the wire.
pub fn decode_element(reader: &mut AsnReader) -> EmberResult<Element> {
    let tag_byte = reader.peek_tag().crumb(site!())?;
    let tag = ElementTag::from_wire(tag_byte).crumb(site!())?;
    let (_, mut element_reader) = reader.read_sequence_start(tag_byte).crumb(site!())?;

    let (_, mut ctx0) = element_reader
        .read_sequence_start(context(0))
        .crumb(site!())?;
    let mut element = if tag.is_qualified() {
        Element::decoded_qualified(tag, ctx0.read_relative_oid().crumb(site!())?)
    } else {
        Element::new(tag, ctx0.read_int().crumb(site!())?)
    };
    ctx0.read_sequence_end().crumb(site!())?;

    while element_reader.len() > 0 {
        let peek = element_reader.peek_tag().crumb(site!())?;
        match peek {
            t if t == context(1) => {
                let contents = decode_contents(tag, &mut element_reader).crumb(site!())?;
                element.set_contents(contents);
            }
            t if t == context(2) => {
                if tag == ElementTag::Command {
                    decode_invocation_option(&mut element, &mut element_reader)
                        .crumb(site!())?;
                } else {
                    decode_children(&mut element, &mut element_reader).crumb(site!())?;
                }
            }
            t if t == signal::TARGETS_CONTEXT => {
                let targets = signal::decode_targets(&mut element_reader).crumb(site!())?;
                element.set_targets(targets).crumb(site!())?;
            }
            t if t == signal::SOURCES_CONTEXT => {
                let sources = signal::decode_sources(&mut element_reader).crumb(site!())?;
                element.set_sources(sources).crumb(site!())?;
            }
            t if t == connection::CONNECTIONS_CONTEXT => {
                let connections =
                    connection::decode_connections(&mut element_reader).crumb(site!())?;
                element.set_connections(connections).crumb(site!())?;
            }
            t => {
                return Err(ErrorKind::Deserialization(format!(
                    "unknown element part {t:#04x} at offset {}",
                    element_reader.top_offset()
                ))
                .into());
            }
        }
        if element_reader.check_sequence_end().crumb(site!())? {
            break;
        }
    }
    Ok(element)
}

fn decode_contents(tag: ElementTag, reader: &mut AsnReader) -> EmberResult<Contents> {
    let (_, mut content_reader) = reader.read_sequence_start(context(1)).crumb(site!())?;
    let contents = match tag {
        ElementTag::Node | ElementTag::QualifiedNode => {
            Contents::Node(NodeContents::decode(&mut content_reader).crumb(site!())?)
        }
        ElementTag::Parameter | ElementTag::QualifiedParameter => {
            Contents::Parameter(ParameterContents::decode(&mut content_reader).crumb(site!())?)
        }
        ElementTag::Matrix | ElementTag::QualifiedMatrix => {
            Contents::Matrix(MatrixContents::decode(&mut content_reader).crumb(site!())?)
        }
        ElementTag::Function | ElementTag::QualifiedFunction => {
            Contents::Function(FunctionContents::decode(&mut content_reader).crumb(site!())?)
        }
        ElementTag::Command => {
            Contents::Command(CommandContents::decode(&mut content_reader).crumb(site!())?)
        }
    };
    content_reader.read_sequence_end().crumb(site!())?;
    Ok(contents)
}

fn decode_invocation_option(element: &mut Element, reader: &mut AsnReader) -> EmberResult<()> {
    let (_, mut ctx) = reader.read_sequence_start(context(2)).crumb(site!())?;
    let invocation = Invocation::decode(&mut ctx).crumb(site!())?;
    ctx.read_sequence_end().crumb(site!())?;
    if let Some(command) = element.contents_mut().as_command_mut() {
        command.invocation = Some(invocation);
    }
    Ok(())
}

fn decode_children(element: &mut Element, reader: &mut AsnReader) -> EmberResult<()> {
    let (_, mut ctx) = reader.read_sequence_start(context(2)).crumb(site!())?;
    let (_, mut collection) = ctx
        .read_sequence_start(ELEMENT_COLLECTION)
        .crumb(site!())?;
    while collection.len() > 0 {
        let (_, mut child_reader) = collection.read_sequence_start(context(0)).crumb(site!())?;
        let child = decode_element(&mut child_reader).crumb(site!())?;
        child_reader.read_sequence_end().crumb(site!())?;
        element.add_child(child);
        if collection.check_sequence_end().crumb(site!())? {
            break;
        }
    }
    ctx.read_sequence_end().crumb(site!())?;
    Ok(())
}
