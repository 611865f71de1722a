use crate::{
    ber::{AsnWriter, RelativeOid, context},
    error::{Crumb, EmberResult, ErrorKind},
    site,
    tree::{
        CommandContents, Connection, ELEMENT_COLLECTION, ElementTag, FunctionContents,
        MatrixContents, NodeContents, ParameterContents, Source, Target,
        command::{COMMAND_GET_DIRECTORY, FieldFlags},
        connection, signal,
    },
};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Observer of one element, fired after a merge touched it.
pub type ElementListener = Arc<dyn Fn(&Element) + Send + Sync + 'static>;

/// Identity handle for listener removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Identity-handled registry of listeners; shared by elements and the root.
pub(crate) struct Listeners<T> {
    entries: Vec<(u64, T)>,
    next: u64,
}

impl<T> Listeners<T> {
    pub(crate) fn add(&mut self, listener: T) -> ListenerHandle {
        let id = self.next;
        self.next += 1;
        self.entries.push((id, listener));
        ListenerHandle(id)
    }

    pub(crate) fn remove(&mut self, handle: ListenerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(id, _)| *id != handle.0);
        before != self.entries.len()
    }

    pub(crate) fn contains(&self, handle: ListenerHandle) -> bool {
        self.entries.iter().any(|(id, _)| *id == handle.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, listener)| listener)
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Listeners {
            entries: Vec::new(),
            next: 0,
        }
    }
}

impl<T: Clone> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Listeners {
            entries: self.entries.clone(),
            next: self.next,
        }
    }
}

impl<T> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.entries.len())
    }
}

/// Kind-specific contents of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Contents {
    Node(NodeContents),
    Parameter(ParameterContents),
    Matrix(MatrixContents),
    Function(FunctionContents),
    Command(CommandContents),
}

impl Contents {
    pub(crate) fn default_for(tag: ElementTag) -> Contents {
        match tag {
            ElementTag::Node | ElementTag::QualifiedNode => Contents::Node(NodeContents::default()),
            ElementTag::Parameter | ElementTag::QualifiedParameter => {
                Contents::Parameter(ParameterContents::default())
            }
            ElementTag::Matrix | ElementTag::QualifiedMatrix => {
                Contents::Matrix(MatrixContents::default())
            }
            ElementTag::Function | ElementTag::QualifiedFunction => {
                Contents::Function(FunctionContents::default())
            }
            ElementTag::Command => Contents::Command(CommandContents::default()),
        }
    }

    pub fn as_node(&self) -> Option<&NodeContents> {
        match self {
            Contents::Node(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeContents> {
        match self {
            Contents::Node(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterContents> {
        match self {
            Contents::Parameter(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_parameter_mut(&mut self) -> Option<&mut ParameterContents> {
        match self {
            Contents::Parameter(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&MatrixContents> {
        match self {
            Contents::Matrix(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_matrix_mut(&mut self) -> Option<&mut MatrixContents> {
        match self {
            Contents::Matrix(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionContents> {
        match self {
            Contents::Function(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionContents> {
        match self {
            Contents::Function(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_command(&self) -> Option<&CommandContents> {
        match self {
            Contents::Command(contents) => Some(contents),
            _ => None,
        }
    }

    pub fn as_command_mut(&mut self) -> Option<&mut CommandContents> {
        match self {
            Contents::Command(contents) => Some(contents),
            _ => None,
        }
    }

    fn encode(&self, writer: &mut AsnWriter) {
        match self {
            Contents::Node(contents) => contents.encode(writer),
            Contents::Parameter(contents) => contents.encode(writer),
            Contents::Matrix(contents) => contents.encode(writer),
            Contents::Function(contents) => contents.encode(writer),
            Contents::Command(contents) => contents.encode(writer),
        }
    }

    fn merge_from(&mut self, incoming: &Contents) -> EmberResult<()> {
        match (self, incoming) {
            (Contents::Node(current), Contents::Node(incoming)) => {
                current.merge_from(incoming).crumb(site!())
            }
            (Contents::Parameter(current), Contents::Parameter(incoming)) => {
                current.merge_from(incoming).crumb(site!())
            }
            (Contents::Matrix(current), Contents::Matrix(incoming)) => {
                current.merge_from(incoming).crumb(site!())
            }
            (Contents::Function(current), Contents::Function(incoming)) => {
                current.merge_from(incoming).crumb(site!())
            }
            (Contents::Command(current), Contents::Command(incoming)) => {
                current.merge_from(incoming);
                Ok(())
            }
            _ => Err(ErrorKind::MergeIdentity("content kind mismatch".to_owned()).into()),
        }
    }
}

/// One node of the Ember+ tree.
///
/// Unqualified elements are identified by their number relative to the
/// parent; qualified elements carry their full path. Children are owned by
/// their parent, so paths of unqualified elements fall out of the traversal
/// that reaches them.
#[derive(Clone)]
pub struct Element {
    number: i32,
    tag: ElementTag,
    path: Option<RelativeOid>,
    contents: Option<Contents>,
    children: BTreeMap<i32, Element>,
    pub(crate) listeners: Listeners<ElementListener>,
    targets: Vec<Target>,
    sources: Vec<Source>,
    connections: Vec<Connection>,
}

impl Element {
    pub fn new(tag: ElementTag, number: i32) -> Self {
        Element {
            number,
            tag,
            path: None,
            contents: None,
            children: BTreeMap::new(),
            listeners: Listeners::default(),
            targets: Vec::new(),
            sources: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn new_qualified(tag: ElementTag, path: RelativeOid) -> EmberResult<Self> {
        if path.is_empty() {
            return Err(ErrorKind::MergeDetached {
                path: path.to_string(),
            }
            .into());
        }
        Ok(Element::decoded_qualified(tag, path))
    }

    /// Qualified element as it comes off the wire; an empty path is allowed
    /// here and rejected by the merge instead.
    pub(crate) fn decoded_qualified(tag: ElementTag, path: RelativeOid) -> Self {
        let mut element = Element::new(tag, path.last().map(|n| n as i32).unwrap_or(0));
        element.path = Some(path);
        element
    }

    pub fn new_node(number: i32) -> Self {
        Element::new(ElementTag::Node, number)
    }

    pub fn new_parameter(number: i32) -> Self {
        Element::new(ElementTag::Parameter, number)
    }

    pub fn new_matrix(number: i32, contents: MatrixContents) -> Self {
        let mut element = Element::new(ElementTag::Matrix, number);
        element.contents = Some(Contents::Matrix(contents));
        element
    }

    pub fn new_function(number: i32) -> Self {
        Element::new(ElementTag::Function, number)
    }

    pub fn new_command(number: i32) -> Self {
        let mut element = Element::new(ElementTag::Command, number);
        let mut contents = CommandContents::default();
        if number == COMMAND_GET_DIRECTORY {
            contents.set_field_flags(FieldFlags::All);
        }
        element.contents = Some(Contents::Command(contents));
        element
    }

    pub fn new_qualified_node(path: RelativeOid) -> EmberResult<Self> {
        Element::new_qualified(ElementTag::QualifiedNode, path)
    }

    pub fn new_qualified_parameter(path: RelativeOid) -> EmberResult<Self> {
        Element::new_qualified(ElementTag::QualifiedParameter, path)
    }

    pub fn new_qualified_matrix(path: RelativeOid, contents: MatrixContents) -> EmberResult<Self> {
        let mut element = Element::new_qualified(ElementTag::QualifiedMatrix, path)?;
        element.contents = Some(Contents::Matrix(contents));
        Ok(element)
    }

    pub fn new_qualified_function(path: RelativeOid) -> EmberResult<Self> {
        Element::new_qualified(ElementTag::QualifiedFunction, path)
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn tag(&self) -> ElementTag {
        self.tag
    }

    pub fn is_qualified(&self) -> bool {
        self.path.is_some()
    }

    /// The explicit path of a qualified element; unqualified elements are
    /// addressed by the traversal that reaches them.
    pub fn path(&self) -> Option<&RelativeOid> {
        self.path.as_ref()
    }

    pub fn contents(&self) -> Option<&Contents> {
        self.contents.as_ref()
    }

    /// Kind-appropriate contents, created on first access.
    pub fn contents_mut(&mut self) -> &mut Contents {
        self.contents
            .get_or_insert_with(|| Contents::default_for(self.tag))
    }

    pub fn set_contents(&mut self, contents: Contents) {
        self.contents = Some(contents);
    }

    pub fn add_child(&mut self, child: Element) {
        self.children.insert(child.number, child);
    }

    pub fn child(&self, number: i32) -> Option<&Element> {
        self.children.get(&number)
    }

    pub fn child_mut(&mut self, number: i32) -> Option<&mut Element> {
        self.children.get_mut(&number)
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.values()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn targets(&self) -> EmberResult<&[Target]> {
        self.matrix_only().crumb(site!())?;
        Ok(&self.targets)
    }

    pub fn set_targets(&mut self, targets: Vec<Target>) -> EmberResult<()> {
        self.matrix_only().crumb(site!())?;
        self.targets = targets;
        Ok(())
    }

    pub fn sources(&self) -> EmberResult<&[Source]> {
        self.matrix_only().crumb(site!())?;
        Ok(&self.sources)
    }

    pub fn set_sources(&mut self, sources: Vec<Source>) -> EmberResult<()> {
        self.matrix_only().crumb(site!())?;
        self.sources = sources;
        Ok(())
    }

    pub fn connections(&self) -> EmberResult<&[Connection]> {
        self.matrix_only().crumb(site!())?;
        Ok(&self.connections)
    }

    pub fn set_connections(&mut self, connections: Vec<Connection>) -> EmberResult<()> {
        self.matrix_only().crumb(site!())?;
        self.connections = connections;
        Ok(())
    }

    fn matrix_only(&self) -> EmberResult<()> {
        if self.tag.is_matrix() {
            Ok(())
        } else {
            Err(ErrorKind::Deserialization("element is not a matrix".to_owned()).into())
        }
    }

    pub fn add_listener(&mut self, listener: ElementListener) -> ListenerHandle {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    pub fn has_listener(&self, handle: ListenerHandle) -> bool {
        self.listeners.contains(handle)
    }

    pub(crate) fn notify_listeners(&self) {
        for listener in self.listeners.iter() {
            listener(self);
        }
    }

    pub fn encode(&self, writer: &mut AsnWriter) {
        self.encode_inner(writer, false);
    }

    /// Child encodings omit the nested children block; children of children
    /// are delivered as separate top-level updates.
    fn encode_inner(&self, writer: &mut AsnWriter, as_child: bool) {
        writer.start_sequence(self.tag.wire());

        writer.start_sequence(context(0));
        match &self.path {
            Some(path) => writer.write_relative_oid(path),
            None => writer.write_int(self.number),
        }
        writer.end_sequence();

        if let Some(contents) = &self.contents {
            writer.start_sequence(context(1));
            contents.encode(writer);
            writer.end_sequence();
            if let Contents::Command(command) = contents {
                if let Some(invocation) = &command.invocation {
                    writer.start_sequence(context(2));
                    invocation.encode(writer);
                    writer.end_sequence();
                }
            }
        }

        if !as_child && !self.children.is_empty() {
            writer.start_sequence(context(2));
            self.encode_children(writer);
            writer.end_sequence();
        }

        if self.tag.is_matrix() {
            if !self.targets.is_empty() {
                signal::encode_targets(writer, &self.targets);
            }
            if !self.sources.is_empty() {
                signal::encode_sources(writer, &self.sources);
            }
            if !self.connections.is_empty() {
                connection::encode_connections(writer, &self.connections);
            }
        }

        writer.end_sequence();
    }

    fn encode_children(&self, writer: &mut AsnWriter) {
        writer.start_sequence(ELEMENT_COLLECTION);
        for child in self.children.values() {
            writer.start_sequence(context(0));
            child.encode_inner(writer, true);
            writer.end_sequence();
        }
        writer.end_sequence();
    }

    /// Merges a decoded element into this one.
    ///
    /// `path` is this element's full path; every element the merge touches
    /// is recorded in `modified` for the deferred listener dispatch.
    pub(crate) fn update(
        &mut self,
        incoming: Element,
        path: &RelativeOid,
        modified: &mut Vec<RelativeOid>,
    ) -> EmberResult<()> {
        if self.number != incoming.number || self.tag.wire() != incoming.tag.wire() {
            return Err(ErrorKind::MergeIdentity(format!(
                "number {}/{} tag {:?}/{:?}",
                self.number, incoming.number, self.tag, incoming.tag
            ))
            .into());
        }

        if let Some(contents) = &incoming.contents {
            match &mut self.contents {
                Some(current) => current.merge_from(contents).crumb(site!())?,
                None => self.contents = incoming.contents.clone(),
            }
        }

        for (number, child) in incoming.children {
            let child_path = path.join(number as u32);
            match self.children.get_mut(&number) {
                Some(current) => current.update(child, &child_path, modified).crumb(site!())?,
                None => {
                    self.children.insert(number, child);
                    modified.push(child_path);
                }
            }
        }

        if !incoming.targets.is_empty() {
            self.targets = incoming.targets;
        }
        if !incoming.sources.is_empty() {
            self.sources = incoming.sources;
        }
        if !incoming.connections.is_empty() {
            self.connections = incoming.connections;
        }

        modified.push(path.clone());
        Ok(())
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("number", &self.number)
            .field("path", &self.path)
            .field("contents", &self.contents)
            .field("children", &self.children)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.tag == other.tag
            && self.path == other.path
            && self.contents == other.contents
            && self.children == other.children
            && self.targets == other.targets
            && self.sources == other.sources
            && self.connections == other.connections
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::tree::MatrixContents;

    #[test]
    fn node_without_contents_encodes_number_only() {
        let node = Element::new_node(10);
        let mut writer = AsnWriter::new();
        node.encode(&mut writer);
        assert_eq!(
            &[99, 128, 160, 128, 2, 1, 10, 0, 0, 0, 0],
            writer.as_slice()
        );
    }

    #[test]
    fn node_with_identifier_encodes_contents_set() {
        let mut node = Element::new_node(10);
        node.contents_mut()
            .as_node_mut()
            .unwrap()
            .set_identifier("gdnet");
        let mut writer = AsnWriter::new();
        node.encode(&mut writer);
        assert_eq!(
            &[
                99, 128, 160, 128, 2, 1, 10, 0, 0, 161, 128, 49, 128, 160, 128, 12, 5, 103, 100,
                110, 101, 116, 0, 0, 0, 0, 0, 0, 0, 0
            ],
            writer.as_slice()
        );
    }

    #[test]
    fn children_of_children_are_omitted_from_child_encoding() {
        let mut leaf = Element::new_parameter(3);
        leaf.contents_mut()
            .as_parameter_mut()
            .unwrap()
            .set_identifier("leaf");
        let mut inner = Element::new_node(2);
        inner.add_child(leaf);
        let mut outer = Element::new_node(1);
        outer.add_child(inner);

        let mut writer = AsnWriter::new();
        outer.encode(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = crate::ber::AsnReader::new(&bytes);
        let decoded = crate::tree::factory::decode_element(&mut reader).unwrap();

        let inner = decoded.child(2).unwrap();
        assert_eq!(0, inner.child_count());
    }

    #[test]
    fn qualified_construction_requires_a_path() {
        assert!(Element::new_qualified_node(RelativeOid::default()).is_err());
        let element = Element::new_qualified_node(RelativeOid::new(vec![1, 2, 3])).unwrap();
        assert_eq!(3, element.number());
        assert!(element.is_qualified());
    }

    #[test]
    fn matrix_accessors_reject_other_kinds() {
        let mut node = Element::new_node(1);
        assert!(node.targets().is_err());
        assert!(node.set_targets(vec![Target(1)]).is_err());

        let mut matrix = Element::new_matrix(1, MatrixContents::default());
        matrix.set_targets(vec![Target(1), Target(2)]).unwrap();
        assert_eq!(2, matrix.targets().unwrap().len());
    }

    #[test]
    fn update_rejects_identity_changes() {
        let mut node = Element::new_node(1);
        let other = Element::new_node(2);
        let mut modified = Vec::new();
        let err = node
            .update(other, &RelativeOid::new(vec![1]), &mut modified)
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MergeIdentity(_)));

        let parameter = Element::new_parameter(1);
        let err = node
            .update(parameter, &RelativeOid::new(vec![1]), &mut modified)
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MergeIdentity(_)));
    }

    #[test]
    fn update_merges_contents_and_attaches_children() {
        let mut current = Element::new_node(1);
        current
            .contents_mut()
            .as_node_mut()
            .unwrap()
            .set_identifier("root");

        let mut incoming = Element::new_node(1);
        incoming
            .contents_mut()
            .as_node_mut()
            .unwrap()
            .set_description("updated");
        incoming.add_child(Element::new_parameter(4));

        let mut modified = Vec::new();
        let path = RelativeOid::new(vec![1]);
        current.update(incoming, &path, &mut modified).unwrap();

        let contents = current.contents().unwrap().as_node().unwrap();
        assert_eq!("root", contents.identifier().unwrap());
        assert_eq!("updated", contents.description().unwrap());
        assert!(current.child(4).is_some());
        assert!(modified.contains(&RelativeOid::new(vec![1])));
        assert!(modified.contains(&RelativeOid::new(vec![1, 4])));
    }

    #[test]
    fn listener_registration_is_identity_based() {
        let mut node = Element::new_node(1);
        let first = node.add_listener(Arc::new(|_| {}));
        let second = node.add_listener(Arc::new(|_| {}));
        assert!(node.has_listener(first));
        assert!(node.has_listener(second));
        assert!(node.remove_listener(first));
        assert!(!node.has_listener(first));
        assert!(node.has_listener(second));
        assert!(!node.remove_listener(first));
    }
}
