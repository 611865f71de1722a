use crate::{
    ber::{AsnReader, AsnWriter, RelativeOid, context},
    error::{Crumb, EmberError, EmberResult, ErrorKind},
    site,
    tree::{
        Element, ElementTag, ROOT, ROOT_ELEMENT_COLLECTION,
        element::{ListenerHandle, Listeners},
        factory,
    },
};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Observer of the whole tree, fired once per merged message.
pub type RootListener = Arc<dyn Fn(&RootElement) + Send + Sync + 'static>;

/// Outcome of merging one inbound message.
///
/// `modified` holds the path of every element the merge touched, sorted;
/// `dropped` holds the per-element errors of the parts that did not apply.
/// A dropped element never aborts the rest of the message.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub modified: Vec<RelativeOid>,
    pub dropped: Vec<EmberError>,
}

/// The local copy of a provider's tree and the entry point for messages.
#[derive(Clone, Default)]
pub struct RootElement {
    elements: BTreeMap<i32, Element>,
    listeners: Listeners<RootListener>,
}

impl RootElement {
    pub fn new() -> Self {
        RootElement::default()
    }

    pub fn get(&self, number: i32) -> Option<&Element> {
        self.elements.get(&number)
    }

    pub fn get_mut(&mut self, number: i32) -> Option<&mut Element> {
        self.elements.get_mut(&number)
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.insert(element.number(), element);
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Follows a path from the top level down.
    pub fn walk(&self, path: &[u32]) -> Option<&Element> {
        let (&first, rest) = path.split_first()?;
        let mut element = self.elements.get(&(first as i32))?;
        for &number in rest {
            element = element.child(number as i32)?;
        }
        Some(element)
    }

    pub fn walk_mut(&mut self, path: &[u32]) -> Option<&mut Element> {
        let (&first, rest) = path.split_first()?;
        let mut element = self.elements.get_mut(&(first as i32))?;
        for &number in rest {
            element = element.child_mut(number as i32)?;
        }
        Some(element)
    }

    pub fn add_listener(&mut self, listener: RootListener) -> ListenerHandle {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    pub fn has_listener(&self, handle: ListenerHandle) -> bool {
        self.listeners.contains(handle)
    }

    /// Decodes one message and merges it into this tree.
    ///
    /// Listener dispatch happens after the whole message is consumed: the
    /// root listeners once, then the listeners of every modified element in
    /// path order.
    pub fn decode(&mut self, reader: &mut AsnReader) -> EmberResult<MergeReport> {
        let mut report = MergeReport::default();
        let (_, mut root_reader) = reader.read_sequence_start(ROOT).crumb(site!())?;
        let peek = root_reader.peek_tag().crumb(site!())?;
        if peek == ROOT_ELEMENT_COLLECTION {
            let (_, mut collection) = root_reader.read_sequence_start(peek).crumb(site!())?;
            while collection.len() > 0 {
                let (_, mut element_reader) =
                    collection.read_sequence_start(context(0)).crumb(site!())?;
                let element = factory::decode_element(&mut element_reader).crumb(site!())?;
                element_reader.read_sequence_end().crumb(site!())?;
                if let Err(e) = self.merge_element(element, &mut report.modified) {
                    report.dropped.push(e);
                }
                if collection.check_sequence_end().crumb(site!())? {
                    break;
                }
            }
        }
        root_reader.read_sequence_end().crumb(site!())?;

        report.modified.sort();
        report.modified.dedup();
        self.dispatch(&report.modified);
        Ok(report)
    }

    fn merge_element(
        &mut self,
        element: Element,
        modified: &mut Vec<RelativeOid>,
    ) -> EmberResult<()> {
        let number = element.number();
        match element.path().cloned() {
            Some(path) => {
                if path.is_empty() {
                    return Err(ErrorKind::MergeDetached {
                        path: path.to_string(),
                    }
                    .into());
                }
                if path.len() == 1 {
                    match self.elements.get_mut(&number) {
                        Some(current) => current.update(element, &path, modified).crumb(site!())?,
                        None => {
                            self.elements.insert(number, element);
                            modified.push(path);
                        }
                    }
                } else {
                    let parent_path = &path.0[..path.len() - 1];
                    let Some(parent) = self.walk_mut(parent_path) else {
                        return Err(ErrorKind::MergeDetached {
                            path: path.to_string(),
                        }
                        .into());
                    };
                    match parent.child_mut(number) {
                        Some(current) => current.update(element, &path, modified).crumb(site!())?,
                        None => {
                            parent.add_child(element);
                            modified.push(path);
                        }
                    }
                }
            }
            None => {
                let path = RelativeOid::new(vec![number as u32]);
                match self.elements.get_mut(&number) {
                    Some(current) => current.update(element, &path, modified).crumb(site!())?,
                    None => {
                        self.elements.insert(number, element);
                        modified.push(path);
                    }
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, modified: &[RelativeOid]) {
        if modified.is_empty() {
            return;
        }
        for listener in self.listeners.iter() {
            listener(self);
        }
        for path in modified {
            if let Some(element) = self.walk(&path.0) {
                element.notify_listeners();
            }
        }
    }

    pub fn encode(&self, writer: &mut AsnWriter) {
        writer.start_sequence(ROOT);
        if !self.elements.is_empty() {
            writer.start_sequence(ROOT_ELEMENT_COLLECTION);
            for element in self.elements.values() {
                writer.start_sequence(context(0));
                element.encode(writer);
                writer.end_sequence();
            }
            writer.end_sequence();
        }
        writer.end_sequence();
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = AsnWriter::new();
        self.encode(&mut writer);
        writer.into_bytes()
    }

    /// A bare GetDirectory aimed at the provider's top level.
    pub fn get_directory_request() -> RootElement {
        let mut root = RootElement::new();
        root.add_element(Element::new_command(
            crate::tree::command::COMMAND_GET_DIRECTORY,
        ));
        root
    }

    /// A command aimed at one element: the qualified form of the element
    /// wrapping a single Command child.
    pub fn qualified_command_request(
        tag: ElementTag,
        path: &RelativeOid,
        command: i32,
    ) -> EmberResult<RootElement> {
        let mut element = Element::new_qualified(tag.qualified(), path.clone()).crumb(site!())?;
        element.add_child(Element::new_command(command));
        let mut root = RootElement::new();
        root.add_element(element);
        Ok(root)
    }
}

impl fmt::Debug for RootElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootElement")
            .field("elements", &self.elements)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl PartialEq for RootElement {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}
