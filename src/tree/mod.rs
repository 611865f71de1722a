use crate::{
    ber::application,
    error::{EmberResult, ErrorKind},
};
use serde::{Deserialize, Serialize};

pub mod command;
pub mod connection;
pub mod content_parameter;
pub mod element;
pub mod factory;
pub mod function;
pub mod invocation;
pub mod label;
pub mod matrix;
pub mod node;
pub mod parameter;
pub mod root;
pub mod signal;

pub use command::CommandContents;
pub use connection::{Connection, ConnectionDisposition, ConnectionOperation};
pub use content_parameter::ContentParameter;
pub use element::{Contents, Element, ElementListener, ListenerHandle};
pub use function::{FunctionContents, ParameterType, TupleDescription};
pub use invocation::Invocation;
pub use label::Label;
pub use matrix::{MatrixContents, MatrixMode, MatrixType};
pub use node::NodeContents;
pub use parameter::ParameterContents;
pub use root::{MergeReport, RootElement, RootListener};
pub use signal::{Source, Target};

pub const ROOT: u8 = application(0);
pub const ELEMENT_COLLECTION: u8 = application(4);
pub const ROOT_ELEMENT_COLLECTION: u8 = application(11);

/// Wire discriminator for the element kinds of the tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ElementTag {
    Parameter,
    Command,
    Node,
    Matrix,
    Function,
    QualifiedParameter,
    QualifiedNode,
    QualifiedMatrix,
    QualifiedFunction,
}

impl ElementTag {
    pub const fn wire(self) -> u8 {
        match self {
            ElementTag::Parameter => application(1),
            ElementTag::Command => application(2),
            ElementTag::Node => application(3),
            ElementTag::Matrix => application(13),
            ElementTag::Function => application(19),
            ElementTag::QualifiedParameter => application(9),
            ElementTag::QualifiedNode => application(10),
            ElementTag::QualifiedMatrix => application(17),
            ElementTag::QualifiedFunction => application(20),
        }
    }

    pub fn from_wire(tag: u8) -> EmberResult<Self> {
        match tag {
            t if t == application(1) => Ok(ElementTag::Parameter),
            t if t == application(2) => Ok(ElementTag::Command),
            t if t == application(3) => Ok(ElementTag::Node),
            t if t == application(13) => Ok(ElementTag::Matrix),
            t if t == application(19) => Ok(ElementTag::Function),
            t if t == application(9) => Ok(ElementTag::QualifiedParameter),
            t if t == application(10) => Ok(ElementTag::QualifiedNode),
            t if t == application(17) => Ok(ElementTag::QualifiedMatrix),
            t if t == application(20) => Ok(ElementTag::QualifiedFunction),
            t => Err(ErrorKind::Deserialization(format!(
                "unknown application tag {t:#04x}"
            ))
            .into()),
        }
    }

    pub const fn is_qualified(self) -> bool {
        matches!(
            self,
            ElementTag::QualifiedParameter
                | ElementTag::QualifiedNode
                | ElementTag::QualifiedMatrix
                | ElementTag::QualifiedFunction
        )
    }

    pub const fn is_matrix(self) -> bool {
        matches!(self, ElementTag::Matrix | ElementTag::QualifiedMatrix)
    }

    /// The qualified form of this kind; commands have none.
    pub const fn qualified(self) -> Self {
        match self {
            ElementTag::Parameter | ElementTag::QualifiedParameter => ElementTag::QualifiedParameter,
            ElementTag::Node | ElementTag::QualifiedNode => ElementTag::QualifiedNode,
            ElementTag::Matrix | ElementTag::QualifiedMatrix => ElementTag::QualifiedMatrix,
            ElementTag::Function | ElementTag::QualifiedFunction => ElementTag::QualifiedFunction,
            ElementTag::Command => ElementTag::Command,
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn tags_roundtrip_through_wire_form() {
        for tag in [
            ElementTag::Parameter,
            ElementTag::Command,
            ElementTag::Node,
            ElementTag::Matrix,
            ElementTag::Function,
            ElementTag::QualifiedParameter,
            ElementTag::QualifiedNode,
            ElementTag::QualifiedMatrix,
            ElementTag::QualifiedFunction,
        ] {
            assert_eq!(tag, ElementTag::from_wire(tag.wire()).unwrap());
        }
        assert!(ElementTag::from_wire(application(25)).is_err());
    }

    #[test]
    fn qualified_discrimination_works() {
        assert!(ElementTag::QualifiedNode.is_qualified());
        assert!(!ElementTag::Node.is_qualified());
        assert_eq!(ElementTag::QualifiedNode, ElementTag::Node.qualified());
        assert!(ElementTag::QualifiedMatrix.is_matrix());
        assert!(ElementTag::Matrix.is_matrix());
        assert!(!ElementTag::Function.is_matrix());
    }
}
