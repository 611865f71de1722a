// BER-like TLV codec used by the Ember+ tree and framing layers.
//
// Restrictions compared to full BER:
// - containers are written with indefinite length only
// - primitive values are written with definite length only
// - the reader tolerates both forms on input

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod reader;
pub mod writer;

pub use reader::{AsnReader, Length, SeqReader};
pub use writer::AsnWriter;

pub const SEQUENCE: u8 = 0x20 | 16;
pub const SET: u8 = 0x20 | 17;
pub const BOOLEAN: u8 = 1;
pub const INTEGER: u8 = 2;
pub const BITSTRING: u8 = 3;
pub const OCTETSTRING: u8 = 4;
pub const NULL: u8 = 5;
pub const REAL: u8 = 9;
pub const UTF8STRING: u8 = 12;
pub const RELATIVE_OID: u8 = 13;

pub const fn application(num: u8) -> u8 {
    0x60 | num
}

pub const fn context(num: u8) -> u8 {
    0xA0 | num
}

pub const fn universal(num: u8) -> u8 {
    num
}

/// Path from the tree root to an element, one child number per component.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct RelativeOid(pub Vec<u32>);

impl RelativeOid {
    pub fn new(components: Vec<u32>) -> Self {
        RelativeOid(components)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, number: u32) -> RelativeOid {
        let mut path = self.0.clone();
        path.push(number);
        RelativeOid(path)
    }

    pub fn parent(&self) -> Option<RelativeOid> {
        if self.0.is_empty() {
            None
        } else {
            Some(RelativeOid(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn starts_with(&self, prefix: &RelativeOid) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<&[u32]> for RelativeOid {
    fn from(components: &[u32]) -> Self {
        RelativeOid(components.to_vec())
    }
}

impl fmt::Display for RelativeOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn tag_classes() {
        assert_eq!(0x60, application(0));
        assert_eq!(0x6B, application(11));
        assert_eq!(0xA0, context(0));
        assert_eq!(0xA3, context(3));
        assert_eq!(0x0D, universal(13));
    }

    #[test]
    fn oid_display_and_join() {
        let oid = RelativeOid::new(vec![1, 2]);
        assert_eq!("1.2", oid.to_string());
        assert_eq!("1.2.3", oid.join(3).to_string());
        assert_eq!(Some(RelativeOid::new(vec![1])), oid.parent());
        assert!(oid.join(3).starts_with(&oid));
        assert!(!oid.starts_with(&oid.join(3)));
    }
}
