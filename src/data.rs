//! Boxed byte buffers.

use crate::bridge::{sealed, Facade};
use crate::native::{self, Block, Kind, TypeTag};
use crate::object::{Object, ObjectRepr};
use core::cell::{Ref, RefMut};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Range;
use std::rc::Rc;

#[derive(Debug)]
enum DataRepr {
    Constant(&'static [u8]),
    Owned(Vec<u8>),
}

/// Payload of a data block.
#[derive(Debug)]
pub struct DataPayload {
    repr: DataRepr,
}

impl DataPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            DataRepr::Constant(b) => b,
            DataRepr::Owned(v) => v,
        }
    }

    fn owned_mut(&mut self) -> &mut Vec<u8> {
        match &mut self.repr {
            DataRepr::Owned(v) => v,
            DataRepr::Constant(_) => {
                crate::contract_violation!("constant data payload cannot be mutated")
            }
        }
    }
}

fn data_block(kind: Kind, repr: DataRepr) -> Rc<Block<DataPayload>> {
    Block::new(TypeTag::Data, kind, DataPayload { repr })
}

/// Immutable view of any data block.
#[derive(Clone)]
pub struct BoxedData(Rc<Block<DataPayload>>);

impl BoxedData {
    pub fn new(bytes: Vec<u8>) -> Self {
        BoxedData(data_block(Kind::Immutable, DataRepr::Owned(bytes)))
    }

    /// Wrap static bytes without copying; the block is constant.
    pub fn from_static(bytes: &'static [u8]) -> Self {
        BoxedData(data_block(Kind::Constant, DataRepr::Constant(bytes)))
    }

    pub fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.0.payload(), |p| p.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.0.payload().as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    pub fn copy(&self) -> BoxedData {
        if self.0.kind().is_mutable() {
            BoxedData::new(self.to_vec())
        } else {
            self.clone()
        }
    }

    pub fn mutable_copy(&self) -> MutableData {
        MutableData::from(self.to_vec())
    }
}

/// Mutable view; only accepts mutable data blocks.
#[derive(Clone)]
pub struct MutableData(Rc<Block<DataPayload>>);

impl MutableData {
    pub fn new() -> Self {
        MutableData::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MutableData::from(Vec::with_capacity(capacity))
    }

    pub fn bytes(&self) -> Ref<'_, [u8]> {
        Ref::map(self.0.payload(), |p| p.as_bytes())
    }

    pub fn bytes_mut(&self) -> RefMut<'_, [u8]> {
        RefMut::map(self.0.payload_mut("bytes_mut"), |p| p.owned_mut().as_mut_slice())
    }

    pub fn len(&self) -> usize {
        self.0.payload().as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&self, bytes: &[u8]) {
        self.0.payload_mut("append").owned_mut().extend_from_slice(bytes);
    }

    /// Grow with zero bytes or truncate.
    pub fn set_len(&self, len: usize) {
        self.0.payload_mut("set_len").owned_mut().resize(len, 0);
    }

    pub fn replace_bytes(&self, range: Range<usize>, with: &[u8]) {
        let mut p = self.0.payload_mut("replace_bytes");
        let owned = p.owned_mut();
        if range.start > range.end || range.end > owned.len() {
            crate::contract_violation!("range {:?} out of bounds for {} bytes", range, owned.len());
        }
        owned.splice(range, with.iter().copied());
    }

    /// Zero the bytes in `range`.
    pub fn reset_bytes(&self, range: Range<usize>) {
        let mut p = self.0.payload_mut("reset_bytes");
        let owned = p.owned_mut();
        let len = owned.len();
        match owned.get_mut(range.clone()) {
            Some(slice) => slice.fill(0),
            None => crate::contract_violation!("range {:?} out of bounds for {} bytes", range, len),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    pub fn copy(&self) -> BoxedData {
        BoxedData::new(self.to_vec())
    }

    pub fn mutable_copy(&self) -> MutableData {
        MutableData::from(self.to_vec())
    }

    pub fn as_boxed(&self) -> BoxedData {
        BoxedData(self.0.clone())
    }
}

impl Default for MutableData {
    fn default() -> Self {
        MutableData::new()
    }
}

impl From<Vec<u8>> for MutableData {
    fn from(bytes: Vec<u8>) -> Self {
        MutableData(data_block(Kind::Mutable, DataRepr::Owned(bytes)))
    }
}

impl From<&[u8]> for MutableData {
    fn from(bytes: &[u8]) -> Self {
        MutableData::from(bytes.to_vec())
    }
}

impl From<Vec<u8>> for BoxedData {
    fn from(bytes: Vec<u8>) -> Self {
        BoxedData::new(bytes)
    }
}

impl From<&[u8]> for BoxedData {
    fn from(bytes: &[u8]) -> Self {
        BoxedData::new(bytes.to_vec())
    }
}

impl sealed::Sealed for BoxedData {}
impl sealed::Sealed for MutableData {}

macro_rules! data_facade {
    ($t:ident, $accepts:expr) => {
        impl Facade for $t {
            type Payload = DataPayload;
            const TAG: TypeTag = TypeTag::Data;

            fn accepts(kind: Kind) -> bool {
                let f: fn(Kind) -> bool = $accepts;
                f(kind)
            }

            fn block(&self) -> &Rc<Block<DataPayload>> {
                &self.0
            }

            fn into_block(self) -> Rc<Block<DataPayload>> {
                self.0
            }

            fn from_block(block: Rc<Block<DataPayload>>) -> Self {
                $t(block)
            }

            fn project(object: &Object) -> Option<&Rc<Block<DataPayload>>> {
                match &object.0 {
                    ObjectRepr::Data(b) => Some(b),
                    _ => None,
                }
            }

            fn as_object(&self) -> Object {
                Object(ObjectRepr::Data(self.0.clone()))
            }
        }

        impl PartialEq for $t {
            fn eq(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
                    || self.0.payload().as_bytes() == other.0.payload().as_bytes()
            }
        }

        impl Eq for $t {}

        impl PartialEq<[u8]> for $t {
            fn eq(&self, other: &[u8]) -> bool {
                self.0.payload().as_bytes() == other
            }
        }

        impl Hash for $t {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.payload().as_bytes().hash(state)
            }
        }

        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "<{} bytes>@{:#x}",
                    self.0.payload().as_bytes().len(),
                    native::address(&self.0)
                )
            }
        }
    };
}

data_facade!(BoxedData, |_| true);
data_facade!(MutableData, |k| k == Kind::Mutable);
