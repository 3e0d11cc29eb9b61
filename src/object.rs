//! Object root: identity, value equality, hashing and copy dispatch.

use crate::bridge::Facade;
use crate::data::{BoxedData, DataPayload};
use crate::native::{self, Block, Kind, TypeTag};
use crate::number::{BoxedNumber, NumberValue};
use crate::set::counted::CountedSet;
use crate::set::{self, MutableSet, Set, SetPayload};
use crate::string::{BoxedString, ConstantString, StringPayload};
use core::any::Any;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::rc::Rc;

/// Behavior of objects defined outside this crate.
///
/// The defaults give identity semantics: an object is equal only to itself
/// and hashes by address. Copying returns the same object unless the type
/// provides a copy.
pub trait ObjectProtocol: Any {
    fn class_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn is_equal(&self, other: &Object) -> bool {
        other.custom_address() == Some(self as *const Self as *const () as usize)
    }

    fn hash_value(&self) -> u64 {
        self as *const Self as *const () as usize as u64
    }

    /// Independent immutable copy, or `None` when the object is immutable
    /// and a copy may share identity.
    fn copy_object(&self) -> Option<Rc<dyn ObjectProtocol>> {
        None
    }

    /// Independent mutable copy, if this type has a mutable variant.
    fn mutable_copy_object(&self) -> Option<Rc<dyn ObjectProtocol>> {
        None
    }
}

#[derive(Clone)]
pub(crate) enum ObjectRepr {
    String(Rc<Block<StringPayload>>),
    Data(Rc<Block<DataPayload>>),
    Number(Rc<Block<NumberValue>>),
    Set(Rc<Block<SetPayload>>),
    Custom(Rc<dyn ObjectProtocol>),
}

/// Reference to any boxed value. Cloning retains the same allocation.
#[derive(Clone)]
pub struct Object(pub(crate) ObjectRepr);

impl Object {
    pub fn custom<T: ObjectProtocol>(value: T) -> Object {
        Object(ObjectRepr::Custom(Rc::new(value)))
    }

    pub fn from_custom_rc(value: Rc<dyn ObjectProtocol>) -> Object {
        Object(ObjectRepr::Custom(value))
    }

    /// Address of the underlying allocation.
    pub fn identity(&self) -> usize {
        match &self.0 {
            ObjectRepr::String(b) => native::address(b),
            ObjectRepr::Data(b) => native::address(b),
            ObjectRepr::Number(b) => native::address(b),
            ObjectRepr::Set(b) => native::address(b),
            ObjectRepr::Custom(c) => Rc::as_ptr(c) as *const () as usize,
        }
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.identity() == other.identity()
    }

    pub(crate) fn custom_address(&self) -> Option<usize> {
        match &self.0 {
            ObjectRepr::Custom(c) => Some(Rc::as_ptr(c) as *const () as usize),
            _ => None,
        }
    }

    pub fn retain_count(&self) -> usize {
        match &self.0 {
            ObjectRepr::String(b) => native::retain_count(b),
            ObjectRepr::Data(b) => native::retain_count(b),
            ObjectRepr::Number(b) => native::retain_count(b),
            ObjectRepr::Set(b) => native::retain_count(b),
            ObjectRepr::Custom(c) => Rc::strong_count(c),
        }
    }

    /// Type family; `None` for custom objects.
    pub fn type_tag(&self) -> Option<TypeTag> {
        match &self.0 {
            ObjectRepr::String(_) => Some(TypeTag::String),
            ObjectRepr::Data(_) => Some(TypeTag::Data),
            ObjectRepr::Number(_) => Some(TypeTag::Number),
            ObjectRepr::Set(_) => Some(TypeTag::Set),
            ObjectRepr::Custom(_) => None,
        }
    }

    /// Block kind; `None` for custom objects.
    pub fn kind(&self) -> Option<Kind> {
        match &self.0 {
            ObjectRepr::String(b) => Some(b.kind()),
            ObjectRepr::Data(b) => Some(b.kind()),
            ObjectRepr::Number(b) => Some(b.kind()),
            ObjectRepr::Set(b) => Some(b.kind()),
            ObjectRepr::Custom(_) => None,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match &self.0 {
            ObjectRepr::String(b) => match b.kind() {
                Kind::Mutable => "MutableString",
                Kind::Constant => "ConstantString",
                _ => "String",
            },
            ObjectRepr::Data(b) => match b.kind() {
                Kind::Mutable => "MutableData",
                _ => "Data",
            },
            ObjectRepr::Number(_) => "Number",
            ObjectRepr::Set(b) => set::class_name(b),
            ObjectRepr::Custom(c) => c.class_name(),
        }
    }

    /// Checked conversion to a facade.
    pub fn downcast<F: Facade>(&self) -> Option<F> {
        let block = F::project(self)?;
        F::accepts(block.kind()).then(|| F::from_block(block.clone()))
    }

    pub fn downcast_custom<T: ObjectProtocol>(&self) -> Option<&T> {
        match &self.0 {
            ObjectRepr::Custom(c) => c.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn is_equal(&self, other: &Object) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&self.0, &other.0) {
            (ObjectRepr::String(a), ObjectRepr::String(b)) => {
                a.payload().as_str() == b.payload().as_str()
            }
            (ObjectRepr::Data(a), ObjectRepr::Data(b)) => {
                a.payload().as_bytes() == b.payload().as_bytes()
            }
            (ObjectRepr::Number(a), ObjectRepr::Number(b)) => *a.payload() == *b.payload(),
            (ObjectRepr::Set(a), ObjectRepr::Set(b)) => set::blocks_equal(a, b),
            (ObjectRepr::Custom(a), _) => a.is_equal(other),
            (_, ObjectRepr::Custom(b)) => b.is_equal(self),
            _ => false,
        }
    }

    pub fn hash_value(&self) -> u64 {
        let mut h = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut h);
        h.finish()
    }

    /// Immutable copy. Immutable objects return themselves; mutable ones
    /// return an independent snapshot.
    pub fn copy(&self) -> Object {
        match &self.0 {
            ObjectRepr::String(b) => BoxedString::from_block(b.clone()).copy().as_object(),
            ObjectRepr::Data(b) => BoxedData::from_block(b.clone()).copy().as_object(),
            ObjectRepr::Number(b) => BoxedNumber::from_block(b.clone()).copy().as_object(),
            ObjectRepr::Set(b) if b.kind() == Kind::Counted => {
                CountedSet::from_block(b.clone()).copy().as_object()
            }
            ObjectRepr::Set(b) => Set::from_block(b.clone()).copy().as_object(),
            ObjectRepr::Custom(c) => match c.copy_object() {
                Some(copy) => Object(ObjectRepr::Custom(copy)),
                None => self.clone(),
            },
        }
    }

    /// Independent mutable copy, when the type has a mutable variant.
    pub fn mutable_copy(&self) -> Option<Object> {
        match &self.0 {
            ObjectRepr::String(b) => {
                Some(BoxedString::from_block(b.clone()).mutable_copy().as_object())
            }
            ObjectRepr::Data(b) => Some(BoxedData::from_block(b.clone()).mutable_copy().as_object()),
            ObjectRepr::Number(_) => None,
            ObjectRepr::Set(b) if b.kind() == Kind::Counted => {
                Some(CountedSet::from_block(b.clone()).mutable_copy().as_object())
            }
            ObjectRepr::Set(b) => Some(Set::from_block(b.clone()).mutable_copy().as_object()),
            ObjectRepr::Custom(c) => c.mutable_copy_object().map(|m| Object(ObjectRepr::Custom(m))),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            ObjectRepr::String(b) => b.payload().as_str().hash(state),
            ObjectRepr::Data(b) => b.payload().as_bytes().hash(state),
            ObjectRepr::Number(b) => b.payload().hash(state),
            ObjectRepr::Set(b) => set::block_count(b).hash(state),
            ObjectRepr::Custom(c) => c.hash_value().hash(state),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ObjectRepr::String(b) => write!(f, "{:?}", b.payload().as_str()),
            ObjectRepr::Data(b) => write!(f, "<{} bytes>", b.payload().as_bytes().len()),
            ObjectRepr::Number(b) => write!(f, "{}", *b.payload()),
            ObjectRepr::Set(b) => set::fmt_block(b, f),
            ObjectRepr::Custom(c) => write!(f, "<{} {:#x}>", c.class_name(), self.identity()),
        }
    }
}

impl From<&'static str> for Object {
    /// String literals become constant boxed strings without copying.
    fn from(s: &'static str) -> Self {
        ConstantString::new(s).as_object()
    }
}

impl From<String> for Object {
    fn from(s: String) -> Self {
        BoxedString::new(s).as_object()
    }
}

impl From<Vec<u8>> for Object {
    fn from(bytes: Vec<u8>) -> Self {
        BoxedData::new(bytes).as_object()
    }
}

macro_rules! object_from_facade {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Object {
                fn from(v: $t) -> Self {
                    Object::from(&v)
                }
            }
            impl From<&$t> for Object {
                fn from(v: &$t) -> Self {
                    v.as_object()
                }
            }
        )*
    };
}

object_from_facade!(
    BoxedString,
    crate::string::MutableString,
    BoxedData,
    crate::data::MutableData,
    BoxedNumber,
    Set,
    MutableSet,
    CountedSet
);

macro_rules! object_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Object {
                fn from(v: $t) -> Self {
                    BoxedNumber::from(v).as_object()
                }
            }
        )*
    };
}

object_from_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool);

impl From<crate::number::Decimal> for Object {
    fn from(v: crate::number::Decimal) -> Self {
        BoxedNumber::from(v).as_object()
    }
}
