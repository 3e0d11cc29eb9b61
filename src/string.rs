//! Boxed strings: immutable, mutable and constant facades over one block
//! type.

use crate::bridge::{sealed, Facade};
use crate::native::{self, Block, Kind, TypeTag};
use crate::object::{Object, ObjectRepr};
use core::cell::Ref;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Range;
use std::rc::Rc;

#[derive(Debug)]
enum StringRepr {
    Constant(&'static str),
    Owned(String),
}

/// Payload of a string block.
#[derive(Debug)]
pub struct StringPayload {
    repr: StringRepr,
}

impl StringPayload {
    pub fn as_str(&self) -> &str {
        match &self.repr {
            StringRepr::Constant(s) => s,
            StringRepr::Owned(s) => s,
        }
    }

    fn owned_mut(&mut self) -> &mut String {
        match &mut self.repr {
            StringRepr::Owned(s) => s,
            StringRepr::Constant(_) => {
                crate::contract_violation!("constant string payload cannot be mutated")
            }
        }
    }
}

fn string_block(kind: Kind, repr: StringRepr) -> Rc<Block<StringPayload>> {
    Block::new(TypeTag::String, kind, StringPayload { repr })
}

/// Non-owning handle to string data in static memory.
///
/// It carries no reference count and owns nothing, so it has no teardown.
/// Boxing it yields a constant-kind block that borrows the same text.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ConstantString(&'static str);

impl ConstantString {
    pub const fn new(s: &'static str) -> Self {
        ConstantString(s)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn to_boxed(self) -> BoxedString {
        BoxedString(string_block(Kind::Constant, StringRepr::Constant(self.0)))
    }

    pub fn as_object(self) -> Object {
        self.to_boxed().as_object()
    }
}

/// Immutable view of any string block.
#[derive(Clone)]
pub struct BoxedString(Rc<Block<StringPayload>>);

impl BoxedString {
    pub fn new(s: impl Into<String>) -> Self {
        BoxedString(string_block(Kind::Immutable, StringRepr::Owned(s.into())))
    }

    pub fn from_static(s: &'static str) -> Self {
        ConstantString::new(s).to_boxed()
    }

    /// Borrow the text. Valid until the next mutation of the block.
    pub fn as_str(&self) -> Ref<'_, str> {
        Ref::map(self.0.payload(), |p| p.as_str())
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.payload().as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length in UTF-16 code units.
    pub fn utf16_len(&self) -> usize {
        self.0.payload().as_str().encode_utf16().count()
    }

    pub fn is_constant(&self) -> bool {
        self.0.kind() == Kind::Constant
    }

    /// Immutable and constant strings return themselves; a mutable block is
    /// snapshotted.
    pub fn copy(&self) -> BoxedString {
        if self.0.kind().is_mutable() {
            BoxedString::new(self.as_str().to_owned())
        } else {
            self.clone()
        }
    }

    pub fn mutable_copy(&self) -> MutableString {
        MutableString::from(&*self.as_str())
    }
}

/// Mutable view; only accepts mutable string blocks.
#[derive(Clone)]
pub struct MutableString(Rc<Block<StringPayload>>);

impl MutableString {
    pub fn new() -> Self {
        MutableString::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MutableString(string_block(
            Kind::Mutable,
            StringRepr::Owned(String::with_capacity(capacity)),
        ))
    }

    pub fn as_str(&self) -> Ref<'_, str> {
        Ref::map(self.0.payload(), |p| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.payload().as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&self, s: &str) {
        self.0.payload_mut("append").owned_mut().push_str(s);
    }

    /// Insert at byte offset `at`, which must lie on a char boundary.
    pub fn insert(&self, at: usize, s: &str) {
        let mut p = self.0.payload_mut("insert");
        let owned = p.owned_mut();
        if !owned.is_char_boundary(at) {
            crate::contract_violation!("insert offset {} is not a char boundary", at);
        }
        owned.insert_str(at, s);
    }

    /// Replace the bytes in `range` (char-aligned) with `with`.
    pub fn replace_range(&self, range: Range<usize>, with: &str) {
        let mut p = self.0.payload_mut("replace_range");
        let owned = p.owned_mut();
        if range.start > range.end
            || range.end > owned.len()
            || !owned.is_char_boundary(range.start)
            || !owned.is_char_boundary(range.end)
        {
            crate::contract_violation!("range {:?} out of bounds or not char aligned", range);
        }
        owned.replace_range(range, with);
    }

    pub fn set_string(&self, s: &str) {
        let mut p = self.0.payload_mut("set_string");
        let owned = p.owned_mut();
        owned.clear();
        owned.push_str(s);
    }

    pub fn clear(&self) {
        self.0.payload_mut("clear").owned_mut().clear();
    }

    /// Independent immutable snapshot.
    pub fn copy(&self) -> BoxedString {
        BoxedString::new(self.as_str().to_owned())
    }

    pub fn mutable_copy(&self) -> MutableString {
        MutableString::from(&*self.as_str())
    }

    /// Read-only view of the same block.
    pub fn as_boxed(&self) -> BoxedString {
        BoxedString(self.0.clone())
    }
}

impl Default for MutableString {
    fn default() -> Self {
        MutableString::new()
    }
}

impl From<&str> for MutableString {
    fn from(s: &str) -> Self {
        MutableString(string_block(Kind::Mutable, StringRepr::Owned(s.to_owned())))
    }
}

impl From<String> for MutableString {
    fn from(s: String) -> Self {
        MutableString(string_block(Kind::Mutable, StringRepr::Owned(s)))
    }
}

impl From<&str> for BoxedString {
    fn from(s: &str) -> Self {
        BoxedString::new(s)
    }
}

impl From<String> for BoxedString {
    fn from(s: String) -> Self {
        BoxedString::new(s)
    }
}

impl sealed::Sealed for BoxedString {}
impl sealed::Sealed for MutableString {}

macro_rules! string_facade {
    ($t:ident, $accepts:expr) => {
        impl Facade for $t {
            type Payload = StringPayload;
            const TAG: TypeTag = TypeTag::String;

            fn accepts(kind: Kind) -> bool {
                let f: fn(Kind) -> bool = $accepts;
                f(kind)
            }

            fn block(&self) -> &Rc<Block<StringPayload>> {
                &self.0
            }

            fn into_block(self) -> Rc<Block<StringPayload>> {
                self.0
            }

            fn from_block(block: Rc<Block<StringPayload>>) -> Self {
                $t(block)
            }

            fn project(object: &Object) -> Option<&Rc<Block<StringPayload>>> {
                match &object.0 {
                    ObjectRepr::String(b) => Some(b),
                    _ => None,
                }
            }

            fn as_object(&self) -> Object {
                Object(ObjectRepr::String(self.0.clone()))
            }
        }

        impl PartialEq for $t {
            fn eq(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
                    || self.0.payload().as_str() == other.0.payload().as_str()
            }
        }

        impl Eq for $t {}

        impl PartialEq<str> for $t {
            fn eq(&self, other: &str) -> bool {
                self.0.payload().as_str() == other
            }
        }

        impl PartialEq<&str> for $t {
            fn eq(&self, other: &&str) -> bool {
                self.0.payload().as_str() == *other
            }
        }

        impl Hash for $t {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.payload().as_str().hash(state)
            }
        }

        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{:?}@{:#x}",
                    self.0.payload().as_str(),
                    native::address(&self.0)
                )
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.0.payload().as_str())
            }
        }
    };
}

string_facade!(BoxedString, |_| true);
string_facade!(MutableString, |k| k == Kind::Mutable);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_copy_is_identity() {
        let s = BoxedString::new("hello");
        assert!(s.copy().ptr_eq(&s));
        let c = BoxedString::from_static("static");
        assert!(c.copy().ptr_eq(&c));
        assert!(c.is_constant());
    }

    #[test]
    fn mutable_copy_is_snapshot() {
        let m = MutableString::from("ab");
        let snap = m.copy();
        m.append("c");
        assert_eq!(snap, "ab");
        assert_eq!(m, "abc");
        assert_eq!(snap.kind(), Kind::Immutable);
    }

    #[test]
    fn mutable_copy_of_constant_allocates() {
        let c = ConstantString::new("fixed").to_boxed();
        let m = c.mutable_copy();
        m.append("!");
        assert_eq!(c, "fixed");
        assert_eq!(m, "fixed!");
        assert!(!m.as_boxed().ptr_eq(&c));
    }

    #[test]
    fn edits() {
        let m = MutableString::from("héllo");
        m.insert(0, ">");
        m.replace_range(1..2, "H");
        assert_eq!(m, ">Héllo");
        assert_eq!(m.as_boxed().utf16_len(), 6);
        m.set_string("x");
        assert_eq!(m.len(), 1);
        m.clear();
        assert!(m.is_empty());
    }

    #[test]
    #[should_panic(expected = "not a char boundary")]
    fn insert_inside_char_aborts() {
        let m = MutableString::from("é");
        m.insert(1, "x");
    }

    #[test]
    #[should_panic(expected = "sent to constant string object")]
    fn constant_cannot_be_mutated_through_any_facade() {
        let c = BoxedString::from_static("k");
        let m: MutableString = unsafe { crate::bridge::reinterpret_facade(c) };
        m.append("x");
    }

    #[test]
    #[should_panic(expected = "range 3..1 out of bounds or not char aligned")]
    #[allow(clippy::reversed_empty_ranges)]
    fn reversed_range_aborts() {
        let m = MutableString::from("abcd");
        m.replace_range(3..1, "x");
    }

    #[test]
    fn mutable_view_shares_block() {
        let m = MutableString::from("a");
        let view = m.as_boxed();
        m.append("b");
        assert_eq!(&*view.as_str(), "ab");
        assert!(view.copy().kind() == Kind::Immutable);
        assert!(!view.copy().ptr_eq(&view));
    }
}
