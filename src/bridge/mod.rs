//! Bridging layer: facades over shared blocks, and conversions between
//! native Rust values and boxed objects.

pub mod cast;

use crate::data::{BoxedData, MutableData};
use crate::native::{Block, Kind, TypeTag};
use crate::number::{BoxedNumber, Decimal};
use crate::object::Object;
use crate::set::counted::CountedSet;
use crate::set::{MutableSet, Set};
use crate::string::{BoxedString, MutableString};
use std::rc::Rc;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A typed view over one kind of shared block.
///
/// Facades with the same `Payload` are layout compatible: they differ only
/// in which block kinds they accept and which operations they offer.
pub trait Facade: sealed::Sealed + Sized {
    type Payload: 'static;
    const TAG: TypeTag;

    /// Whether this facade may operate on a block of `kind`.
    fn accepts(kind: Kind) -> bool;

    fn block(&self) -> &Rc<Block<Self::Payload>>;

    fn into_block(self) -> Rc<Block<Self::Payload>>;

    /// Wrap a block without checking its kind.
    #[doc(hidden)]
    fn from_block(block: Rc<Block<Self::Payload>>) -> Self;

    /// The block behind `object`, if it carries this facade's payload.
    #[doc(hidden)]
    fn project(object: &Object) -> Option<&Rc<Block<Self::Payload>>>;

    fn as_object(&self) -> Object;

    /// Kind of the underlying block.
    fn kind(&self) -> Kind {
        self.block().kind()
    }

    /// Pointer identity with any facade over the same payload type.
    fn ptr_eq<F: Facade<Payload = Self::Payload>>(&self, other: &F) -> bool {
        Rc::ptr_eq(self.block(), other.block())
    }

    /// Checked view change: succeeds when `To` accepts this block's kind,
    /// otherwise hands the original facade back.
    fn try_cast<To: Facade<Payload = Self::Payload>>(self) -> Result<To, Self> {
        if To::accepts(self.kind()) {
            Ok(To::from_block(self.into_block()))
        } else {
            Err(self)
        }
    }
}

/// View the block behind `obj` through a different facade, without copying.
///
/// # Safety
///
/// This is the unchecked escape hatch for zero-copy interop. Payload layout
/// compatibility is guaranteed by the type bounds; the caller additionally
/// guarantees that the block's kind is one `To` accepts (see
/// [`Facade::accepts`]). Breaking that contract does not corrupt memory,
/// but the first mutating call through the wrong facade aborts the process
/// with a contract-violation panic. Use [`Facade::try_cast`] when the kind
/// is not statically known.
pub unsafe fn reinterpret_facade<From, To>(obj: From) -> To
where
    From: Facade,
    To: Facade<Payload = From::Payload>,
{
    debug_assert!(
        To::TAG == From::TAG,
        "reinterpret between facades of different type families"
    );
    To::from_block(obj.into_block())
}

/// Conversion between a native value and its boxed object form.
pub trait Bridgeable: Sized {
    fn store(self) -> Object;

    /// Unwrap `object` if its dynamic type matches `Self`; never panics.
    fn fetch(object: &Object) -> Option<Self>;
}

/// Box a native value.
pub fn store<V: Bridgeable>(value: V) -> Object {
    value.store()
}

/// Unbox an object back into a native value of type `V`.
pub fn fetch<V: Bridgeable>(object: &Object) -> Option<V> {
    V::fetch(object)
}

macro_rules! bridge_numbers {
    ($($t:ty),*) => {
        $(
            impl Bridgeable for $t {
                fn store(self) -> Object {
                    BoxedNumber::from(self).as_object()
                }
                fn fetch(object: &Object) -> Option<Self> {
                    let block = BoxedNumber::project(object)?;
                    let value = *block.payload();
                    value.exact::<$t>()
                }
            }
        )*
    };
}

bridge_numbers!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, Decimal);

impl Bridgeable for String {
    fn store(self) -> Object {
        BoxedString::new(self).as_object()
    }
    fn fetch(object: &Object) -> Option<Self> {
        BoxedString::project(object).map(|b| b.payload().as_str().to_owned())
    }
}

impl Bridgeable for Vec<u8> {
    fn store(self) -> Object {
        BoxedData::new(self).as_object()
    }
    fn fetch(object: &Object) -> Option<Self> {
        BoxedData::project(object).map(|b| b.payload().as_bytes().to_vec())
    }
}

impl Bridgeable for Object {
    fn store(self) -> Object {
        self
    }
    fn fetch(object: &Object) -> Option<Self> {
        Some(object.clone())
    }
}

macro_rules! bridge_facades {
    ($($t:ty),*) => {
        $(
            impl Bridgeable for $t {
                fn store(self) -> Object {
                    self.as_object()
                }
                fn fetch(object: &Object) -> Option<Self> {
                    object.downcast::<$t>()
                }
            }
        )*
    };
}

bridge_facades!(
    BoxedNumber,
    BoxedString,
    MutableString,
    BoxedData,
    MutableData,
    Set,
    MutableSet,
    CountedSet
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scalars() {
        assert_eq!(fetch::<i8>(&store(-5i8)), Some(-5));
        assert_eq!(fetch::<u64>(&store(u64::MAX)), Some(u64::MAX));
        assert_eq!(fetch::<i64>(&store(i64::MIN)), Some(i64::MIN));
        assert_eq!(fetch::<f32>(&store(0.1f32)), Some(0.1f32));
        assert_eq!(fetch::<f64>(&store(1e300f64)), Some(1e300));
        assert_eq!(fetch::<bool>(&store(true)), Some(true));
        assert_eq!(fetch::<usize>(&store(7usize)), Some(7));
        let d = Decimal::new(314159, -5);
        assert_eq!(fetch::<Decimal>(&store(d)), Some(d));
    }

    #[test]
    fn fetch_of_wrong_type_is_none() {
        let s = store("hello".to_string());
        assert_eq!(fetch::<i32>(&s), None);
        assert_eq!(fetch::<Vec<u8>>(&s), None);
        assert_eq!(fetch::<String>(&s).as_deref(), Some("hello"));
        assert_eq!(fetch::<u8>(&store(300i32)), None);
        assert_eq!(fetch::<String>(&store(1u8)), None);
    }

    #[test]
    fn reinterpret_keeps_identity() {
        let m = MutableString::from("abc");
        let alias = m.clone();
        let view: BoxedString = unsafe { reinterpret_facade(m) };
        assert!(view.ptr_eq(&alias));
        alias.append("d");
        assert_eq!(&*view.as_str(), "abcd");
    }

    #[test]
    fn try_cast_checks_kind() {
        let s = BoxedString::new("fixed");
        let back = match s.try_cast::<MutableString>() {
            Ok(_) => panic!("immutable block must not cast to a mutable facade"),
            Err(s) => s,
        };
        let m = back.mutable_copy();
        let as_view: BoxedString = m.clone().try_cast().ok().expect("mutable is readable");
        assert!(as_view.ptr_eq(&m));
    }

    #[test]
    #[should_panic(expected = "sent to immutable string object")]
    fn reinterpret_to_wrong_kind_aborts_on_mutation() {
        let s = BoxedString::new("fixed");
        let m: MutableString = unsafe { reinterpret_facade(s) };
        m.append("!");
    }
}
