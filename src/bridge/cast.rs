//! Platform-consistent casting.
//!
//! A plain [`fetch`](super::fetch) only succeeds when the dynamic type
//! matches exactly. The consistent cast additionally converts between
//! numeric representations the same way on every platform: any boxed
//! number casts to any numeric or boolean type through its truncating
//! accessor, and any native numeric value can be boxed first.

use super::{fetch, Bridgeable, Facade};
use crate::number::{BoxedNumber, Decimal};
use crate::object::Object;
use core::any::Any;

/// Target types of [`platform_consistent_cast`].
pub trait ConsistentCast: Bridgeable + Clone + 'static {
    /// Conversion applied when a direct fetch fails and the source is a
    /// boxed number. `None` for targets numbers never convert to.
    fn from_number(number: &BoxedNumber) -> Option<Self>;
}

macro_rules! consistent_numbers {
    ($($t:ty => $accessor:ident),* $(,)?) => {
        $(
            impl ConsistentCast for $t {
                fn from_number(number: &BoxedNumber) -> Option<Self> {
                    Some(number.$accessor())
                }
            }
        )*
    };
}

consistent_numbers!(
    i8 => i8_value,
    i16 => i16_value,
    i32 => i32_value,
    i64 => i64_value,
    isize => isize_value,
    u8 => u8_value,
    u16 => u16_value,
    u32 => u32_value,
    u64 => u64_value,
    usize => usize_value,
    f32 => f32_value,
    f64 => f64_value,
    bool => bool_value,
    Decimal => decimal_value,
);

impl ConsistentCast for BoxedNumber {
    fn from_number(number: &BoxedNumber) -> Option<Self> {
        Some(number.clone())
    }
}

impl ConsistentCast for Object {
    fn from_number(number: &BoxedNumber) -> Option<Self> {
        Some(number.as_object())
    }
}

macro_rules! consistent_non_numbers {
    ($($t:ty),*) => {
        $(
            impl ConsistentCast for $t {
                fn from_number(_: &BoxedNumber) -> Option<Self> {
                    None
                }
            }
        )*
    };
}

consistent_non_numbers!(
    String,
    Vec<u8>,
    crate::string::BoxedString,
    crate::string::MutableString,
    crate::data::BoxedData,
    crate::data::MutableData,
    crate::set::Set,
    crate::set::MutableSet,
    crate::set::counted::CountedSet
);

/// Cast a boxed object to `T`: direct fetch first, then the numeric
/// conversion table.
pub fn platform_consistent_cast<T: ConsistentCast>(object: &Object) -> Option<T> {
    if let Some(v) = fetch::<T>(object) {
        return Some(v);
    }
    let number = object.downcast::<BoxedNumber>()?;
    T::from_number(&number)
}

/// Cast an untyped native value to `T`.
///
/// A value that already is a `T` is cloned. An `Object` goes through
/// [`platform_consistent_cast`]. A native numeric or boolean value is boxed
/// with [`box_any`] and then converted.
pub fn platform_consistent_cast_any<T: ConsistentCast>(value: &dyn Any) -> Option<T> {
    if let Some(v) = value.downcast_ref::<T>() {
        return Some(v.clone());
    }
    if let Some(object) = value.downcast_ref::<Object>() {
        return platform_consistent_cast(object);
    }
    let number = box_any(value)?;
    T::from_number(&number)
}

/// Box a native numeric or boolean value held behind `&dyn Any`.
pub fn box_any(value: &dyn Any) -> Option<BoxedNumber> {
    macro_rules! try_box {
        ($($t:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$t>() {
                    return Some(BoxedNumber::from(*v));
                }
            )*
        };
    }
    try_box!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, Decimal);
    value.downcast_ref::<BoxedNumber>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::store;

    #[test]
    fn direct_fetch_wins() {
        assert_eq!(platform_consistent_cast::<u8>(&store(7u8)), Some(7));
        assert_eq!(
            platform_consistent_cast::<String>(&store("s".to_string())).as_deref(),
            Some("s")
        );
    }

    #[test]
    fn numbers_truncate_across_types() {
        assert_eq!(platform_consistent_cast::<u8>(&store(300i32)), Some(44));
        assert_eq!(platform_consistent_cast::<i32>(&store(2.9f64)), Some(2));
        assert_eq!(platform_consistent_cast::<i8>(&store(-1.5f32)), Some(-1));
        assert_eq!(platform_consistent_cast::<bool>(&store(2u64)), Some(true));
        assert_eq!(platform_consistent_cast::<f64>(&store(true)), Some(1.0));
    }

    #[test]
    fn non_numbers_do_not_convert() {
        assert_eq!(platform_consistent_cast::<String>(&store(1i32)), None);
        assert_eq!(platform_consistent_cast::<i32>(&store("1".to_string())), None);
    }

    #[test]
    fn any_values_box_then_cast() {
        let v: Box<dyn Any> = Box::new(65_537u32);
        assert_eq!(platform_consistent_cast_any::<u16>(v.as_ref()), Some(1));
        let b = platform_consistent_cast_any::<BoxedNumber>(&3.5f64).unwrap();
        assert_eq!(b.f64_value(), 3.5);
        let o = store(9i64);
        assert_eq!(platform_consistent_cast_any::<i8>(&o), Some(9));
        assert!(box_any(&"nope").is_none());
        assert_eq!(platform_consistent_cast_any::<i32>(&()), None);
    }
}
