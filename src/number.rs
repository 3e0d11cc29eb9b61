//! Boxed numbers.
//!
//! A `BoxedNumber` remembers the native type it was created from
//! (`NumberKind`) but compares and hashes by numeric value, so `1u8`,
//! `1i64`, `1.0f64` and `true` are equal objects. Accessors (`i8_value`,
//! `u16_value`, ...) convert with the same truncation a primitive `as` cast
//! performs; `exact` only succeeds when no information is lost.

use crate::bridge::{sealed, Facade};
use crate::native::{self, Block, Kind, TypeTag};
use crate::object::{Object, ObjectRepr};
use core::cell::RefCell;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;
use std::collections::HashMap;
use std::rc::Rc;

/// Native type a number was boxed from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NumberKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Decimal,
}

/// Base-10 decimal with up to 38 significant digits:
/// `mantissa * 10^exponent`, kept normalized (no trailing zero digits in
/// the mantissa unless the exponent is already `i32::MAX`).
#[derive(Copy, Clone, Debug)]
pub struct Decimal {
    mantissa: i128,
    exponent: i32,
}

const NAN_EXPONENT: i32 = i32::MIN;
const DIGITS: i32 = 38;

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        exponent: 0,
    };
    pub const NAN: Decimal = Decimal {
        mantissa: 0,
        exponent: NAN_EXPONENT,
    };

    /// `mantissa * 10^exponent`. The exponent `i32::MIN` is reserved for
    /// NaN: a nonzero mantissa that still needs it after dropping trailing
    /// zeros yields [`Decimal::NAN`]. Use [`Decimal::checked_new`] to
    /// reject that case instead.
    pub fn new(mantissa: i128, exponent: i32) -> Self {
        Decimal::checked_new(mantissa, exponent).unwrap_or(Decimal::NAN)
    }

    /// Like [`Decimal::new`], but `None` when the value is not representable.
    pub fn checked_new(mantissa: i128, exponent: i32) -> Option<Self> {
        if mantissa == 0 {
            return Some(Decimal::ZERO);
        }
        let (mut mantissa, mut exponent) = (mantissa, exponent);
        // Trailing zeros that would push the exponent past i32::MAX stay in
        // the mantissa.
        while mantissa % 10 == 0 {
            match exponent.checked_add(1) {
                Some(e) => {
                    mantissa /= 10;
                    exponent = e;
                }
                None => break,
            }
        }
        (exponent != NAN_EXPONENT).then_some(Decimal { mantissa, exponent })
    }

    pub fn from_i128(v: i128) -> Self {
        Decimal::new(v, 0)
    }

    /// Shortest decimal that round-trips `v`. Non-finite input maps to
    /// [`Decimal::NAN`].
    pub fn from_f64(v: f64) -> Self {
        if !v.is_finite() {
            return Decimal::NAN;
        }
        format!("{}", v).parse().unwrap_or(Decimal::NAN)
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_nan(&self) -> bool {
        self.exponent == NAN_EXPONENT
    }

    /// Exact integer value, if this decimal has no fractional part and fits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.is_nan() {
            return None;
        }
        if self.exponent < 0 {
            // normalized, so any negative exponent means a fraction
            return None;
        }
        let scale = 10i128.checked_pow(self.exponent as u32)?;
        self.mantissa.checked_mul(scale)
    }

    pub fn to_f64(&self) -> f64 {
        if self.is_nan() {
            return f64::NAN;
        }
        format!("{}e{}", self.mantissa, self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal::ZERO
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan())
            || (self.mantissa == other.mantissa && self.exponent == other.exponent)
    }
}

impl Eq for Decimal {}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mantissa.hash(state);
        self.exponent.hash(state);
    }
}

/// Error from parsing a [`Decimal`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParseDecimalError;

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid decimal literal")
    }
}

impl std::error::Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    /// Accepts `[+-]digits[.digits][e[+-]digits]`. Digits beyond the 38
    /// the mantissa holds are dropped (integer part scales the exponent).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (number, exp_part) = match body.find(['e', 'E']) {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };
        let (int_part, frac_part) = match number.find('.') {
            Some(i) => (&number[..i], &number[i + 1..]),
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError);
        }
        let mut mantissa: i128 = 0;
        let mut exponent: i32 = 0;
        let mut saturated = false;
        for c in int_part.chars() {
            let d = c.to_digit(10).ok_or(ParseDecimalError)? as i128;
            if !saturated {
                match mantissa.checked_mul(10).and_then(|m| m.checked_add(d)) {
                    Some(m) => {
                        mantissa = m;
                        continue;
                    }
                    None => saturated = true,
                }
            }
            exponent = exponent.checked_add(1).ok_or(ParseDecimalError)?;
        }
        for c in frac_part.chars() {
            let d = c.to_digit(10).ok_or(ParseDecimalError)? as i128;
            if saturated {
                continue;
            }
            match mantissa.checked_mul(10).and_then(|m| m.checked_add(d)) {
                Some(m) => {
                    mantissa = m;
                    exponent -= 1;
                }
                None => saturated = true,
            }
        }
        if let Some(e) = exp_part {
            let e: i32 = e.parse().map_err(|_| ParseDecimalError)?;
            exponent = exponent.checked_add(e).ok_or(ParseDecimalError)?;
        }
        if negative {
            mantissa = -mantissa;
        }
        Decimal::checked_new(mantissa, exponent).ok_or(ParseDecimalError)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return f.write_str("NaN");
        }
        // Past the 38 digits the mantissa can hold, plain notation only pads.
        if !(-2 * DIGITS..=DIGITS).contains(&self.exponent) {
            return write!(f, "{}e{}", self.mantissa, self.exponent);
        }
        if self.exponent >= 0 {
            write!(f, "{}", self.mantissa)?;
            for _ in 0..self.exponent {
                f.write_str("0")?;
            }
            return Ok(());
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let frac = (-self.exponent) as usize;
        if self.mantissa < 0 {
            f.write_str("-")?;
        }
        if digits.len() > frac {
            let (i, r) = digits.split_at(digits.len() - frac);
            write!(f, "{}.{}", i, r)
        } else {
            write!(f, "0.{}{}", "0".repeat(frac - digits.len()), digits)
        }
    }
}

/// Payload of a number block.
#[derive(Copy, Clone, Debug)]
pub enum NumberValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Isize(isize),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Usize(usize),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
}

/// Widest lossless rendering of a number, used for comparison and for the
/// truncating accessors.
#[derive(Copy, Clone, Debug)]
enum Wide {
    Int(i128),
    Float(f64),
}

macro_rules! truncating_accessors {
    ($($name:ident -> $t:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $name(&self) -> $t {
                match self.wide() {
                    Wide::Int(v) => v as $t,
                    Wide::Float(f) => f as $t,
                }
            }
        )*
    };
}

impl NumberValue {
    pub fn kind(&self) -> NumberKind {
        match self {
            NumberValue::Bool(_) => NumberKind::Bool,
            NumberValue::I8(_) => NumberKind::I8,
            NumberValue::I16(_) => NumberKind::I16,
            NumberValue::I32(_) => NumberKind::I32,
            NumberValue::I64(_) => NumberKind::I64,
            NumberValue::Isize(_) => NumberKind::Isize,
            NumberValue::U8(_) => NumberKind::U8,
            NumberValue::U16(_) => NumberKind::U16,
            NumberValue::U32(_) => NumberKind::U32,
            NumberValue::U64(_) => NumberKind::U64,
            NumberValue::Usize(_) => NumberKind::Usize,
            NumberValue::F32(_) => NumberKind::F32,
            NumberValue::F64(_) => NumberKind::F64,
            NumberValue::Decimal(_) => NumberKind::Decimal,
        }
    }

    fn wide(&self) -> Wide {
        match *self {
            NumberValue::Bool(b) => Wide::Int(b as i128),
            NumberValue::I8(v) => Wide::Int(v as i128),
            NumberValue::I16(v) => Wide::Int(v as i128),
            NumberValue::I32(v) => Wide::Int(v as i128),
            NumberValue::I64(v) => Wide::Int(v as i128),
            NumberValue::Isize(v) => Wide::Int(v as i128),
            NumberValue::U8(v) => Wide::Int(v as i128),
            NumberValue::U16(v) => Wide::Int(v as i128),
            NumberValue::U32(v) => Wide::Int(v as i128),
            NumberValue::U64(v) => Wide::Int(v as i128),
            NumberValue::Usize(v) => Wide::Int(v as i128),
            NumberValue::F32(v) => Wide::Float(v as f64),
            NumberValue::F64(v) => Wide::Float(v),
            NumberValue::Decimal(d) => match d.to_i128() {
                Some(i) => Wide::Int(i),
                None => Wide::Float(d.to_f64()),
            },
        }
    }

    /// Integral value, when the number has no fractional part.
    pub fn integral(&self) -> Option<i128> {
        match self.wide() {
            Wide::Int(v) => Some(v),
            Wide::Float(f) => float_integral(f),
        }
    }

    truncating_accessors! {
        i8_value -> i8,
        i16_value -> i16,
        i32_value -> i32,
        i64_value -> i64,
        isize_value -> isize,
        u8_value -> u8,
        u16_value -> u16,
        u32_value -> u32,
        u64_value -> u64,
        usize_value -> usize,
        f32_value -> f32,
        f64_value -> f64,
    }

    pub fn bool_value(&self) -> bool {
        match self.wide() {
            Wide::Int(v) => v != 0,
            Wide::Float(f) => f != 0.0,
        }
    }

    pub fn decimal_value(&self) -> Decimal {
        match *self {
            NumberValue::Decimal(d) => d,
            _ => match self.wide() {
                Wide::Int(v) => Decimal::from_i128(v),
                Wide::Float(f) => Decimal::from_f64(f),
            },
        }
    }

    /// Lossless conversion to `T`, or `None` if `T` cannot hold the value.
    pub fn exact<T: ExactNumber>(&self) -> Option<T> {
        T::exact_from(self)
    }
}

// 2^127; every integral float in [-2^127, 2^127) converts to i128 exactly.
const I128_FLOAT_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

fn float_integral(f: f64) -> Option<i128> {
    (f.is_finite() && f.fract() == 0.0 && (-I128_FLOAT_BOUND..I128_FLOAT_BOUND).contains(&f))
        .then(|| f as i128)
}

/// Integers and floats are equal only when the float is that exact
/// integer; no side is rounded toward the other.
impl PartialEq for NumberValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.wide(), other.wide()) {
            (Wide::Int(a), Wide::Int(b)) => a == b,
            (Wide::Int(v), Wide::Float(f)) | (Wide::Float(f), Wide::Int(v)) => {
                float_integral(f) == Some(v)
            }
            (Wide::Float(a), Wide::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
        }
    }
}

impl Eq for NumberValue {}

// Hashes the same canonical value equality compares: the exact integer
// when there is one, otherwise the float bits (one bit pattern for NaN).
impl Hash for NumberValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.wide() {
            Wide::Int(v) => v.hash(state),
            Wide::Float(f) => match float_integral(f) {
                Some(v) => v.hash(state),
                None if f.is_nan() => f64::NAN.to_bits().hash(state),
                None => f.to_bits().hash(state),
            },
        }
    }
}

/// Native numeric types a [`NumberValue`] converts to without loss.
pub trait ExactNumber: Sized {
    fn exact_from(value: &NumberValue) -> Option<Self>;
}

macro_rules! exact_int {
    ($($t:ty),*) => {
        $(
            impl ExactNumber for $t {
                fn exact_from(value: &NumberValue) -> Option<Self> {
                    value.integral().and_then(|v| <$t>::try_from(v).ok())
                }
            }
        )*
    };
}

exact_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ExactNumber for f64 {
    fn exact_from(value: &NumberValue) -> Option<Self> {
        match value.wide() {
            Wide::Int(v) => {
                let f = v as f64;
                (f as i128 == v).then_some(f)
            }
            Wide::Float(f) => Some(f),
        }
    }
}

impl ExactNumber for f32 {
    fn exact_from(value: &NumberValue) -> Option<Self> {
        match value.wide() {
            Wide::Int(v) => {
                let f = v as f32;
                (f as i128 == v).then_some(f)
            }
            Wide::Float(f) => {
                let g = f as f32;
                (g as f64 == f || f.is_nan()).then_some(g)
            }
        }
    }
}

impl ExactNumber for bool {
    fn exact_from(value: &NumberValue) -> Option<Self> {
        match value.integral() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        }
    }
}

impl ExactNumber for Decimal {
    fn exact_from(value: &NumberValue) -> Option<Self> {
        let d = value.decimal_value();
        match value {
            NumberValue::Decimal(_) => Some(d),
            _ if d.is_nan() => None,
            _ => (d.to_f64() == value.f64_value() || value.integral().is_some()).then_some(d),
        }
    }
}

impl fmt::Display for NumberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberValue::Bool(b) => write!(f, "{}", *b as u8),
            NumberValue::I8(v) => write!(f, "{}", v),
            NumberValue::I16(v) => write!(f, "{}", v),
            NumberValue::I32(v) => write!(f, "{}", v),
            NumberValue::I64(v) => write!(f, "{}", v),
            NumberValue::Isize(v) => write!(f, "{}", v),
            NumberValue::U8(v) => write!(f, "{}", v),
            NumberValue::U16(v) => write!(f, "{}", v),
            NumberValue::U32(v) => write!(f, "{}", v),
            NumberValue::U64(v) => write!(f, "{}", v),
            NumberValue::Usize(v) => write!(f, "{}", v),
            NumberValue::F32(v) => write!(f, "{}", v),
            NumberValue::F64(v) => write!(f, "{}", v),
            NumberValue::Decimal(d) => write!(f, "{}", d),
        }
    }
}

// Small integers and booleans are boxed once per thread and shared.
const CACHE_MIN: i128 = -128;
const CACHE_MAX: i128 = 1023;

thread_local! {
    static BOOLS: [Rc<Block<NumberValue>>; 2] = [
        Block::new(TypeTag::Number, Kind::Immutable, NumberValue::Bool(false)),
        Block::new(TypeTag::Number, Kind::Immutable, NumberValue::Bool(true)),
    ];
    static SMALL_INTS: RefCell<HashMap<(NumberKind, i128), Rc<Block<NumberValue>>>> =
        RefCell::new(HashMap::new());
}

fn is_integer_kind(kind: NumberKind) -> bool {
    !matches!(
        kind,
        NumberKind::Bool | NumberKind::F32 | NumberKind::F64 | NumberKind::Decimal
    )
}

/// Immutable boxed number facade.
#[derive(Clone)]
pub struct BoxedNumber(Rc<Block<NumberValue>>);

impl BoxedNumber {
    pub fn new(value: NumberValue) -> Self {
        if let NumberValue::Bool(b) = value {
            return BoxedNumber(BOOLS.with(|c| c[b as usize].clone()));
        }
        let kind = value.kind();
        if is_integer_kind(kind) {
            if let Some(v) = value.integral() {
                if (CACHE_MIN..=CACHE_MAX).contains(&v) {
                    let block = SMALL_INTS.with(|cache| {
                        cache
                            .borrow_mut()
                            .entry((kind, v))
                            .or_insert_with(|| Block::new(TypeTag::Number, Kind::Immutable, value))
                            .clone()
                    });
                    return BoxedNumber(block);
                }
            }
        }
        BoxedNumber(Block::new(TypeTag::Number, Kind::Immutable, value))
    }

    pub fn value(&self) -> NumberValue {
        *self.0.payload()
    }

    pub fn kind(&self) -> NumberKind {
        self.value().kind()
    }

    pub fn i8_value(&self) -> i8 {
        self.value().i8_value()
    }
    pub fn i16_value(&self) -> i16 {
        self.value().i16_value()
    }
    pub fn i32_value(&self) -> i32 {
        self.value().i32_value()
    }
    pub fn i64_value(&self) -> i64 {
        self.value().i64_value()
    }
    pub fn isize_value(&self) -> isize {
        self.value().isize_value()
    }
    pub fn u8_value(&self) -> u8 {
        self.value().u8_value()
    }
    pub fn u16_value(&self) -> u16 {
        self.value().u16_value()
    }
    pub fn u32_value(&self) -> u32 {
        self.value().u32_value()
    }
    pub fn u64_value(&self) -> u64 {
        self.value().u64_value()
    }
    pub fn usize_value(&self) -> usize {
        self.value().usize_value()
    }
    pub fn f32_value(&self) -> f32 {
        self.value().f32_value()
    }
    pub fn f64_value(&self) -> f64 {
        self.value().f64_value()
    }
    pub fn bool_value(&self) -> bool {
        self.value().bool_value()
    }
    pub fn decimal_value(&self) -> Decimal {
        self.value().decimal_value()
    }

    /// Numbers are immutable; a copy is the same object.
    pub fn copy(&self) -> BoxedNumber {
        self.clone()
    }
}

impl sealed::Sealed for BoxedNumber {}

impl Facade for BoxedNumber {
    type Payload = NumberValue;
    const TAG: TypeTag = TypeTag::Number;

    fn accepts(kind: Kind) -> bool {
        kind == Kind::Immutable
    }

    fn block(&self) -> &Rc<Block<NumberValue>> {
        &self.0
    }

    fn into_block(self) -> Rc<Block<NumberValue>> {
        self.0
    }

    fn from_block(block: Rc<Block<NumberValue>>) -> Self {
        BoxedNumber(block)
    }

    fn project(object: &Object) -> Option<&Rc<Block<NumberValue>>> {
        match &object.0 {
            ObjectRepr::Number(b) => Some(b),
            _ => None,
        }
    }

    fn as_object(&self) -> Object {
        Object(ObjectRepr::Number(self.0.clone()))
    }
}

impl PartialEq for BoxedNumber {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.value() == other.value()
    }
}

impl Eq for BoxedNumber {}

impl Hash for BoxedNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value().hash(state)
    }
}

impl fmt::Debug for BoxedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:#x}", self.value(), native::address(&self.0))
    }
}

impl fmt::Display for BoxedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

macro_rules! number_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for BoxedNumber {
                fn from(v: $t) -> Self {
                    BoxedNumber::new(NumberValue::$variant(v))
                }
            }
            impl From<$t> for NumberValue {
                fn from(v: $t) -> Self {
                    NumberValue::$variant(v)
                }
            }
        )*
    };
}

number_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_truncate_like_casts() {
        let n = BoxedNumber::from(300i16);
        assert_eq!(n.u8_value(), 300i16 as u8);
        assert_eq!(n.i8_value(), 300i16 as i8);
        assert_eq!(n.f32_value(), 300.0);
        assert!(n.bool_value());
        let f = BoxedNumber::from(-2.75f64);
        assert_eq!(f.i32_value(), -2);
        assert_eq!(f.u8_value(), (-2.75f64) as u8);
    }

    #[test]
    fn exact_rejects_lossy_conversions() {
        let v = NumberValue::I16(300);
        assert_eq!(v.exact::<u8>(), None);
        assert_eq!(v.exact::<u16>(), Some(300));
        assert_eq!(NumberValue::F64(1.5).exact::<i32>(), None);
        assert_eq!(NumberValue::F64(2.0).exact::<i32>(), Some(2));
        assert_eq!(NumberValue::F64(0.1).exact::<f32>(), None);
        assert_eq!(NumberValue::I32(1).exact::<bool>(), Some(true));
        assert_eq!(NumberValue::I32(2).exact::<bool>(), None);
    }

    #[test]
    fn equality_crosses_kinds() {
        assert_eq!(BoxedNumber::from(1u8), BoxedNumber::from(1.0f64));
        assert_eq!(BoxedNumber::from(true), BoxedNumber::from(1i64));
        assert_ne!(BoxedNumber::from(1.5f32), BoxedNumber::from(1i32));
        assert_eq!(
            BoxedNumber::from(Decimal::new(25, -1)),
            BoxedNumber::from(2.5f64)
        );
    }

    #[test]
    fn small_values_are_shared() {
        let a = BoxedNumber::from(7i32);
        let b = BoxedNumber::from(7i32);
        assert!(Rc::ptr_eq(a.block(), b.block()));
        let t1 = BoxedNumber::from(true);
        let t2 = BoxedNumber::from(true);
        assert!(Rc::ptr_eq(t1.block(), t2.block()));
        let big1 = BoxedNumber::from(1_000_000i64);
        let big2 = BoxedNumber::from(1_000_000i64);
        assert!(!Rc::ptr_eq(big1.block(), big2.block()));
        // cached per kind, so the declared type survives
        assert_eq!(BoxedNumber::from(7u8).kind(), NumberKind::U8);
    }

    #[test]
    fn decimal_parse_and_display() {
        let d: Decimal = "-12.500".parse().unwrap();
        assert_eq!(d.mantissa(), -125);
        assert_eq!(d.exponent(), -1);
        assert_eq!(d.to_string(), "-12.5");
        assert_eq!("0.05".parse::<Decimal>().unwrap().to_string(), "0.05");
        assert_eq!("3e2".parse::<Decimal>().unwrap().to_i128(), Some(300));
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!(Decimal::from_f64(f64::INFINITY).is_nan());
        assert_eq!(Decimal::from_f64(0.1).to_f64(), 0.1);
    }

    #[test]
    fn hash_matches_equality_across_kinds() {
        use std::collections::hash_map::DefaultHasher;
        let h = |v: NumberValue| {
            let mut s = DefaultHasher::new();
            v.hash(&mut s);
            s.finish()
        };
        assert_eq!(h(NumberValue::U64(42)), h(NumberValue::F32(42.0)));
        assert_eq!(h(NumberValue::Bool(false)), h(NumberValue::F64(-0.0)));
        assert_eq!(h(NumberValue::F64(f64::NAN)), h(NumberValue::F64(-f64::NAN)));
    }

    #[test]
    fn large_integers_compare_exactly_with_floats() {
        let two_63 = 1u64 << 63;
        let a = NumberValue::U64(two_63 + 1);
        let b = NumberValue::F64(two_63 as f64);
        let c = NumberValue::U64(two_63);
        assert_ne!(a, b);
        assert_eq!(b, c);
        assert_ne!(a, c);
        assert_ne!(NumberValue::I64(i64::MAX), NumberValue::F64(i64::MAX as f64));
        assert_ne!(NumberValue::U64(1), NumberValue::F64(1.5));
        assert_ne!(NumberValue::I32(0), NumberValue::F64(f64::NAN));
        assert_ne!(NumberValue::U64(u64::MAX), NumberValue::F64(f64::INFINITY));
    }

    #[test]
    fn decimal_exponent_limits() {
        let d: Decimal = "10e2147483647".parse().unwrap();
        assert_eq!((d.mantissa(), d.exponent()), (10, i32::MAX));
        assert_eq!(d, Decimal::new(100, i32::MAX - 1));
        assert_eq!(d.to_string(), "10e2147483647");
        assert_eq!(d.to_i128(), None);

        assert!("1e2147483648".parse::<Decimal>().is_err());
        assert!("1e-2147483648".parse::<Decimal>().is_err());
        let tiny: Decimal = "10e-2147483648".parse().unwrap();
        assert_eq!((tiny.mantissa(), tiny.exponent()), (1, i32::MIN + 1));
        assert!(!tiny.is_nan());

        assert!(Decimal::new(7, i32::MIN).is_nan());
        assert_eq!(Decimal::checked_new(7, i32::MIN), None);
        assert_eq!(Decimal::new(70, i32::MIN).exponent(), i32::MIN + 1);
        assert_eq!(Decimal::new(0, i32::MIN), Decimal::ZERO);
        assert_eq!(Decimal::new(5, 40).to_string(), "5e40");
    }
}
