//! The Set class cluster.
//!
//! `Set`, `MutableSet` and `CountedSet` are facades over the same
//! `Block<SetPayload>`. A payload is either native storage (fast path,
//! operated on directly) or a custom [`SetPrimitives`] implementation (slow
//! path, built only from `count`, `member`, `object_enumerator`, `add`,
//! `remove` and `count_for`). Every operation is written once, at block
//! level, and dispatches with a single `match` on the representation.
//!
//! Mutating bulk operations are defined as the sequence of single
//! `add`/`remove` calls they stand for; on a counted block that sequence
//! is what drives the multiplicity bookkeeping.

pub mod counted;

use crate::bridge::Facade;
use crate::native::{Block, Kind, TypeTag};
use crate::object::{Object, ObjectRepr};
use crate::storage::{Handle, SetStorage};
use core::fmt;
use std::rc::Rc;

/// Operations a set implemented outside this crate provides.
///
/// `member` and `object_enumerator` are required. `count` defaults to
/// walking the enumerator. The mutating primitives abort unless
/// overridden; a read-only custom set never needs them.
pub trait SetPrimitives {
    fn class_name(&self) -> &'static str {
        "CustomSet"
    }

    fn count(&self) -> usize {
        self.object_enumerator().count()
    }

    /// The stored element equal to `object`, if any.
    fn member(&self, object: &Object) -> Option<Object>;

    /// Fresh pass over every element, each exactly once.
    fn object_enumerator(&self) -> Box<dyn Iterator<Item = Object>>;

    fn add(&mut self, object: Object) {
        let _ = object;
        must_override(self.class_name(), "add")
    }

    fn remove(&mut self, object: &Object) {
        let _ = object;
        must_override(self.class_name(), "remove")
    }

    fn count_for(&self, object: &Object) -> usize {
        let _ = object;
        must_override(self.class_name(), "count_for")
    }
}

fn must_override(class: &str, op: &str) -> ! {
    crate::contract_violation!("{}::{} must be implemented by subclass", class, op)
}

pub(crate) enum SetRepr {
    /// Element -> multiplicity. Plain sets keep every multiplicity at 1.
    Native(SetStorage<Object, usize>),
    Custom(Box<dyn SetPrimitives>),
}

/// Payload of a set block.
pub struct SetPayload {
    pub(crate) repr: SetRepr,
}

impl fmt::Debug for SetPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            SetRepr::Native(s) => f.debug_set().entries(s.iter().map(|(_, k, _)| k)).finish(),
            SetRepr::Custom(c) => write!(f, "<{}>", c.class_name()),
        }
    }
}

pub(crate) type SetBlock = Rc<Block<SetPayload>>;

fn storage_label(kind: Kind) -> &'static str {
    match kind {
        Kind::Counted => "counted set storage",
        Kind::Mutable => "mutable set storage",
        _ => "set storage",
    }
}

pub(crate) fn native_block(kind: Kind, storage: SetStorage<Object, usize>) -> SetBlock {
    Block::new(
        TypeTag::Set,
        kind,
        SetPayload {
            repr: SetRepr::Native(storage),
        },
    )
}

pub(crate) fn empty_block(kind: Kind) -> SetBlock {
    native_block(kind, SetStorage::new(storage_label(kind)))
}

pub(crate) fn custom_block(kind: Kind, primitives: Box<dyn SetPrimitives>) -> SetBlock {
    Block::new(
        TypeTag::Set,
        kind,
        SetPayload {
            repr: SetRepr::Custom(primitives),
        },
    )
}

/// Build a native block holding `objects`. For counted blocks repeated
/// objects accumulate multiplicity; otherwise duplicates collapse.
pub(crate) fn block_from_objects<I>(kind: Kind, objects: I) -> SetBlock
where
    I: IntoIterator<Item = Object>,
{
    let mut storage = SetStorage::new(storage_label(kind));
    for o in objects {
        insert_unit(&mut storage, kind, o);
    }
    native_block(kind, storage)
}

fn insert_unit(storage: &mut SetStorage<Object, usize>, kind: Kind, object: Object) {
    if let Err(occupied) = storage.insert(object, 1) {
        if kind == Kind::Counted {
            if let Some(n) = storage.value_mut(occupied.0) {
                *n += 1;
            }
        }
    }
}

pub(crate) fn class_name(block: &SetBlock) -> &'static str {
    match &block.payload().repr {
        SetRepr::Custom(c) => c.class_name(),
        SetRepr::Native(_) => match block.kind() {
            Kind::Mutable => "MutableSet",
            Kind::Counted => "CountedSet",
            _ => "Set",
        },
    }
}

pub(crate) fn block_count(block: &SetBlock) -> usize {
    match &block.payload().repr {
        SetRepr::Native(s) => s.len(),
        SetRepr::Custom(c) => c.count(),
    }
}

pub(crate) fn block_member(block: &SetBlock, object: &Object) -> Option<Object> {
    match &block.payload().repr {
        SetRepr::Native(s) => s.find(object).and_then(|h| s.key(h).cloned()),
        SetRepr::Custom(c) => c.member(object),
    }
}

pub(crate) fn block_enumerator(block: &SetBlock) -> ObjectEnumerator {
    let source = match &block.payload().repr {
        SetRepr::Native(s) => Source::Native {
            block: block.clone(),
            handles: s.handles().into_iter(),
        },
        SetRepr::Custom(c) => Source::Custom(c.object_enumerator()),
    };
    ObjectEnumerator { source }
}

pub(crate) fn block_count_for(block: &SetBlock, object: &Object) -> usize {
    match &block.payload().repr {
        SetRepr::Native(s) => s
            .find(object)
            .and_then(|h| s.value(h).copied())
            .unwrap_or(0),
        SetRepr::Custom(c) => c.count_for(object),
    }
}

/// Add one unit of `object`.
pub(crate) fn block_add(block: &SetBlock, object: Object) {
    let kind = block.kind();
    let mut payload = block.payload_mut("add");
    match &mut payload.repr {
        SetRepr::Native(s) => insert_unit(s, kind, object),
        SetRepr::Custom(c) => c.add(object),
    }
}

/// Remove one unit of `object`; absent objects are ignored.
pub(crate) fn block_remove(block: &SetBlock, object: &Object) {
    let removed = {
        let mut payload = block.payload_mut("remove");
        let kind = block.kind();
        match &mut payload.repr {
            SetRepr::Native(s) => {
                let handle = s.find(object);
                match handle {
                    Some(h) if kind == Kind::Counted => match s.value_mut(h) {
                        Some(n) if *n > 1 => {
                            *n -= 1;
                            None
                        }
                        _ => s.remove(h),
                    },
                    Some(h) => s.remove(h),
                    None => None,
                }
            }
            SetRepr::Custom(c) => {
                c.remove(object);
                None
            }
        }
    };
    // Release the element only after the payload borrow has ended.
    drop(removed);
}

pub(crate) fn block_remove_all(block: &SetBlock) {
    let taken = {
        let mut payload = block.payload_mut("remove_all");
        match &mut payload.repr {
            SetRepr::Native(s) => Ok(core::mem::replace(
                s,
                SetStorage::new(storage_label(block.kind())),
            )),
            SetRepr::Custom(c) => Err(c.object_enumerator().collect::<Vec<_>>()),
        }
    };
    match taken {
        Ok(old) => drop(old),
        Err(objects) => {
            let counted = block.kind() == Kind::Counted;
            for o in &objects {
                // `remove` takes one unit; a counted element goes at zero.
                let units = if counted { block_count_for(block, o) } else { 1 };
                for _ in 0..units {
                    block_remove(block, o);
                }
            }
        }
    }
}

/// Snapshot of the elements, taken before any mutation starts.
pub(crate) fn block_objects(block: &SetBlock) -> Vec<Object> {
    block_enumerator(block).collect()
}

pub(crate) fn blocks_equal(a: &SetBlock, b: &SetBlock) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    if block_count(a) != block_count(b) {
        return false;
    }
    block_enumerator(a).all(|o| block_member(b, &o).is_some())
}

pub(crate) fn block_is_subset(a: &SetBlock, b: &SetBlock) -> bool {
    if block_count(a) > block_count(b) {
        return false;
    }
    block_enumerator(a).all(|o| block_member(b, &o).is_some())
}

pub(crate) fn block_intersects(a: &SetBlock, b: &SetBlock) -> bool {
    block_enumerator(a).any(|o| block_member(b, &o).is_some())
}

/// Storage copy for a native block, multiplicities kept only when the
/// target kind is counted.
fn snapshot(block: &SetBlock, target: Kind) -> SetBlock {
    let cloned = match &block.payload().repr {
        SetRepr::Native(s) => {
            let mut copy = s.clone();
            if target != Kind::Counted {
                for h in copy.handles() {
                    if let Some(n) = copy.value_mut(h) {
                        *n = 1;
                    }
                }
            }
            Some(copy)
        }
        SetRepr::Custom(_) => None,
    };
    match cloned {
        Some(storage) => native_block(target, storage),
        None if target == Kind::Counted && block.kind() == Kind::Counted => {
            let mut storage = SetStorage::new(storage_label(target));
            for o in block_objects(block) {
                let n = block_count_for(block, &o);
                if n > 0 {
                    let _ = storage.insert(o, n);
                }
            }
            native_block(target, storage)
        }
        None => block_from_objects(target, block_objects(block)),
    }
}

pub(crate) fn fmt_block(block: &SetBlock, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match block.try_payload() {
        Some(p) => fmt::Debug::fmt(&*p, f),
        None => f.write_str("{<borrowed>}"),
    }
}

enum Source {
    Native {
        block: SetBlock,
        handles: std::vec::IntoIter<Handle>,
    },
    Custom(Box<dyn Iterator<Item = Object>>),
}

/// Lazy, single pass over a set's elements in unspecified order.
///
/// Native sets snapshot entry handles when the enumerator is created and
/// resolve them one at a time, so elements removed mid-pass are skipped.
/// Request a new enumerator for a second pass.
pub struct ObjectEnumerator {
    source: Source,
}

impl Iterator for ObjectEnumerator {
    type Item = Object;

    fn next(&mut self) -> Option<Object> {
        match &mut self.source {
            Source::Native { block, handles } => {
                let payload = block.payload();
                let SetRepr::Native(s) = &payload.repr else {
                    return None;
                };
                handles.find_map(|h| s.key(h).cloned())
            }
            Source::Custom(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.source {
            Source::Native { handles, .. } => (0, Some(handles.len())),
            Source::Custom(it) => it.size_hint(),
        }
    }
}

/// Read-only operations every set facade offers. Expects `Object`,
/// `ObjectRepr`, `Facade`, `Kind`, `TypeTag`, `Set` and `fmt` in scope.
macro_rules! set_read_api {
    ($t:ident, $accepts:expr) => {
        impl $t {
            /// Number of distinct elements.
            pub fn count(&self) -> usize {
                $crate::set::block_count(&self.0)
            }

            pub fn is_empty(&self) -> bool {
                self.count() == 0
            }

            /// The stored element equal to `object`.
            pub fn member(&self, object: &Object) -> Option<Object> {
                $crate::set::block_member(&self.0, object)
            }

            pub fn contains(&self, object: &Object) -> bool {
                self.member(object).is_some()
            }

            pub fn object_enumerator(&self) -> $crate::set::ObjectEnumerator {
                $crate::set::block_enumerator(&self.0)
            }

            pub fn all_objects(&self) -> Vec<Object> {
                $crate::set::block_objects(&self.0)
            }

            pub fn any_object(&self) -> Option<Object> {
                self.object_enumerator().next()
            }

            /// Same cardinality and every element of `self` is a member of
            /// `other`.
            pub fn is_equal<F: Facade<Payload = $crate::set::SetPayload>>(&self, other: &F) -> bool {
                $crate::set::blocks_equal(&self.0, other.block())
            }

            pub fn is_subset<F: Facade<Payload = $crate::set::SetPayload>>(&self, other: &F) -> bool {
                $crate::set::block_is_subset(&self.0, other.block())
            }

            pub fn intersects<F: Facade<Payload = $crate::set::SetPayload>>(&self, other: &F) -> bool {
                $crate::set::block_intersects(&self.0, other.block())
            }

            /// New immutable set with the elements that pass `keep`.
            pub fn filtered(&self, mut keep: impl FnMut(&Object) -> bool) -> Set {
                let objects = self.object_enumerator().filter(|o| keep(o));
                Set::from_objects(objects)
            }

            /// New immutable set with `object` added.
            pub fn set_by_adding(&self, object: impl Into<Object>) -> Set {
                Set::from_objects(self.object_enumerator().chain(Some(object.into())))
            }

            pub fn retain_count(&self) -> usize {
                $crate::native::retain_count(&self.0)
            }
        }

        impl $crate::bridge::sealed::Sealed for $t {}

        impl Facade for $t {
            type Payload = $crate::set::SetPayload;
            const TAG: TypeTag = TypeTag::Set;

            fn accepts(kind: Kind) -> bool {
                let f: fn(Kind) -> bool = $accepts;
                f(kind)
            }

            fn block(&self) -> &$crate::set::SetBlock {
                &self.0
            }

            fn into_block(self) -> $crate::set::SetBlock {
                self.0
            }

            fn from_block(block: $crate::set::SetBlock) -> Self {
                $t(block)
            }

            fn project(object: &Object) -> Option<&$crate::set::SetBlock> {
                match &object.0 {
                    ObjectRepr::Set(b) => Some(b),
                    _ => None,
                }
            }

            fn as_object(&self) -> Object {
                Object(ObjectRepr::Set(self.0.clone()))
            }
        }

        impl PartialEq for $t {
            fn eq(&self, other: &Self) -> bool {
                $crate::set::blocks_equal(&self.0, &other.0)
            }
        }

        impl Eq for $t {}

        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                $crate::set::fmt_block(&self.0, f)
            }
        }

        impl IntoIterator for &$t {
            type Item = Object;
            type IntoIter = $crate::set::ObjectEnumerator;

            fn into_iter(self) -> Self::IntoIter {
                self.object_enumerator()
            }
        }
    };
}
pub(crate) use set_read_api;

/// Mutating operations shared by `MutableSet` and `CountedSet`.
macro_rules! set_write_api {
    ($t:ident) => {
        impl $t {
            /// Add one unit of `object`.
            pub fn add(&self, object: impl Into<Object>) {
                $crate::set::block_add(&self.0, object.into());
            }

            /// Remove one unit of `object`. Absent objects are ignored.
            pub fn remove(&self, object: &Object) {
                $crate::set::block_remove(&self.0, object);
            }

            pub fn add_objects<I>(&self, objects: I)
            where
                I: IntoIterator,
                I::Item: Into<Object>,
            {
                for o in objects {
                    self.add(o);
                }
            }

            /// `add` every element of `other` once.
            pub fn union_in_place<F: Facade<Payload = $crate::set::SetPayload>>(&self, other: &F) {
                for o in $crate::set::block_objects(other.block()) {
                    self.add(o);
                }
            }

            /// `remove` every element of `self` that `other` lacks.
            pub fn intersect_in_place<F: Facade<Payload = $crate::set::SetPayload>>(&self, other: &F) {
                for o in $crate::set::block_objects(&self.0) {
                    if $crate::set::block_member(other.block(), &o).is_none() {
                        self.remove(&o);
                    }
                }
            }

            /// `remove` every element of `other` once.
            pub fn subtract_in_place<F: Facade<Payload = $crate::set::SetPayload>>(&self, other: &F) {
                for o in $crate::set::block_objects(other.block()) {
                    self.remove(&o);
                }
            }

            pub fn remove_all(&self) {
                $crate::set::block_remove_all(&self.0);
            }

            /// Empty the set, then `add` each of `objects`.
            pub fn replace_contents<I>(&self, objects: I)
            where
                I: IntoIterator,
                I::Item: Into<Object>,
            {
                self.remove_all();
                self.add_objects(objects);
            }

            /// `remove` each element for which `keep` is false.
            pub fn filter_in_place(&self, mut keep: impl FnMut(&Object) -> bool) {
                for o in $crate::set::block_objects(&self.0) {
                    if !keep(&o) {
                        self.remove(&o);
                    }
                }
            }
        }

        impl<T: Into<Object>> Extend<T> for $t {
            fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
                self.add_objects(iter);
            }
        }
    };
}
pub(crate) use set_write_api;

/// Immutable view of any set block.
#[derive(Clone)]
pub struct Set(SetBlock);

impl Set {
    pub fn new() -> Self {
        Set(empty_block(Kind::Immutable))
    }

    pub fn from_objects<I>(objects: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Object>,
    {
        Set(block_from_objects(
            Kind::Immutable,
            objects.into_iter().map(Into::into),
        ))
    }

    /// Immutable set backed by a custom implementation.
    pub fn from_primitives(primitives: impl SetPrimitives + 'static) -> Self {
        Set(custom_block(Kind::Immutable, Box::new(primitives)))
    }

    /// A native immutable set returns itself. Anything else (a mutable or
    /// counted block, or a custom implementation) is snapshotted into a new
    /// native immutable set.
    pub fn copy(&self) -> Set {
        let native_immutable = self.0.kind() == Kind::Immutable
            && matches!(self.0.payload().repr, SetRepr::Native(_));
        if native_immutable {
            self.clone()
        } else {
            Set(snapshot(&self.0, Kind::Immutable))
        }
    }

    pub fn mutable_copy(&self) -> MutableSet {
        MutableSet(snapshot(&self.0, Kind::Mutable))
    }
}

impl Default for Set {
    fn default() -> Self {
        Set::new()
    }
}

set_read_api!(Set, |_| true);

impl<T: Into<Object>> FromIterator<T> for Set {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Set::from_objects(iter)
    }
}

/// Mutable view; accepts mutable and counted blocks.
#[derive(Clone)]
pub struct MutableSet(SetBlock);

impl MutableSet {
    pub fn new() -> Self {
        MutableSet(empty_block(Kind::Mutable))
    }

    pub fn from_objects<I>(objects: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Object>,
    {
        MutableSet(block_from_objects(
            Kind::Mutable,
            objects.into_iter().map(Into::into),
        ))
    }

    /// Mutable set backed by a custom implementation, which must override
    /// `add` and `remove`.
    pub fn from_primitives(primitives: impl SetPrimitives + 'static) -> Self {
        MutableSet(custom_block(Kind::Mutable, Box::new(primitives)))
    }

    /// Independent immutable snapshot.
    pub fn copy(&self) -> Set {
        Set(snapshot(&self.0, Kind::Immutable))
    }

    pub fn mutable_copy(&self) -> MutableSet {
        MutableSet(snapshot(&self.0, Kind::Mutable))
    }

    /// Read-only view of the same block.
    pub fn as_set(&self) -> Set {
        Set(self.0.clone())
    }
}

impl Default for MutableSet {
    fn default() -> Self {
        MutableSet::new()
    }
}

set_read_api!(MutableSet, |k| k == Kind::Mutable || k == Kind::Counted);
set_write_api!(MutableSet);

impl<T: Into<Object>> FromIterator<T> for MutableSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        MutableSet::from_objects(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeSet;

    fn o(s: &'static str) -> Object {
        Object::from(s)
    }

    /// Read-only custom set over a fixed list of strings.
    struct Fixed(Vec<&'static str>);

    impl SetPrimitives for Fixed {
        fn class_name(&self) -> &'static str {
            "Fixed"
        }
        fn member(&self, object: &Object) -> Option<Object> {
            self.0.iter().map(|s| Object::from(*s)).find(|x| x == object)
        }
        fn object_enumerator(&self) -> Box<dyn Iterator<Item = Object>> {
            let v: Vec<Object> = self.0.iter().map(|s| Object::from(*s)).collect();
            Box::new(v.into_iter())
        }
    }

    /// Mutable custom set that logs every primitive call.
    struct Logged {
        items: Vec<Object>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl SetPrimitives for Logged {
        fn member(&self, object: &Object) -> Option<Object> {
            self.items.iter().find(|x| *x == object).cloned()
        }
        fn object_enumerator(&self) -> Box<dyn Iterator<Item = Object>> {
            Box::new(self.items.clone().into_iter())
        }
        fn add(&mut self, object: Object) {
            self.log.borrow_mut().push(format!("add {:?}", object));
            if !self.items.contains(&object) {
                self.items.push(object);
            }
        }
        fn remove(&mut self, object: &Object) {
            self.log.borrow_mut().push(format!("remove {:?}", object));
            self.items.retain(|x| x != object);
        }
    }

    #[test]
    fn immutable_copy_is_identity() {
        let s = Set::from_objects(["a", "b"]);
        assert!(s.copy().ptr_eq(&s));
    }

    #[test]
    fn mutable_copy_is_independent_snapshot() {
        let m = MutableSet::from_objects(["a"]);
        let snap = m.copy();
        assert!(!snap.ptr_eq(&m));
        m.add("b");
        assert_eq!(snap.count(), 1);
        assert_eq!(m.count(), 2);
        assert_eq!(snap.kind(), Kind::Immutable);
    }

    #[test]
    fn mutable_copy_always_allocates() {
        let s = Set::from_objects(["a"]);
        let m = s.mutable_copy();
        m.add("b");
        assert_eq!(s.count(), 1);
        let m2 = m.mutable_copy();
        m2.remove(&o("a"));
        assert!(m.contains(&o("a")));
    }

    #[test]
    fn member_returns_stored_instance() {
        let stored = Object::from("k".to_string());
        let s = Set::from_objects([stored.clone()]);
        let found = s.member(&o("k")).unwrap();
        assert!(found.ptr_eq(&stored));
        assert!(s.member(&o("missing")).is_none());
    }

    #[test]
    fn duplicates_collapse() {
        let s = Set::from_objects(["a", "a", "b"]);
        assert_eq!(s.count(), 2);
    }

    #[test]
    fn equality_ignores_order_and_facade() {
        let a = Set::from_objects(["x", "y", "z"]);
        let b = MutableSet::from_objects(["z", "x"]);
        assert!(!a.is_equal(&b));
        b.add("y");
        assert!(a.is_equal(&b));
        assert!(b.is_equal(&a));
        assert_eq!(Object::from(&a), Object::from(&b));
    }

    #[test]
    fn enumerator_is_single_pass_and_skips_removed() {
        let m = MutableSet::from_objects(["a", "b", "c"]);
        let mut e = m.object_enumerator();
        let first = e.next().unwrap();
        for x in ["a", "b", "c"] {
            if o(x) != first {
                m.remove(&o(x));
            }
        }
        assert_eq!(e.next(), None);
        assert_eq!(e.next(), None);
        assert_eq!(m.object_enumerator().count(), 1);
    }

    #[test]
    fn bulk_operations() {
        let m = MutableSet::from_objects(["a", "b", "c"]);
        m.intersect_in_place(&Set::from_objects(["b", "c", "d"]));
        m.union_in_place(&Set::from_objects(["e"]));
        m.subtract_in_place(&Set::from_objects(["c"]));
        let names: BTreeSet<String> = m
            .all_objects()
            .iter()
            .map(|x| crate::fetch::<String>(x).unwrap())
            .collect();
        assert_eq!(names, ["b", "e"].iter().map(|s| s.to_string()).collect());
        m.replace_contents(["q"]);
        assert_eq!(m.count(), 1);
        m.filter_in_place(|_| false);
        assert!(m.is_empty());
    }

    #[test]
    fn subset_and_intersects() {
        let small = Set::from_objects(["a"]);
        let big = Set::from_objects(["a", "b"]);
        assert!(small.is_subset(&big));
        assert!(!big.is_subset(&small));
        assert!(small.intersects(&big));
        assert!(!small.intersects(&Set::new()));
        assert_eq!(big.filtered(|x| *x == o("b")).count(), 1);
        assert_eq!(small.set_by_adding("c").count(), 2);
    }

    #[test]
    fn custom_read_only_set_uses_slow_path() {
        let s = Set::from_primitives(Fixed(vec!["a", "b"]));
        assert_eq!(s.count(), 2);
        assert!(s.contains(&o("a")));
        assert_eq!(Object::from(&s).class_name(), "Fixed");
        assert!(s.is_equal(&Set::from_objects(["b", "a"])));
        let c = s.copy();
        assert!(!c.ptr_eq(&s));
        assert_eq!(Object::from(&c).class_name(), "Set");
        assert_eq!(c.count(), 2);
    }

    #[test]
    #[should_panic(expected = "Fixed::add must be implemented by subclass")]
    fn custom_set_without_add_aborts() {
        let m = MutableSet::from_primitives(Fixed(vec!["a"]));
        m.add("b");
    }

    #[test]
    #[should_panic(expected = "sent to immutable set object")]
    fn mutating_immutable_block_aborts() {
        let s = Set::from_objects(["a"]);
        let m: MutableSet = unsafe { crate::bridge::reinterpret_facade(s) };
        m.add("b");
    }

    #[test]
    fn bulk_ops_route_through_custom_primitives() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let m = MutableSet::from_primitives(Logged {
            items: vec![o("a"), o("b")],
            log: log.clone(),
        });
        m.union_in_place(&Set::from_objects(["c"]));
        m.subtract_in_place(&Set::from_objects(["a"]));
        assert_eq!(*log.borrow(), vec!["add \"c\"", "remove \"a\""]);
        assert_eq!(m.count(), 2);
        m.remove_all();
        assert!(m.is_empty());
    }

    #[test]
    fn sets_nest_as_objects() {
        let inner = Set::from_objects(["a"]);
        let outer = Set::from_objects([Object::from(&inner), Object::from("a")]);
        assert_eq!(outer.count(), 2);
        assert!(outer.contains(&Object::from(Set::from_objects(["a"]))));
    }
}
