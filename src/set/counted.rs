//! Counted set: a mutable set that tracks how many times each element was
//! added.
//!
//! Multiplicity lives next to the element in the one storage entry, so an
//! element is present exactly when its count is at least one. `add` inserts
//! on the 0 -> 1 transition only, `remove` unlinks on 1 -> 0 only, and
//! removing an absent element does nothing.

use super::{
    block_count_for, block_from_objects, custom_block, empty_block, set_read_api,
    set_write_api, snapshot, SetPrimitives,
};
use crate::bridge::Facade;
use crate::native::{Kind, TypeTag};
use crate::object::{Object, ObjectRepr};
use crate::set::{MutableSet, Set};
use core::fmt;

#[derive(Clone)]
pub struct CountedSet(super::SetBlock);

impl CountedSet {
    pub fn new() -> Self {
        CountedSet(empty_block(Kind::Counted))
    }

    /// Each occurrence in `objects` adds one unit.
    pub fn from_objects<I>(objects: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Object>,
    {
        CountedSet(block_from_objects(
            Kind::Counted,
            objects.into_iter().map(Into::into),
        ))
    }

    /// Counted set backed by a custom implementation, which must override
    /// `add`, `remove` and `count_for`.
    pub fn from_primitives(primitives: impl SetPrimitives + 'static) -> Self {
        CountedSet(custom_block(Kind::Counted, Box::new(primitives)))
    }

    /// Current multiplicity of `object`; 0 when absent.
    pub fn count_for(&self, object: &Object) -> usize {
        block_count_for(&self.0, object)
    }

    /// Sum of every element's multiplicity.
    pub fn total_count(&self) -> usize {
        self.object_enumerator().map(|o| self.count_for(&o)).sum()
    }

    /// Independent counted snapshot with the same multiplicities.
    pub fn copy(&self) -> CountedSet {
        CountedSet(snapshot(&self.0, Kind::Counted))
    }

    pub fn mutable_copy(&self) -> CountedSet {
        self.copy()
    }

    /// Mutable view of the same block. Adds and removes through it keep
    /// counting.
    pub fn as_mutable_set(&self) -> MutableSet {
        MutableSet::from_block(self.0.clone())
    }

    pub fn as_set(&self) -> Set {
        Set::from_block(self.0.clone())
    }
}

impl Default for CountedSet {
    fn default() -> Self {
        CountedSet::new()
    }
}

set_read_api!(CountedSet, |k| k == Kind::Counted);
set_write_api!(CountedSet);

impl<T: Into<Object>> FromIterator<T> for CountedSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        CountedSet::from_objects(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Object {
        Object::from("x")
    }

    #[test]
    fn add_three_remove_three() {
        let c = CountedSet::new();
        for _ in 0..3 {
            c.add("x");
        }
        c.remove(&x());
        assert_eq!(c.count_for(&x()), 2);
        assert!(c.contains(&x()));
        c.remove(&x());
        c.remove(&x());
        assert_eq!(c.count_for(&x()), 0);
        assert!(!c.contains(&x()));
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn removing_absent_is_noop() {
        let c = CountedSet::from_objects(["a"]);
        c.remove(&x());
        c.remove(&x());
        assert_eq!(c.count_for(&x()), 0);
        c.add("x");
        assert_eq!(c.count_for(&x()), 1);
    }

    #[test]
    fn construction_counts_repeats() {
        let c: CountedSet = ["a", "b", "a", "a"].into_iter().collect();
        assert_eq!(c.count(), 2);
        assert_eq!(c.count_for(&Object::from("a")), 3);
        assert_eq!(c.total_count(), 4);
    }

    #[test]
    fn bulk_ops_count_like_single_calls() {
        let c = CountedSet::from_objects(["a", "a", "b"]);
        c.union_in_place(&Set::from_objects(["a", "c"]));
        assert_eq!(c.count_for(&Object::from("a")), 3);
        c.subtract_in_place(&Set::from_objects(["a", "b"]));
        assert_eq!(c.count_for(&Object::from("a")), 2);
        assert!(!c.contains(&Object::from("b")));
        c.intersect_in_place(&Set::from_objects(["c"]));
        assert_eq!(c.count_for(&Object::from("a")), 1);
        assert_eq!(c.count_for(&Object::from("c")), 1);
    }

    #[test]
    fn mutable_view_keeps_counting() {
        let c = CountedSet::new();
        let m = c.as_mutable_set();
        m.add("x");
        m.add("x");
        assert_eq!(c.count_for(&x()), 2);
        assert_eq!(Object::from(&m).class_name(), "CountedSet");
        assert!(Object::from(&c).downcast::<CountedSet>().is_some());
        assert!(Object::from(MutableSet::new()).downcast::<CountedSet>().is_none());
    }

    #[test]
    fn copies_keep_multiplicity_and_are_independent() {
        let c = CountedSet::from_objects(["x", "x"]);
        let copy = c.copy();
        c.add("x");
        assert_eq!(copy.count_for(&x()), 2);
        assert_eq!(c.count_for(&x()), 3);
        let plain = c.as_set().copy();
        assert_eq!(plain.kind(), Kind::Immutable);
        assert_eq!(plain.count(), 1);
        assert_eq!(Object::from(&c).copy().kind(), Some(Kind::Counted));
    }

    /// Custom counted set over a plain list of (element, count) pairs.
    #[derive(Default)]
    struct Tally(Vec<(Object, usize)>);

    impl SetPrimitives for Tally {
        fn class_name(&self) -> &'static str {
            "Tally"
        }
        fn member(&self, object: &Object) -> Option<Object> {
            self.0.iter().find(|(o, _)| o == object).map(|(o, _)| o.clone())
        }
        fn object_enumerator(&self) -> Box<dyn Iterator<Item = Object>> {
            let v: Vec<Object> = self.0.iter().map(|(o, _)| o.clone()).collect();
            Box::new(v.into_iter())
        }
        fn add(&mut self, object: Object) {
            match self.0.iter_mut().find(|(o, _)| *o == object) {
                Some((_, n)) => *n += 1,
                None => self.0.push((object, 1)),
            }
        }
        fn remove(&mut self, object: &Object) {
            if let Some(i) = self.0.iter().position(|(o, _)| o == object) {
                self.0[i].1 -= 1;
                if self.0[i].1 == 0 {
                    self.0.remove(i);
                }
            }
        }
        fn count_for(&self, object: &Object) -> usize {
            self.0.iter().find(|(o, _)| o == object).map_or(0, |(_, n)| *n)
        }
    }

    #[test]
    fn remove_all_clears_custom_multiplicities() {
        let c = CountedSet::from_primitives(Tally::default());
        for _ in 0..3 {
            c.add("x");
        }
        c.add("y");
        assert_eq!(c.total_count(), 4);
        c.remove_all();
        assert_eq!(c.count_for(&x()), 0);
        assert_eq!(c.count(), 0);
        assert_eq!(c.total_count(), 0);
    }

    #[test]
    fn equality_ignores_multiplicity() {
        let c = CountedSet::from_objects(["x", "x", "y"]);
        assert!(c.is_equal(&Set::from_objects(["y", "x"])));
    }
}
