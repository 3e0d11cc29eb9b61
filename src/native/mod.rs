//! Native handle layer: type-tagged, reference-counted blocks.
//!
//! Every boxed value lives in exactly one [`Block`]: a fixed header
//! (`TypeTag`, `Kind`) followed by a payload behind a runtime-checked cell.
//! Facades (`BoxedString`, `MutableString`, `Set`, `MutableSet`, ...) are
//! thin wrappers around an `Rc<Block<P>>`, so any number of them may alias
//! one allocation. The header is fixed at allocation time; the facade only
//! decides which operations are offered, and [`Block::payload_mut`] is the
//! single gate every mutation passes through.

pub mod endpoint;

use core::cell::{Ref, RefCell, RefMut};
use core::fmt;
use std::rc::Rc;

/// Payload family of a block.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeTag {
    String,
    Data,
    Number,
    Set,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeTag::String => "string",
            TypeTag::Data => "data",
            TypeTag::Number => "number",
            TypeTag::Set => "set",
        })
    }
}

/// Concrete class of a block inside its family.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    /// Contents fixed at creation.
    Immutable,
    /// Contents may change through a mutable facade.
    Mutable,
    /// Counted-set storage; mutable, with per-element multiplicity.
    Counted,
    /// Backed by `'static` data; never mutated, owns no heap payload.
    Constant,
}

impl Kind {
    pub fn is_mutable(self) -> bool {
        matches!(self, Kind::Mutable | Kind::Counted)
    }
}

/// Fixed block header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub tag: TypeTag,
    pub kind: Kind,
}

pub struct Block<P> {
    header: Header,
    payload: RefCell<P>,
}

impl<P> Block<P> {
    pub fn new(tag: TypeTag, kind: Kind, payload: P) -> Rc<Self> {
        Rc::new(Block {
            header: Header { tag, kind },
            payload: RefCell::new(payload),
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn kind(&self) -> Kind {
        self.header.kind
    }

    pub fn tag(&self) -> TypeTag {
        self.header.tag
    }

    /// Shared view of the payload.
    ///
    /// Panics if a mutation of the same block is in progress, which can only
    /// happen when an element callback re-enters its own container.
    pub fn payload(&self) -> Ref<'_, P> {
        match self.payload.try_borrow() {
            Ok(r) => r,
            Err(_) => crate::contract_violation!(
                "{} block read while it is being mutated",
                self.header.tag
            ),
        }
    }

    /// Shared view unless a mutation is in progress. For diagnostics.
    pub fn try_payload(&self) -> Option<Ref<'_, P>> {
        self.payload.try_borrow().ok()
    }

    /// Exclusive view of the payload for the mutating operation `op`.
    ///
    /// This is the concrete-mutable-kind guard: immutable and constant
    /// blocks abort here no matter which facade the call came through.
    pub fn payload_mut(&self, op: &'static str) -> RefMut<'_, P> {
        match self.header.kind {
            Kind::Mutable | Kind::Counted => {}
            Kind::Immutable => crate::contract_violation!(
                "mutating method `{}` sent to immutable {} object",
                op,
                self.header.tag
            ),
            Kind::Constant => crate::contract_violation!(
                "mutating method `{}` sent to constant {} object",
                op,
                self.header.tag
            ),
        }
        match self.payload.try_borrow_mut() {
            Ok(r) => r,
            Err(_) => crate::contract_violation!(
                "{} block mutated by `{}` while it is borrowed",
                self.header.tag,
                op
            ),
        }
    }
}

/// Number of live references to a block.
pub fn retain_count<P>(block: &Rc<Block<P>>) -> usize {
    Rc::strong_count(block)
}

/// Stable address of a block, used as object identity.
pub fn address<P>(block: &Rc<Block<P>>) -> usize {
    Rc::as_ptr(block) as *const () as usize
}

impl<P: fmt::Debug> fmt::Debug for Block<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Block");
        d.field("tag", &self.header.tag).field("kind", &self.header.kind);
        match self.payload.try_borrow() {
            Ok(p) => d.field("payload", &*p),
            Err(_) => d.field("payload", &"<borrowed>"),
        };
        d.finish()
    }
}
