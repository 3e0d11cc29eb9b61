//! tollfree: a toll-free bridged object model with class-cluster sets,
//! advisory locks and run-loop driven streams.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let one allocation be viewed through several typed facades
//!   (immutable, mutable, counted, constant) without copies, and build the
//!   collection, locking and stream layers consumers need on top of it.
//! - Layers:
//!   - `native`: type-tagged, reference-counted `Block`s. The header
//!     (`TypeTag`, `Kind`) is fixed at allocation; `Block::payload_mut` is
//!     the concrete-mutable-kind guard every mutation passes through.
//!   - `storage`: `SetStorage`, the handle-indexed unique-key container
//!     shared by `Set`, `MutableSet` and `CountedSet`; includes a
//!     debug-only reentrancy guard.
//!   - `bridge`: the `Facade` trait, the unchecked `reinterpret_facade`
//!     escape hatch, `store`/`fetch`, and `platform_consistent_cast`.
//!   - `object`: the `Object` root (identity, value equality, hashing,
//!     copy/mutable-copy dispatch) and `ObjectProtocol` for custom objects.
//!   - `string`, `data`, `number`: boxed value facades.
//!   - `set`: the class cluster. Native blocks take the fast path on
//!     storage; `SetPrimitives` implementations take the slow path built
//!     only from `count`/`member`/`object_enumerator`/`add`/`remove`.
//!   - `sync`: `Lock`, `RecursiveLock`, `Condition`, `ConditionLock` with
//!     absolute-deadline waits and timed-lock emulation.
//!   - `stream`: the `Stream` state machine, native-backed input/output
//!     streams, the delegate context registry and a cooperative `RunLoop`.
//!
//! Constraints
//! - Objects, facades and sets are single-threaded (`Rc`, `!Send`); callers
//!   serialize access externally.
//! - Locks and streams are `Send + Sync`. The delegate registry is the one
//!   process-wide mutable table and has its own lock.
//! - Expected absence is `Option`, timeouts are `bool`, stream I/O failure is
//!   a sentinel return plus `stream_error()`. Nothing in the public surface
//!   returns `Err` for those cases.
//! - Contract violations (mutating through an immutable or constant block,
//!   unlocking from the wrong thread, calling a primitive a custom set did
//!   not implement) abort through `contract_violation!`, which logs via
//!   `tracing::error!` before panicking.
//!
//! Constants
//! - `ConstantString` and static data are non-owning handles over
//!   `'static` memory. Boxing one yields a `Kind::Constant` block whose
//!   payload owns nothing, so there is no teardown to reject; mutation is
//!   rejected by the kind guard.
//!
//! Hashing
//! - Set entries store the hash computed at insert. Element `Hash` (which
//!   may run custom object code) is never re-run on growth.

#[doc(hidden)]
macro_rules! contract_violation {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        tracing::error!(target: "tollfree::contract", %message, "contract violation");
        panic!("{}", message)
    }};
}
pub(crate) use contract_violation;

pub mod bridge;
pub mod data;
pub mod error;
pub mod native;
pub mod number;
pub mod object;
mod reentrancy;
pub mod set;
pub mod storage;
pub mod stream;
pub mod string;
pub mod sync;

// Public surface
pub use bridge::cast::{box_any, platform_consistent_cast, platform_consistent_cast_any, ConsistentCast};
pub use bridge::{fetch, reinterpret_facade, store, Bridgeable, Facade};
pub use data::{BoxedData, MutableData};
pub use error::StreamError;
pub use native::{Kind, TypeTag};
pub use number::{BoxedNumber, Decimal, NumberKind, NumberValue};
pub use object::{Object, ObjectProtocol};
pub use set::counted::CountedSet;
pub use set::{MutableSet, ObjectEnumerator, Set, SetPrimitives};
pub use stream::native::{NativeInputStream, NativeOutputStream};
pub use stream::run_loop::{RunLoop, RunLoopMode};
pub use stream::{
    AnyStream, BufferRef, InputStream, OutputStream, PropertyKey, PropertyValue, Stream,
    StreamDelegate, StreamEvent, StreamStatus,
};
pub use string::{BoxedString, ConstantString, MutableString};
pub use sync::condition::Condition;
pub use sync::condition_lock::ConditionLock;
pub use sync::{Lock, Locking, RecursiveLock, TimedLockStrategy};
