//! Observable models built on `strand-primitives`.
//!
//! [`ObservableList`] and [`ObservableSet`] are master collections;
//! [`FilteredSortedModel`] keeps a filtered, sorted view of any
//! [`ObservableCollection`](strand_primitives::ObservableCollection) in sync
//! with it, together with a [`Selection`](strand_primitives::Selection).
//! [`PropertyModel`] holds a single value; [`FuncStreamValueModel`] computes
//! one from a stream of functions on a dispatcher.

pub mod filtered;
mod func;
mod list;
mod property;
mod set;

pub use filtered::{FilteredSortedModel, ModelBuilder};
pub use func::{FuncStreamValueModel, ValueFn, evaluation_dispatcher};
pub use list::ObservableList;
pub use property::PropertyModel;
pub use set::ObservableSet;
