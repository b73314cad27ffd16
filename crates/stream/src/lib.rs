//! Lazy, push-based value streams.
//!
//! A [`Stream`] caches its latest value and broadcasts every new one.
//! Derived streams ([`Stream::map`], [`Stream::filter`], [`Stream::concat`],
//! [`Stream::combine_latest`], [`Stream::sample`]) stay disconnected from
//! their upstream until they gain a subscriber; while disconnected their
//! [`Stream::current`] is computed from the upstream on demand.
//! [`Stream::debounce`] is the exception and connects at construction.
//! [`ValueChangeStream`] groups a stream's changes into begin/change/end
//! transactions for consumers such as [`ValueChangeReactor`].

mod change;
mod combinators;
mod debounce;
mod property;
mod sample;
mod stream;

pub use change::{ReactorTask, ValueChange, ValueChangeKind, ValueChangeReactor, ValueChangeStream};
pub use debounce::default_dispatcher;
pub use stream::{Stream, ValueStream};
