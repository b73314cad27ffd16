//! Core reactive primitives: notifiers, observation and selection.

/// Listener failure type shared by everything that fires notifications.
pub mod error;
/// Owner liveness tokens for auto-expiring subscriptions.
pub mod lifetime;
/// Multi-listener event dispatch.
pub mod notifier;
/// Property and collection change notifications.
pub mod observable;
/// Index selection with anchor and structural remapping.
pub mod selection;

pub use error::{BoxError, ListenerError, Result};
pub use lifetime::{Lifetime, LifetimeWatch};
pub use notifier::{Notifier, Subscription, SubscriptionId};
pub use observable::{
	ItemChanged, ItemInserted, ItemRemoved, Membership, Observable, ObservableCollection, Observe, PropertyChanged,
};
pub use selection::{Selection, SelectionRemap, SelectionState, SelectionStyle};
