//! Client-side session state: event ordering and view instance caching.

mod cache;
mod sync;

pub use cache::{CachedInstance, Disposable, InstanceCache};
pub use sync::{
    ClientSessionMeta, ClientSync, SessionUpdate, Subscription, SubscriptionId, forward_events,
};
