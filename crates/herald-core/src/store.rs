//! The `SubscriptionStore` trait: read access to grants and revocations.
//!
//! The trait is implemented by storage backends (e.g. `herald-store-sqlite`)
//! and by [`crate::memory::MemoryStore`]. Writes are not part of the trait;
//! the resolver never mutates the tables it reads.

use std::{future::Future, sync::Arc};

use uuid::Uuid;

use crate::{
  catalog::Medium,
  query::{GrantQuery, RevocationQuery},
  subscription::{Subscription, Unsubscribe},
};

/// Filtered scans over the `Subscription` and `Unsubscribe` relations.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait SubscriptionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every grant row matching `query`. Duplicate rows are returned as stored.
  fn subscriptions<'a>(
    &'a self,
    query: &'a GrantQuery,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a;

  /// The distinct mediums of the grant rows matching `query`.
  fn subscribed_mediums<'a>(
    &'a self,
    query: &'a GrantQuery,
  ) -> impl Future<Output = Result<Vec<Medium>, Self::Error>> + Send + 'a;

  /// Whether any grant row matches `query`.
  fn grant_exists<'a>(
    &'a self,
    query: &'a GrantQuery,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Every unsubscribe row matching `query`.
  fn unsubscribes<'a>(
    &'a self,
    query: &'a RevocationQuery,
  ) -> impl Future<Output = Result<Vec<Unsubscribe>, Self::Error>> + Send + 'a;

  /// Whether `entity_id` has opted out of exactly this source/medium pair.
  fn is_unsubscribed(
    &self,
    source_id: Uuid,
    medium_id: Uuid,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Forwarding impls ────────────────────────────────────────────────────────

macro_rules! forward_store {
  ($($ty:ty),*) => {$(
    impl<T: SubscriptionStore> SubscriptionStore for $ty {
      type Error = T::Error;

      fn subscriptions<'a>(
        &'a self,
        query: &'a GrantQuery,
      ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a {
        (**self).subscriptions(query)
      }

      fn subscribed_mediums<'a>(
        &'a self,
        query: &'a GrantQuery,
      ) -> impl Future<Output = Result<Vec<Medium>, Self::Error>> + Send + 'a {
        (**self).subscribed_mediums(query)
      }

      fn grant_exists<'a>(
        &'a self,
        query: &'a GrantQuery,
      ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a {
        (**self).grant_exists(query)
      }

      fn unsubscribes<'a>(
        &'a self,
        query: &'a RevocationQuery,
      ) -> impl Future<Output = Result<Vec<Unsubscribe>, Self::Error>> + Send + 'a {
        (**self).unsubscribes(query)
      }

      fn is_unsubscribed(
        &self,
        source_id: Uuid,
        medium_id: Uuid,
        entity_id: Uuid,
      ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_ {
        (**self).is_unsubscribed(source_id, medium_id, entity_id)
      }
    }
  )*};
}

forward_store!(&T, Arc<T>);
