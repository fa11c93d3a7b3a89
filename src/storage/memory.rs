//! In-memory booking cache
//!
//! This module provides a thread-safe, in-memory implementation of the
//! BookingStore trait using a HashMap protected by an async RwLock.

use crate::booking::BookingState;
use crate::error::StorageError;
use crate::storage::{BookingRecord, BookingStore};
use crate::types::UserId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// In-memory booking cache
///
/// Suitable for development, testing, and single-instance deployments.
/// Records do not survive a restart.
///
/// # Examples
///
/// ```
/// use metrobot::{BookingState, InMemoryBookingStore, UserId};
/// use metrobot::storage::BookingStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryBookingStore::new();
///     let user = UserId::new("whatsapp:+15550001111");
///
///     store.set(&user, BookingState::new()).await?;
///     assert!(store.get(&user).await?.is_some());
///
///     store.clear(&user).await?;
///     assert!(store.get(&user).await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryBookingStore {
    records: Arc<RwLock<HashMap<UserId, BookingRecord>>>,
}

impl InMemoryBookingStore {
    /// Create a new in-memory booking cache
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of records currently stored
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Remove every record
    pub async fn clear_all(&self) {
        self.records.write().await.clear();
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<BookingRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(user_id).cloned())
    }

    async fn set(&self, user_id: &UserId, state: BookingState) -> Result<(), StorageError> {
        trace!(user_id = %user_id, "Storing booking");
        let mut records = self.records.write().await;
        records.insert(user_id.clone(), BookingRecord::new(state));
        Ok(())
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), StorageError> {
        trace!(user_id = %user_id, "Clearing booking");
        let mut records = self.records.write().await;
        records.remove(user_id);
        Ok(())
    }
}
