//! Booking cache backends
//!
//! This module provides trait-based abstraction for the per-user booking
//! cache, allowing different backend implementations (in-memory, Redis).
//! Each user has at most one record.
//!
//! The in-memory backend is the default. It loses every pending booking when
//! the process restarts; set a Redis URL (with the `redis-storage` feature)
//! for bookings that survive a restart.

use crate::booking::BookingState;
use crate::error::StorageError;
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub mod memory;

#[cfg(feature = "redis-storage")]
pub mod redis;

/// Persisted booking with the time it was last written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub state: BookingState,
    pub updated_at: DateTime<Utc>,
}

impl BookingRecord {
    /// Wrap a state, stamped with the current time
    pub fn new(state: BookingState) -> Self {
        Self {
            state,
            updated_at: Utc::now(),
        }
    }
}

/// Trait for booking cache backends
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Get the booking record for a user
    ///
    /// # Returns
    ///
    /// The record if one exists, None if not, or a storage error
    async fn get(&self, user_id: &UserId) -> Result<Option<BookingRecord>, StorageError>;

    /// Create or replace the booking record for a user
    ///
    /// # Arguments
    ///
    /// * `user_id` - Cache key
    /// * `state` - Booking state to store; the write time is recorded alongside
    async fn set(&self, user_id: &UserId, state: BookingState) -> Result<(), StorageError>;

    /// Remove the booking record for a user
    ///
    /// Clearing a user without a record is not an error.
    async fn clear(&self, user_id: &UserId) -> Result<(), StorageError>;

    /// Get just the booking state for a user
    async fn get_state(&self, user_id: &UserId) -> Result<Option<BookingState>, StorageError> {
        Ok(self.get(user_id).await?.map(|record| record.state))
    }
}

/// Open the booking cache for a configured Redis URL
///
/// # Arguments
///
/// * `redis_url` - Redis connection URL, or None for the in-memory cache
///
/// # Returns
///
/// The Redis store when a URL is given and the `redis-storage` feature is
/// enabled, otherwise an in-memory store. Falling back to memory is logged
/// as a warning since bookings will not survive a restart.
pub async fn connect(redis_url: Option<&str>) -> Result<Arc<dyn BookingStore>, StorageError> {
    match redis_url {
        #[cfg(feature = "redis-storage")]
        Some(url) => {
            tracing::info!("Using Redis booking store");
            Ok(Arc::new(redis::RedisBookingStore::connect(url).await?))
        }
        #[cfg(not(feature = "redis-storage"))]
        Some(_) => {
            warn!(
                "METROBOT_REDIS_URL is set but the redis-storage feature is disabled; \
                 bookings are kept in memory and will not survive a restart"
            );
            Ok(Arc::new(memory::InMemoryBookingStore::new()))
        }
        None => {
            warn!("No Redis URL configured; bookings are kept in memory and will not survive a restart");
            Ok(Arc::new(memory::InMemoryBookingStore::new()))
        }
    }
}
