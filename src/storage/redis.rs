//! Redis booking cache
//!
//! Records are stored as JSON under `booking:{user_id}`.

use crate::booking::BookingState;
use crate::error::StorageError;
use crate::storage::{BookingRecord, BookingStore};
use crate::types::UserId;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{info, trace};

/// Redis-backed booking cache
#[derive(Clone)]
pub struct RedisBookingStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisBookingStore {
    /// Connect to Redis at the given URL
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(url).map_err(|e| StorageError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!("Connected to Redis booking cache");

        Ok(Self {
            conn,
            key_prefix: "booking".to_string(),
        })
    }

    /// Use a different key prefix (default `booking`)
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, user_id: &UserId) -> String {
        format!("{}:{}", self.key_prefix, user_id)
    }
}

#[async_trait]
impl BookingStore for RedisBookingStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<BookingRecord>, StorageError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.key(user_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| StorageError::Deserialization(e.to_string()))
        })
        .transpose()
    }

    async fn set(&self, user_id: &UserId, state: BookingState) -> Result<(), StorageError> {
        let json = serde_json::to_string(&BookingRecord::new(state))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        trace!(user_id = %user_id, "Storing booking in Redis");
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.key(user_id), json)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), StorageError> {
        trace!(user_id = %user_id, "Clearing booking in Redis");
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.key(user_id))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}
