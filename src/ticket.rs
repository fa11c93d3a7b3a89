//! Ticket rendering and hosting
//!
//! Tickets are QR codes rendered to PNG. WhatsApp media has to be fetched by
//! URL, so rendered images are kept in a [`MediaStore`] that the HTTP server
//! exposes under `/media/{ticket_id}.png`.

use crate::error::RenderError;
use crate::types::TicketId;
use async_trait::async_trait;
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Trait for ticket renderers
#[async_trait]
pub trait TicketRenderer: Send + Sync {
    /// Render a ticket payload into image bytes
    async fn render(&self, payload: &str) -> Result<Vec<u8>, RenderError>;

    /// MIME type of the rendered bytes
    fn content_type(&self) -> &'static str {
        "image/png"
    }
}

/// Renders payloads as black-on-white QR code PNGs
#[derive(Debug, Clone, Copy)]
pub struct QrTicketRenderer {
    min_size: u32,
}

impl QrTicketRenderer {
    /// Create a renderer producing images at least `min_size` pixels wide
    pub fn new(min_size: u32) -> Self {
        Self { min_size }
    }

    fn render_blocking(payload: &str, min_size: u32) -> Result<Vec<u8>, RenderError> {
        let code = QrCode::new(payload.as_bytes())
            .map_err(|e| RenderError::Encoding(e.to_string()))?;

        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(min_size, min_size)
            .build();

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RenderError::Image(e.to_string()))?;

        Ok(bytes)
    }
}

impl Default for QrTicketRenderer {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl TicketRenderer for QrTicketRenderer {
    async fn render(&self, payload: &str) -> Result<Vec<u8>, RenderError> {
        let payload = payload.to_string();
        let min_size = self.min_size;

        let bytes = tokio::task::spawn_blocking(move || Self::render_blocking(&payload, min_size))
            .await
            .map_err(|e| RenderError::Image(format!("render task failed: {}", e)))??;

        debug!(size = bytes.len(), "Ticket rendered");
        Ok(bytes)
    }
}

/// Stored ticket image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct MediaInner {
    items: HashMap<TicketId, StoredMedia>,
    order: VecDeque<TicketId>,
}

/// Bounded in-memory store of rendered tickets
///
/// Once `capacity` tickets are held, the oldest is evicted.
#[derive(Debug, Clone)]
pub struct MediaStore {
    inner: Arc<RwLock<MediaInner>>,
    capacity: usize,
}

impl MediaStore {
    /// Create a store holding at most `capacity` tickets
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MediaInner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Store a rendered ticket
    pub async fn put(&self, ticket_id: TicketId, media: StoredMedia) {
        let mut inner = self.inner.write().await;

        if inner.items.insert(ticket_id, media).is_none() {
            inner.order.push_back(ticket_id);
        }

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                trace!(ticket_id = %oldest, "Evicting ticket media");
                inner.items.remove(&oldest);
            }
        }
    }

    /// Fetch a rendered ticket
    pub async fn get(&self, ticket_id: &TicketId) -> Option<StoredMedia> {
        self.inner.read().await.items.get(ticket_id).cloned()
    }

    /// Number of tickets held
    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new(1024)
    }
}
