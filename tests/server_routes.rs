//! HTTP route tests
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use metrobot::engine::HELP;
use metrobot::server::{create_router, AppState, EMPTY_TWIML};
use metrobot::storage::BookingStore;
use metrobot::{
    BookingRecord, BookingState, InMemoryBookingStore, Intent, MediaStore, MessagingTransport,
    NluError, NluGateway, NluResult, OutboundMessage, PaymentError, PaymentGateway,
    StorageError, StoredMedia, TicketId, TransportError, UserId, WebhookHandler,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

struct HelpNlu;

#[async_trait]
impl NluGateway for HelpNlu {
    async fn classify(&self, text: &str) -> Result<NluResult, NluError> {
        Ok(NluResult::new(text, Intent::new(HELP, 0.99)))
    }
}

struct NoPayment;

#[async_trait]
impl PaymentGateway for NoPayment {
    async fn charge(&self) -> Result<bool, PaymentError> {
        Ok(false)
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(UserId, OutboundMessage)>>,
}

#[async_trait]
impl MessagingTransport for Outbox {
    async fn send(&self, to: &UserId, message: OutboundMessage) -> Result<(), TransportError> {
        self.sent.lock().await.push((to.clone(), message));
        Ok(())
    }
}

struct BrokenStore;

#[async_trait]
impl BookingStore for BrokenStore {
    async fn get(&self, _user_id: &UserId) -> Result<Option<BookingRecord>, StorageError> {
        Err(StorageError::Connection("refused".to_string()))
    }

    async fn set(&self, _user_id: &UserId, _state: BookingState) -> Result<(), StorageError> {
        Err(StorageError::Connection("refused".to_string()))
    }

    async fn clear(&self, _user_id: &UserId) -> Result<(), StorageError> {
        Err(StorageError::Connection("refused".to_string()))
    }
}

fn app_with(store: Arc<dyn BookingStore>, outbox: Arc<Outbox>, media: MediaStore) -> axum::Router {
    let handler = WebhookHandler::builder()
        .nlu(Arc::new(HelpNlu))
        .payment(Arc::new(NoPayment))
        .transport(outbox)
        .store(store)
        .media(media)
        .build()
        .unwrap();

    create_router(AppState::new(Arc::new(handler)))
}

fn app() -> axum::Router {
    app_with(
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(Outbox::default()),
        MediaStore::default(),
    )
}

fn webhook(form: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/whatsapp")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app().oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "Metro ticket bot is running");
}

#[tokio::test]
async fn test_webhook_replies_with_empty_twiml() {
    let outbox = Arc::new(Outbox::default());
    let app = app_with(
        Arc::new(InMemoryBookingStore::new()),
        outbox.clone(),
        MediaStore::default(),
    );

    let response = app
        .oneshot(webhook(
            "SmsMessageSid=SM1&From=whatsapp%3A%2B15550001111&Body=help&NumMedia=0",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/xml"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, EMPTY_TWIML.as_bytes());

    let sent = outbox.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.as_str(), "whatsapp:+15550001111");
    assert_eq!(sent[0].1.body, metrobot::engine::HELP_TEXT);
}

#[tokio::test]
async fn test_webhook_without_sender_is_rejected() {
    let response = app().oneshot(webhook("Body=help")).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_webhook_cache_outage_is_server_error() {
    let app = app_with(
        Arc::new(BrokenStore),
        Arc::new(Outbox::default()),
        MediaStore::default(),
    );

    let response = app
        .oneshot(webhook("From=whatsapp%3A%2B15550001111&Body=help"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_media_serves_stored_ticket() {
    let media = MediaStore::default();
    let ticket_id = TicketId::new();
    media
        .put(
            ticket_id,
            StoredMedia {
                content_type: "image/png",
                bytes: vec![0x89, b'P', b'N', b'G'],
            },
        )
        .await;

    let app = app_with(
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(Outbox::default()),
        media,
    );

    let response = app
        .oneshot(get(&format!("/media/{}.png", ticket_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_media_unknown_ticket_is_not_found() {
    let response = app()
        .oneshot(get(&format!("/media/{}.png", TicketId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app().oneshot(get("/media/not-a-ticket.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
