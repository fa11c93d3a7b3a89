use metrobot::server::{create_router, AppState};
use metrobot::storage;
use metrobot::{
    BotConfig, MediaStore, QrTicketRenderer, RasaClient, SimulatedPayment, TwilioTransport,
    WebhookHandler,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::load()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "metrobot={level},tower_http={level}",
                level = config.log_level.as_str()
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        bind_addr = %config.bind_addr,
        rasa_url = %config.rasa_url,
        "Starting metro ticket bot"
    );

    let transport = TwilioTransport::new(
        config.twilio.account_sid.as_str(),
        config.twilio.auth_token.as_str(),
        config.twilio.phone_number.as_str(),
    );

    let handler = WebhookHandler::builder()
        .config(&config)
        .nlu(Arc::new(RasaClient::new(config.rasa_url.as_str())))
        .payment(Arc::new(SimulatedPayment::new(config.payment_success_rate)))
        .transport(Arc::new(transport))
        .renderer(Arc::new(QrTicketRenderer::default()))
        .store(storage::connect(config.redis_url.as_deref()).await?)
        .media(MediaStore::new(config.media_capacity))
        .build()?;

    let app = create_router(AppState::new(Arc::new(handler)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
