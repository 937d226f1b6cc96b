use std::sync::Arc;

use edumarket::config::AppConfig;
use edumarket::onboarding::{OnboardingRouteState, onboarding_routes};
use edumarket::payment::provider::ProviderCredentials;
use edumarket::payment::{HttpPaymentProvider, PaymentProvider};
use edumarket::store::{LibSqlStore, Store};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("🎓 EduMarket onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding", config.port);
    eprintln!("   Database: {}", config.db_path);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn Store> = Arc::new(LibSqlStore::new_local(db_path).await?);

    // ── Payment provider ─────────────────────────────────────────────────
    let payments: Option<Arc<dyn PaymentProvider>> = match config.payment {
        Some(payment) => {
            eprintln!("   Payments: enabled ({})", payment.api_base);
            Some(Arc::new(HttpPaymentProvider::new(ProviderCredentials {
                api_base: payment.api_base,
                client_id: payment.client_id,
                secret: payment.secret,
            })) as Arc<dyn PaymentProvider>)
        }
        None => {
            eprintln!("   Payments: disabled (subscription step is skip-only)");
            None
        }
    };

    // ── Server ───────────────────────────────────────────────────────────
    let state = OnboardingRouteState { store, payments };
    let app = onboarding_routes(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
