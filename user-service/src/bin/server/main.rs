use std::sync::Arc;

use auth::Authenticator;
use auth::TokenCodec;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use user_service::config::AdminConfig;
use user_service::config::Config;
use user_service::domain::user::models::EmailAddress;
use user_service::domain::user::models::RegisterUserCommand;
use user_service::domain::user::ports::PrincipalLookup;
use user_service::domain::user::ports::UserRepository;
use user_service::domain::user::ports::UserServicePort;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::policy::SecurityPolicy;
use user_service::inbound::http::router::create_router;
use user_service::inbound::http::router::RouterConfig;
use user_service::outbound::repositories::InMemoryUserRepository;
use user_service::outbound::repositories::PostgresUserRepository;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "user-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        storage = if config.database.url.is_some() { "postgresql" } else { "memory" },
        access_ttl_seconds = config.jwt.access_ttl_seconds,
        refresh_ttl_seconds = config.jwt.refresh_ttl_seconds,
        accept_query_token = config.auth.accept_query_token,
        "Configuration loaded"
    );

    let secret = config.jwt.secret_key()?;
    let lifetimes = config.jwt.token_lifetimes()?;
    let authenticator = Arc::new(Authenticator::new(TokenCodec::new(&secret, lifetimes)));

    let (user_service, principal_lookup) = match &config.database.url {
        Some(url) => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            user_services(PostgresUserRepository::new(pg_pool))
        }
        None => {
            tracing::warn!("No database configured; users are kept in memory only");
            user_services(InMemoryUserRepository::new())
        }
    };

    if let Some(admin) = &config.admin {
        bootstrap_admin(user_service.as_ref(), admin).await?;
    }

    let http_application = create_router(RouterConfig {
        user_service,
        principal_lookup,
        authenticator,
        policy: Arc::new(SecurityPolicy::standard()),
        accept_query_token: config.auth.accept_query_token,
    });

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    axum::serve(http_listener, http_application)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server exited successfully");
    Ok(())
}

fn user_services<UR: UserRepository>(
    repository: UR,
) -> (Arc<dyn UserServicePort>, Arc<dyn PrincipalLookup>) {
    let service = Arc::new(UserService::new(Arc::new(repository)));
    let user_service: Arc<dyn UserServicePort> = service.clone();
    let principal_lookup: Arc<dyn PrincipalLookup> = service;
    (user_service, principal_lookup)
}

async fn bootstrap_admin(
    user_service: &dyn UserServicePort,
    admin: &AdminConfig,
) -> Result<(), anyhow::Error> {
    let command = RegisterUserCommand::new(
        admin.name.clone(),
        EmailAddress::new(admin.email.clone())?,
        admin.password.clone(),
        None,
    );
    let user = user_service.ensure_admin(command).await?;
    tracing::info!(user_id = %user.id, email = %user.email, "Admin account available");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
