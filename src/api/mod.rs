use crate::{
    api::handlers::{events, health, login},
    auth::{
        postgres::PgStore,
        store::{CredentialStore, RealmStore},
        AuthenticationGate,
    },
    events::RegistrationTrigger,
    notify::{
        channel::{HttpMailer, LogMailer, NotificationChannel},
        spawn_worker,
        template::{DefaultLocaleResolver, FsTemplateSource},
        NotificationDispatcher, NotifyWorkerConfig,
    },
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::ApiDoc;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    templates_dir: PathBuf,
    frontend_base_url: String,
    relay_url: Option<Url>,
    notify_config: NotifyWorkerConfig,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let credentials: Arc<dyn CredentialStore> = store.clone();
    let realms: Arc<dyn RealmStore> = store;

    let channel: Arc<dyn NotificationChannel> = match relay_url {
        Some(url) => Arc::new(HttpMailer::new(url)?),
        None => Arc::new(LogMailer),
    };

    // Background worker consumes the bounded notification queue, localizes and
    // formats each request, and retries delivery failures with backoff.
    let dispatcher = NotificationDispatcher::new(
        Arc::new(DefaultLocaleResolver),
        Arc::new(FsTemplateSource::new(templates_dir)),
        channel,
    );
    let (notifier, worker) = spawn_worker(dispatcher, notify_config);
    tokio::spawn(async move {
        // A dead worker turns every later enqueue into a silent drop; make
        // the exit visible.
        if let Err(err) = worker.await {
            error!("notification worker terminated: {err}");
        }
    });

    let gate = Arc::new(AuthenticationGate::new(credentials.clone(), notifier.clone()));
    let trigger = Arc::new(RegistrationTrigger::new(
        realms.clone(),
        credentials,
        notifier,
    ));

    let frontend_origin = frontend_origin(&frontend_base_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = Router::new()
        .route("/v1/:realm/login", post(login::login))
        .route("/v1/:realm/events/registration", post(events::registration))
        .route("/health", get(health::health))
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(gate))
                .layer(Extension(trigger))
                .layer(Extension(realms))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
