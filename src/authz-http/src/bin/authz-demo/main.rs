//! # Authorization demo server
//!
//! A small articles API guarded by `bastion-authz` policies.
//!
//! ## Endpoints
//!
//! - `GET /articles` - Articles visible to the caller (scoped)
//! - `GET /articles/:id` - Single article (`view`)
//! - `POST /articles` - Create an article (`add`)
//! - `POST /articles/:id/publish` - Publish an article (`publish`)
//! - `GET /admin/stats` - Request-level policy, admins only
//! - `GET /health` - Public, skips authorization
//!
//! Callers identify themselves with the `x-user-id` and `x-user-role`
//! headers.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)

mod model;
mod policy;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Extension, Router,
};
use bastion_authz::{
    AuthorizationService, AuthzError, ConventionResolver, Identity, MapResolver, PolicyCatalog,
    PolicyResolver, ResolverChain,
};
use bastion_authz_http::{
    authorization_middleware, request_authorization_middleware, Attribute, AuthorizationState,
    MiddlewareError, RequestAttributes, RequestAuthorizationConfig, RequestTarget,
};
use model::entity::Article;
use model::table::ArticlesQuery;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";

/// Shared application state
#[derive(Clone)]
struct AppState {
    articles: Arc<RwLock<Vec<Article>>>,
    next_id: Arc<AtomicU64>,
}

impl AppState {
    fn seeded() -> Self {
        let articles = vec![
            Article {
                id: 1,
                author_id: 1,
                title: "Policies by convention".to_string(),
                published: true,
            },
            Article {
                id: 2,
                author_id: 2,
                title: "Scoping queries".to_string(),
                published: false,
            },
        ];

        Self {
            next_id: Arc::new(AtomicU64::new(articles.len() as u64 + 1)),
            articles: Arc::new(RwLock::new(articles)),
        }
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("Article {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Authz(#[from] AuthzError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();

        match self {
            AppError::NotFound(_) => {
                let body = Json(json!({
                    "error": message,
                    "status": StatusCode::NOT_FOUND.as_u16(),
                }));
                (StatusCode::NOT_FOUND, body).into_response()
            }
            AppError::Authz(err) => MiddlewareError::from(err).into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NewArticle {
    title: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Turn the identity headers into a raw identity attribute.
async fn authenticate(mut request: Request, next: Next) -> Response {
    // The header borrow must end before the await; `Body` is not `Sync`.
    let (id, role) = {
        let headers = request.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        (
            header(USER_ID_HEADER).and_then(|id| id.parse::<u64>().ok()),
            header(USER_ROLE_HEADER).unwrap_or_else(|| "reader".to_string()),
        )
    };

    if let Some(id) = id {
        RequestAttributes::set(
            &mut request,
            "identity",
            Attribute::RawIdentity(json!({ "id": id, "role": role })),
        );
    }

    next.run(request).await
}

/// GET /articles
async fn list_articles(
    State(state): State<AppState>,
    Extension(service): Extension<Arc<AuthorizationService>>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<Vec<Article>>, AppError> {
    let identity = identity.map(|Extension(identity)| identity);
    let query = service.apply_scope(identity.as_ref(), "index", ArticlesQuery::new())?;

    let articles = state.articles.read().await;
    let visible = articles
        .iter()
        .filter(|article| query.matches(article))
        .cloned()
        .collect();

    Ok(Json(visible))
}

/// GET /articles/:id
async fn show_article(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Extension(service): Extension<Arc<AuthorizationService>>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<Article>, AppError> {
    let identity = identity.map(|Extension(identity)| identity);
    let article = find_article(&state, id)
        .await
        .inspect_err(|_| {
            service.skip_authorization();
        })?;

    service.authorize(identity.as_ref(), "view", &article)?;
    Ok(Json(article))
}

/// POST /articles
async fn create_article(
    State(state): State<AppState>,
    Extension(service): Extension<Arc<AuthorizationService>>,
    identity: Option<Extension<Identity>>,
    Json(input): Json<NewArticle>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    let identity = identity.map(|Extension(identity)| identity);
    let author_id = identity
        .as_ref()
        .and_then(|user| user.get("id"))
        .and_then(|id| id.as_u64())
        .unwrap_or_default();

    let mut article = Article {
        id: 0,
        author_id,
        title: input.title,
        published: false,
    };
    service.authorize(identity.as_ref(), "add", &article)?;

    article.id = state.next_id.fetch_add(1, Ordering::SeqCst);
    state.articles.write().await.push(article.clone());

    info!(id = article.id, author_id, "Article created");
    Ok((StatusCode::CREATED, Json(article)))
}

/// POST /articles/:id/publish
async fn publish_article(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Extension(service): Extension<Arc<AuthorizationService>>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<Article>, AppError> {
    let identity = identity.map(|Extension(identity)| identity);
    let article = find_article(&state, id)
        .await
        .inspect_err(|_| {
            service.skip_authorization();
        })?;

    service.authorize(identity.as_ref(), "publish", &article)?;

    let mut articles = state.articles.write().await;
    let stored = articles
        .iter_mut()
        .find(|stored| stored.id == id)
        .ok_or(AppError::NotFound(id))?;
    stored.published = true;

    Ok(Json(stored.clone()))
}

/// GET /admin/stats
async fn admin_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let articles = state.articles.read().await;
    let published = articles.iter().filter(|article| article.published).count();

    Json(json!({
        "articles": articles.len(),
        "published": published,
    }))
}

/// GET /health
async fn health_check(
    Extension(service): Extension<Arc<AuthorizationService>>,
) -> Json<HealthResponse> {
    service.skip_authorization();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: bastion_authz::VERSION.to_string(),
    })
}

async fn find_article(state: &AppState, id: u64) -> Result<Article, AppError> {
    state
        .articles
        .read()
        .await
        .iter()
        .find(|article| article.id == id)
        .cloned()
        .ok_or(AppError::NotFound(id))
}

/// Request-level policy first, then policies by convention.
fn build_resolver() -> Arc<dyn PolicyResolver> {
    let mut requests = MapResolver::new();
    requests.map::<RequestTarget, policy::RequestPolicy>();

    let mut catalog = PolicyCatalog::new();
    catalog
        .register::<policy::ArticlePolicy>()
        .register::<policy::ArticlesPolicy>();
    let convention = ConventionResolver::new("authz_demo", Arc::new(catalog));

    let resolvers: Vec<Arc<dyn PolicyResolver>> = vec![Arc::new(requests), Arc::new(convention)];
    Arc::new(ResolverChain::new(resolvers))
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http()
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let admin = Router::new()
        .route("/admin/stats", get(admin_stats))
        .route_layer(middleware::from_fn_with_state(
            RequestAuthorizationConfig::default(),
            request_authorization_middleware,
        ));

    Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route("/articles/:id", get(show_article))
        .route("/articles/:id/publish", post(publish_article))
        .route("/health", get(health_check))
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            AuthorizationState::new(build_resolver()),
            authorization_middleware,
        ))
        .layer(middleware::from_fn(authenticate))
        .layer(
            ServiceBuilder::new()
                .layer(trace)
                .layer(cors)
        )
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting authorization demo v{}", bastion_authz::VERSION);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let app = create_router(AppState::seeded());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}
