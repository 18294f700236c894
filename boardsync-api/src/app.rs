/// Application state and router builder
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                       # Health check (public)
/// └── /api/v1/                      # API v1 (versioned)
///     ├── /auth/                    # Public
///     │   ├── POST /register
///     │   └── POST /login
///     └── /tasks/                   # Bearer token required
///         ├── GET    /              # All tasks (cached)
///         ├── POST   /              # Create
///         ├── GET    /users         # User directory
///         ├── GET    /my-tasks      # Caller's tasks (cached)
///         ├── PUT    /assign        # Reassign
///         ├── GET    /ws            # Real-time channel (websocket)
///         ├── GET    /:id           # Single task (cached)
///         ├── PUT    /:id           # Partial update
///         └── DELETE /:id           # Delete
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http `TraceLayer`)
/// 2. CORS (tower-http `CorsLayer`)
/// 3. Authentication on the task group (`jwt_auth`)
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use boardsync_shared::{
    auth::middleware::{jwt_auth, JwtSecret},
    store::TaskStore,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{cache::TaskCache, config::Config, hub::BroadcastHub, mutation::MutationService};

/// Shared application state
///
/// Cloned per request via Axum's `State` extractor; every collaborator is
/// behind an `Arc`, constructed once at process start and threaded
/// through explicitly — no hidden statics.
#[derive(Clone)]
pub struct AppState {
    /// Task and user store
    pub store: Arc<TaskStore>,

    /// Response cache
    pub cache: Arc<TaskCache>,

    /// Real-time fan-out hub
    pub hub: Arc<BroadcastHub>,

    /// Task write path (persist → invalidate → broadcast)
    pub mutations: Arc<MutationService>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires up the state graph from a configuration
    pub fn new(config: Config) -> Self {
        let store = Arc::new(TaskStore::new());
        let cache = Arc::new(TaskCache::new(
            config.cache.sliding(),
            config.cache.absolute(),
        ));
        let hub = Arc::new(BroadcastHub::new());
        let mutations = Arc::new(MutationService::new(
            store.clone(),
            cache.clone(),
            hub.clone(),
        ));

        Self {
            store,
            cache,
            hub,
            mutations,
            config: Arc::new(config),
        }
    }

    /// Gets the JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let secret = JwtSecret::new(state.jwt_secret());

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth endpoints (public)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    // Task endpoints (bearer token required, including the ws handshake)
    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_all_tasks).post(routes::tasks::create_task),
        )
        .route("/users", get(routes::tasks::list_users))
        .route("/my-tasks", get(routes::tasks::list_my_tasks))
        .route("/assign", put(routes::tasks::assign_task))
        .route("/ws", get(routes::ws::task_events_ws))
        .route(
            "/:id",
            get(routes::tasks::get_task_by_id)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .layer(middleware::from_fn_with_state(secret, jwt_auth));

    Router::new()
        .merge(health_routes)
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1/tasks", task_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
