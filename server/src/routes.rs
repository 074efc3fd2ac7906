use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::Request,
    middleware,
    response::Response,
    routing::{delete, get, post},
    Router,
};

use crate::auth::credentials::Credentials;
use crate::auth::middleware::BasicAuth;
use crate::intercept::{InterceptorChain, RequestLogger};
use crate::state::AppState;
use crate::storage::routes as files;

/// Interceptors for the server: request logging first, so it also records
/// rejected requests, then basic authentication when credentials are set.
pub fn default_interceptors(credentials: Option<Credentials>) -> InterceptorChain {
    let chain = InterceptorChain::new().with(RequestLogger);
    match credentials {
        Some(credentials) => chain.with(BasicAuth::new(credentials)),
        None => chain,
    }
}

/// Run the interceptor chain around the rest of the stack.
async fn intercept(
    State(state): State<AppState>,
    req: Request<Body>,
    next: middleware::Next,
) -> Response {
    state.interceptors.run(req, |req| next.run(req)).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let file_routes = Router::new()
        .route(
            "/upload",
            post(files::upload_file).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/download/{name}", get(files::download_file))
        .route("/list", get(files::list_files))
        .route("/delete/{name}", delete(files::delete_file));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(file_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(state.clone(), intercept))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
