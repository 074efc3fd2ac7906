//! Ordered request interceptors wrapped around every route.
//!
//! `before` hooks run in registration order and may reject the request.
//! `after` hooks run in reverse order for every interceptor whose `before`
//! succeeded, and also see requests rejected further down the chain.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

/// Response produced by an interceptor that refuses a request.
#[derive(Debug)]
pub struct Rejection {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            message: message.into(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.message).into_response()
    }
}

/// Summary of a finished request handed to `after` hooks.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub elapsed: Duration,
}

pub trait Interceptor: Send + Sync {
    fn before(&self, req: &Request<Body>) -> Result<(), Rejection>;

    fn after(&self, _exchange: &Exchange) {}
}

#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; it runs after all previously added ones.
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain around `inner`.
    pub async fn run<F, Fut>(&self, req: Request<Body>, inner: F) -> Response
    where
        F: FnOnce(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let started = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let mut passed = 0;
        let mut rejection = None;
        for interceptor in &self.interceptors {
            match interceptor.before(&req) {
                Ok(()) => passed += 1,
                Err(r) => {
                    rejection = Some(r);
                    break;
                }
            }
        }

        let response = match rejection {
            Some(r) => r.into_response(),
            None => inner(req).await,
        };

        let exchange = Exchange {
            method,
            path,
            status: response.status(),
            elapsed: started.elapsed(),
        };
        for interceptor in self.interceptors[..passed].iter().rev() {
            interceptor.after(&exchange);
        }

        response
    }
}

/// One log line per request.
pub struct RequestLogger;

impl Interceptor for RequestLogger {
    fn before(&self, req: &Request<Body>) -> Result<(), Rejection> {
        tracing::debug!("{} {} started", req.method(), req.uri().path());
        Ok(())
    }

    fn after(&self, exchange: &Exchange) {
        let elapsed_ms = exchange.elapsed.as_secs_f64() * 1000.0;
        if exchange.status.is_server_error() {
            tracing::error!(
                "{} {} -> {} ({:.1} ms)",
                exchange.method,
                exchange.path,
                exchange.status.as_u16(),
                elapsed_ms
            );
        } else {
            tracing::info!(
                "{} {} -> {} ({:.1} ms)",
                exchange.method,
                exchange.path,
                exchange.status.as_u16(),
                elapsed_ms
            );
        }
    }
}
