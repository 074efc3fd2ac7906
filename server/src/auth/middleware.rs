use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
};

use crate::auth::credentials::{parse_basic_authorization, Credentials};
use crate::intercept::{Interceptor, Rejection};

/// Realm advertised in the `WWW-Authenticate` challenge.
pub const REALM: &str = "filevault";

/// Paths reachable without credentials.
pub const PUBLIC_PATHS: &[&str] = &["/health"];

/// Basic authentication against the shared credential pair.
pub struct BasicAuth {
    credentials: Credentials,
}

impl BasicAuth {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    fn unauthorized() -> Rejection {
        let mut rejection = Rejection::new(StatusCode::UNAUTHORIZED, "Unauthorized");
        rejection.headers.insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(r#"Basic realm="filevault", charset="UTF-8""#),
        );
        rejection
    }
}

impl Interceptor for BasicAuth {
    fn before(&self, req: &Request<Body>) -> Result<(), Rejection> {
        if PUBLIC_PATHS.contains(&req.uri().path()) {
            return Ok(());
        }

        // Extract user:password from Authorization: Basic header
        let (username, password) = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_basic_authorization)
            .ok_or_else(Self::unauthorized)?;

        if !self.credentials.verify(&username, &password) {
            tracing::warn!(
                "Rejected credentials for user {:?} on {} {}",
                username,
                req.method(),
                req.uri().path()
            );
            return Err(Self::unauthorized());
        }

        Ok(())
    }
}
