//! Shared state for the authentication layer and endpoints.

use std::sync::Arc;

use super::cookie::CookieSettings;
use super::resolver::SessionResolver;
use super::routes::RouteTable;

/// Everything the auth gate and the login/logout endpoints need.
///
/// Read-only after startup; cloned per request.
pub struct AuthState<R> {
    pub resolver: Arc<R>,
    pub routes: Arc<RouteTable>,
    pub cookies: Arc<CookieSettings>,
}

impl<R: SessionResolver> AuthState<R> {
    pub fn new(resolver: R, routes: RouteTable, cookies: CookieSettings) -> Self {
        Self {
            resolver: Arc::new(resolver),
            routes: Arc::new(routes),
            cookies: Arc::new(cookies),
        }
    }
}

// Manual impl: deriving would require `R: Clone`.
impl<R> Clone for AuthState<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            routes: self.routes.clone(),
            cookies: self.cookies.clone(),
        }
    }
}
