//! Public/protected classification of request paths.
//!
//! Public matching is exact: `/login` being public says nothing about
//! `/login/help`. API prefixes match the prefix itself and anything below it
//! (`/api` covers `/api/profile`, not `/apiary`). Anything else is protected.

use std::collections::HashSet;

/// Default public routes.
pub const DEFAULT_PUBLIC_ROUTES: &[&str] = &["/login"];

/// Default API route prefixes.
pub const DEFAULT_API_PREFIXES: &[&str] = &["/api"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    /// Protected, but refused with a 401 JSON body instead of a redirect
    Api,
}

/// Static route classification, built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    public: HashSet<String>,
    api_prefixes: Vec<String>,
}

impl RouteTable {
    pub fn new<I, S>(public: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            public: public.into_iter().map(Into::into).collect(),
            api_prefixes: Vec::new(),
        }
    }

    pub fn with_api_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_prefixes = prefixes
            .into_iter()
            .map(|p| p.into().trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    fn is_api(&self, path: &str) -> bool {
        self.api_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public.contains(path) {
            RouteClass::Public
        } else if self.is_api(path) {
            RouteClass::Api
        } else {
            RouteClass::Protected
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_ROUTES.iter().copied())
            .with_api_prefixes(DEFAULT_API_PREFIXES.iter().copied())
    }
}
