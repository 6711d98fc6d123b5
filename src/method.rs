//! HTTP verbs a route can be registered under.
//!
//! Requests may arrive with any method; only these five can own a route.
//! Anything else on a registered path is answered with `405 Method Not Allowed`
//! (or, with CORS enabled, as a preflight for `OPTIONS`).

use std::fmt;

/// A registrable HTTP verb.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get    => "GET",
            Self::Patch  => "PATCH",
            Self::Post   => "POST",
            Self::Put    => "PUT",
        }
    }

    pub(crate) fn matches(self, method: &http::Method) -> bool {
        self.as_str() == method.as_str()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
