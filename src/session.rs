//! Credentials and endpoints for calls made on behalf of a player.
//!
//! Passed explicitly to every external call instead of being looked up from
//! ambient storage at each call site.

/// An authenticated player session.
#[derive(Clone)]
pub struct Session {
    access_token: Option<String>,
    api_base_url: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            api_base_url: trim_base(api_base_url.into()),
        }
    }

    /// A session with no token yet (before login).
    pub fn anonymous(api_base_url: impl Into<String>) -> Self {
        Self {
            access_token: None,
            api_base_url: trim_base(api_base_url.into()),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Join `path` onto the API base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.access_token().is_some())
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let session = Session::new("tok", "https://api.example.com/");
        assert_eq!(
            session.endpoint("/game/quests/complete/"),
            "https://api.example.com/game/quests/complete/"
        );
        assert_eq!(session.endpoint("x"), "https://api.example.com/x");
    }

    #[test]
    fn test_empty_token_is_unauthenticated() {
        assert!(Session::new("", "https://a").access_token().is_none());
        assert!(Session::anonymous("https://a").access_token().is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session::new("secret-token", "https://a");
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}
