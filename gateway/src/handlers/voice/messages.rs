//! Query and notice strings for the voice endpoint.

/// Sent before a 1011 close when the upstream handshake or setup fails.
pub const UPSTREAM_CONNECT_FAILED_MESSAGE: &str = "Failed to connect to upstream";

/// Query parameters of `GET /ws/voice`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceQuery {
    /// Key of the post to discuss, as sent by the client
    pub post_id: Option<String>,
}

impl VoiceQuery {
    /// Parse the raw query string. The first `postId` wins.
    ///
    /// Parsing never fails: a malformed query simply yields no key, which
    /// the session reports to the client as a missing `postId`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let post_id = raw.and_then(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .find(|(name, _)| name == "postId")
                .map(|(_, value)| value.into_owned())
        });
        Self { post_id }
    }

    /// Key used to name the session before the post is resolved.
    pub fn session_key(&self) -> &str {
        self.post_id.as_deref().unwrap_or_default()
    }
}
