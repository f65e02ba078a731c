use async_trait::async_trait;

// Fetch-side port; the reqwest adapter lives in infra, tests plug in canned responses
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Issue a GET. `Err` means the request never produced a response.
    async fn get(&self, url: &str) -> Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    /// Seconds from a `Retry-After` header, when the server sent one
    pub retry_after_secs: Option<u64>,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, for error messages
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
