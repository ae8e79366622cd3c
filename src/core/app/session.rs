use tokio_util::sync::CancellationToken;

pub struct SessionContext {
    pub client: reqwest::Client,
    pub relay_url: String,
    pub stream_cancel_token: Option<CancellationToken>,
    pub current_stream_id: u64,
}

impl SessionContext {
    pub fn new(client: reqwest::Client, relay_url: String) -> Self {
        Self {
            client,
            relay_url,
            stream_cancel_token: None,
            current_stream_id: 0,
        }
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.current_stream_id == stream_id
    }

    /// Cancels the running stream, if any. Its task stops without sending
    /// anything further.
    pub fn cancel_stream(&mut self) {
        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
    }

    pub fn start_new_stream(&mut self) -> (CancellationToken, u64) {
        self.cancel_stream();
        self.current_stream_id += 1;

        let token = CancellationToken::new();
        self.stream_cancel_token = Some(token.clone());
        (token, self.current_stream_id)
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.cancel_stream();
    }
}
