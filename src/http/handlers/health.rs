//! Health check handler.

/// Health check endpoint.
///
/// # Returns
///
/// Returns "ok" if the server is healthy.
pub async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test health check response.
    #[tokio::test]
    async fn test_healthz() {
        assert_eq!(healthz().await, "ok");
    }
}
