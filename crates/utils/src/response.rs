use serde::Serialize;

/// JSON envelope shared by every endpoint.
///
/// Success bodies are `{"success": true, ...payload}` where the payload's
/// fields are flattened into the top level. Failures are
/// `{"success": false, "error": "...", "details": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            details: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            details: None,
        }
    }

    pub fn error_with_details(message: &str, details: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            details: Some(details.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl ApiResponse<()> {
    /// Bare `{"success": true}`.
    pub fn ok() -> Self {
        Self::success(())
    }
}
