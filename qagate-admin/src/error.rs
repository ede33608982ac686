use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qagate_core::AccessError;

/// HTTP rendering of an [`AccessError`].
///
/// Client errors carry their message in `{"error": ...}`. Storage and
/// configuration failures are logged and answered with a generic 500 so
/// backend details never reach the caller.
#[derive(Debug)]
pub struct ApiError(pub AccessError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AccessError::AuthRequired(_) => StatusCode::UNAUTHORIZED,
            AccessError::DuplicateRule { .. } | AccessError::DuplicateRoleRule { .. } => {
                StatusCode::CONFLICT
            }
            AccessError::RuleNotFound(_)
            | AccessError::UnknownResource(_)
            | AccessError::PrincipalNotFound(_) => StatusCode::NOT_FOUND,
            AccessError::InvalidRule(_) => StatusCode::BAD_REQUEST,
            AccessError::InvalidCatalog(_) | AccessError::Storage(_) | AccessError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.0.to_string(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        ApiError(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "access-control request failed");
        }
        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qagate_core::ResourceKind;
    use uuid::Uuid;

    #[test]
    fn maps_every_kind_to_a_status() {
        let cases = [
            (AccessError::AuthRequired("x".into()), StatusCode::UNAUTHORIZED),
            (
                AccessError::DuplicateRule {
                    user_email: "jane@example.com".into(),
                    resource_name: "audit-reports".into(),
                    kind: ResourceKind::Page,
                    existing: Uuid::nil(),
                },
                StatusCode::CONFLICT,
            ),
            (
                AccessError::DuplicateRoleRule {
                    resource_name: "audit-reports".into(),
                    kind: ResourceKind::Page,
                    existing: Uuid::nil(),
                },
                StatusCode::CONFLICT,
            ),
            (AccessError::RuleNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (AccessError::UnknownResource("x".into()), StatusCode::NOT_FOUND),
            (AccessError::PrincipalNotFound("x".into()), StatusCode::NOT_FOUND),
            (AccessError::InvalidRule("x".into()), StatusCode::BAD_REQUEST),
            (AccessError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let err = ApiError(AccessError::Storage("connection reset by 10.0.0.4".into()));
        assert_eq!(err.public_message(), "Internal server error");
    }
}
