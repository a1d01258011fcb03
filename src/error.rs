use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::{ModuleId, UserId};

/// HierarchyError
///
/// Structural failures reported by the hierarchy engine. None of these are retried or
/// repaired; the caller decides how to surface them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Following parent pointers from this module never reaches a root.
    #[error("cycle detected in module hierarchy at module {0}")]
    CycleDetected(ModuleId),

    /// Placing `id` under `parent_id` would make the module its own ancestor.
    #[error("module {id} cannot be placed under module {parent_id}: a cycle would form")]
    CycleWouldForm { id: ModuleId, parent_id: ModuleId },

    /// The id is absent from the snapshot.
    #[error("module {0} not found")]
    NotFound(ModuleId),

    /// A stored module points at a parent that does not exist.
    #[error("module {id} references missing parent module {parent_id}")]
    MissingParent { id: ModuleId, parent_id: ModuleId },

    /// The same id appears twice in one snapshot.
    #[error("duplicate module id {0}")]
    DuplicateId(ModuleId),

    #[error("module {0} has submodules")]
    HasChildren(ModuleId),

    #[error("module {0} has dependent content")]
    HasDependentContent(ModuleId),
}

/// ApiError
///
/// Failures of the service layer, mapped onto HTTP responses with a JSON
/// `{error, message}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// The caller is authenticated but not allowed to act on the target.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request payload is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Store failure. The detail is logged, never returned to the client.
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// Status code and machine-readable tag for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Hierarchy(err) => match err {
                HierarchyError::CycleWouldForm { .. } => (StatusCode::CONFLICT, "cycle_would_form"),
                HierarchyError::HasChildren(_) => (StatusCode::CONFLICT, "has_children"),
                HierarchyError::HasDependentContent(_) => {
                    (StatusCode::CONFLICT, "has_dependent_content")
                }
                HierarchyError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                // A corrupt snapshot is a server-side fault, not something the client sent.
                HierarchyError::CycleDetected(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "cycle_detected")
                }
                HierarchyError::MissingParent { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "missing_parent")
                }
                HierarchyError::DuplicateId(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "duplicate_id")
                }
            },
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Self::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = serde_json::json!({ "error": code, "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}
