use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product no longer exists")]
    ProductNotFound,

    #[error("Insufficient stock for {name}: {available} available")]
    InsufficientStock { name: String, available: i32 },

    #[error("A request of this type is already pending")]
    AlreadyPending,

    #[error("Request has already been reviewed")]
    AlreadyReviewed,

    #[error("Operation conflicted with a concurrent update, please retry")]
    Conflict,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("Database error")]
    OrmError(sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        // Postgres 40001 (serialization_failure) and 40P01 (deadlock) abort
        // the transaction; the caller may resubmit, so surface 409 instead
        // of a 500.
        let text = err.to_string();
        if text.contains("40001")
            || text.contains("40P01")
            || text.contains("could not serialize")
            || text.contains("deadlock")
        {
            return AppError::Conflict;
        }
        AppError::OrmError(err)
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound | AppError::ProductNotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::EmptyCart
            | AppError::InsufficientStock { .. }
            | AppError::AlreadyPending
            | AppError::AlreadyReviewed => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays server-side; the client sees the generic
        // variant message only.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            match &self {
                AppError::DbError(err) => tracing::error!(error = %err, "database failure"),
                AppError::OrmError(err) => tracing::error!(error = %err, "orm failure"),
                AppError::Internal(err) => tracing::error!(error = %err, "internal failure"),
                _ => {}
            }
        }

        let message = self.to_string();
        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData { error: message }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_failures_map_to_client_errors() {
        assert_eq!(AppError::EmptyCart.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientStock {
                name: "Widget".into(),
                available: 1
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::AlreadyPending.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AlreadyReviewed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::ProductNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn insufficient_stock_names_the_product() {
        let err = AppError::InsufficientStock {
            name: "Ferris Mug".into(),
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Ferris Mug: 3 available"
        );
    }

    #[test]
    fn serialization_failures_become_conflicts() {
        let err = sea_orm::DbErr::Custom(
            "could not serialize access due to concurrent update (SQLSTATE 40001)".into(),
        );
        assert!(matches!(AppError::from(err), AppError::Conflict));
    }
}
