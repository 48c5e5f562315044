use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use dispatch_engine::FulfillmentError;
use log::error;
use thiserror::Error;

use crate::data_objects::JsonResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    InvalidRequestBody(String),
    #[error("{0}")]
    InvalidRequestPath(String),
    #[error("{0}")]
    NoRecordFound(String),
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),
}

impl ServerError {
    /// The message shown to the caller. Internal failures are logged and replaced with a generic message.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("💻️ {self}");
                "Internal server error".to_string()
            },
            _ => self.to_string(),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Fulfillment(e) => match e {
                FulfillmentError::NotFound(_) => StatusCode::NOT_FOUND,
                FulfillmentError::InvalidState(_) => StatusCode::CONFLICT,
                FulfillmentError::Forbidden(_) => StatusCode::FORBIDDEN,
                FulfillmentError::ValidationError(_) => StatusCode::BAD_REQUEST,
                FulfillmentError::ExpiredCode => StatusCode::BAD_REQUEST,
                FulfillmentError::InvalidCode => StatusCode::BAD_REQUEST,
                FulfillmentError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                FulfillmentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = JsonResponse::failure(self.public_message());
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::to_string(&body).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,
    #[error("Invalid access token. {0}")]
    InvalidToken(String),
    #[error("The access token has expired")]
    ExpiredToken,
}
