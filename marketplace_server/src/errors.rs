use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use marketplace_engine::FulfillmentError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Fulfillment(#[from] FulfillmentError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingActor => StatusCode::UNAUTHORIZED,
                AuthError::InvalidActor(_) => StatusCode::UNAUTHORIZED,
            },
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Fulfillment(e) => fulfillment_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn fulfillment_status(e: &FulfillmentError) -> StatusCode {
    use FulfillmentError::*;
    match e {
        ValidationError(_) | EmptyCart | MultipleSellers(_) | AmountMismatch { .. } => StatusCode::BAD_REQUEST,
        Unauthorized(_) => StatusCode::FORBIDDEN,
        ProductNotFound(_) | OrderNotFound(_) | PaymentNotFound(_) | CustomerNotFound(_) | SellerNotFound(_) => {
            StatusCode::NOT_FOUND
        },
        InsufficientStock { .. } |
        InsufficientPoints { .. } |
        ProductUnavailable(_) |
        InvalidStatusTransition { .. } |
        OrderNotPayable { .. } |
        PaymentAlreadySettled { .. } |
        PaymentAlreadyCompleted(_) |
        PaymentInProgress(_) |
        AlreadyExists(_) |
        ConcurrencyConflict(_) => StatusCode::CONFLICT,
        DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No actor was supplied with the request. Set the x-actor-id and x-actor-role headers.")]
    MissingActor,
    #[error("The actor headers are not valid. {0}")]
    InvalidActor(String),
}
