use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Validation failed for {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Not found")]
    NotFound,

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment processor rejected the request: {message}")]
    ProcessorRejected {
        code: Option<String>,
        message: String,
    },

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    #[error("Payment processor unavailable: {0}")]
    ProcessorUnavailable(String),

    #[error("Unexpected payment processor response: {0}")]
    UnexpectedResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Only transport failures and processor-side throttling/outages qualify. Declines,
    /// rejections and malformed responses will not change on a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::RateLimited | AppError::ProcessorUnavailable(_) => true,

            AppError::ValidationError { .. }
            | AppError::InvalidInput(_)
            | AppError::InvalidSignature(_)
            | AppError::NotFound
            | AppError::PaymentDeclined(_)
            | AppError::ProcessorRejected { .. }
            | AppError::UnexpectedResponse(_)
            | AppError::Internal(_) => false,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::ValidationError { .. } => ErrorCode::ValidationError,
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::InvalidSignature(_) => ErrorCode::InvalidSignature,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::PaymentDeclined(_) => ErrorCode::PaymentDeclined,
            AppError::ProcessorRejected { .. } => ErrorCode::ProcessorRejected,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::ProcessorUnavailable(_) => ErrorCode::ProcessorUnavailable,
            AppError::UnexpectedResponse(_) => ErrorCode::UnexpectedProcessorResponse,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    InvalidInput,
    InvalidSignature,
    NotFound,
    PaymentDeclined,
    ProcessorRejected,
    RateLimited,
    ProcessorUnavailable,
    UnexpectedProcessorResponse,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PaymentDeclined => "PAYMENT_DECLINED",
            ErrorCode::ProcessorRejected => "PROCESSOR_REJECTED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ProcessorUnavailable => "PROCESSOR_UNAVAILABLE",
            ErrorCode::UnexpectedProcessorResponse => "UNEXPECTED_PROCESSOR_RESPONSE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
