//! Error handling for the Stockroom back-office
//!
//! Provides consistent error responses in English and French

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{LedgerError, ParseEnumError, PaymentError, TransitionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_fr: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_fr: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A referenced id does not exist in the caller's tenant
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    // Stock ledger errors
    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("Source and destination locations are the same")]
    SameLocation,

    // Document lifecycle errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Document locked: {0}")]
    DocumentLocked(String),

    #[error("Quote not accepted (status {0})")]
    QuoteNotAccepted(String),

    #[error("Quote already converted")]
    AlreadyConverted,

    #[error("Payment of {amount} exceeds outstanding balance {outstanding}")]
    PaymentExceedsOutstanding { amount: Decimal, outstanding: Decimal },

    #[error("Purchase order already received")]
    AlreadyReceived,

    #[error("Purchase order cancelled")]
    PurchaseOrderCancelled,

    #[error("Purchase order not yet received")]
    NotYetReceived,

    #[error("Stock already added")]
    AlreadyAdded,

    // Contention
    #[error("Could not issue a {series} number")]
    NumberGenerationFailed { series: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation failure
    pub fn validation(field: &str, message: &str, message_fr: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_fr: message_fr.to_string(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock { available, requested } => {
                AppError::InsufficientStock { available, requested }
            }
            LedgerError::SameLocation => AppError::SameLocation,
            LedgerError::NegativeQuantity(_) | LedgerError::NonPositiveQuantity(_) => AppError::Validation {
                field: "quantity".to_string(),
                message: err.to_string(),
                message_fr: "Quantité invalide".to_string(),
            },
            LedgerError::Overflow => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Illegal { .. } => AppError::InvalidStateTransition(err.to_string()),
            TransitionError::QuoteNotAccepted(status) => AppError::QuoteNotAccepted(status.to_string()),
            TransitionError::AlreadyConverted => AppError::AlreadyConverted,
            TransitionError::Locked(document) => AppError::DocumentLocked(document.to_string()),
            TransitionError::AlreadyReceived => AppError::AlreadyReceived,
            TransitionError::Cancelled => AppError::PurchaseOrderCancelled,
            TransitionError::NotYetReceived => AppError::NotYetReceived,
            TransitionError::AlreadyAdded => AppError::AlreadyAdded,
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NonPositiveAmount => AppError::Validation {
                field: "amount".to_string(),
                message: err.to_string(),
                message_fr: "Le montant doit être supérieur à zéro".to_string(),
            },
            PaymentError::ExceedsOutstanding { amount, outstanding } => {
                AppError::PaymentExceedsOutstanding { amount, outstanding }
            }
        }
    }
}

impl From<ParseEnumError> for AppError {
    fn from(err: ParseEnumError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
            message_fr: "Données invalides".to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn detail(code: &str, message_en: String, message_fr: String) -> ErrorDetail {
    ErrorDetail {
        code: code.to_string(),
        message_en,
        message_fr,
        field: None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                detail(
                    "INVALID_TOKEN",
                    "Invalid token".to_string(),
                    "Jeton invalide".to_string(),
                ),
            ),
            AppError::Unauthorized { message, message_fr } => (
                StatusCode::UNAUTHORIZED,
                detail("UNAUTHORIZED", message.clone(), message_fr.clone()),
            ),
            AppError::Validation { field, message, message_fr } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                detail(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("Données invalides : {}", msg),
                ),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_ENTRY".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_fr: format!("Un enregistrement avec ce {} existe déjà", field),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict { resource, message, message_fr } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                detail(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} introuvable", resource),
                ),
            ),
            AppError::InvalidReference(resource) => (
                StatusCode::NOT_FOUND,
                detail(
                    "INVALID_REFERENCE",
                    format!("{} not found", resource),
                    format!("{} introuvable", resource),
                ),
            ),
            AppError::InsufficientStock { available, requested } => (
                StatusCode::CONFLICT,
                detail(
                    "INSUFFICIENT_STOCK",
                    format!("Insufficient stock: {} available, {} requested", available, requested),
                    format!("Stock insuffisant : {} disponible(s), {} demandé(s)", available, requested),
                ),
            ),
            AppError::SameLocation => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "SAME_LOCATION",
                    "Source and destination locations must differ".to_string(),
                    "Les emplacements source et destination doivent être différents".to_string(),
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "INVALID_STATE_TRANSITION",
                    msg.clone(),
                    format!("Changement de statut impossible : {}", msg),
                ),
            ),
            AppError::DocumentLocked(document) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "DOCUMENT_LOCKED",
                    format!("This {} can no longer be modified", document),
                    format!("Ce document ({}) ne peut plus être modifié", document),
                ),
            ),
            AppError::QuoteNotAccepted(status) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "QUOTE_NOT_ACCEPTED",
                    format!("Only accepted quotes can be converted (status {})", status),
                    format!("Seuls les devis acceptés peuvent être convertis (statut {})", status),
                ),
            ),
            AppError::AlreadyConverted => (
                StatusCode::CONFLICT,
                detail(
                    "ALREADY_CONVERTED",
                    "This quote has already been converted to an invoice".to_string(),
                    "Ce devis a déjà été converti en facture".to_string(),
                ),
            ),
            AppError::PaymentExceedsOutstanding { amount, outstanding } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "PAYMENT_EXCEEDS_OUTSTANDING".to_string(),
                    message_en: format!(
                        "Payment of {} exceeds the outstanding balance of {}",
                        amount, outstanding
                    ),
                    message_fr: format!(
                        "Le paiement de {} dépasse le solde restant dû de {}",
                        amount, outstanding
                    ),
                    field: Some("amount".to_string()),
                },
            ),
            AppError::AlreadyReceived => (
                StatusCode::CONFLICT,
                detail(
                    "PO_ALREADY_RECEIVED",
                    "This purchase order has already been fully received".to_string(),
                    "Ce bon de commande a déjà été entièrement reçu".to_string(),
                ),
            ),
            AppError::PurchaseOrderCancelled => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "PO_CANCELLED",
                    "This purchase order is cancelled".to_string(),
                    "Ce bon de commande est annulé".to_string(),
                ),
            ),
            AppError::NotYetReceived => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "PO_NOT_RECEIVED",
                    "Stock can only be added for fully received orders".to_string(),
                    "Le stock ne peut être ajouté que pour les commandes entièrement reçues".to_string(),
                ),
            ),
            AppError::AlreadyAdded => (
                StatusCode::CONFLICT,
                detail(
                    "PO_STOCK_ALREADY_ADDED",
                    "Stock has already been added for this purchase order".to_string(),
                    "Le stock a déjà été ajouté pour ce bon de commande".to_string(),
                ),
            ),
            AppError::NumberGenerationFailed { series } => (
                StatusCode::SERVICE_UNAVAILABLE,
                detail(
                    "NUMBER_GENERATION_FAILED",
                    format!("Could not issue a {} number, please try again later", series),
                    format!("Impossible d'attribuer un numéro ({}), veuillez réessayer plus tard", series),
                ),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "CONFIGURATION_ERROR",
                    format!("Configuration error: {}", msg),
                    format!("Erreur de configuration : {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    "Une erreur de base de données est survenue".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Erreur interne du serveur".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "Erreur interne du serveur".to_string(),
                ),
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
