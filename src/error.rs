use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error("ABI decode failed: {0}")]
    Abi(#[from] alloy::sol_types::Error),

    #[error("Could not decode {0} from call result")]
    Decode(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount out of range for decimal conversion")]
    AmountOverflow,

    #[error("Unknown network: {0}")]
    UnknownNetwork(u64),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Transaction cancelled by the wallet")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, ViewError>;

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ViewError::InvalidAmount(_) | ViewError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ViewError::UnknownNetwork(_) => (StatusCode::NOT_FOUND, "UNKNOWN_NETWORK"),
            ViewError::Transport(_)
            | ViewError::Rpc(_)
            | ViewError::Reverted(_)
            | ViewError::Abi(_)
            | ViewError::Decode(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "success": false,
            "error": { "code": code, "message": self.to_string() },
        }));
        (status, body).into_response()
    }
}
