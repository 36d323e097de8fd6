use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::admin::store::{MappingKey, RequestRecord, StoreError};
use crate::admin::AdminState;
use crate::capture::CapturePolicy;
use crate::har::{self, CodecError, Creator, Har};

/// Structured body of every non-data operator response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseBody {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Payload could not be parsed")]
    BadPayload,

    #[error("IP address, package and platform are required for a mapping")]
    MissingFields,

    #[error("Invalid value for id param")]
    InvalidId,

    /// Carries the value of the `Allow` header.
    #[error("Method not allowed")]
    MethodNotAllowed(&'static str),

    #[error("Error writing to store")]
    Store(#[from] StoreError),

    #[error("Error encoding entries")]
    Codec(#[from] CodecError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadPayload | ApiError::MissingFields | ApiError::InvalidId => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Store operation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Codec(e) => {
                tracing::error!(error = %e, "HAR export failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ResponseBody {
            success: false,
            message: self.to_string(),
        });

        match self {
            ApiError::MethodNotAllowed(allow) => {
                (status, [(header::ALLOW, allow)], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

/// `POST /mappings` creates, `DELETE /mappings` removes every matching mapping.
pub async fn mappings(
    State(state): State<AdminState>,
    method: Method,
    body: Bytes,
) -> Result<Response, ApiError> {
    if method != Method::POST && method != Method::DELETE {
        tracing::warn!(method = %method, "Mapping method not allowed");
        return Err(ApiError::MethodNotAllowed("POST, DELETE"));
    }

    let key: MappingKey = serde_json::from_slice(&body).map_err(|_| ApiError::BadPayload)?;
    if !key.is_complete() {
        return Err(ApiError::MissingFields);
    }

    if method == Method::DELETE {
        let removed = state.store.delete_matching(&key)?;
        tracing::info!(
            ip_address = %key.ip_address,
            package = %key.package,
            platform = %key.platform,
            removed,
            "Mappings deleted"
        );
        return Ok(Json(ResponseBody {
            success: true,
            message: format!("Deleted {removed} mapping(s)"),
        })
        .into_response());
    }

    tracing::info!(
        ip_address = %key.ip_address,
        package = %key.package,
        platform = %key.platform,
        "Adding mapping"
    );
    let mapping = state.store.create_mapping(key)?;
    Ok(Json(mapping).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub id: Option<String>,
}

/// `GET /mappings/requests?id=<mapping id>`
pub async fn mapping_requests(
    State(state): State<AdminState>,
    method: Method,
    Query(query): Query<RequestsQuery>,
) -> Result<Json<Vec<RequestRecord>>, ApiError> {
    if method != Method::GET {
        return Err(ApiError::MethodNotAllowed("GET"));
    }
    let id = query
        .id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or(ApiError::InvalidId)?;
    Ok(Json(state.store.requests_for(&id)))
}

/// `GET /entries`: retained entries as a HAR document, oldest first.
pub async fn export_entries(State(state): State<AdminState>) -> Result<Response, ApiError> {
    let har = Har::new(Creator::default(), state.capturer.registry().entries());
    let body = har::serialize_har(&har)?;
    Ok((
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        body,
    )
        .into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetSummary {
    pub success: bool,
    pub cleared: usize,
}

/// `POST /entries/reset`
pub async fn reset_entries(State(state): State<AdminState>) -> Json<ResetSummary> {
    let cleared = state.capturer.registry().reset();
    tracing::info!(cleared, "Entry registry reset");
    Json(ResetSummary {
        success: true,
        cleared,
    })
}

pub async fn get_policy(State(state): State<AdminState>) -> Json<CapturePolicy> {
    Json(state.capturer.policy())
}

pub async fn put_policy(
    State(state): State<AdminState>,
    Json(policy): Json<CapturePolicy>,
) -> Json<CapturePolicy> {
    state.capturer.set_policy(policy);
    Json(policy)
}
