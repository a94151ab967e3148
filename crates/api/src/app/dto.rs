//! The response envelope and request extractors that keep rejections inside it.

use axum::async_trait;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde::de::DeserializeOwned;

use forgepos_core::AggregateId;

use crate::app::errors::ApiError;

/// `{ status, message, data, errors }`, the shape of every response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    pub data: Option<T>,
    pub errors: Option<Vec<String>>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }
}

impl Envelope<()> {
    pub fn error(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            data: None,
            errors: Some(errors),
        }
    }
}

pub type ApiResult = Result<Response, ApiError>;

pub fn ok<T: Serialize>(message: &str, data: T) -> ApiResult {
    respond(StatusCode::OK, message, data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> ApiResult {
    respond(StatusCode::CREATED, message, data)
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> ApiResult {
    Ok((status, Json(Envelope::success(message, data))).into_response())
}

/// Parse a path id, naming the resource in the error.
pub fn parse_id(raw: &str, kind: &str) -> Result<AggregateId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("'{raw}' is not a valid {kind} id")))
}

/// `Json<T>` whose rejection is a 400 envelope.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// `Query<T>` whose rejection is a 400 envelope.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection: QueryRejection| ApiError::BadRequest(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(Envelope::success("done", 7)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"status": "success", "message": "done", "data": 7, "errors": null})
        );
    }

    #[test]
    fn error_envelope_shape() {
        let body = serde_json::to_value(Envelope::error("conflict", vec!["sku taken".into()])).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["data"], serde_json::Value::Null);
        assert_eq!(body["errors"][0], "sku taken");
    }

    #[test]
    fn bad_ids_are_bad_requests() {
        assert!(matches!(parse_id("nope", "product"), Err(ApiError::BadRequest(_))));
        let id = AggregateId::new();
        assert_eq!(parse_id(&id.to_string(), "product").unwrap(), id);
    }
}
