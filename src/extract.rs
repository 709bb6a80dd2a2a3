//! Extractors that turn axum's plain-text rejections into `ApiError`s, so
//! every 4xx carries the same `{"error": ...}` body.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Season taken from the `:year` path segment.
#[derive(Debug, Clone, Copy)]
pub struct Year(pub u16);

#[async_trait]
impl<S> FromRequestParts<S> for Year
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(year) = Path::<u16>::from_request_parts(parts, state)
            .await
            .map_err(|rej| ApiError::bad_request(format!("Invalid year: {}", rej.body_text())))?;
        Ok(Year(year))
    }
}

/// JSON request body; anything that is not a JSON body is a 400.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(JsonRejection::MissingJsonContentType(_)) => {
                Err(ApiError::bad_request("Request must be JSON"))
            }
            Err(rej) => Err(ApiError::bad_request(rej.body_text())),
        }
    }
}
