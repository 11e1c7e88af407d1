//! Response envelopes shared by every route.
//!
//! Single resources are wrapped as `{"data": ...}`, lists use
//! [`Paginated`](super::Paginated).

use axum::{
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for DataResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Confirmation for commands that return no resource.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 201 with a `Location` header pointing at the resource.
pub struct Created<T: Serialize> {
    location: String,
    body: DataResponse<T>,
}

impl<T: Serialize> Created<T> {
    pub fn at(location: impl Into<String>, data: T) -> Self {
        Self {
            location: location.into(),
            body: DataResponse::new(data),
        }
    }
}

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::CREATED, Json(self.body)).into_response();
        // Locations are built from ids and route literals
        if let Ok(value) = HeaderValue::from_str(&self.location) {
            response.headers_mut().insert(LOCATION, value);
        }
        response
    }
}

/// 204 for deletes and detaches.
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_sets_location() {
        let response = Created::at("/tenders/42", json!({ "id": 42 })).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[LOCATION], "/tenders/42");
    }

    #[test]
    fn test_no_content() {
        assert_eq!(NoContent.into_response().status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_data_envelope() {
        let body = serde_json::to_value(DataResponse::new(json!({ "status": "draft" }))).unwrap();
        assert_eq!(body, json!({ "data": { "status": "draft" } }));
    }
}
