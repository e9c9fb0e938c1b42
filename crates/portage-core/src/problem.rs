//! RFC 7807 problem responses for API handlers.

use std::collections::BTreeMap;

use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

/// A problem response to send to the client (RFC 7807).
#[derive(Debug, Clone)]
pub struct Problem {
    pub status_code: StatusCode,
    pub body: BTreeMap<String, Value>,
}

/// Create a new `Problem` with the given status code.
pub fn new(status_code: StatusCode) -> Problem {
    Problem {
        status_code,
        body: BTreeMap::new(),
    }
}

impl Problem {
    pub fn with_title<S: Into<String>>(self, value: S) -> Self {
        self.with_value("title", Value::String(value.into()))
    }

    pub fn with_detail<S: Into<String>>(self, value: S) -> Self {
        self.with_value("detail", Value::String(value.into()))
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let mut body = self.body;
        body.entry("status".to_string())
            .or_insert_with(|| Value::from(self.status_code.as_u16()));
        (
            self.status_code,
            [(CONTENT_TYPE, "application/problem+json")],
            Json(body),
        )
            .into_response()
    }
}
