//! Response classification.
//!
//! Transport status codes map onto six outcomes:
//!
//! | Code | Status           |
//! |------|------------------|
//! | 200  | `Success`        |
//! | 201  | `Created`        |
//! | 422  | `Errors`         |
//! | 404  | `NotFound`       |
//! | 500  | `ServerError`    |
//! | 406  | `NotAcceptable`  |
//!
//! Any other code fails with `Error::UnknownResponseStatus`. A 404 never
//! reaches callers as data: [`classify`] turns it into
//! `Error::RecordNotFound`.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;

/// A response as returned by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub code: u16,
    pub body: Option<String>,
}

impl RawResponse {
    pub fn new(code: u16, body: Option<String>) -> Self {
        RawResponse { code, body }
    }

    /// Response with a JSON body.
    pub fn json(code: u16, body: &Value) -> Self {
        RawResponse {
            code,
            body: Some(body.to_string()),
        }
    }

    pub fn empty(code: u16) -> Self {
        RawResponse { code, body: None }
    }
}

/// Semantic outcome of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Success,
    Created,
    Errors,
    NotFound,
    ServerError,
    NotAcceptable,
}

impl ResponseStatus {
    /// Map a status code.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownResponseStatus` for codes outside the six known
    /// ones.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            200 => Ok(ResponseStatus::Success),
            201 => Ok(ResponseStatus::Created),
            422 => Ok(ResponseStatus::Errors),
            404 => Ok(ResponseStatus::NotFound),
            500 => Ok(ResponseStatus::ServerError),
            406 => Ok(ResponseStatus::NotAcceptable),
            other => Err(Error::UnknownResponseStatus(other)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseStatus::Success | ResponseStatus::Created)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Created => "created",
            ResponseStatus::Errors => "errors",
            ResponseStatus::NotFound => "not_found",
            ResponseStatus::ServerError => "server_error",
            ResponseStatus::NotAcceptable => "not_acceptable",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified response: outcome plus parsed body.
#[derive(Clone, Debug, PartialEq)]
pub struct Classified {
    pub code: u16,
    pub status: ResponseStatus,
    pub body: Value,
}

/// Classify `raw`, received for a request to `path`.
///
/// A present, non-blank body is parsed as JSON; otherwise `default_body` is
/// called, which lets APIs answer a save with an empty body. Error pages
/// that are not JSON are kept as a string body.
///
/// # Errors
///
/// - `Error::RecordNotFound` for a 404
/// - `Error::UnknownResponseStatus` for codes outside the known set
/// - `Error::DeserializationError` for a 200 or 201 body that is not valid
///   JSON
pub fn classify<F>(path: &str, raw: &RawResponse, default_body: F) -> Result<Classified>
where
    F: FnOnce() -> Value,
{
    let status = ResponseStatus::from_code(raw.code)?;
    if status == ResponseStatus::NotFound {
        return Err(Error::RecordNotFound {
            path: path.to_string(),
        });
    }

    let body = match raw.body.as_deref() {
        Some(text) if !text.trim().is_empty() => match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(Error::DeserializationError(format!(
                    "Response body for {} is not JSON: {}",
                    path, e
                )))
            }
            Err(_) => Value::String(text.to_string()),
        },
        _ => default_body(),
    };

    Ok(Classified {
        code: raw.code,
        status,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_codes() {
        let cases = [
            (200, ResponseStatus::Success),
            (201, ResponseStatus::Created),
            (422, ResponseStatus::Errors),
            (404, ResponseStatus::NotFound),
            (500, ResponseStatus::ServerError),
            (406, ResponseStatus::NotAcceptable),
        ];
        for (code, status) in cases {
            assert_eq!(ResponseStatus::from_code(code).expect("known code"), status);
        }
    }

    #[test]
    fn test_unknown_code() {
        assert!(matches!(
            ResponseStatus::from_code(302),
            Err(Error::UnknownResponseStatus(302))
        ));
    }

    #[test]
    fn test_not_found_is_escalated() {
        let raw = RawResponse::json(404, &json!({"error": "gone"}));
        let result = classify("/api/dummies/1.json", &raw, || Value::Null);
        match result {
            Err(Error::RecordNotFound { path }) => assert_eq!(path, "/api/dummies/1.json"),
            other => panic!("expected RecordNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_body_falls_back_to_default() {
        let fallback = json!({"dummy": {"id": 1}});

        for body in [None, Some(String::new()), Some("   \n".to_string())] {
            let raw = RawResponse::new(200, body);
            let classified = classify("/dummies/1", &raw, || fallback.clone()).expect("classified");
            assert_eq!(classified.status, ResponseStatus::Success);
            assert_eq!(classified.body, fallback);
        }
    }

    #[test]
    fn test_body_is_parsed() {
        let raw = RawResponse::json(422, &json!({"title": ["can't be blank"]}));
        let classified = classify("/dummies", &raw, || Value::Null).expect("classified");
        assert_eq!(classified.status, ResponseStatus::Errors);
        assert_eq!(classified.body["title"][0], "can't be blank");
    }

    #[test]
    fn test_malformed_body() {
        let raw = RawResponse::new(200, Some("<html>".to_string()));
        assert!(matches!(
            classify("/dummies", &raw, || Value::Null),
            Err(Error::DeserializationError(_))
        ));
    }

    #[test]
    fn test_error_page_kept_as_text() {
        let page = "<html><body>Internal Server Error</body></html>";
        for code in [422, 406, 500] {
            let raw = RawResponse::new(code, Some(page.to_string()));
            let classified = classify("/dummies", &raw, || Value::Null).expect("classified");
            assert!(!classified.status.is_success());
            assert_eq!(classified.body, Value::String(page.to_string()));
        }
    }
}
