use crate::models::{Category, CategoryScheme};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A single problem reported against an input, whatever shape the server
/// used to describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// How the caller should present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Block the action and show the problem next to the input.
    ShowInline,
    /// Transient notification; local state is preserved for a retry.
    Notify,
    /// Leave the current view for a safe default and notify.
    RedirectToSafeView,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Missing required photos: {}", join_labels(.0))]
    MissingCategories(Vec<Category>),

    #[error("Invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Upload(String),

    #[error("An upload for the {0} angle is already in progress")]
    UploadInProgress(Category),

    #[error("No staged file with id {0}")]
    UnknownFile(Uuid),

    #[error("Category '{category}' is not used by the {scheme} flow")]
    CategoryNotAllowed {
        category: Category,
        scheme: CategoryScheme,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_labels(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter()
                    .map(|e| {
                        let message = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        FieldError::new(field.clone(), message)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ClientError::Validation(fields)
    }
}

impl ClientError {
    /// Builds the error for a non-2xx response from its status and raw body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let (message, fields) = match serde_json::from_slice::<Value>(body) {
            Ok(json) => normalize_error_body(&json),
            Err(_) => (String::from_utf8_lossy(body).trim().to_string(), Vec::new()),
        };
        let message = if message.is_empty() {
            default_reason(status).to_string()
        } else {
            message
        };

        match status {
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            _ => ClientError::Server {
                status,
                message,
                fields,
            },
        }
    }

    /// The message a remote failure carried, verbatim.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Server { message, .. }
            | ClientError::NotFound(message)
            | ClientError::Forbidden(message)
            | ClientError::Unauthorized(message)
            | ClientError::Upload(message) => Some(message),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[FieldError] {
        match self {
            ClientError::Server { fields, .. } | ClientError::Validation(fields) => fields,
            _ => &[],
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            ClientError::MissingCategories(_)
            | ClientError::Validation(_)
            | ClientError::CategoryNotAllowed { .. }
            | ClientError::UnknownFile(_) => Recovery::ShowInline,
            ClientError::NotFound(_) | ClientError::Forbidden(_) | ClientError::Unauthorized(_) => {
                Recovery::RedirectToSafeView
            }
            _ => Recovery::Notify,
        }
    }
}

/// Flattens the error bodies the API produces into one summary message plus
/// per-field entries.
///
/// Handles `{"detail": "..."}`, `{"detail": [{"loc": [..], "msg": ".."}]}`,
/// `{"detail": {"msg": ".."}}` and the `error`/`message` keys used by other
/// services.
pub fn normalize_error_body(body: &Value) -> (String, Vec<FieldError>) {
    let detail = ["detail", "error", "message"]
        .iter()
        .find_map(|key| body.get(*key))
        .unwrap_or(body);

    match detail {
        Value::String(s) => (s.clone(), Vec::new()),
        Value::Array(items) => {
            let fields: Vec<FieldError> = items.iter().filter_map(field_error_from).collect();
            let message = fields
                .iter()
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            (message, fields)
        }
        Value::Object(_) => match field_error_from(detail) {
            Some(f) => (f.message.clone(), vec![f]),
            None => (String::new(), Vec::new()),
        },
        _ => (String::new(), Vec::new()),
    }
}

fn field_error_from(item: &Value) -> Option<FieldError> {
    match item {
        Value::String(s) => Some(FieldError::general(s.clone())),
        Value::Object(obj) => {
            let message = obj
                .get("msg")
                .or_else(|| obj.get("message"))
                .and_then(Value::as_str)?
                .to_string();
            let field = obj.get("loc").and_then(location_field);
            Some(FieldError { field, message })
        }
        _ => None,
    }
}

/// `["body", "policy_number"]` → `policy_number`. The leading `body`/`query`
/// segment names the transport, not the field.
fn location_field(loc: &Value) -> Option<String> {
    match loc {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let segments: Vec<String> = parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            let start = match segments.first().map(String::as_str) {
                Some("body" | "query" | "path" | "form") if segments.len() > 1 => 1,
                _ => 0,
            };
            let joined = segments[start..].join(".");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Request failed",
    }
}
