use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Ok,
    Exists,
    NotFound,
    Forbidden,
    InsufficientBalance,
    Error,
    Internal,
}

/// Outcome of a handler invocation: a status plus optional payload.
///
/// Domain failures travel as outcomes; only infrastructure failures use the
/// error channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OperationStatus,
    pub data: Option<Value>,
}

impl Outcome {
    pub fn ok<T: Serialize>(data: T) -> Self {
        Self {
            status: OperationStatus::Ok,
            data: serde_json::to_value(data).ok(),
        }
    }

    pub fn status(status: OperationStatus) -> Self {
        Self { status, data: None }
    }

    pub fn message(status: OperationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            data: Some(Value::String(message.into())),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OperationStatus::Ok
    }
}

/// Queue envelope shared by requests and responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Verb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn request(request_id: impl Into<String>, class_name: impl Into<String>, method: Verb, data: Value) -> Self {
        Self {
            request_id: request_id.into(),
            request_class_name: Some(class_name.into()),
            method: Some(method),
            request_data: Some(data),
            status: None,
            data: None,
        }
    }

    pub fn response(request_id: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            request_id: request_id.into(),
            request_class_name: None,
            method: None,
            request_data: None,
            status: Some(outcome.status),
            data: outcome.data,
        }
    }
}
