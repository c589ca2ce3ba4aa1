// Result object returned by every handler: { isSuccess, message?, data? }

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult<T> {
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            is_success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            is_success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Convert into a plain `Result`, using the message as the error
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.is_success {
            Ok(self.data)
        } else {
            Err(self.message.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for ActionResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => ActionResult::ok(data),
            Err(e) => ActionResult::failure(e.to_string()),
        }
    }
}
