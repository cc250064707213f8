use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use derive_more::Display;

use serde::Serialize;

#[derive(Serialize)]
struct JsonError {
    message: String,
}

#[derive(Debug, Display)]
pub enum ServiceError {
    #[display(fmt = "Unauthorized")]
    Unauthorized { message: String },

    #[display(fmt = "NotFound")]
    NotFound,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::Unauthorized { message } => message.clone(),
            ServiceError::NotFound => "Not Found".into(),
        };

        HttpResponse::build(self.status_code()).json(JsonError { message })
    }
}

#[derive(Debug, Display)]
pub enum SettingsError {
    #[display(fmt = "failed to load settings: {}", _0)]
    Load(config::ConfigError),

    #[display(fmt = "invalid setting `{}`: {}", key, message)]
    Invalid { key: &'static str, message: String },
}

impl std::error::Error for SettingsError {}

impl From<config::ConfigError> for SettingsError {
    fn from(e: config::ConfigError) -> Self {
        SettingsError::Load(e)
    }
}

impl SettingsError {
    pub(crate) fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        SettingsError::Invalid {
            key,
            message: message.into(),
        }
    }
}
