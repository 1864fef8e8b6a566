use thiserror::Error;

use crate::{
    api::{ApiError, TransportError},
    config::LoadError,
    guard::{NavigationError, RouteError},
    infra::error::InfraError,
    session::StorageError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("invalid value `{value}` for route parameter `{name}`")]
    InvalidParameter { name: &'static str, value: String },
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Short line for the actor: the first server message for remote
    /// failures, the full error otherwise.
    pub fn notice(&self) -> String {
        match self {
            AppError::Api(error) => error.first_message().to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_surface_their_first_message() {
        let error = AppError::from(ApiError::new(
            401,
            vec!["Credenciales inválidas".into(), "segundo".into()],
        ));
        assert_eq!(error.notice(), "Credenciales inválidas");
    }

    #[test]
    fn other_errors_surface_their_display() {
        let error = AppError::from(NavigationError::NoRoute {
            path: "/x".into(),
        });
        assert_eq!(error.notice(), "no route matches `/x`");
    }
}
