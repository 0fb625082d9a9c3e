// src/error.rs
//! Error types for the navigation coordinator

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NavError>;

/// Top-level error surfaced to the caller
#[derive(Debug, Error)]
pub enum NavError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
}

/// Fixture, plan file and config file problems. Always recoverable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Failures reported by a routing service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("no route found")]
    NoRoute,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("routing service returned {code}: {message}")]
    Service { code: String, message: String },
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RoutingError {
    fn from(error: reqwest::Error) -> Self {
        RoutingError::Http(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("route plan has no legs")]
    Empty,
    #[error("leg {index} ({name}) could not be resolved: {source}")]
    Leg {
        index: usize,
        name: String,
        #[source]
        source: RoutingError,
    },
    #[error("leg {index} ({name}) has an unusable route: {reason}")]
    InvalidLeg {
        index: usize,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("navigation already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_error_message() {
        let err = PlanError::Leg {
            index: 1,
            name: "parking".to_string(),
            source: RoutingError::NoRoute,
        };
        assert_eq!(
            err.to_string(),
            "leg 1 (parking) could not be resolved: no route found"
        );
    }

    #[test]
    fn test_every_nav_error_keeps_its_cause() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "plan.json");
        let json = serde_json::from_str::<u8>("x").unwrap_err();
        let errors: Vec<NavError> = vec![
            io.into(),
            json.into(),
            ConfigError::Invalid("plan has no legs".to_string()).into(),
            RoutingError::NoRoute.into(),
            PlanError::Empty.into(),
            CoordinatorError::AlreadyStarted.into(),
        ];

        for err in &errors {
            assert!(err.source().is_some(), "{} lost its cause", err);
        }
    }

    #[test]
    fn test_wrapping_into_nav_error() {
        let err: NavError = ConfigError::Invalid("empty waypoint list".to_string()).into();
        assert!(matches!(err, NavError::Config(_)));
        assert_eq!(err.to_string(), "Config error: empty waypoint list");
    }
}
