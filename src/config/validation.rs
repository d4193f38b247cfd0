//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval and timeout > 0)
//! - Check that every backend is an absolute URL with a host
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("health_check.interval_ms must be > 0")]
    ZeroInterval,

    #[error("health_check.timeout_ms must be > 0")]
    ZeroTimeout,

    #[error("health_check.user_agent is empty")]
    EmptyUserAgent,

    #[error("invalid backend {backend:?}: {reason}")]
    InvalidBackend { backend: String, reason: String },

    #[error("backend {0:?} has no host")]
    BackendWithoutHost(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.health_check.user_agent.trim().is_empty() {
        errors.push(ValidationError::EmptyUserAgent);
    }

    for backend in &config.backends {
        match Url::parse(backend) {
            Ok(url) if url.host_str().is_none() => {
                errors.push(ValidationError::BackendWithoutHost(backend.clone()));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidBackend {
                backend: backend.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BalancerConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = BalancerConfig::default();
        config.health_check.interval_ms = 0;
        config.health_check.timeout_ms = 0;
        config.health_check.user_agent = "  ".into();
        config.backends = vec![
            "http://127.0.0.1:9200".into(),
            "://broken".into(),
            "unix:/var/run/app.sock".into(),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::ZeroInterval));
        assert!(errors.contains(&ValidationError::ZeroTimeout));
        assert!(errors.contains(&ValidationError::EmptyUserAgent));
        assert!(errors.contains(&ValidationError::BackendWithoutHost(
            "unix:/var/run/app.sock".into()
        )));
        assert!(matches!(
            &errors[3],
            ValidationError::InvalidBackend { backend, .. } if backend == "://broken"
        ));
    }
}
