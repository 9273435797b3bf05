use super::models::{Config, StorageProvider};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Timeout must be positive: {field} = 0")]
    ZeroTimeout { field: String },

    #[error("queue.max_deliveries must be at least 1 when set")]
    ZeroMaxDeliveries,

    #[error("At least one rendition must be configured")]
    NoRenditions,

    #[error("Rendition suffix must not be empty")]
    EmptySuffix,

    #[error("Duplicate rendition suffix '{suffix}'")]
    DuplicateSuffix { suffix: String },

    #[error("Rendition '{suffix}' has a zero long edge")]
    ZeroLongEdge { suffix: String },

    #[error("Rendition '{suffix}' quality {quality} is outside 1..=100")]
    QualityOutOfRange { suffix: String, quality: u8 },

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("Storage prefix must not be empty: {field}")]
    EmptyPrefix { field: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_timeouts(config)?;
    validate_renditions(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }

    if config.queue.max_deliveries == Some(0) {
        return Err(ValidationError::ZeroMaxDeliveries);
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("queue.lease_timeout_ms", config.queue.lease_timeout_ms),
        ("worker.drain_timeout_ms", config.worker.drain_timeout_ms),
        (
            "processor.operation_timeout_ms",
            config.processor.operation_timeout_ms,
        ),
    ];

    for (field, value) in timeouts {
        if value == 0 {
            return Err(ValidationError::ZeroTimeout {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

/// Suffixes name the stored objects, so they must be unique and non-empty
fn validate_renditions(config: &Config) -> Result<(), ValidationError> {
    if config.renditions.is_empty() {
        return Err(ValidationError::NoRenditions);
    }

    let mut seen = HashSet::new();
    for spec in &config.renditions {
        if spec.suffix.is_empty() {
            return Err(ValidationError::EmptySuffix);
        }
        if !seen.insert(spec.suffix.as_str()) {
            return Err(ValidationError::DuplicateSuffix {
                suffix: spec.suffix.clone(),
            });
        }
        if spec.long_edge == 0 {
            return Err(ValidationError::ZeroLongEdge {
                suffix: spec.suffix.clone(),
            });
        }
        if !(1..=100).contains(&spec.quality) {
            return Err(ValidationError::QualityOutOfRange {
                suffix: spec.suffix.clone(),
                quality: spec.quality,
            });
        }
    }

    Ok(())
}

/// Validate storage credentials when provider is S3
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }

    for (field, value) in [
        ("storage.upload_prefix", &config.storage.upload_prefix),
        ("storage.media_prefix", &config.storage.media_prefix),
    ] {
        if value.trim_matches('/').is_empty() {
            return Err(ValidationError::EmptyPrefix {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{OutputFormat, RenditionSpec};

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.worker.concurrency = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroConcurrency)
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.processor.operation_timeout_ms = 0;

        match validate(&config) {
            Err(ValidationError::ZeroTimeout { field }) => {
                assert_eq!(field, "processor.operation_timeout_ms")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_zero_max_deliveries() {
        let mut config = Config::default();
        config.queue.max_deliveries = Some(0);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroMaxDeliveries)
        ));
    }

    #[test]
    fn test_duplicate_suffix() {
        let mut config = Config::default();
        config
            .renditions
            .push(RenditionSpec::new(100, 80, "_thumb", OutputFormat::Jpeg));

        assert!(matches!(
            validate(&config),
            Err(ValidationError::DuplicateSuffix { .. })
        ));
    }

    #[test]
    fn test_rendition_bounds() {
        let mut config = Config::default();
        config.renditions = vec![RenditionSpec::new(0, 80, "_zero", OutputFormat::Webp)];
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroLongEdge { .. })
        ));

        config.renditions = vec![RenditionSpec::new(100, 101, "_q", OutputFormat::Jpeg)];
        assert!(matches!(
            validate(&config),
            Err(ValidationError::QualityOutOfRange { quality: 101, .. })
        ));

        config.renditions = vec![RenditionSpec::new(100, 80, "", OutputFormat::Jpeg)];
        assert!(matches!(validate(&config), Err(ValidationError::EmptySuffix)));

        config.renditions.clear();
        assert!(matches!(validate(&config), Err(ValidationError::NoRenditions)));
    }

    #[test]
    fn test_s3_without_credentials() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::S3;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingS3Credentials)
        ));

        config.storage.access_key = Some("key".to_string());
        config.storage.secret_key = Some("secret".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_prefix() {
        let mut config = Config::default();
        config.storage.media_prefix = "/".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyPrefix { .. })
        ));
    }
}
