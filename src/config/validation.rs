use crate::config::types::{Config, CrawlSection, CrawlerSettings};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_section(&config.crawl)?;
    validate_crawler_settings(&config.crawler)?;
    Ok(())
}

/// Validates what to harvest, including the time window ordering
fn validate_crawl_section(section: &CrawlSection) -> Result<(), ConfigError> {
    if section.group.trim().is_empty() {
        return Err(ConfigError::Validation("group cannot be empty".to_string()));
    }

    if section.cookie.trim().is_empty() {
        return Err(ConfigError::Validation("cookie cannot be empty".to_string()));
    }

    if section.output.trim().is_empty() {
        return Err(ConfigError::Validation("output cannot be empty".to_string()));
    }

    let resolved = section.resolve()?;
    if let (Some(start), Some(end)) = (&resolved.window.start, &resolved.window.end) {
        if start > end {
            return Err(ConfigError::Validation(format!(
                "start ({}) must not be later than end ({})",
                start, end
            )));
        }
    }

    Ok(())
}

/// Validates pipeline tuning
fn validate_crawler_settings(settings: &CrawlerSettings) -> Result<(), ConfigError> {
    let base = Url::parse(&settings.api_base)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-base: {}", e)))?;
    if base.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "api-base '{}' cannot be used as a base URL",
            settings.api_base
        )));
    }

    if settings.page_size < 1 || settings.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            settings.page_size
        )));
    }

    if settings.media_workers < 1 || settings.media_workers > 16 {
        return Err(ConfigError::Validation(format!(
            "media-workers must be between 1 and 16, got {}",
            settings.media_workers
        )));
    }

    if settings.download_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "download-attempts must be >= 1, got {}",
            settings.download_attempts
        )));
    }

    if settings.poll_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "poll-interval-ms must be >= 1".to_string(),
        ));
    }

    if settings.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
