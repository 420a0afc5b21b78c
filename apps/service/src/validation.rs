use std::net::IpAddr;
use url::Url;

use crate::database::models::{MAX_CHECK_INTERVAL_SECONDS, MIN_CHECK_INTERVAL_SECONDS, Service};
use crate::monitoring::probes::target::host_and_port;
use crate::monitoring::types::ServiceType;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn into_result(self) -> Result<(), String> {
        if self.is_valid { Ok(()) } else { Err(self.error.unwrap_or_else(|| "Validation failed".to_string())) }
    }
}

fn validate_url(target: &str, schemes: &[&str]) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if !schemes.contains(&scheme) {
                return ValidationResult::err(format!("Invalid scheme '{scheme}'. Must be {}", schemes.join(" or ")));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                ValidationResult::err(format!("URL must include scheme ({}://)", schemes.join(":// or ")))
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_endpoint(target: &str) -> ValidationResult {
    validate_url(target, &["http", "https"])
}

/// Validate HTTPS URL endpoint
pub fn validate_https_endpoint(target: &str) -> ValidationResult {
    validate_url(target, &["https"])
}

/// Validate TCP endpoint (host:port format or a URL with a port)
pub fn validate_tcp_endpoint(target: &str) -> ValidationResult {
    match host_and_port(target, None) {
        Ok(_) => ValidationResult::ok(),
        Err(e) => ValidationResult::err(e),
    }
}

/// Validate a certificate endpoint (host, host:port or URL)
pub fn validate_ssl_endpoint(target: &str) -> ValidationResult {
    match host_and_port(target, Some(443)) {
        Ok((host, _)) => validate_hostname(&host),
        Err(e) => ValidationResult::err(e),
    }
}

/// Validate an IP address or hostname, as used by ping and DNS checks
pub fn validate_hostname(target: &str) -> ValidationResult {
    let target = target.trim();
    if target.is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    if target.parse::<IpAddr>().is_ok() {
        return ValidationResult::ok();
    }

    if target.contains(' ') {
        return ValidationResult::err("Target cannot contain spaces");
    }

    if target.starts_with('-') || target.ends_with('-') {
        return ValidationResult::err("Hostname cannot start or end with hyphen");
    }

    if target.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_') {
        ValidationResult::ok()
    } else {
        ValidationResult::err("Invalid hostname. Use IP address or valid hostname")
    }
}

/// Validate monitor target based on check type
pub fn validate_target(target: &str, service_type: ServiceType) -> ValidationResult {
    match service_type {
        ServiceType::Http => validate_http_endpoint(target),
        ServiceType::Https => validate_https_endpoint(target),
        ServiceType::Tcp => validate_tcp_endpoint(target),
        ServiceType::Ssl => validate_ssl_endpoint(target),
        ServiceType::Ping | ServiceType::Dns => validate_hostname(target),
    }
}

/// Validate service name
pub fn validate_name(name: &str) -> ValidationResult {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return ValidationResult::err("Name cannot be empty");
    }

    if trimmed.len() > 100 {
        return ValidationResult::err("Name too long (max 100 characters)");
    }

    ValidationResult::ok()
}

/// Validate check interval
pub fn validate_interval(interval: u64) -> ValidationResult {
    if interval < MIN_CHECK_INTERVAL_SECONDS {
        return ValidationResult::err(format!("Interval must be at least {MIN_CHECK_INTERVAL_SECONDS} seconds"));
    }

    if interval > MAX_CHECK_INTERVAL_SECONDS {
        return ValidationResult::err(format!("Interval too long (max {MAX_CHECK_INTERVAL_SECONDS} seconds)"));
    }

    ValidationResult::ok()
}

/// Everything a service definition must satisfy before it is stored
pub fn validate_service(service: &Service) -> Result<(), String> {
    validate_name(&service.name).into_result()?;
    validate_target(&service.target, service.service_type).into_result()?;
    validate_interval(service.check_interval_seconds).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_validation() {
        assert!(validate_http_endpoint("http://example.com").is_valid);
        assert!(validate_http_endpoint("https://example.com").is_valid);
        assert!(validate_http_endpoint("http://192.168.1.1").is_valid);
        assert!(validate_http_endpoint("http://example.com:8080/path").is_valid);

        assert!(!validate_http_endpoint("").is_valid);
        assert!(!validate_http_endpoint("example.com").is_valid);
        assert!(!validate_http_endpoint("ftp://example.com").is_valid);
    }

    #[test]
    fn test_https_validation() {
        assert!(validate_https_endpoint("https://example.com").is_valid);
        assert!(!validate_https_endpoint("http://example.com").is_valid);
        assert!(!validate_https_endpoint("").is_valid);
    }

    #[test]
    fn test_tcp_validation() {
        assert!(validate_tcp_endpoint("localhost:8080").is_valid);
        assert!(validate_tcp_endpoint("192.168.1.1:443").is_valid);
        assert!(validate_tcp_endpoint("[::1]:5432").is_valid);
        assert!(validate_tcp_endpoint("https://example.com").is_valid);

        assert!(!validate_tcp_endpoint("").is_valid);
        assert!(!validate_tcp_endpoint("localhost").is_valid);
        assert!(!validate_tcp_endpoint("localhost:").is_valid);
        assert!(!validate_tcp_endpoint("localhost:abc").is_valid);
    }

    #[test]
    fn test_ssl_validation() {
        assert!(validate_ssl_endpoint("example.com").is_valid);
        assert!(validate_ssl_endpoint("example.com:8443").is_valid);
        assert!(validate_ssl_endpoint("https://example.com/health").is_valid);
        assert!(!validate_ssl_endpoint("bad host:443").is_valid);
    }

    #[test]
    fn test_hostname_validation() {
        assert!(validate_hostname("192.168.1.1").is_valid);
        assert!(validate_hostname("2001:db8::1").is_valid);
        assert!(validate_hostname("sub.example.com").is_valid);

        assert!(!validate_hostname("").is_valid);
        assert!(!validate_hostname("invalid hostname").is_valid);
        assert!(!validate_hostname("-flag").is_valid);
    }

    #[test]
    fn test_interval_validation() {
        assert!(validate_interval(10).is_valid);
        assert!(validate_interval(3600).is_valid);
        assert!(!validate_interval(9).is_valid);
        assert!(!validate_interval(3601).is_valid);
    }

    #[test]
    fn test_service_validation() {
        let service = Service::new("api", ServiceType::Tcp, "db.internal:5432");
        assert!(validate_service(&service).is_ok());

        let error = validate_service(&service.clone().with_interval(5)).unwrap_err();
        assert!(error.contains("at least 10"));

        let bad_target = Service::new("api", ServiceType::Https, "http://example.com");
        assert!(validate_service(&bad_target).is_err());
    }
}
