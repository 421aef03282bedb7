//! URL validation run before any socket is opened.
//!
//! The audit target is caller-supplied, so every fetch goes through this
//! guard: scheme allow-list plus loopback/private-range blocking.

use ipnet::IpNet;
use std::net::IpAddr;
use url::{Host, Url};

use crate::error::{SecurityError, SecurityResult};

/// Validates URLs against scheme and address-range policy.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    blocked_cidrs: Vec<IpNet>,
    allow_private: bool,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    /// Create a validator with the standard blocked ranges.
    pub fn new() -> Self {
        let blocked_cidrs = [
            "127.0.0.0/8",
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "169.254.0.0/16",
            "100.64.0.0/10",
            "0.0.0.0/8",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
        ]
        .iter()
        .map(|c| c.parse().expect("static CIDR parses"))
        .collect();

        Self {
            blocked_cidrs,
            allow_private: false,
        }
    }

    /// Permit loopback/private targets (tests against local fixtures).
    pub fn allowing_private(mut self) -> Self {
        self.allow_private = true;
        self
    }

    /// Validate a parsed URL.
    pub fn validate(&self, url: &Url) -> SecurityResult<()> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SecurityError::DisallowedScheme(url.scheme().to_string()));
        }

        match url.host() {
            None => Err(SecurityError::NoHost),
            Some(Host::Domain(domain)) => {
                if !self.allow_private && domain.eq_ignore_ascii_case("localhost") {
                    return Err(SecurityError::BlockedHost(domain.to_string()));
                }
                Ok(())
            }
            Some(Host::Ipv4(ip)) => self.check_ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => self.check_ip(IpAddr::V6(ip)),
        }
    }

    /// Validate a raw URL string.
    pub fn validate_str(&self, raw: &str) -> SecurityResult<Url> {
        let url = Url::parse(raw)?;
        self.validate(&url)?;
        Ok(url)
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        if self.allow_private {
            return Ok(());
        }
        for cidr in &self.blocked_cidrs {
            if cidr.contains(&ip) {
                return Err(SecurityError::BlockedCidr(cidr.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_public_hosts() {
        let validator = UrlValidator::new();
        assert!(validator.validate_str("https://example.com/page").is_ok());
        assert!(validator.validate_str("http://93.184.216.34/").is_ok());
    }

    #[test]
    fn test_blocks_schemes() {
        let validator = UrlValidator::new();
        assert!(matches!(
            validator.validate_str("file:///etc/passwd"),
            Err(SecurityError::DisallowedScheme(_)) | Err(SecurityError::NoHost)
        ));
        assert!(matches!(
            validator.validate_str("ftp://example.com"),
            Err(SecurityError::DisallowedScheme(_))
        ));
    }

    #[test]
    fn test_blocks_private_ranges() {
        let validator = UrlValidator::new();
        assert!(validator.validate_str("http://127.0.0.1/").is_err());
        assert!(validator.validate_str("http://10.1.2.3/").is_err());
        assert!(validator.validate_str("http://192.168.1.1/").is_err());
        assert!(validator.validate_str("http://169.254.169.254/meta").is_err());
        assert!(validator.validate_str("http://localhost/").is_err());
    }

    #[test]
    fn test_private_allowed_for_fixtures() {
        let validator = UrlValidator::new().allowing_private();
        assert!(validator.validate_str("http://127.0.0.1:8080/").is_ok());
        assert!(validator.validate_str("http://localhost:3000/").is_ok());
    }
}
