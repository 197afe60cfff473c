//! Remote template location parsing.

use url::Url;
use vmforge_shared::errors::{VmforgeError, VmforgeResult};

/// Fetch transport selected by the URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Git,
}

/// A parsed remote template location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub transport: Transport,
    /// Location handed to the transport, with any `git+` qualifier removed.
    pub url: String,
}

impl RemoteSource {
    /// Parse `git://`, `git+http://` or `git+https://` locations.
    ///
    /// Malformed locations are [`VmforgeError::Config`]; well-formed ones with
    /// any other scheme are [`VmforgeError::Unsupported`].
    pub fn parse(remote: &str) -> VmforgeResult<Self> {
        let remote = remote.trim();
        let parsed = Url::parse(remote).map_err(|e| {
            VmforgeError::Config(format!("remote location {:?} is invalid: {}", remote, e))
        })?;
        if parsed.host_str().is_none_or(str::is_empty) && parsed.path().is_empty() {
            return Err(VmforgeError::Config(format!(
                "remote location {:?} has no path",
                remote
            )));
        }

        let scheme = parsed.scheme();
        match scheme {
            "git" | "git+http" | "git+https" => {
                let transport_scheme = scheme.strip_prefix("git+").unwrap_or(scheme);
                let rest = remote.find(':').map_or("", |colon| &remote[colon..]);
                let url = format!("{}{}", transport_scheme, rest);
                Ok(Self {
                    transport: Transport::Git,
                    url,
                })
            }
            _ => Err(VmforgeError::Unsupported(format!(
                "scheme {:?} not supported",
                scheme
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_schemes() {
        let src = RemoteSource::parse("git://example.com/templates.git").unwrap();
        assert_eq!(src.transport, Transport::Git);
        assert_eq!(src.url, "git://example.com/templates.git");

        let src = RemoteSource::parse("git+https://example.com/templates.git").unwrap();
        assert_eq!(src.url, "https://example.com/templates.git");

        let src = RemoteSource::parse("git+http://example.com/t").unwrap();
        assert_eq!(src.url, "http://example.com/t");
    }

    #[test]
    fn test_other_schemes_rejected() {
        let err = RemoteSource::parse("https://example.com/templates.git").unwrap_err();
        assert!(matches!(err, VmforgeError::Unsupported(_)));
        assert_eq!(err.to_string(), "unsupported: scheme \"https\" not supported");

        assert!(matches!(
            RemoteSource::parse("svn+ssh://example.com/repo"),
            Err(VmforgeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_missing_scheme_is_config_error() {
        assert!(matches!(
            RemoteSource::parse("example.com/templates.git"),
            Err(VmforgeError::Config(_))
        ));
        assert!(matches!(
            RemoteSource::parse("git://"),
            Err(VmforgeError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_locations_are_config_errors() {
        for bad in ["git://exa mple.com/repo", "git+https://[::1/repo", "://example.com/repo"] {
            assert!(
                matches!(RemoteSource::parse(bad), Err(VmforgeError::Config(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_scheme_case_is_normalized() {
        let src = RemoteSource::parse("GIT+HTTPS://example.com/Templates.git").unwrap();
        assert_eq!(src.url, "https://example.com/Templates.git");
    }
}
