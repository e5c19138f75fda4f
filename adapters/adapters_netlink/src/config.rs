//! Configuration Module
//!
//! Tunables for the socket core. Defaults are used unless a `NETLINK_*`
//! environment variable overrides them.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use entities_netlink::{Result, SocketError};

/// Read size used when the OS cannot say how many bytes are pending
pub const DEFAULT_READ_SIZE: usize = 4096;
/// Upper bound on any read size reported by the OS
pub const MAX_READ_SIZE: usize = 1024 * 1024;
/// Pending-connection queue depth for servers
pub const DEFAULT_LISTEN_BACKLOG: u32 = 50;
/// How long a write waits for the handle to become writable again
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket core configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketConfig {
    pub default_read_size: usize,
    pub max_read_size: usize,
    pub listen_backlog: u32,
    /// Blocking mode applied to new handles
    pub blocking: bool,
    /// SO_REUSEADDR on server handles
    pub reuse_address: bool,
    pub write_timeout: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            default_read_size: DEFAULT_READ_SIZE,
            max_read_size: MAX_READ_SIZE,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
            blocking: true,
            reuse_address: true,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl SocketConfig {
    /// Build a configuration from `NETLINK_*` environment variables
    ///
    /// Unset variables keep their default. A variable that is set but does
    /// not parse fails with an argument error naming it.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            default_read_size: parse_var(&lookup, "NETLINK_READ_SIZE")?
                .unwrap_or(defaults.default_read_size),
            max_read_size: parse_var(&lookup, "NETLINK_MAX_READ_SIZE")?
                .unwrap_or(defaults.max_read_size),
            listen_backlog: parse_var(&lookup, "NETLINK_LISTEN_BACKLOG")?
                .unwrap_or(defaults.listen_backlog),
            blocking: parse_var(&lookup, "NETLINK_BLOCKING")?.unwrap_or(defaults.blocking),
            reuse_address: parse_var(&lookup, "NETLINK_REUSE_ADDRESS")?
                .unwrap_or(defaults.reuse_address),
            write_timeout: parse_var::<u64, _>(&lookup, "NETLINK_WRITE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants between fields
    pub fn validate(&self) -> Result<()> {
        if self.default_read_size == 0 {
            return Err(SocketError::argument("default read size must be positive"));
        }
        if self.max_read_size < self.default_read_size {
            return Err(SocketError::argument(format!(
                "max read size {} is below default read size {}",
                self.max_read_size, self.default_read_size
            )));
        }
        if self.listen_backlog == 0 {
            return Err(SocketError::argument("listen backlog must be positive"));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| SocketError::argument(format!("{} has invalid value {:?}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entities_netlink::ErrorKind;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SocketConfig::default();
        assert_eq!(config.default_read_size, 4096);
        assert_eq!(config.listen_backlog, 50);
        assert!(config.blocking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_lookup_gives_defaults() {
        let config = SocketConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SocketConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = SocketConfig::from_lookup(lookup_from(&[
            ("NETLINK_READ_SIZE", "8192"),
            ("NETLINK_LISTEN_BACKLOG", " 16 "),
            ("NETLINK_BLOCKING", "false"),
            ("NETLINK_WRITE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.default_read_size, 8192);
        assert_eq!(config.listen_backlog, 16);
        assert!(!config.blocking);
        assert_eq!(config.write_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_unparsable_value_is_argument_error() {
        let err = SocketConfig::from_lookup(lookup_from(&[("NETLINK_READ_SIZE", "lots")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert!(err.to_string().contains("NETLINK_READ_SIZE"));
    }

    #[test]
    fn test_inconsistent_sizes_rejected() {
        let err = SocketConfig::from_lookup(lookup_from(&[
            ("NETLINK_READ_SIZE", "8192"),
            ("NETLINK_MAX_READ_SIZE", "1024"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }
}
