//! Transport addresses of the form `scheme://hostname:port`.

use crate::error::AddressError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A parsed transport address.
///
/// The scheme only determines the reported protocol label; every scheme is
/// carried over plain TCP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    scheme: String,
    hostname: String,
    port: u16,
}

impl Address {
    /// Builds an address from its parts. The scheme is lowercased.
    pub fn new(scheme: &str, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            hostname: hostname.into(),
            port,
        }
    }

    /// Parses an address such as `tcp://localhost:5666` or `tcp://[::1]:5666`.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| AddressError::MissingScheme(input.to_string()))?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(AddressError::InvalidScheme(scheme.to_string()));
        }

        // Anything after the authority (path, query) carries no meaning here.
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();

        let (hostname, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| AddressError::MissingHost(input.to_string()))?;
            let port = tail
                .strip_prefix(':')
                .ok_or_else(|| AddressError::MissingPort(input.to_string()))?;
            (host, port)
        } else {
            authority
                .rsplit_once(':')
                .ok_or_else(|| AddressError::MissingPort(input.to_string()))?
        };

        if hostname.is_empty() {
            return Err(AddressError::MissingHost(input.to_string()));
        }
        if port.is_empty() {
            return Err(AddressError::MissingPort(input.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(port.to_string()))?;

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            hostname: hostname.to_string(),
            port,
        })
    }

    /// Returns the scheme as written (lowercased).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the protocol label, i.e. the uppercased scheme.
    pub fn protocol(&self) -> String {
        self.scheme.to_ascii_uppercase()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns a `(host, port)` pair usable with tokio's socket constructors.
    pub fn socket_target(&self) -> (&str, u16) {
        (&self.hostname, self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hostname.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.hostname, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.hostname, self.port)
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Address {
    type Error = AddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&String> for Address {
    type Error = AddressError;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let addr = Address::parse("tcp://localhost:5666").unwrap();
        assert_eq!(addr.scheme(), "tcp");
        assert_eq!(addr.protocol(), "TCP");
        assert_eq!(addr.hostname(), "localhost");
        assert_eq!(addr.port(), 5666);
        assert_eq!(addr.to_string(), "tcp://localhost:5666");
    }

    #[test]
    fn test_parse_ipv6() {
        let addr = Address::parse("tcp://[::1]:7000").unwrap();
        assert_eq!(addr.hostname(), "::1");
        assert_eq!(addr.port(), 7000);
        assert_eq!(addr.to_string(), "tcp://[::1]:7000");
    }

    #[test]
    fn test_parse_ignores_path() {
        let addr = Address::parse("ws://example.com:80/chat?x=1").unwrap();
        assert_eq!(addr.protocol(), "WS");
        assert_eq!(addr.hostname(), "example.com");
        assert_eq!(addr.port(), 80);
    }

    #[test]
    fn test_parse_ephemeral_port() {
        let addr = Address::parse("tcp://127.0.0.1:0").unwrap();
        assert_eq!(addr.port(), 0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Address::parse("localhost:5666"),
            Err(AddressError::MissingScheme(_))
        ));
        assert!(matches!(
            Address::parse("t p://localhost:5666"),
            Err(AddressError::InvalidScheme(_))
        ));
        assert!(matches!(
            Address::parse("tcp://:5666"),
            Err(AddressError::MissingHost(_))
        ));
        assert!(matches!(
            Address::parse("tcp://localhost"),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            Address::parse("tcp://localhost:"),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            Address::parse("tcp://localhost:70000"),
            Err(AddressError::InvalidPort(_))
        ));
        assert!(matches!(
            Address::parse("tcp://[::1]7000"),
            Err(AddressError::MissingPort(_))
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let addr: Address = serde_json::from_str("\"tcp://localhost:5666\"").unwrap();
        assert_eq!(addr.port(), 5666);
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"tcp://localhost:5666\""
        );

        let bad: Result<Address, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
