//! Error types shared by the loader, the cache and the facade

/// Why a bundle load attempt failed.
///
/// Every failure is terminal for that attempt and leaves the cache untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No storage tier reported the bundle
    TierNotFound(String),
    /// The transport behind the tier reported an error
    Transport(String),
    /// The fetched bytes did not decode into a container
    Decode(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TierNotFound(name) => write!(f, "bundle not found in any tier: {name}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

/// A composite resource key that does not split into `bundle###resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The offending key
    Malformed(String),
}

impl std::fmt::Display for KeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(key) => {
                write!(f, "malformed resource key {key:?}, expected \"bundle###resource\"")
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// Errors raised while reading a loader configuration file
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error
    IoError(String),
    /// Parse error
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
