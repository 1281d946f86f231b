//! Composite resource keys of the form `bundle###resource`

use std::fmt;

use crate::core::KeyError;

/// Separator between the bundle and resource parts of a composite key.
pub const KEY_SEPARATOR: &str = "###";

/// A resource addressed across bundle boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey<'a> {
    /// Bundle the resource lives in
    pub bundle: &'a str,
    /// Resource name inside the bundle
    pub resource: &'a str,
}

impl<'a> ResourceKey<'a> {
    /// Split a composite key into its bundle and resource parts.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Malformed`] unless the key splits into exactly two
    /// non-empty parts. A run of more than three `#` at the separator is
    /// rejected, since neither part may border it with a `#`.
    pub fn parse(key: &'a str) -> Result<Self, KeyError> {
        let mut parts = key.split(KEY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(bundle), Some(resource), None)
                if !bundle.is_empty()
                    && !resource.is_empty()
                    && !bundle.ends_with('#')
                    && !resource.starts_with('#') =>
            {
                Ok(Self { bundle, resource })
            }
            _ => Err(KeyError::Malformed(key.to_string())),
        }
    }

    /// Build the composite string for a bundle/resource pair
    #[must_use]
    pub fn compose(bundle: &str, resource: &str) -> String {
        format!("{bundle}{KEY_SEPARATOR}{resource}")
    }
}

impl fmt::Display for ResourceKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.bundle, self.resource)
    }
}
