use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Derived string key addressing a cache entry.
///
/// Derivations are deterministic: equal logical inputs always produce equal
/// fingerprints. Distinct inputs may collide depending on the derivation; see
/// each fingerprinter for its collision profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full JSON serialization of `value`.
    ///
    /// Returns `None` when the value cannot be serialized; such inputs are
    /// treated as uncacheable.
    #[must_use]
    pub fn from_serialized<T: Serialize + ?Sized>(value: &T) -> Option<Self> {
        match serde_json::to_string(value) {
            Ok(text) => Some(Self(text)),
            Err(err) => {
                trace!(error = %err, "input is not fingerprintable");
                None
            }
        }
    }

    /// `array_{len}_{json(first two items)}`.
    ///
    /// Cheap for long sequences but collides for distinct sequences that share
    /// length and their first two items.
    #[must_use]
    pub fn from_sequence_preview<T: Serialize>(items: &[T]) -> Option<Self> {
        let preview = &items[..items.len().min(2)];
        let preview = serde_json::to_string(preview).ok()?;
        Some(Self(format!("array_{}_{preview}", items.len())))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-cache key derivation.
///
/// Each cache instance is built with one fingerprinter, so the caller decides
/// how much collision risk a given cache tolerates.
pub trait Fingerprinter<I: ?Sized> {
    fn fingerprint(&self, input: &I) -> Option<Fingerprint>;
}

/// Fingerprints any serializable input by its full JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializedFingerprint;

impl<T: Serialize + ?Sized> Fingerprinter<T> for SerializedFingerprint {
    fn fingerprint(&self, input: &T) -> Option<Fingerprint> {
        Fingerprint::from_serialized(input)
    }
}

/// Fingerprints sequences by length plus a two-item preview.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewFingerprint;

impl<T: Serialize> Fingerprinter<[T]> for PreviewFingerprint {
    fn fingerprint(&self, input: &[T]) -> Option<Fingerprint> {
        Fingerprint::from_sequence_preview(input)
    }
}

impl<T: Serialize> Fingerprinter<Vec<T>> for PreviewFingerprint {
    fn fingerprint(&self, input: &Vec<T>) -> Option<Fingerprint> {
        Fingerprint::from_sequence_preview(input)
    }
}

/// Adapts a plain function or closure into a fingerprinter.
#[derive(Debug, Clone, Copy)]
pub struct FnFingerprint<F>(pub F);

impl<I, F> Fingerprinter<I> for FnFingerprint<F>
where
    I: ?Sized,
    F: Fn(&I) -> Option<Fingerprint>,
{
    fn fingerprint(&self, input: &I) -> Option<Fingerprint> {
        (self.0)(input)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        FnFingerprint, Fingerprint, Fingerprinter, PreviewFingerprint, SerializedFingerprint,
    };

    #[test]
    fn sequence_preview_uses_length_and_first_two_items() {
        let key = Fingerprint::from_sequence_preview(&[1, 2, 3, 4]).expect("fingerprint");
        assert_eq!(key.as_str(), "array_4_[1,2]");

        let short = Fingerprint::from_sequence_preview::<u8>(&[]).expect("fingerprint");
        assert_eq!(short.as_str(), "array_0_[]");
    }

    #[test]
    fn preview_collides_for_shared_prefix() {
        let lhs = PreviewFingerprint.fingerprint(&vec![1, 2, 3]);
        let rhs = PreviewFingerprint.fingerprint(&vec![1, 2, 9]);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn serialized_fingerprint_is_full_json() {
        let key = SerializedFingerprint
            .fingerprint(&json!({ "series": [1, null] }))
            .expect("fingerprint");
        assert_eq!(key.as_str(), r#"{"series":[1,null]}"#);
    }

    #[test]
    fn fn_fingerprint_delegates_to_closure() {
        let fingerprinter =
            FnFingerprint(|input: &str| Some(Fingerprint::new(input.len().to_string())));
        assert_eq!(
            fingerprinter.fingerprint("abc"),
            Some(Fingerprint::from("3"))
        );
    }
}
