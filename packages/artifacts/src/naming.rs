//! Artifact file names.
//!
//! A partition key is percent-encoded so that file names are injective in
//! the key and never contain `_`. That keeps `<key>_<suffix>` splittable
//! at the first underscore.

use strum_macros::{AsRefStr, Display};

/// The kinds of file persisted per partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    /// Fitted history plus horizon.
    Forecast,
    /// Held-out days joined with predictions.
    TestResults,
    /// Serialized model state.
    Model,
    /// Forecast over the configured forward window only.
    FutureForecast,
    /// Ranked cluster centroids.
    Hotspots,
}

impl ArtifactKind {
    /// File name suffix following the encoded key and `_`.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Forecast => "forecast.csv",
            Self::TestResults => "test_results.csv",
            Self::Model => "model.json",
            Self::FutureForecast => "2months_future_forecast.csv",
            Self::Hotspots => "hotspots.geojson",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Forecast,
            Self::TestResults,
            Self::Model,
            Self::FutureForecast,
            Self::Hotspots,
        ]
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.suffix() == suffix)
    }
}

const fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.'
}

/// Percent-encodes every byte of `key` except ASCII alphanumerics, `-`
/// and `.`.
#[must_use]
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if is_unreserved(byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_key`]. Returns `None` for malformed input.
#[must_use]
pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte if is_unreserved(byte) => {
                out.push(byte);
                i += 1;
            }
            _ => return None,
        }
    }

    String::from_utf8(out).ok()
}

/// File name for one artifact of one partition.
#[must_use]
pub fn file_name(key: &str, kind: ArtifactKind) -> String {
    format!("{}_{}", encode_key(key), kind.suffix())
}

/// Splits a file name into its partition key and artifact kind.
///
/// Names that do not follow the artifact convention yield `None`.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<(String, ArtifactKind)> {
    let (encoded, suffix) = name.split_once('_')?;
    let kind = ArtifactKind::from_suffix(suffix)?;
    Some((decode_key(encoded)?, kind))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn keeps_plain_keys_readable() {
        assert_eq!(encode_key("B2"), "B2");
        assert_eq!(encode_key("A-1.x"), "A-1.x");
    }

    #[test]
    fn escapes_separators_and_spaces() {
        assert_eq!(encode_key("LARCENY FROM_BUILDING"), "LARCENY%20FROM%5FBUILDING");
        assert_eq!(encode_key("50%"), "50%25");
        assert_eq!(encode_key("a/b"), "a%2Fb");
        assert!(!encode_key("x_y z").contains('_'));
    }

    #[test]
    fn distinct_keys_get_distinct_names() {
        let keys = ["A B", "A_B", "A%20B", "A%5FB", "AB", "a b", "A  B", "É"];
        let names: BTreeSet<String> = keys
            .iter()
            .map(|k| file_name(k, ArtifactKind::Forecast))
            .collect();
        assert_eq!(names.len(), keys.len());
    }

    #[test]
    fn parses_back_every_kind() {
        for &kind in ArtifactKind::all() {
            let name = file_name("SIMPLE ASSAULT_2", kind);
            assert_eq!(
                parse_file_name(&name),
                Some(("SIMPLE ASSAULT_2".to_string(), kind))
            );
        }
    }

    #[test]
    fn rejects_foreign_names() {
        assert_eq!(parse_file_name("batch_summary.json"), None);
        assert_eq!(parse_file_name("district_batch_summary.json"), None);
        assert_eq!(parse_file_name("README.md"), None);
        assert_eq!(parse_file_name("bad%2_forecast.csv"), None);
        assert_eq!(decode_key("has space"), None);
    }
}
