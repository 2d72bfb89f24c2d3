//! Catalog version ordering.

use std::{cmp::Ordering, str::FromStr};

/// Numeric `major.minor[.patch[.revision]]` version.
///
/// A missing trailing segment ranks below any present one, so `1.2` is older than `1.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CatalogVersion([Option<u64>; 4]);

impl FromStr for CatalogVersion {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = value.trim().split('.').collect();
        if !(2..=4).contains(&segments.len()) {
            return Err(());
        }

        let mut parts = [None; 4];
        for (slot, segment) in parts.iter_mut().zip(segments) {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(());
            }
            *slot = Some(segment.parse().map_err(|_| ())?);
        }
        Ok(Self(parts))
    }
}

/// Order two version strings.
///
/// When either side fails to parse numerically, the strings are compared ordinally instead, so
/// `v10` ranks below `v9`.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    match (left.parse::<CatalogVersion>(), right.parse::<CatalogVersion>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => left.cmp(right),
    }
}

/// True when `candidate` should replace `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_compare_numerically() {
        assert!(is_newer("1.1.0", "1.0.0"));
        assert!(!is_newer("1.9.0", "2.0.0"));
        assert!(is_newer("10.0.0", "9.0.0"));
        assert!(is_newer("1.0.10", "1.0.9"));
    }

    #[test]
    fn equal_versions_are_not_newer() {
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert_eq!(compare_versions("1.2.0.0", "1.2.0.0"), Ordering::Equal);
    }

    #[test]
    fn missing_segments_rank_below_explicit_zeroes() {
        assert!(is_newer("1.2.0", "1.2"));
        assert!(!is_newer("1.2", "1.2.0"));
        assert_eq!(compare_versions("1.2.0", "1.2.0.0"), Ordering::Less);
        assert!(is_newer("1.3", "1.2.9.9"));
    }

    #[test]
    fn malformed_versions_fall_back_to_ordinal_comparison() {
        // Ordinal fallback: "v10" sorts before "v9".
        assert!(!is_newer("v10", "v9"));
        assert!(is_newer("v9", "v10"));
        // A single malformed side is enough to switch to the fallback.
        assert!(is_newer("2.0.0-beta", "10.0.0") == ("2.0.0-beta" > "10.0.0"));
        assert!(is_newer("beta", "1.0.0"));
    }

    #[test]
    fn rejects_non_numeric_shapes() {
        assert!("1".parse::<CatalogVersion>().is_err());
        assert!("1.2.3.4.5".parse::<CatalogVersion>().is_err());
        assert!("1..2".parse::<CatalogVersion>().is_err());
        assert!("1.-2.0".parse::<CatalogVersion>().is_err());
        assert!(" 1.2.3 ".parse::<CatalogVersion>().is_ok());
    }
}
