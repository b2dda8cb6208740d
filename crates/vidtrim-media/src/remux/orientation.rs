//! Output rotation resolution.

use tracing::warn;

/// Rotations a container can express without resampling.
pub const VALID_ROTATIONS: [i32; 4] = [0, 90, 180, 270];

pub fn is_valid_rotation(degrees: i32) -> bool {
    VALID_ROTATIONS.contains(&degrees)
}

/// Decide the output rotation.
///
/// A valid explicit value wins. Otherwise `source_metadata` is consulted,
/// and only then; anything missing or outside {0, 90, 180, 270} yields 0.
pub fn resolve_orientation<F>(explicit: Option<i32>, source_metadata: F) -> i32
where
    F: FnOnce() -> Option<i32>,
{
    if let Some(degrees) = explicit {
        if is_valid_rotation(degrees) {
            return degrees;
        }
        warn!(degrees, "Ignoring unsupported rotation override");
    }

    match source_metadata() {
        Some(degrees) if is_valid_rotation(degrees) => degrees,
        Some(degrees) => {
            warn!(degrees, "Ignoring unsupported source rotation");
            0
        }
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_explicit_wins_without_lookup() {
        let called = Cell::new(false);
        let degrees = resolve_orientation(Some(180), || {
            called.set(true);
            Some(90)
        });
        assert_eq!(degrees, 180);
        assert!(!called.get());
    }

    #[test]
    fn test_metadata_fallback() {
        assert_eq!(resolve_orientation(None, || Some(90)), 90);
        assert_eq!(resolve_orientation(Some(45), || Some(270)), 270);
    }

    #[test]
    fn test_defaults_to_zero() {
        assert_eq!(resolve_orientation(None, || None), 0);
        assert_eq!(resolve_orientation(None, || Some(-90)), 0);
        assert_eq!(resolve_orientation(Some(360), || None), 0);
        assert_eq!(resolve_orientation(Some(0), || Some(90)), 0);
    }
}
