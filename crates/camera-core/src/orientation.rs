//! Output orientation composition.
//!
//! The still output is tagged with an EXIF orientation derived from the
//! device rotation (relative to the sensor) and whether the lens mirrors
//! the scene.

use serde::{Deserialize, Serialize};

/// EXIF orientation tag values (TIFF tag 0x0112).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExifOrientation {
    Undefined,
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl ExifOrientation {
    /// Compose the orientation for a rotation in degrees and a mirrored flag.
    ///
    /// Rotations are normalized modulo 360. Anything that is not a right
    /// angle yields [`ExifOrientation::Undefined`].
    pub fn compose(rotation_degrees: i32, mirrored: bool) -> Self {
        match (normalize_rotation(rotation_degrees), mirrored) {
            (Some(0), false) => Self::Normal,
            (Some(0), true) => Self::FlipHorizontal,
            (Some(90), false) => Self::Rotate90,
            (Some(90), true) => Self::Transpose,
            (Some(180), false) => Self::Rotate180,
            (Some(180), true) => Self::FlipVertical,
            (Some(270), false) => Self::Rotate270,
            (Some(270), true) => Self::Transverse,
            _ => Self::Undefined,
        }
    }

    /// Numeric tag value as written into image metadata.
    pub fn code(self) -> u16 {
        match self {
            Self::Undefined => 0,
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// Whether the orientation includes a mirror operation.
    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Self::FlipHorizontal | Self::FlipVertical | Self::Transpose | Self::Transverse
        )
    }
}

/// Normalize a rotation to `0..360`, returning `None` for non right angles.
pub fn normalize_rotation(rotation_degrees: i32) -> Option<i32> {
    let normalized = rotation_degrees.rem_euclid(360);
    (normalized % 90 == 0).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_compose_matches_exif_table() {
        assert_eq!(ExifOrientation::compose(0, false).code(), 1);
        assert_eq!(ExifOrientation::compose(0, true).code(), 2);
        assert_eq!(ExifOrientation::compose(180, false).code(), 3);
        assert_eq!(ExifOrientation::compose(180, true).code(), 4);
        assert_eq!(ExifOrientation::compose(90, true).code(), 5);
        assert_eq!(ExifOrientation::compose(90, false).code(), 6);
        assert_eq!(ExifOrientation::compose(270, true).code(), 7);
        assert_eq!(ExifOrientation::compose(270, false).code(), 8);
    }

    #[test]
    fn test_non_right_angles_are_undefined() {
        assert_eq!(ExifOrientation::compose(45, false), ExifOrientation::Undefined);
        assert_eq!(ExifOrientation::compose(-10, true), ExifOrientation::Undefined);
    }

    #[test]
    fn test_negative_rotation_wraps() {
        assert_eq!(normalize_rotation(-90), Some(270));
        assert_eq!(ExifOrientation::compose(-90, false), ExifOrientation::Rotate270);
    }

    proptest! {
        #[test]
        fn compose_is_periodic_in_full_turns(rotation in -1440i32..1440, turns in -4i32..4, mirrored in any::<bool>()) {
            prop_assert_eq!(
                ExifOrientation::compose(rotation, mirrored),
                ExifOrientation::compose(rotation + turns * 360, mirrored)
            );
        }

        #[test]
        fn mirrored_flag_is_preserved_for_right_angles(quarter in 0i32..4, mirrored in any::<bool>()) {
            let orientation = ExifOrientation::compose(quarter * 90, mirrored);
            prop_assert_eq!(orientation.is_mirrored(), mirrored);
        }
    }
}
