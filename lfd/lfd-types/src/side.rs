//! Arm and finger identifiers.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One arm of a bimanual robot.
///
/// Ordering is `Left < Right`, which fixes the order arms appear in
/// manipulator groups and flattened contact trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ArmSide {
    /// Left arm.
    Left,
    /// Right arm.
    Right,
}

impl ArmSide {
    /// Both arms in canonical order.
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// Single-letter link prefix (`l` or `r`).
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Right => "r",
        }
    }

    /// Name of the arm's joint group (`leftarm` or `rightarm`).
    #[must_use]
    pub const fn arm_name(self) -> &'static str {
        match self {
            Self::Left => "leftarm",
            Self::Right => "rightarm",
        }
    }
}

impl fmt::Display for ArmSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// One finger of a parallel gripper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FingerSide {
    /// Left finger.
    Left,
    /// Right finger.
    Right,
}

impl FingerSide {
    /// Both fingers in canonical order.
    pub const BOTH: [Self; 2] = [Self::Left, Self::Right];

    /// Single-letter link prefix (`l` or `r`).
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Left => "l",
            Self::Right => "r",
        }
    }
}

impl fmt::Display for FingerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_order() {
        assert!(ArmSide::Left < ArmSide::Right);
        assert_eq!(ArmSide::BOTH, [ArmSide::Left, ArmSide::Right]);
    }

    #[test]
    fn test_names() {
        assert_eq!(ArmSide::Right.arm_name(), "rightarm");
        assert_eq!(ArmSide::Left.prefix(), "l");
        assert_eq!(FingerSide::Right.prefix(), "r");
        assert_eq!(ArmSide::Left.to_string(), "left");
    }
}
