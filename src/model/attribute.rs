//! View attributes: the eight scalar properties a constraint may mention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A scalar attribute of a view rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Left,
    Top,
    Right,
    Bottom,
    CenterX,
    CenterY,
    Width,
    Height,
}

impl Attribute {
    /// All attributes, in a stable order.
    pub const ALL: [Attribute; 8] = [
        Attribute::Left,
        Attribute::Top,
        Attribute::Right,
        Attribute::Bottom,
        Attribute::CenterX,
        Attribute::CenterY,
        Attribute::Width,
        Attribute::Height,
    ];

    /// The four horizontal attributes (those measured along the x axis).
    pub const HORIZONTAL: [Attribute; 4] = [
        Attribute::Left,
        Attribute::Right,
        Attribute::CenterX,
        Attribute::Width,
    ];

    /// The four vertical attributes (those measured along the y axis).
    pub const VERTICAL: [Attribute; 4] = [
        Attribute::Top,
        Attribute::Bottom,
        Attribute::CenterY,
        Attribute::Height,
    ];

    pub fn is_size(self) -> bool {
        matches!(self, Attribute::Width | Attribute::Height)
    }

    pub fn is_position(self) -> bool {
        !self.is_size()
    }

    pub fn is_horizontal(self) -> bool {
        matches!(
            self,
            Attribute::Left | Attribute::Right | Attribute::CenterX | Attribute::Width
        )
    }

    pub fn is_vertical(self) -> bool {
        !self.is_horizontal()
    }

    /// Dual position pairs: left↔right and top↔bottom. Center and size
    /// attributes have no dual.
    pub fn dual(self) -> Option<Attribute> {
        match self {
            Attribute::Left => Some(Attribute::Right),
            Attribute::Right => Some(Attribute::Left),
            Attribute::Top => Some(Attribute::Bottom),
            Attribute::Bottom => Some(Attribute::Top),
            _ => None,
        }
    }

    /// Whether `(self, other)` is an adjacency pair (right↔left or bottom↔top,
    /// in either order).
    pub fn is_dual_pair(self, other: Attribute) -> bool {
        self.dual() == Some(other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::Left => "left",
            Attribute::Top => "top",
            Attribute::Right => "right",
            Attribute::Bottom => "bottom",
            Attribute::CenterX => "center_x",
            Attribute::CenterY => "center_y",
            Attribute::Width => "width",
            Attribute::Height => "height",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Attribute::Left),
            "top" => Ok(Attribute::Top),
            "right" => Ok(Attribute::Right),
            "bottom" => Ok(Attribute::Bottom),
            "center_x" => Ok(Attribute::CenterX),
            "center_y" => Ok(Attribute::CenterY),
            "width" => Ok(Attribute::Width),
            "height" => Ok(Attribute::Height),
            other => Err(format!("unknown attribute '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_position_partition() {
        for attr in Attribute::ALL {
            assert_ne!(attr.is_size(), attr.is_position());
        }
    }

    #[test]
    fn test_axis_partition() {
        for attr in Attribute::ALL {
            assert_ne!(attr.is_horizontal(), attr.is_vertical());
        }
        assert!(Attribute::Width.is_horizontal());
        assert!(Attribute::Height.is_vertical());
        assert!(Attribute::CenterY.is_vertical());
    }

    #[test]
    fn test_duals() {
        assert_eq!(Attribute::Left.dual(), Some(Attribute::Right));
        assert_eq!(Attribute::Bottom.dual(), Some(Attribute::Top));
        assert_eq!(Attribute::CenterX.dual(), None);
        assert_eq!(Attribute::Width.dual(), None);
        assert!(Attribute::Right.is_dual_pair(Attribute::Left));
        assert!(!Attribute::Right.is_dual_pair(Attribute::Top));
    }

    #[test]
    fn test_round_trip_strings() {
        for attr in Attribute::ALL {
            assert_eq!(attr.as_str().parse::<Attribute>().unwrap(), attr);
        }
    }
}
