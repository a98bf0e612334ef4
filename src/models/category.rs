use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Photo viewpoint a staged image is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Front,
    Rear,
    Back,
    Top,
    Left,
    Right,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Front,
        Category::Rear,
        Category::Back,
        Category::Top,
        Category::Left,
        Category::Right,
    ];

    /// Wire name, as used in query strings and JSON keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Front => "front",
            Category::Rear => "rear",
            Category::Back => "back",
            Category::Top => "top",
            Category::Left => "left",
            Category::Right => "right",
        }
    }

    /// Human-readable label shown next to an upload slot.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Front => "Front",
            Category::Rear => "Rear",
            Category::Back => "Back",
            Category::Top => "Top",
            Category::Left => "Left side",
            Category::Right => "Right side",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown category '{}' (expected one of front, rear, back, top, left, right)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or(UnknownCategory(s.to_string()))
    }
}

/// The fixed set of categories a given upload flow requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryScheme {
    /// New-claim form: damage photos from four sides.
    ClaimPhotos,
    /// Existing-claim identity check: the four angles the verifier accepts.
    VehicleAngles,
}

impl CategoryScheme {
    pub fn required(&self) -> &'static [Category] {
        match self {
            CategoryScheme::ClaimPhotos => &[
                Category::Front,
                Category::Rear,
                Category::Back,
                Category::Top,
            ],
            CategoryScheme::VehicleAngles => &[
                Category::Front,
                Category::Back,
                Category::Left,
                Category::Right,
            ],
        }
    }

    pub fn allows(&self, category: Category) -> bool {
        self.required().contains(&category)
    }
}

impl fmt::Display for CategoryScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryScheme::ClaimPhotos => f.write_str("claim photos"),
            CategoryScheme::VehicleAngles => f.write_str("vehicle angles"),
        }
    }
}
