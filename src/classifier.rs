//! Terrain classification
//!
//! Turns the layered per-cell data into one terminal tag. Rules are checked
//! top-down and the first match wins:
//!
//! 1. river tile
//! 2. lake cell
//! 3. hard rock above 0.7: boulders
//! 4. hard rock above 0.55: rocks
//! 5. above 0.4: foothills
//! 6. hard rock above 0.25: stone
//! 7. above 0.3: foothills
//! 8. plains

use serde::Serialize;

use crate::geology::RockType;
use crate::geometry::Bounds;
use crate::pipeline::Artifacts;
use crate::tilemap::Tilemap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerrainTag {
    #[default]
    Plains,
    Foothills,
    Stone,
    Rocks,
    Boulders,
    River,
    Lake,
    /// Outside the generated region
    Unknown,
}

impl TerrainTag {
    pub fn symbol(self) -> char {
        match self {
            TerrainTag::Plains => '.',
            TerrainTag::Foothills => 'n',
            TerrainTag::Stone => ':',
            TerrainTag::Rocks => '%',
            TerrainTag::Boulders => 'O',
            TerrainTag::River => '~',
            TerrainTag::Lake => '≈',
            TerrainTag::Unknown => ' ',
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            TerrainTag::Plains => "plains",
            TerrainTag::Foothills => "foothills",
            TerrainTag::Stone => "stone",
            TerrainTag::Rocks => "rocks",
            TerrainTag::Boulders => "boulders",
            TerrainTag::River => "river",
            TerrainTag::Lake => "lake",
            TerrainTag::Unknown => "unknown",
        }
    }

    pub fn is_water(self) -> bool {
        matches!(self, TerrainTag::River | TerrainTag::Lake)
    }

    pub fn is_walkable(self) -> bool {
        !self.is_water() && self != TerrainTag::Unknown
    }
}

/// Apply the rule list. Missing rock type falls through to the elevation rules.
pub fn classify(is_river: bool, is_lake: bool, rock: Option<RockType>, elevation: f32) -> TerrainTag {
    let hard = rock == Some(RockType::Hard);
    if is_river {
        TerrainTag::River
    } else if is_lake {
        TerrainTag::Lake
    } else if hard && elevation > 0.7 {
        TerrainTag::Boulders
    } else if hard && elevation > 0.55 {
        TerrainTag::Rocks
    } else if elevation > 0.4 {
        TerrainTag::Foothills
    } else if hard && elevation > 0.25 {
        TerrainTag::Stone
    } else if elevation > 0.3 {
        TerrainTag::Foothills
    } else {
        TerrainTag::Plains
    }
}

/// Classify one cell straight from the artifacts.
pub fn classify_at(artifacts: &Artifacts, x: i32, y: i32) -> TerrainTag {
    let (is_river, is_lake) = artifacts.hydrology.as_ref().map_or((false, false), |h| {
        (h.river_tile_at(x, y).is_some(), h.lake_at(x, y).is_some())
    });
    let rock = artifacts.geology.as_ref().and_then(|g| g.rock_type_at(x, y));
    let elevation = artifacts
        .elevation
        .as_ref()
        .and_then(|e| e.height_at(x, y))
        .unwrap_or(0.0);
    classify(is_river, is_lake, rock, elevation)
}

/// Cached classification of the whole region.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedMap {
    tags: Tilemap<TerrainTag>,
}

impl ClassifiedMap {
    pub fn build(artifacts: &Artifacts, bounds: Bounds) -> Self {
        Self {
            tags: Tilemap::from_fn(bounds, |x, y| classify_at(artifacts, x, y)),
        }
    }

    /// Tag at a cell; `Unknown` outside the region.
    pub fn tag_at(&self, x: i32, y: i32) -> TerrainTag {
        self.tags.get(x, y).copied().unwrap_or(TerrainTag::Unknown)
    }

    pub fn tags(&self) -> &Tilemap<TerrainTag> {
        &self.tags
    }

    pub fn count(&self, tag: TerrainTag) -> usize {
        self.tags.values().iter().filter(|t| **t == tag).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order() {
        use RockType::*;
        assert_eq!(classify(true, true, Some(Hard), 0.9), TerrainTag::River);
        assert_eq!(classify(false, true, Some(Hard), 0.9), TerrainTag::Lake);
        assert_eq!(classify(false, false, Some(Hard), 0.75), TerrainTag::Boulders);
        assert_eq!(classify(false, false, Some(Hard), 0.6), TerrainTag::Rocks);
        assert_eq!(classify(false, false, Some(Soft), 0.75), TerrainTag::Foothills);
        assert_eq!(classify(false, false, Some(Hard), 0.45), TerrainTag::Foothills);
        assert_eq!(classify(false, false, Some(Hard), 0.28), TerrainTag::Stone);
        assert_eq!(classify(false, false, Some(Clay), 0.35), TerrainTag::Foothills);
        assert_eq!(classify(false, false, Some(Clay), 0.28), TerrainTag::Plains);
    }

    #[test]
    fn test_missing_rock_uses_elevation_rules() {
        assert_eq!(classify(false, false, None, 0.8), TerrainTag::Foothills);
        assert_eq!(classify(false, false, None, 0.2), TerrainTag::Plains);
    }

    #[test]
    fn test_empty_artifacts_classify_as_plains() {
        let map = ClassifiedMap::build(&Artifacts::default(), Bounds::centered(0, 0, 8));
        assert_eq!(map.count(TerrainTag::Plains), 64);
        assert_eq!(map.tag_at(100, 100), TerrainTag::Unknown);
    }

    #[test]
    fn test_walkability() {
        assert!(TerrainTag::Plains.is_walkable());
        assert!(TerrainTag::Boulders.is_walkable());
        assert!(!TerrainTag::River.is_walkable());
        assert!(!TerrainTag::Lake.is_walkable());
        assert!(!TerrainTag::Unknown.is_walkable());
    }
}
