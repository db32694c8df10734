//! Level-difference tiers and experience math.
//!
//! The gap between two levels maps to a discrete [`LevelTier`]. The tier
//! boundaries widen as the viewer's level rises, so a level-40 character
//! treats a level-37 target as roughly even while a level-3 character does not.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Discrete level-difference category from a viewer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelTier {
    /// Trivial target.
    Gray,
    /// Much weaker target.
    Green,
    /// Weaker target.
    Blue,
    /// Even match.
    Yellow,
    /// Slightly stronger target.
    Orange,
    /// Stronger target.
    Red,
    /// Overwhelming target.
    Purple,
}

impl LevelTier {
    /// Determines the tier of `target_level` as seen by `viewer_level`.
    #[must_use]
    pub fn between(viewer_level: u32, target_level: u32) -> Self {
        let viewer = i64::from(viewer_level);
        let diff = i64::from(target_level) - viewer;

        if viewer <= 5 {
            return match diff {
                3.. => Self::Purple,
                2 => Self::Red,
                1 => Self::Orange,
                0 => Self::Yellow,
                -1 => Self::Blue,
                -2 => Self::Green,
                _ => Self::Gray,
            };
        }

        let over = viewer - 5;
        let purple_threshold = 3 + over / 12;
        let red_threshold = 2 + over / 9;
        let orange_threshold = 1;
        let yellow_lower = -(over / 7);
        let blue_lower = yellow_lower - (1 + over / 8);
        let green_lower = blue_lower - (1 + over / 9);

        if diff >= purple_threshold {
            Self::Purple
        } else if diff >= red_threshold {
            Self::Red
        } else if diff >= orange_threshold {
            Self::Orange
        } else if diff >= yellow_lower {
            Self::Yellow
        } else if diff >= blue_lower {
            Self::Blue
        } else if diff >= green_lower {
            Self::Green
        } else {
            Self::Gray
        }
    }

    /// Returns the lowercase tier name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Purple => "purple",
        }
    }
}

impl fmt::Display for LevelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multipliers a level tier applies to hit chance, damage/healing and XP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierModifiers {
    /// Hit chance multiplier.
    pub hit: f32,
    /// Damage and healing multiplier.
    pub damage: f32,
    /// Experience reward multiplier.
    pub xp: f32,
}

impl Default for TierModifiers {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl TierModifiers {
    /// Creates a modifier triple.
    #[must_use]
    pub const fn new(hit: f32, damage: f32, xp: f32) -> Self {
        Self { hit, damage, xp }
    }
}

/// Default tier table.
#[must_use]
pub fn default_tier_table() -> HashMap<LevelTier, TierModifiers> {
    HashMap::from([
        (LevelTier::Purple, TierModifiers::new(0.70, 0.60, 2.50)),
        (LevelTier::Red, TierModifiers::new(0.85, 0.75, 1.75)),
        (LevelTier::Orange, TierModifiers::new(0.95, 0.90, 1.25)),
        (LevelTier::Yellow, TierModifiers::new(1.0, 1.0, 1.0)),
        (LevelTier::Blue, TierModifiers::new(1.05, 1.10, 0.80)),
        (LevelTier::Green, TierModifiers::new(1.15, 1.25, 0.50)),
        (LevelTier::Gray, TierModifiers::new(1.25, 1.40, 0.20)),
    ])
}

/// Experience bookkeeping for anything that can level up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    /// Experience accumulated toward the next level.
    pub experience: u32,
    /// Experience required for the next level.
    pub experience_to_level: u32,
}

impl Progression {
    /// Creates a progression with the given first-level threshold.
    #[must_use]
    pub const fn new(experience_to_level: u32) -> Self {
        Self {
            experience: 0,
            experience_to_level,
        }
    }

    /// Adds experience and returns how many levels were gained.
    ///
    /// Each level consumes the current threshold and grows it by `growth`.
    pub fn gain(&mut self, amount: u32, growth: f32) -> u32 {
        self.experience = self.experience.saturating_add(amount);
        let mut levels = 0;
        while self.experience_to_level > 0 && self.experience >= self.experience_to_level {
            self.experience -= self.experience_to_level;
            let next = (f64::from(self.experience_to_level) * f64::from(growth)) as u32;
            self.experience_to_level = next.max(self.experience_to_level + 1);
            levels += 1;
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_level_tiers() {
        assert_eq!(LevelTier::between(3, 6), LevelTier::Purple);
        assert_eq!(LevelTier::between(3, 5), LevelTier::Red);
        assert_eq!(LevelTier::between(3, 4), LevelTier::Orange);
        assert_eq!(LevelTier::between(3, 3), LevelTier::Yellow);
        assert_eq!(LevelTier::between(3, 2), LevelTier::Blue);
        assert_eq!(LevelTier::between(3, 1), LevelTier::Green);
        assert_eq!(LevelTier::between(5, 1), LevelTier::Gray);
    }

    #[test]
    fn test_level_one_against_level_fifty() {
        assert_eq!(LevelTier::between(1, 50), LevelTier::Purple);
        assert_eq!(LevelTier::between(50, 1), LevelTier::Gray);
    }

    #[test]
    fn test_high_level_bands_widen() {
        // Viewer 40: over = 35, yellow covers down to -5.
        assert_eq!(LevelTier::between(40, 35), LevelTier::Yellow);
        assert_eq!(LevelTier::between(40, 34), LevelTier::Blue);
        // Red needs +2 + 35/9 = +5, purple +3 + 35/12 = +5 so purple wins.
        assert_eq!(LevelTier::between(40, 45), LevelTier::Purple);
        assert_eq!(LevelTier::between(40, 41), LevelTier::Orange);
    }

    #[test]
    fn test_default_table_complete() {
        let table = default_tier_table();
        assert_eq!(table.len(), 7);
        assert_eq!(table[&LevelTier::Yellow], TierModifiers::default());
        assert!(table[&LevelTier::Purple].damage < 1.0);
    }

    #[test]
    fn test_progression_multiple_levels() {
        let mut progression = Progression::new(150);
        assert_eq!(progression.gain(100, 1.6), 0);
        // 100 + 300 = 400: level at 150 (250 left, threshold 240), level again (10 left, threshold 384).
        assert_eq!(progression.gain(300, 1.6), 2);
        assert_eq!(progression.experience, 10);
        assert_eq!(progression.experience_to_level, 384);
    }
}
