//! Review ratings and per-product statistics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rating threshold at which a review counts as a recommendation.
pub const RECOMMENDED_MIN_RATING: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rating must be an integer between 0 and 5")]
pub struct InvalidRating;

/// A star rating from 0 to 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns [`InvalidRating`] when `value` is outside `0..=5`.
    pub fn new(value: i64) -> Result<Self, InvalidRating> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Self)
            .ok_or(InvalidRating)
    }

    /// Parse a rating from untyped JSON. Integers and integer strings are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRating`] for anything else or an out-of-range value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, InvalidRating> {
        let raw = match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        raw.ok_or(InvalidRating).and_then(Self::new)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = InvalidRating;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        Self::from(rating.0)
    }
}

/// Count of reviews per star value. Zero-star reviews are not bucketed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StarCounts {
    #[serde(rename = "5_star")]
    pub five: u64,
    #[serde(rename = "4_star")]
    pub four: u64,
    #[serde(rename = "3_star")]
    pub three: u64,
    #[serde(rename = "2_star")]
    pub two: u64,
    #[serde(rename = "1_star")]
    pub one: u64,
}

/// Aggregate review statistics for one product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReviewStats {
    pub total_reviews: u64,
    /// Mean rating rounded to one decimal.
    pub average_rating: f64,
    /// Share of reviews rated 4 or above, as a percentage with one decimal.
    pub recommended_percentage: f64,
    pub star_counts: StarCounts,
}

impl ReviewStats {
    /// Compute statistics over a product's ratings.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = Rating>,
    {
        let mut stats = Self::default();
        let mut sum: u64 = 0;
        let mut recommended: u64 = 0;

        for rating in ratings {
            stats.total_reviews += 1;
            sum += u64::from(rating.value());
            if rating.value() >= RECOMMENDED_MIN_RATING {
                recommended += 1;
            }
            match rating.value() {
                5 => stats.star_counts.five += 1,
                4 => stats.star_counts.four += 1,
                3 => stats.star_counts.three += 1,
                2 => stats.star_counts.two += 1,
                1 => stats.star_counts.one += 1,
                _ => {}
            }
        }

        if stats.total_reviews > 0 {
            let total = stats.total_reviews as f64;
            stats.average_rating = round_one_decimal(sum as f64 / total);
            stats.recommended_percentage = round_one_decimal(recommended as f64 * 100.0 / total);
        }
        stats
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ratings(values: &[i64]) -> Vec<Rating> {
        values.iter().map(|v| Rating::new(*v).unwrap()).collect()
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_ok());
        assert!(Rating::new(5).is_ok());
        assert_eq!(Rating::new(6), Err(InvalidRating));
        assert_eq!(Rating::new(-1), Err(InvalidRating));
    }

    #[test]
    fn test_rating_from_json_requires_integer() {
        assert_eq!(Rating::from_json(&json!(4)).unwrap().value(), 4);
        assert_eq!(Rating::from_json(&json!(" 3 ")).unwrap().value(), 3);
        assert!(Rating::from_json(&json!(4.5)).is_err());
        assert!(Rating::from_json(&json!("four")).is_err());
        assert!(Rating::from_json(&json!(null)).is_err());
        assert!(Rating::from_json(&json!(7)).is_err());
        assert_eq!(
            InvalidRating.to_string(),
            "Rating must be an integer between 0 and 5"
        );
    }

    #[test]
    fn test_stats_empty() {
        let stats = ReviewStats::from_ratings(Vec::new());
        assert_eq!(stats.total_reviews, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.recommended_percentage, 0.0);
        assert_eq!(stats.star_counts, StarCounts::default());
    }

    #[test]
    fn test_stats_mixed() {
        let stats = ReviewStats::from_ratings(ratings(&[5, 4, 4, 2]));
        assert_eq!(stats.total_reviews, 4);
        assert_eq!(stats.average_rating, 3.8);
        assert_eq!(stats.recommended_percentage, 75.0);
        assert_eq!(stats.star_counts.four, 2);
        assert_eq!(stats.star_counts.three, 0);
    }

    #[test]
    fn test_stats_round_to_one_decimal() {
        let stats = ReviewStats::from_ratings(ratings(&[5, 4, 4]));
        assert_eq!(stats.average_rating, 4.3);
        let stats = ReviewStats::from_ratings(ratings(&[5, 1, 1]));
        assert_eq!(stats.recommended_percentage, 33.3);
    }

    #[test]
    fn test_star_counts_json_keys() {
        let stats = ReviewStats::from_ratings(ratings(&[5, 0]));
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["star_counts"]["5_star"], 1);
        assert_eq!(value["star_counts"]["1_star"], 0);
        assert_eq!(value["total_reviews"], 2);
    }
}
