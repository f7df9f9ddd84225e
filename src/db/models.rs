use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub roll_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Grade {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub grade: f64,
}

/// Highest grade recorded in a subject, joined back to its student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SubjectTopper {
    pub student_id: i64,
    pub name: String,
    pub roll_number: String,
    pub grade: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentReport {
    pub student: Student,
    pub grades: Vec<Grade>,
    pub average: Option<f64>,
}

/// Rounds a mean to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders a score the way it is shown to people: always at least one
/// decimal place, so `90` reads `90.0` and `88.25` stays `88.25`.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{:.1}", score)
    } else {
        score.to_string()
    }
}

/// Rejects scores outside the closed range [0, 100], and NaN.
pub fn validate_score(score: f64) -> Result<f64, AppError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(AppError::ValidationError(format!(
            "grade must be between {} and {}, got {}",
            MIN_SCORE, MAX_SCORE, score
        )))
    }
}

/// Coerces user-entered text into a score.
pub fn parse_score(input: &str) -> Result<f64, AppError> {
    let trimmed = input.trim();
    let score: f64 = trimmed
        .parse()
        .map_err(|_| AppError::ValidationError(format!("'{}' is not a number", trimmed)))?;
    validate_score(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(80.0), 80.0);
        assert_eq!(round2(83.333333), 83.33);
        assert_eq!(round2(66.666666), 66.67);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(90.0), "90.0");
        assert_eq!(format_score(88.5), "88.5");
        assert_eq!(format_score(0.0), "0.0");
        assert_eq!(format_score(72.25), "72.25");
    }

    #[test]
    fn test_validate_score_bounds() {
        assert_eq!(validate_score(0.0).unwrap(), 0.0);
        assert_eq!(validate_score(100.0).unwrap(), 100.0);
        assert!(matches!(validate_score(-0.5), Err(AppError::ValidationError(_))));
        assert!(matches!(validate_score(100.5), Err(AppError::ValidationError(_))));
        assert!(matches!(validate_score(f64::NAN), Err(AppError::ValidationError(_))));
        assert!(matches!(validate_score(f64::INFINITY), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(" 87.5 ").unwrap(), 87.5);
        assert_eq!(parse_score("100").unwrap(), 100.0);
        assert!(matches!(parse_score("ninety"), Err(AppError::ValidationError(_))));
        assert!(matches!(parse_score(""), Err(AppError::ValidationError(_))));
        assert!(matches!(parse_score("101"), Err(AppError::ValidationError(_))));
    }
}
