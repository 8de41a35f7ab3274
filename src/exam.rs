//! Exam context types
//!
//! The exam-metadata collaborator resolves which examination a search is
//! scoped to; the engine only consumes the resolved descriptor and converts
//! the semester ordinal to the roman numeral the shard endpoints expect.

use crate::error::RosterexError;
use crate::identifiers::Registration;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Semester ordinal with roman-numeral wire representation
///
/// Shard endpoints take semesters as roman numerals I..VIII while the
/// metadata service reports ordinals 1..8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Semester(u8);

impl Semester {
    const ROMAN: [&'static str; 8] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII"];

    /// Create from an ordinal in 1..=8
    pub fn new(ordinal: u8) -> Result<Self, RosterexError> {
        if (1..=8).contains(&ordinal) {
            Ok(Self(ordinal))
        } else {
            Err(RosterexError::InvalidSemester(format!(
                "ordinal {} out of range, semesters run from 1 to 8",
                ordinal
            )))
        }
    }

    /// The ordinal value, 1..=8
    pub fn ordinal(&self) -> u8 {
        self.0
    }

    /// Roman-numeral wire form, I..=VIII
    pub fn as_roman(&self) -> &'static str {
        Self::ROMAN[(self.0 - 1) as usize]
    }

    /// Parse the roman-numeral wire form back to an ordinal
    pub fn from_roman(roman: &str) -> Option<Self> {
        let upper = roman.to_ascii_uppercase();
        Self::ROMAN
            .iter()
            .position(|r| *r == upper)
            .map(|idx| Self(idx as u8 + 1))
    }
}

impl TryFrom<u8> for Semester {
    type Error = RosterexError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Semester> for u8 {
    fn from(value: Semester) -> Self {
        value.0
    }
}

impl Display for Semester {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_roman())
    }
}

/// Resolved exam descriptor supplied by the metadata collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamDescriptor {
    /// Admission batch year used in shard query parameters
    pub batch_year: u32,
    /// Semester the examination belongs to
    pub semester: Semester,
    /// Human-readable session label, e.g. "Nov/Dec 2024"
    pub exam_session: String,
    /// Result publication date, carried opaquely for downstream display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
}

/// One search's immutable coordinates
///
/// Built once per submission and reused verbatim for retries and the
/// deferred optional shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target registration number
    pub registration: Registration,
    /// Admission batch year
    pub year: u32,
    /// Semester under examination
    pub semester: Semester,
    /// Session label, URL-encoded at request time
    pub exam_session: String,
}

impl Query {
    /// Build a query from a raw registration string and a resolved exam
    /// descriptor, validating both
    pub fn new(registration: &str, exam: &ExamDescriptor) -> Result<Self, RosterexError> {
        let registration = Registration::parse(registration)?;
        if exam.exam_session.trim().is_empty() {
            return Err(RosterexError::ExamNotSelected(
                "exam session label is empty".to_string(),
            ));
        }
        Ok(Self {
            registration,
            year: exam.batch_year,
            semester: exam.semester,
            exam_session: exam.exam_session.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ExamDescriptor {
        ExamDescriptor {
            batch_year: 2022,
            semester: Semester::new(4).unwrap(),
            exam_session: "Nov/Dec 2024".to_string(),
            publish_date: None,
        }
    }

    #[test]
    fn test_roman_round_trip() {
        for ordinal in 1..=8u8 {
            let sem = Semester::new(ordinal).unwrap();
            assert_eq!(Semester::from_roman(sem.as_roman()), Some(sem));
        }
    }

    #[test]
    fn test_roman_parse_case_insensitive() {
        assert_eq!(Semester::from_roman("iv").unwrap().ordinal(), 4);
        assert_eq!(Semester::from_roman("viii").unwrap().ordinal(), 8);
        assert!(Semester::from_roman("IX").is_none());
    }

    #[test]
    fn test_semester_rejects_out_of_range() {
        assert!(Semester::new(0).is_err());
        let err = Semester::new(9).unwrap_err();
        assert!(matches!(err, RosterexError::InvalidSemester(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_query_validates_registration() {
        let err = Query::new("abc", &descriptor()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_query_requires_exam_session() {
        let mut exam = descriptor();
        exam.exam_session = "  ".to_string();
        let err = Query::new("22104134070", &exam).unwrap_err();
        assert!(matches!(err, RosterexError::ExamNotSelected(_)));
    }

    #[test]
    fn test_query_carries_descriptor_fields() {
        let query = Query::new("22104134070", &descriptor()).unwrap();
        assert_eq!(query.year, 2022);
        assert_eq!(query.semester.as_roman(), "IV");
        assert_eq!(query.exam_session, "Nov/Dec 2024");
    }
}
