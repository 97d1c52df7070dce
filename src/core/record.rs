use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::error::{FieldIssue, Problem, ValidationError};

/// Stable identifier of a visitor, anonymous or token-based. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Returns `None` for blank identifiers or ones that would break the document path.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SubjectId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SubjectId::new(&value).ok_or_else(|| format!("invalid subject id: {value:?}"))
    }
}

impl From<SubjectId> for String {
    fn from(subject: SubjectId) -> Self {
        subject.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapCoverage {
    FullWrap,
    PartialWrap,
    RearWindow,
}

impl WrapCoverage {
    pub const ALL: [WrapCoverage; 3] = [
        WrapCoverage::FullWrap,
        WrapCoverage::PartialWrap,
        WrapCoverage::RearWindow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            WrapCoverage::FullWrap => "Full wrap",
            WrapCoverage::PartialWrap => "Partial wrap",
            WrapCoverage::RearWindow => "Rear window only",
        }
    }
}

impl fmt::Display for WrapCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operator-controlled review outcome. The client never writes this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// The persisted vehicle registration for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRecord {
    pub subject_id: SubjectId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub make: String,
    pub model: String,
    pub year: u32,
    pub mileage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<WrapCoverage>,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(default)]
    pub status: ApprovalStatus,
}

pub(crate) const STATUS_KEY: &str = "status";

impl ApplicantRecord {
    /// Fields written by the client on submit. `status` is left for operators.
    pub fn to_patch(&self) -> Result<serde_json::Map<String, Value>, serde_json::Error> {
        let mut patch = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "record serialized to {other}, expected an object"
                )));
            }
        };
        patch.remove(STATUS_KEY);
        Ok(patch)
    }
}

/// Every field the user types into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FullName,
    Email,
    Phone,
    City,
    Make,
    Model,
    Year,
    Mileage,
}

impl Field {
    pub const PERSONAL: [Field; 4] = [Field::FullName, Field::Email, Field::Phone, Field::City];
    pub const VEHICLE: [Field; 4] = [Field::Make, Field::Model, Field::Year, Field::Mileage];

    pub fn label(self) -> &'static str {
        match self {
            Field::FullName => "Full name",
            Field::Email => "Email",
            Field::Phone => "Phone",
            Field::City => "City",
            Field::Make => "Make",
            Field::Model => "Model",
            Field::Year => "Year",
            Field::Mileage => "Mileage",
        }
    }
}

/// In-memory copy of a record being edited. Empty string means unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub make: String,
    pub model: String,
    pub year: String,
    pub mileage: String,
    pub coverage: Option<WrapCoverage>,
}

impl Draft {
    pub fn from_record(record: &ApplicantRecord) -> Self {
        Self {
            full_name: record.full_name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            city: record.city.clone(),
            make: record.make.clone(),
            model: record.model.clone(),
            year: record.year.to_string(),
            mileage: record.mileage.to_string(),
            coverage: record.coverage,
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FullName => &self.full_name,
            Field::Email => &self.email,
            Field::Phone => &self.phone,
            Field::City => &self.city,
            Field::Make => &self.make,
            Field::Model => &self.model,
            Field::Year => &self.year,
            Field::Mileage => &self.mileage,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::FullName => &mut self.full_name,
            Field::Email => &mut self.email,
            Field::Phone => &mut self.phone,
            Field::City => &mut self.city,
            Field::Make => &mut self.make,
            Field::Model => &mut self.model,
            Field::Year => &mut self.year,
            Field::Mileage => &mut self.mileage,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        *self == Draft::default()
    }

    pub fn validate_personal(&self) -> Result<(), ValidationError> {
        let issues: Vec<_> = Field::PERSONAL
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .map(|field| FieldIssue { field, problem: Problem::Missing })
            .collect();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Checks the vehicle step and returns the parsed year and mileage.
    pub fn validate_vehicle(&self) -> Result<(u32, f64), ValidationError> {
        let mut issues = Vec::new();
        for field in [Field::Make, Field::Model] {
            if self.get(field).trim().is_empty() {
                issues.push(FieldIssue { field, problem: Problem::Missing });
            }
        }
        let year = parse_year(&self.year)
            .map_err(|problem| issues.push(FieldIssue { field: Field::Year, problem }))
            .ok();
        let mileage = parse_mileage(&self.mileage)
            .map_err(|problem| issues.push(FieldIssue { field: Field::Mileage, problem }))
            .ok();
        match (year, mileage) {
            (Some(year), Some(mileage)) if issues.is_empty() => Ok((year, mileage)),
            _ => Err(ValidationError { issues }),
        }
    }

    /// Builds the full record for submission; fails on the first step with problems.
    pub fn to_record(
        &self,
        subject_id: SubjectId,
        submitted_at: OffsetDateTime,
    ) -> Result<ApplicantRecord, ValidationError> {
        self.validate_personal()?;
        let (year, mileage) = self.validate_vehicle()?;
        Ok(ApplicantRecord {
            subject_id,
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            city: self.city.trim().to_string(),
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            year,
            mileage,
            coverage: self.coverage,
            submitted_at,
            status: ApprovalStatus::Pending,
        })
    }
}

fn parse_year(raw: &str) -> Result<u32, Problem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Problem::Missing);
    }
    // Signed parse so "-0" means 0 and "-1" is reported as negative.
    match raw.parse::<i64>() {
        Ok(year) if year < 0 => Err(Problem::Negative),
        Ok(year) => u32::try_from(year).map_err(|_| Problem::NotANumber),
        Err(_) => Err(Problem::NotANumber),
    }
}

fn parse_mileage(raw: &str) -> Result<f64, Problem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Problem::Missing);
    }
    match raw.parse::<f64>() {
        // "NaN" and "inf" parse, but are not mileages
        Ok(value) if !value.is_finite() => Err(Problem::NotANumber),
        Ok(value) if value < 0.0 => Err(Problem::Negative),
        // -0.0 is stored as 0.0
        Ok(value) => Ok(value.abs()),
        Err(_) => Err(Problem::NotANumber),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::macros::datetime;

    use super::*;

    fn filled() -> Draft {
        Draft {
            full_name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            phone: "+15551234567".into(),
            city: "Austin".into(),
            make: "Honda".into(),
            model: "Civic".into(),
            year: "2020".into(),
            mileage: "30000".into(),
            coverage: Some(WrapCoverage::FullWrap),
        }
    }

    #[test]
    fn subject_id_rejects_blank_and_slashes() {
        assert!(SubjectId::new("").is_none());
        assert!(SubjectId::new("  \t").is_none());
        assert!(SubjectId::new("a/b").is_none());
        assert_eq!(SubjectId::new(" anon-1 ").unwrap().as_str(), "anon-1");
    }

    #[test]
    fn vehicle_numbers() {
        let mut draft = filled();
        draft.year = "-1".into();
        draft.mileage = "lots".into();
        let err = draft.validate_vehicle().unwrap_err();
        assert_eq!(err.problem(Field::Year), Some(Problem::Negative));
        assert_eq!(err.problem(Field::Mileage), Some(Problem::NotANumber));

        draft.year = "2020".into();
        draft.mileage = "NaN".into();
        assert_eq!(
            draft.validate_vehicle().unwrap_err().problem(Field::Mileage),
            Some(Problem::NotANumber)
        );

        draft.mileage = " 0 ".into();
        assert_eq!(draft.validate_vehicle().unwrap(), (2020, 0.0));
    }

    #[test]
    fn negative_zero_is_zero_for_both_numbers() {
        let mut draft = filled();
        draft.year = "-0".into();
        draft.mileage = "-0".into();
        let (year, mileage) = draft.validate_vehicle().unwrap();
        assert_eq!(year, 0);
        assert_eq!(mileage, 0.0);
        assert!(mileage.is_sign_positive());

        let record = draft
            .to_record(SubjectId::new("anon-1").unwrap(), datetime!(2025-03-01 12:00 UTC))
            .unwrap();
        assert!(record.mileage.is_sign_positive());
        assert_eq!(Draft::from_record(&record).mileage, "0");

        draft.year = "0".into();
        assert_eq!(draft.validate_vehicle().unwrap(), (0, 0.0));
    }

    #[test]
    fn record_round_trips_through_draft() {
        let record = filled()
            .to_record(SubjectId::new("anon-1").unwrap(), datetime!(2025-03-01 12:00 UTC))
            .unwrap();
        assert_eq!(Draft::from_record(&record), filled());

        let mut draft = filled();
        draft.mileage = "1234.5".into();
        let record = draft
            .to_record(SubjectId::new("anon-1").unwrap(), datetime!(2025-03-01 12:00 UTC))
            .unwrap();
        assert_eq!(Draft::from_record(&record).mileage, "1234.5");
    }

    #[test]
    fn patch_never_carries_status() {
        let mut record = filled()
            .to_record(SubjectId::new("anon-1").unwrap(), datetime!(2025-03-01 12:00 UTC))
            .unwrap();
        record.status = ApprovalStatus::Approved;
        let patch = record.to_patch().unwrap();
        assert!(!patch.contains_key(STATUS_KEY));
        assert_eq!(patch["fullName"], "Jane Doe");
        assert_eq!(patch["subjectId"], "anon-1");
        assert_eq!(patch["submittedAt"], "2025-03-01T12:00:00Z");
        assert_eq!(patch["coverage"], "full_wrap");
    }

    #[test]
    fn missing_status_reads_as_pending() {
        let raw = serde_json::json!({
            "subjectId": "anon-1",
            "fullName": "Jane Doe",
            "email": "jane@x.com",
            "phone": "+15551234567",
            "city": "Austin",
            "make": "Honda",
            "model": "Civic",
            "year": 2020,
            "mileage": 30000,
            "submittedAt": "2025-03-01T12:00:00Z",
        });
        let record: ApplicantRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.status, ApprovalStatus::Pending);
        assert_eq!(record.coverage, None);
        assert_eq!(record.mileage, 30000.0);
    }

    fn text() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), Just("   ".to_string()), "[ a-zA-Z@.+0-9]{0,12}"]
    }

    fn number_text() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "-?[0-9]{1,6}",
            "[0-9]{1,5}\\.[0-9]{1,2}",
            "[a-z]{1,4}",
        ]
    }

    proptest! {
        #[test]
        fn personal_step_passes_iff_all_present(
            full_name in text(), email in text(), phone in text(), city in text()
        ) {
            let draft = Draft { full_name, email, phone, city, ..Draft::default() };
            let expected = Field::PERSONAL.iter().all(|f| !draft.get(*f).trim().is_empty());
            prop_assert_eq!(draft.validate_personal().is_ok(), expected);
        }

        #[test]
        fn vehicle_step_passes_iff_present_and_non_negative(
            make in text(), model in text(), year in number_text(), mileage in number_text()
        ) {
            let draft = Draft { make, model, year, mileage, ..Draft::default() };
            let present = !draft.make.trim().is_empty() && !draft.model.trim().is_empty();
            let year_ok = draft
                .year
                .trim()
                .parse::<i64>()
                .is_ok_and(|y| (0..=i64::from(u32::MAX)).contains(&y));
            let mileage_ok = draft
                .mileage
                .trim()
                .parse::<f64>()
                .map(|m| m.is_finite() && m >= 0.0)
                .unwrap_or(false);
            prop_assert_eq!(draft.validate_vehicle().is_ok(), present && year_ok && mileage_ok);
        }
    }
}
