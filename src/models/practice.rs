use serde::{Deserialize, Deserializer, Serialize};

use super::enums::PracticeType;

/// Practice configuration, persisted locally.
///
/// `id` is assigned on first save. Absence of a stored record means the
/// practice runs under `PracticeSettings::default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub practice_name: String,
    /// An unrecognized stored value reads as the default type, whose
    /// feature set is all-off. The stored record is left as it is.
    #[serde(default, deserialize_with = "practice_type_or_default")]
    pub practice_type: PracticeType,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl PracticeSettings {
    pub fn new(practice_name: impl Into<String>, practice_type: PracticeType) -> Self {
        Self {
            practice_name: practice_name.into(),
            practice_type,
            ..Self::default()
        }
    }
}

fn practice_type_or_default<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<PracticeType, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw.as_str().and_then(|s| s.parse::<PracticeType>().ok()) {
        Some(practice_type) => Ok(practice_type),
        None => {
            tracing::warn!(value = %raw, "Unrecognized practice type, using default");
            Ok(PracticeType::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_record_without_optional_fields() {
        let settings: PracticeSettings = serde_json::from_str(
            r#"{"practiceName":"Northside","practiceType":"family_practice"}"#,
        )
        .unwrap();
        assert_eq!(settings.practice_type, PracticeType::FamilyPractice);
        assert!(settings.id.is_none());
        assert!(settings.address.is_empty());
    }

    #[test]
    fn unknown_practice_type_reads_as_default() {
        let settings: PracticeSettings = serde_json::from_str(
            r#"{"practiceName":"X","practiceType":"spa","phone":"555"}"#,
        )
        .unwrap();
        assert_eq!(settings.practice_type, PracticeType::Individual);
        assert_eq!(settings.practice_name, "X");
        assert_eq!(settings.phone, "555");

        let numeric: PracticeSettings =
            serde_json::from_str(r#"{"practiceName":"X","practiceType":7}"#).unwrap();
        assert_eq!(numeric.practice_type, PracticeType::Individual);
    }

    #[test]
    fn non_object_record_is_rejected() {
        assert!(serde_json::from_str::<PracticeSettings>("[1, 2]").is_err());
    }
}
