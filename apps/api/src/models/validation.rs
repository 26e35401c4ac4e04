use serde::{Deserialize, Deserializer, Serialize};

/// Outcome of the semantic institution check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub is_typo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_department: Option<String>,
    /// Explanation for the user; empty when there is nothing to say.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ValidationResult {
    /// Permissive default used whenever validation itself fails.
    pub fn fail_open() -> Self {
        Self {
            is_valid: true,
            is_typo: false,
            corrected_university: None,
            corrected_department: None,
            message: String::new(),
        }
    }

    /// A typo that the user has to confirm before the run continues.
    pub fn needs_confirmation(&self) -> bool {
        self.is_typo && self.corrected_university.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Pass,
    Warning,
    Fail,
}

/// Quality audit of gathered research.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// 0 – 100
    pub score: u8,
    pub status: AuditStatus,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub feedback: String,
}

impl AuditReport {
    /// Advisory result used when the audit itself could not run.
    pub fn fail_open() -> Self {
        Self {
            score: 0,
            status: AuditStatus::Warning,
            issues: vec!["Audit process failed due to timeout or error.".to_string()],
            feedback: "Proceed with caution.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fail_open_validation_is_permissive() {
        let v = ValidationResult::fail_open();
        assert!(v.is_valid);
        assert!(!v.is_typo);
        assert!(!v.needs_confirmation());
        assert_eq!(serde_json::to_value(&v).unwrap()["message"], "");
    }

    #[test]
    fn test_message_is_always_present() {
        let v: ValidationResult =
            serde_json::from_value(json!({"isValid": false, "message": null})).unwrap();
        assert_eq!(v.message, "");
        let value = serde_json::to_value(&v).unwrap();
        assert_eq!(value["message"], "");
        assert!(value.get("correctedUniversity").is_none());
    }

    #[test]
    fn test_typo_without_correction_does_not_need_confirmation() {
        let v: ValidationResult =
            serde_json::from_value(json!({"isValid": true, "isTypo": true})).unwrap();
        assert!(!v.needs_confirmation());
    }

    #[test]
    fn test_audit_status_wire_format() {
        assert_eq!(serde_json::to_value(AuditStatus::Pass).unwrap(), json!("PASS"));
        let report = AuditReport::fail_open();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "WARNING");
        assert_eq!(value["score"], 0);
    }
}
