use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub String);

/// Lead data captured by the registration endpoint. Never retained after the
/// request completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl RegistrationRecord {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidRegistration {
                field: "name",
                reason: "must not be blank",
            });
        }
        if !is_plausible_email(self.email.trim()) {
            return Err(DomainError::InvalidRegistration {
                field: "email",
                reason: "must be a valid email address",
            });
        }
        if self.phone.trim().is_empty() {
            return Err(DomainError::InvalidRegistration {
                field: "phone",
                reason: "must not be blank",
            });
        }
        Ok(())
    }

    /// `REG_<date>_<time>_<first three letters of the name>`; unique only at
    /// second granularity.
    pub fn registration_id(&self, at: DateTime<Utc>) -> RegistrationId {
        let fragment = self.name.trim().chars().take(3).collect::<String>().to_uppercase();
        RegistrationId(format!("REG_{}_{fragment}", at.format("%Y%m%d_%H%M%S")))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }

    /// Summary line stored as the user's side of the registration exchange.
    pub fn transcript_line(&self) -> String {
        format!("Registration: {}, {}, {}", self.name, self.email, self.phone)
    }
}

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{RegistrationId, RegistrationRecord};
    use crate::errors::DomainError;

    fn record() -> RegistrationRecord {
        RegistrationRecord {
            name: "alice Johnson".to_string(),
            email: "alice@example.com".to_string(),
            phone: "+1-555-0100".to_string(),
            user_id: Some("web-42".to_string()),
        }
    }

    #[test]
    fn valid_record_passes_validation() {
        assert_eq!(record().validate(), Ok(()));
    }

    #[test]
    fn blank_fields_and_bad_email_are_rejected() {
        let blank_name = RegistrationRecord { name: "  ".to_string(), ..record() };
        assert!(matches!(
            blank_name.validate(),
            Err(DomainError::InvalidRegistration { field: "name", .. })
        ));

        for email in ["", "alice", "alice@", "@example.com", "alice@example", "a b@example.com"] {
            let bad_email = RegistrationRecord { email: email.to_string(), ..record() };
            assert!(
                matches!(
                    bad_email.validate(),
                    Err(DomainError::InvalidRegistration { field: "email", .. })
                ),
                "`{email}` should be rejected"
            );
        }

        let blank_phone = RegistrationRecord { phone: String::new(), ..record() };
        assert!(matches!(
            blank_phone.validate(),
            Err(DomainError::InvalidRegistration { field: "phone", .. })
        ));
    }

    #[test]
    fn registration_id_combines_timestamp_and_name_fragment() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).single().expect("valid timestamp");

        assert_eq!(
            record().registration_id(at),
            RegistrationId("REG_20260314_150926_ALI".to_string())
        );

        let short = RegistrationRecord { name: "Bo".to_string(), ..record() };
        assert_eq!(short.registration_id(at).0, "REG_20260314_150926_BO");
    }

    #[test]
    fn blank_user_id_is_treated_as_absent() {
        let anonymous = RegistrationRecord { user_id: Some("   ".to_string()), ..record() };
        assert_eq!(anonymous.user_id(), None);
        assert_eq!(record().user_id(), Some("web-42"));
        assert_eq!(
            record().transcript_line(),
            "Registration: alice Johnson, alice@example.com, +1-555-0100"
        );
    }
}
