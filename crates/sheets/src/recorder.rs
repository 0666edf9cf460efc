use std::sync::Arc;

use chrono::{DateTime, Utc};
use coursebot_core::domain::registration::RegistrationRecord;
use tracing::{info, warn};

use crate::client::RowSink;

pub const SHEET_HEADER: [&str; 6] = ["Timestamp", "Name", "Email", "Phone", "User ID", "Course"];

pub const SUPPORT_EMAIL: &str = "support@ourcompany.com";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub accepted: bool,
}

/// Forwards registrations to the spreadsheet. Never fails: a missing sink or
/// a failed append is reported as `accepted = false`.
pub struct RegistrationRecorder {
    sink: Option<Arc<dyn RowSink>>,
    course_name: String,
}

impl RegistrationRecorder {
    pub fn new(sink: Option<Arc<dyn RowSink>>, course_name: impl Into<String>) -> Self {
        Self { sink, course_name: course_name.into() }
    }

    pub fn is_configured(&self) -> bool {
        self.sink.is_some()
    }

    pub fn course_name(&self) -> &str {
        &self.course_name
    }

    pub fn row_for(&self, registration: &RegistrationRecord, at: DateTime<Utc>) -> Vec<String> {
        vec![
            at.format("%Y-%m-%d %H:%M:%S").to_string(),
            registration.name.clone(),
            registration.email.clone(),
            registration.phone.clone(),
            registration.user_id().unwrap_or("N/A").to_string(),
            self.course_name.clone(),
        ]
    }

    pub async fn record(&self, registration: &RegistrationRecord) -> RecordOutcome {
        self.record_at(registration, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        registration: &RegistrationRecord,
        at: DateTime<Utc>,
    ) -> RecordOutcome {
        let Some(sink) = &self.sink else {
            warn!(
                event_name = "registration.record.skipped",
                reason = "spreadsheet not configured",
                "registration not forwarded"
            );
            return RecordOutcome { accepted: false };
        };

        match sink.append_row(&SHEET_HEADER, &self.row_for(registration, at)).await {
            Ok(()) => {
                info!(event_name = "registration.record.saved", "registration row appended");
                RecordOutcome { accepted: true }
            }
            Err(error) => {
                warn!(
                    event_name = "registration.record.failed",
                    error = %error,
                    "registration row could not be appended"
                );
                RecordOutcome { accepted: false }
            }
        }
    }
}

pub fn confirmation_message(
    registration: &RegistrationRecord,
    course_name: &str,
    outcome: RecordOutcome,
) -> String {
    let status = if outcome.accepted {
        "✅ **Saved to our system successfully!**"
    } else {
        "⚠️ **Registration received but there was an issue with our system. We will contact you shortly.**"
    };

    format!(
        "🎉 Thank you for registering, {name}!\n\
         \n\
         **Registration Details:**\n\
         ✅ **Name:** {name}\n\
         ✅ **Email:** {email}\n\
         ✅ **Phone:** {phone}\n\
         ✅ **Course:** {course_name}\n\
         \n\
         {status}\n\
         \n\
         **What's Next:**\n\
         1. You'll receive a confirmation email within 24 hours\n\
         2. Course materials will be sent 1 week before start date\n\
         3. You'll get access to our community channel\n\
         4. Payment instructions will be included in the confirmation email\n\
         \n\
         **Course starts:** Contact us for the next batch schedule\n\
         **Need help?** Reply here or email {SUPPORT_EMAIL}\n\
         \n\
         Welcome to the {course_name} family! ✨",
        name = registration.name,
        email = registration.email,
        phone = registration.phone,
    )
}
