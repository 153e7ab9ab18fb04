use crate::errors::AppResult;
use crate::metrics::MetricRunner;
use crate::models::{Reminder, ReminderAudience};
use chrono::{Datelike, NaiveDate, Weekday};

/// Reminders due on `today`: a weekly nudge for providers on
/// `provider_day`, and a follow-up for receivers while claims are pending.
pub fn due(runner: &MetricRunner, today: NaiveDate, provider_day: Weekday) -> AppResult<Vec<Reminder>> {
    let mut reminders = Vec::new();

    if today.weekday() == provider_day {
        reminders.push(Reminder {
            audience: ReminderAudience::Providers,
            message: "Please update your food listings for the week.".to_string(),
        });
    }

    let pending = runner
        .run("pending-claims", None)?
        .scalar("pending_claims")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0);
    if pending > 0 {
        reminders.push(Reminder {
            audience: ReminderAudience::Receivers,
            message: format!("You have {} pending claims. Please follow up.", pending),
        });
    }

    tracing::debug!(%today, count = reminders.len(), "computed reminders");
    Ok(reminders)
}
