use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Completed,
    Canceled,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 3] = [Self::Pending, Self::Completed, Self::Canceled];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Canceled => "Canceled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .or_else(|| trimmed.eq_ignore_ascii_case("cancelled").then_some(Self::Canceled))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub food_id: i64,
    pub provider_id: i64,
    pub provider_name: String,
    pub city: String,
    pub contact: String,
    pub food_type: String,
    pub meal_type: String,
    pub quantity: i64,
    pub provider_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub claim_id: i64,
    pub food_id: i64,
    pub receiver_id: i64,
    pub receiver_name: String,
    pub city: String,
    pub contact: String,
    pub status: ClaimStatus,
    pub claim_type: String,
}

/// Every field a listing carries apart from its `food_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub provider_id: i64,
    pub provider_name: String,
    pub city: String,
    pub contact: String,
    pub food_type: String,
    pub meal_type: String,
    pub quantity: i64,
    pub provider_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    #[serde(default)]
    pub food_id: Option<i64>,
    #[serde(flatten)]
    pub payload: ListingPayload,
}

/// Identity used by update and delete. A provider key addresses every
/// listing of that provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "by", content = "id")]
pub enum ListingKey {
    FoodId(i64),
    ProviderId(i64),
}

impl ListingKey {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::FoodId(_) => "food_id",
            Self::ProviderId(_) => "provider_id",
        }
    }

    pub(crate) fn value(self) -> i64 {
        match self {
            Self::FoodId(id) | Self::ProviderId(id) => id,
        }
    }
}

impl std::fmt::Display for ListingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.column(), self.value())
    }
}

pub type MetricRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTable {
    pub slug: String,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<MetricRow>,
}

impl MetricTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row's value for `column`, the usual way to read a KPI.
    pub fn scalar(&self, column: &str) -> Option<&serde_json::Value> {
        self.rows.first().and_then(|row| row.get(column))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub total_providers: i64,
    pub total_receivers: i64,
    pub total_listings: i64,
    pub total_claims: i64,
    pub food_available: i64,
    pub claim_completion_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderAudience {
    Providers,
    Receivers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub audience: ReminderAudience,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub listings: usize,
    pub claims: usize,
}

#[cfg(test)]
mod tests {
    use super::ClaimStatus;

    #[test]
    fn claim_status_parse_is_case_insensitive() {
        assert_eq!(ClaimStatus::parse("completed"), Some(ClaimStatus::Completed));
        assert_eq!(ClaimStatus::parse(" Pending "), Some(ClaimStatus::Pending));
        assert_eq!(ClaimStatus::parse("Cancelled"), Some(ClaimStatus::Canceled));
        assert_eq!(ClaimStatus::parse("Shipped"), None);
    }
}
