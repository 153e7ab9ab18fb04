use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Claim, ClaimStatus, IngestReport, Listing};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// Header names follow the provider/claim exports; snake_case is accepted too.
#[derive(Debug, Deserialize)]
struct ListingRecord {
    #[serde(rename = "Food_ID", alias = "food_id")]
    food_id: i64,
    #[serde(rename = "Provider_ID", alias = "provider_id")]
    provider_id: i64,
    #[serde(rename = "Name", alias = "provider_name")]
    provider_name: String,
    #[serde(rename = "City", alias = "city")]
    city: String,
    #[serde(rename = "Contact", alias = "contact")]
    contact: String,
    #[serde(rename = "Food_Type", alias = "food_type")]
    food_type: String,
    #[serde(rename = "Meal_Type", alias = "meal_type")]
    meal_type: String,
    #[serde(rename = "Quantity", alias = "quantity")]
    quantity: i64,
    #[serde(rename = "Type", alias = "provider_type", alias = "Provider_Type")]
    provider_type: String,
}

#[derive(Debug, Deserialize)]
struct ClaimRecord {
    #[serde(rename = "Claim_ID", alias = "claim_id", default)]
    claim_id: Option<i64>,
    #[serde(rename = "Food_ID", alias = "food_id")]
    food_id: i64,
    #[serde(rename = "Receiver_ID", alias = "receiver_id")]
    receiver_id: i64,
    #[serde(rename = "Name", alias = "receiver_name")]
    receiver_name: String,
    #[serde(rename = "City", alias = "city")]
    city: String,
    #[serde(rename = "Contact", alias = "contact")]
    contact: String,
    #[serde(rename = "Status", alias = "status")]
    status: String,
    #[serde(rename = "Type", alias = "claim_type", alias = "Receiver_Type")]
    claim_type: String,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader)
}

// Data rows start on line 2, after the header.
fn line_of(index: usize) -> usize {
    index + 2
}

pub fn read_listings<R: Read>(reader: R) -> AppResult<Vec<Listing>> {
    let mut listings = Vec::new();
    let mut seen = HashSet::new();
    for (index, record) in csv_reader(reader).deserialize::<ListingRecord>().enumerate() {
        let record = record?;
        if record.quantity < 0 {
            return Err(AppError::Validation(format!(
                "listing on line {} has negative quantity {}",
                line_of(index),
                record.quantity
            )));
        }
        if !seen.insert(record.food_id) {
            return Err(AppError::Validation(format!(
                "duplicate Food_ID {} on line {}",
                record.food_id,
                line_of(index)
            )));
        }
        listings.push(Listing {
            food_id: record.food_id,
            provider_id: record.provider_id,
            provider_name: record.provider_name,
            city: record.city,
            contact: record.contact,
            food_type: record.food_type,
            meal_type: record.meal_type,
            quantity: record.quantity,
            provider_type: record.provider_type,
        });
    }
    Ok(listings)
}

/// Claims without a `Claim_ID` column are numbered by row, starting at 1.
pub fn read_claims<R: Read>(reader: R) -> AppResult<Vec<Claim>> {
    let mut claims = Vec::new();
    let mut seen = HashSet::new();
    for (index, record) in csv_reader(reader).deserialize::<ClaimRecord>().enumerate() {
        let record = record?;
        let status = ClaimStatus::parse(&record.status).ok_or_else(|| {
            AppError::Validation(format!(
                "unknown claim status '{}' on line {}",
                record.status,
                line_of(index)
            ))
        })?;
        let claim_id = record.claim_id.unwrap_or(index as i64 + 1);
        if !seen.insert(claim_id) {
            return Err(AppError::Validation(format!(
                "duplicate Claim_ID {} on line {}",
                claim_id,
                line_of(index)
            )));
        }
        claims.push(Claim {
            claim_id,
            food_id: record.food_id,
            receiver_id: record.receiver_id,
            receiver_name: record.receiver_name,
            city: record.city,
            contact: record.contact,
            status,
            claim_type: record.claim_type,
        });
    }
    Ok(claims)
}

/// Parse both files completely, then swap the store contents in one go.
/// A parse failure leaves the store untouched.
pub fn load_files(db: &Database, listings_path: &Path, claims_path: &Path) -> AppResult<IngestReport> {
    let listings = read_listings(open(listings_path)?)?;
    let claims = read_claims(open(claims_path)?)?;
    tracing::info!(
        listings_path = %listings_path.display(),
        claims_path = %claims_path.display(),
        "parsed csv exports"
    );
    db.replace_all(&listings, &claims)
}

fn open(path: &Path) -> AppResult<File> {
    File::open(path).map_err(|error| AppError::Io(format!("{}: {}", path.display(), error)))
}
