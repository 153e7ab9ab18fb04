use crate::errors::{AppError, AppResult};
use crate::filters::{FilterField, Table};
use crate::models::{Claim, ClaimStatus, IngestReport, Listing, ListingKey, ListingPayload, MetricRow, NewListing};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const LISTING_COLUMNS: &str =
    "food_id, provider_id, provider_name, city, contact, food_type, meal_type, quantity, provider_type";
const CLAIM_COLUMNS: &str = "claim_id, food_id, receiver_id, receiver_name, city, contact, status, claim_type";

/// Column names and rows produced by an ad-hoc read.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<MetricRow>,
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|err| {
            AppError::Connectivity(format!("cannot open store at {}: {}", path.display(), err))
        })?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        tracing::debug!(path = %path.display(), "opened analytics store");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    // ─── Bulk load ──────────────────────────────────────────────────────────

    /// Truncate both tables and load the given records in one transaction.
    pub fn replace_all(&self, listings: &[Listing], claims: &[Claim]) -> AppResult<IngestReport> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM claims", [])?;
        tx.execute("DELETE FROM listings", [])?;
        {
            let mut insert_listing = tx.prepare(
                "INSERT INTO listings (food_id, provider_id, provider_name, city, contact, food_type, meal_type, quantity, provider_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for listing in listings {
                insert_listing.execute(params![
                    listing.food_id,
                    listing.provider_id,
                    listing.provider_name,
                    listing.city,
                    listing.contact,
                    listing.food_type,
                    listing.meal_type,
                    listing.quantity,
                    listing.provider_type,
                ])?;
            }

            let mut insert_claim = tx.prepare(
                "INSERT INTO claims (claim_id, food_id, receiver_id, receiver_name, city, contact, status, claim_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for claim in claims {
                insert_claim.execute(params![
                    claim.claim_id,
                    claim.food_id,
                    claim.receiver_id,
                    claim.receiver_name,
                    claim.city,
                    claim.contact,
                    claim.status.as_str(),
                    claim.claim_type,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(listings = listings.len(), claims = claims.len(), "store reloaded");
        Ok(IngestReport {
            listings: listings.len(),
            claims: claims.len(),
        })
    }

    // ─── Listings CRUD ──────────────────────────────────────────────────────

    pub fn create_listing(&self, new_listing: NewListing) -> AppResult<Listing> {
        validate_payload(&new_listing.payload)?;
        require_stock(&new_listing.payload)?;

        let conn = self.lock()?;
        if let Some(food_id) = new_listing.food_id {
            let exists = conn
                .query_row("SELECT COUNT(1) FROM listings WHERE food_id = ?1", [food_id], |row| {
                    row.get::<_, i64>(0)
                })?
                > 0;
            if exists {
                return Err(AppError::Validation(format!("food_id {} is already listed", food_id)));
            }
        }

        let payload = new_listing.payload;
        conn.execute(
            "INSERT INTO listings (food_id, provider_id, provider_name, city, contact, food_type, meal_type, quantity, provider_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new_listing.food_id,
                payload.provider_id,
                payload.provider_name.trim(),
                payload.city.trim(),
                payload.contact.trim(),
                payload.food_type.trim(),
                payload.meal_type.trim(),
                payload.quantity,
                payload.provider_type.trim(),
            ],
        )?;
        let food_id = conn.last_insert_rowid();
        tracing::info!(food_id, provider_id = payload.provider_id, "listing created");

        Ok(Listing {
            food_id,
            provider_id: payload.provider_id,
            provider_name: payload.provider_name.trim().to_string(),
            city: payload.city.trim().to_string(),
            contact: payload.contact.trim().to_string(),
            food_type: payload.food_type.trim().to_string(),
            meal_type: payload.meal_type.trim().to_string(),
            quantity: payload.quantity,
            provider_type: payload.provider_type.trim().to_string(),
        })
    }

    /// Overwrite every non-identity field of the addressed listing(s).
    /// Returns the number of listings changed.
    pub fn update_listing(&self, key: ListingKey, payload: &ListingPayload) -> AppResult<usize> {
        validate_payload(payload)?;
        require_stock(payload)?;

        let conn = self.lock()?;
        let sql = format!(
            "UPDATE listings SET provider_id = ?1, provider_name = ?2, city = ?3, contact = ?4,
             food_type = ?5, meal_type = ?6, quantity = ?7, provider_type = ?8 WHERE {} = ?9",
            key.column()
        );
        let changed = conn.execute(
            &sql,
            params![
                payload.provider_id,
                payload.provider_name.trim(),
                payload.city.trim(),
                payload.contact.trim(),
                payload.food_type.trim(),
                payload.meal_type.trim(),
                payload.quantity,
                payload.provider_type.trim(),
                key.value(),
            ],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("no listing with {}", key)));
        }
        tracing::info!(%key, changed, "listing updated");
        Ok(changed)
    }

    /// Remove the addressed listing(s). Claims that referenced them are kept.
    pub fn delete_listing(&self, key: ListingKey) -> AppResult<usize> {
        let conn = self.lock()?;
        let sql = format!("DELETE FROM listings WHERE {} = ?1", key.column());
        let changed = conn.execute(&sql, [key.value()])?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("no listing with {}", key)));
        }
        tracing::info!(%key, changed, "listing deleted");
        Ok(changed)
    }

    pub fn get_listing(&self, food_id: i64) -> AppResult<Option<Listing>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM listings WHERE food_id = ?1", LISTING_COLUMNS),
            [food_id],
            parse_listing_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_listings(&self) -> AppResult<Vec<Listing>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM listings ORDER BY food_id ASC", LISTING_COLUMNS))?;
        let rows = stmt.query_map([], parse_listing_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // ─── Claims ─────────────────────────────────────────────────────────────

    pub fn get_claim(&self, claim_id: i64) -> AppResult<Option<Claim>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM claims WHERE claim_id = ?1", CLAIM_COLUMNS),
            [claim_id],
            parse_claim_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_claims(&self) -> AppResult<Vec<Claim>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM claims ORDER BY claim_id ASC", CLAIM_COLUMNS))?;
        let claims = stmt
            .query_map([], parse_claim_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(claims)
    }

    pub fn set_claim_status(&self, claim_id: i64, status: ClaimStatus) -> AppResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE claims SET status = ?1 WHERE claim_id = ?2",
            params![status.as_str(), claim_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("no claim with claim_id {}", claim_id)));
        }
        tracing::info!(claim_id, status = status.as_str(), "claim status changed");
        Ok(())
    }

    // ─── Reads ──────────────────────────────────────────────────────────────

    /// Sorted distinct values of a listing selector column.
    pub fn distinct_listing_values(&self, field: FilterField) -> AppResult<Vec<String>> {
        let Some(column) = field.column_for(Table::Listings) else {
            return Ok(Vec::new());
        };
        let conn = self.lock()?;
        let sql = format!(
            "SELECT DISTINCT {column} FROM listings WHERE {column} IS NOT NULL AND TRIM({column}) <> '' ORDER BY {column} ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// Run a read-only statement with positional parameters and collect
    /// every row as a column-name → JSON map.
    pub fn read_rows(&self, sql: &str, bindings: &[Value]) -> AppResult<RowSet> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(AppError::Internal("refusing to run a mutating statement on the read path".to_string()));
        }
        let columns: Vec<String> = stmt.column_names().iter().map(|name| name.to_string()).collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(bindings.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = MetricRow::new();
            for (idx, column) in columns.iter().enumerate() {
                map.insert(column.clone(), value_to_json(row.get_ref(idx)?));
            }
            result.push(map);
        }
        Ok(RowSet { columns, rows: result })
    }
}

fn validate_payload(payload: &ListingPayload) -> AppResult<()> {
    let required = [
        ("provider_name", payload.provider_name.as_str()),
        ("city", payload.city.as_str()),
        ("contact", payload.contact.as_str()),
        ("food_type", payload.food_type.as_str()),
        ("meal_type", payload.meal_type.as_str()),
        ("provider_type", payload.provider_type.as_str()),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!("missing required fields: {}", missing.join(", "))));
    }
    if payload.quantity < 0 {
        return Err(AppError::Validation("quantity cannot be negative".to_string()));
    }
    Ok(())
}

// Listings entered by hand must offer something; CSV reloads may carry zero.
fn require_stock(payload: &ListingPayload) -> AppResult<()> {
    if payload.quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".to_string()));
    }
    Ok(())
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(number) => serde_json::Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => serde_json::Value::Null,
    }
}

fn parse_listing_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Listing> {
    Ok(Listing {
        food_id: row.get(0)?,
        provider_id: row.get(1)?,
        provider_name: row.get(2)?,
        city: row.get(3)?,
        contact: row.get(4)?,
        food_type: row.get(5)?,
        meal_type: row.get(6)?,
        quantity: row.get(7)?,
        provider_type: row.get(8)?,
    })
}

fn parse_claim_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        claim_id: row.get(0)?,
        food_id: row.get(1)?,
        receiver_id: row.get(2)?,
        receiver_name: row.get(3)?,
        city: row.get(4)?,
        contact: row.get(5)?,
        status: parse_status(&row.get::<_, String>(6)?)?,
        claim_type: row.get(7)?,
    })
}

fn parse_status(raw: &str) -> rusqlite::Result<ClaimStatus> {
    ClaimStatus::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown claim status '{}'", raw),
            )),
        )
    })
}
