use crate::catalog::{self, Column, Measure, MetricDefinition, Shape, Source};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::filters::{FilterField, ListingFilter, Table};
use crate::models::{ClaimStatus, KpiSummary, MetricTable};
use rusqlite::types::Value;
use std::sync::Arc;

/// Table aliases for one level of a statement.
#[derive(Debug, Clone, Copy)]
struct Scope {
    listings: &'static str,
    claims: &'static str,
}

const OUTER: Scope = Scope {
    listings: "l",
    claims: "c",
};
const INNER: Scope = Scope {
    listings: "l2",
    claims: "c2",
};

impl Scope {
    fn alias(self, table: Table) -> &'static str {
        match table {
            Table::Listings => self.listings,
            Table::Claims => self.claims,
        }
    }

    fn column(self, column: Column) -> String {
        format!("{}.{}", self.alias(column.table()), column.name())
    }
}

/// SQL text plus its positional bindings, appended in lockstep so every
/// `?` lines up with its value.
#[derive(Debug, Default)]
struct QueryBuilder {
    sql: String,
    bindings: Vec<Value>,
}

impl QueryBuilder {
    fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.sql.push('?');
        self.bindings.push(value.into());
        self
    }

    fn push_from(&mut self, source: Source, scope: Scope) -> &mut Self {
        let fragment = match source {
            Source::Listings | Source::Union => format!(" FROM listings {}", scope.listings),
            Source::Claims => format!(" FROM claims {}", scope.claims),
            Source::Joined => format!(
                " FROM listings {l} JOIN claims {c} ON {c}.food_id = {l}.food_id",
                l = scope.listings,
                c = scope.claims
            ),
        };
        self.push(&fragment)
    }

    fn push_measure(&mut self, measure: Measure, scope: Scope) -> &mut Self {
        match measure {
            Measure::Count => self.push("COUNT(*)"),
            Measure::CountDistinct(column) => self.push(&format!("COUNT(DISTINCT {})", scope.column(column))),
            Measure::Sum(column) => self.push(&format!("COALESCE(SUM({}), 0)", scope.column(column))),
            Measure::CountWithStatus(status) => self
                .push(&format!("COALESCE(SUM(CASE WHEN {}.status = ", scope.claims))
                .bind(status.as_str().to_string())
                .push(" THEN 1 ELSE 0 END), 0)"),
        }
    }

    /// WHERE clause for the filter predicates that reach `source`, plus the
    /// optional claim-status restriction.
    fn push_where(
        &mut self,
        source: Source,
        status: Option<ClaimStatus>,
        filter: Option<&ListingFilter>,
        scope: Scope,
    ) -> AppResult<&mut Self> {
        let filtered_table = match source {
            Source::Listings | Source::Joined | Source::Union => Table::Listings,
            Source::Claims => Table::Claims,
        };
        let predicates = match filter {
            Some(filter) => filter.predicates(filtered_table)?,
            None => Vec::new(),
        };

        let mut first = true;
        for predicate in predicates {
            self.push(if first { " WHERE " } else { " AND " });
            first = false;
            self.push(&format!("{}.{} = ", scope.alias(filtered_table), predicate.column))
                .bind(predicate.value);
        }
        if let Some(status) = status {
            self.push(if first { " WHERE " } else { " AND " });
            self.push(&format!("{}.status = ", scope.claims))
                .bind(status.as_str().to_string());
        }
        Ok(self)
    }

    fn push_group_by(&mut self, keys: &[Column], scope: Scope) -> &mut Self {
        let columns: Vec<String> = keys.iter().map(|key| scope.column(*key)).collect();
        self.push(&format!(" GROUP BY {}", columns.join(", ")))
    }

    fn push_key_select(&mut self, keys: &[Column], scope: Scope) -> &mut Self {
        let columns: Vec<String> = keys
            .iter()
            .map(|key| format!("{} AS {}", scope.column(*key), key.name()))
            .collect();
        self.push(&columns.join(", "))
    }
}

fn build_query(definition: &MetricDefinition, filter: Option<&ListingFilter>) -> AppResult<QueryBuilder> {
    let mut query = QueryBuilder::default();
    let source = definition.source;
    let status = definition.status;

    match definition.shape {
        Shape::Ranking { keys, measures, limit } => {
            query.push("SELECT ").push_key_select(keys, OUTER);
            for output in measures {
                query.push(", ").push_measure(output.measure, OUTER).push(&format!(" AS {}", output.label));
            }
            query.push_from(source, OUTER).push_where(source, status, filter, OUTER)?;
            query.push_group_by(keys, OUTER);

            let mut order: Vec<String> = measures.iter().map(|output| format!("{} DESC", output.label)).collect();
            order.extend(keys.iter().map(|key| format!("{} ASC", OUTER.column(*key))));
            query.push(&format!(" ORDER BY {}", order.join(", ")));
            if let Some(limit) = limit {
                query.push(" LIMIT ").bind(i64::from(limit));
            }
        }
        Shape::Scalar { output } => {
            query
                .push("SELECT ")
                .push_measure(output.measure, OUTER)
                .push(&format!(" AS {}", output.label))
                .push_from(source, OUTER)
                .push_where(source, status, filter, OUTER)?;
        }
        Shape::Share { key, label } => {
            query
                .push("SELECT ")
                .push_key_select(&[key], OUTER)
                .push(&format!(
                    ", COUNT(*) AS count, COUNT(*) * 100.0 / SUM(COUNT(*)) OVER () AS {}",
                    label
                ))
                .push_from(source, OUTER)
                .push_where(source, status, filter, OUTER)?;
            query
                .push_group_by(&[key], OUTER)
                .push(&format!(" ORDER BY {} DESC, {} ASC", label, OUTER.column(key)));
        }
        Shape::Ratio {
            numerator,
            denominator,
            scale,
            label,
        } => {
            query
                .push("SELECT CASE WHEN ")
                .push_measure(denominator, OUTER)
                .push(" = 0 THEN 0.0 ELSE ")
                .push_measure(numerator, OUTER)
                .push(" * ")
                .bind(scale)
                .push(" / ")
                .push_measure(denominator, OUTER)
                .push(&format!(" END AS {}", label))
                .push_from(source, OUTER)
                .push_where(source, status, filter, OUTER)?;
        }
        Shape::GroupOverGlobal {
            keys,
            count_label,
            denominator,
            ratio_label,
        } => {
            query
                .push("SELECT ")
                .push_key_select(keys, OUTER)
                .push(&format!(", COUNT(*) AS {}, COALESCE(COUNT(*) * 1.0 / NULLIF((SELECT ", count_label))
                .push_measure(denominator, INNER)
                .push_from(source, INNER)
                .push_where(source, status, filter, INNER)?;
            query
                .push(&format!("), 0), 0.0) AS {}", ratio_label))
                .push_from(source, OUTER)
                .push_where(source, status, filter, OUTER)?;
            query.push_group_by(keys, OUTER);
            let mut order = vec![format!("{} DESC", count_label)];
            order.extend(keys.iter().map(|key| format!("{} ASC", OUTER.column(*key))));
            query.push(&format!(" ORDER BY {}", order.join(", ")));
        }
        Shape::CityParticipation => {
            // The claim half only ever sees the city constraint.
            query.push(
                "SELECT city, COUNT(DISTINCT provider_id) AS providers, COUNT(DISTINCT receiver_id) AS receivers FROM (\
                 SELECT l.city AS city, l.provider_id AS provider_id, NULL AS receiver_id",
            );
            query
                .push_from(Source::Listings, OUTER)
                .push_where(Source::Listings, None, filter, OUTER)?;
            query.push(" UNION ALL SELECT c.city, NULL, c.receiver_id");
            query
                .push_from(Source::Claims, OUTER)
                .push_where(Source::Claims, None, filter, OUTER)?;
            query.push(") AS combined GROUP BY city ORDER BY city ASC");
        }
        Shape::Records { columns, order_by } => {
            query
                .push("SELECT ")
                .push_key_select(columns, OUTER)
                .push_from(source, OUTER)
                .push_where(source, status, filter, OUTER)?;
            query.push(&format!(
                " ORDER BY {} ASC, {}.rowid ASC",
                OUTER.column(order_by),
                OUTER.alias(order_by.table())
            ));
        }
    }

    Ok(query)
}

#[derive(Debug, Clone)]
pub struct MetricRunner {
    db: Arc<Database>,
}

impl MetricRunner {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn run(&self, slug: &str, filter: Option<&ListingFilter>) -> AppResult<MetricTable> {
        let definition =
            catalog::find(slug).ok_or_else(|| AppError::NotFound(format!("no metric named '{}'", slug)))?;
        self.run_definition(definition, filter)
    }

    pub fn run_definition(
        &self,
        definition: &MetricDefinition,
        filter: Option<&ListingFilter>,
    ) -> AppResult<MetricTable> {
        let query = build_query(definition, filter)?;
        tracing::debug!(slug = definition.slug, sql = %query.sql, "running metric");
        let row_set = self.db.read_rows(&query.sql, &query.bindings)?;
        tracing::debug!(slug = definition.slug, rows = row_set.rows.len(), "metric finished");

        Ok(MetricTable {
            slug: definition.slug.to_string(),
            title: definition.title.to_string(),
            columns: row_set.columns,
            rows: row_set.rows,
        })
    }

    /// Every catalog entry in declaration order.
    pub fn run_all(&self, filter: Option<&ListingFilter>) -> AppResult<Vec<MetricTable>> {
        catalog::CATALOG
            .iter()
            .map(|definition| self.run_definition(definition, filter))
            .collect()
    }

    pub fn kpis(&self) -> AppResult<KpiSummary> {
        Ok(KpiSummary {
            total_providers: self.scalar_i64("total-providers", "total_providers")?,
            total_receivers: self.scalar_i64("total-receivers", "total_receivers")?,
            total_listings: self.scalar_i64("total-listings", "total_listings")?,
            total_claims: self.scalar_i64("total-claims", "total_claims")?,
            food_available: self.scalar_i64("total-quantity", "total_quantity")?,
            claim_completion_rate: self.scalar_f64("claim-completion-rate", "completion_rate")?,
        })
    }

    /// Choices for a selector: `All` followed by the distinct listing values.
    pub fn filter_options(&self, field: FilterField) -> AppResult<Vec<String>> {
        let mut options = vec![crate::filters::ANY_VALUE.to_string()];
        options.extend(self.db.distinct_listing_values(field)?);
        Ok(options)
    }

    fn scalar_i64(&self, slug: &str, column: &str) -> AppResult<i64> {
        let table = self.run(slug, None)?;
        Ok(table.scalar(column).and_then(serde_json::Value::as_i64).unwrap_or(0))
    }

    fn scalar_f64(&self, slug: &str, column: &str) -> AppResult<f64> {
        let table = self.run(slug, None)?;
        Ok(table.scalar(column).and_then(serde_json::Value::as_f64).unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::{build_query, MetricRunner};
    use crate::catalog;
    use crate::db::tests::{claim, listing};
    use crate::db::Database;
    use crate::errors::AppError;
    use crate::filters::{FilterField, ListingFilter};
    use crate::models::{Claim, ClaimStatus, Listing, ListingKey};
    use serde_json::json;
    use std::sync::Arc;

    fn runner_with(listings: &[Listing], claims: &[Claim]) -> (tempfile::TempDir, MetricRunner) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        db.replace_all(listings, claims).expect("load");
        (dir, MetricRunner::new(Arc::new(db)))
    }

    fn food_listing(food_id: i64, provider_id: i64, food_type: &str, meal_type: &str, quantity: i64) -> Listing {
        Listing {
            food_type: food_type.to_string(),
            meal_type: meal_type.to_string(),
            ..listing(food_id, provider_id, "New Jessica", quantity)
        }
    }

    #[test]
    fn every_catalog_entry_runs_on_empty_store() {
        let (_dir, runner) = runner_with(&[], &[]);
        for table in runner.run_all(None).expect("run all") {
            let definition = catalog::find(&table.slug).expect("definition");
            match definition.shape {
                catalog::Shape::Scalar { .. } | catalog::Shape::Ratio { .. } => {
                    assert_eq!(table.rows.len(), 1, "{}", table.slug);
                    let value = table.rows[0].values().next().expect("value");
                    assert_eq!(value.as_f64(), Some(0.0), "{}", table.slug);
                }
                _ => assert!(table.is_empty(), "{} should be empty", table.slug),
            }
        }
    }

    #[test]
    fn every_catalog_entry_accepts_a_full_filter() {
        let (_dir, runner) = runner_with(
            &[listing(1, 1, "New Jessica", 3)],
            &[claim(1, 1, 1, ClaimStatus::Completed)],
        );
        let filter = ListingFilter::new()
            .city("New Jessica")
            .provider_name("Provider 1")
            .food_type("Vegetarian")
            .meal_type("Dinner");
        for definition in catalog::CATALOG {
            runner
                .run_definition(definition, Some(&filter))
                .unwrap_or_else(|error| panic!("{} failed: {}", definition.slug, error));
        }
    }

    #[test]
    fn total_quantity_is_the_arithmetic_sum() {
        let listings = vec![listing(1, 1, "A", 12), listing(2, 2, "B", 0), listing(3, 2, "B", 30)];
        let expected: i64 = listings.iter().map(|listing| listing.quantity).sum();
        let (_dir, runner) = runner_with(&listings, &[]);

        let table = runner.run("total-quantity", None).expect("run");
        assert_eq!(table.scalar("total_quantity"), Some(&json!(expected)));
    }

    #[test]
    fn average_listings_per_provider() {
        let mut listings = Vec::new();
        let providers = [1, 1, 1, 1, 2, 2, 2, 3, 3, 4];
        for (idx, provider_id) in providers.iter().enumerate() {
            listings.push(listing(idx as i64 + 1, *provider_id, "A", 1));
        }
        let (_dir, runner) = runner_with(&listings, &[]);

        let table = runner.run("avg-listings-per-provider", None).expect("run");
        assert_eq!(table.scalar("avg_listings_per_provider"), Some(&json!(2.5)));
    }

    #[test]
    fn status_share_sums_to_one_hundred() {
        let mut claims = Vec::new();
        let statuses = [
            ClaimStatus::Completed,
            ClaimStatus::Completed,
            ClaimStatus::Pending,
            ClaimStatus::Canceled,
            ClaimStatus::Canceled,
            ClaimStatus::Canceled,
            ClaimStatus::Pending,
        ];
        for (idx, status) in statuses.iter().enumerate() {
            claims.push(claim(idx as i64 + 1, 1, idx as i64, *status));
        }
        let (_dir, runner) = runner_with(&[], &claims);

        let table = runner.run("claim-status-share", None).expect("run");
        assert_eq!(table.columns, vec!["status", "count", "percentage"]);
        let total: f64 = table.rows.iter().map(|row| row["percentage"].as_f64().expect("pct")).sum();
        assert!((total - 100.0).abs() < 1e-9);
        for row in &table.rows {
            let count = row["count"].as_f64().expect("count");
            let expected = count * 100.0 / statuses.len() as f64;
            assert!((row["percentage"].as_f64().expect("pct") - expected).abs() < 1e-9);
        }
        assert_eq!(table.rows[0]["status"], json!("Canceled"));
    }

    #[test]
    fn dangling_claims_drop_out_of_join_metrics() {
        let (_dir, runner) = runner_with(
            &[food_listing(1, 1, "Vegan", "Lunch", 4)],
            &[
                claim(1, 1, 1, ClaimStatus::Completed),
                claim(2, 999, 2, ClaimStatus::Completed),
            ],
        );

        let by_food_type = runner.run("claims-by-food-type", None).expect("run");
        assert_eq!(by_food_type.rows.len(), 1);
        assert_eq!(by_food_type.rows[0]["claim_count"], json!(1));

        let total = runner.run("total-claims", None).expect("run");
        assert_eq!(total.scalar("total_claims"), Some(&json!(2)));
    }

    #[test]
    fn top_claimed_food_item_ranks_by_count() {
        let mut claims = Vec::new();
        let mut claim_id = 0;
        for (food_id, count) in [(7, 3), (193, 11)] {
            for _ in 0..count {
                claim_id += 1;
                claims.push(claim(claim_id, food_id, claim_id, ClaimStatus::Pending));
            }
        }
        let (_dir, runner) = runner_with(&[], &claims);

        let table = runner.run("top-claimed-food-item", None).expect("run");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0]["food_id"], json!(193));
        assert_eq!(table.rows[0]["claim_count"], json!(11));
    }

    #[test]
    fn ties_break_on_key_ascending() {
        let (_dir, runner) = runner_with(
            &[
                food_listing(1, 1, "Vegan", "Lunch", 1),
                food_listing(2, 2, "Dairy", "Lunch", 1),
                food_listing(3, 3, "Meat", "Lunch", 1),
            ],
            &[],
        );

        let table = runner.run("food-type-distribution", None).expect("run");
        let order: Vec<_> = table.rows.iter().map(|row| row["food_type"].clone()).collect();
        assert_eq!(order, vec![json!("Dairy"), json!("Meat"), json!("Vegan")]);

        let top = runner.run("top-food-type", None).expect("run");
        assert_eq!(top.rows[0]["food_type"], json!("Dairy"));
    }

    #[test]
    fn completed_only_metrics_ignore_other_statuses() {
        let (_dir, runner) = runner_with(
            &[listing(1, 10, "A", 5), listing(2, 20, "A", 8)],
            &[
                claim(1, 1, 1, ClaimStatus::Completed),
                claim(2, 1, 2, ClaimStatus::Completed),
                claim(3, 2, 3, ClaimStatus::Pending),
                claim(4, 2, 4, ClaimStatus::Canceled),
                claim(5, 2, 5, ClaimStatus::Canceled),
            ],
        );

        let provider = runner.run("top-completed-provider", None).expect("run");
        assert_eq!(provider.rows[0]["provider_id"], json!(10));
        assert_eq!(provider.rows[0]["completed_claims"], json!(2));

        let donated = runner.run("top-donating-providers", None).expect("run");
        assert_eq!(donated.rows.len(), 1);
        assert_eq!(donated.rows[0]["total_donated"], json!(10));
    }

    #[test]
    fn top_donating_providers_caps_at_ten() {
        let mut listings = Vec::new();
        let mut claims = Vec::new();
        for id in 1..=12 {
            listings.push(listing(id, id, "A", id));
            claims.push(claim(id, id, id, ClaimStatus::Completed));
        }
        let (_dir, runner) = runner_with(&listings, &claims);

        let table = runner.run("top-donating-providers", None).expect("run");
        assert_eq!(table.rows.len(), 10);
        assert_eq!(table.rows[0]["provider_id"], json!(12));
    }

    // The ratio divides by the distinct receiver count across all claims,
    // not by anything specific to the receiver in the row.
    #[test]
    fn receiver_ratio_uses_global_receiver_count() {
        let (_dir, runner) = runner_with(
            &[],
            &[
                claim(1, 1, 1, ClaimStatus::Pending),
                claim(2, 1, 1, ClaimStatus::Pending),
                claim(3, 1, 1, ClaimStatus::Pending),
                claim(4, 1, 2, ClaimStatus::Pending),
            ],
        );

        let table = runner.run("receiver-claim-ratio", None).expect("run");
        assert_eq!(table.rows[0]["receiver_id"], json!(1));
        assert_eq!(table.rows[0]["total_claims"], json!(3));
        assert_eq!(table.rows[0]["claims_per_receiver"], json!(1.5));
        assert_eq!(table.rows[1]["claims_per_receiver"], json!(0.5));
    }

    #[test]
    fn city_participation_counts_both_sides() {
        let mut far_claim = claim(3, 1, 9, ClaimStatus::Pending);
        far_claim.city = "Port Carol".to_string();
        let (_dir, runner) = runner_with(
            &[listing(1, 1, "New Jessica", 1), listing(2, 2, "New Jessica", 1), listing(3, 2, "Lake Alexis", 1)],
            &[claim(1, 1, 1, ClaimStatus::Pending), claim(2, 1, 1, ClaimStatus::Pending), far_claim],
        );

        let table = runner.run("city-participation", None).expect("run");
        assert_eq!(table.columns, vec!["city", "providers", "receivers"]);
        let cities: Vec<_> = table.rows.iter().map(|row| row["city"].clone()).collect();
        assert_eq!(cities, vec![json!("Lake Alexis"), json!("New Jessica"), json!("Port Carol")]);
        assert_eq!(table.rows[1]["providers"], json!(2));
        assert_eq!(table.rows[1]["receivers"], json!(1));
        assert_eq!(table.rows[2]["providers"], json!(0));
    }

    #[test]
    fn city_filter_narrows_listing_and_claim_views() {
        let mut far_claim = claim(2, 2, 2, ClaimStatus::Pending);
        far_claim.city = "Lake Alexis".to_string();
        let (_dir, runner) = runner_with(
            &[listing(1, 1, "New Jessica", 1), listing(2, 2, "Lake Alexis", 1)],
            &[claim(1, 1, 1, ClaimStatus::Pending), far_claim],
        );
        let filter = ListingFilter::new().city("New Jessica");

        let listings = runner.run("listings", Some(&filter)).expect("run");
        assert_eq!(listings.rows.len(), 1);
        assert!(listings.rows.iter().all(|row| row["city"] == json!("New Jessica")));

        let receivers = runner.run("receiver-contacts", Some(&filter)).expect("run");
        assert_eq!(receivers.rows.len(), 1);
        assert_eq!(receivers.rows[0]["receiver_id"], json!(1));

        let nowhere = ListingFilter::new().city("Atlantis");
        let empty = runner.run("listings", Some(&nowhere)).expect("run");
        assert!(empty.is_empty());
        assert_eq!(empty.columns.len(), 9);
    }

    #[test]
    fn provider_only_filters_do_not_reach_claim_tables() {
        let (_dir, runner) = runner_with(
            &[listing(1, 1, "New Jessica", 1)],
            &[claim(1, 1, 1, ClaimStatus::Pending), claim(2, 1, 2, ClaimStatus::Pending)],
        );
        let filter = ListingFilter::new().provider_name("Nobody");

        let contacts = runner.run("receiver-contacts", Some(&filter)).expect("run");
        assert_eq!(contacts.rows.len(), 2);
        let listings = runner.run("listings", Some(&filter)).expect("run");
        assert!(listings.is_empty());
    }

    #[test]
    fn filter_values_are_bound_not_spliced() {
        let definition = catalog::find("listings").expect("definition");
        let filter = ListingFilter::new().provider_name("O'Connor Bakery");
        let query = build_query(definition, Some(&filter)).expect("build");
        assert!(!query.sql.contains("O'Connor"));
        assert_eq!(query.bindings.len(), 1);
    }

    #[test]
    fn unsafe_filter_values_are_rejected() {
        let (_dir, runner) = runner_with(&[listing(1, 1, "A", 1)], &[]);
        let filter = ListingFilter::new().city("A'; DELETE FROM listings; --");
        let result = runner.run("listings", Some(&filter));
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(runner.run("total-listings", None).expect("run").scalar("total_listings"), Some(&json!(1)));
    }

    #[test]
    fn unknown_metric_is_not_found() {
        let (_dir, runner) = runner_with(&[], &[]);
        assert!(matches!(runner.run("nope", None), Err(AppError::NotFound(_))));
    }

    #[test]
    fn deletes_are_visible_to_the_next_read() {
        let (_dir, runner) = runner_with(&[listing(1, 1, "A", 1), listing(2, 1, "A", 1)], &[]);

        runner.database().delete_listing(ListingKey::FoodId(1)).expect("delete");
        let total = runner.run("total-listings", None).expect("run");
        assert_eq!(total.scalar("total_listings"), Some(&json!(1)));

        let missing = runner.database().delete_listing(ListingKey::FoodId(1));
        assert!(matches!(missing, Err(AppError::NotFound(_))));
        let total = runner.run("total-listings", None).expect("run");
        assert_eq!(total.scalar("total_listings"), Some(&json!(1)));
    }

    #[test]
    fn kpis_summarise_the_store() {
        let (_dir, runner) = runner_with(
            &[listing(1, 1, "A", 4), listing(2, 2, "A", 6)],
            &[
                claim(1, 1, 1, ClaimStatus::Completed),
                claim(2, 2, 2, ClaimStatus::Pending),
                claim(3, 2, 2, ClaimStatus::Pending),
                claim(4, 2, 3, ClaimStatus::Canceled),
            ],
        );

        let kpis = runner.kpis().expect("kpis");
        assert_eq!(kpis.total_providers, 2);
        assert_eq!(kpis.total_receivers, 3);
        assert_eq!(kpis.total_listings, 2);
        assert_eq!(kpis.total_claims, 4);
        assert_eq!(kpis.food_available, 10);
        assert!((kpis.claim_completion_rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn filter_options_lead_with_all() {
        let (_dir, runner) = runner_with(
            &[food_listing(1, 1, "Vegan", "Lunch", 1), food_listing(2, 1, "Dairy", "Lunch", 1)],
            &[],
        );
        assert_eq!(
            runner.filter_options(FilterField::FoodType).expect("options"),
            vec!["All".to_string(), "Dairy".to_string(), "Vegan".to_string()]
        );
    }

    // Listing and claim sides deliberately disagree on city, contact and
    // type so a breakdown wired to the wrong table picks the wrong key.
    fn split_sides() -> (Vec<Listing>, Vec<Claim>) {
        let offer = |food_id, provider_id: i64, name: &str, food_type: &str, meal_type: &str, quantity, kind: &str| Listing {
            food_id,
            provider_id,
            provider_name: name.to_string(),
            city: "Dallas".to_string(),
            contact: format!("L-{}", provider_id),
            food_type: food_type.to_string(),
            meal_type: meal_type.to_string(),
            quantity,
            provider_type: kind.to_string(),
        };
        let request = |claim_id, food_id, receiver_id: i64, name: &str, city: &str, status, kind: &str| Claim {
            claim_id,
            food_id,
            receiver_id,
            receiver_name: name.to_string(),
            city: city.to_string(),
            contact: format!("C-{}", receiver_id),
            status,
            claim_type: kind.to_string(),
        };

        let listings = vec![
            offer(1, 100, "Green Grocer", "Vegan", "Lunch", 10, "Supermarket"),
            offer(2, 200, "Spice Hut", "Non-Vegetarian", "Dinner", 4, "Restaurant"),
            offer(3, 200, "Spice Hut", "Vegan", "Dinner", 6, "Restaurant"),
            Listing {
                city: "Austin".to_string(),
                ..offer(4, 300, "Bakery", "Vegetarian", "Breakfast", 50, "Bakery")
            },
        ];
        let claims = vec![
            request(1, 2, 10, "Food Bank", "Houston", ClaimStatus::Completed, "NGO"),
            request(2, 3, 10, "Food Bank", "Houston", ClaimStatus::Pending, "NGO"),
            request(3, 2, 20, "Shelter One", "El Paso", ClaimStatus::Completed, "Shelter"),
            request(4, 99, 10, "Food Bank", "Houston", ClaimStatus::Canceled, "NGO"),
            request(5, 1, 20, "Shelter One", "El Paso", ClaimStatus::Pending, "Shelter"),
        ];
        (listings, claims)
    }

    #[test]
    fn breakdowns_read_the_right_side_of_the_join() {
        let (listings, claims) = split_sides();
        let (_dir, runner) = runner_with(&listings, &claims);

        let cases = [
            ("claims-by-type", "claim_type", json!("NGO"), 3, 5),
            ("claims-by-receiver", "receiver_id", json!(10), 3, 5),
            ("claims-by-receiver-city", "city", json!("Houston"), 3, 5),
            ("claims-by-receiver-contact", "contact", json!("C-10"), 3, 5),
            ("claims-by-food-item", "food_id", json!(2), 2, 5),
            ("claims-by-provider", "provider_id", json!(200), 3, 4),
            ("claims-by-provider-type", "provider_type", json!("Restaurant"), 3, 4),
            ("claims-by-provider-city", "city", json!("Dallas"), 4, 4),
            ("claims-by-provider-contact", "contact", json!("L-200"), 3, 4),
            ("claims-by-provider-meal-type", "meal_type", json!("Dinner"), 3, 4),
            ("claims-by-provider-food-type", "food_type", json!("Non-Vegetarian"), 2, 4),
        ];
        for (slug, key, expected_key, expected_count, expected_total) in cases {
            let table = runner.run(slug, None).expect(slug);
            assert_eq!(table.rows[0][key], expected_key, "{}", slug);
            assert_eq!(table.rows[0]["claim_count"], json!(expected_count), "{}", slug);
            let total: i64 = table
                .rows
                .iter()
                .map(|row| row["claim_count"].as_i64().expect("count"))
                .sum();
            assert_eq!(total, expected_total, "{}", slug);
        }

        let receiver = runner.run("claims-by-receiver", None).expect("run");
        assert_eq!(receiver.rows[0]["receiver_name"], json!("Food Bank"));
        let provider = runner.run("claims-by-provider", None).expect("run");
        assert_eq!(provider.rows[0]["provider_name"], json!("Spice Hut"));
    }

    #[test]
    fn headline_rankings_on_split_sides() {
        let (listings, claims) = split_sides();
        let (_dir, runner) = runner_with(&listings, &claims);

        let top_receiver = runner.run("top-receiver", None).expect("run");
        assert_eq!(top_receiver.rows.len(), 1);
        assert_eq!(top_receiver.rows[0]["receiver_id"], json!(10));
        assert_eq!(top_receiver.rows[0]["receiver_name"], json!("Food Bank"));
        assert_eq!(top_receiver.rows[0]["city"], json!("Houston"));
        assert_eq!(top_receiver.rows[0]["claim_count"], json!(3));

        let top_city = runner.run("top-listing-city", None).expect("run");
        assert_eq!(top_city.rows.len(), 1);
        assert_eq!(top_city.rows[0]["city"], json!("Dallas"));
        assert_eq!(top_city.rows[0]["listing_count"], json!(3));

        let meal_types = runner.run("meal-type-count", None).expect("run");
        assert_eq!(meal_types.scalar("total_meal_types"), Some(&json!(3)));

        let donated = runner.run("top-donating-providers", None).expect("run");
        assert_eq!(donated.rows.len(), 1);
        assert_eq!(donated.rows[0]["provider_id"], json!(200));
        assert_eq!(donated.rows[0]["total_donated"], json!(8));
    }

    #[test]
    fn provider_contributions_rank_by_count_then_quantity() {
        let (listings, claims) = split_sides();
        let (_dir, runner) = runner_with(&listings, &claims);

        let table = runner.run("provider-contributions", None).expect("run");
        let ranked: Vec<_> = table
            .rows
            .iter()
            .map(|row| {
                (
                    row["provider_name"].clone(),
                    row["listing_count"].clone(),
                    row["total_contributed"].clone(),
                )
            })
            .collect();
        assert_eq!(
            ranked,
            vec![
                (json!("Spice Hut"), json!(2), json!(10)),
                (json!("Bakery"), json!(1), json!(50)),
                (json!("Green Grocer"), json!(1), json!(10)),
            ]
        );
    }
}
