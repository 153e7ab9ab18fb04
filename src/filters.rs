use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Selector value meaning "no constraint on this field".
pub const ANY_VALUE: &str = "All";

static UNSAFE_VALUE: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"(;|--|/\*|\*/|[\x00-\x1f\x7f])").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterField {
    City,
    ProviderName,
    FoodType,
    MealType,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [Self::City, Self::ProviderName, Self::FoodType, Self::MealType];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::ProviderName => "provider-name",
            Self::FoodType => "food-type",
            Self::MealType => "meal-type",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == raw)
    }

    /// Column this field constrains on `table`, or `None` when the table
    /// has no such column. Only the city carries over to claims.
    pub fn column_for(self, table: Table) -> Option<&'static str> {
        match (self, table) {
            (Self::City, _) => Some("city"),
            (Self::ProviderName, Table::Listings) => Some("provider_name"),
            (Self::FoodType, Table::Listings) => Some("food_type"),
            (Self::MealType, Table::Listings) => Some("meal_type"),
            (_, Table::Claims) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Listings,
    Claims,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: &'static str,
    pub value: String,
}

/// Conjunctive equality filter over the listing-side selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingFilter {
    pub city: Option<String>,
    pub provider_name: Option<String>,
    pub food_type: Option<String>,
    pub meal_type: Option<String>,
}

impl ListingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::City, value);
        self
    }

    pub fn provider_name(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::ProviderName, value);
        self
    }

    pub fn food_type(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::FoodType, value);
        self
    }

    pub fn meal_type(mut self, value: impl Into<String>) -> Self {
        self.set(FilterField::MealType, value);
        self
    }

    pub fn set(&mut self, field: FilterField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    pub fn clear(&mut self, field: FilterField) {
        *self.slot_mut(field) = None;
    }

    /// Effective constraint for `field`; blank and `All` read as unset.
    pub fn get(&self, field: FilterField) -> Option<&str> {
        let raw = match field {
            FilterField::City => self.city.as_deref(),
            FilterField::ProviderName => self.provider_name.as_deref(),
            FilterField::FoodType => self.food_type.as_deref(),
            FilterField::MealType => self.meal_type.as_deref(),
        }?;
        let value = raw.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(ANY_VALUE) {
            return None;
        }
        Some(value)
    }

    pub fn is_unconstrained(&self) -> bool {
        FilterField::ALL.iter().all(|field| self.get(*field).is_none())
    }

    pub fn validate(&self) -> AppResult<()> {
        for field in FilterField::ALL {
            if let Some(value) = self.get(field) {
                if UNSAFE_VALUE.is_match(value) {
                    return Err(AppError::Validation(format!(
                        "filter value for {} contains disallowed characters",
                        field.as_str()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validated equality predicates that apply to `table`, in field order.
    pub fn predicates(&self, table: Table) -> AppResult<Vec<Predicate>> {
        self.validate()?;
        Ok(FilterField::ALL
            .into_iter()
            .filter_map(|field| {
                let column = field.column_for(table)?;
                let value = self.get(field)?;
                Some(Predicate {
                    column,
                    value: value.to_string(),
                })
            })
            .collect())
    }

    fn slot_mut(&mut self, field: FilterField) -> &mut Option<String> {
        match field {
            FilterField::City => &mut self.city,
            FilterField::ProviderName => &mut self.provider_name,
            FilterField::FoodType => &mut self.food_type,
            FilterField::MealType => &mut self.meal_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterField, ListingFilter, Table};
    use crate::errors::AppError;

    #[test]
    fn all_and_blank_mean_unconstrained() {
        let filter = ListingFilter::new().city("All").food_type("  ").meal_type("all");
        assert!(filter.is_unconstrained());
        assert!(filter.predicates(Table::Listings).expect("predicates").is_empty());
    }

    #[test]
    fn claims_only_receive_city() {
        let filter = ListingFilter::new()
            .city("New Jessica")
            .provider_name("Gonzales-Cochran")
            .food_type("Vegetarian")
            .meal_type("Dinner");

        let listing = filter.predicates(Table::Listings).expect("listing predicates");
        assert_eq!(
            listing.iter().map(|p| p.column).collect::<Vec<_>>(),
            vec!["city", "provider_name", "food_type", "meal_type"]
        );

        let claim = filter.predicates(Table::Claims).expect("claim predicates");
        assert_eq!(claim.len(), 1);
        assert_eq!(claim[0].column, "city");
        assert_eq!(claim[0].value, "New Jessica");
    }

    #[test]
    fn rejects_statement_breaking_values() {
        for raw in ["x'; DROP TABLE listings; --", "Dinner -- tail", "a /* b", "line\nbreak"] {
            let filter = ListingFilter::new().meal_type(raw);
            let error = filter.predicates(Table::Listings).expect_err("unsafe value");
            assert!(matches!(error, AppError::Validation(_)), "{raw}");
        }
    }

    #[test]
    fn apostrophes_are_bound_not_rejected() {
        let filter = ListingFilter::new().provider_name("O'Connor Bakery");
        let predicates = filter.predicates(Table::Listings).expect("predicates");
        assert_eq!(predicates[0].value, "O'Connor Bakery");
    }

    #[test]
    fn values_are_trimmed() {
        let mut filter = ListingFilter::new();
        filter.set(FilterField::City, " Lake Alexis ");
        assert_eq!(filter.get(FilterField::City), Some("Lake Alexis"));
        filter.clear(FilterField::City);
        assert!(filter.is_unconstrained());
    }
}
