//! Named dashboard metrics, declared as data and executed by
//! [`crate::metrics::MetricRunner`].
//!
//! Ordering is always aggregate-descending with the grouping key(s)
//! ascending as the tie-break, so equal counts come back in a stable order.

use crate::filters::Table;
use crate::models::ClaimStatus;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Listings,
    Claims,
    /// Listings inner-joined to claims on `food_id`; dangling claims drop out.
    Joined,
    /// Listings and claims stacked side by side (`UNION ALL`).
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    FoodId,
    ProviderId,
    ProviderName,
    ListingCity,
    ListingContact,
    FoodType,
    MealType,
    Quantity,
    ProviderType,
    ClaimId,
    ClaimFoodId,
    ReceiverId,
    ReceiverName,
    ClaimCity,
    ClaimContact,
    Status,
    ClaimType,
}

impl Column {
    pub fn table(self) -> Table {
        match self {
            Self::FoodId
            | Self::ProviderId
            | Self::ProviderName
            | Self::ListingCity
            | Self::ListingContact
            | Self::FoodType
            | Self::MealType
            | Self::Quantity
            | Self::ProviderType => Table::Listings,
            Self::ClaimId
            | Self::ClaimFoodId
            | Self::ReceiverId
            | Self::ReceiverName
            | Self::ClaimCity
            | Self::ClaimContact
            | Self::Status
            | Self::ClaimType => Table::Claims,
        }
    }

    /// Physical column name, also used as the output column name.
    pub fn name(self) -> &'static str {
        match self {
            Self::FoodId | Self::ClaimFoodId => "food_id",
            Self::ProviderId => "provider_id",
            Self::ProviderName => "provider_name",
            Self::ListingCity | Self::ClaimCity => "city",
            Self::ListingContact | Self::ClaimContact => "contact",
            Self::FoodType => "food_type",
            Self::MealType => "meal_type",
            Self::Quantity => "quantity",
            Self::ProviderType => "provider_type",
            Self::ClaimId => "claim_id",
            Self::ReceiverId => "receiver_id",
            Self::ReceiverName => "receiver_name",
            Self::Status => "status",
            Self::ClaimType => "claim_type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "arg")]
pub enum Measure {
    Count,
    CountDistinct(Column),
    Sum(Column),
    CountWithStatus(ClaimStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Output {
    pub measure: Measure,
    pub label: &'static str,
}

const fn out(measure: Measure, label: &'static str) -> Output {
    Output { measure, label }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "shape")]
pub enum Shape {
    /// Group by `keys`, order by the measures descending.
    Ranking {
        keys: &'static [Column],
        measures: &'static [Output],
        limit: Option<u32>,
    },
    /// One row, one value; zero when the source is empty.
    Scalar { output: Output },
    /// Per-key count and its percentage of the scoped total.
    Share { key: Column, label: &'static str },
    /// `numerator * scale / denominator`, zero when the denominator is zero.
    Ratio {
        numerator: Measure,
        denominator: Measure,
        scale: f64,
        label: &'static str,
    },
    /// Per-group count divided by one global measure over the whole scope.
    GroupOverGlobal {
        keys: &'static [Column],
        count_label: &'static str,
        denominator: Measure,
        ratio_label: &'static str,
    },
    /// Distinct providers and receivers per city across both tables.
    CityParticipation,
    /// Plain rows ordered by `order_by` ascending.
    Records {
        columns: &'static [Column],
        order_by: Column,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub slug: &'static str,
    pub title: &'static str,
    pub source: Source,
    /// Restrict claims to this status before aggregating.
    pub status: Option<ClaimStatus>,
    pub shape: Shape,
}

const fn metric(slug: &'static str, title: &'static str, source: Source, shape: Shape) -> MetricDefinition {
    MetricDefinition {
        slug,
        title,
        source,
        status: None,
        shape,
    }
}

const fn with_status(definition: MetricDefinition, status: ClaimStatus) -> MetricDefinition {
    MetricDefinition {
        status: Some(status),
        ..definition
    }
}

const fn ranking(keys: &'static [Column], measures: &'static [Output], limit: Option<u32>) -> Shape {
    Shape::Ranking { keys, measures, limit }
}

const fn scalar(measure: Measure, label: &'static str) -> Shape {
    Shape::Scalar {
        output: out(measure, label),
    }
}

const CLAIM_COUNT: &[Output] = &[out(Measure::Count, "claim_count")];
const LISTING_COUNT: &[Output] = &[out(Measure::Count, "listing_count")];
const COMPLETED_COUNT: &[Output] = &[out(Measure::Count, "completed_claims")];
const DONATED_QUANTITY: &[Output] = &[out(Measure::Sum(Column::Quantity), "total_donated")];
const CONTRIBUTIONS: &[Output] = &[
    out(Measure::Count, "listing_count"),
    out(Measure::Sum(Column::Quantity), "total_contributed"),
];

pub static CATALOG: &[MetricDefinition] = &[
    // Providers and receivers
    metric(
        "city-participation",
        "Providers and receivers per city",
        Source::Union,
        Shape::CityParticipation,
    ),
    metric(
        "total-providers",
        "Total food providers",
        Source::Listings,
        scalar(Measure::CountDistinct(Column::ProviderId), "total_providers"),
    ),
    metric(
        "total-receivers",
        "Total food receivers",
        Source::Claims,
        scalar(Measure::CountDistinct(Column::ReceiverId), "total_receivers"),
    ),
    metric(
        "top-food-type",
        "Most common food type offered",
        Source::Listings,
        ranking(&[Column::FoodType], LISTING_COUNT, Some(1)),
    ),
    metric(
        "top-receiver",
        "Receiver with the most claims",
        Source::Claims,
        ranking(
            &[Column::ReceiverId, Column::ReceiverName, Column::ClaimCity],
            CLAIM_COUNT,
            Some(1),
        ),
    ),
    // Listings and availability
    metric(
        "total-quantity",
        "Total quantity available",
        Source::Listings,
        scalar(Measure::Sum(Column::Quantity), "total_quantity"),
    ),
    metric(
        "top-listing-city",
        "City with the most listings",
        Source::Listings,
        ranking(&[Column::ListingCity], LISTING_COUNT, Some(1)),
    ),
    metric(
        "total-listings",
        "Total food listings",
        Source::Listings,
        scalar(Measure::Count, "total_listings"),
    ),
    metric(
        "total-claims",
        "Total food claims",
        Source::Claims,
        scalar(Measure::Count, "total_claims"),
    ),
    metric(
        "avg-listings-per-provider",
        "Average listings per provider",
        Source::Listings,
        Shape::Ratio {
            numerator: Measure::Count,
            denominator: Measure::CountDistinct(Column::ProviderId),
            scale: 1.0,
            label: "avg_listings_per_provider",
        },
    ),
    metric(
        "food-type-distribution",
        "Most commonly available food types",
        Source::Listings,
        ranking(&[Column::FoodType], LISTING_COUNT, None),
    ),
    metric(
        "meal-type-distribution",
        "Most common meal types",
        Source::Listings,
        ranking(&[Column::MealType], LISTING_COUNT, None),
    ),
    metric(
        "meal-type-count",
        "Meal types offered",
        Source::Listings,
        scalar(Measure::CountDistinct(Column::MealType), "total_meal_types"),
    ),
    metric(
        "provider-contributions",
        "Food providers and their contributions",
        Source::Listings,
        ranking(
            &[Column::ProviderName],
            CONTRIBUTIONS,
            None,
        ),
    ),
    // Claims and distribution
    metric(
        "claims-by-food-item",
        "Claims per food item",
        Source::Claims,
        ranking(&[Column::ClaimFoodId], CLAIM_COUNT, None),
    ),
    metric(
        "top-claimed-food-item",
        "Food item with the most claims",
        Source::Claims,
        ranking(&[Column::ClaimFoodId], CLAIM_COUNT, Some(1)),
    ),
    with_status(
        metric(
            "top-completed-provider",
            "Provider with the most completed claims",
            Source::Joined,
            ranking(
                &[Column::ProviderId, Column::ProviderName],
                COMPLETED_COUNT,
                Some(1),
            ),
        ),
        ClaimStatus::Completed,
    ),
    metric(
        "top-claimed-food-type",
        "Most claimed food type",
        Source::Joined,
        ranking(&[Column::FoodType], CLAIM_COUNT, Some(1)),
    ),
    metric(
        "top-claimed-meal-type",
        "Most claimed meal type",
        Source::Joined,
        ranking(&[Column::MealType], CLAIM_COUNT, Some(1)),
    ),
    metric(
        "claim-status-share",
        "Claims by status (percent)",
        Source::Claims,
        Shape::Share {
            key: Column::Status,
            label: "percentage",
        },
    ),
    metric(
        "receiver-claim-ratio",
        "Claims per receiver against all receivers",
        Source::Claims,
        Shape::GroupOverGlobal {
            keys: &[Column::ReceiverId, Column::ReceiverName],
            count_label: "total_claims",
            denominator: Measure::CountDistinct(Column::ReceiverId),
            ratio_label: "claims_per_receiver",
        },
    ),
    with_status(
        metric(
            "top-donating-providers",
            "Quantity donated per provider (completed claims)",
            Source::Joined,
            ranking(
                &[Column::ProviderId],
                DONATED_QUANTITY,
                Some(10),
            ),
        ),
        ClaimStatus::Completed,
    ),
    with_status(
        metric(
            "pending-claims",
            "Pending claims",
            Source::Claims,
            scalar(Measure::Count, "pending_claims"),
        ),
        ClaimStatus::Pending,
    ),
    metric(
        "claim-completion-rate",
        "Claims completion rate (percent)",
        Source::Claims,
        Shape::Ratio {
            numerator: Measure::CountWithStatus(ClaimStatus::Completed),
            denominator: Measure::Count,
            scale: 100.0,
            label: "completion_rate",
        },
    ),
    // Join breakdowns
    metric(
        "claims-by-status",
        "Claims by status",
        Source::Claims,
        ranking(&[Column::Status], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-type",
        "Claims by receiver type",
        Source::Claims,
        ranking(&[Column::ClaimType], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-food-type",
        "Claims by food type",
        Source::Joined,
        ranking(&[Column::FoodType], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-provider-type",
        "Claims by provider type",
        Source::Joined,
        ranking(&[Column::ProviderType], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-provider",
        "Claims by provider",
        Source::Joined,
        ranking(&[Column::ProviderId, Column::ProviderName], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-receiver",
        "Claims by receiver",
        Source::Claims,
        ranking(&[Column::ReceiverId, Column::ReceiverName], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-provider-city",
        "Claims by provider city",
        Source::Joined,
        ranking(&[Column::ListingCity], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-receiver-city",
        "Claims by receiver city",
        Source::Claims,
        ranking(&[Column::ClaimCity], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-provider-contact",
        "Claims by provider contact",
        Source::Joined,
        ranking(&[Column::ListingContact], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-receiver-contact",
        "Claims by receiver contact",
        Source::Claims,
        ranking(&[Column::ClaimContact], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-provider-food-type",
        "Claims by provider food type",
        Source::Joined,
        ranking(&[Column::FoodType], CLAIM_COUNT, None),
    ),
    metric(
        "claims-by-provider-meal-type",
        "Claims by provider meal type",
        Source::Joined,
        ranking(&[Column::MealType], CLAIM_COUNT, None),
    ),
    // Filterable record views
    metric(
        "listings",
        "Food listings",
        Source::Listings,
        Shape::Records {
            columns: &[
                Column::FoodId,
                Column::ProviderId,
                Column::ProviderName,
                Column::ListingCity,
                Column::ListingContact,
                Column::FoodType,
                Column::MealType,
                Column::Quantity,
                Column::ProviderType,
            ],
            order_by: Column::FoodId,
        },
    ),
    metric(
        "provider-contacts",
        "Provider contact details",
        Source::Listings,
        Shape::Records {
            columns: &[
                Column::ProviderId,
                Column::ProviderName,
                Column::ListingCity,
                Column::ListingContact,
                Column::FoodType,
                Column::MealType,
            ],
            order_by: Column::ProviderId,
        },
    ),
    metric(
        "receiver-contacts",
        "Receiver contact details",
        Source::Claims,
        Shape::Records {
            columns: &[
                Column::ReceiverId,
                Column::ReceiverName,
                Column::ClaimCity,
                Column::ClaimContact,
                Column::Status,
            ],
            order_by: Column::ReceiverId,
        },
    ),
];

pub fn find(slug: &str) -> Option<&'static MetricDefinition> {
    CATALOG.iter().find(|definition| definition.slug == slug)
}
