use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use food_rescue_analytics_lib::catalog::CATALOG;
use food_rescue_analytics_lib::models::{ClaimStatus, ListingKey, ListingPayload, NewListing};
use food_rescue_analytics_lib::{ingest, init_tracing, open_runner, reminders, FilterField, ListingFilter, Settings};
use serde::Serialize;
use std::path::PathBuf;

/// Surplus food listings, claims and dashboard metrics.
#[derive(Parser, Debug)]
#[command(name = "food-rescue", about = "Surplus food analytics over a local SQLite store")]
struct Cli {
    /// YAML settings file
    #[arg(long, env = "FOOD_RESCUE_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the settings file)
    #[arg(long, env = "FOOD_RESCUE_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace both tables with the contents of the CSV exports
    Ingest {
        #[arg(long)]
        listings: Option<PathBuf>,
        #[arg(long)]
        claims: Option<PathBuf>,
    },
    /// List every metric slug with its title
    Catalog,
    /// Run one metric
    Metric {
        slug: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Run every metric
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Headline numbers
    Kpis,
    /// Selector choices for a filter field (city, provider-name, food-type, meal-type)
    Options { field: String },
    /// Reminders due on a date (default today)
    Reminders {
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    #[command(subcommand)]
    Listing(ListingCommand),
    /// Change a claim's status
    ClaimStatus { claim_id: i64, status: String },
}

#[derive(Subcommand, Debug)]
enum ListingCommand {
    Add {
        #[arg(long)]
        food_id: Option<i64>,
        #[command(flatten)]
        fields: ListingFields,
    },
    Update {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        fields: ListingFields,
    },
    Delete {
        #[command(flatten)]
        key: KeyArgs,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    food_type: Option<String>,
    #[arg(long)]
    meal_type: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> Option<ListingFilter> {
        let mut filter = ListingFilter::new();
        let pairs = [
            (FilterField::City, self.city),
            (FilterField::ProviderName, self.provider),
            (FilterField::FoodType, self.food_type),
            (FilterField::MealType, self.meal_type),
        ];
        for (field, value) in pairs {
            if let Some(value) = value {
                filter.set(field, value);
            }
        }
        (!filter.is_unconstrained()).then_some(filter)
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct KeyArgs {
    /// Address a single listing
    #[arg(long = "target-food-id")]
    food_id: Option<i64>,
    /// Address every listing of a provider
    #[arg(long = "target-provider-id")]
    provider_id: Option<i64>,
}

impl KeyArgs {
    fn key(&self) -> Result<ListingKey> {
        match (self.food_id, self.provider_id) {
            (Some(id), None) => Ok(ListingKey::FoodId(id)),
            (None, Some(id)) => Ok(ListingKey::ProviderId(id)),
            _ => bail!("pass exactly one of --target-food-id or --target-provider-id"),
        }
    }
}

#[derive(Args, Debug)]
struct ListingFields {
    #[arg(long)]
    provider_id: i64,
    #[arg(long)]
    name: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    contact: String,
    #[arg(long)]
    food_type: String,
    #[arg(long)]
    meal_type: String,
    #[arg(long)]
    quantity: i64,
    #[arg(long)]
    provider_type: String,
}

impl From<ListingFields> for ListingPayload {
    fn from(fields: ListingFields) -> Self {
        Self {
            provider_id: fields.provider_id,
            provider_name: fields.name,
            city: fields.city,
            contact: fields.contact,
            food_type: fields.food_type,
            meal_type: fields.meal_type,
            quantity: fields.quantity,
            provider_type: fields.provider_type,
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }
    init_tracing(settings.log_dir.as_deref(), &settings.log_filter).map_err(anyhow::Error::msg)?;

    let runner = open_runner(&settings)
        .with_context(|| format!("opening {}", settings.database_path.display()))?;
    let db = runner.database();

    match cli.command {
        Command::Ingest { listings, claims } => {
            let listings = listings.unwrap_or_else(|| settings.listings_csv.clone());
            let claims = claims.unwrap_or_else(|| settings.claims_csv.clone());
            print_json(&ingest::load_files(db, &listings, &claims)?)?;
        }
        Command::Catalog => {
            for definition in CATALOG {
                println!("{:<32} {}", definition.slug, definition.title);
            }
        }
        Command::Metric { slug, filter } => {
            let filter = filter.into_filter();
            print_json(&runner.run(&slug, filter.as_ref())?)?;
        }
        Command::Dashboard { filter } => {
            let filter = filter.into_filter();
            print_json(&runner.run_all(filter.as_ref())?)?;
        }
        Command::Kpis => print_json(&runner.kpis()?)?,
        Command::Options { field } => {
            let Some(field) = FilterField::parse(&field) else {
                bail!("unknown filter field '{}'", field);
            };
            print_json(&runner.filter_options(field)?)?;
        }
        Command::Reminders { date } => {
            let today = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            print_json(&reminders::due(&runner, today, settings.provider_reminder_day)?)?;
        }
        Command::Listing(ListingCommand::Add { food_id, fields }) => {
            let listing = db.create_listing(NewListing {
                food_id,
                payload: fields.into(),
            })?;
            print_json(&listing)?;
        }
        Command::Listing(ListingCommand::Update { key, fields }) => {
            let changed = db.update_listing(key.key()?, &fields.into())?;
            print_json(&serde_json::json!({ "updated": changed }))?;
        }
        Command::Listing(ListingCommand::Delete { key }) => {
            let changed = db.delete_listing(key.key()?)?;
            print_json(&serde_json::json!({ "deleted": changed }))?;
        }
        Command::ClaimStatus { claim_id, status } => {
            let Some(parsed) = ClaimStatus::parse(&status) else {
                bail!("unknown claim status '{}'", status);
            };
            db.set_claim_status(claim_id, parsed)?;
            print_json(&db.get_claim(claim_id)?)?;
        }
    }

    Ok(())
}
