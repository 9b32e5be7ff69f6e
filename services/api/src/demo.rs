use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use presentation_engine::config::AppConfig;
use presentation_engine::error::AppError;
use presentation_engine::export::{
    AccountId, ComparableRecord, ComparableSalesProvider, CsvComparablesProvider, DeliveryError,
    Destination, ExportError, ExportOutcome, ExportRequest, NarrativeBlock, OutputFormat,
    PostalAddress, PresentationInput, PropertyRecord, QuotaError, Tier, PAGE_BREAK,
};

use crate::infra::{build_export_service, DemoExportService};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum FormatArg {
    Document,
    Deck,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Document => OutputFormat::Document,
            FormatArg::Deck => OutputFormat::Deck,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum ChannelArg {
    Download,
    Email,
    PhysicalMail,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Account to export as (seeded accounts: demo-basic, demo-pro, demo-premium)
    #[arg(long, default_value = "demo-pro")]
    pub(crate) account: String,
    /// Output representation to render
    #[arg(long, value_enum, default_value_t = FormatArg::Document)]
    pub(crate) format: FormatArg,
    /// Delivery channel for the rendered artifact
    #[arg(long, value_enum, default_value_t = ChannelArg::Download)]
    pub(crate) channel: ChannelArg,
    /// Recipient address, required for the email channel
    #[arg(long)]
    pub(crate) email_to: Option<String>,
    /// Optional comparable-sales CSV export to include
    #[arg(long)]
    pub(crate) comps_csv: Option<PathBuf>,
    /// Write a downloaded artifact to this path instead of summarizing it
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Override the presentation date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) generated_on: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional comparable-sales CSV export to hydrate the walkthrough
    #[arg(long)]
    pub(crate) comps_csv: Option<PathBuf>,
    /// Override the presentation date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) generated_on: Option<NaiveDate>,
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let ExportArgs {
        account,
        format,
        channel,
        email_to,
        comps_csv,
        output,
        generated_on,
    } = args;

    let config = AppConfig::load()?;
    let service = build_export_service(&config.export);
    let account_id = AccountId(account);
    let generated_on = generated_on.unwrap_or_else(|| Local::now().date_naive());

    let property = sample_property();
    let comparables = load_comparables(comps_csv, &property)?;
    let subscription = service.subscription(&account_id)?;
    let comparables = cap_comparables(comparables, subscription.tier);

    let destination = match channel {
        ChannelArg::Download => Destination::Download,
        ChannelArg::Email => {
            let to = email_to.ok_or_else(|| {
                ExportError::Delivery(DeliveryError::InvalidDestination(
                    "--email-to is required for the email channel".to_string(),
                ))
            })?;
            Destination::Email { to }
        }
        ChannelArg::PhysicalMail => Destination::PhysicalMail {
            address: owner_address(&property),
        },
    };

    let outcome = service.export(ExportRequest {
        account_id: account_id.clone(),
        input: PresentationInput {
            property,
            comparables,
            narrative: None,
            notes: None,
            generated_on,
        },
        format: format.into(),
        destination,
    })?;

    print_outcome(&outcome);

    if let Some(path) = output {
        std::fs::write(&path, &outcome.artifact.bytes)?;
        println!("Artifact written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        comps_csv,
        generated_on,
    } = args;

    let config = AppConfig::load()?;
    let service = build_export_service(&config.export);
    let generated_on = generated_on.unwrap_or_else(|| Local::now().date_naive());

    let property = sample_property();
    let comparables = load_comparables(comps_csv, &property)?;

    println!("Presentation export demo");
    println!(
        "Subject property: {}, {}",
        property.address,
        property.locality_line()
    );
    if comparables.is_empty() {
        println!("Comparable sales: none available");
    } else {
        println!("Comparable sales: {} records", comparables.len());
    }

    let input = |comps: Vec<ComparableRecord>, narrative: Option<NarrativeBlock>| {
        PresentationInput {
            property: sample_property(),
            comparables: comps,
            narrative,
            notes: None,
            generated_on,
        }
    };

    println!("\n1. Paginated document for the professional tier");
    demo_export(
        &service,
        ExportRequest {
            account_id: AccountId("demo-pro".to_string()),
            input: input(
                cap_comparables(comparables.clone(), Tier::Professional),
                Some(sample_narrative()),
            ),
            format: OutputFormat::Document,
            destination: Destination::Download,
        },
    );

    println!("\n2. Slide deck for the professional tier");
    demo_export(
        &service,
        ExportRequest {
            account_id: AccountId("demo-pro".to_string()),
            input: input(
                cap_comparables(comparables.clone(), Tier::Professional),
                Some(sample_narrative()),
            ),
            format: OutputFormat::Deck,
            destination: Destination::Download,
        },
    );

    println!("\n3. Slide deck on the basic tier (expected to be rejected)");
    demo_export(
        &service,
        ExportRequest {
            account_id: AccountId("demo-basic".to_string()),
            input: input(cap_comparables(comparables.clone(), Tier::Basic), None),
            format: OutputFormat::Deck,
            destination: Destination::Download,
        },
    );

    println!("\n4. Basic tier document, then a second attempt over the limit");
    for _ in 0..2 {
        demo_export(
            &service,
            ExportRequest {
                account_id: AccountId("demo-basic".to_string()),
                input: input(cap_comparables(comparables.clone(), Tier::Basic), None),
                format: OutputFormat::Document,
                destination: Destination::Download,
            },
        );
    }

    Ok(())
}

fn demo_export(service: &Arc<DemoExportService>, request: ExportRequest) {
    match service.export(request) {
        Ok(outcome) => print_outcome(&outcome),
        Err(ExportError::Quota(QuotaError::Exceeded { used, limit })) => {
            println!(
                "  Rejected (quota_exceeded): {used} of {limit} exports used this month"
            );
        }
        Err(error) => {
            println!("  Rejected ({}): {}", error.reason(), error);
        }
    }
}

fn print_outcome(outcome: &ExportOutcome) {
    let text = String::from_utf8_lossy(&outcome.artifact.bytes);
    let pages = text.matches(PAGE_BREAK).count() + 1;
    let slides = text.matches("[Slide ").count();

    println!(
        "  Delivered via {} ({} attempt{})",
        outcome.receipt.channel,
        outcome.receipt.attempts,
        if outcome.receipt.attempts == 1 { "" } else { "s" }
    );
    if let Some(reference) = &outcome.receipt.reference {
        println!("  Provider reference: {reference}");
    }
    if slides > 0 {
        println!(
            "  Artifact: {} ({} bytes, {} slides)",
            outcome.artifact.filename,
            outcome.artifact.len(),
            slides
        );
    } else {
        println!(
            "  Artifact: {} ({} bytes, {} pages)",
            outcome.artifact.filename,
            outcome.artifact.len(),
            pages
        );
    }
    println!("  Usage: {}", outcome.usage.summary_line());
}

fn load_comparables(
    comps_csv: Option<PathBuf>,
    property: &PropertyRecord,
) -> Result<Vec<ComparableRecord>, AppError> {
    match comps_csv {
        Some(path) => {
            let provider = CsvComparablesProvider::new(path);
            Ok(provider.fetch_comparables(property)?)
        }
        None => Ok(sample_comparables()),
    }
}

fn cap_comparables(mut comparables: Vec<ComparableRecord>, tier: Tier) -> Vec<ComparableRecord> {
    if let Some(limit) = tier.comparable_limit() {
        comparables.truncate(limit);
    }
    comparables
}

fn owner_address(property: &PropertyRecord) -> PostalAddress {
    PostalAddress {
        name: "Property Owner".to_string(),
        line1: property.address.clone(),
        line2: None,
        city: property.city.clone(),
        state: property.state.clone(),
        zip: property.zip.clone(),
    }
}

fn sample_property() -> PropertyRecord {
    PropertyRecord {
        address: "123 Main St".to_string(),
        city: "Des Moines".to_string(),
        state: "IA".to_string(),
        zip: "50309".to_string(),
        property_type: "Single Family".to_string(),
        bedrooms: 3,
        bathrooms: 2.0,
        square_footage: 1_450,
        lot_size: 6_200,
        year_built: 1987,
        estimated_value: 300_000,
        loan_amount: Some(210_000),
        equity: Some(90_000),
        monthly_payment: Some(1_625),
    }
}

fn sample_comparables() -> Vec<ComparableRecord> {
    vec![
        ComparableRecord {
            address: "410 Oak Ave".to_string(),
            price: 285_000,
            bedrooms: 3,
            bathrooms: 2.0,
            square_footage: 1_400,
            sold_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap_or_default(),
            distance_miles: 0.4,
            price_per_sqft: 155.0,
        },
        ComparableRecord {
            address: "77 Birch Ln".to_string(),
            price: 310_000,
            bedrooms: 4,
            bathrooms: 2.5,
            square_footage: 1_600,
            sold_date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap_or_default(),
            distance_miles: 0.8,
            price_per_sqft: 162.5,
        },
        ComparableRecord {
            address: "1208 Walnut Dr".to_string(),
            price: 295_000,
            bedrooms: 3,
            bathrooms: 2.0,
            square_footage: 1_500,
            sold_date: NaiveDate::from_ymd_opt(2026, 6, 18).unwrap_or_default(),
            distance_miles: 1.1,
            price_per_sqft: 196.7,
        },
    ]
}

fn sample_narrative() -> NarrativeBlock {
    NarrativeBlock {
        marketing_summary: Some(
            "Well-kept single family home close to downtown with strong comparable support."
                .to_string(),
        ),
        key_features: vec![
            "Updated kitchen".to_string(),
            "Fenced corner lot".to_string(),
            "New roof in 2024".to_string(),
        ],
        target_audience: Some("Owner-occupants and buy-and-hold investors".to_string()),
        call_to_action: Some("Schedule a walkthrough this week".to_string()),
    }
}
