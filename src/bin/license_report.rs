//! license_report: compliance report over a snapshot file or the database.
//!
//! Config resolution follows `AppConfig::from_env` unless `--config` is
//! given. Without `--snapshot` the PostgreSQL stores are used (feature
//! `database`).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use compliance_core::ComplianceService;
use compliance_types::{EntitlementFilter, InventoryFilter, Metric};
use license_compliance::config::AppConfig;
use license_compliance::snapshot::Snapshot;
use license_compliance::{build_service, telemetry};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "license_report")]
#[command(about = "License entitlement compliance report")]
struct Args {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "LICENSE_COMPLIANCE_CONFIG")]
    config: Option<PathBuf>,

    /// Snapshot with parts, inventory and entitlements (YAML or JSON)
    #[arg(long, short = 's')]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocation results as JSON, for one part or every part in use
    Report {
        /// Part id or alias
        #[arg(long, short = 'p')]
        part: Option<String>,
        #[arg(long, short = 'l')]
        location: Option<String>,
        #[arg(long, short = 'e')]
        environment: Option<String>,
        #[arg(long)]
        include_archived: bool,
    },
    /// Check every entitlement; exits non-zero if any is invalid
    Validate,
    /// Entitlements with their allocation share
    Search {
        #[arg(long)]
        agreement: Option<String>,
        #[arg(long, short = 'p')]
        part: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        csi: Option<String>,
        #[arg(long)]
        metric: Option<Metric>,
        #[arg(long)]
        unlimited: Option<bool>,
        #[arg(long)]
        catch_all: Option<bool>,
        #[arg(long)]
        available_gte: Option<Decimal>,
        #[arg(long)]
        available_lte: Option<Decimal>,
    },
}

#[derive(Serialize)]
struct ValidationIssue {
    entitlement_id: String,
    agreement_id: String,
    error: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_service(args: &Args, config: &mut AppConfig) -> Result<ComplianceService> {
    match &args.snapshot {
        Some(path) => {
            let snapshot = Snapshot::load(path)?;
            if !snapshot.parts.is_empty() {
                config.catalog.parts = snapshot.parts.clone();
            }
            let (inventory, registry) = snapshot.into_stores();
            build_service(config, inventory, registry)
        }
        #[cfg(feature = "database")]
        None => license_compliance::postgres_service(config).await,
        #[cfg(not(feature = "database"))]
        None => anyhow::bail!("--snapshot is required when built without the `database` feature"),
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file_with_env(path)?,
        None => AppConfig::from_env()?,
    };
    telemetry::init(&config.log_filter)?;
    let service = open_service(&args, &mut config).await?;

    match args.command {
        Command::Report {
            part,
            location,
            environment,
            include_archived,
        } => {
            let filter = InventoryFilter {
                location,
                environment,
                include_archived,
            };
            match part {
                Some(part) => print_json(&service.allocate(&part, &filter).await?)?,
                None => {
                    let report = service.compliance_report(&filter).await?;
                    print_json(&report)?;
                    if report.non_compliant().next().is_some() {
                        return Ok(ExitCode::from(2));
                    }
                }
            }
        }
        Command::Validate => {
            let all = service
                .search_entitlements(&EntitlementFilter::default())
                .await?;
            let issues: Vec<ValidationIssue> = all
                .iter()
                .filter_map(|view| {
                    service
                        .validate_entitlement(&view.entitlement)
                        .err()
                        .map(|e| ValidationIssue {
                            entitlement_id: view.entitlement.id.to_string(),
                            agreement_id: view.entitlement.agreement_id.clone(),
                            error: e.to_string(),
                        })
                })
                .collect();
            print_json(&issues)?;
            if !issues.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Search {
            agreement,
            part,
            description,
            csi,
            metric,
            unlimited,
            catch_all,
            available_gte,
            available_lte,
        } => {
            let filter = EntitlementFilter {
                agreement_id: agreement.unwrap_or_default(),
                part_id: part.unwrap_or_default(),
                item_description: description.unwrap_or_default(),
                csi: csi.unwrap_or_default(),
                metric,
                unlimited,
                catch_all,
                available_count_gte: available_gte,
                available_count_lte: available_lte,
                ..Default::default()
            };
            print_json(&service.search_entitlements(&filter).await?)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
