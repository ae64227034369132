//! walletmux - issue and manage wallet passes from the command line.
//!
//! Providers and storage come from `--config <file.json>` or, without it,
//! from `WALLETMUX_*` environment variables. Every failure is printed as
//! `<ErrorKind>: <message>` and the process exits non-zero.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walletmux::archive::verify_archive;
use walletmux::{
    presets, Artifact, ImageRole, PassData, PassKind, PassManager, ProviderResults, Result,
    Template, WalletConfig, WalletError,
};

/// walletmux command-line interface
#[derive(Parser)]
#[command(name = "walletmux")]
#[command(about = "Issue one pass design to Apple, Google and Samsung wallets", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, env = "WALLETMUX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Pass selection shared by the lifecycle commands.
#[derive(clap::Args)]
struct Target {
    /// Template file (JSON)
    #[arg(short, long)]
    template: PathBuf,

    /// Providers to target (default: every configured provider)
    #[arg(short, long = "provider")]
    providers: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a preset template to a file
    CreateTemplate {
        /// Display name
        #[arg(long)]
        name: String,
        /// Organization id
        #[arg(long)]
        organization: String,
        /// Pass kind (event_ticket, coupon, loyalty, boarding_pass, membership, generic, store_card)
        #[arg(long, default_value = "generic")]
        kind: String,
        /// Logo image (PNG); a `@2x` sibling is picked up automatically
        #[arg(long)]
        logo: Option<PathBuf>,
        /// Icon image (PNG)
        #[arg(long)]
        icon: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Issue a pass on the selected providers
    CreatePass {
        #[command(flatten)]
        target: Target,
        /// Customer id
        #[arg(long)]
        customer: String,
        /// Serial number (default: generated)
        #[arg(long)]
        serial: Option<String>,
        /// Barcode message
        #[arg(long)]
        barcode: Option<String>,
        /// Field value, `key=value`; repeatable
        #[arg(short, long = "field")]
        fields: Vec<String>,
        /// Directory to write archive artifacts to
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Apply new field values to an issued pass
    UpdatePass {
        #[command(flatten)]
        target: Target,
        /// Serial number
        #[arg(long)]
        serial: String,
        /// Field value, `key=value`; repeatable
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Void an issued pass
    VoidPass {
        #[command(flatten)]
        target: Target,
        /// Serial number
        #[arg(long)]
        serial: String,
    },

    /// Notify holders' devices that a pass changed
    SendNotification {
        #[command(flatten)]
        target: Target,
        /// Serial number
        #[arg(long)]
        serial: String,
    },

    /// Check the manifest and signature of a `.pkpass` file
    VerifyArchive {
        /// Archive file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one command. `Ok(false)` means at least one provider failed.
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::CreateTemplate {
            name,
            organization,
            kind,
            logo,
            icon,
            output,
        } => {
            let mut template = presets::for_kind(kind.parse::<PassKind>()?, &name, &organization)?;
            if let Some(path) = logo {
                template.images.set(ImageRole::Logo, walletmux::Image::from_file(path).await?);
            }
            if let Some(path) = icon {
                template.images.set(ImageRole::Icon, walletmux::Image::from_file(path).await?);
            }
            let json = template.to_json_pretty()?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    println!("template {} written to {}", template.id, path.display());
                }
                None => println!("{}", json),
            }
            Ok(true)
        }

        Commands::CreatePass {
            target,
            customer,
            serial,
            barcode,
            fields,
            output_dir,
        } => {
            let (manager, template) = load(cli.config.as_deref(), &target).await?;
            let mut data = PassData::new(&template.id, customer);
            if let Some(serial) = serial {
                data = data.with_serial_number(serial);
            }
            if let Some(message) = barcode {
                data = data.with_barcode(message, None);
            }
            apply_fields(&template, &mut data, &fields)?;

            let providers = selection(&target.providers);
            let created = manager.create(&data, &template, providers.as_deref()).await;
            let mut ok = report(&created, |r| format!("issued {} (revision {})", r.pass_id, r.revision));

            if let Some(dir) = output_dir {
                let issued: Vec<&str> = created
                    .iter()
                    .filter(|(_, r)| r.is_ok())
                    .map(|(name, _)| name.as_str())
                    .collect();
                if !issued.is_empty() {
                    let artifacts = manager
                        .generate_artifacts(&data.serial_number, &template, Some(issued.as_slice()))
                        .await;
                    ok &= write_artifacts(&dir, &data.serial_number, &artifacts).await?;
                }
            }
            Ok(ok)
        }

        Commands::UpdatePass {
            target,
            serial,
            fields,
        } => {
            let (manager, template) = load(cli.config.as_deref(), &target).await?;
            let providers = selection(&target.providers);

            // Start from the last data any targeted provider has stored.
            let mut data = None;
            let names: Vec<String> = match &providers {
                Some(names) => names.iter().map(|n| n.to_string()).collect(),
                None => manager.provider_names().iter().map(|n| n.to_string()).collect(),
            };
            for name in &names {
                if let Ok(record) = manager.record(name, &serial).await {
                    data = Some(record.data);
                    break;
                }
            }
            let mut data = data.ok_or_else(|| {
                WalletError::NotFound(format!("no provider has a record for pass {}", serial))
            })?;
            apply_fields(&template, &mut data, &fields)?;

            let updated = manager
                .update(&serial, &data, &template, providers.as_deref())
                .await;
            Ok(report(&updated, |r| format!("updated {} (revision {})", r.pass_id, r.revision)))
        }

        Commands::VoidPass { target, serial } => {
            let (manager, template) = load(cli.config.as_deref(), &target).await?;
            let providers = selection(&target.providers);
            let voided = manager.void(&serial, &template, providers.as_deref()).await;
            Ok(report(&voided, |r| format!("voided {}", r.pass_id)))
        }

        Commands::SendNotification { target, serial } => {
            let (manager, template) = load(cli.config.as_deref(), &target).await?;
            let providers = selection(&target.providers);
            let sent = manager
                .send_update_notification(&serial, &template, providers.as_deref())
                .await;
            Ok(report(&sent, |delivered| {
                if *delivered {
                    "notification sent".to_string()
                } else {
                    "no notification channel configured".to_string()
                }
            }))
        }

        Commands::VerifyArchive { path } => {
            let bytes = tokio::fs::read(&path).await?;
            let summary = verify_archive(&bytes)?;
            println!("{}: valid", path.display());
            println!("  signer: {}", summary.subject);
            println!("  issuer: {}", summary.issuer);
            if let Some(time) = summary.signing_time {
                println!("  signed: {}", time.to_rfc3339());
            }
            Ok(true)
        }
    }
}

async fn load(config: Option<&Path>, target: &Target) -> Result<(PassManager, Template)> {
    let config = match config {
        Some(path) => WalletConfig::from_json_file(path).await?,
        None => WalletConfig::from_env()?,
    };
    let template = Template::load(&target.template).await?;
    Ok((PassManager::from_config(&config), template))
}

fn selection(providers: &[String]) -> Option<Vec<&str>> {
    if providers.is_empty() {
        None
    } else {
        Some(providers.iter().map(String::as_str).collect())
    }
}

/// Parses `key=value` pairs, typing each value by its field's hints.
fn apply_fields(template: &Template, data: &mut PassData, fields: &[String]) -> Result<()> {
    for pair in fields {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            WalletError::Validation(format!("field '{}' is not in key=value form", pair))
        })?;
        let field = template.field(key).ok_or_else(|| {
            WalletError::Validation(format!("template '{}' has no field '{}'", template.id, key))
        })?;
        data.field_values.insert(key.to_string(), field.parse_value(raw)?);
    }
    Ok(())
}

/// Prints one line per provider; returns whether every provider succeeded.
fn report<T>(results: &ProviderResults<T>, describe: impl Fn(&T) -> String) -> bool {
    let mut ok = true;
    for (provider, result) in results {
        match result {
            Ok(value) => println!("{}: {}", provider, describe(value)),
            Err(e) => {
                eprintln!("{}: {}", e.kind(), e);
                ok = false;
            }
        }
    }
    ok
}

async fn write_artifacts(dir: &Path, serial: &str, artifacts: &ProviderResults<Artifact>) -> Result<bool> {
    tokio::fs::create_dir_all(dir).await?;
    let mut ok = true;
    for (provider, artifact) in artifacts {
        match artifact {
            Ok(Artifact::Archive(bytes)) => {
                let path = dir.join(format!("{}-{}.pkpass", provider, serial));
                tokio::fs::write(&path, bytes).await?;
                println!("{}: archive written to {}", provider, path.display());
            }
            Ok(Artifact::Reference(url)) => println!("{}: {}", provider, url),
            Err(e) => {
                eprintln!("{}: {}", e.kind(), e);
                ok = false;
            }
        }
    }
    Ok(ok)
}
