use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gridpack::catalog::{load_catalog, Catalog};
use gridpack::linker::{desired_links, PluginLinker, StoreListing};
use gridpack::profiles::{Profile, ProfileStore};
use gridpack::resolver;
use gridpack::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gridpack")]
#[command(
    author,
    version = "0.2.1",
    about = "A package manager for SimCity 4 plugins on Linux"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Channel directory override for this invocation
    #[arg(long)]
    channel_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current profile and catalog summary
    Status,

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },

    /// Resolve package statuses under the current profile
    Resolve {
        /// Only show enabled packages
        #[arg(long)]
        enabled: bool,
    },

    /// Show the resolved plugin file set
    Files,

    /// Link resolved files into the plugins directory
    Link {
        /// Compute the link set without touching the filesystem
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List profiles
    List,
    /// Create a profile, optionally from an existing one
    Create {
        name: String,
        /// Name of a profile to use as template
        #[arg(long)]
        from: Option<String>,
    },
    /// Remove a profile
    Remove { name: String },
    /// Switch the current profile
    Switch { name: String },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "gridpack=info",
        1 => "gridpack=debug",
        2 => "gridpack=trace",
        _ => "trace",
    };

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let settings = Settings::load().await?;
    settings.paths.ensure_dirs()?;

    let channel_dir = cli
        .channel_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| settings.paths.channel_dir());
    let store = ProfileStore::new(settings.paths.profiles_dir());

    match cli.command {
        Commands::Status => {
            let catalog = load_catalog(&channel_dir)?;
            cmd_status(&settings, &store, &catalog).await
        }
        Commands::Profile { action } => cmd_profile(settings, &store, action).await,
        Commands::Resolve { enabled } => {
            let catalog = load_catalog(&channel_dir)?;
            cmd_resolve(&settings, &store, &catalog, enabled).await
        }
        Commands::Files => {
            let catalog = load_catalog(&channel_dir)?;
            cmd_files(&settings, &store, &catalog).await
        }
        Commands::Link { dry_run } => {
            let catalog = load_catalog(&channel_dir)?;
            cmd_link(&settings, &store, &catalog, dry_run).await
        }
    }
}

/// Load the profile the settings mark as current
async fn current_profile(settings: &Settings, store: &ProfileStore) -> Result<Profile> {
    let Some(id) = settings.current_profile else {
        bail!("No current profile; create one with 'gridpack profile create <name>'");
    };
    store.load(id).await
}

async fn cmd_status(settings: &Settings, store: &ProfileStore, catalog: &Catalog) -> Result<()> {
    println!("Catalog: {} packages", catalog.len());

    match settings.current_profile {
        Some(id) => match store.load(id).await {
            Ok(profile) => {
                let explicit = profile.packages.values().filter(|c| c.enabled).count();
                println!("Profile: {} ({} packages enabled)", profile.name, explicit);
            }
            Err(e) => println!("Profile: <unreadable> ({e:#})"),
        },
        None => println!("Profile: <none>"),
    }

    println!("Plugins dir: {}", settings.plugins_dir().display());
    Ok(())
}

async fn cmd_profile(
    mut settings: Settings,
    store: &ProfileStore,
    action: ProfileCommands,
) -> Result<()> {
    match action {
        ProfileCommands::List => {
            for profile in store.list().await? {
                let marker = if settings.current_profile == Some(profile.id) {
                    "*"
                } else {
                    " "
                };
                println!("{} {} ({})", marker, profile.name, profile.id);
            }
        }
        ProfileCommands::Create { name, from } => {
            let template = match from {
                Some(from) => Some(
                    store
                        .find_by_name(&from)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("Profile '{}' not found", from))?,
                ),
                None => None,
            };
            let profile = store.create(&name, template.as_ref()).await?;

            // The first profile becomes current automatically.
            if settings.current_profile.is_none() {
                settings.current_profile = Some(profile.id);
                settings.save().await?;
            }
            println!("Created profile '{}' ({})", profile.name, profile.id);
        }
        ProfileCommands::Remove { name } => {
            let profile = store
                .find_by_name(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Profile '{}' not found", name))?;
            store.remove(profile.id).await?;
            if settings.current_profile == Some(profile.id) {
                settings.current_profile = None;
                settings.save().await?;
            }
            println!("Removed profile '{}'", name);
        }
        ProfileCommands::Switch { name } => {
            let profile = store
                .find_by_name(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Profile '{}' not found", name))?;
            settings.current_profile = Some(profile.id);
            settings.save().await?;
            println!("Switched to profile '{}'", name);
        }
    }
    Ok(())
}

async fn cmd_resolve(
    settings: &Settings,
    store: &ProfileStore,
    catalog: &Catalog,
    enabled_only: bool,
) -> Result<()> {
    let profile = current_profile(settings, store).await?;
    let options = resolver::effective_profile_options(catalog, &profile);
    let features = resolver::effective_features(settings, &profile);
    let statuses = resolver::resolve(catalog, &profile, &options, &features, settings);

    for (id, status) in &statuses {
        if enabled_only && !status.enabled {
            continue;
        }
        let state = match (status.enabled, status.installed) {
            (true, true) => "enabled",
            (true, false) => "enabled (not installed)",
            (false, _) => "disabled",
        };
        println!("{} [{}] {}", id, status.variant_id, state);

        for via in &status.required_by {
            println!("    required by {}", via);
        }
        for (variant, issues) in &status.issues {
            for issue in issues {
                println!("    ! [{}] {}", variant, issue);
            }
        }
    }
    Ok(())
}

async fn cmd_files(settings: &Settings, store: &ProfileStore, catalog: &Catalog) -> Result<()> {
    let profile = current_profile(settings, store).await?;
    let options = resolver::effective_profile_options(catalog, &profile);
    let features = resolver::effective_features(settings, &profile);
    let statuses = resolver::resolve(catalog, &profile, &options, &features, settings);

    let listing = StoreListing::new(settings.paths.clone());
    let included = resolver::resolve_included_files(
        catalog, &profile, &statuses, &options, &features, settings, &listing,
    );

    for file in &included.files {
        println!("{:>4} {} <- {}", file.priority, file.path, file.package);
    }
    for diagnostic in &included.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    Ok(())
}

async fn cmd_link(
    settings: &Settings,
    store: &ProfileStore,
    catalog: &Catalog,
    dry_run: bool,
) -> Result<()> {
    let profile = current_profile(settings, store).await?;
    let options = resolver::effective_profile_options(catalog, &profile);
    let features = resolver::effective_features(settings, &profile);
    let statuses = resolver::resolve(catalog, &profile, &options, &features, settings);

    let listing = StoreListing::new(settings.paths.clone());
    let included = resolver::resolve_included_files(
        catalog, &profile, &statuses, &options, &features, settings, &listing,
    );
    for diagnostic in &included.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }

    let links = desired_links(&included.files, &settings.paths);
    if dry_run {
        for (link, target) in &links {
            println!("{} -> {}", link.display(), target.display());
        }
        return Ok(());
    }

    let linker = PluginLinker::new(settings.plugins_dir(), settings.paths.store_dir());
    let stats = linker.apply(&links).await?;
    println!(
        "{} created, {} removed, {} kept",
        stats.created, stats.removed, stats.kept
    );
    for error in &stats.errors {
        eprintln!("error: {}", error);
    }
    Ok(())
}
