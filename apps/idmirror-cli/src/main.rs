//! idmirror - resolve a user's group memberships from LDAP
//!
//! Looks the user up in the configured directory, walks its group
//! memberships and prints what ended up in the cache.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use idmirror_cache::{InMemoryCache, MemberType, UserRecord};
use idmirror_connector::{InitgroupsOptions, SchemaVariant, SearchBase};
use idmirror_connector_ldap::{Initgroups, LdapConfig, LdapDirectory};

/// idmirror - LDAP initgroups
#[derive(Parser)]
#[command(name = "idmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file with `ldap` and `initgroups` sections
    #[arg(short, long, env = "IDMIRROR_CONFIG")]
    config: PathBuf,

    /// Override the schema variant (rfc2307, rfc2307bis, ipa, ad)
    #[arg(long)]
    schema: Option<SchemaVariant>,

    /// Override the user search bases (`dn?scope?filter[?...]`)
    #[arg(long)]
    user_base: Option<String>,

    /// Override the group search bases (`dn?scope?filter[?...]`)
    #[arg(long)]
    group_base: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// User to resolve
    user: String,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    ldap: LdapConfig,
    initgroups: InitgroupsOptions,
}

#[derive(Debug, Serialize)]
struct Report {
    user: UserRecord,
    direct_groups: Vec<String>,
    groups: Vec<String>,
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    let text = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read {}", cli.config.display()))?;
    let mut config: FileConfig = serde_json::from_str(&text)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

    if let Some(schema) = cli.schema {
        config.initgroups.schema = schema;
    }
    if let Some(bases) = &cli.user_base {
        config.initgroups.user_search_bases = SearchBase::parse_list(bases)?;
    }
    if let Some(bases) = &cli.group_base {
        config.initgroups.group_search_bases = SearchBase::parse_list(bases)?;
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    tracing::info!(
        host = %config.ldap.host,
        schema = %config.initgroups.schema,
        "starting initgroups"
    );

    let directory = Arc::new(LdapDirectory::new(config.ldap)?);
    let cache = Arc::new(InMemoryCache::new());
    let engine = Initgroups::new(directory.clone(), cache.clone(), config.initgroups)?;

    let outcome = engine.initgroups(&cli.user).await;
    directory.dispose().await?;
    if let Err(e) = outcome {
        tracing::error!(code = e.error_code(), class = ?e.class(), "initgroups failed");
        return Err(e.into());
    }

    // the directory may return a differently cased canonical name
    let user = match cache.user(&cli.user)? {
        Some(user) => user,
        None => cache
            .users()?
            .into_iter()
            .find(|u| u.name.eq_ignore_ascii_case(&cli.user))
            .context("resolved user missing from cache")?,
    };

    let report = Report {
        direct_groups: cache.direct_parents(&user.name, MemberType::User)?,
        groups: cache.initgroups(&user.name)?,
        user,
    };
    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,idmirror=debug")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
