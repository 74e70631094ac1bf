//! Harvest CLI
//!
//! Runs one retrieval operation per invocation and writes its records as
//! JSON lines to stdout. Logs go to stderr.
//!
//! ## Usage
//! ```bash
//! harvest --config harvester.toml orgs
//! harvest assets --org-id 5f3a...
//! harvest enrich CVE-2024-0001 CVE-2024-0002
//! harvest domains --mapping domains.csv
//! HARVEST_CONFIG=/etc/pe/harvester.toml harvest --json top-cves
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use harvester::dns::{self, SystemResolver};
use harvester::sink::{emit, JsonLinesSink, RecordSink};
use harvester::sixgill::IntelQuery;
use harvester::{
    DateRange, DnsMonitorClient, DomainMapping, HarvestConfig, ShodanClient, SixgillClient, Source,
    Token, TokenBroker,
};

/// PE Harvester - threat-intel and DNS-monitor retrieval
#[derive(Parser, Debug)]
#[command(name = "harvest", version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "harvester.toml", env = "HARVEST_CONFIG")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a bearer token
    Token {
        /// sixgill or dnsmonitor
        #[arg(long, default_value = "sixgill")]
        source: Source,
    },

    /// List organizations
    Orgs,

    /// Asset listing for one organization
    Assets {
        #[arg(long)]
        org_id: String,
    },

    /// One page of an intel search
    Intel {
        /// Query in the platform's search syntax
        #[arg(long)]
        query: String,

        #[arg(long, default_value = "0")]
        from: u64,

        #[arg(long, default_value = "50")]
        size: u32,

        #[arg(long, default_value = "false")]
        scroll: bool,

        /// Resume from the scroll_id of a previous page
        #[arg(long)]
        scroll_id: Option<String>,
    },

    /// One page of actionable alerts
    Alerts {
        #[arg(long)]
        org_id: String,

        #[arg(long, default_value = "100")]
        fetch_size: u32,

        #[arg(long, default_value = "0")]
        offset: u64,
    },

    /// Read/unread alert totals
    AlertCount {
        #[arg(long)]
        org_id: String,
    },

    /// Text snippet of one alert
    AlertContent {
        #[arg(long)]
        org_id: String,

        #[arg(long)]
        alert_id: String,
    },

    /// Ten highest-rated CVEs
    TopCves,

    /// Bulk CVE enrichment, ten identifiers per upstream call
    Enrich {
        #[arg(required = true)]
        cve_ids: Vec<String>,
    },

    /// Credential-leak lookup
    Leaks {
        /// Filter as key=value (repeatable), e.g. domain=acme.com
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Monitored domains joined to the organization mapping
    Domains {
        /// CSV with domain_name and org columns
        #[arg(long, env = "HARVEST_DOMAIN_MAPPING")]
        mapping: PathBuf,
    },

    /// Domain alerts over a date range
    DomainAlerts {
        /// Domain identifier (repeatable)
        #[arg(long = "domain-id", required = true)]
        domain_ids: Vec<String>,

        /// Start date, YYYY-MM-DD
        #[arg(long)]
        from: NaiveDate,

        /// End date, YYYY-MM-DD
        #[arg(long)]
        to: NaiveDate,
    },

    /// NS, MX and address records for each domain
    Dns {
        #[arg(required = true)]
        domains: Vec<String>,

        /// Render MX/NS as bracketed string lists
        #[arg(long, default_value = "false")]
        flat: bool,
    },

    /// Validate the configured scanning API keys
    ShodanKeys,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", raw))
}

/// Numeric ids go upstream as numbers, anything else as strings
fn domain_id_value(raw: &str) -> Value {
    raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(raw))
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json);

    info!(command = ?args.command, "Starting harvest");

    match args.command {
        // Name resolution needs no credentials
        Command::Dns { domains, flat } => {
            let mut sink = JsonLinesSink::new(io::stdout().lock());
            run_dns(&mut sink, &domains, flat).await
        }
        command => {
            let config = HarvestConfig::load(&args.config)
                .with_context(|| format!("Failed to load {}", args.config.display()))?;
            run(command, config).await
        }
    }
}

async fn run(command: Command, config: HarvestConfig) -> Result<()> {
    let mut sink = JsonLinesSink::new(io::stdout().lock());

    match command {
        Command::Token { source } => {
            let token = fresh_token(&config, source).await?;
            emit(&mut sink, &[json!({"source": source, "access_token": token.as_str()})])?;
        }

        Command::Orgs => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let orgs = sixgill_client(&config)?
                .list_organizations(&token)
                .await
                .context("Failed to list organizations")?;
            let rows: Vec<_> = orgs.into_values().collect();
            emit(&mut sink, &rows)?;
        }

        Command::Assets { org_id } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let assets = sixgill_client(&config)?
                .get_assets(&token, &org_id)
                .await
                .with_context(|| format!("Failed to fetch assets for {}", org_id))?;
            emit(&mut sink, &[assets])?;
        }

        Command::Intel { query, from, size, scroll, scroll_id } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let mut query = IntelQuery::new(query, size).starting_at(from).scroll(scroll);
            if let Some(scroll_id) = scroll_id {
                query = query.resume(scroll_id);
            }
            let page = sixgill_client(&config)?
                .search_intel(&token, &query)
                .await
                .context("Intel search failed")?;
            info!(
                items = page.items.len(),
                total = ?page.total,
                next_from = ?page.next_from(from, size),
                scroll_id = ?page.scroll_id,
                "Intel page fetched"
            );
            emit(&mut sink, &page.items)?;
        }

        Command::Alerts { org_id, fetch_size, offset } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let page = sixgill_client(&config)?
                .list_alerts(&token, &org_id, fetch_size, offset)
                .await
                .with_context(|| format!("Failed to list alerts for {}", org_id))?;
            match page {
                Value::Array(rows) => emit(&mut sink, &rows)?,
                other => emit(&mut sink, &[other])?,
            };
        }

        Command::AlertCount { org_id } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let count = sixgill_client(&config)?
                .count_alerts(&token, &org_id)
                .await
                .with_context(|| format!("Failed to count alerts for {}", org_id))?;
            emit(&mut sink, &[count])?;
        }

        Command::AlertContent { org_id, alert_id } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let content = sixgill_client(&config)?
                .get_alert_content(&token, &org_id, &alert_id)
                .await
                .with_context(|| format!("Failed to fetch content for alert {}", alert_id))?;
            emit(&mut sink, &[json!({"alert_id": alert_id, "content": content})])?;
        }

        Command::TopCves => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let top = sixgill_client(&config)?
                .top_cves(&token)
                .await
                .context("Failed to rank top CVEs")?;
            emit(&mut sink, &top)?;
        }

        Command::Enrich { cve_ids } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let replies = sixgill_client(&config)?
                .enrich_in_batches(&token, &cve_ids)
                .await
                .context("Bulk CVE enrichment failed")?;
            emit(&mut sink, &replies)?;
        }

        Command::Leaks { params } => {
            let token = fresh_token(&config, Source::Sixgill).await?;
            let leaks = sixgill_client(&config)?
                .credential_leaks(&token, &params)
                .await
                .context("Credential-leak lookup failed")?;
            emit(&mut sink, &[leaks])?;
        }

        Command::Domains { mapping } => {
            let mapping = DomainMapping::from_path(&mapping)
                .with_context(|| format!("Failed to load mapping {}", mapping.display()))?;
            let token = fresh_token(&config, Source::DnsMonitor).await?;
            let domains = DnsMonitorClient::new(&config)?
                .list_monitored_domains(&token, &mapping)
                .await
                .context("Failed to list monitored domains")?;
            emit(&mut sink, &domains)?;
        }

        Command::DomainAlerts { domain_ids, from, to } => {
            let range = DateRange::new(from, to)?;
            let ids: Vec<Value> = domain_ids.iter().map(|id| domain_id_value(id)).collect();
            let token = fresh_token(&config, Source::DnsMonitor).await?;
            let alerts = DnsMonitorClient::new(&config)?
                .get_domain_alerts(&token, &ids, range)
                .await
                .context("Failed to fetch domain alerts")?;
            emit(&mut sink, &alerts)?;
        }

        Command::ShodanKeys => {
            let keys = config.shodan_keys()?;
            let valid = ShodanClient::new(&config)?.validate_shodan_keys(&keys).await;
            let rows: Vec<Value> = valid.iter().map(|key| json!({"key": key})).collect();
            emit(&mut sink, &rows)?;
        }

        Command::Dns { domains, flat } => run_dns(&mut sink, &domains, flat).await?,
    }

    Ok(())
}

async fn run_dns(sink: &mut impl RecordSink, domains: &[String], flat: bool) -> Result<()> {
    let resolver = SystemResolver::new().context("Failed to initialize DNS resolver")?;

    for domain in domains {
        let records = dns::resolve(&resolver, domain).await;
        let row = if flat {
            serde_json::to_value(records.to_flat())?
        } else {
            serde_json::to_value(&records)?
        };
        emit(sink, &[json!({"domain": domain, "records": row})])?;
    }

    Ok(())
}

/// Every command gets its own token; nothing is cached between runs
async fn fresh_token(config: &HarvestConfig, source: Source) -> Result<Token> {
    TokenBroker::new(config.clone())?
        .get_token(source)
        .await
        .with_context(|| format!("Failed to obtain {} token", source))
}

fn sixgill_client(config: &HarvestConfig) -> Result<SixgillClient> {
    Ok(SixgillClient::new(config)?)
}
