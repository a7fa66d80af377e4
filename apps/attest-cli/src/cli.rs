use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use attest_app::{AppConfig, AttestApp, AttestationForm, MappingDraft};
use attest_model::{AttestationId, DashboardFilter, DateRange};
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::render;

const CONFIG_ENV: &str = "ATTEST_CONFIG";
const LOG_JSON_ENV: &str = "ATTEST_LOG_JSON";
const CONFIG_FILE_NAME: &str = "attest.toml";

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "attest",
    version,
    about = "Select changed protocols, map what to show, and record supervisor attestations."
)]
pub struct Args {
    /// Config file. Defaults to $ATTEST_CONFIG, ./attest.toml, then the user config directory.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines (also enabled by ATTEST_LOG_JSON=1).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Choose which protocols are under review.
    Protocols {
        #[command(subcommand)]
        command: ProtocolsCommand,
    },
    /// Choose the rows and columns shown for each protocol.
    Mapping {
        #[command(subcommand)]
        command: MappingCommand,
    },
    /// Review the active protocols and submit an attestation.
    Attest {
        #[command(subcommand)]
        command: AttestCommand,
    },
    /// Browse, export and prune the attestation log.
    Dashboard {
        #[command(subcommand)]
        command: DashboardCommand,
    },
    /// Manage the list of valid sites.
    Sites {
        #[command(subcommand)]
        command: SitesCommand,
    },
}

#[derive(Subcommand)]
enum ProtocolsCommand {
    /// List every sheet in the workbook.
    Available,
    /// Show the active selection.
    Show,
    /// Replace the active selection.
    Set {
        names: Vec<String>,
        /// Also delete mappings of protocols that are no longer selected.
        #[arg(long)]
        clear_orphans: bool,
    },
    /// Print a review link for each active protocol.
    Links {
        /// Overrides `attest_base_url` from the config.
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Delete mappings of protocols that are no longer selected.
    ClearOrphans,
}

#[derive(Subcommand)]
enum MappingCommand {
    /// Show a protocol sheet with its saved (or default) selection.
    Show {
        protocol: String,
        #[arg(long)]
        header_row: Option<usize>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Replace the saved mapping of one protocol.
    Save {
        protocol: String,
        #[arg(long, default_value_t = 0)]
        header_row: usize,
        /// Row offsets below the header row, comma separated.
        #[arg(long, value_delimiter = ',')]
        rows: Vec<usize>,
        /// Column labels, comma separated.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Display rename as `COLUMN=NEW` (repeatable).
        #[arg(long = "rename", value_parser = parse_rename)]
        renames: Vec<(String, String)>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Freeze mapping edits.
    Lock,
    /// Allow mapping edits again.
    Unlock {
        #[arg(long)]
        password: String,
    },
    /// Show whether mapping edits are frozen.
    Status,
}

#[derive(Subcommand)]
enum AttestCommand {
    /// Show the selected rows and columns of every active protocol.
    Review {
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Record an attestation and send the summary.
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        site: String,
        /// Protocol marked complete (repeatable).
        #[arg(long = "complete")]
        completed: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum DashboardCommand {
    /// List attestations, newest first.
    List {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Export the filtered log. `.csv` writes CSV, anything else XLSX.
    Export {
        #[arg(long, value_name = "PATH")]
        out: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Delete attestations by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<AttestationId>,
    },
}

#[derive(Subcommand)]
enum SitesCommand {
    List,
    /// Replace the site list. With no sites, the configured defaults apply again.
    Set { sites: Vec<String> },
}

#[derive(ClapArgs, Debug, Default)]
struct FilterArgs {
    /// Keep only these sites (repeatable).
    #[arg(long = "site")]
    sites: Vec<String>,
    /// Keep only these supervisors (repeatable).
    #[arg(long = "name")]
    names: Vec<String>,
    /// First day to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
    /// Case-insensitive substring of a reviewed protocol.
    #[arg(long)]
    protocol: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<DashboardFilter> {
        let date_range = match (self.from, self.to) {
            (None, None) => None,
            (from, to) => {
                let start = from.unwrap_or(NaiveDate::MIN);
                let end = to.unwrap_or(NaiveDate::MAX);
                if start > end {
                    bail!("--from {start} is after --to {end}");
                }
                Some(DateRange::new(start, end))
            }
        };
        Ok(DashboardFilter {
            sites: self.sites.iter().cloned().collect(),
            names: self.names.iter().cloned().collect(),
            date_range,
            protocol_contains: self.protocol.clone(),
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_rename(s: &str) -> Result<(String, String), String> {
    let (column, rename) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=NEW, got `{s}`"))?;
    if column.is_empty() {
        return Err(format!("missing column name in `{s}`"));
    }
    Ok((column.to_string(), rename.to_string()))
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    init_logging(args.log_json || env_bool(LOG_JSON_ENV));

    let config = load_config(args.config.as_deref())?;
    let app = AttestApp::from_config(&config).context("failed to start")?;
    let mut out = std::io::stdout().lock();

    match args.command {
        Command::Protocols { command } => protocols(&app, command, &mut out),
        Command::Mapping { command } => mapping(&app, command, &mut out),
        Command::Attest { command } => attest(&app, command, &mut out),
        Command::Dashboard { command } => dashboard(&app, command, &mut out),
        Command::Sites { command } => sites(&app, command, &mut out),
    }
}

fn protocols(app: &AttestApp, command: ProtocolsCommand, out: &mut impl Write) -> Result<()> {
    let selection = app.selection();
    match command {
        ProtocolsCommand::Available => {
            let active = selection.selection()?;
            for name in selection.list_available_protocols()? {
                let marker = if active.contains(&name) { "*" } else { " " };
                writeln!(out, "{marker} {name}")?;
            }
        }
        ProtocolsCommand::Show => {
            for name in selection.selection()? {
                writeln!(out, "{name}")?;
            }
        }
        ProtocolsCommand::Set {
            names,
            clear_orphans,
        } => {
            if clear_orphans {
                app.lock_gate().ensure_unlocked()?;
            }
            let chosen = selection.set_selection(&names)?;
            writeln!(out, "{} protocol(s) selected", chosen.len())?;
            if clear_orphans {
                let removed = selection.clear_orphaned_mappings()?;
                writeln!(out, "removed {removed} mapping record(s)")?;
            }
        }
        ProtocolsCommand::Links { base_url } => {
            let Some(base_url) = base_url.or_else(|| app.settings().attest_base_url.clone())
            else {
                bail!("no base URL: pass --base-url or set `attest_base_url` in the config");
            };
            for link in selection.protocol_links(&base_url)? {
                writeln!(out, "{}\t{}", link.protocol, link.url)?;
            }
        }
        ProtocolsCommand::ClearOrphans => {
            let removed = selection.clear_orphaned_mappings()?;
            writeln!(out, "removed {removed} mapping record(s)")?;
        }
    }
    Ok(())
}

fn mapping(app: &AttestApp, command: MappingCommand, out: &mut impl Write) -> Result<()> {
    match command {
        MappingCommand::Show {
            protocol,
            header_row,
            format,
        } => {
            let view = app.mapping().load(&protocol, header_row)?;
            for warning in &view.warnings {
                eprintln!("warning: {warning}");
            }
            match format {
                OutputFormat::Text => render::mapping_view(out, &view)?,
                OutputFormat::Json => render::json(out, &view)?,
            }
        }
        MappingCommand::Save {
            protocol,
            header_row,
            rows,
            columns,
            renames,
            description,
        } => {
            let draft = MappingDraft {
                protocol,
                header_row,
                rows,
                columns,
                renames: renames.into_iter().collect::<BTreeMap<_, _>>(),
                description,
            };
            let report = app.mapping().save(&draft)?;
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            if !report.dropped_rows.is_empty() {
                eprintln!(
                    "warning: ignored rows outside the sheet: {}",
                    render::join_display(&report.dropped_rows)
                );
            }
            writeln!(
                out,
                "saved {} mapping record(s) for {}",
                report.records_written, report.protocol
            )?;
        }
        MappingCommand::Lock => {
            let state = app.lock_gate().lock()?;
            writeln!(out, "{state}")?;
        }
        MappingCommand::Unlock { password } => {
            let state = app.lock_gate().unlock(&password)?;
            writeln!(out, "{state}")?;
        }
        MappingCommand::Status => {
            let state = app.lock_gate().state()?;
            writeln!(out, "{state}")?;
        }
    }
    Ok(())
}

fn attest(app: &AttestApp, command: AttestCommand, out: &mut impl Write) -> Result<()> {
    let workflow = app.workflow();
    match command {
        AttestCommand::Review { format } => {
            let reviews = workflow.review()?;
            match format {
                OutputFormat::Text => render::reviews(out, &reviews)?,
                OutputFormat::Json => render::json(out, &reviews)?,
            }
        }
        AttestCommand::Submit {
            name,
            site,
            completed,
            notes,
        } => {
            let outcome = workflow.submit(&AttestationForm {
                name,
                site,
                completed,
                description: notes,
            })?;
            if let Some(warning) = outcome.warning() {
                eprintln!("warning: {warning}");
            }
            writeln!(
                out,
                "recorded attestation {} at {}",
                outcome.record.id,
                outcome.record.timestamp_display()
            )?;
        }
    }
    Ok(())
}

fn dashboard(app: &AttestApp, command: DashboardCommand, out: &mut impl Write) -> Result<()> {
    let dashboard = app.dashboard();
    match command {
        DashboardCommand::List { filter, format } => {
            let records = dashboard.filtered(&filter.to_filter()?)?;
            match format {
                OutputFormat::Text => render::attestations(out, &records)?,
                OutputFormat::Json => render::json(out, &records)?,
            }
        }
        DashboardCommand::Export { out: path, filter } => {
            let records = dashboard.filtered(&filter.to_filter()?)?;
            let format = dashboard.export_to_path(&records, &path)?;
            writeln!(
                out,
                "exported {} attestation(s) as {format:?} to {}",
                records.len(),
                path.display()
            )?;
        }
        DashboardCommand::Delete { ids } => {
            let removed = dashboard.delete(&ids)?;
            let unmatched = unmatched_ids(&ids, removed);
            if unmatched > 0 {
                eprintln!("warning: {unmatched} id(s) did not match any attestation");
            }
            writeln!(out, "deleted {removed} attestation(s)")?;
        }
    }
    Ok(())
}

fn sites(app: &AttestApp, command: SitesCommand, out: &mut impl Write) -> Result<()> {
    let workflow = app.workflow();
    let sites = match command {
        SitesCommand::List => workflow.sites()?,
        SitesCommand::Set { sites } => workflow.set_sites(&sites)?,
    };
    for site in sites {
        writeln!(out, "{site}")?;
    }
    Ok(())
}

/// Ids passed to `dashboard delete` that removed nothing. Repeated ids count once.
fn unmatched_ids(ids: &[AttestationId], removed: usize) -> usize {
    let distinct: BTreeSet<&AttestationId> = ids.iter().collect();
    distinct.len().saturating_sub(removed)
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match explicit {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            AppConfig::load(&path)?
        }
        None => {
            let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
            if let Some(dirs) = ProjectDirs::from("org", "attest", "attest") {
                candidates.push(dirs.config_dir().join(CONFIG_FILE_NAME));
            }
            let (config, used) = AppConfig::load_first(candidates)?;
            match used {
                Some(path) => tracing::debug!(path = %path.display(), "loaded config"),
                None => tracing::debug!("no config file found; using defaults"),
            }
            config
        }
    };
    config.apply_env();
    Ok(config)
}

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Install the global subscriber. Library crates log through `log`; the subscriber's
/// `tracing-log` bridge picks those records up. Logs go to stderr so stdout stays parseable.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("warning: logging already initialized: {err}");
    }
}
