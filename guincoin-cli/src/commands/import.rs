//! Import command - the bulk balance import wizard, one stage per subcommand
//!
//! Merged rows live only between stages, so the CLI keeps them in
//! `import-session.json` in the data directory until the job is committed.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use guincoin_core::adapters::spreadsheet::read_sheet;
use guincoin_core::domain::{DetectedColumns, UploadedFile};
use guincoin_core::services::LogEvent;
use guincoin_core::{ColumnMapping, MergedRow, ValidationResult};

use super::{get_context, get_guincoin_dir, get_logger, log_event};
use crate::output::{self, create_table, format_amount, format_confidence, tier_cell};

const SESSION_FILENAME: &str = "import-session.json";

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Show headers, first rows and detected columns of the import files
    Inspect {
        /// Balances spreadsheet (CSV, XLSX, XLS or ODS)
        balances: PathBuf,
        /// Optional name-to-email spreadsheet
        #[arg(long)]
        emails: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Match names to emails and start an import session
    Preview {
        /// Balances spreadsheet (CSV, XLSX, XLS or ODS)
        balances: PathBuf,
        /// Optional name-to-email spreadsheet
        #[arg(long)]
        emails: Option<PathBuf>,
        #[command(flatten)]
        mapping: MappingArgs,
        /// Save the resulting column mapping under this profile name
        #[arg(long)]
        save_profile: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Type in the email for one row of the session (1-based)
    SetEmail {
        /// Row number as shown by preview
        row: usize,
        /// Email address to use
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the session rows against the user directory
    Validate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Commit the session rows as a named import job
    Commit {
        /// Job name
        #[arg(long)]
        name: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// Output as JSON (requires --yes)
        #[arg(long, requires = "yes")]
        json: bool,
    },
    /// Drop the current import session
    Discard,
    /// Manage saved column mapping profiles
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List saved profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one profile
    Show {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a profile
    Delete { name: String },
}

/// Column choices; anything not given falls back to the profile, then detection
#[derive(Args, Debug, Default, Clone)]
pub struct MappingArgs {
    /// Use a saved column mapping profile
    #[arg(long)]
    pub profile: Option<String>,
    /// Balances file: recipient name column
    #[arg(long)]
    pub name_column: Option<String>,
    /// Balances file: amount column
    #[arg(long)]
    pub amount_column: Option<String>,
    /// Balances file: email column, when the file carries emails itself
    #[arg(long)]
    pub email_column: Option<String>,
    /// Balances file: market/location column
    #[arg(long)]
    pub market_column: Option<String>,
    /// Email file: name column
    #[arg(long)]
    pub emails_name_column: Option<String>,
    /// Email file: email column
    #[arg(long)]
    pub emails_email_column: Option<String>,
}

/// On-disk state between wizard stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportSession {
    balance_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email_file: Option<PathBuf>,
    column_mapping: ColumnMapping,
    rows: Vec<MergedRow>,
}

impl ImportSession {
    fn path(dir: &Path) -> PathBuf {
        dir.join(SESSION_FILENAME)
    }

    fn load(dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        if !path.exists() {
            bail!("No import in progress. Run `gc import preview` first.");
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&content).context("Import session file is corrupt; run `gc import discard`")
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(dir), content)?;
        Ok(())
    }

    fn clear(dir: &Path) -> Result<bool> {
        let path = Self::path(dir);
        if path.exists() {
            std::fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn set_email(&mut self, row: usize, email: &str) -> Result<&MergedRow> {
        let total = self.rows.len();
        let target = row
            .checked_sub(1)
            .and_then(|idx| self.rows.get_mut(idx))
            .ok_or_else(|| anyhow!("Row {} is out of range (1-{})", row, total))?;
        target.set_email_manually(email);
        Ok(target)
    }
}

/// Resolve the mapping from explicit flags, then the profile, then detection
fn build_mapping(
    args: &MappingArgs,
    profile: Option<ColumnMapping>,
    balances: &DetectedColumns,
    emails: Option<&DetectedColumns>,
) -> ColumnMapping {
    let mut mapping = profile.unwrap_or_else(|| ColumnMapping {
        balances: balances.to_balance_columns(),
        emails: None,
    });

    if let Some(v) = &args.name_column {
        mapping.balances.name = v.clone();
    }
    if let Some(v) = &args.amount_column {
        mapping.balances.amount = v.clone();
    }
    if args.email_column.is_some() {
        mapping.balances.email = args.email_column.clone();
    }
    if args.market_column.is_some() {
        mapping.balances.market = args.market_column.clone();
    }

    mapping.emails = match emails {
        Some(detected) => {
            let mut columns = mapping
                .emails
                .take()
                .unwrap_or_else(|| detected.to_email_columns());
            if let Some(v) = &args.emails_name_column {
                columns.name = v.clone();
            }
            if let Some(v) = &args.emails_email_column {
                columns.email = v.clone();
            }
            Some(columns)
        }
        None => None,
    };

    mapping
}

pub fn run(command: ImportCommands) -> Result<()> {
    match command {
        ImportCommands::Inspect {
            balances,
            emails,
            json,
        } => inspect(&balances, emails.as_deref(), json),
        ImportCommands::Preview {
            balances,
            emails,
            mapping,
            save_profile,
            json,
        } => preview(&balances, emails.as_deref(), &mapping, save_profile.as_deref(), json),
        ImportCommands::SetEmail { row, email, json } => {
            let dir = get_guincoin_dir()?;
            let mut session = ImportSession::load(&dir)?;
            let updated = session.set_email(row, &email)?.clone();
            session.save(&dir)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&updated)?);
            } else {
                output::success(&format!("Row {}: {} -> {}", row, updated.name, updated.email));
            }
            Ok(())
        }
        ImportCommands::Validate { json } => {
            let ctx = get_context()?;
            let session = ImportSession::load(&get_guincoin_dir()?)?;
            let result = ctx.validation_service.validate(&session.rows)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_validation(&result);
            }
            Ok(())
        }
        ImportCommands::Commit { name, yes, json } => commit(&name, yes, json),
        ImportCommands::Discard => {
            if ImportSession::clear(&get_guincoin_dir()?)? {
                println!("Import session discarded.");
            } else {
                println!("No import in progress.");
            }
            Ok(())
        }
        ImportCommands::Profiles { command } => profiles(command),
    }
}

fn inspect(balances: &Path, emails: Option<&Path>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let balance_sheet = read_sheet(balances)?;
    let email_sheet = emails.map(read_sheet).transpose()?;
    let upload = ctx.import_service.upload(&balance_sheet, email_sheet.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&upload)?);
        return Ok(());
    }

    print_uploaded_file("Balances file", &upload.balance_file);
    if let Some(file) = &upload.email_file {
        println!();
        print_uploaded_file("Email file", file);
    }
    Ok(())
}

fn preview(
    balances: &Path,
    emails: Option<&Path>,
    args: &MappingArgs,
    save_profile: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    let balance_sheet = read_sheet(balances)?;
    let email_sheet = emails.map(read_sheet).transpose()?;
    let upload = ctx.import_service.upload(&balance_sheet, email_sheet.as_ref());

    let profile = match &args.profile {
        Some(name) => Some(
            ctx.import_service
                .get_profile(name)?
                .ok_or_else(|| anyhow!("Profile '{}' not found", name))?,
        ),
        None => None,
    };
    let mapping = build_mapping(
        args,
        profile,
        &upload.balance_file.detected,
        upload.email_file.as_ref().map(|f| &f.detected),
    );

    let result = ctx
        .import_service
        .preview(&balance_sheet, email_sheet.as_ref(), &mapping)?;
    log_event(&logger, LogEvent::new("import_previewed").with_command("import preview"));

    if let Some(profile_name) = save_profile {
        ctx.import_service.save_profile(profile_name, &mapping)?;
    }

    let session = ImportSession {
        balance_file: balances.to_path_buf(),
        email_file: emails.map(Path::to_path_buf),
        column_mapping: mapping,
        rows: result.rows.clone(),
    };
    session.save(&get_guincoin_dir()?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_rows(&result.rows);
    println!();
    let summary = &result.summary;
    println!(
        "{} rows: {} auto, {} to review, {} need an email",
        summary.total_rows,
        summary.auto_matched.to_string().green(),
        summary.needs_review.to_string().yellow(),
        summary.manual_required.to_string().red()
    );
    if summary.skipped_rows > 0 {
        println!("{}", format!("{} blank row(s) skipped", summary.skipped_rows).dimmed());
    }
    if let Some(profile_name) = save_profile {
        output::info(&format!("Saved column mapping as profile '{}'", profile_name));
    }
    if summary.manual_required > 0 {
        println!();
        println!("Fill missing emails with `gc import set-email <row> <email>`.");
    }
    Ok(())
}

fn commit(name: &str, yes: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let dir = get_guincoin_dir()?;
    let session = ImportSession::load(&dir)?;

    let validation = ctx.validation_service.validate(&session.rows)?;
    if !validation.valid {
        if !json {
            print_validation(&validation);
        }
        bail!("Import is not valid; fix the errors above before committing");
    }

    if !yes {
        use dialoguer::Confirm;
        let prompt = format!(
            "Commit {} row(s) as '{}' ({} registered, {} pending)?",
            validation.summary.total_rows,
            name,
            validation.summary.registered_users,
            validation.summary.unregistered_users
        );
        if !Confirm::new().with_prompt(prompt).default(false).interact()? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let created_by = ctx.config.operator.clone();
    let result = ctx.job_service.create_job(
        name,
        &session.rows,
        Some(session.column_mapping),
        &created_by,
    )?;
    log_event(
        &logger,
        LogEvent::new("import_committed")
            .with_command("import commit")
            .with_job(result.job_id),
    );
    ImportSession::clear(&dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    output::success(&format!("Created import job {}", result.job_id));
    println!("  Status: {}", result.status.as_str());
    println!("  Transactions: {}", result.transactions_created);
    println!("  Pending balances: {}", result.pending_balances_created);
    if result.error_count > 0 {
        output::warning(&format!("{} row(s) failed:", result.error_count));
        for issue in &result.errors {
            println!("  row {}: {}", issue.row, issue.message);
        }
    }
    if result.pending_balances_created > 0 {
        println!();
        println!("Send invitations with `gc jobs send-invitations {}`.", result.job_id);
    }
    Ok(())
}

fn profiles(command: ProfileCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        ProfileCommands::List { json } => {
            let profiles = ctx.import_service.list_profiles()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
                return Ok(());
            }
            if profiles.is_empty() {
                println!("No saved profiles.");
                return Ok(());
            }
            let mut names: Vec<&String> = profiles.keys().collect();
            names.sort();
            let mut table = create_table();
            table.set_header(vec!["Profile", "Name", "Amount", "Email", "Market", "Email file"]);
            for name in names {
                let m = &profiles[name];
                table.add_row(vec![
                    name.clone(),
                    m.balances.name.clone(),
                    m.balances.amount.clone(),
                    m.balances.email.clone().unwrap_or_default(),
                    m.balances.market.clone().unwrap_or_default(),
                    m.emails
                        .as_ref()
                        .map(|e| format!("{} / {}", e.name, e.email))
                        .unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
        ProfileCommands::Show { name, json } => {
            let mapping = ctx
                .import_service
                .get_profile(&name)?
                .ok_or_else(|| anyhow!("Profile '{}' not found", name))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&mapping)?);
            } else {
                println!("{}", name.bold());
                println!("  Name column:   {}", mapping.balances.name);
                println!("  Amount column: {}", mapping.balances.amount);
                if let Some(email) = &mapping.balances.email {
                    println!("  Email column:  {}", email);
                }
                if let Some(market) = &mapping.balances.market {
                    println!("  Market column: {}", market);
                }
                if let Some(emails) = &mapping.emails {
                    println!("  Email file:    {} / {}", emails.name, emails.email);
                }
            }
        }
        ProfileCommands::Delete { name } => {
            if ctx.import_service.delete_profile(&name)? {
                output::success(&format!("Deleted profile '{}'", name));
            } else {
                bail!("Profile '{}' not found", name);
            }
        }
    }
    Ok(())
}

fn print_uploaded_file(title: &str, file: &UploadedFile) {
    println!("{} {}", title.bold(), format!("({}, {} rows)", file.file_name, file.total_rows).dimmed());

    let mut table = create_table();
    table.set_header(file.headers.clone());
    for row in &file.preview_rows {
        table.add_row(row.clone());
    }
    println!("{}", table);

    let detected = &file.detected;
    let show = |field: &str, value: &Option<String>| {
        println!("  {:<7} {}", field, value.as_deref().unwrap_or("-"));
    };
    println!("Detected columns:");
    show("name", &detected.name);
    show("amount", &detected.amount);
    show("email", &detected.email);
    show("market", &detected.market);
}

fn print_rows(rows: &[MergedRow]) {
    let mut table = create_table();
    table.set_header(vec!["#", "Name", "Email", "Amount", "Market", "Match", "Confidence"]);
    for (idx, row) in rows.iter().enumerate() {
        table.add_row(vec![
            comfy_table::Cell::new(idx + 1),
            comfy_table::Cell::new(&row.name),
            comfy_table::Cell::new(&row.email),
            comfy_table::Cell::new(format_amount(row.amount)),
            comfy_table::Cell::new(row.market.as_deref().unwrap_or("")),
            tier_cell(row.tier()),
            comfy_table::Cell::new(format_confidence(row.confidence)),
        ]);
    }
    println!("{}", table);
}

fn print_validation(result: &ValidationResult) {
    let summary = &result.summary;
    if result.valid {
        output::success("Import is valid");
    } else {
        output::error("Import is not valid");
    }
    println!(
        "  {} of {} rows valid; {} registered, {} will be pending; {} duplicate(s)",
        summary.valid_rows,
        summary.total_rows,
        summary.registered_users,
        summary.unregistered_users,
        summary.duplicates
    );

    if !result.errors.is_empty() {
        println!();
        println!("{}", "Errors".red().bold());
        for issue in &result.errors {
            println!("  row {}: {}", issue.row, issue.message);
        }
    }
    if !result.warnings.is_empty() {
        println!();
        println!("{}", "Warnings".yellow().bold());
        for issue in &result.warnings {
            println!("  row {}: {}", issue.row, issue.message);
        }
    }
}
