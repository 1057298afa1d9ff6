//! CLI binary for the Xiaofubao campus-payment client.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize as _;
use xiaofubao_rs::auth::AuthFlow;
use xiaofubao_rs::broker::{Broker, WITHHELD_BALANCE};
use xiaofubao_rs::client::XfbClient;
use xiaofubao_rs::config::Config;
use xiaofubao_rs::models::{SessionToken, Transaction};
use xiaofubao_rs::notify::LogNotifier;
use xiaofubao_rs::qr::{QrEvent, QrLifecycle};
use xiaofubao_rs::scheduler::Coordinator;
use xiaofubao_rs::service::XfbService;
use xiaofubao_rs::storage::{FileStorage, Storage as _};
use xiaofubao_rs::watcher::FeedWatcher;

/// Environment variable name for the session token.
const SESSION_ENV: &str = "XIAOFUBAO_SESSION";

/// Xiaofubao campus-payment CLI — balance, payment codes, transactions.
#[derive(Debug, Parser)]
#[command(name = "xiaofubao", version, about)]
struct Cli {
    /// Override the settings directory (default: XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Show the account balance.
    Balance,
    /// Issue a payment code and wait for settlement or expiry.
    Qrcode,
    /// List the day's transactions.
    Transactions {
        /// Calendar day to query (YYYYMMDD, default today).
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Run the foreground loop: refresh, redemption ticks, and
    /// transaction notifications.
    Watch,
    /// Request a login state from the authorization service.
    LoginState,
    /// Exchange a captured (state, code) pair for a session token and
    /// store it.
    Exchange {
        /// The `state` captured from the authorization redirect.
        #[arg(long)]
        state: String,
        /// The `code` the provider sent back.
        #[arg(long)]
        code: String,
    },
}

/// Parses a date string in `YYYYMMDD` format for clap.
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|err| format!("{err}"))
}

/// Prints an error line to stderr.
fn print_error(message: &str) -> io::Result<()> {
    writeln!(
        io::stderr().lock(),
        "{} {message}",
        "error:".red().bold()
    )
}

/// Creates the settings storage, using `data_dir` if provided or the
/// default XDG data directory otherwise.
fn create_storage(data_dir: Option<PathBuf>) -> xiaofubao_rs::error::Result<FileStorage> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => FileStorage::default_dir()?,
    };
    FileStorage::new(dir)
}

/// Resolves the session token: the environment variable wins (and is
/// persisted for later runs), else the stored token.
async fn resolve_token(storage: &FileStorage) -> io::Result<Option<SessionToken>> {
    if let Ok(raw) = std::env::var(SESSION_ENV)
        && !raw.is_empty()
    {
        if let Err(err) = storage.set_session_token(raw.clone()).await {
            print_error(&format!("could not persist session token: {err}"))?;
        }
        return Ok(Some(SessionToken::new(raw)));
    }

    match storage.session_token().await {
        Ok(Some(raw)) => Ok(Some(SessionToken::new(raw))),
        Ok(None) => {
            print_error("no session token configured")?;
            writeln!(
                io::stderr().lock(),
                "  {} set {} or run `xiaofubao exchange`",
                "hint:".cyan(),
                SESSION_ENV.bold()
            )?;
            Ok(None)
        }
        Err(err) => {
            print_error(&format!("could not read session token: {err}"))?;
            Ok(None)
        }
    }
}

/// Logs a broker in with the stored session token.
async fn login(storage: &FileStorage) -> io::Result<Option<Broker>> {
    let Some(token) = resolve_token(storage).await? else {
        return Ok(None);
    };
    let client = match XfbClient::builder().build() {
        Ok(client) => client,
        Err(err) => {
            print_error(&format!("failed to build client: {err}"))?;
            return Ok(None);
        }
    };
    match Broker::login(client, Config::default(), token).await {
        Ok(broker) => Ok(Some(broker)),
        Err(err) => {
            print_error(&format!("login failed: {err}"))?;
            Ok(None)
        }
    }
}

/// Runs the CLI, returning an appropriate exit code.
async fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let storage = match create_storage(cli.data_dir) {
        Ok(storage) => storage,
        Err(err) => {
            print_error(&format!("failed to initialize storage: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    match cli.command {
        Command::Balance => cmd_balance(&storage).await,
        Command::Qrcode => cmd_qrcode(storage).await,
        Command::Transactions { date } => cmd_transactions(&storage, date).await,
        Command::Watch => cmd_watch(storage).await,
        Command::LoginState => cmd_login_state().await,
        Command::Exchange { state, code } => cmd_exchange(&storage, &state, &code).await,
    }
}

/// Executes the `balance` subcommand.
async fn cmd_balance(storage: &FileStorage) -> io::Result<ExitCode> {
    let Some(broker) = login(storage).await? else {
        return Ok(ExitCode::FAILURE);
    };
    match broker.balance().await {
        Ok(balance) => {
            let mut out = io::stdout().lock();
            if balance == WITHHELD_BALANCE {
                writeln!(out, "{} {}", "Balance:".bold(), balance.dimmed())?;
                writeln!(out, "  {} the server is withholding the amount", "note:".cyan())?;
            } else {
                writeln!(out, "{} \u{a5}{balance}", "Balance:".bold())?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(&format!("balance query failed: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `qrcode` subcommand: issues a code and polls it to
/// settlement or expiry.
async fn cmd_qrcode(storage: FileStorage) -> io::Result<ExitCode> {
    let storage = Arc::new(storage);
    if resolve_token(&storage).await?.is_none() {
        return Ok(ExitCode::FAILURE);
    }
    let config = Config::default();
    let client = match XfbClient::builder().build() {
        Ok(client) => client,
        Err(err) => {
            print_error(&format!("failed to build client: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let service = XfbService::new(client, config.clone(), storage);
    let mut lifecycle = QrLifecycle::new(service, config.qr_validity);

    let renewed = match lifecycle.refresh().await {
        Ok(event) => event,
        Err(err) => {
            print_error(&format!("could not issue a payment code: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    {
        let mut out = io::stdout().lock();
        if let QrEvent::Renewed { balance } = &renewed {
            writeln!(out, "{} \u{a5}{balance}", "Balance:".bold())?;
        }
        if let Some(code) = lifecycle.state().active_code() {
            writeln!(out, "{} {}", "Code:".bold(), code.content)?;
            writeln!(out, "  valid until {}", code.valid_until.dimmed())?;
        }
    }

    let bar = make_countdown(config.qr_validity.as_secs());
    loop {
        tokio::time::sleep(config.tick_interval).await;
        let now = Utc::now();
        if let Some(code) = lifecycle.state().active_code() {
            bar.set_position(config.qr_validity.as_secs() - code.remaining(now).as_secs());
        }
        match lifecycle.tick(now).await {
            Ok(Some(QrEvent::Settled { amount })) => {
                bar.finish_and_clear();
                writeln!(
                    io::stdout().lock(),
                    "{} \u{a5}{amount}",
                    "Payment successful:".green().bold()
                )?;
                return Ok(ExitCode::SUCCESS);
            }
            Ok(Some(QrEvent::Expired)) => {
                bar.finish_and_clear();
                writeln!(io::stdout().lock(), "{}", "Code expired unused.".dimmed())?;
                return Ok(ExitCode::SUCCESS);
            }
            Ok(Some(QrEvent::Renewed { .. }) | None) => {}
            Err(err) => {
                // One failed check is not fatal, the next tick retries.
                tracing::warn!(error = %err, "redemption check failed");
            }
        }
    }
}

/// Executes the `transactions` subcommand.
async fn cmd_transactions(storage: &FileStorage, date: Option<NaiveDate>) -> io::Result<ExitCode> {
    let Some(broker) = login(storage).await? else {
        return Ok(ExitCode::FAILURE);
    };
    match broker.list_transactions(date).await {
        Ok(transactions) => {
            print_transactions_table(&transactions)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(&format!("history query failed: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `watch` subcommand: the foreground coordinator loop.
async fn cmd_watch(storage: FileStorage) -> io::Result<ExitCode> {
    let storage = Arc::new(storage);
    if resolve_token(&storage).await?.is_none() {
        return Ok(ExitCode::FAILURE);
    }
    if let Err(err) = storage.set_notifications_enabled(true).await {
        print_error(&format!("could not enable notifications: {err}"))?;
        return Ok(ExitCode::FAILURE);
    }

    let config = Config::default();
    let client = match XfbClient::builder().build() {
        Ok(client) => client,
        Err(err) => {
            print_error(&format!("failed to build client: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let service = Arc::new(XfbService::new(
        client,
        config.clone(),
        Arc::clone(&storage),
    ));
    let coordinator = Coordinator::new(
        QrLifecycle::new(Arc::clone(&service), config.qr_validity),
        FeedWatcher::new(service, Arc::clone(&storage)),
        storage,
        LogNotifier,
        None,
        config,
    );

    writeln!(
        io::stdout().lock(),
        "{} refresh + transaction watch running, Ctrl-C to stop",
        "watch:".green().bold()
    )?;
    coordinator.run_foreground().await;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `login-state` subcommand.
async fn cmd_login_state() -> io::Result<ExitCode> {
    let flow = match AuthFlow::new(&Config::default()) {
        Ok(flow) => flow,
        Err(err) => {
            print_error(&format!("failed to build auth client: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };
    match flow.obtain_login_state().await {
        Ok(state) => {
            let mut out = io::stdout().lock();
            writeln!(out, "{} {state}", "State:".bold())?;
            writeln!(
                out,
                "  {} authorize with the provider, then run `xiaofubao exchange --state {state} --code <code>`",
                "hint:".cyan()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(&format!("could not obtain a login state: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `exchange` subcommand.
async fn cmd_exchange(storage: &FileStorage, state: &str, code: &str) -> io::Result<ExitCode> {
    let flow = match AuthFlow::new(&Config::default()) {
        Ok(flow) => flow,
        Err(err) => {
            print_error(&format!("failed to build auth client: {err}"))?;
            return Ok(ExitCode::FAILURE);
        }
    };
    match flow.exchange_session(state, code).await {
        Ok(token) => {
            if let Err(err) = storage.set_session_token(token.expose().to_owned()).await {
                print_error(&format!("could not persist the session token: {err}"))?;
                return Ok(ExitCode::FAILURE);
            }
            writeln!(
                io::stdout().lock(),
                "{} session token stored",
                "ok:".green().bold()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(&format!("exchange failed: {err}"))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Builds the countdown bar for an active payment code.
fn make_countdown(validity_secs: u64) -> ProgressBar {
    let bar = ProgressBar::new(validity_secs);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan} {pos}/{len}s")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// Prints transactions in a table.
fn print_transactions_table(transactions: &[Transaction]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if transactions.is_empty() {
        writeln!(out, "{}", "No transactions found.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Time").fg(Color::Cyan),
        Cell::new("Fee").fg(Color::Cyan),
        Cell::new("Address").fg(Color::Cyan),
        Cell::new("Amount").fg(Color::Cyan),
        Cell::new("Balance after").fg(Color::Cyan),
    ]);

    for tx in transactions {
        _ = table.add_row(vec![
            Cell::new(&tx.time),
            Cell::new(&tx.fee_name),
            Cell::new(&tx.address),
            Cell::new(&tx.money).fg(Color::Red),
            Cell::new(&tx.balance_after),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Transactions".green().bold(),
        format_args!("({})", transactions.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Entry point.
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            // Last-resort error output — if stderr itself failed, nothing
            // we can do.
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_compact_format() {
        let date = parse_date("20250508").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 5, 8).unwrap());
        assert!(parse_date("2025-05-08").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["xiaofubao", "transactions", "--date", "20250508"]);
        assert!(matches!(
            cli.command,
            Command::Transactions { date: Some(_) }
        ));

        let cli = Cli::parse_from([
            "xiaofubao",
            "exchange",
            "--state",
            "abc123",
            "--code",
            "c0de",
        ]);
        assert!(matches!(cli.command, Command::Exchange { .. }));
    }

    #[test]
    fn make_countdown_creates_bar() {
        let bar = make_countdown(120);
        bar.finish_and_clear();
    }
}
