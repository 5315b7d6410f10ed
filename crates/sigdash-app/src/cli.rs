//! Command-line interface.
//!
//! `serve` runs the dashboard; every other subcommand is a one-shot call
//! against the backend or the local state file.

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::error::{AppError, AppResult};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sigdash_api::client::DEFAULT_HISTORY_LIMIT;
use sigdash_api::SignalApiClient;
use sigdash_core::backtest::DEFAULT_BACKTEST_DAYS;
use sigdash_core::{
    BacktestResult, CreateSessionRequest, SettingsUpdate, SignalOutcome, SignalResponse,
    StrategyConfig, TradingSession,
};
use sigdash_store::{AlertCondition, StateStore};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "sigdash", version, about = "Crypto trading-signal dashboard", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SIGDASH_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the dashboard server and signal feed (default)
    Serve,
    /// Check backend health
    Health,
    /// List supported symbols and timeframes
    Cryptos,
    /// Fetch the signal for one symbol
    Signal {
        symbol: String,
        #[arg(short, long)]
        timeframe: Option<String>,
    },
    /// Fetch signals for several symbols (watched symbols when none given)
    Multi {
        symbols: Vec<String>,
        #[arg(short, long)]
        timeframe: Option<String>,
    },
    /// Run a backtest
    Backtest {
        symbol: String,
        #[arg(long, default_value_t = DEFAULT_BACKTEST_DAYS)]
        days: u32,
    },
    /// Show stored signal history
    History {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Backend settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Paper-trading sessions
    #[command(subcommand)]
    Sessions(SessionsCommand),
    /// Local watchlists
    #[command(subcommand)]
    Watchlist(WatchlistCommand),
    /// Local price alerts
    #[command(subcommand)]
    Alerts(AlertsCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SettingsCommand {
    /// Show settings (secrets masked)
    Show,
    /// Update selected fields
    Set(SettingsArgs),
}

#[derive(Args, Debug, Default, PartialEq)]
pub struct SettingsArgs {
    #[arg(long)]
    pub binance_api_key: Option<String>,
    #[arg(long)]
    pub binance_secret_key: Option<String>,
    #[arg(long)]
    pub default_crypto: Option<String>,
    #[arg(long)]
    pub default_timeframe: Option<String>,
    #[arg(long)]
    pub telegram_bot_token: Option<String>,
    #[arg(long)]
    pub telegram_chat_id: Option<String>,
    #[arg(long)]
    pub alerts_enabled: Option<bool>,
}

impl From<SettingsArgs> for SettingsUpdate {
    fn from(args: SettingsArgs) -> Self {
        Self {
            binance_api_key: args.binance_api_key,
            binance_secret_key: args.binance_secret_key,
            default_crypto: args.default_crypto,
            default_timeframe: args.default_timeframe,
            telegram_bot_token: args.telegram_bot_token,
            telegram_chat_id: args.telegram_chat_id,
            alerts_enabled: args.alerts_enabled,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SessionsCommand {
    List,
    Show { id: String },
    Create(CreateSessionArgs),
    Start { id: String },
    Stop { id: String },
    Delete { id: String },
}

#[derive(Args, Debug, PartialEq)]
pub struct CreateSessionArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "Balanced")]
    pub strategy: String,
    #[arg(long, default_value_t = 10_000.0)]
    pub balance: f64,
    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,
    #[arg(long)]
    pub risk_per_trade: Option<f64>,
    #[arg(long)]
    pub stop_loss: Option<f64>,
    #[arg(long)]
    pub take_profit: Option<f64>,
    #[arg(long)]
    pub max_positions: Option<u32>,
}

impl From<CreateSessionArgs> for CreateSessionRequest {
    fn from(args: CreateSessionArgs) -> Self {
        let defaults = StrategyConfig::default();
        Self {
            name: args.name,
            strategy_name: args.strategy,
            initial_balance: args.balance,
            symbols: args.symbols,
            strategy_config: StrategyConfig {
                risk_per_trade: args.risk_per_trade.unwrap_or(defaults.risk_per_trade),
                stop_loss: args.stop_loss.unwrap_or(defaults.stop_loss),
                take_profit: args.take_profit.unwrap_or(defaults.take_profit),
                max_positions: args.max_positions.unwrap_or(defaults.max_positions),
                trailing_stop: defaults.trailing_stop,
            },
        }
    }
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum WatchlistCommand {
    List,
    Add { group: String, symbol: String },
    Remove { group: String, symbol: String },
    Delete { group: String },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum AlertsCommand {
    List,
    /// Condition: price_above, price_below, rsi_above, rsi_below, confidence_above
    Add {
        symbol: String,
        condition: AlertCondition,
        threshold: f64,
    },
    Toggle { id: Uuid },
    Remove { id: Uuid },
}

/// Execute a one-shot command. `Serve` is handled by the caller.
pub async fn execute(command: Command, config: &AppConfig, json: bool) -> AppResult<()> {
    match command {
        Command::Serve => Err(AppError::InvalidArgument(
            "serve is not a one-shot command".to_string(),
        )),
        Command::Watchlist(cmd) => watchlist(cmd, &open_store(config)?, json),
        Command::Alerts(cmd) => alerts(cmd, &open_store(config)?, json),
        remote => backend(remote, config, json).await,
    }
}

fn open_store(config: &AppConfig) -> AppResult<StateStore> {
    Ok(StateStore::open(&config.state_path)?)
}

async fn backend(command: Command, config: &AppConfig, json: bool) -> AppResult<()> {
    let api = SignalApiClient::new(config.api_config())?;

    match command {
        Command::Health => {
            let health = api.health().await?;
            if json {
                return print_json(&health);
            }
            println!("backend {} ({})", health.status, api.base_url());
            if !health.is_healthy() {
                return Err(AppError::Api(sigdash_api::ApiError::Backend(format!(
                    "unhealthy: {}",
                    health.status
                ))));
            }
        }
        Command::Cryptos => {
            let list = api.list_cryptos().await?;
            if json {
                return print_json(&list);
            }
            println!("symbols:    {}", list.cryptos.join(", "));
            println!("timeframes: {}", list.timeframes.join(", "));
        }
        Command::Signal { symbol, timeframe } => {
            let timeframe = resolve_timeframe(timeframe, config)?;
            let signal = api.get_signal(&symbol, &timeframe).await?;
            if json {
                return print_json(&signal);
            }
            print_signal_header();
            print_signal_row(&signal);
        }
        Command::Multi { symbols, timeframe } => {
            let timeframe = resolve_timeframe(timeframe, config)?;
            let symbols = if symbols.is_empty() {
                open_store(config)?.watched_symbols()
            } else {
                symbols
            };
            let outcomes = api.get_multi_signals(&symbols, &timeframe).await?;
            if json {
                return print_json(&outcomes);
            }
            print_signal_header();
            for outcome in &outcomes {
                match outcome {
                    SignalOutcome::Signal(signal) => print_signal_row(signal),
                    SignalOutcome::Error { error } => println!("  error: {error}"),
                }
            }
        }
        Command::Backtest { symbol, days } => {
            let result = api.run_backtest(&symbol, days).await?;
            if json {
                return print_json(&result);
            }
            print_backtest(&result);
        }
        Command::History { symbol, limit } => {
            let history = api.signal_history(symbol.as_deref(), limit).await?;
            if json {
                return print_json(&history);
            }
            println!("{} signals", history.count);
            for s in &history.signals {
                println!(
                    "{:<22} {:<10} {:<4} {:<18} {:>6.1}% {:>14.4}",
                    s.timestamp,
                    s.symbol,
                    s.timeframe,
                    s.signal,
                    s.confidence * 100.0,
                    s.price
                );
            }
        }
        Command::Settings(SettingsCommand::Show) => {
            let settings = api.get_settings().await?.redacted();
            print_json(&settings)?;
        }
        Command::Settings(SettingsCommand::Set(args)) => {
            let status = api.update_settings(&args.into()).await?;
            println!("{}", status.status);
        }
        Command::Sessions(cmd) => sessions(cmd, &api, json).await?,
        local @ (Command::Serve | Command::Watchlist(_) | Command::Alerts(_)) => {
            return Err(AppError::InvalidArgument(format!(
                "{local:?} does not call the backend"
            )));
        }
    }
    Ok(())
}

async fn sessions(cmd: SessionsCommand, api: &SignalApiClient, json: bool) -> AppResult<()> {
    let session = match cmd {
        SessionsCommand::List => {
            let sessions = api.list_sessions().await?;
            if json {
                return print_json(&sessions);
            }
            for s in &sessions {
                print_session_row(s);
            }
            return Ok(());
        }
        SessionsCommand::Show { id } => api.get_session(&id).await?,
        SessionsCommand::Create(args) => api.create_session(&args.into()).await?,
        SessionsCommand::Start { id } => api.start_session(&id).await?,
        SessionsCommand::Stop { id } => api.stop_session(&id).await?,
        SessionsCommand::Delete { id } => {
            api.delete_session(&id).await?;
            println!("deleted session {id}");
            return Ok(());
        }
    };

    if json {
        return print_json(&session);
    }
    print_session_row(&session);
    for p in session.positions.iter().flatten() {
        println!(
            "    {:<10} qty {:>12.6} avg {:>12.4} now {:>12.4} pnl {:>10.2}",
            p.symbol, p.quantity, p.average_price, p.current_price, p.pnl
        );
    }
    Ok(())
}

fn watchlist(cmd: WatchlistCommand, store: &StateStore, json: bool) -> AppResult<()> {
    match cmd {
        WatchlistCommand::List => {
            let watchlists = store.watchlists();
            if json {
                return print_json(&watchlists);
            }
            for (group, symbols) in &watchlists {
                println!("{group}: {}", symbols.join(", "));
            }
        }
        WatchlistCommand::Add { group, symbol } => {
            if store.add_to_watchlist(&group, &symbol)? {
                println!("added {symbol} to {group}");
            } else {
                println!("{symbol} already in {group}");
            }
        }
        WatchlistCommand::Remove { group, symbol } => {
            if !store.remove_from_watchlist(&group, &symbol)? {
                return Err(AppError::InvalidArgument(format!(
                    "{symbol} is not in {group}"
                )));
            }
            println!("removed {symbol} from {group}");
        }
        WatchlistCommand::Delete { group } => {
            if !store.delete_watchlist(&group)? {
                return Err(AppError::InvalidArgument(format!(
                    "no watchlist named {group}"
                )));
            }
            println!("deleted watchlist {group}");
        }
    }
    Ok(())
}

fn alerts(cmd: AlertsCommand, store: &StateStore, json: bool) -> AppResult<()> {
    match cmd {
        AlertsCommand::List => {
            let alerts = store.alerts();
            if json {
                return print_json(&alerts);
            }
            for a in &alerts {
                println!(
                    "{} {:<10} {:<16} {:>12} {}",
                    a.id,
                    a.symbol,
                    a.condition,
                    a.threshold,
                    if a.enabled { "on" } else { "off" }
                );
            }
        }
        AlertsCommand::Add {
            symbol,
            condition,
            threshold,
        } => {
            let alert = store.create_alert(&symbol, condition, threshold)?;
            if json {
                return print_json(&alert);
            }
            println!("created alert {}", alert.id);
        }
        AlertsCommand::Toggle { id } => match store.toggle_alert(id)? {
            Some(enabled) => println!("alert {id} {}", if enabled { "enabled" } else { "disabled" }),
            None => return Err(AppError::InvalidArgument(format!("no alert {id}"))),
        },
        AlertsCommand::Remove { id } => {
            if !store.delete_alert(id)? {
                return Err(AppError::InvalidArgument(format!("no alert {id}")));
            }
            println!("deleted alert {id}");
        }
    }
    Ok(())
}

/// Explicit flag, else the stored default.
fn resolve_timeframe(timeframe: Option<String>, config: &AppConfig) -> AppResult<String> {
    match timeframe {
        Some(tf) => Ok(tf),
        None => Ok(open_store(config)?.preferences().default_timeframe),
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::InvalidArgument(format!("failed to render JSON: {e}")))?;
    println!("{text}");
    Ok(())
}

fn print_signal_header() {
    println!(
        "{:<10} {:<4} {:<18} {:>7} {:>14} {:>6} {:>10}",
        "SYMBOL", "TF", "SIGNAL", "CONF", "PRICE", "RSI", "MACD"
    );
}

fn print_signal_row(s: &SignalResponse) {
    println!(
        "{:<10} {:<4} {:<18} {:>6.1}% {:>14.4} {:>6.1} {:>10.4}",
        s.symbol,
        s.timeframe,
        s.signal,
        s.confidence * 100.0,
        s.price,
        s.indicators.rsi,
        s.indicators.macd
    );
    if let (Some(sl), Some(tp)) = (s.stop_loss, s.take_profit) {
        println!("           stop {sl:.4}  target {tp:.4}");
    }
}

fn print_backtest(r: &BacktestResult) {
    println!("{} over {} days", r.symbol, r.days);
    println!("  trades:       {}", r.total_trades);
    println!("  win rate:     {:.1}%", r.win_rate);
    println!("  total profit: {:.2}%", r.total_profit);
    if let Some(roi) = r.roi {
        println!("  roi:          {roi:.2}%");
    }
    if let Some(pf) = r.profit_factor {
        println!("  profit factor {pf:.2}");
    }
    println!("  worst trade:  {:.2}%", r.worst_trade());
}

fn print_session_row(s: &TradingSession) {
    println!(
        "{:<38} {:<20} {:<8} {:>12.2} {:>7.2}% {}",
        s.id,
        s.name,
        if s.is_active { "active" } else { "stopped" },
        s.current_balance,
        s.return_pct(),
        s.symbols.join(",")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sigdash").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn test_signal_and_backtest_args() {
        let cli = parse(&["signal", "btcusdt", "-t", "4h"]);
        assert_eq!(
            cli.command,
            Some(Command::Signal {
                symbol: "btcusdt".to_string(),
                timeframe: Some("4h".to_string()),
            })
        );

        let cli = parse(&["backtest", "ETHUSDT"]);
        assert_eq!(
            cli.command,
            Some(Command::Backtest {
                symbol: "ETHUSDT".to_string(),
                days: DEFAULT_BACKTEST_DAYS,
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["history", "--limit", "5", "--json", "--config", "alt.toml"]);
        assert!(cli.json);
        assert_eq!(cli.config, "alt.toml");
        assert_eq!(
            cli.command,
            Some(Command::History {
                symbol: None,
                limit: 5
            })
        );
    }

    #[test]
    fn test_alert_condition_parsed() {
        let cli = parse(&["alerts", "add", "BTCUSDT", "price-above", "70000"]);
        assert_eq!(
            cli.command,
            Some(Command::Alerts(AlertsCommand::Add {
                symbol: "BTCUSDT".to_string(),
                condition: AlertCondition::PriceAbove,
                threshold: 70000.0,
            }))
        );

        assert!(Cli::try_parse_from(["sigdash", "alerts", "add", "BTCUSDT", "moon", "1"]).is_err());
    }

    #[test]
    fn test_session_create_fills_strategy_defaults() {
        let cli = parse(&[
            "sessions", "create", "--name", "swing", "--symbols", "BTCUSDT,ETHUSDT", "--stop-loss",
            "0.05",
        ]);
        let Some(Command::Sessions(SessionsCommand::Create(args))) = cli.command else {
            panic!("expected sessions create");
        };
        let request: CreateSessionRequest = args.into();
        assert_eq!(request.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(request.strategy_name, "Balanced");
        assert_eq!(request.initial_balance, 10_000.0);
        assert_eq!(request.strategy_config.stop_loss, 0.05);
        assert_eq!(
            request.strategy_config.take_profit,
            StrategyConfig::default().take_profit
        );
    }

    #[test]
    fn test_settings_set_builds_partial_update() {
        let cli = parse(&["settings", "set", "--default-timeframe", "15m"]);
        let Some(Command::Settings(SettingsCommand::Set(args))) = cli.command else {
            panic!("expected settings set");
        };
        let update: SettingsUpdate = args.into();
        assert_eq!(update.default_timeframe.as_deref(), Some("15m"));
        assert!(update.binance_api_key.is_none());
        assert!(!update.is_empty());
    }

    #[tokio::test]
    async fn test_watchlist_and_alert_commands_use_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            state_path: dir.path().join("state.json").display().to_string(),
            ..AppConfig::default()
        };

        execute(
            Command::Watchlist(WatchlistCommand::Add {
                group: "alts".to_string(),
                symbol: "solusdt".to_string(),
            }),
            &config,
            false,
        )
        .await
        .unwrap();
        execute(
            Command::Alerts(AlertsCommand::Add {
                symbol: "SOLUSDT".to_string(),
                condition: AlertCondition::RsiBelow,
                threshold: 30.0,
            }),
            &config,
            true,
        )
        .await
        .unwrap();

        let store = StateStore::open(&config.state_path).unwrap();
        assert_eq!(store.watchlists()["alts"], vec!["SOLUSDT".to_string()]);
        assert_eq!(store.alerts().len(), 1);

        let missing = execute(
            Command::Watchlist(WatchlistCommand::Delete {
                group: "nope".to_string(),
            }),
            &config,
            false,
        )
        .await;
        assert!(matches!(missing, Err(AppError::InvalidArgument(_))));
    }
}
