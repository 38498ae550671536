//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_store::CsvCandleStore;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::strategy_file::load_strategy_def;
use crate::domain::backtest::{run_backtest, BacktestConfig};
use crate::domain::error::SigtraderError;
use crate::domain::strategy_def::build_strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::CandleStore;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Event-driven candle strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        /// INI run configuration
        #[arg(short, long)]
        config: PathBuf,
        /// JSON strategy description
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Validate a strategy description without running it
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// List instruments available in the candle store
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value = "day")]
        timeframe: String,
    },
    /// Show version information
    Info,
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    let result = match cli.command {
        Command::Backtest { config, strategy } => run_backtest_command(&config, &strategy),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::ListSymbols { config, timeframe } => run_list_symbols(&config, &timeframe),
        Command::Info => {
            println!("sigtrader {}", env!("CARGO_PKG_VERSION"));
            println!("Event-driven candle strategy backtester");
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, SigtraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| SigtraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn candle_store(config: &FileConfigAdapter) -> Result<CsvCandleStore, SigtraderError> {
    let dir = config
        .get("data", "candle_dir")
        .ok_or_else(|| SigtraderError::ConfigMissing {
            section: "data".into(),
            key: "candle_dir".into(),
        })?;
    Ok(CsvCandleStore::new(PathBuf::from(dir)))
}

fn run_backtest_command(config_path: &Path, strategy_path: &Path) -> Result<(), SigtraderError> {
    let config = load_config(config_path)?;
    let backtest_config = BacktestConfig::from_config(&config)?;
    let store = candle_store(&config)?;

    let def = load_strategy_def(strategy_path)?;
    let mut strategy = build_strategy(&def)?;

    let report = run_backtest(&store, &mut strategy, &backtest_config)?;

    println!("strategy:          {}", strategy.name());
    println!("{}", report.metrics);
    for trade in &report.trades {
        println!(
            "{} {} {} x{} in {:.2} out {:.2} pnl {:.2} ({:.2}%)",
            trade.entry_time.format("%Y-%m-%d"),
            trade.entry_action,
            trade.instrument,
            trade.quantity,
            trade.entry_price,
            trade.exit_price,
            trade.pnl,
            trade.return_pct * 100.0,
        );
    }
    Ok(())
}

fn run_validate(strategy_path: &Path) -> Result<(), SigtraderError> {
    let def = load_strategy_def(strategy_path)?;
    let strategy = build_strategy(&def)?;
    println!(
        "strategy '{}': ok ({} entry rules, {} indicators)",
        strategy.name(),
        def.entry_rules.len(),
        strategy.indicator_names().len(),
    );
    Ok(())
}

fn run_list_symbols(config_path: &Path, timeframe: &str) -> Result<(), SigtraderError> {
    let config = load_config(config_path)?;
    let store = candle_store(&config)?;
    for instrument in store.list_instruments(timeframe)? {
        println!("{instrument}");
    }
    Ok(())
}
