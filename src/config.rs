use crate::{
    abi::Address,
    poller::DEFAULT_POLL_INTERVAL,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545/";
pub const DEFAULT_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
pub const DEFAULT_EXPLORER_URL: &str = "https://sepolia.etherscan.io";
pub const DEFAULT_LOG_DIR: &str = "~/.lottery-client/logs";

/// Network binding fixed at build time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub contract: Address,
    pub explorer_url: String,
}

impl ChainConfig {
    /// Reads `LOTTERY_CHAIN_ID`, `LOTTERY_CONTRACT_ADDRESS` and
    /// `LOTTERY_EXPLORER_URL` as captured when the crate was compiled.
    pub fn from_build_env() -> Result<Self> {
        let chain_id = match option_env!("LOTTERY_CHAIN_ID") {
            Some(raw) => raw
                .parse()
                .wrap_err_with(|| format!("invalid LOTTERY_CHAIN_ID {raw:?}"))?,
            None => DEFAULT_CHAIN_ID,
        };
        let raw_contract =
            option_env!("LOTTERY_CONTRACT_ADDRESS").unwrap_or(DEFAULT_CONTRACT_ADDRESS);
        let contract = raw_contract
            .parse()
            .map_err(|e| eyre!("invalid LOTTERY_CONTRACT_ADDRESS {raw_contract:?}: {e}"))?;
        let explorer_url = option_env!("LOTTERY_EXPLORER_URL")
            .unwrap_or(DEFAULT_EXPLORER_URL)
            .to_string();
        Ok(Self {
            chain_id,
            contract,
            explorer_url,
        })
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub rpc_url: String,
    pub account: Option<Address>,
    pub log_dir: PathBuf,
    pub poll_interval: Duration,
    pub chain: ChainConfig,
}

pub enum CliCommand {
    Run(AppConfig),
    Help,
}

pub fn usage() -> String {
    format!(
        "Usage: lottery-client [--rpc-url <url>] [--account <address>]\n\
         [--log-dir <path>] [--poll-interval-ms <ms>]\n\
         \n\
         Flags:\n\
           --rpc-url <url>          JSON-RPC endpoint of the wallet/node (default {DEFAULT_RPC_URL})\n\
           --account <address>      Use this account instead of the wallet's first one\n\
           --log-dir <path>         Directory for log files (default {DEFAULT_LOG_DIR})\n\
           --poll-interval-ms <ms>  Contract state refresh interval (default {})\n\
           --help, -h               Show this message",
        DEFAULT_POLL_INTERVAL.as_millis()
    )
}

pub fn parse_cli_args(
    args: impl IntoIterator<Item = String>,
    chain: ChainConfig,
) -> Result<CliCommand> {
    let mut args = args.into_iter();
    let mut rpc_url: Option<String> = None;
    let mut account: Option<Address> = None;
    let mut log_dir: Option<String> = None;
    let mut poll_interval: Option<Duration> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if rpc_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                rpc_url = Some(url);
            }
            "--account" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--account requires an address"))?;
                if account.is_some() {
                    return Err(eyre!("--account may only be specified once"));
                }
                let parsed = raw
                    .parse()
                    .map_err(|e| eyre!("invalid --account {raw:?}: {e}"))?;
                account = Some(parsed);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(dir);
            }
            "--poll-interval-ms" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--poll-interval-ms requires a number"))?;
                let ms: u64 = raw
                    .parse()
                    .wrap_err_with(|| format!("invalid --poll-interval-ms {raw:?}"))?;
                if ms == 0 {
                    return Err(eyre!("--poll-interval-ms must be greater than zero"));
                }
                poll_interval = Some(Duration::from_millis(ms));
            }
            "--help" | "-h" => return Ok(CliCommand::Help),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let raw_dir = log_dir.unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
    let log_dir = PathBuf::from(shellexpand::tilde(&raw_dir).into_owned());

    Ok(CliCommand::Run(AppConfig {
        rpc_url: rpc_url.unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
        account,
        log_dir,
        poll_interval: poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        chain,
    }))
}
