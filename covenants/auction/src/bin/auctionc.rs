use std::env;
use std::fs;

use kaspa_consensus_core::tx::{TransactionId, TransactionOutpoint};
use ordinal_auction::script::script_hex;
use ordinal_auction::{AuctionConfig, CovenantState, Deadline, Identity, PrevoutCommitment, pay_to_pubkey_hash_script, validate_bid};

const USAGE: &str = "usage: auctionc <command> [args]

commands:
  p2pkh <pubkey-hex>
  genesis (--asset <txid:index> | --asset-commitment <hex> [--entry <n>]) --auctioneer <pubkey-hex> --deadline <lock-time>
  next-state <state-hex> --bidder <pubkey-hex>
  decode-state <state-hex>
  check-bid <state-hex> --previous <amount> --successor <state-hex> --amount <amount> [--config cfg.json]
  commitment <txid:index>...";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some((command, rest)) = args.split_first() else {
        return Err(USAGE.to_string());
    };

    match command.as_str() {
        "p2pkh" => {
            let [key] = positional::<1>(rest, "p2pkh")?;
            let spk = pay_to_pubkey_hash_script(&parse_identity(&key)?).map_err(|err| format!("script error: {err}"))?;
            println!("{}", script_hex(&spk));
        }
        "genesis" => {
            let options = Options::parse(rest, &["--asset", "--asset-commitment", "--entry", "--auctioneer", "--deadline"])?;
            let auctioneer = parse_identity(options.require("--auctioneer")?)?;
            let deadline = Deadline::new(parse_u64(options.require("--deadline")?, "--deadline")?);
            options.no_positional("genesis")?;
            let state = match (options.get("--asset"), options.get("--asset-commitment")) {
                (Some(asset), None) => CovenantState::genesis(parse_outpoint(asset)?, auctioneer, deadline),
                (None, Some(commitment)) => {
                    let bytes = hex::decode(commitment).map_err(|err| format!("invalid commitment hex: {err}"))?;
                    let entry = options.get("--entry").map(|value| parse_u64(value, "--entry")).transpose()?.unwrap_or(0);
                    let entry = usize::try_from(entry).map_err(|err| format!("invalid --entry: {err}"))?;
                    CovenantState::genesis_from_commitment(&PrevoutCommitment::from(bytes), entry, auctioneer, deadline)
                        .map_err(|err| err.to_string())?
                }
                _ => return Err("genesis needs exactly one of --asset or --asset-commitment".to_string()),
            };
            println!("{}", hex::encode(state.encode()));
        }
        "next-state" => {
            let options = Options::parse(rest, &["--bidder"])?;
            let [state] = options.positional::<1>("next-state")?;
            let state = parse_state(&state)?;
            let bidder = parse_identity(options.require("--bidder")?)?;
            println!("{}", hex::encode(state.with_bidder(bidder).encode()));
        }
        "decode-state" => {
            let [state] = positional::<1>(rest, "decode-state")?;
            let state = parse_state(&state)?;
            let json = serde_json::to_string_pretty(&state).map_err(|err| format!("failed to serialize state: {err}"))?;
            println!("{json}");
        }
        "check-bid" => {
            let options = Options::parse(rest, &["--previous", "--successor", "--amount", "--config"])?;
            let [current] = options.positional::<1>("check-bid")?;
            let current = parse_state(&current)?;
            let successor = parse_state(options.require("--successor")?)?;
            let previous = parse_u64(options.require("--previous")?, "--previous")?;
            let amount = parse_u64(options.require("--amount")?, "--amount")?;
            let config = match options.get("--config") {
                Some(path) => load_config(path)?,
                None => AuctionConfig::default(),
            };
            validate_bid(&current, previous, &successor, amount, &config).map_err(|err| format!("rejected: {err}"))?;
            println!("ok");
        }
        "commitment" => {
            if rest.is_empty() {
                return Err("commitment requires at least one <txid:index>".to_string());
            }
            let outpoints = rest.iter().map(|value| parse_outpoint(value)).collect::<Result<Vec<_>, _>>()?;
            println!("{}", PrevoutCommitment::from_outpoints(&outpoints));
        }
        "-h" | "--help" | "help" => println!("{USAGE}"),
        other => return Err(format!("unknown command: {other}\n{USAGE}")),
    }
    Ok(())
}

struct Options {
    values: Vec<(String, String)>,
    positional: Vec<String>,
}

impl Options {
    fn parse(args: &[String], known: &[&str]) -> Result<Self, String> {
        let mut values = Vec::new();
        let mut positional = Vec::new();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                flag if known.contains(&flag) => {
                    let value = args.get(i + 1).ok_or_else(|| format!("{flag} requires a value"))?;
                    values.push((flag.to_string(), value.clone()));
                    i += 2;
                }
                value if value.starts_with("--") => return Err(format!("unknown option: {value}")),
                value => {
                    positional.push(value.to_string());
                    i += 1;
                }
            }
        }
        Ok(Self { values, positional })
    }

    fn get(&self, flag: &str) -> Option<&str> {
        self.values.iter().rev().find(|(name, _)| name == flag).map(|(_, value)| value.as_str())
    }

    fn require(&self, flag: &str) -> Result<&str, String> {
        self.get(flag).ok_or_else(|| format!("missing {flag}"))
    }

    fn positional<const N: usize>(&self, command: &str) -> Result<[String; N], String> {
        positional::<N>(&self.positional, command)
    }

    fn no_positional(&self, command: &str) -> Result<(), String> {
        self.positional::<0>(command).map(|_| ())
    }
}

fn positional<const N: usize>(args: &[String], command: &str) -> Result<[String; N], String> {
    <[String; N]>::try_from(args.to_vec()).map_err(|args| format!("{command} expects {N} argument(s), got {}", args.len()))
}

fn parse_identity(value: &str) -> Result<Identity, String> {
    Identity::from_hex(value).map_err(|err| err.to_string())
}

fn parse_u64(value: &str, flag: &str) -> Result<u64, String> {
    value.parse::<u64>().map_err(|err| format!("invalid {flag} '{value}': {err}"))
}

fn parse_state(value: &str) -> Result<CovenantState, String> {
    let bytes = hex::decode(value).map_err(|err| format!("invalid state hex: {err}"))?;
    CovenantState::decode(&bytes).map_err(|err| err.to_string())
}

fn parse_outpoint(value: &str) -> Result<TransactionOutpoint, String> {
    let (txid, index) = value.split_once(':').ok_or_else(|| format!("expected <txid:index>, got '{value}'"))?;
    let bytes = hex::decode(txid).map_err(|err| format!("invalid txid '{txid}': {err}"))?;
    let bytes = <[u8; 32]>::try_from(bytes).map_err(|bytes| format!("txid must be 32 bytes, got {}", bytes.len()))?;
    let index = index.parse::<u32>().map_err(|err| format!("invalid output index '{index}': {err}"))?;
    Ok(TransactionOutpoint::new(TransactionId::from_bytes(bytes), index))
}

fn load_config(path: &str) -> Result<AuctionConfig, String> {
    let json = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    let config = serde_json::from_str::<AuctionConfig>(&json).map_err(|err| format!("failed to parse config {path}: {err}"))?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}
