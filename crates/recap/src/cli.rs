use anyhow::Result;
use common::chains;
use common::types::WalletRecap;

use crate::recap::WalletRecapper;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Wallet {
        address: String,
        year: Option<i32>,
        json: bool,
    },
}

const WALLET_USAGE: &str = "usage: recap wallet <address> [year] [--json]";

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Ok(Command::Serve);
    };

    match cmd.as_str() {
        "serve" => Ok(Command::Serve),
        "wallet" => {
            let address = args.next().ok_or_else(|| WALLET_USAGE.to_string())?;
            let mut year = None;
            let mut json = false;
            for arg in args {
                if arg == "--json" {
                    json = true;
                    continue;
                }
                let parsed = arg
                    .parse::<i32>()
                    .map_err(|e| format!("invalid year: {arg} ({e})\n{WALLET_USAGE}"))?;
                year = Some(parsed);
            }
            Ok(Command::Wallet {
                address,
                year,
                json,
            })
        }
        other => Err(format!("unknown command: {other}")),
    }
}

/// Plain-text rendering for the terminal.
pub fn render_recap(recap: &WalletRecap) -> String {
    let mut out = format!("Wallet: {}  ({})\n", recap.address, recap.year);

    match &recap.top_token {
        Some(top) => out.push_str(&format!("Top token: {} ({} txs)\n", top.symbol, top.count)),
        None => out.push_str("Top token: -\n"),
    }
    out.push_str(&format!(
        "Counterparties: {}  NFT transfers: {}\n",
        recap.unique_counterparty_count, recap.nft_count
    ));

    out.push_str("Transactions by chain:\n");
    for (chain, count) in &recap.transactions_by_chain {
        let gas = recap.gas_spent_by_chain.get(chain).copied().unwrap_or_default();
        out.push_str(&format!(
            "  {:<16} {count:>6}  gas {:.6} (${:.2})\n",
            chains::display_name(chain),
            gas.native,
            gas.usd
        ));
    }

    let plates = if recap.nameplates.is_empty() {
        "-".to_string()
    } else {
        recap.nameplates.join(", ")
    };
    out.push_str(&format!("Nameplates: {plates}\n"));
    out
}

pub async fn show_wallet<R: WalletRecapper>(
    recapper: &R,
    address: &str,
    year: i32,
    json: bool,
) -> Result<()> {
    let recap = recapper.get_wallet_recap(address, year).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recap)?);
    } else {
        print!("{}", render_recap(&recap));
    }
    Ok(())
}
