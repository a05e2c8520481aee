// Entry point for the proof-chain CLI
use clap::Parser;
use log::{error, info, LevelFilter};
use proof_chain::{BlockSummary, CancelToken, Command, Opt};
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let blockchain = opt.open_chain()?;
    if blockchain.is_durable() {
        info!(
            "Using chain at {}",
            blockchain.get_config().storage_path.display()
        );
    } else {
        info!("Using in-memory chain; nothing is kept after exit");
    }

    match opt.command {
        Command::Addblock { data, timeout_secs } => {
            let cancel = CancelToken::new();
            if let Some(secs) = timeout_secs {
                let timer = cancel.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_secs(secs));
                    timer.cancel();
                });
            }
            let block = blockchain.add_block_with_cancel(data.as_bytes(), &cancel)?;
            println!("Added block {}", block.hash_hex());
        }
        Command::Printchain { json } => {
            for block in blockchain.iterator() {
                let block = block?;
                let summary = BlockSummary::from(&block);
                if json {
                    println!("{}", serde_json::to_string(&summary)?);
                } else {
                    println!("Prev. hash: {}", summary.prev_hash);
                    println!("Data: {}", summary.data);
                    println!("Hash: {}", summary.hash);
                    println!("Timestamp: {}", summary.timestamp);
                    println!("Nonce: {}", summary.nonce);
                    println!();
                }
            }
        }
        Command::Verifychain => {
            let count = blockchain.verify_chain()?;
            println!("Chain OK: {count} blocks");
        }
        Command::Tip => {
            println!("{}", proof_chain::utils::hash_to_hex(&blockchain.get_tip_hash()));
        }
    }

    blockchain.close()?;
    Ok(())
}
