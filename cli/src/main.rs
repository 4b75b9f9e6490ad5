use std::net::ToSocketAddrs;

use clap::{Parser, Subcommand};
use obscura_core::adapters::Network;
use obscura_core::registry::LedgerVariant;
use obscura_network::ElectrumClient;
use obscura_wallet::ObscuraAccount;

#[derive(Parser)]
#[command(name = "obscura")]
#[command(about = "Obscura blockchain CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node (header/database adapters are supplied by the
    /// deployment, not this crate — see spec §1's external collaborators).
    Node,
    /// Start the miner
    Miner,
    /// Wallet address management
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Connect to an indexing server and follow new headers
    Sync {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 50001)]
        port: u16,
    },
    /// Print an address's remote history status
    Status {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 50001)]
        port: u16,
        address: String,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    /// Derive and print the receiving/change address gap for a fresh seed
    NewAddressGap {
        #[arg(long, default_value_t = 0)]
        seed_index: u8,
    },
}

fn test_variant() -> LedgerVariant {
    LedgerVariant {
        name: "Obscura".into(),
        symbol: "OBSC".into(),
        network_name: "mainnet".into(),
        pubkey_address_prefix: vec![0x00],
        script_address_prefix: vec![0x05],
        extended_public_key_prefix: vec![0x04, 0x88, 0xb2, 0x1e],
        extended_private_key_prefix: vec![0x04, 0x88, 0xad, 0xe4],
        default_fee_per_byte: 1,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Node => {
            println!("obscura node: no Database/Headers adapter wired in this binary.");
            println!("see core::adapters::{{Database, Headers}} for the interfaces a deployment must supply.");
        }
        Commands::Miner => {
            println!("obscura miner: uses core::pow/block_ext against the in-memory toy ledger.");
        }
        Commands::Wallet { action } => match action {
            WalletAction::NewAddressGap { seed_index } => {
                let mut seed = [0u8; 32];
                seed[0] = seed_index;
                let account = ObscuraAccount::from_seed(seed, test_variant())
                    .expect("seed is a valid secp256k1 scalar for a well-formed 32-byte input");
                let addresses = account
                    .ensure_address_gap()
                    .await
                    .expect("address derivation does not touch the network");
                println!("account id: {}", account.id());
                for address in addresses {
                    println!("{address}");
                }
            }
        },
        Commands::Sync { host, port } => {
            let client = ElectrumClient::new(host.clone(), port);
            let mut headers = client.header_notifications();
            if let Err(err) = client.start().await {
                eprintln!("failed to connect to {host}:{port}: {err}");
                return;
            }
            client.connected().await.ok();
            if let Err(err) = client.subscribe_headers().await {
                eprintln!("subscribe_headers failed: {err}");
                return;
            }
            println!("subscribed to headers on {host}:{port}, waiting for pushes (ctrl-c to stop)");
            while let Ok(push) = headers.recv().await {
                println!("height {} ({} bytes)", push.height, push.raw.len());
            }
        }
        Commands::Status { host, port, address } => {
            if let Err(err) = (host.as_str(), port).to_socket_addrs() {
                eprintln!("invalid host:port {host}:{port}: {err}");
                return;
            }
            let client = ElectrumClient::new(host.clone(), port);
            if let Err(err) = client.start().await {
                eprintln!("failed to connect to {host}:{port}: {err}");
                return;
            }
            client.connected().await.ok();
            match client.get_history(&address).await {
                Ok(entries) => {
                    for entry in entries {
                        println!("{}:{}", entry.tx_hash, entry.height);
                    }
                }
                Err(err) => eprintln!("get_history failed: {err}"),
            }
        }
    }
}
