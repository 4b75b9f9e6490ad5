//! `obscura-rpc`: a thin JSON-RPC server exposing a running
//! [`Ledger`](obscura_core::orchestrator::Ledger) to wallets and the CLI.
//!
//! Deliberately narrow — it exposes exactly the operations a remote wallet
//! needs (transaction lookup, balance/status, broadcast, UTXO reservation)
//! and nothing about the sync engine's internals.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{RpcModule, Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use obscura_core::orchestrator::Ledger;
use obscura_core::tx::Tx;

fn rpc_err(err: obscura_core::Error) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32000, err.to_string(), None::<()>)
}

#[derive(Serialize)]
struct StatusResponse {
    id: String,
}

#[derive(Deserialize)]
struct LocalStatusParams {
    address: String,
}

#[derive(Deserialize)]
struct GetTransactionParams {
    txid: String,
}

#[derive(Serialize)]
struct TransactionResponse {
    id: String,
    raw_hex: String,
}

#[derive(Deserialize)]
struct BroadcastParams {
    raw_hex: String,
}

/// Builds the RPC method table bound to one running `Ledger`.
pub fn build_module(ledger: Arc<Ledger>) -> RpcModule<()> {
    let mut module = RpcModule::new(());

    {
        let ledger = ledger.clone();
        module
            .register_async_method("obscura_status", move |_params, _ctx| {
                let ledger = ledger.clone();
                async move { StatusResponse { id: ledger.id() } }
            })
            .expect("method name is unique");
    }

    {
        let ledger = ledger.clone();
        module
            .register_async_method("obscura_getLocalStatus", move |params, _ctx| {
                let ledger = ledger.clone();
                async move {
                    let params: LocalStatusParams = params.parse()?;
                    ledger
                        .get_local_status(&params.address)
                        .await
                        .map_err(rpc_err)
                }
            })
            .expect("method name is unique");
    }

    {
        let ledger = ledger.clone();
        module
            .register_async_method("obscura_getTransaction", move |params, _ctx| {
                let ledger = ledger.clone();
                async move {
                    let params: GetTransactionParams = params.parse()?;
                    let tx = ledger
                        .get_transaction(&params.txid)
                        .await
                        .map_err(rpc_err)?;
                    Ok::<_, ErrorObjectOwned>(tx.map(|tx| TransactionResponse {
                        id: tx.id.clone(),
                        raw_hex: hex::encode(&tx.raw),
                    }))
                }
            })
            .expect("method name is unique");
    }

    {
        let ledger = ledger.clone();
        module
            .register_async_method("obscura_broadcast", move |params, _ctx| {
                let ledger = ledger.clone();
                async move {
                    let params: BroadcastParams = params.parse()?;
                    let raw = hex::decode(&params.raw_hex)
                        .map_err(|e| ErrorObjectOwned::owned(-32001, e.to_string(), None::<()>))?;
                    let tx = Tx::from_raw(raw);
                    ledger.broadcast(&tx).await.map_err(rpc_err)
                }
            })
            .expect("method name is unique");
    }

    module
}

/// Starts a JSON-RPC server bound to `addr`, exposing `ledger`'s public
/// operations until the returned handle is stopped or dropped.
pub async fn serve(ledger: Arc<Ledger>, addr: SocketAddr) -> std::io::Result<ServerHandle> {
    let server = Server::builder().build(addr).await?;
    let module = build_module(ledger);
    Ok(server.start(module))
}
