//! The client/connector registry (§9 "Cyclic graphs"): a slab-like
//! `HashMap<ClientId, Client>` owned by the `Mux`, with each client task
//! holding back only an opaque [`ClientId`]. §7's per-client-fatal and
//! per-service-fatal error classifications live here.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use super::Protocol;

pub type ClientId = u64;

#[derive(Debug)]
pub enum MuxError {
    Bind(Protocol, std::io::Error),
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::Bind(proto, e) => write!(f, "failed to bind {proto}: {e}"),
        }
    }
}

impl std::error::Error for MuxError {}

/// Per-client fatal conditions (§7): the mux closes the client and, if it
/// was a connector, schedules a reconnect.
#[derive(Debug)]
pub enum ClientFault {
    SendStalled,
    QueueOverflow,
    Eof,
    Io(std::io::Error),
}

struct Client {
    protocol: Protocol,
    tx: mpsc::Sender<Vec<u8>>,
}

/// Owns every connected client across every output protocol and hands out
/// fresh `ClientId`s as sockets are accepted.
pub struct Mux {
    clients: Mutex<HashMap<ClientId, Client>>,
    next_id: AtomicU64,
    last_activity: Mutex<HashMap<Protocol, Instant>>,
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl Mux {
    pub fn new() -> Self {
        Mux { clients: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1), last_activity: Mutex::new(HashMap::new()) }
    }

    /// Binds a listening service for `protocol` and spawns the accept loop.
    /// A bind failure is per-service fatal (§7): it's returned to the
    /// caller, who exits the process.
    pub async fn listen(
        self: Arc<Self>,
        addr: &str,
        protocol: Protocol,
        input_tx: Option<mpsc::Sender<Vec<u8>>>,
    ) -> Result<(), MuxError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MuxError::Bind(protocol, e))?;
        info!(%protocol, %addr, "listening");
        let mux = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, peer)) => {
                        info!(%protocol, %peer, "client connected");
                        mux.clone().spawn_client(socket, protocol, input_tx.clone());
                    }
                    Err(e) => {
                        warn!(%protocol, error = %e, "accept failed, retrying");
                    }
                }
            }
        });
        Ok(())
    }

    /// Dials out to a remote peer instead of listening (§6 "Outbound
    /// connectors"): retries every `retry_delay` with a 10s per-attempt
    /// timeout, forever, until the process exits.
    pub fn connect_out(
        self: Arc<Self>,
        host: String,
        port: u16,
        protocol: Protocol,
        retry_delay: Duration,
        input_tx: Option<mpsc::Sender<Vec<u8>>>,
    ) {
        tokio::spawn(async move {
            loop {
                let addr = format!("{host}:{port}");
                match tokio::time::timeout(Duration::from_secs(10), TcpStream::connect(&addr)).await {
                    Ok(Ok(socket)) => {
                        info!(%protocol, %addr, "connector established");
                        let id = self.clone().spawn_client(socket, protocol, input_tx.clone());
                        // wait for the client task to die before retrying
                        while self.clients.lock().await.contains_key(&id) {
                            tokio::time::sleep(Duration::from_millis(500)).await;
                        }
                    }
                    Ok(Err(e)) => warn!(%protocol, %addr, error = %e, "connector failed"),
                    Err(_) => warn!(%protocol, %addr, "connector timed out after 10s"),
                }
                tokio::time::sleep(retry_delay).await;
            }
        });
    }

    fn spawn_client(self: Arc<Self>, mut socket: TcpStream, protocol: Protocol, read_tx: Option<mpsc::Sender<Vec<u8>>>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1024);
        let mux = self.clone();

        tokio::spawn(async move {
            // The map's clone is the only sender the task keeps around: once
            // `broadcast` or the connector-retry loop removes it, `rx.recv()`
            // returns `None` on its own and the loop below exits.
            mux.clients.lock().await.insert(id, Client { protocol, tx });

            let (mut reader, mut writer) = socket.split();
            let mut buf = [0u8; 4096];
            loop {
                tokio::select! {
                    written = rx.recv() => {
                        match written {
                            Some(bytes) => {
                                let stall = tokio::time::timeout(Duration::from_secs(5), writer.write_all(&bytes)).await;
                                match stall {
                                    Ok(Ok(())) => {}
                                    Ok(Err(e)) => { error!(%protocol, error = %e, "client write failed"); break; }
                                    Err(_) => { warn!(%protocol, "client write stalled > 5s"); break; }
                                }
                            }
                            None => break,
                        }
                    }
                    read = reader.read(&mut buf), if protocol.is_input() => {
                        match read {
                            Ok(0) => { info!(%protocol, "client EOF"); break; }
                            Ok(n) => {
                                if let Some(tx) = &read_tx {
                                    let _ = tx.send(buf[..n].to_vec()).await;
                                }
                            }
                            Err(e) => { error!(%protocol, error = %e, "client read failed"); break; }
                        }
                    }
                }
            }
            mux.clients.lock().await.remove(&id);
        });

        id
    }

    /// Sends `bytes` to every connected client of `protocol`. A full queue
    /// (a stalled reader on the other end) is a per-client fault; the
    /// client is dropped rather than blocking the whole mux.
    pub async fn broadcast(&self, protocol: Protocol, bytes: &[u8]) {
        let mut clients = self.clients.lock().await;
        let stalled: Vec<ClientId> = clients
            .iter()
            .filter(|(_, c)| c.protocol == protocol)
            .filter(|(_, c)| c.tx.try_send(bytes.to_vec()).is_err())
            .map(|(&id, _)| id)
            .collect();
        for id in stalled {
            warn!(%protocol, "dropping a client: send queue overflow");
            clients.remove(&id);
        }
        drop(clients);
        self.last_activity.lock().await.insert(protocol, Instant::now());
    }

    pub async fn client_count(&self, protocol: Protocol) -> usize {
        self.clients.lock().await.values().filter(|c| c.protocol == protocol).count()
    }

    /// Writes `protocol`'s format-specific keepalive (§6 "Heartbeats") to
    /// every client of that protocol if nothing has been broadcast on it
    /// for `interval`. Protocols with no keepalive body (`heartbeat()`
    /// returns empty, e.g. the input/VRS protocols) are skipped.
    pub async fn heartbeat_if_idle(&self, protocol: Protocol, interval: Duration) {
        let body = protocol.heartbeat();
        if body.is_empty() {
            return;
        }
        let idle = {
            let last = self.last_activity.lock().await;
            last.get(&protocol).map(|t| t.elapsed() >= interval).unwrap_or(true)
        };
        if idle && self.client_count(protocol).await > 0 {
            self.broadcast(protocol, &body).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_to_no_clients_does_not_panic() {
        let mux = Mux::new();
        mux.broadcast(Protocol::BeastOut, b"hello").await;
        assert_eq!(mux.client_count(Protocol::BeastOut).await, 0);
    }

    #[tokio::test]
    async fn a_client_whose_queue_overflows_is_dropped() {
        let mux = Mux::new();
        let (tx, _rx) = mpsc::channel::<Vec<u8>>(1);
        mux.clients.lock().await.insert(1, Client { protocol: Protocol::BeastOut, tx });
        assert_eq!(mux.client_count(Protocol::BeastOut).await, 1);

        // fill then overflow the queue of capacity 1
        mux.broadcast(Protocol::BeastOut, b"one").await;
        mux.broadcast(Protocol::BeastOut, b"two").await;

        assert_eq!(mux.client_count(Protocol::BeastOut).await, 0);
    }
}
