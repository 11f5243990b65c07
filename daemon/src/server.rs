//! JSON metadata broadcaster: a TCP server that fans out every
//! [`crate::metadata`] message to every connected subscriber. Grounded on
//! the teacher's `service::signal::start_server` (a `TcpListener` accept
//! loop, one task per connection, a broadcast channel shared with the
//! producer side) with the websocket-style framing swapped for
//! newline-delimited JSON, since this daemon's consumers are metadata
//! tailers, not browser peers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::metadata::Envelope;

const CHANNEL_CAPACITY: usize = 256;

/// Shared publish side: every call into `publish` fans the serialized
/// envelope out to whichever sockets are currently subscribed. Messages
/// published with nobody listening are simply dropped, same as the
/// teacher's `Route::ping`/`Route::add` firing into a channel nobody
/// reads yet.
pub struct MetadataHub {
    instance_id: String,
    instance_key: String,
    tx: broadcast::Sender<String>,
}

impl MetadataHub {
    pub fn new(instance_id: impl Into<String>, instance_key: impl Into<String>) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            instance_id: instance_id.into(),
            instance_key: instance_key.into(),
            tx,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Wraps `payload` in an envelope tagged `kind` and broadcasts the
    /// serialized line to every current subscriber.
    pub fn publish<T: serde::Serialize>(&self, kind: &'static str, payload: T) {
        let envelope = Envelope::new(kind, &self.instance_id, &self.instance_key, payload);
        match envelope.to_line() {
            Ok(line) => {
                // Err means no subscribers are currently connected; not an error.
                let _ = self.tx.send(line);
            }
            Err(e) => log::error!("failed to serialize {kind} metadata message: {e}"),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// Accepts metadata subscribers on `bind` until the listener errors.
pub async fn start_server(bind: SocketAddr, hub: Arc<MetadataHub>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    log::info!("metadata server listening on {bind}");

    loop {
        let (mut socket, addr) = listener.accept().await?;
        log::info!("metadata subscriber connected: {addr}");

        let mut rx = hub.subscribe();
        tokio::spawn(async move {
            if socket.set_nodelay(true).is_err() {
                return;
            }

            loop {
                match rx.recv().await {
                    Ok(line) => {
                        if socket.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("metadata subscriber {addr} lagged, dropped {skipped} messages");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            log::info!("metadata subscriber disconnected: {addr}");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Ping {
        ok: bool,
    }

    #[tokio::test]
    async fn subscriber_receives_published_messages() {
        let hub = MetadataHub::new("inst", "key");
        let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = tokio::net::TcpListener::bind(bind).await.unwrap();
        let local_addr = listener.local_addr().unwrap();

        let server_hub = hub.clone();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut rx = server_hub.subscribe();
                tokio::spawn(async move {
                    while let Ok(line) = rx.recv().await {
                        if socket.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        let mut client = tokio::net::TcpStream::connect(local_addr).await.unwrap();
        // Give the accept loop a moment to register the subscription.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        hub.publish("signal", Ping { ok: true });

        use tokio::io::AsyncReadExt;
        let mut buf = [0u8; 256];
        let n = client.read(&mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.contains("\"type\":\"signal\""));
        assert!(text.contains("\"ok\":true"));
    }
}
