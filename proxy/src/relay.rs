use log::{debug, info, warn};
use socket2::SockRef;
use std::{
    future::Future,
    io,
    net::Shutdown,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};

const COPY_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("cannot connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),
}

/// Splices raw connections to a fixed remote without looking at the bytes.
///
/// Once either direction drains, the read side of the socket the other
/// direction is still reading from is shut down, so the whole relay closes
/// promptly instead of staying half open. A connection only times out when
/// neither direction has moved a byte for `idle_timeout`.
#[derive(Debug, Clone)]
pub struct TcpRelay {
    remote_addr: String,
    connect_timeout: Duration,
    idle_timeout: Duration,
}

impl TcpRelay {
    pub fn new(remote_addr: impl Into<String>, connect_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            connect_timeout,
            idle_timeout,
        }
    }

    /// Accept connections forever, one task each.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let mut delay = Duration::from_millis(2);

        loop {
            let (client, peer) = match listener.accept().await {
                Ok(accepted) => {
                    delay = Duration::from_millis(2);
                    accepted
                }
                Err(e) => {
                    warn!("Relay accept error: {}, retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(1));
                    continue;
                }
            };

            let relay = self.clone();
            tokio::spawn(async move {
                info!("Proxying HTTPS for client {}", peer);
                relay.run(client).await;
            });
        }
    }

    /// Relay one client connection. Both sockets are closed on return.
    pub async fn run(&self, client: TcpStream) {
        if let Err(e) = SockRef::from(&client).set_keepalive(true) {
            debug!("Cannot enable keep-alive on client socket: {}", e);
        }

        let remote = match self.connect().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        let (sent, received) = self.splice(&client, &remote).await;
        debug!(
            "Relay to {} closed, {} bytes up, {} bytes down",
            self.remote_addr, sent, received
        );
    }

    async fn connect(&self) -> Result<TcpStream, RelayError> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.remote_addr)).await {
            Ok(Ok(remote)) => Ok(remote),
            Ok(Err(source)) => Err(RelayError::Connect {
                addr: self.remote_addr.clone(),
                source,
            }),
            Err(_) => Err(RelayError::ConnectTimeout(self.remote_addr.clone())),
        }
    }

    async fn splice(&self, client: &TcpStream, remote: &TcpStream) -> (u64, u64) {
        let activity = Activity::new();
        let upstream = pump(client, remote, &activity, self.idle_timeout);
        let downstream = pump(remote, client, &activity, self.idle_timeout);
        tokio::pin!(upstream, downstream);

        tokio::select! {
            sent = &mut upstream => {
                shutdown_read(remote);
                (sent, downstream.await)
            }
            received = &mut downstream => {
                shutdown_read(client);
                (upstream.await, received)
            }
        }
    }
}

fn shutdown_read(stream: &TcpStream) {
    // ENOTCONN once the peer is gone already, nothing left to wake
    if let Err(e) = SockRef::from(stream).shutdown(Shutdown::Read) {
        debug!("shutdown(read) failed: {}", e);
    }
}

/// Last time either direction of one relayed connection made progress.
struct Activity {
    origin: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(now, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.origin.elapsed().saturating_sub(last)
    }
}

/// Drive `op` until it completes or the whole connection has been idle for
/// `idle`. Progress in the other direction pushes the deadline back.
async fn until_idle<F, T>(op: F, activity: &Activity, idle: Duration) -> Option<io::Result<T>>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::pin!(op);

    loop {
        let remaining = idle.saturating_sub(activity.idle_for());
        if remaining.is_zero() {
            return None;
        }
        if let Ok(result) = timeout(remaining, &mut op).await {
            return Some(result);
        }
    }
}

/// Copy `src` into `dst` until end of stream, an error or the connection
/// going idle. Returns the number of bytes copied.
async fn pump(src: &TcpStream, dst: &TcpStream, activity: &Activity, idle: Duration) -> u64 {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let n = match until_idle(read(src, &mut buf), activity, idle).await {
            Some(Ok(0)) => break,
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                debug!("relay read error: {}", e);
                break;
            }
            None => {
                debug!("relay idle for {:?}, closing", idle);
                break;
            }
        };
        activity.touch();

        match until_idle(write_all(dst, &buf[..n]), activity, idle).await {
            Some(Ok(())) => copied += n as u64,
            Some(Err(e)) => {
                debug!("relay write error: {}", e);
                break;
            }
            None => break,
        }
        activity.touch();
    }

    copied
}

async fn read(stream: &TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        stream.readable().await?;
        match stream.try_read(buf) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            result => return result,
        }
    }
}

async fn write_all(stream: &TcpStream, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        stream.writable().await?;
        match stream.try_write(buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
