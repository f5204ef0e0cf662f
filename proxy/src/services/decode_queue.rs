use super::telemetry_service::TelemetryService;
use bytes::Bytes;
use log::{debug, warn};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

/// Bounded hand-off between the HTTP path and the decode workers.
///
/// Submitting never waits: when the queue is full the body is dropped
/// (drop-newest) and a warning is logged.
#[derive(Clone)]
pub struct DecodeQueue {
    tx: mpsc::Sender<Bytes>,
}

impl DecodeQueue {
    /// Start `workers` tasks draining a queue of `capacity` bodies.
    ///
    /// Workers exit once every `DecodeQueue` handle is dropped and the
    /// queue is drained.
    pub fn spawn(
        service: Arc<TelemetryService>,
        workers: usize,
        capacity: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel::<Bytes>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let service = service.clone();
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(body) = next else {
                            break;
                        };
                        let disposition = service.handle_payload(&body).await;
                        debug!("decode worker {}: {:?}", worker, disposition);
                    }
                })
            })
            .collect();

        (Self { tx }, handles)
    }

    /// Queue a body for decoding. Returns `false` if it was dropped.
    pub fn submit(&self, body: Bytes) -> bool {
        match self.tx.try_send(body) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Decode queue full, dropping telemetry body");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Decode workers stopped, dropping telemetry body");
                false
            }
        }
    }
}
