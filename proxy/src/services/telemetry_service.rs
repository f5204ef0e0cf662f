use crate::repository::ReadingRepository;
use aculink::SensorReading;
use log::{error, info, warn};
use std::sync::Arc;

/// What happened to one uploaded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The body did not decode.
    Rejected,
    /// Decoded, no store configured.
    Logged,
    /// A reading with the same identity is already stored.
    Duplicate,
    Stored,
    StoreFailed,
}

/// Decodes uploaded bodies and hands the readings to the store.
pub struct TelemetryService {
    repository: Option<Arc<dyn ReadingRepository>>,
}

impl TelemetryService {
    pub fn new(repository: Option<Arc<dyn ReadingRepository>>) -> Self {
        Self { repository }
    }

    pub async fn handle_payload(&self, body: &[u8]) -> Disposition {
        let payload = String::from_utf8_lossy(body);

        let reading = match SensorReading::from_payload(&payload) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Error parsing data '{}': {}", payload, e);
                return Disposition::Rejected;
            }
        };

        match reading.to_json() {
            Ok(json) => info!("DATA: {}", json),
            Err(_) => info!("DATA: {}", reading),
        }

        match &self.repository {
            Some(repository) => self.save_reading(repository.as_ref(), &reading).await,
            None => Disposition::Logged,
        }
    }

    async fn save_reading(
        &self,
        repository: &dyn ReadingRepository,
        reading: &SensorReading,
    ) -> Disposition {
        match repository.exists(&reading.uuid()).await {
            Ok(true) => {
                warn!(
                    "Error adding to DB: uuid {} already exists",
                    reading.uuid()
                );
                return Disposition::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Error adding to DB: {}", e);
                return Disposition::StoreFailed;
            }
        }

        if let Err(e) = repository.insert(reading).await {
            error!("Error adding to DB: {}", e);
            return Disposition::StoreFailed;
        }

        Disposition::Stored
    }
}
