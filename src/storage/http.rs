//! Remote storage backend (blocking HTTP GET)

use super::StorageError;
use std::io::Read;
use std::time::Duration;

/// Upper bound on a single asset download
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpStorage {
    timeout: Duration,
}

impl Default for HttpStorage {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HttpStorage {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn get(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();

        let response = agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(404, _) => StorageError::NotFound(url.to_string()),
            ureq::Error::Status(code, _) => {
                StorageError::Network(format!("{} returned status {}", url, code))
            }
            other => StorageError::Network(other.to_string()),
        })?;

        read_limited(response.into_reader(), MAX_BODY_BYTES)
            .map_err(|e| match e {
                StorageError::Network(msg) => StorageError::Network(format!("{}: {}", url, msg)),
                other => other,
            })
    }
}

/// Read a whole body, rejecting anything longer than `limit` bytes
fn read_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>, StorageError> {
    let mut data = Vec::new();
    // One byte past the limit tells a full body from a cut-off one
    reader.take(limit + 1).read_to_end(&mut data)?;
    if data.len() as u64 > limit {
        return Err(StorageError::Network(format!("body exceeds limit of {} bytes", limit)));
    }
    Ok(data)
}
