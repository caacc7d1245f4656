use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(Arc<str>);

impl BlobId {
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlobId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for BlobId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    #[error("blob {id} payload could not be produced: {message}")]
    Unavailable { id: BlobId, message: String },
}

type BlobProducer = Box<dyn FnOnce() -> Result<Vec<u8>, BlobError> + Send>;

struct BlobPayload {
    bytes: OnceLock<Result<Arc<[u8]>, BlobError>>,
    producer: Mutex<Option<BlobProducer>>,
}

/// Identity-bearing content of one region.
///
/// Two blobs are equal iff their ids are equal; payload bytes never take part in
/// comparison or hashing. Clones share the payload.
#[derive(Clone)]
pub struct Blob {
    id: BlobId,
    payload: Arc<BlobPayload>,
}

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_id(BlobId::generate(), bytes)
    }

    pub fn with_id(id: BlobId, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            payload: Arc::new(BlobPayload {
                bytes: OnceLock::from(Ok(bytes.into())),
                producer: Mutex::new(None),
            }),
        }
    }

    /// Creates a blob whose bytes are produced on first access. The producer
    /// runs at most once; its result (success or failure) is kept.
    pub fn deferred(
        id: BlobId,
        producer: impl FnOnce() -> Result<Vec<u8>, BlobError> + Send + 'static,
    ) -> Self {
        Self {
            id,
            payload: Arc::new(BlobPayload {
                bytes: OnceLock::new(),
                producer: Mutex::new(Some(Box::new(producer))),
            }),
        }
    }

    pub fn id(&self) -> &BlobId {
        &self.id
    }

    pub fn is_resolved(&self) -> bool {
        self.payload.bytes.get().is_some()
    }

    pub fn bytes(&self) -> Result<Arc<[u8]>, BlobError> {
        self.payload
            .bytes
            .get_or_init(|| {
                let producer = self
                    .payload
                    .producer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .expect("blob payload is produced once");
                producer().map(Arc::from)
            })
            .clone()
    }

    /// Bytes for consumers that cannot recover from a missing payload.
    pub fn expect_bytes(&self) -> Arc<[u8]> {
        self.bytes()
            .unwrap_or_else(|error| panic!("blob payload required: {error}"))
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Blob {}

impl Hash for Blob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = formatter.debug_struct("Blob");
        debug.field("id", &self.id);
        match self.payload.bytes.get() {
            Some(Ok(bytes)) => debug.field("len", &bytes.len()),
            Some(Err(error)) => debug.field("error", error),
            None => debug.field("deferred", &true),
        };
        debug.finish()
    }
}
