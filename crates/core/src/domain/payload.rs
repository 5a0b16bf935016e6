// Message Payload

use super::error::{DomainError, Result};
use rand::Rng;
use std::ops::RangeInclusive;

/// Byte values a payload may be filled with ('A' through '[')
pub const PAYLOAD_BYTE_RANGE: RangeInclusive<u8> = 65..=91;

/// Fixed message body of one endpoint
///
/// Generated once at endpoint construction and published unchanged on every
/// publish: a single random byte repeated a random number of times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    /// Generate a payload whose length is uniform in `[min_bytes, max_bytes]`
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, min_bytes: usize, max_bytes: usize) -> Result<Self> {
        if min_bytes > max_bytes {
            return Err(DomainError::InvalidPayloadSize {
                min: min_bytes,
                max: max_bytes,
            });
        }
        let fill = rng.gen_range(PAYLOAD_BYTE_RANGE);
        let len = rng.gen_range(min_bytes..=max_bytes);
        Ok(Self {
            bytes: vec![fill; len],
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}
