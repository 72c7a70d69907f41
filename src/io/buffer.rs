use crate::{DiskRampError, Result};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// In-memory workload written repeatedly by every writer of a benchmark run.
///
/// Generated once, possibly shrunk by calibration, then shared read-only.
#[derive(Debug, Clone)]
pub struct WorkloadBuffer {
    data: Vec<u8>,
}

impl WorkloadBuffer {
    /// Allocate `size` bytes and fill them with pseudo-random data
    pub fn generate_random(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| DiskRampError::AllocationError { requested: size })?;
        data.resize(size, 0);

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        SmallRng::seed_from_u64(seed).fill_bytes(&mut data);

        Ok(Self { data })
    }

    /// Shrink the buffer to `new_size` bytes. Never grows; returns the resulting length.
    pub fn resize_to(&mut self, new_size: usize) -> usize {
        if new_size < self.data.len() {
            self.data.truncate(new_size);
            self.data.shrink_to_fit();
        }
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for WorkloadBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
