// Licensed under the Apache-2.0 license

use std::time::Duration;

/// Tunables applied to every engine instance owned by a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Interval between two reads of the completion bit.
    pub poll_interval: Duration,

    /// How long to wait for the completion bit before giving up.
    pub completion_timeout: Duration,

    /// How many times a full descriptor FIFO is polled before giving up.
    pub fifo_poll_limit: u32,

    /// DMA burst length programmed into SWAP_CFG.
    pub burst_len: u8,

    /// Enables the data swap unit.
    pub data_swap: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(10),
            completion_timeout: Duration::from_millis(50),
            fifo_poll_limit: 10_000,
            burst_len: 4,
            data_swap: true,
        }
    }
}
