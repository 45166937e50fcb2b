//! Cycle-boundary detection and per-device accumulator ownership

use super::CycleAccumulator;
use crate::error::CycleError;
use crate::models::TelemetrySample;
use std::collections::HashMap;

/// Default bound on tracked devices. Beyond this the aggregator refuses new
/// devices rather than growing without limit.
pub const DEFAULT_MAX_DEVICES: usize = 1024;

/// A cycle that has been closed, either by a boundary or a flush. Handed
/// downstream by value; nothing else retains a reference to it.
#[derive(Debug, Clone)]
pub struct ClosedCycle {
    pub device_id: String,
    pub accumulator: CycleAccumulator,
}

impl ClosedCycle {
    pub fn cycle_id(&self) -> u64 {
        self.accumulator.cycle_id
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    open: Option<CycleAccumulator>,
    /// Highest cycle id observed for this device, open or closed.
    last_seen_cycle: Option<u64>,
}

/// Stateful accumulator map keyed by device id.
///
/// The aggregator is the sole writer of all open accumulators it holds; it
/// is a plain owned value so each deployment, worker, or test constructs its
/// own instance. Duplicate deliveries of a sample within an unchanged cycle
/// id accumulate twice: deduplication is the transport's concern when
/// exactly-once counting is needed.
#[derive(Debug)]
pub struct CycleAggregator {
    devices: HashMap<String, DeviceState>,
    max_devices: usize,
}

impl Default for CycleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleAggregator {
    pub fn new() -> Self {
        Self::with_max_devices(DEFAULT_MAX_DEVICES)
    }

    pub fn with_max_devices(max_devices: usize) -> Self {
        Self {
            devices: HashMap::new(),
            max_devices,
        }
    }

    /// Fold one sample into the device's open cycle.
    ///
    /// Returns `Ok(Some(closed))` when the sample's cycle id differs from
    /// the open accumulator's: the old cycle closes before the new one opens
    /// with this sample already folded in. A cycle id below the device's
    /// highest-seen id is rejected as [`CycleError::StaleCycle`] without
    /// mutating any state.
    pub fn ingest(&mut self, sample: TelemetrySample) -> Result<Option<ClosedCycle>, CycleError> {
        if !self.devices.contains_key(&sample.device_id) && self.devices.len() >= self.max_devices
        {
            return Err(CycleError::DeviceLimitExceeded {
                device_id: sample.device_id,
                limit: self.max_devices,
            });
        }

        let state = self.devices.entry(sample.device_id.clone()).or_default();

        if let Some(last_seen) = state.last_seen_cycle {
            if sample.cycle_id < last_seen {
                return Err(CycleError::StaleCycle {
                    device_id: sample.device_id,
                    cycle_id: sample.cycle_id,
                    last_seen,
                });
            }
        }

        state.last_seen_cycle = Some(sample.cycle_id);

        match state.open.take() {
            Some(mut open) if open.cycle_id == sample.cycle_id => {
                open.fold(&sample);
                state.open = Some(open);
                Ok(None)
            }
            previous => {
                // An id change closes the previous cycle; the transition
                // sample belongs to the new one.
                state.open = Some(CycleAccumulator::open(&sample));
                Ok(previous.map(|accumulator| ClosedCycle {
                    device_id: sample.device_id,
                    accumulator,
                }))
            }
        }
    }

    /// Force-close the device's open cycle, if any. Used at stream shutdown
    /// so a partially-accumulated cycle is not silently dropped.
    pub fn flush(&mut self, device_id: &str) -> Option<ClosedCycle> {
        let state = self.devices.get_mut(device_id)?;
        state.open.take().map(|accumulator| ClosedCycle {
            device_id: device_id.to_string(),
            accumulator,
        })
    }

    /// Force-close every open cycle across all tracked devices.
    pub fn flush_all(&mut self) -> Vec<ClosedCycle> {
        let device_ids: Vec<String> = self.devices.keys().cloned().collect();
        device_ids
            .into_iter()
            .filter_map(|id| self.flush(&id))
            .collect()
    }

    /// Number of devices currently tracked (with or without an open cycle).
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of currently open accumulators.
    pub fn open_cycle_count(&self) -> usize {
        self.devices.values().filter(|s| s.open.is_some()).count()
    }
}
