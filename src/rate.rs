//! Counter-to-rate derivation over two time-separated walks.

use crate::error::{ClockError, Error};
use crate::oid::OidPath;
use crate::snmp::{Session, WalkResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Derived throughput of one table row
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    BitsPerSecond(f64),
    /// The counter went down between samples (device reboot or wrap)
    CounterReset,
}

impl Rate {
    pub fn bits_per_second(&self) -> Option<f64> {
        match self {
            Rate::BitsPerSecond(bps) => Some(*bps),
            Rate::CounterReset => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub index: u32,
    pub rate: Rate,
}

/// Per-index octet-counter rates in bits per second.
///
/// Only indexes present in both walks with numeric values are reported, in
/// the order of `before`. Fails before producing anything if `elapsed_secs`
/// is not strictly positive.
pub fn compute_rates(
    before: &WalkResult,
    after: &WalkResult,
    elapsed_secs: f64,
) -> Result<Vec<RateSample>, ClockError> {
    if elapsed_secs.is_nan() || elapsed_secs <= 0.0 {
        return Err(ClockError { elapsed_secs });
    }

    let mut later: HashMap<u32, u64> = HashMap::with_capacity(after.len());
    for binding in after {
        if let (Some(index), Some(value)) = (binding.oid.table_index(), binding.value.as_counter())
        {
            later.entry(index).or_insert(value);
        }
    }

    let mut samples = Vec::with_capacity(before.len().min(later.len()));
    for binding in before {
        let Some(index) = binding.oid.table_index() else {
            continue;
        };
        let Some(first) = binding.value.as_counter() else {
            continue;
        };
        let Some(&second) = later.get(&index) else {
            continue;
        };

        let rate = if second < first {
            tracing::debug!("Counter reset on index {}: {} -> {}", index, first, second);
            Rate::CounterReset
        } else {
            Rate::BitsPerSecond((second - first) as f64 * 8.0 / elapsed_secs)
        };
        samples.push(RateSample { index, rate });
    }

    Ok(samples)
}

/// One walk of a counter column, stamped when the walk completed.
#[derive(Debug, Clone)]
pub struct CounterSample {
    pub walk: WalkResult,
    pub taken_at: Instant,
}

impl CounterSample {
    pub async fn take(session: &Session, root: &OidPath) -> Self {
        let walk = session.walk(root).await;
        Self {
            walk,
            taken_at: Instant::now(),
        }
    }

    /// Rates from `before` to this sample, using the measured time between
    /// the two walks.
    pub fn rates_since(&self, before: &CounterSample) -> Result<Vec<RateSample>, ClockError> {
        let elapsed = self
            .taken_at
            .checked_duration_since(before.taken_at)
            .unwrap_or(Duration::ZERO);
        compute_rates(&before.walk, &self.walk, elapsed.as_secs_f64())
    }
}

/// Takes before/after samples of counter columns around a cancellable wait.
#[derive(Debug, Clone, Copy)]
pub struct RateSampler {
    interval: Duration,
}

impl RateSampler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Rates for each of `roots`, in the same order.
    pub async fn sample(
        &self,
        session: &Session,
        roots: &[OidPath],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<RateSample>>, Error> {
        let mut before = Vec::with_capacity(roots.len());
        for root in roots {
            before.push(CounterSample::take(session, root).await);
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Sampling on {} cancelled", session.target());
                return Err(Error::Cancelled);
            }
            _ = tokio::time::sleep(self.interval) => {}
        }

        let mut rates = Vec::with_capacity(roots.len());
        for (root, first) in roots.iter().zip(&before) {
            let second = CounterSample::take(session, root).await;
            rates.push(second.rates_since(first)?);
        }

        Ok(rates)
    }
}
