//! PTP clock correction.
//!
//! Offset correction, drift estimation and round-trip delay estimation.
//! Drift is kept as a fixed-point ratio scaled by 2^32, the format the
//! hardware clock speed adjustment consumes.

use crate::net::HardwareClock;

/// Largest round-trip delay accepted as a measurement (200 ms).
pub const MAX_PLAUSIBLE_RTT_NS: u32 = 200_000_000;

/// Largest drift magnitude considered plausible (≈ 1 % in 2^32 scale).
pub const MAX_PLAUSIBLE_DRIFT: i32 = 42_949_673;

/// Result of feeding one delay measurement into the [`RttEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RttUpdate {
    /// First plausible sample, taken as is.
    Initial(u32),
    /// Sample blended into the previous estimate.
    Smoothed(u32),
    /// Sample was negative or above [`MAX_PLAUSIBLE_RTT_NS`]; estimate reset.
    Discarded,
}

/// Round-trip delay estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RttEstimator {
    rtt_ns: u32,
}

impl RttEstimator {
    /// Current estimate in nanoseconds (0 = none).
    #[must_use]
    pub fn rtt_ns(&self) -> u32 {
        self.rtt_ns
    }

    /// Half the current estimate, the assumed one-way delay.
    #[must_use]
    pub fn half_rtt_ns(&self) -> u32 {
        self.rtt_ns / 2
    }

    /// Forget the current estimate.
    pub fn reset(&mut self) {
        self.rtt_ns = 0;
    }

    /// Feed one `Delay_Req` send / receive timestamp pair.
    ///
    /// `sent_ns` was captured on a clock already corrected by half the
    /// previous estimate, so that compensation is undone first.
    pub fn update(&mut self, sent_ns: u64, received_ns: u64) -> RttUpdate {
        let sent = i128::from(sent_ns) - i128::from(self.half_rtt_ns());
        let raw = i128::from(received_ns) - sent;
        let Some(raw) = u32::try_from(raw)
            .ok()
            .filter(|raw| *raw <= MAX_PLAUSIBLE_RTT_NS)
        else {
            tracing::debug!(raw_ns = %raw, "PTP client: RTT estimate not plausible, resetting it");
            self.rtt_ns = 0;
            return RttUpdate::Discarded;
        };
        if self.rtt_ns == 0 {
            self.rtt_ns = raw;
            return RttUpdate::Initial(raw);
        }
        // (3 * old + raw) / 4 stays below 4 * MAX_PLAUSIBLE_RTT_NS, well within u32
        let blended = (3 * u64::from(self.rtt_ns) + u64::from(raw)) / 4;
        self.rtt_ns = u32::try_from(blended).unwrap_or(MAX_PLAUSIBLE_RTT_NS);
        RttUpdate::Smoothed(self.rtt_ns)
    }
}

/// Result of one drift estimation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftUpdate {
    /// No previous sync to compare against (first sync, or RTT changed).
    Skipped,
    /// Ratio or smoothed drift out of range; drift reset to 0.
    Reset,
    /// First estimate after a reset, taken directly.
    Settled(i32),
    /// Ratio blended into the previous estimate with weight 1/8.
    Smoothed(i32),
}

/// Clock drift estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftEstimator {
    drift: i32,
    last_sync: u64,
}

impl DriftEstimator {
    /// Current drift estimate (2^32 scale).
    #[must_use]
    pub fn drift(&self) -> i32 {
        self.drift
    }

    /// Server time of the previous correction (0 = none).
    #[must_use]
    pub fn last_sync(&self) -> u64 {
        self.last_sync
    }

    /// Suppress the next drift estimate, e.g. because the delay baseline changed.
    pub fn invalidate(&mut self) {
        self.last_sync = 0;
    }

    /// Estimate drift from the offset that accumulated since the last sync.
    pub fn update(&mut self, offset_ns: i64, server_time_ns: u64) -> DriftUpdate {
        let previous = self.last_sync;
        self.last_sync = server_time_ns;
        if previous == 0 {
            return DriftUpdate::Skipped;
        }
        let elapsed = i128::from(server_time_ns) - i128::from(previous);
        if elapsed <= 0 {
            tracing::debug!(
                server_time_ns,
                previous,
                "PTP client: server time did not advance, skipping drift estimate"
            );
            return DriftUpdate::Skipped;
        }
        tracing::debug!(offset_ns, elapsed_ns = %elapsed, "PTP client: clock drifted");

        let ratio = (i128::from(offset_ns) << 32) / elapsed;
        let limit = i128::from(MAX_PLAUSIBLE_DRIFT);
        if !(-limit..=limit).contains(&ratio) {
            tracing::debug!(ratio = %ratio, "PTP client: clock drift not plausible, resetting it");
            self.drift = 0;
            return DriftUpdate::Reset;
        }
        if self.drift == 0 {
            // Take the first estimate as is to settle quickly after start.
            self.drift = i32::try_from(ratio).unwrap_or(0);
            return DriftUpdate::Settled(self.drift);
        }
        let smoothed = i128::from(self.drift) + ratio / 8;
        if !(-limit..=limit).contains(&smoothed) {
            tracing::debug!(smoothed = %smoothed, "PTP client: clock drift not plausible, resetting it");
            self.drift = 0;
            return DriftUpdate::Reset;
        }
        self.drift = i32::try_from(smoothed).unwrap_or(0);
        DriftUpdate::Smoothed(self.drift)
    }
}

/// Outcome of one clock correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    /// Offset applied with a clock step, including half the RTT.
    pub offset_ns: i64,
    /// What happened to the drift estimate.
    pub drift: DriftUpdate,
}

/// Offset and drift correction engine.
///
/// Owns the RTT and drift estimators because they are coupled: a new
/// delay estimate invalidates drift accounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockCorrection {
    rtt: RttEstimator,
    drift: DriftEstimator,
    speed_adjustment: bool,
}

impl ClockCorrection {
    /// Create an engine; `speed_adjustment` enables forwarding drift to the clock.
    #[must_use]
    pub fn new(speed_adjustment: bool) -> Self {
        Self {
            speed_adjustment,
            ..Self::default()
        }
    }

    /// Current RTT estimate in nanoseconds.
    #[must_use]
    pub fn rtt_ns(&self) -> u32 {
        self.rtt.rtt_ns()
    }

    /// Current drift estimate (2^32 scale).
    #[must_use]
    pub fn drift(&self) -> i32 {
        self.drift.drift()
    }

    /// Server time of the previous correction (0 = none).
    #[must_use]
    pub fn last_sync(&self) -> u64 {
        self.drift.last_sync()
    }

    /// Forget the RTT estimate (new server path).
    pub fn reset_rtt(&mut self) {
        self.rtt.reset();
    }

    /// Step `clock` to the server time and update the drift estimate.
    pub fn adjust<C: HardwareClock + ?Sized>(
        &mut self,
        clock: &mut C,
        server_time_ns: u64,
        local_time_ns: u64,
    ) -> Correction {
        let raw = i128::from(server_time_ns) - i128::from(local_time_ns)
            + i128::from(self.rtt.half_rtt_ns());
        let offset_ns = i64::try_from(raw).unwrap_or(if raw < 0 { i64::MIN } else { i64::MAX });
        clock.step(offset_ns);
        tracing::debug!(offset_ns, "PTP client: adjusted time");

        let drift = self.drift.update(offset_ns, server_time_ns);
        if self.speed_adjustment && drift != DriftUpdate::Skipped {
            clock.adjust_speed(self.drift.drift());
        }
        Correction { offset_ns, drift }
    }

    /// Feed a `Delay_Req` send / `Delay_Resp` receive pair into the RTT estimator.
    pub fn adjust_rtt(&mut self, sent_ns: u64, received_ns: u64) -> RttUpdate {
        let update = self.rtt.update(sent_ns, received_ns);
        // A changed delay baseline invalidates drift accounting.
        self.drift.invalidate();
        update
    }
}
