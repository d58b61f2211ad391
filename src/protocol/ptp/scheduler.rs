//! `Delay_Req` retry scheduling.
//!
//! Every re-arm adds up to ~1.05 s of random jitter so that many clients
//! on one network do not send their delay requests in lockstep.

use std::time::Duration;

use super::client::{PtpClient, SyncPhase};
use super::message::encode_delay_req;
use crate::net::{Endpoint, HardwareClock, RandomSource, Timer, Transport};

/// Mask applied to the random value to get the jitter in microseconds.
pub const JITTER_MASK_US: u32 = 0xF_FFFF;

/// Owns the single logical timer and its jitter source.
#[derive(Debug)]
pub struct RetryScheduler<M, R> {
    timer: M,
    random: R,
    interval: Duration,
    timeout: Duration,
}

impl<M: Timer, R: RandomSource> RetryScheduler<M, R> {
    /// Create a scheduler; the timer is left unarmed.
    pub fn new(timer: M, random: R, interval: Duration, timeout: Duration) -> Self {
        Self {
            timer,
            random,
            interval,
            timeout,
        }
    }

    /// Cancel the pending expiry and re-arm after `base` plus jitter.
    ///
    /// Returns the total delay that was armed.
    pub fn arm(&mut self, base: Duration) -> Duration {
        self.timer.cancel();
        let jitter = Duration::from_micros(u64::from(self.random.random_u32() & JITTER_MASK_US));
        let after = base + jitter;
        tracing::debug!("PTP client: next timeout in {:.6} s", after.as_secs_f64());
        self.timer.arm(after);
        after
    }

    /// Re-arm with the regular measurement interval.
    pub fn arm_interval(&mut self) -> Duration {
        self.arm(self.interval)
    }

    /// Re-arm with the response timeout.
    pub fn arm_timeout(&mut self) -> Duration {
        self.arm(self.timeout)
    }

    /// Regular measurement interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Response timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timer collaborator.
    pub fn timer(&self) -> &M {
        &self.timer
    }

    /// Timer collaborator, mutably.
    pub fn timer_mut(&mut self) -> &mut M {
        &mut self.timer
    }
}

impl<T, C, M, R> PtpClient<T, C, M, R>
where
    T: Transport,
    C: HardwareClock,
    M: Timer,
    R: RandomSource,
{
    /// Send a new `Delay_Req` and arm the matching timer.
    pub(super) fn send_delay_req(&mut self) {
        self.state.delay_req_sequence_id = self.state.delay_req_sequence_id.wrapping_add(1);
        let seq = self.state.delay_req_sequence_id;
        let request = encode_delay_req(self.local_identity, seq);

        match self.transport.send(Endpoint::Event, &request) {
            Err(e) => {
                tracing::error!(seq, "PTP client: error sending Delay_Req: {e}");
                self.status.record_send_failure();
                self.state.phase = SyncPhase::Idle;
                self.scheduler.arm_interval();
            }
            Ok(None) => {
                // Without the send time the response is useless.
                tracing::warn!(seq, "PTP client: no TX timestamp for Delay_Req");
                self.status.record_send_failure();
                self.state.phase = SyncPhase::Idle;
                self.scheduler.arm_interval();
            }
            Ok(Some(sent_ns)) => {
                tracing::debug!(seq, sent_ns, "PTP client: sent Delay_Req");
                self.state.time_last = sent_ns;
                self.state.phase = SyncPhase::WaitDelayResp;
                self.scheduler.arm_timeout();
            }
        }
    }
}
