//! Shared PWM time base.
//!
//! One [`PulseTimer`] drives the comparators of every leg bound to it, keeping
//! all converter legs phase-locked. The period is fixed for the timer's
//! lifetime; changing it would invalidate every dependent duty value.

use fugit::{HertzU32, NanosDurationU32};

use crate::error::Error;
use crate::hal::PwmHal;

/// Pulse timer parameters, prior to hardware allocation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct TimerConfig {
    pub group: u8,
    pub tick_rate: HertzU32,
    pub period_ticks: u32,
}

impl TimerConfig {
    /// Allocate and enable the hardware counter.
    pub fn init<H: PwmHal>(self, hal: &mut H) -> Result<PulseTimer<H>, Error<H::Error>> {
        let timer = hal
            .alloc_timer(self.group, self.tick_rate.raw(), self.period_ticks)
            .ok_or(Error::PeripheralExhausted)?;
        hal.enable_timer(timer).map_err(Error::Hardware)?;

        Ok(PulseTimer {
            group: self.group,
            tick_rate: self.tick_rate,
            period_ticks: self.period_ticks,
            timer,
        })
    }
}

/// A live, enabled PWM time base.
pub struct PulseTimer<H: PwmHal> {
    group: u8,
    tick_rate: HertzU32,
    period_ticks: u32,
    timer: H::Timer,
}

impl<H: PwmHal> PulseTimer<H> {
    pub fn start(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        hal.start_timer(self.timer).map_err(Error::Hardware)
    }

    pub fn stop(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        hal.stop_timer(self.timer).map_err(Error::Hardware)
    }

    /// Convert a duration to timer ticks, truncating toward zero. Callers
    /// doing duty math must round explicitly.
    pub fn ticks_for(&self, duration: NanosDurationU32) -> u32 {
        (u64::from(duration.ticks()) * u64::from(self.tick_rate.raw()) / 1_000_000_000) as u32
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    pub fn group(&self) -> u8 {
        self.group
    }

    pub(crate) fn handle(&self) -> H::Timer {
        self.timer
    }

    /// Disable and release the hardware counter. Legs bound to this timer
    /// must be deinitialized first.
    pub fn deinit(self, hal: &mut H) -> Result<(), Error<H::Error>> {
        hal.disable_timer(self.timer).map_err(Error::Hardware)?;
        hal.free_timer(self.timer);
        Ok(())
    }
}
