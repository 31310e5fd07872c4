//! Half-bridge switching leg.
//!
//! A leg owns one hardware operator bound to the shared [`PulseTimer`], one or
//! two duty comparators and one or two gate generators. The dominant switch is
//! the modulated one; the optional recessive switch provides synchronous
//! rectification and is kept clear of the dominant on-window by a
//! `2 × dead-time` comparator offset plus the hardware dead-time block.
//! Without a recessive pin the leg runs single-switch, diode-commutated, and
//! the whole recessive path is skipped.
//!
//! For a step-down leg the modulated switch is the high-side transistor; for a
//! step-up leg it is the low-side one. The constructors capture that role so
//! forced output states can be expressed in physical high/low terms.

use fugit::NanosDurationU32;

use crate::error::Error;
use crate::hal::{Level, PwmHal};
use crate::pulse::PulseTimer;

/// Which converter stage the leg implements.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LegRole {
    /// Buck stage: dominant switch is the high-side transistor.
    StepDown,
    /// Boost stage: dominant switch is the low-side transistor.
    StepUp,
}

/// Output-mode state of a live leg.
///
/// A freshly initialized leg starts in [`LegMode::ForcedOff`]; it never enters
/// `Normal` with stale duty values. The pre-init state is encoded in the type
/// system: only [`LegConfig::init`] produces a [`SwitchLeg`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LegMode {
    /// Comparator-driven PWM operation.
    Normal,
    /// High-side continuously conductive; the leg is a closed switch.
    ForcedPass,
    /// Low-side continuously conductive; current recirculates.
    ForcedFreewheel,
    /// Both switches non-conductive.
    ForcedOff,
}

/// Leg parameters, prior to hardware allocation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug)]
pub struct LegConfig {
    role: LegRole,
    pin_dominant: u8,
    pin_recessive: Option<u8>,
    dead_time: NanosDurationU32,
}

impl LegConfig {
    /// Buck stage: `switch_pin` drives the high-side transistor,
    /// `rectifier_pin` the optional low-side synchronous rectifier.
    pub fn step_down(
        switch_pin: u8,
        rectifier_pin: Option<u8>,
        dead_time: NanosDurationU32,
    ) -> Self {
        Self {
            role: LegRole::StepDown,
            pin_dominant: switch_pin,
            pin_recessive: rectifier_pin,
            dead_time,
        }
    }

    /// Boost stage: `switch_pin` drives the low-side transistor,
    /// `rectifier_pin` the optional high-side synchronous rectifier.
    pub fn step_up(switch_pin: u8, rectifier_pin: Option<u8>, dead_time: NanosDurationU32) -> Self {
        Self {
            role: LegRole::StepUp,
            pin_dominant: switch_pin,
            pin_recessive: rectifier_pin,
            dead_time,
        }
    }

    /// Allocate and wire the leg's hardware, leaving both outputs forced off.
    ///
    /// Acquisition order is operator, comparators, generators; event actions
    /// and the dead-time block are programmed last. Fails with
    /// [`Error::PeripheralExhausted`] when the pool runs dry and
    /// [`Error::InvalidPin`] when a configured pin cannot drive an output.
    pub fn init<H: PwmHal>(
        self,
        hal: &mut H,
        timer: &PulseTimer<H>,
    ) -> Result<SwitchLeg<H>, Error<H::Error>> {
        if !hal.is_output_pin(self.pin_dominant) {
            return Err(Error::InvalidPin(self.pin_dominant));
        }
        if let Some(pin) = self.pin_recessive {
            if !hal.is_output_pin(pin) {
                return Err(Error::InvalidPin(pin));
            }
        }

        let oper = hal
            .alloc_operator(timer.group())
            .ok_or(Error::PeripheralExhausted)?;
        hal.connect_operator(oper, timer.handle())
            .map_err(Error::Hardware)?;

        let cmpr_d = hal.alloc_comparator(oper).ok_or(Error::PeripheralExhausted)?;
        let cmpr_r = match self.pin_recessive {
            Some(_) => Some(hal.alloc_comparator(oper).ok_or(Error::PeripheralExhausted)?),
            None => None,
        };

        let gen_d = hal
            .alloc_generator(oper, self.pin_dominant)
            .ok_or(Error::PeripheralExhausted)?;
        let gen_r = match self.pin_recessive {
            Some(pin) => Some(
                hal.alloc_generator(oper, pin)
                    .ok_or(Error::PeripheralExhausted)?,
            ),
            None => None,
        };

        // Dominant: high from period start until its comparator matches.
        // Recessive: the near-inverse, gated by its own comparator.
        hal.set_generator_actions(gen_d, Level::High, cmpr_d, Level::Low)
            .map_err(Error::Hardware)?;
        if let (Some(generator), Some(cmpr)) = (gen_r, cmpr_r) {
            hal.set_generator_actions(generator, Level::Low, cmpr, Level::High)
                .map_err(Error::Hardware)?;
        }

        let deadtime_ticks = timer.ticks_for(self.dead_time);
        hal.set_dead_time(gen_d, gen_d, deadtime_ticks, deadtime_ticks, false)
            .map_err(Error::Hardware)?;

        // Safe default: outputs held low until the first set_duty.
        hal.force_level(gen_d, Level::Low).map_err(Error::Hardware)?;
        if let Some(generator) = gen_r {
            hal.force_level(generator, Level::Low).map_err(Error::Hardware)?;
        }

        Ok(SwitchLeg {
            role: self.role,
            deadtime_ticks,
            period_ticks: timer.period_ticks(),
            duty_dominant: 0,
            mode: LegMode::ForcedOff,
            oper,
            cmpr_d,
            gen_d,
            sync_rect: cmpr_r.zip(gen_r).map(|(cmpr, generator)| SyncRect {
                cmpr,
                generator,
                duty: 0,
            }),
        })
    }
}

/// Synchronous-rectifier path of a leg.
struct SyncRect<H: PwmHal> {
    cmpr: H::Comparator,
    generator: H::Generator,
    duty: u32,
}

/// A live half-bridge leg.
pub struct SwitchLeg<H: PwmHal> {
    role: LegRole,
    deadtime_ticks: u32,
    period_ticks: u32,
    duty_dominant: u32,
    mode: LegMode,
    oper: H::Operator,
    cmpr_d: H::Comparator,
    gen_d: H::Generator,
    sync_rect: Option<SyncRect<H>>,
}

impl<H: PwmHal> SwitchLeg<H> {
    /// Program a new duty cycle, `ratio ∈ [0, 1]`, and return to
    /// comparator-driven operation.
    ///
    /// The recessive comparator is offset from the dominant one by
    /// `2 × dead-time` ticks and clamped to the period; a compare value equal
    /// to the period never fires, so the clamped case holds the recessive
    /// switch off rather than wrapping.
    ///
    /// Commit order is significant: a rising duty widens the dominant
    /// on-window, so the recessive comparator is pushed out first; a falling
    /// duty narrows it, so the dominant comparator shrinks first. Combined
    /// with the update-on-empty latch this keeps the two commanded on-windows
    /// disjoint in every cycle of a duty change.
    pub fn set_duty(&mut self, hal: &mut H, ratio: f32) -> Result<(), Error<H::Error>> {
        debug_assert!((0.0..=1.0).contains(&ratio));
        let ratio = ratio.clamp(0.0, 1.0);

        let duty_d = round_duty(ratio, self.period_ticks);
        let duty_r = (duty_d + 2 * self.deadtime_ticks).min(self.period_ticks);
        let rising = duty_d > self.duty_dominant;

        if rising {
            if let Some(sr) = &mut self.sync_rect {
                hal.set_compare(sr.cmpr, duty_r).map_err(Error::Hardware)?;
                sr.duty = duty_r;
            }
        }
        hal.set_compare(self.cmpr_d, duty_d).map_err(Error::Hardware)?;
        self.duty_dominant = duty_d;
        if !rising {
            if let Some(sr) = &mut self.sync_rect {
                hal.set_compare(sr.cmpr, duty_r).map_err(Error::Hardware)?;
                sr.duty = duty_r;
            }
        }

        self.unforce(hal)
    }

    /// Hold the leg fully conductive: high-side on, low-side off.
    /// No-op when already in [`LegMode::ForcedPass`].
    pub fn force_pass(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        if self.mode == LegMode::ForcedPass {
            return Ok(());
        }
        let (high, low) = self.gens_high_low();
        if let Some(generator) = low {
            hal.force_level(generator, Level::Low).map_err(Error::Hardware)?;
        }
        if let Some(generator) = high {
            hal.force_level(generator, Level::High).map_err(Error::Hardware)?;
        }
        self.mode = LegMode::ForcedPass;
        Ok(())
    }

    /// Hold the leg free-wheeling: high-side off, low-side on.
    /// No-op when already in [`LegMode::ForcedFreewheel`].
    pub fn force_freewheel(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        if self.mode == LegMode::ForcedFreewheel {
            return Ok(());
        }
        let (high, low) = self.gens_high_low();
        if let Some(generator) = high {
            hal.force_level(generator, Level::Low).map_err(Error::Hardware)?;
        }
        if let Some(generator) = low {
            hal.force_level(generator, Level::High).map_err(Error::Hardware)?;
        }
        self.mode = LegMode::ForcedFreewheel;
        Ok(())
    }

    /// Hold both switches non-conductive.
    /// No-op when already in [`LegMode::ForcedOff`].
    pub fn force_off(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        if self.mode == LegMode::ForcedOff {
            return Ok(());
        }
        hal.force_level(self.gen_d, Level::Low).map_err(Error::Hardware)?;
        if let Some(sr) = &self.sync_rect {
            hal.force_level(sr.generator, Level::Low).map_err(Error::Hardware)?;
        }
        self.mode = LegMode::ForcedOff;
        Ok(())
    }

    /// Return to comparator-driven operation with the last committed duty.
    /// No-op when already in [`LegMode::Normal`].
    pub fn unforce(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        if self.mode == LegMode::Normal {
            return Ok(());
        }
        hal.release_force(self.gen_d).map_err(Error::Hardware)?;
        if let Some(sr) = &self.sync_rect {
            hal.release_force(sr.generator).map_err(Error::Hardware)?;
        }
        self.mode = LegMode::Normal;
        Ok(())
    }

    pub fn mode(&self) -> LegMode {
        self.mode
    }

    pub fn role(&self) -> LegRole {
        self.role
    }

    /// Last committed comparator values, dominant and (if present) recessive.
    pub fn duty_ticks(&self) -> (u32, Option<u32>) {
        (self.duty_dominant, self.sync_rect.as_ref().map(|sr| sr.duty))
    }

    pub fn deadtime_ticks(&self) -> u32 {
        self.deadtime_ticks
    }

    /// Force outputs off and release generators, comparators and the
    /// operator, in reverse order of acquisition.
    pub fn deinit(mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        self.force_off(hal)?;

        let sync_rect = self.sync_rect.take();
        hal.free_generator(self.gen_d);
        if let Some(sr) = &sync_rect {
            hal.free_generator(sr.generator);
        }
        hal.free_comparator(self.cmpr_d);
        if let Some(sr) = &sync_rect {
            hal.free_comparator(sr.cmpr);
        }
        hal.free_operator(self.oper);
        Ok(())
    }

    /// Generators by physical position, (high-side, low-side).
    fn gens_high_low(&self) -> (Option<H::Generator>, Option<H::Generator>) {
        let recessive = self.sync_rect.as_ref().map(|sr| sr.generator);
        match self.role {
            LegRole::StepDown => (Some(self.gen_d), recessive),
            LegRole::StepUp => (recessive, Some(self.gen_d)),
        }
    }
}

/// Round-half-up without pulling in libm; `ratio` is non-negative.
fn round_duty(ratio: f32, period_ticks: u32) -> u32 {
    ((ratio * period_ticks as f32 + 0.5) as u32).min(period_ticks)
}
