//! Two-stage buck/boost topology selector.

use crate::error::Error;
use crate::hal::PwmHal;
use crate::leg::SwitchLeg;

/// Composite converter: a step-down stage followed by a step-up stage.
///
/// Carries no state of its own beyond the two legs; [`BuckBoost::set_ratio`]
/// is a pure function of its input and the current leg state and is safe to
/// call at control-loop rate.
pub struct BuckBoost<H: PwmHal> {
    buck: SwitchLeg<H>,
    boost: SwitchLeg<H>,
}

impl<H: PwmHal> BuckBoost<H> {
    /// Compose an initialized step-down and step-up leg.
    pub fn new(buck: SwitchLeg<H>, boost: SwitchLeg<H>) -> Self {
        Self { buck, boost }
    }

    /// Apply an output/input voltage ratio.
    ///
    /// The ratio saturates at `[0, 10]` by design margin; values above 10 are
    /// clamped, not rejected. Unity gain holds both legs fully conductive to
    /// eliminate switching loss; below unity the boost stage passes and the
    /// buck stage modulates at `duty = ratio`; above unity the buck stage
    /// passes and the boost stage modulates at `duty = 1 − 1/ratio`.
    #[allow(clippy::float_cmp)]
    pub fn set_ratio(&mut self, hal: &mut H, ratio: f32) -> Result<(), Error<H::Error>> {
        let ratio = ratio.clamp(0.0, 10.0);

        if ratio == 1.0 {
            self.force_pass(hal)
        } else if ratio < 1.0 {
            self.boost.force_pass(hal)?;
            self.buck.set_duty(hal, ratio)
        } else {
            self.buck.force_pass(hal)?;
            self.boost.set_duty(hal, 1.0 - 1.0 / ratio)
        }
    }

    /// Force both legs non-conductive.
    pub fn force_off(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        self.buck.force_off(hal)?;
        self.boost.force_off(hal)
    }

    /// Force both legs fully conductive (unity passthrough).
    pub fn force_pass(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        self.buck.force_pass(hal)?;
        self.boost.force_pass(hal)
    }

    /// Force both legs free-wheeling.
    pub fn force_freewheel(&mut self, hal: &mut H) -> Result<(), Error<H::Error>> {
        self.buck.force_freewheel(hal)?;
        self.boost.force_freewheel(hal)
    }

    pub fn buck(&self) -> &SwitchLeg<H> {
        &self.buck
    }

    pub fn boost(&self) -> &SwitchLeg<H> {
        &self.boost
    }

    /// Tear down both legs, step-up stage first (reverse of bring-up).
    pub fn deinit(self, hal: &mut H) -> Result<(), Error<H::Error>> {
        self.boost.deinit(hal)?;
        self.buck.deinit(hal)
    }
}
