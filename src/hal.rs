//! Hardware capability set consumed by the converter core.
//!
//! This mirrors the MCPWM-class peripheral model: a free-running up-counting
//! timer per group, operators connected to it, tick-valued comparators, and
//! gate generators with configurable event actions, a dead-time block and a
//! force-level override. A firmware target implements [`PwmHal`] over its
//! vendor driver; the `tests/` directory implements it over an instrumented
//! mock.

/// Logic level driven by a generator, either on an event or as a forced
/// override.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// Abstract MCPWM-style peripheral capability.
///
/// Allocation methods return `None` when the hardware pool is exhausted;
/// runtime operations return the target's own error type. Handles are plain
/// copyable identifiers; ownership and release order are the caller's
/// responsibility, and releasing a handle out of order is a programming error
/// on the implementation side, not a recoverable fault.
///
/// Implementations must configure comparators to latch a newly written compare
/// value at the next period start (update on timer-empty). The leg's duty
/// commit ordering relies on that latch semantics.
pub trait PwmHal {
    type Error: core::fmt::Debug;
    type Timer: Copy;
    type Operator: Copy;
    type Comparator: Copy;
    type Generator: Copy;

    /// Whether `pin` can be driven as an output.
    fn is_output_pin(&self, pin: u8) -> bool;

    /// Allocate a free-running up-counter in `group` running at `tick_hz`
    /// with a fixed period of `period_ticks`.
    fn alloc_timer(&mut self, group: u8, tick_hz: u32, period_ticks: u32) -> Option<Self::Timer>;
    fn enable_timer(&mut self, timer: Self::Timer) -> Result<(), Self::Error>;
    fn disable_timer(&mut self, timer: Self::Timer) -> Result<(), Self::Error>;
    fn start_timer(&mut self, timer: Self::Timer) -> Result<(), Self::Error>;
    fn stop_timer(&mut self, timer: Self::Timer) -> Result<(), Self::Error>;
    fn free_timer(&mut self, timer: Self::Timer);

    fn alloc_operator(&mut self, group: u8) -> Option<Self::Operator>;
    fn connect_operator(
        &mut self,
        oper: Self::Operator,
        timer: Self::Timer,
    ) -> Result<(), Self::Error>;
    fn free_operator(&mut self, oper: Self::Operator);

    /// Allocate a comparator on `oper`, latching compare updates on
    /// timer-empty.
    fn alloc_comparator(&mut self, oper: Self::Operator) -> Option<Self::Comparator>;
    fn set_compare(&mut self, cmpr: Self::Comparator, ticks: u32) -> Result<(), Self::Error>;
    fn free_comparator(&mut self, cmpr: Self::Comparator);

    fn alloc_generator(&mut self, oper: Self::Operator, pin: u8) -> Option<Self::Generator>;
    /// Wire the generator: drive `on_period_start` when the counter wraps to
    /// zero, drive `on_compare` when `cmpr` matches.
    fn set_generator_actions(
        &mut self,
        generator: Self::Generator,
        on_period_start: Level,
        cmpr: Self::Comparator,
        on_compare: Level,
    ) -> Result<(), Self::Error>;
    /// Program the dead-time block delaying `target`'s edges relative to
    /// `source` by the given tick counts.
    fn set_dead_time(
        &mut self,
        source: Self::Generator,
        target: Self::Generator,
        rising_ticks: u32,
        falling_ticks: u32,
        invert_output: bool,
    ) -> Result<(), Self::Error>;
    /// Override the generator to a fixed level, bypassing the comparators.
    fn force_level(&mut self, generator: Self::Generator, level: Level)
    -> Result<(), Self::Error>;
    /// Return the generator to comparator-driven operation.
    fn release_force(&mut self, generator: Self::Generator) -> Result<(), Self::Error>;
    fn free_generator(&mut self, generator: Self::Generator);
}
