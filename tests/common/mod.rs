//! Instrumented mock hardware shared by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use fugit::{ExtU32, RateExtU32};
use sync_buckboost::control::{ChannelIo, Clock, Heartbeat};
use sync_buckboost::hal::{Level, PwmHal};
use sync_buckboost::program::InputBank;
use sync_buckboost::{BuckBoost, Error, LegConfig, PulseTimer, TimerConfig};

/// Tick rate and period matching the reference hardware: 160 MHz clock,
/// 100 kHz PWM, so 1600 ticks per cycle; 50 ns dead time is 8 ticks.
pub const TICK_HZ: u32 = 160_000_000;
pub const PERIOD_TICKS: u32 = 1600;
pub const DEADTIME_TICKS: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockError;

/// Every observable hardware side effect, in call order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HwCall {
    TimerEnable(u8),
    TimerDisable(u8),
    TimerStart(u8),
    TimerStop(u8),
    Connect { oper: u8, timer: u8 },
    Actions { generator: u8, on_period_start: Level, cmpr: u8, on_compare: Level },
    DeadTime { source: u8, target: u8, rising: u32, falling: u32, invert: bool },
    SetCompare { cmpr: u8, ticks: u32 },
    Force { generator: u8, level: Level },
    ReleaseForce { generator: u8 },
    FreeTimer(u8),
    FreeOperator(u8),
    FreeComparator(u8),
    FreeGenerator(u8),
}

/// Call-recording `PwmHal` with configurable allocation limits, invalid pins
/// and runtime fault injection.
#[derive(Default)]
pub struct MockPwm {
    pub calls: Vec<HwCall>,
    pub timers: u8,
    pub operators: u8,
    pub comparators: u8,
    pub generators: u8,
    pub comparator_limit: Option<u8>,
    pub generator_limit: Option<u8>,
    pub operator_limit: Option<u8>,
    pub invalid_pins: Vec<u8>,
    /// Pin each generator was bound to, indexed by generator id.
    pub generator_pins: Vec<u8>,
    /// When set, every runtime operation fails.
    pub fail_runtime: bool,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    fn runtime(&mut self, call: HwCall) -> Result<(), MockError> {
        if self.fail_runtime {
            return Err(MockError);
        }
        self.calls.push(call);
        Ok(())
    }

    /// Number of recorded calls, for write-count assertions.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Recorded compare writes, in order.
    pub fn compare_writes(&self) -> Vec<(u8, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::SetCompare { cmpr, ticks } => Some((*cmpr, *ticks)),
                _ => None,
            })
            .collect()
    }
}

impl PwmHal for MockPwm {
    type Error = MockError;
    type Timer = u8;
    type Operator = u8;
    type Comparator = u8;
    type Generator = u8;

    fn is_output_pin(&self, pin: u8) -> bool {
        !self.invalid_pins.contains(&pin)
    }

    fn alloc_timer(&mut self, _group: u8, _tick_hz: u32, _period_ticks: u32) -> Option<u8> {
        let id = self.timers;
        self.timers += 1;
        Some(id)
    }

    fn enable_timer(&mut self, timer: u8) -> Result<(), MockError> {
        self.runtime(HwCall::TimerEnable(timer))
    }

    fn disable_timer(&mut self, timer: u8) -> Result<(), MockError> {
        self.runtime(HwCall::TimerDisable(timer))
    }

    fn start_timer(&mut self, timer: u8) -> Result<(), MockError> {
        self.runtime(HwCall::TimerStart(timer))
    }

    fn stop_timer(&mut self, timer: u8) -> Result<(), MockError> {
        self.runtime(HwCall::TimerStop(timer))
    }

    fn free_timer(&mut self, timer: u8) {
        self.calls.push(HwCall::FreeTimer(timer));
    }

    fn alloc_operator(&mut self, _group: u8) -> Option<u8> {
        if self.operator_limit.is_some_and(|limit| self.operators >= limit) {
            return None;
        }
        let id = self.operators;
        self.operators += 1;
        Some(id)
    }

    fn connect_operator(&mut self, oper: u8, timer: u8) -> Result<(), MockError> {
        self.runtime(HwCall::Connect { oper, timer })
    }

    fn free_operator(&mut self, oper: u8) {
        self.calls.push(HwCall::FreeOperator(oper));
    }

    fn alloc_comparator(&mut self, _oper: u8) -> Option<u8> {
        if self
            .comparator_limit
            .is_some_and(|limit| self.comparators >= limit)
        {
            return None;
        }
        let id = self.comparators;
        self.comparators += 1;
        Some(id)
    }

    fn set_compare(&mut self, cmpr: u8, ticks: u32) -> Result<(), MockError> {
        self.runtime(HwCall::SetCompare { cmpr, ticks })
    }

    fn free_comparator(&mut self, cmpr: u8) {
        self.calls.push(HwCall::FreeComparator(cmpr));
    }

    fn alloc_generator(&mut self, _oper: u8, pin: u8) -> Option<u8> {
        if self
            .generator_limit
            .is_some_and(|limit| self.generators >= limit)
        {
            return None;
        }
        let id = self.generators;
        self.generators += 1;
        self.generator_pins.push(pin);
        Some(id)
    }

    fn set_generator_actions(
        &mut self,
        generator: u8,
        on_period_start: Level,
        cmpr: u8,
        on_compare: Level,
    ) -> Result<(), MockError> {
        self.runtime(HwCall::Actions {
            generator,
            on_period_start,
            cmpr,
            on_compare,
        })
    }

    fn set_dead_time(
        &mut self,
        source: u8,
        target: u8,
        rising_ticks: u32,
        falling_ticks: u32,
        invert_output: bool,
    ) -> Result<(), MockError> {
        self.runtime(HwCall::DeadTime {
            source,
            target,
            rising: rising_ticks,
            falling: falling_ticks,
            invert: invert_output,
        })
    }

    fn force_level(&mut self, generator: u8, level: Level) -> Result<(), MockError> {
        self.runtime(HwCall::Force { generator, level })
    }

    fn release_force(&mut self, generator: u8) -> Result<(), MockError> {
        self.runtime(HwCall::ReleaseForce { generator })
    }

    fn free_generator(&mut self, generator: u8) {
        self.calls.push(HwCall::FreeGenerator(generator));
    }
}

/// Reference pin assignment, mirroring the target board.
pub const BUCK_HIGH: u8 = 25;
pub const BUCK_LOW: u8 = 26;
pub const BOOST_LOW: u8 = 32;
pub const BOOST_HIGH: u8 = 33;

pub fn pulse_timer(hal: &mut MockPwm) -> PulseTimer<MockPwm> {
    TimerConfig {
        group: 0,
        tick_rate: TICK_HZ.Hz(),
        period_ticks: PERIOD_TICKS,
    }
    .init(hal)
    .expect("timer init")
}

/// Full two-leg converter with 8-tick dead time on both legs.
pub fn converter(hal: &mut MockPwm) -> (PulseTimer<MockPwm>, BuckBoost<MockPwm>) {
    let timer = pulse_timer(hal);
    let buck = LegConfig::step_down(BUCK_HIGH, Some(BUCK_LOW), 50u32.nanos())
        .init(hal, &timer)
        .expect("buck leg init");
    let boost = LegConfig::step_up(BOOST_LOW, Some(BOOST_HIGH), 50u32.nanos())
        .init(hal, &timer)
        .expect("boost leg init");
    (timer, BuckBoost::new(buck, boost))
}

pub fn hardware_err(e: Error<MockError>) -> bool {
    matches!(e, Error::Hardware(MockError))
}

/// Deterministic clock/heartbeat pump: each consumed heartbeat advances the
/// counter by `step` ticks.
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new(step: u64) -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(0),
            step,
        })
    }
}

impl Clock for StepClock {
    fn now(&self) -> u64 {
        self.now.get()
    }
}

impl Heartbeat for StepClock {
    async fn wait(&self) {
        self.now.set(self.now.get() + self.step);
    }
}

/// Channel collaborator mock recording every operation with a timestamp.
pub struct MockIo {
    clock: Rc<StepClock>,
    pub digital_writes: Vec<(u64, u8, bool)>,
    pub analog_writes: Vec<(u64, u8, f32)>,
    pub bank_switches: Vec<(InputBank, bool)>,
    pub digital_level: bool,
    /// Values returned by consecutive analog reads, cycled.
    pub analog_values: Vec<f32>,
    pub analog_reads: usize,
    /// Fail the analog read with this zero-based index.
    pub fail_analog_at: Option<usize>,
}

impl MockIo {
    pub fn new(clock: Rc<StepClock>) -> Self {
        Self {
            clock,
            digital_writes: Vec::new(),
            analog_writes: Vec::new(),
            bank_switches: Vec::new(),
            digital_level: false,
            analog_values: vec![0.0],
            analog_reads: 0,
            fail_analog_at: None,
        }
    }
}

impl ChannelIo for MockIo {
    type Error = MockError;

    fn digital_read(&mut self, _channel: u8) -> Result<bool, MockError> {
        Ok(self.digital_level)
    }

    fn digital_write(&mut self, channel: u8, level: bool) -> Result<(), MockError> {
        self.digital_writes.push((self.clock.now(), channel, level));
        Ok(())
    }

    fn analog_read(&mut self, _channel: u8) -> Result<f32, MockError> {
        if self.fail_analog_at == Some(self.analog_reads) {
            return Err(MockError);
        }
        let value = self.analog_values[self.analog_reads % self.analog_values.len()];
        self.analog_reads += 1;
        Ok(value)
    }

    fn analog_write(&mut self, channel: u8, value: f32) -> Result<(), MockError> {
        self.analog_writes.push((self.clock.now(), channel, value));
        Ok(())
    }

    fn set_inputs(&mut self, bank: InputBank, enabled: bool) -> Result<(), MockError> {
        self.bank_switches.push((bank, enabled));
        Ok(())
    }
}
