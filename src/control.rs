//! Heartbeat-paced control loop.
//!
//! The loop is released once per hardware-timer alarm through a coalescing
//! one-shot signal: the alarm ISR signals it, the loop consumes it, and excess
//! signals collapse into one pending wake, so the loop never processes more
//! than one tick of backlog but never misses a wake either. On the target the
//! signal is a [`HeartbeatSignal`] given from the alarm callback; host tests
//! drive the [`Heartbeat`] trait with a deterministic pump instead.
//!
//! Two loop shapes are provided: [`run_ramp`] re-issues a ratio every
//! heartbeat, and [`run_program`] interprets a scripted instruction sequence
//! in lock-step with counter deadlines. Both unwind through the same recovery
//! boundary: a hardware fault or an external exit request forces every leg
//! off before the outcome is reported, and the loop task stays alive to
//! re-arm for the next dispatch.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;

use crate::converter::BuckBoost;
use crate::error::Error;
use crate::hal::PwmHal;
use crate::program::{Instruction, InputBank, Program};

/// Cross-task wake primitive fed from the timer-alarm interrupt.
pub type HeartbeatSignal = Signal<CriticalSectionRawMutex, ()>;

/// Read access to the free-running hardware counter pacing the loop.
pub trait Clock {
    /// Raw counter value, in alarm-timer ticks.
    fn now(&self) -> u64;
}

/// One wake per hardware-timer alarm.
#[allow(async_fn_in_trait)]
pub trait Heartbeat {
    /// Suspend until the next alarm fires. Signals raised while not waiting
    /// coalesce into a single pending wake.
    async fn wait(&self);
}

impl<M: RawMutex> Heartbeat for Signal<M, ()> {
    async fn wait(&self) {
        Signal::wait(self).await;
    }
}

/// Blocking analog/digital channel collaborators, keyed by channel id.
/// Scaling between raw counts and physical units lives behind this trait.
pub trait ChannelIo {
    type Error: core::fmt::Debug;

    fn digital_read(&mut self, channel: u8) -> Result<bool, Self::Error>;
    fn digital_write(&mut self, channel: u8, level: bool) -> Result<(), Self::Error>;
    fn analog_read(&mut self, channel: u8) -> Result<f32, Self::Error>;
    fn analog_write(&mut self, channel: u8, value: f32) -> Result<(), Self::Error>;
    fn set_inputs(&mut self, bank: InputBank, enabled: bool) -> Result<(), Self::Error>;
}

/// A recorded measurement, stamped with the counter value at record time.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub channel: u8,
    pub value: f32,
    pub at: u64,
}

/// Consumer for measurements produced by read instructions.
pub trait SampleSink {
    fn record(&mut self, sample: Sample);
}

impl<const N: usize> SampleSink for heapless::Vec<Sample, N> {
    fn record(&mut self, sample: Sample) {
        // A full sink drops further samples rather than aborting the program.
        let _ = self.push(sample);
    }
}

/// How a control program run ended, short of an error.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Every instruction executed.
    Completed,
    /// An external exit request unwound the program; outputs are forced off.
    Cancelled,
}

/// Deadline bookkeeping for timed instructions.
struct Timing {
    deadline: u64,
    wait_for_sync: bool,
}

impl Timing {
    async fn wait_deadline(&mut self, clock: &impl Clock, heartbeat: &impl Heartbeat) {
        if !self.wait_for_sync {
            return;
        }
        while clock.now() < self.deadline {
            heartbeat.wait().await;
        }
        self.wait_for_sync = false;
    }
}

/// Fixed-cadence loop shape: ramp the ratio from 0 to 1 over `steps`
/// heartbeats.
pub async fn run_ramp<H, S>(
    hal: &mut H,
    converter: &mut BuckBoost<H>,
    heartbeat: &S,
    steps: u32,
    exit: &AtomicBool,
) -> Result<Outcome, Error<H::Error>>
where
    H: PwmHal,
    S: Heartbeat,
{
    debug_assert!(steps > 0);
    for step in 0..=steps {
        heartbeat.wait().await;
        if exit.load(Ordering::Relaxed) {
            converter.force_off(hal)?;
            return Ok(Outcome::Cancelled);
        }
        if let Err(e) = converter.set_ratio(hal, step as f32 / steps as f32) {
            converter.force_off(hal)?;
            return Err(e);
        }
    }
    Ok(Outcome::Completed)
}

/// Scripted loop shape: interpret `program` against the channel collaborators,
/// pacing timed instructions on the heartbeat.
///
/// `exit` is checked once per instruction; a request unwinds through the same
/// path as a hardware fault. In both abort cases every leg reaches
/// [`crate::LegMode::ForcedOff`] before anything is reported upward.
pub async fn run_program<H, IO, C, S, K>(
    hal: &mut H,
    converter: &mut BuckBoost<H>,
    program: Program<'_>,
    clock: &C,
    heartbeat: &S,
    io: &mut IO,
    sink: &mut K,
    exit: &AtomicBool,
) -> Result<Outcome, Error<H::Error>>
where
    H: PwmHal,
    IO: ChannelIo<Error = H::Error>,
    C: Clock,
    S: Heartbeat,
    K: SampleSink,
{
    let mut timing = Timing {
        deadline: clock.now(),
        wait_for_sync: false,
    };

    for &instruction in program.instructions() {
        if exit.load(Ordering::Relaxed) {
            converter.force_off(hal)?;
            #[cfg(feature = "defmt")]
            defmt::debug!("control program cancelled");
            return Ok(Outcome::Cancelled);
        }
        if let Err(e) = execute(instruction, &mut timing, clock, heartbeat, io, sink).await {
            converter.force_off(hal)?;
            #[cfg(feature = "defmt")]
            defmt::warn!("control program aborted, outputs forced off");
            return Err(e);
        }
    }
    Ok(Outcome::Completed)
}

async fn execute<E, IO, C, S, K>(
    instruction: Instruction,
    timing: &mut Timing,
    clock: &C,
    heartbeat: &S,
    io: &mut IO,
    sink: &mut K,
) -> Result<(), Error<E>>
where
    IO: ChannelIo<Error = E>,
    C: Clock,
    S: Heartbeat,
    K: SampleSink,
{
    match instruction {
        Instruction::Delay(ticks) => {
            timing.deadline += u64::from(ticks);
            timing.wait_for_sync = true;
        }
        Instruction::ResetClock => {
            timing.deadline = clock.now();
            timing.wait_for_sync = false;
        }
        Instruction::DigitalWrite { channel, level } => {
            timing.wait_deadline(clock, heartbeat).await;
            io.digital_write(channel, level).map_err(Error::Hardware)?;
        }
        Instruction::DigitalRead { channel } => {
            timing.wait_deadline(clock, heartbeat).await;
            let level = io.digital_read(channel).map_err(Error::Hardware)?;
            sink.record(Sample {
                channel,
                value: if level { 1.0 } else { 0.0 },
                at: clock.now(),
            });
        }
        Instruction::AnalogWrite { channel, value } => {
            timing.wait_deadline(clock, heartbeat).await;
            io.analog_write(channel, value).map_err(Error::Hardware)?;
        }
        Instruction::AnalogReadAvg { channel, samples } => {
            timing.wait_deadline(clock, heartbeat).await;
            let mut sum = 0.0f32;
            for _ in 0..samples {
                sum += io.analog_read(channel).map_err(Error::Hardware)?;
            }
            sink.record(Sample {
                channel,
                value: sum / f32::from(samples),
                at: clock.now(),
            });
        }
        Instruction::EnableInputs(bank) => {
            timing.wait_deadline(clock, heartbeat).await;
            io.set_inputs(bank, true).map_err(Error::Hardware)?;
        }
        Instruction::DisableInputs(bank) => {
            timing.wait_deadline(clock, heartbeat).await;
            io.set_inputs(bank, false).map_err(Error::Hardware)?;
        }
    }
    Ok(())
}

/// Single-slot program handoff between a producer task and the control loop.
///
/// The loop holds the lock for the whole run, so an install attempt while a
/// program is in flight fails with [`Error::Busy`] instead of blocking the
/// producer.
pub struct ProgramSlot<const N: usize> {
    slot: Mutex<CriticalSectionRawMutex, heapless::Vec<Instruction, N>>,
}

impl<const N: usize> ProgramSlot<N> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(heapless::Vec::new()),
        }
    }

    /// Validate and install a new program, replacing any previous one.
    pub fn install<E>(&self, instructions: &[Instruction]) -> Result<(), Error<E>> {
        Program::new(instructions)?;
        let mut guard = self.slot.try_lock().map_err(|_| Error::Busy)?;
        guard.clear();
        guard
            .extend_from_slice(instructions)
            .map_err(|_| Error::ProgramInvalid)?;
        Ok(())
    }

    /// Claim the installed program for execution. The guard must be held for
    /// the whole run; it is what makes concurrent installs fail fast.
    pub fn claim<E>(
        &self,
    ) -> Result<MutexGuard<'_, CriticalSectionRawMutex, heapless::Vec<Instruction, N>>, Error<E>>
    {
        self.slot.try_lock().map_err(|_| Error::Busy)
    }
}

impl<const N: usize> Default for ProgramSlot<N> {
    fn default() -> Self {
        Self::new()
    }
}
