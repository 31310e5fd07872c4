//! Control core for a two-leg synchronous buck/boost converter.
//!
//! The converter is built from two half-bridge [`SwitchLeg`]s (a step-down and
//! a step-up stage) sharing one [`PulseTimer`] time base. Gate waveforms are
//! produced entirely in hardware by comparator/generator pairs; software only
//! reprograms duty values or forces output levels. [`BuckBoost`] turns a
//! requested voltage ratio into the buck/boost/pass topology decision, and the
//! [`control`] module runs the heartbeat-paced control loop, including the
//! scripted instruction interpreter.
//!
//! All hardware access goes through the [`hal::PwmHal`] capability trait, so
//! the whole core runs against an instrumented mock on the host.

#![no_std]

pub mod control;
pub mod converter;
pub mod error;
pub mod hal;
pub mod leg;
pub mod program;
pub mod pulse;

pub use control::{
    ChannelIo, Clock, Heartbeat, HeartbeatSignal, Outcome, ProgramSlot, Sample, SampleSink,
    run_program, run_ramp,
};
pub use converter::BuckBoost;
pub use error::Error;
pub use leg::{LegConfig, LegMode, LegRole, SwitchLeg};
pub use program::{InputBank, Instruction, Program};
pub use pulse::{PulseTimer, TimerConfig};
