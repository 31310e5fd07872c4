//! Scripted control programs.
//!
//! A program is a flat sequence of timed I/O instructions interpreted by the
//! control loop. `Delay` only advances the deadline; every other instruction
//! first waits for the current deadline (heartbeat-paced), then performs its
//! hardware operation. Programs are validated once, before any hardware is
//! touched.

use crate::error::Error;

bitflags::bitflags! {
    /// Selectable analog/digital input channel banks.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct InputBank: u8 {
        const IN1 = 1 << 0;
        const IN2 = 1 << 1;
        const IN3 = 1 << 2;
        const IN4 = 1 << 3;
    }
}

/// One scripted instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Instruction {
    /// Advance the deadline by `ticks` of the control clock and defer.
    Delay(u32),
    /// Drive a digital output channel.
    DigitalWrite { channel: u8, level: bool },
    /// Sample a digital input channel and record it.
    DigitalRead { channel: u8 },
    /// Write an already-scaled value to an analog output channel.
    AnalogWrite { channel: u8, value: f32 },
    /// Sample an analog input channel `samples` times and record the average.
    AnalogReadAvg { channel: u8, samples: u16 },
    /// Enable an input channel bank.
    EnableInputs(InputBank),
    /// Disable an input channel bank.
    DisableInputs(InputBank),
    /// Re-base the deadline to the current counter value.
    ResetClock,
}

/// A validated instruction sequence.
#[derive(Clone, Copy, Debug)]
pub struct Program<'a> {
    instructions: &'a [Instruction],
}

impl<'a> Program<'a> {
    /// Validate an instruction sequence.
    ///
    /// Zero-tick delays and zero-sample reads are rejected up front with
    /// [`Error::ProgramInvalid`]; they would otherwise stall or divide by
    /// zero mid-program, after hardware has already been driven.
    pub fn new<E>(instructions: &'a [Instruction]) -> Result<Self, Error<E>> {
        for instruction in instructions {
            match instruction {
                Instruction::Delay(0) => return Err(Error::ProgramInvalid),
                Instruction::AnalogReadAvg { samples: 0, .. } => {
                    return Err(Error::ProgramInvalid);
                }
                _ => {}
            }
        }
        Ok(Self { instructions })
    }

    pub fn instructions(&self) -> &'a [Instruction] {
        self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
