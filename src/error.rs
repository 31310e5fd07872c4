//! Error definitions for the converter control core.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum Error<HwError> {
    /// A hardware comparator/generator/operator/timer could not be allocated.
    /// Fatal at init; never retried.
    PeripheralExhausted,
    /// The configured pin cannot act as an output.
    InvalidPin(u8),
    /// An underlying peripheral or bus transaction failed at runtime.
    /// Aborts the in-flight control program after safe-state teardown.
    Hardware(HwError),
    /// A control program is already installed or running; retry later.
    Busy,
    /// The scripted program failed validation before execution.
    ProgramInvalid,
}

impl<HwError: core::fmt::Debug> core::fmt::Display for Error<HwError> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::PeripheralExhausted => write!(f, "hardware peripheral pool exhausted"),
            Error::InvalidPin(pin) => write!(f, "pin {} is not a valid output", pin),
            Error::Hardware(e) => write!(f, "hardware transaction failed: {:?}", e),
            Error::Busy => write!(f, "a control program is already in flight"),
            Error::ProgramInvalid => write!(f, "program failed validation"),
        }
    }
}
