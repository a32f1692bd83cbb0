use log::debug;
use rustix::fd::AsFd;
use rustix::termios::{tcgetattr, tcsetattr, ControlModes, OptionalActions, Termios};

use crate::{Error, Result};

pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(Error::Configuration(format!("invalid data bits: {}", bits))),
        }
    }
}

impl DataBits {
    fn flag(self) -> ControlModes {
        match self {
            DataBits::Five => ControlModes::CS5,
            DataBits::Six => ControlModes::CS6,
            DataBits::Seven => ControlModes::CS7,
            DataBits::Eight => ControlModes::CS8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            _ => Err(Error::Configuration(format!("invalid stop bits: {}", bits))),
        }
    }
}

/// Line settings applied when a port is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

impl SerialConfig {
    /// 8N1 at the given baud rate
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }

    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::Configuration("baud rate must be positive".to_owned()));
        }
        Ok(())
    }

    /// Put `fd` into raw mode with these settings, returning the settings it had before
    pub(crate) fn apply<Fd: AsFd>(&self, fd: Fd) -> Result<Termios> {
        self.validate()?;
        let fd = fd.as_fd();

        let original = tcgetattr(fd)
            .map_err(|e| Error::Configuration(format!("failed to get termios: {}", e)))?;
        let mut termios = original.clone();

        termios.make_raw();
        termios
            .set_speed(self.baud_rate)
            .map_err(|e| Error::Configuration(format!("unsupported baud rate {}: {}", self.baud_rate, e)))?;

        termios.control_modes |= ControlModes::CLOCAL | ControlModes::CREAD;

        termios.control_modes &= !ControlModes::CSIZE;
        termios.control_modes |= self.data_bits.flag();

        match self.parity {
            Parity::None => termios.control_modes &= !ControlModes::PARENB,
            Parity::Even => {
                termios.control_modes |= ControlModes::PARENB;
                termios.control_modes &= !ControlModes::PARODD;
            }
            Parity::Odd => termios.control_modes |= ControlModes::PARENB | ControlModes::PARODD,
        }

        match self.stop_bits {
            StopBits::One => termios.control_modes &= !ControlModes::CSTOPB,
            StopBits::Two => termios.control_modes |= ControlModes::CSTOPB,
        }

        tcsetattr(fd, OptionalActions::Now, &termios)
            .map_err(|e| Error::Configuration(format!("failed to apply termios: {}", e)))?;

        debug!("Applied {:?}", self);
        Ok(original)
    }
}
