//! Raspberry Pi backend: GPIO enable line and an MCP3008 ADC over SPI.
use pump_traits::{Actuator, Sensor};
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};

/// Pump enable line on a GPIO pin. Driven low on construction and on drop.
pub struct GpioActuator {
    pin: OutputPin,
}

impl GpioActuator {
    pub fn new(bcm_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output_low();
        Ok(Self { pin })
    }
}

impl Actuator for GpioActuator {
    fn enable(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_high();
        Ok(())
    }

    fn disable(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_low();
        Ok(())
    }
}

impl Drop for GpioActuator {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}

/// Single-ended MCP3008 channel read over SPI0/CE0.
pub struct Mcp3008Sensor {
    spi: Spi,
    channel: u8,
}

impl Mcp3008Sensor {
    pub const DEFAULT_CLOCK_HZ: u32 = 1_000_000;

    pub fn new(channel: u8, clock_hz: u32) -> Result<Self> {
        if channel > 7 {
            return Err(HwError::AdcChannel(channel));
        }
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi, channel })
    }

    fn read_raw(&mut self) -> Result<i32> {
        // start bit, single-ended + channel, then clock out 10 bits
        let tx = [0x01, 0x80 | (self.channel << 4), 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let value = (i32::from(rx[1] & 0x03) << 8) | i32::from(rx[2]);
        trace!(raw = value, channel = self.channel, "mcp3008 read");
        Ok(value)
    }
}

impl Sensor for Mcp3008Sensor {
    fn read(&mut self) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.read_raw()?)
    }
}
