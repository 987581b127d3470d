//! Supply-voltage sampling through the STM32G0 internal reference.
//!
//! VDD is derived from a VREFINT reading and the factory calibration value
//! taken at 3.0 V, so the sampler reports millivolts directly.
//! A VREFINT code falls as VDD rises, so raw codes are scaled before the
//! min/max aggregator sees them or its extremes would come out swapped.

use core::ptr;

use embassy_stm32::adc::{Adc, SampleTime, VrefInt};
use embassy_stm32::peripherals::ADC1;

/// Factory-programmed VREFINT reading at VDDA = 3.0 V.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

const VREFINT_CAL_VDDA_MV: u32 = 3_000;

/// Reads the factory-trimmed VREFINT calibration constant.
pub fn read_vrefint_calibration() -> u16 {
    unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
}

/// `VDDA = 3000 mV * VREFINT_CAL / VREFINT_DATA`.
pub fn supply_millivolts(calibration: u16, reading: u16) -> Option<u32> {
    if reading == 0 {
        return None;
    }
    Some(VREFINT_CAL_VDDA_MV * u32::from(calibration) / u32::from(reading))
}

/// Embassy ADC wrapper that produces successive supply readings.
pub struct SupplySampler<'d> {
    adc: Adc<'d, ADC1>,
    channel: VrefInt,
    calibration: u16,
}

impl<'d> SupplySampler<'d> {
    /// Enables the internal reference and discards the first conversion.
    pub fn new(mut adc: Adc<'d, ADC1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES39_5);
        let mut channel = adc.enable_vrefint();
        let _ = adc.blocking_read(&mut channel);
        Self {
            adc,
            channel,
            calibration: read_vrefint_calibration(),
        }
    }

    /// Converts once; `None` when the reading cannot be scaled.
    pub fn sample_millivolts(&mut self) -> Option<u32> {
        let reading = self.adc.blocking_read(&mut self.channel);
        supply_millivolts(self.calibration, reading)
    }
}
