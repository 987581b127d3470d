use embassy_stm32::adc::Adc;
use embassy_stm32::peripherals::ADC1;
use embassy_time::{Duration, Ticker};
use sweep_core::analog::AtomicExtremes;

use crate::hw::power::SupplySampler;

/// Fast enough to catch the supply dip of a single radio burst.
const SAMPLE_PERIOD: Duration = Duration::from_micros(250);

/// Feeds supply readings into the shared extremes for the open window.
#[embassy_executor::task]
pub async fn run(extremes: &'static AtomicExtremes, adc: Adc<'static, ADC1>) -> ! {
    let mut sampler = SupplySampler::new(adc);
    let mut ticker = Ticker::every(SAMPLE_PERIOD);
    loop {
        if let Some(millivolts) = sampler.sample_millivolts() {
            extremes.observe(millivolts);
        }
        ticker.next().await;
    }
}
