use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use sweep_core::config::MeasurementConfig;
use sweep_core::measurement::{MeasurementController, TimeoutPolicy};

#[cfg(feature = "analog")]
use sweep_core::analog::{AnalogScale, AtomicExtremes};
#[cfg(not(feature = "analog"))]
use sweep_core::analog::NoAnalog;

use crate::channels::{CompletionQueue, ModemQueue, ReportQueue};
use crate::hw::{ChannelRadio, ChannelSink};

mod console_task;
mod modem_task;
#[cfg(feature = "analog")]
mod sampler_task;
mod sweep_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Modem replies slower than this are abandoned and the sample reissued.
const COMPLETION_TIMEOUT_MS: u32 = 5_000;

pub(super) static MODEM_QUEUE: ModemQueue = Channel::new();
pub(super) static COMPLETIONS: CompletionQueue = Channel::new();
pub(super) static REPORTS: ReportQueue = Channel::new();

#[cfg(feature = "analog")]
pub(super) static SUPPLY_EXTREMES: AtomicExtremes = AtomicExtremes::new();

#[cfg(feature = "analog")]
pub(super) type Probe = &'static AtomicExtremes;
#[cfg(not(feature = "analog"))]
pub(super) type Probe = NoAnalog;

pub(super) type Controller = MeasurementController<ChannelRadio<'static>, Probe>;

/// Milliseconds since boot, wrapping like the controller's clock.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

fn measurement_config() -> MeasurementConfig {
    let config = MeasurementConfig::DEFAULT
        .with_completion_timeout(COMPLETION_TIMEOUT_MS, TimeoutPolicy::Reissue);
    #[cfg(feature = "analog")]
    let config = config.with_analog_scale(AnalogScale::MILLIVOLTS);
    config
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let peripherals = hal::init(hal::Config::default());

    #[cfg(feature = "analog")]
    let probe: Probe = &SUPPLY_EXTREMES;
    #[cfg(not(feature = "analog"))]
    let probe: Probe = NoAnalog;

    let controller = MeasurementController::new(
        measurement_config(),
        ChannelRadio::new(MODEM_QUEUE.sender()),
        probe,
    )
    .expect("measurement configuration");

    spawner
        .spawn(console_task::run(
            REPORTS.receiver(),
            peripherals.USART2,
            peripherals.PA2,
            peripherals.PA3,
        ))
        .expect("failed to spawn console task");

    spawner
        .spawn(modem_task::run(
            MODEM_QUEUE.receiver(),
            COMPLETIONS.sender(),
            peripherals.USART5,
            peripherals.PB0,
            peripherals.PB1,
        ))
        .expect("failed to spawn modem task");

    #[cfg(feature = "analog")]
    spawner
        .spawn(sampler_task::run(
            &SUPPLY_EXTREMES,
            hal::adc::Adc::new(peripherals.ADC1),
        ))
        .expect("failed to spawn sampler task");

    spawner
        .spawn(sweep_task::run(
            controller,
            ChannelSink::new(REPORTS.sender()),
            COMPLETIONS.receiver(),
        ))
        .expect("failed to spawn sweep task");

    core::future::pending::<()>().await;
}
