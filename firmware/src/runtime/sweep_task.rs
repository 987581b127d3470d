use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};
use sweep_core::config::TICK_PERIOD_MS;
use sweep_core::measurement::MeasurementEvent;

use super::{Controller, now_ms};
use crate::channels::CompletionReceiver;
use crate::hw::ChannelSink;
use crate::telemetry::TelemetryMirror;

#[embassy_executor::task]
pub async fn run(
    mut controller: Controller,
    mut sink: ChannelSink<'static>,
    completions: CompletionReceiver<'static>,
) -> ! {
    let mut mirror = TelemetryMirror::new();
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(TICK_PERIOD_MS)));

    defmt::info!(
        "sweep: starting, {} combinations x {} samples",
        controller.config().plan.combination_count(),
        controller.config().samples_per_combination
    );
    step(&mut controller, &mut sink, &mut mirror, MeasurementEvent::StartUp, now_ms());

    while !controller.is_finished() {
        let (event, at_ms) = match select(ticker.next(), completions.receive()).await {
            Either::First(()) => (MeasurementEvent::Tick, now_ms()),
            Either::Second(notice) => notice.into_event(),
        };
        step(&mut controller, &mut sink, &mut mirror, event, at_ms);
    }

    let progress = *controller.progress();
    defmt::info!(
        "sweep: finished rows={} transmissions={} rejections={} timeouts={} stale={} lost_lines={}",
        progress.rows_emitted,
        progress.transmissions,
        progress.rejections,
        progress.timeouts,
        progress.stale_completions,
        progress.lines_lost
    );

    loop {
        core::future::pending::<()>().await;
    }
}

fn step(
    controller: &mut Controller,
    sink: &mut ChannelSink<'static>,
    mirror: &mut TelemetryMirror,
    event: MeasurementEvent,
    at_ms: u32,
) {
    match controller.dispatch(event, at_ms, sink) {
        Ok(transition) if transition.changed_state() => {
            defmt::debug!(
                "sweep: {} -> {}",
                defmt::Display2Format(&transition.from),
                defmt::Display2Format(&transition.to)
            );
        }
        Ok(_) => {}
        Err(err) => defmt::warn!("sweep: {}", defmt::Display2Format(&err)),
    }
    mirror.flush(controller.telemetry());
}
