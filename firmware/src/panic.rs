use core::panic::PanicInfo;

#[panic_handler]
fn on_panic(info: &PanicInfo) -> ! {
    defmt::error!("txsweep: panic {}", defmt::Display2Format(info));
    cortex_m::asm::bkpt();
    cortex_m::asm::udf();
}
