use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedInterruptHandler, BufferedUart, Config as UartConfig};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use static_cell::StaticCell;
use sweep_core::config::DEBUG_UART_BAUD;
use sweep_core::report::MAX_LINE_LEN;

use crate::channels::{REPORT_QUEUE_DEPTH, ReportReceiver};

const CONSOLE_TX_BUFFER_SIZE: usize = (MAX_LINE_LEN + 2) * REPORT_QUEUE_DEPTH;
const CONSOLE_RX_BUFFER_SIZE: usize = 16;

static TX_BUFFER: StaticCell<[u8; CONSOLE_TX_BUFFER_SIZE]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; CONSOLE_RX_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct ConsoleIrqs {
    USART2_LPUART2 => BufferedInterruptHandler<hal::peripherals::USART2>;
});

/// Writes each report line to the debug UART, CRLF terminated.
#[embassy_executor::task]
pub async fn run(
    lines: ReportReceiver<'static>,
    usart: Peri<'static, hal::peripherals::USART2>,
    tx_pin: Peri<'static, hal::peripherals::PA2>,
    rx_pin: Peri<'static, hal::peripherals::PA3>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = DEBUG_UART_BAUD;

    let uart = match BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        TX_BUFFER.init([0; CONSOLE_TX_BUFFER_SIZE]),
        RX_BUFFER.init([0; CONSOLE_RX_BUFFER_SIZE]),
        ConsoleIrqs,
        config,
    ) {
        Ok(uart) => uart,
        Err(_) => {
            defmt::error!("console: UART configuration rejected");
            loop {
                core::future::pending::<()>().await;
            }
        }
    };
    let (mut uart_tx, _uart_rx) = uart.split();

    loop {
        let line = lines.receive().await;
        let written = async {
            uart_tx.write_all(line.as_bytes()).await?;
            uart_tx.write_all(b"\r\n").await?;
            uart_tx.flush().await
        };
        if written.await.is_err() {
            defmt::warn!("console: UART write error, dropped {=str}", line.as_str());
            Timer::after(Duration::from_millis(5)).await;
        }
    }
}
