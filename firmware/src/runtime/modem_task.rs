use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{
    BufferedInterruptHandler, BufferedUart, BufferedUartTx, Config as UartConfig, DataBits,
    Parity, StopBits,
};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;
use sweep_core::config::{APP_ID, RADIO_CHANNEL};
use sweep_core::modem::{
    FrameDecoder, MAX_FRAME_LEN, ModemCommand, ModemReply, encode_command, encode_configure,
};

use super::now_ms;
use crate::channels::{CompletionSender, ModemReceiver, RadioNotice};

const MODEM_UART_BAUD: u32 = 115_200;
const MODEM_UART_BUFFER_SIZE: usize = MAX_FRAME_LEN * 2;
const UART_RETRY_DELAY: Duration = Duration::from_millis(5);

static TX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct ModemIrqs {
    USART3_4_5_6_LPUART1 => BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    commands: ModemReceiver<'static>,
    completions: CompletionSender<'static>,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = MODEM_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = match BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        TX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        RX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]),
        ModemIrqs,
        config,
    ) {
        Ok(uart) => uart,
        Err(_) => {
            defmt::error!("modem: UART configuration rejected");
            loop {
                core::future::pending::<()>().await;
            }
        }
    };

    let (mut uart_tx, mut uart_rx) = uart.split();
    let sent_notices = completions;

    let outbound = async move {
        match encode_configure(APP_ID, RADIO_CHANNEL) {
            Ok(frame) => {
                write_frame(&mut uart_tx, &frame).await;
            }
            Err(err) => defmt::error!("modem: configure frame: {}", defmt::Display2Format(&err)),
        }

        loop {
            let command = commands.receive().await;
            let frame = match encode_command(&command) {
                Ok(frame) => frame,
                Err(err) => {
                    defmt::warn!("modem: dropping command: {}", defmt::Display2Format(&err));
                    continue;
                }
            };
            // The measured window starts once the frame is on the modem, not on the UART.
            if write_frame(&mut uart_tx, &frame).await
                && let ModemCommand::Transmit { handle, .. } = command
            {
                sent_notices
                    .send(RadioNotice::Sent {
                        handle,
                        at_ms: now_ms(),
                    })
                    .await;
            }
        }
    };

    let inbound = async move {
        let mut decoder = FrameDecoder::new();
        let mut ingress = [0u8; 32];
        loop {
            match uart_rx.read(&mut ingress).await {
                Ok(count) => {
                    let at_ms = now_ms();
                    for byte in &ingress[..count] {
                        match decoder.push(*byte) {
                            Ok(Some(body)) => handle_reply(&body, at_ms, &completions).await,
                            Ok(None) => {}
                            Err(err) => {
                                defmt::warn!("modem: bad frame: {}", defmt::Display2Format(&err));
                            }
                        }
                    }
                }
                Err(_) => {
                    defmt::warn!("modem: UART read error");
                    Timer::after(UART_RETRY_DELAY).await;
                }
            }
        }
    };

    join(outbound, inbound).await;
    loop {
        core::future::pending::<()>().await;
    }
}

/// Writes and drains one frame; `false` if the UART reported an error.
async fn write_frame(uart_tx: &mut BufferedUartTx<'static>, frame: &[u8]) -> bool {
    if uart_tx.write_all(frame).await.is_err() {
        defmt::warn!("modem: UART write error");
        Timer::after(UART_RETRY_DELAY).await;
        return false;
    }
    if uart_tx.flush().await.is_err() {
        defmt::warn!("modem: UART flush error");
        return false;
    }
    true
}

async fn handle_reply(body: &[u8], at_ms: u32, completions: &CompletionSender<'static>) {
    match ModemReply::parse(body) {
        Ok(ModemReply::TransmitComplete { handle, status }) => {
            completions
                .send(RadioNotice::Completed {
                    handle,
                    status,
                    at_ms,
                })
                .await;
        }
        Ok(ModemReply::Configured) => {
            defmt::info!("modem: configured app=0x{:08x} channel={}", APP_ID, RADIO_CHANNEL);
        }
        Err(err) => defmt::warn!("modem: bad reply: {}", defmt::Display2Format(&err)),
    }
}
