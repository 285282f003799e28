use copter_core::indication::FLASH_MS;
use copter_core::IndicationStyle;
use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::Output;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker, Timer};

/// Latest LED style requested by the control loop.
pub type IndicationSignal = Signal<CriticalSectionRawMutex, IndicationStyle>;

async fn render(led: &mut Output<'static>, style: IndicationStyle) -> ! {
    match style.blink_period_ms() {
        Some(period) => {
            let mut ticker = Ticker::every(Duration::from_millis(period));
            loop {
                led.set_high();
                Timer::after_millis(FLASH_MS).await;
                led.set_low();
                ticker.next().await;
            }
        }
        None => {
            if style == IndicationStyle::Solid {
                led.set_high();
            } else {
                led.set_low();
            }
            loop {
                core::future::pending::<()>().await;
            }
        }
    }
}

/// Drives the status LED.
#[embassy_executor::task]
pub async fn led_task(mut led: Output<'static>, signal: &'static IndicationSignal) {
    info!("led indications running");

    let mut style = IndicationStyle::Off;
    loop {
        if let Either::First(next) = select(signal.wait(), render(&mut led, style)).await {
            style = next;
        }
    }
}
