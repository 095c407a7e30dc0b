//! LED制御タスク
//!
//! 運転状態をステータスLEDで表示します。
//! - 運転中: 点灯
//! - 運転中だがロータ停止（ストール）: 点滅
//! - 停止中: 消灯

use embassy_stm32::gpio::Output;
use embassy_time::Ticker;

use crate::config::led;
use crate::state;

/// LED制御タスク
#[embassy_executor::task]
pub async fn led_task(mut status_led: Output<'static>) {
    info!("LED task started");

    let mut ticker = Ticker::every(led::BLINK_PERIOD);

    loop {
        ticker.next().await;

        let Some(status) = state::with_motor(|motor| motor.status()) else {
            status_led.set_low();
            continue;
        };

        if status.is_stalled() {
            status_led.toggle();
        } else if status.run.is_running() {
            status_led.set_high();
        } else {
            status_led.set_low();
        }
    }
}
