//! スロットル監視タスク
//!
//! ADCでスロットル電圧を読み取り、PWM周期割り込み用に最新値を公開し、
//! 平滑化したレベルのヒステリシス判定で運転/停止を切り替えます。

use core::sync::atomic::Ordering;

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    peripherals,
};
use embassy_time::Ticker;

use crate::config::throttle;
use crate::state::{self, LATEST_THROTTLE};

/// スロットル監視タスク
#[embassy_executor::task]
pub async fn throttle_task(
    mut adc: Adc<'static, peripherals::ADC1>,
    mut throttle_pin: AnyAdcChannel<peripherals::ADC1>,
) {
    info!("Throttle task started");

    let mut ticker = Ticker::every(throttle::SAMPLE_PERIOD);

    // デバッグログ用カウンタ（1秒ごとにログ）
    let mut log_counter = 0u32;

    loop {
        ticker.next().await;

        let raw = adc.blocking_read(&mut throttle_pin);
        LATEST_THROTTLE.store(raw, Ordering::Relaxed);

        let Some(run) = state::with_motor(|motor| motor.update_throttle(raw)) else {
            continue;
        };

        log_counter += 1;
        if log_counter >= 1000 {
            log_counter = 0;
            trace!("[Throttle] ADC_raw={}, running={}", raw, run.is_running());
        }
    }
}
