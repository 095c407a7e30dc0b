#![no_std]
#![no_main]

mod fmt;

mod bridge;
mod config;
mod hall_tim;
mod hardware;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use core::sync::atomic::Ordering;

use bldc_commutation::MotorController;
use embassy_executor::Spawner;
use embassy_stm32::{
    adc::AdcChannel,
    gpio::{Level, Output, Speed},
};
use embassy_time::{Duration, Timer};

use hall_tim::{CaptureCounter, HallPins};
use state::{ThrottleInput, LATEST_THROTTLE};
use tasks::{led_task, telemetry_task, throttle_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let clock_config = hardware::create_clock_config();
    let p = embassy_stm32::init(clock_config);

    info!("═══════════════════════════════════════════════════════════════════");
    info!("        Sensored BLDC six-step controller • STM32G431VB @ 170MHz");
    info!("═══════════════════════════════════════════════════════════════════");

    // 制御パラメータ検証（パワーステージに触れる前に失敗させる）
    let controller_config = config::controller_config();
    if let Err(e) = controller_config.validate() {
        error!("Invalid controller configuration: {}", e);
        panic!("invalid controller configuration");
    }
    info!(
        "Config: poles={}, tick={}Hz, on/off threshold={}/{}",
        controller_config.poles,
        controller_config.tick_hz,
        controller_config.on_threshold,
        controller_config.off_threshold
    );

    // 電源安定待ち
    Timer::after(config::POWER_SETTLE).await;

    // LED初期化＆タスク起動
    let status_led = Output::new(p.PC13, Level::Low, Speed::Low);
    spawner.spawn(led_task(status_led)).unwrap();

    // スロットルADC初期化（PA0 = ADC1_IN1）、初回値で平滑化フィルタを初期化
    let mut adc1 = hardware::init_throttle_adc(p.ADC1);
    let mut throttle_pin = p.PA0.degrade_adc();
    let initial_throttle = adc1.blocking_read(&mut throttle_pin);
    LATEST_THROTTLE.store(initial_throttle, Ordering::Relaxed);
    info!("Initial throttle: ADC raw {}", initial_throttle);

    // PWM初期化（TIM1、3相相補PWM、全相無効）
    let bridge = hardware::init_power_stage(p.TIM1, p.PE9, p.PE8, p.PE11, p.PE10, p.PE13, p.PE12);
    let pwm_period = bridge.max_duty();

    // TIM4 Hallセンサーインターフェース初期化
    unsafe {
        hardware::init_hall_sensor();
    }

    // 転流コントローラを構築してセーフアイドル状態へ
    let mut motor = MotorController::new(
        &controller_config,
        pwm_period,
        HallPins,
        bridge,
        CaptureCounter,
        ThrottleInput,
    );
    motor.init();
    state::install(motor);

    // 割り込み有効化（登録後）
    unsafe {
        hardware::enable_motor_interrupts();
    }

    spawner.spawn(throttle_task(adc1, throttle_pin)).unwrap();

    // テレメトリ（USART2 TX = PA2）
    match hardware::init_telemetry_uart(p.USART2, p.PA2) {
        Ok(sink) => spawner.spawn(telemetry_task(sink)).unwrap(),
        Err(e) => error!("Telemetry UART init failed: {}", e),
    }

    info!("Motor control ready (stopped, waiting for throttle)");

    // メインループ（処理は割り込みとタスクで行う）
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}
