//! ハードウェア初期化モジュール
//!
//! ペリフェラルの初期化ロジックを集約します。

use embassy_stm32::{
    adc::{Adc, SampleTime},
    gpio::OutputType,
    peripherals,
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
    },
    usart::{self, UartTx},
    Config, Peri,
};

use crate::bridge::{self, Bridge};
use crate::config;
use crate::hall_tim;
use crate::tasks::telemetry::UartSink;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// TIM4 Hallセンサーインターフェース初期化
///
/// PB6=H1、PB7=H2、PB8=H3（XORモード）
///
/// # Safety
/// PACを使用した直接レジスタ操作を含む
pub unsafe fn init_hall_sensor() {
    info!("Initializing TIM4 Hall Sensor Interface (XOR mode, 1MHz)...");
    hall_tim::init_hall_timer();
    info!("TIM4 Hall Sensor Interface initialized");
}

/// TIM1 3相相補PWMを初期化してブリッジドライバーを作成
///
/// 全相無効・マスター出力オフの状態で返します。
#[allow(clippy::too_many_arguments)]
pub fn init_power_stage(
    tim: Peri<'static, peripherals::TIM1>,
    ah: Peri<'static, peripherals::PE9>,
    al: Peri<'static, peripherals::PE8>,
    bh: Peri<'static, peripherals::PE11>,
    bl: Peri<'static, peripherals::PE10>,
    ch: Peri<'static, peripherals::PE13>,
    cl: Peri<'static, peripherals::PE12>,
) -> Bridge {
    let pwm = ComplementaryPwm::new(
        tim,
        Some(PwmPin::new(ah, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(al, OutputType::PushPull)),
        Some(PwmPin::new(bh, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(bl, OutputType::PushPull)),
        Some(PwmPin::new(ch, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(cl, OutputType::PushPull)),
        None,
        None,
        config::pwm::FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    let bridge = Bridge::new(pwm);
    info!(
        "TIM1 bridge initialized: {}Hz, max duty {}, dead time {}",
        config::pwm::FREQUENCY.0,
        bridge.max_duty(),
        config::pwm::DEAD_TIME
    );
    bridge
}

/// スロットル用ADC1を初期化
pub fn init_throttle_adc(adc: Peri<'static, peripherals::ADC1>) -> Adc<'static, peripherals::ADC1> {
    let mut adc = Adc::new(adc);
    adc.set_sample_time(SampleTime::CYCLES247_5);
    adc
}

/// テレメトリ用USART2（TXのみ）を初期化
pub fn init_telemetry_uart(
    uart: Peri<'static, peripherals::USART2>,
    tx: Peri<'static, peripherals::PA2>,
) -> Result<UartSink, usart::ConfigError> {
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = config::telemetry::BAUD_RATE;
    let tx = UartTx::new_blocking(uart, tx, uart_config)?;
    Ok(UartSink::new(tx))
}

/// モーター制御割り込みを有効化（TIM4: Hallエッジ/タイムアウト、TIM1: PWM周期）
///
/// # Safety
/// コントローラを `state` に登録した後に呼ぶこと
pub unsafe fn enable_motor_interrupts() {
    hall_tim::enable_interrupt();
    bridge::enable_period_interrupt();
    info!("Motor control interrupts enabled");
}
