//! ボード固有の設定パラメータ
//!
//! 制御ロジック側のパラメータ（極数、しきい値など）は `bldc_commutation::config` を参照。

use bldc_commutation::ControllerConfig;
use embassy_time::Duration;

/// システムクロック [Hz]（HSI → PLL 170MHz、APB1/APB2 分周なし）
pub const SYSCLK_HZ: u32 = 170_000_000;

/// 電源安定待ち時間（パワーステージを触る前に待機）
pub const POWER_SETTLE: Duration = Duration::from_millis(1000);

/// 制御パラメータ（起動時に検証）
pub fn controller_config() -> ControllerConfig {
    ControllerConfig::default()
}

/// PWM設定（TIM1、3相相補PWM）
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// チョッピング周波数（16kHz）
    pub const FREQUENCY: Hertz = Hertz(16_000);

    /// デッドタイム [タイマークロック数]（170MHzで約0.5μs）
    pub const DEAD_TIME: u16 = 85;

    /// TIM1更新割り込みの優先度（Hallエッジより低い）
    pub const IRQ_PRIORITY: u8 = 0x20;
}

/// 速度計測用キャプチャタイマー設定（TIM4 Hallセンサーインターフェース）
pub mod capture {
    /// プリスケーラー: 170MHz / (169 + 1) = 1MHz（1tick = 1μs）
    pub const PRESCALER: u16 = 169;

    /// 自動リロード値（オーバーフロー = 約65.5ms でエッジ無しなら停止判定）
    pub const AUTO_RELOAD: u16 = 0xFFFF;

    /// TIM4割り込みの優先度（モーター制御で最優先）
    pub const IRQ_PRIORITY: u8 = 0x10;
}

/// スロットル入力設定（ADC1、PA0）
pub mod throttle {
    use embassy_time::Duration;

    /// サンプリング周期
    pub const SAMPLE_PERIOD: Duration = Duration::from_millis(1);
}

/// テレメトリ出力設定（USART2 TX、PA2）
pub mod telemetry {
    use embassy_time::Duration;

    /// 送信周期
    pub const PERIOD: Duration = Duration::from_secs(1);

    /// ボーレート
    pub const BAUD_RATE: u32 = 115_200;
}

/// ステータスLED設定
pub mod led {
    use embassy_time::Duration;

    /// 停止検出（ストール）時の点滅周期
    pub const BLINK_PERIOD: Duration = Duration::from_millis(250);
}

// キャプチャタイマーの tick 周波数と制御側の換算係数を一致させる
const _: () = assert!(
    SYSCLK_HZ / (capture::PRESCALER as u32 + 1) == bldc_commutation::config::DEFAULT_TICK_HZ
);
