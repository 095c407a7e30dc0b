//! 3相ブリッジドライバー（TIM1）
//!
//! ComplementaryPwmで構成したTIM1の上に、6ステップ転流用の出力モード切り替えを実装します。
//!
//! - 各相の出力モード（OCxM）と出力許可（CCxE/CCxNE）はプリロードされ（CR2.CCPC=1）、
//!   COMイベントで3相同時に切り替わる
//! - PWM相はハイサイドのみ（CCxE=1/CCxNE=0）、固定相は相補出力（CCxE=1/CCxNE=1）で
//!   レール切り替え時にデッドタイムが入る
//! - 無効相は CCxE=1 + 強制非アクティブとし、両出力をタイマーが非アクティブレベルで駆動する
//! - BDTR.MOE がマスター出力許可、OSSR/OSSI=1 で無効出力を非アクティブレベルに保持

use bldc_commutation::{BridgeConfiguration, GateDrive, OutputReference, PowerStage};
use embassy_stm32::{
    pac, peripherals,
    timer::{complementary_pwm::ComplementaryPwm, low_level::OutputCompareMode, Channel},
};

use crate::config::pwm as pwm_config;
use crate::state;

const CHANNELS: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

/// ゲート記述子をタイマーの出力比較モードに変換
fn compare_mode(gate: GateDrive) -> OutputCompareMode {
    match gate.reference {
        OutputReference::Pwm => OutputCompareMode::PwmMode1,
        OutputReference::ForceActive => OutputCompareMode::ForceActive,
        OutputReference::ForceInactive => OutputCompareMode::ForceInactive,
    }
}

/// 3相ブリッジドライバー
pub struct Bridge {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
}

impl Bridge {
    /// 新しいブリッジドライバーを作成
    ///
    /// 全相を無効化し、デッドタイム・オフステート・COMプリロードを設定します。
    /// マスター出力はコントローラの初期化（`init`）で閉じられます。
    ///
    /// # Arguments
    /// * `pwm` - PWMペリフェラル（TIM1）
    pub fn new(mut pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        for ch in CHANNELS {
            pwm.disable(ch);
            pwm.set_duty(ch, 0);
        }
        pwm.set_dead_time(pwm_config::DEAD_TIME);

        let tim1 = pac::TIM1;
        tim1.bdtr().modify(|w| {
            w.set_moe(false);
            w.set_ossr(pac::timer::vals::Ossr::IDLE_LEVEL);
            w.set_ossi(pac::timer::vals::Ossi::IDLE_LEVEL);
        });
        tim1.cr2().modify(|w| w.set_ccpc(true));
        tim1.egr().write(|w| w.set_comg(true));

        let max_duty = pwm.get_max_duty();
        Self { pwm, max_duty }
    }

    /// PWMの最大Duty値（= 100%）を取得
    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }
}

impl PowerStage for Bridge {
    fn apply(&mut self, config: &BridgeConfiguration) {
        let tim1 = pac::TIM1;

        for (ch, leg) in config.legs.iter().enumerate() {
            let gate = leg.gate_drive();
            tim1.ccmr_output(ch / 2)
                .modify(|w| w.set_ocm(ch % 2, compare_mode(gate).into()));
        }

        tim1.ccer().modify(|w| {
            for (ch, leg) in config.legs.iter().enumerate() {
                let gate = leg.gate_drive();
                // 無効相もCCxEを立てて強制非アクティブで駆動（Hi-Zにしない）
                w.set_cce(ch, gate.high_output || !gate.low_output);
                w.set_ccne(ch, gate.low_output);
            }
        });

        // COMイベントで3相を同時に更新
        tim1.egr().write(|w| w.set_comg(true));
    }

    #[inline(always)]
    fn set_duty(&mut self, duty: u16) {
        let duty = duty.min(self.max_duty);
        for ch in CHANNELS {
            self.pwm.set_duty(ch, duty);
        }
    }

    fn set_output_enable(&mut self, enabled: bool) {
        pac::TIM1.bdtr().modify(|w| w.set_moe(enabled));
    }
}

/// TIM1更新割り込み（PWM周期）を有効化
///
/// # Safety
/// コントローラを `state` に登録した後に呼ぶこと
pub unsafe fn enable_period_interrupt() {
    let tim1 = pac::TIM1;
    tim1.sr().write(|w| {
        w.0 = !0;
        w.set_uif(false);
    });
    tim1.dier().modify(|w| w.set_uie(true));

    let mut cp = cortex_m::Peripherals::steal();
    cp.NVIC
        .set_priority(pac::Interrupt::TIM1_UP_TIM16, pwm_config::IRQ_PRIORITY);
    cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM1_UP_TIM16);
}

/// TIM1更新割り込みハンドラー（PWM周期ごとにDuty更新）
///
/// # Safety
/// 割り込みコンテキストで実行されるため、処理は最小限にする
#[inline(always)]
pub unsafe fn tim1_up_irq_handler() {
    let tim1 = pac::TIM1;
    if tim1.sr().read().uif() {
        tim1.sr().write(|w| {
            w.0 = !0;
            w.set_uif(false);
        });
        state::with_motor(|motor| motor.on_pwm_period());
    }
}

#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn TIM1_UP_TIM16() {
    tim1_up_irq_handler();
}
