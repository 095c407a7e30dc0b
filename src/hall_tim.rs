//! TIM4ベースのHallセンサーインターフェース実装
//!
//! STM32のハードウェアHall Sensor Interface Mode（XORモード）を使用して、
//! 3つのHall入力のいずれかのエッジで転流割り込みと速度キャプチャを同時に行います。
//!
//! ## ハードウェア構成
//! - TIM4_CH1 (PB6): Hall H1
//! - TIM4_CH2 (PB7): Hall H2
//! - TIM4_CH3 (PB8): Hall H3
//! - クロック: 170MHz (APB1) / (PSC + 1) = 1MHz
//!
//! ## 動作原理
//! 1. 3つのHall入力がXORされてTI1に接続される（CR2.TI1S=1）
//! 2. TI1のエッジ検出がトリガーとして選択される（SMCR.TS=TI1F_ED）
//! 3. トリガーエッジでカウンタ値がCCR1にキャプチャされ、カウンターがリセットされる
//! 4. CC1割り込み = セクター変化（転流 + 速度サンプル）
//! 5. UPDATE割り込み = エッジ無しでオーバーフロー（停止判定）

use bldc_commutation::{HallCode, HallInputs, TickCounter};
use embassy_stm32::pac;

use crate::config::capture;
use crate::state;

/// Hallセンサー入力（PB6/PB7/PB8 を直接読み取り）
pub struct HallPins;

impl HallInputs for HallPins {
    #[inline(always)]
    fn read(&self) -> HallCode {
        let idr = pac::GPIOB.idr().read();
        let h1 = idr.idr(6) as u8 != 0; // PB6
        let h2 = idr.idr(7) as u8 != 0; // PB7
        let h3 = idr.idr(8) as u8 != 0; // PB8
        HallCode::from_levels(h1, h2, h3)
    }
}

/// 速度キャプチャ用カウンタ（TIM4）
///
/// 走行中はHallエッジでハードウェアがカウンターをリセットし、
/// リセット直前の値がCCR1に残る。停止判定後はカウンタを止めてゼロに保持する。
pub struct CaptureCounter;

impl CaptureCounter {
    #[inline(always)]
    fn is_halted(&self) -> bool {
        !pac::TIM4.cr1().read().cen()
    }
}

impl TickCounter for CaptureCounter {
    #[inline(always)]
    fn read(&self) -> u32 {
        // 停止中のエッジは有効な区間を持たない（ストール後の最初のエッジは0を返す）
        if self.is_halted() {
            return 0;
        }
        pac::TIM4.ccr(0).read().ccr() as u32
    }

    fn restart(&mut self) {
        // 走行中はエッジでハードウェアリセット済み
        if self.is_halted() {
            let tim4 = pac::TIM4;
            tim4.cnt().write_value(pac::timer::regs::CntCore(0));
            tim4.cr1().modify(|w| w.set_cen(true));
        }
    }

    fn halt(&mut self) {
        let tim4 = pac::TIM4;
        tim4.cr1().modify(|w| w.set_cen(false));
        tim4.cnt().write_value(pac::timer::regs::CntCore(0));
    }
}

/// TIM4 Hall Sensor Interface の初期化
///
/// タイマーは停止状態で構成され、カウンタ開始はコントローラ（`TickCounter::restart`）が行う。
/// NVICの割り込み許可は [`enable_interrupt`] で別途行う。
///
/// # Safety
/// PACを使用した直接的なレジスタ操作を含むため、unsafe
pub unsafe fn init_hall_timer() {
    let rcc = pac::RCC;
    let tim4 = pac::TIM4;
    let gpiob = pac::GPIOB;

    // 1. クロック有効化
    rcc.ahb2enr().modify(|w| w.set_gpioben(true)); // GPIOB
    rcc.apb1enr1().modify(|w| w.set_tim4en(true)); // TIM4

    // 2. GPIO設定（PB6/PB7/PB8をAF2、プルアップ有効 = オープンコレクタのHallセンサー向け）
    for pin in [6usize, 7, 8] {
        gpiob
            .moder()
            .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::ALTERNATE));
        gpiob.afr(pin / 8).modify(|w| w.set_afr(pin % 8, 2));
        gpiob
            .pupdr()
            .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::PULL_UP));
    }

    // 3. TIM4設定（1MHzカウント、16bitフルレンジ）
    tim4.cr1().modify(|w| w.set_cen(false));
    tim4.psc().write_value(capture::PRESCALER);
    tim4.arr()
        .write_value(pac::timer::regs::ArrCore(capture::AUTO_RELOAD as u32));

    // 4. Hall Sensor Interface Mode設定
    // CR2.TI1S = XOR: 3つのHall入力をXORしてTI1へ
    tim4.cr2().modify(|w| w.set_ti1s(pac::timer::vals::Ti1s::XOR));

    // SMCR: TI1のエッジ検出（両エッジ）でカウンターをリセット
    tim4.smcr().modify(|w| {
        w.set_ts(pac::timer::vals::Ts::TI1F_ED);
        w.set_sms(pac::timer::vals::Sms::RESET_MODE);
    });

    // 5. Input Capture設定: IC1 = TRC、8サイクルフィルタ
    tim4.ccmr_input(0).modify(|w| {
        w.set_ccs(0, pac::timer::vals::CcmrInputCcs::TRC);
        w.set_icf(0, pac::timer::vals::FilterValue::FCK_INT_N8);
    });
    tim4.ccer().modify(|w| {
        w.set_cce(0, true);
        w.set_ccp(0, false);
    });

    // 6. プリスケーラ反映（UGでUIFが立たないようにURS設定後に生成）
    tim4.cr1()
        .modify(|w| w.set_urs(pac::timer::vals::Urs::COUNTER_ONLY));
    tim4.egr().write(|w| w.set_ug(true));
    tim4.cnt().write_value(pac::timer::regs::CntCore(0));
    tim4.sr().write(|w| w.0 = 0);

    // 7. DIER: CC1IE（Hallエッジ）、UIE（タイムアウト）
    tim4.dier().modify(|w| {
        w.set_ccie(0, true);
        w.set_uie(true);
    });
}

/// TIM4割り込みを優先度付きで有効化
///
/// # Safety
/// コントローラを `state` に登録した後に呼ぶこと
pub unsafe fn enable_interrupt() {
    let mut cp = cortex_m::Peripherals::steal();
    cp.NVIC
        .set_priority(pac::Interrupt::TIM4, capture::IRQ_PRIORITY);
    cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM4);
}

/// TIM4割り込みハンドラー（Capture/Compare 1 + Update）
///
/// オーバーフローを先に処理する。オーバーフロー後に来たエッジは停止中のエッジとして扱われる。
///
/// # Safety
/// 割り込みコンテキストで実行されるため、処理は最小限にする
#[inline(always)]
pub unsafe fn tim4_irq_handler() {
    let tim4 = pac::TIM4;
    let sr = tim4.sr().read();

    // SRは0書き込みでクリア: 対象以外を1で書き、処理中に立ったフラグを消さない
    // UPDATE割り込み（エッジ無しでオーバーフロー → 停止）
    if sr.uif() {
        tim4.sr().write(|w| {
            w.0 = !0;
            w.set_uif(false);
        });
        state::with_motor(|motor| motor.on_capture_timeout());
    }

    // CAPTURE/COMPARE 1割り込み（Hallエッジ → 転流）
    if sr.ccif(0) {
        tim4.sr().write(|w| {
            w.0 = !0;
            w.set_ccif(0, false);
        });
        state::with_motor(|motor| motor.on_sector_change());
    }
}

/// TIM4割り込みのRust側エントリーポイント
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn TIM4() {
    tim4_irq_handler();
}
