//! グローバル共有状態管理
//!
//! 割り込みハンドラーとタスクで共有される状態をクリティカルセクションで保護して管理します。

use core::cell::RefCell;
use core::sync::atomic::{AtomicU16, Ordering};

use bldc_commutation::{AnalogSampler, MotorController};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::bridge::Bridge;
use crate::hall_tim::{CaptureCounter, HallPins};

/// 本ファームウェアのコントローラ型
pub type Motor = MotorController<HallPins, Bridge, CaptureCounter, ThrottleInput>;

/// 転流コントローラ（全ハンドラーがクリティカルセクション内で排他的にアクセス）
static MOTOR: Mutex<CriticalSectionRawMutex, RefCell<Option<Motor>>> =
    Mutex::new(RefCell::new(None));

/// 最新のスロットルADC生値（スロットルタスクが更新、PWM周期割り込みが参照）
pub static LATEST_THROTTLE: AtomicU16 = AtomicU16::new(0);

/// スロットル入力（最新サンプルをノンブロッキングで参照）
pub struct ThrottleInput;

impl AnalogSampler for ThrottleInput {
    #[inline(always)]
    fn latest(&self) -> u16 {
        LATEST_THROTTLE.load(Ordering::Relaxed)
    }
}

/// コントローラを登録
pub fn install(motor: Motor) {
    MOTOR.lock(|cell| {
        cell.replace(Some(motor));
    });
}

/// コントローラに排他アクセス
///
/// # Returns
/// 未登録の場合は `None`
#[inline(always)]
pub fn with_motor<R>(f: impl FnOnce(&mut Motor) -> R) -> Option<R> {
    MOTOR.lock(|cell| cell.borrow_mut().as_mut().map(f))
}
