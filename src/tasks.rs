//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。

pub mod led;
pub mod telemetry;
pub mod throttle;

// タスク関数を再エクスポート
pub use led::led_task;
pub use telemetry::telemetry_task;
pub use throttle::throttle_task;
