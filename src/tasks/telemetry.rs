//! テレメトリ送信タスク
//!
//! 1秒ごとに回転数・セクター・Duty・運転状態をUARTへテキストで送信します。

use bldc_commutation::{DiagnosticSink, SinkError, TelemetryReporter};
use embassy_stm32::{mode::Blocking, usart::UartTx};
use embassy_time::Ticker;

use crate::config::telemetry;
use crate::state;

/// UART送信（ブロッキング、1行ずつ）
pub struct UartSink {
    tx: UartTx<'static, Blocking>,
}

impl UartSink {
    pub fn new(tx: UartTx<'static, Blocking>) -> Self {
        Self { tx }
    }
}

impl DiagnosticSink for UartSink {
    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.tx.blocking_write(line.as_bytes()).map_err(|_| SinkError)?;
        self.tx.blocking_flush().map_err(|_| SinkError)
    }
}

/// テレメトリ送信タスク
#[embassy_executor::task]
pub async fn telemetry_task(sink: UartSink) {
    info!("Telemetry task started");

    let mut reporter = TelemetryReporter::new(sink);
    let mut ticker = Ticker::every(telemetry::PERIOD);

    loop {
        ticker.next().await;

        // スナップショットのみクリティカルセクション内で取得し、送信は外で行う
        let Some(status) = state::with_motor(|motor| motor.status()) else {
            continue;
        };

        // 失敗した行は reporter 側でログ出力済み、破棄して次周期へ
        if reporter.report(&status).is_err() {
            continue;
        }

        debug!(
            "[Telemetry] rpm={}, sector={}, duty={}, invalid_hall={}, timeouts={}",
            status.speed_rpm,
            status.sector.index(),
            status.duty,
            status.invalid_codes,
            status.capture_timeouts
        );
    }
}
