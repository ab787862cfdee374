//! 재전송 타이머
//!
//! `tokio::time::Instant` 기반이므로 테스트에서 시간 정지(`start_paused`)가 적용됨.

use std::time::Duration;

use tokio::time::Instant;

/// 시작 시점 이후 경과 시간 측정
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    /// 지금부터 측정하는 타이머 생성
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// 기준 시점을 지금으로 재설정
    pub fn start(&mut self) {
        self.started = Instant::now();
    }

    /// 마지막 `start()` 이후 경과 시간
    pub fn lap(&self) -> Duration {
        self.started.elapsed()
    }

    /// `timeout`에 도달했는지 (`remaining`이 0이면 true)
    pub fn expired(&self, timeout: Duration) -> bool {
        self.lap() >= timeout
    }

    /// 타임아웃까지 남은 시간 (지났으면 0)
    pub fn remaining(&self, timeout: Duration) -> Duration {
        timeout.saturating_sub(self.lap())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
