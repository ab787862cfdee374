//! 세션 설정
//!
//! 양 끝이 같은 값을 사용해야 함 (`window_size`, `frame_size`).
//! 세션당 메시지 수 `max`는 각 `run` 호출의 인자로 전달.

use std::time::Duration;

use crate::seq::SeqRing;
use crate::{Error, Result, DEFAULT_FRAME_SIZE, DEFAULT_RETRANSMIT_TIMEOUT_US, SEQ_HEADER_LEN};

/// ARQ 세션 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 슬라이딩 윈도우 크기 (미확인 프레임 최대 수)
    /// 시퀀스 번호 링 크기는 2 * window_size + 1
    pub window_size: usize,

    /// ACK 대기 타임아웃 (마이크로초)
    pub retransmit_timeout_us: u64,

    /// 고정 프레임 크기 (바이트, 시퀀스 헤더 포함)
    pub frame_size: usize,

    /// 마지막 메시지 이후 수신자가 재전송에 응답하며 머무는 시간 (밀리초)
    /// 0이면 즉시 종료
    pub linger_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: 30,
            retransmit_timeout_us: DEFAULT_RETRANSMIT_TIMEOUT_US,
            frame_size: DEFAULT_FRAME_SIZE,
            linger_ms: 0,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 정지-대기용 설정 (윈도우 1)
    pub fn stop_and_wait() -> Self {
        Self {
            window_size: 1,
            ..Self::default()
        }
    }

    /// 손실이 많은 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            window_size: 8,
            retransmit_timeout_us: 20_000,  // 20ms
            frame_size: 512,
            linger_ms: 500,
        }
    }

    /// 고처리량 설정
    pub fn high_throughput() -> Self {
        Self {
            window_size: 256,
            retransmit_timeout_us: 5_000,
            frame_size: 1460,
            linger_ms: 100,
        }
    }

    /// 윈도우 크기 변경
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// 타임아웃 변경
    pub fn with_retransmit_timeout(mut self, timeout: Duration) -> Self {
        self.retransmit_timeout_us = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// 링거 시간 변경
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger_ms = u64::try_from(linger.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::invalid_config("window_size는 0보다 커야 함"));
        }
        if self.window_size > (u32::MAX as usize - 1) / 2 {
            return Err(Error::invalid_config(format!(
                "window_size {}에 대한 시퀀스 링이 u32 범위를 넘음",
                self.window_size
            )));
        }
        if self.frame_size < SEQ_HEADER_LEN {
            return Err(Error::invalid_config(format!(
                "frame_size {}는 시퀀스 헤더 {} bytes보다 작음",
                self.frame_size, SEQ_HEADER_LEN
            )));
        }
        if self.retransmit_timeout_us == 0 {
            return Err(Error::invalid_config("retransmit_timeout_us는 0보다 커야 함"));
        }
        Ok(())
    }

    /// 윈도우 프로토콜의 시퀀스 번호 링
    pub fn seq_ring(&self) -> SeqRing {
        SeqRing::for_window(self.window_size)
    }

    /// ACK 대기 타임아웃
    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_micros(self.retransmit_timeout_us)
    }

    /// 수신자 링거 시간
    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}
