//! 세션 통계
//!
//! 재전송 카운터는 세션 객체마다 따로 누적되고 세션 종료 시 반환됨.

use std::time::Duration;

use tokio::time::Instant;

/// 한 세션(`max` 메시지)의 통계
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 전달 완료(송신측: 확인됨, 수신측: 소비됨) 메시지 수
    pub messages: u64,

    /// 처음 전송한 프레임 수
    pub frames_sent: u64,

    /// 재전송 수 (타임아웃 재전송 + 비트 불일치 재전송)
    pub retransmissions: u64,

    /// 타임아웃 발생 수
    pub timeouts: u64,

    /// 폐기된 오래된/잘못된 ACK 수
    pub stale_acks: u64,

    /// 보낸 ACK 수
    pub acks_sent: u64,

    /// 폐기된 중복/범위 밖 프레임 수
    pub duplicate_frames: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            messages: 0,
            frames_sent: 0,
            retransmissions: 0,
            timeouts: 0,
            stale_acks: 0,
            acks_sent: 0,
            duplicate_frames: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 전송 중 재전송 비율
    pub fn retransmission_ratio(&self) -> f64 {
        let total = self.frames_sent + self.retransmissions;
        if total == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / total as f64
    }

    /// 초당 메시지 수
    pub fn message_rate(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.messages as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.3}s | Messages: {} | Sent: {} | Retrans: {} ({:.2}%) | Timeouts: {} | Stale ACKs: {} | ACKs: {} | Dup frames: {}",
            self.elapsed().as_secs_f64(),
            self.messages,
            self.frames_sent,
            self.retransmissions,
            self.retransmission_ratio() * 100.0,
            self.timeouts,
            self.stale_acks,
            self.acks_sent,
            self.duplicate_frames,
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}
