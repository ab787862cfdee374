//! 슬라이딩 윈도우 송신자 (Go-Back-N 재전송)
//!
//! - 미확인 프레임은 `window_size + 1` 슬롯 링에 보관 (한 슬롯은 항상 비워 가득/빔 구분)
//! - 누적 ACK으로 후미 전진, 타임아웃 시 미확인 프레임 전체를 순서대로 재전송
//! - 시퀀스 번호는 `message_index mod (2 * window_size + 1)`
//!
//! 세션은 두 상태를 오감:
//!
//! ```text
//!   Advancing ──(윈도우 가득 / 마지막 프레임 전송)──▶ WaitingForAck
//!       ▲                                              │
//!       └──────────────(후미 전진)──────────────────────┘
//! ```

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::ack::{ack_advance, AckEvent};
use crate::frame::Frame;
use crate::seq::{Seq, SeqRing};
use crate::stats::SessionStats;
use crate::timer::Timer;
use crate::transport::Transport;
use crate::{Config, Result};

/// 보냈지만 아직 확인되지 않은 프레임
#[derive(Debug, Clone)]
pub struct Outstanding {
    pub seq: Seq,

    /// 재전송용 인코딩된 데이터그램
    pub datagram: Bytes,
}

/// 미확인 프레임 링
///
/// `last_ack_received`(후미)와 `last_frame_sent`(선두) 두 커서, 모두 슬롯 인덱스.
/// 가장 오래된 미확인 프레임은 `last_ack_received + 1` 슬롯.
#[derive(Debug)]
pub struct OutstandingWindow {
    slots: Vec<Option<Outstanding>>,
    last_ack_received: usize,
    last_frame_sent: usize,
}

impl OutstandingWindow {
    pub fn new(window_size: usize) -> Self {
        let mut slots = Vec::with_capacity(window_size + 1);
        slots.resize_with(window_size + 1, || None);
        Self {
            slots,
            last_ack_received: 0,
            last_frame_sent: 0,
        }
    }

    /// 모든 읽기/쓰기가 거치는 슬롯 인덱스 함수
    #[inline]
    fn slot(&self, cursor: usize) -> usize {
        cursor % self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// 미확인 프레임 수
    pub fn len(&self) -> usize {
        self.slot(self.last_frame_sent + self.slots.len() - self.last_ack_received)
    }

    pub fn is_empty(&self) -> bool {
        self.last_ack_received == self.last_frame_sent
    }

    /// 선두를 한 칸 옮기면 후미와 겹치는지
    pub fn is_full(&self) -> bool {
        self.last_ack_received == self.slot(self.last_frame_sent + 1)
    }

    /// 가장 오래된 미확인 프레임
    pub fn oldest(&self) -> Option<&Outstanding> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.slot(self.last_ack_received + 1)].as_ref()
    }

    /// 선두에 프레임 추가. 가득 차 있으면 false
    pub fn push(&mut self, seq: Seq, datagram: Bytes) -> bool {
        if self.is_full() {
            return false;
        }
        self.last_frame_sent = self.slot(self.last_frame_sent + 1);
        let index = self.last_frame_sent;
        self.slots[index] = Some(Outstanding { seq, datagram });
        true
    }

    /// 후미를 `count`만큼 전진. 미확인 수보다 많으면 아무것도 하지 않고 0
    pub fn release(&mut self, count: usize) -> usize {
        if count > self.len() {
            return 0;
        }
        for _ in 0..count {
            self.last_ack_received = self.slot(self.last_ack_received + 1);
            let index = self.last_ack_received;
            self.slots[index] = None;
        }
        count
    }

    /// 오래된 것부터 미확인 프레임 순회
    pub fn iter(&self) -> impl Iterator<Item = &Outstanding> + '_ {
        (1..=self.len()).filter_map(move |i| self.slots[self.slot(self.last_ack_received + i)].as_ref())
    }
}

/// 송신 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// 윈도우에 여유 있음, 다음 프레임 전송
    Advancing,

    /// 윈도우 가득 또는 마지막 확인 대기
    WaitingForAck,
}

/// 슬라이딩 윈도우 송신자
#[derive(Debug)]
pub struct WindowSender<T> {
    transport: T,
    config: Config,
    ring: SeqRing,
    window: OutstandingWindow,
    payload: Bytes,
    timer: Timer,
    stats: SessionStats,
    /// 관측된 최대 미확인 프레임 수
    peak_outstanding: usize,
}

impl<T: Transport> WindowSender<T> {
    pub fn new(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            ring: config.seq_ring(),
            window: OutstandingWindow::new(config.window_size),
            config,
            payload: Bytes::new(),
            timer: Timer::new(),
            stats: SessionStats::new(),
            peak_outstanding: 0,
        })
    }

    /// 모든 프레임에 실을 페이로드
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 현재 미확인 프레임 수
    pub fn outstanding(&self) -> usize {
        self.window.len()
    }

    /// 세션 중 관측된 최대 미확인 프레임 수
    pub fn peak_outstanding(&self) -> usize {
        self.peak_outstanding
    }

    /// `max`개 메시지를 모두 누적 확인받을 때까지 전송
    /// `stats.retransmissions`가 재전송 횟수
    pub async fn run(&mut self, max: u64) -> Result<SessionStats> {
        self.stats = SessionStats::new();
        self.window = OutstandingWindow::new(self.config.window_size);
        self.peak_outstanding = 0;
        info!(
            "Sliding window sender: {} messages, window {}, seq ring {}",
            max,
            self.config.window_size,
            self.ring.size()
        );

        let mut next = 0u64;
        let mut phase = Phase::Advancing;

        while next < max || !self.window.is_empty() {
            match phase {
                Phase::Advancing => {
                    if self.window.is_full() || next == max {
                        self.timer.start();
                        phase = Phase::WaitingForAck;
                        continue;
                    }

                    self.send_new(next).await?;
                    next += 1;

                    // 블로킹 없이 확인 하나 처리
                    self.try_advance(Duration::ZERO).await?;
                }
                Phase::WaitingForAck => {
                    if self.await_progress().await? && next < max {
                        phase = Phase::Advancing;
                    }
                }
            }
        }

        self.stats.messages = max;
        info!("Sliding window sender done: {}", self.stats.summary());
        Ok(self.stats.clone())
    }

    async fn send_new(&mut self, message_index: u64) -> Result<()> {
        let seq = self.ring.seq_for(message_index);
        let datagram = Frame::new(seq, self.payload.clone()).encode(self.config.frame_size);

        self.transport.send(&datagram).await?;
        self.window.push(seq, datagram);
        self.stats.frames_sent += 1;
        self.peak_outstanding = self.peak_outstanding.max(self.window.len());
        trace!("프레임 전송: msg={}, seq={}, outstanding={}", message_index, seq, self.window.len());
        Ok(())
    }

    /// 타임아웃 안에 후미가 전진하면 true. 타임아웃이면 Go-Back-N 재전송 후 false
    async fn await_progress(&mut self) -> Result<bool> {
        let wait = self.timer.remaining(self.config.retransmit_timeout());
        if self.try_advance(wait).await? > 0 {
            self.timer.start();
            return Ok(true);
        }

        if self.timer.expired(self.config.retransmit_timeout()) {
            self.retransmit_all().await?;
            self.timer.start();
        }
        Ok(false)
    }

    /// ACK 하나를 최대 `wait` 동안 기다려 처리하고 해제한 프레임 수 반환
    async fn try_advance(&mut self, wait: Duration) -> Result<usize> {
        let Some(oldest_seq) = self.window.oldest().map(|o| o.seq) else {
            return Ok(0);
        };

        let event = ack_advance(
            &mut self.transport,
            oldest_seq,
            self.ring,
            self.config.window_size,
            wait,
        )
        .await?;

        match event {
            AckEvent::Idle => Ok(0),
            AckEvent::Stale(ack) => {
                debug!("오래된 ACK 폐기: ack={}, oldest={}", ack.value(), oldest_seq);
                self.stats.stale_acks += 1;
                Ok(0)
            }
            AckEvent::Advance { ack, distance } => {
                let released = self.window.release(distance as usize);
                if released == 0 {
                    warn!(
                        "미확인 수를 넘는 ACK 폐기: ack={}, distance={}, outstanding={}",
                        ack.value(),
                        distance,
                        self.window.len()
                    );
                    self.stats.stale_acks += 1;
                }
                Ok(released)
            }
        }
    }

    /// 미확인 프레임 전체를 순서대로 재전송 (Go-Back-N)
    async fn retransmit_all(&mut self) -> Result<()> {
        self.stats.timeouts += 1;
        debug!(
            "ACK 타임아웃, 미확인 {}개 재전송 (oldest seq={:?})",
            self.window.len(),
            self.window.oldest().map(|o| o.seq)
        );

        for outstanding in self.window.iter() {
            self.transport.send(&outstanding.datagram).await?;
            self.stats.retransmissions += 1;
        }
        Ok(())
    }
}
