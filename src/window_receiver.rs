//! 슬라이딩 윈도우 수신자 (선택적 버퍼링, 누적 ACK)
//!
//! - 수용 윈도우 안의 프레임은 순서가 어긋나도 점유 맵에 표시
//! - `last_ack_sent`는 연속으로 표시된 구간만 흡수하며 전진 (빈칸을 건너뛰지 않음)
//! - 모든 수신 후 "다음 기대 시퀀스 번호"를 ACK

use tracing::{debug, info, trace};

use crate::frame::{peek_seq, Ack};
use crate::seq::{Seq, SeqRing};
use crate::stats::SessionStats;
use crate::transport::Transport;
use crate::{Config, Result};

/// 수신 프레임 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// 수용 윈도우 안의 새 프레임
    New,

    /// 수용 윈도우 안이지만 이미 버퍼에 있음
    Duplicate,

    /// 이미 흡수된 프레임 또는 윈도우 밖/링 밖 값
    OutOfWindow,
}

/// 시퀀스 링 위의 점유 맵
#[derive(Debug, Clone)]
pub struct ReceiveBuffer {
    ring: SeqRing,
    window_size: u32,
    received: Vec<bool>,
    /// 누적 확인 포인터 (마지막으로 흡수한 시퀀스 번호)
    last_ack_sent: Seq,
    /// 수용 윈도우의 앞쪽 끝
    largest_acceptable: Seq,
}

impl ReceiveBuffer {
    /// `window_size`는 1 이상 (`Config::validate`에서 검증)
    pub fn new(window_size: usize) -> Self {
        debug_assert!(window_size > 0, "receive window must hold at least one frame");
        let ring = SeqRing::for_window(window_size);
        Self {
            received: vec![false; ring.size() as usize],
            window_size: window_size as u32,
            // 링 시작 한 칸 뒤에서 출발
            last_ack_sent: ring.prev(0),
            largest_acceptable: (window_size as u32).saturating_sub(1),
            ring,
        }
    }

    pub fn ring(&self) -> SeqRing {
        self.ring
    }

    pub fn last_ack_sent(&self) -> Seq {
        self.last_ack_sent
    }

    pub fn largest_acceptable(&self) -> Seq {
        self.largest_acceptable
    }

    /// 다음 기대 시퀀스 번호 (보낼 누적 ACK 값)
    pub fn next_expected(&self) -> Seq {
        self.ring.next(self.last_ack_sent)
    }

    /// 받았지만 아직 흡수되지 않았는지
    pub fn is_buffered(&self, seq: Seq) -> bool {
        self.ring.contains(seq) && self.received[seq as usize]
    }

    /// 수용 윈도우 기준 위치. 양수면 윈도우 안 (1 ..= window_size)
    pub fn offset(&self, seq: Seq) -> i64 {
        self.window_size as i64 - self.ring.distance(seq, self.largest_acceptable) as i64
    }

    /// 프레임 하나를 분류하고 새 프레임이면 표시
    pub fn accept(&mut self, seq: Seq) -> Acceptance {
        if !self.ring.contains(seq) || self.offset(seq) <= 0 {
            return Acceptance::OutOfWindow;
        }
        if self.received[seq as usize] {
            return Acceptance::Duplicate;
        }
        self.received[seq as usize] = true;
        Acceptance::New
    }

    /// 연속으로 표시된 구간을 누적 포인터로 흡수하고 흡수한 수 반환
    pub fn absorb(&mut self) -> u32 {
        let mut absorbed = 0;
        loop {
            let next = self.ring.next(self.last_ack_sent);
            if !self.received[next as usize] {
                return absorbed;
            }
            self.received[next as usize] = false;
            self.last_ack_sent = next;
            self.largest_acceptable = self.ring.next(self.largest_acceptable);
            absorbed += 1;
        }
    }
}

/// 슬라이딩 윈도우 수신자
#[derive(Debug)]
pub struct WindowReceiver<T> {
    transport: T,
    config: Config,
    buffer: ReceiveBuffer,
    stats: SessionStats,
}

impl<T: Transport> WindowReceiver<T> {
    pub fn new(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            buffer: ReceiveBuffer::new(config.window_size),
            config,
            stats: SessionStats::new(),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 다음 기대 시퀀스 번호
    pub fn next_expected(&self) -> Seq {
        self.buffer.next_expected()
    }

    pub fn buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }

    /// 서로 다른 `max`개 메시지를 소비할 때까지 수신하고 누적 ACK
    pub async fn run(&mut self, max: u64) -> Result<SessionStats> {
        self.stats = SessionStats::new();
        self.buffer = ReceiveBuffer::new(self.config.window_size);
        let mut buf = vec![0u8; self.config.frame_size];
        info!(
            "Sliding window receiver: {} messages, window {}, seq ring {}",
            max,
            self.config.window_size,
            self.buffer.ring().size()
        );

        for _ in 0..max {
            while self.receive_one(&mut buf).await? != Some(Acceptance::New) {}
            self.stats.messages += 1;
        }

        self.linger(&mut buf).await?;
        info!("Sliding window receiver done: {}", self.stats.summary());
        Ok(self.stats.clone())
    }

    /// 프레임 하나를 받아 처리하고 누적 ACK 전송. 짧은 데이터그램이면 None
    async fn receive_one(&mut self, buf: &mut [u8]) -> Result<Option<Acceptance>> {
        let len = self.transport.receive(buf).await?;
        let Some(seq) = peek_seq(&buf[..len]) else {
            trace!("짧은 프레임 무시: {} bytes", len);
            return Ok(None);
        };

        let acceptance = self.buffer.accept(seq);
        let absorbed = self.buffer.absorb();
        let ack = Ack(self.buffer.next_expected());

        // 전진 여부와 관계없이 항상 ACK (재전송 중인 송신자에게 다시 알림)
        self.transport.acknowledge(&ack.encode()).await?;
        self.stats.acks_sent += 1;

        match acceptance {
            Acceptance::New => {
                trace!("프레임 수신: seq={}, absorbed={}, ack={}", seq, absorbed, ack.value());
            }
            Acceptance::Duplicate | Acceptance::OutOfWindow => {
                debug!(
                    "프레임 폐기 ({:?}): seq={}, offset={}, ack={}",
                    acceptance,
                    seq,
                    self.buffer.offset(seq),
                    ack.value()
                );
                self.stats.duplicate_frames += 1;
            }
        }
        Ok(Some(acceptance))
    }

    /// 마지막 ACK이 손실된 송신자를 위해 재전송에 계속 응답
    async fn linger(&mut self, buf: &mut [u8]) -> Result<()> {
        let linger = self.config.linger();
        if linger.is_zero() {
            return Ok(());
        }

        while self.transport.poll_receive(linger).await? {
            self.receive_one(buf).await?;
        }
        Ok(())
    }
}
