//! 정지-대기 (교대 비트) ARQ
//!
//! - 송신자: 한 번에 프레임 하나, ACK이 올 때까지 타임아웃 재전송
//! - 수신자: 기대 비트와 다른 프레임(직전 프레임의 중복)도 다시 ACK

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::frame::{peek_seq, Ack, Frame};
use crate::seq::{is_expected_sequence, Seq, SeqRing};
use crate::stats::SessionStats;
use crate::timer::Timer;
use crate::transport::Transport;
use crate::{Config, Result, SEQ_HEADER_LEN};

/// 정지-대기 송신자
#[derive(Debug)]
pub struct StopWaitSender<T> {
    transport: T,
    config: Config,
    ring: SeqRing,
    payload: Bytes,
    timer: Timer,
    stats: SessionStats,
}

impl<T: Transport> StopWaitSender<T> {
    pub fn new(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            ring: SeqRing::alternating_bit(),
            payload: Bytes::new(),
            timer: Timer::new(),
            stats: SessionStats::new(),
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

    /// `max`개 메시지를 확인받을 때까지 전송하고 통계 반환
    /// `stats.retransmissions`가 재전송 횟수
    pub async fn run(&mut self, max: u64) -> Result<SessionStats> {
        self.stats = SessionStats::new();
        info!("Stop-and-wait sender: {} messages", max);

        for n in 0..max {
            let bit = self.ring.seq_for(n);
            let datagram = Frame::new(bit, self.payload.clone()).encode(self.config.frame_size);
            self.stats.frames_sent += 1;

            loop {
                self.transport.send(&datagram).await?;
                trace!("프레임 전송: msg={}, bit={}", n, bit);

                let ack = self.await_ack(&datagram).await?;
                if ack == bit {
                    break;
                }

                // 직전 라운드의 늦은 ACK: 다시 보내고 다시 대기
                debug!("ACK 비트 불일치: sent={}, ack={}", bit, ack);
                self.stats.stale_acks += 1;
                self.stats.retransmissions += 1;
            }

            self.stats.messages += 1;
        }

        info!("Stop-and-wait sender done: {}", self.stats.summary());
        Ok(self.stats.clone())
    }

    /// ACK 하나를 읽을 때까지 대기. 타임아웃마다 `datagram` 재전송
    async fn await_ack(&mut self, datagram: &[u8]) -> Result<Seq> {
        let timeout = self.config.retransmit_timeout();
        let mut buf = [0u8; SEQ_HEADER_LEN];
        self.timer.start();

        loop {
            let wait = self.timer.remaining(timeout);
            if !self.transport.poll_receive(wait).await? {
                if !self.timer.expired(timeout) {
                    continue;
                }
                self.transport.send(datagram).await?;
                self.stats.retransmissions += 1;
                self.stats.timeouts += 1;
                debug!("ACK 타임아웃, 재전송 (total={})", self.stats.retransmissions);
                self.timer.start();
                continue;
            }

            let len = self.transport.receive(&mut buf).await?;
            match Ack::decode(&buf[..len]) {
                Some(ack) => return Ok(ack.value()),
                None => trace!("짧은 ACK 데이터그램 무시: {} bytes", len),
            }
        }
    }
}

/// 정지-대기 수신자
#[derive(Debug)]
pub struct StopWaitReceiver<T> {
    transport: T,
    config: Config,
    stats: SessionStats,
}

impl<T: Transport> StopWaitReceiver<T> {
    pub fn new(transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config,
            stats: SessionStats::new(),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `max`개 프레임을 교대 순서대로 받고 각각 ACK
    pub async fn run(&mut self, max: u64) -> Result<SessionStats> {
        self.stats = SessionStats::new();
        let mut buf = vec![0u8; self.config.frame_size];
        info!("Stop-and-wait receiver: {} messages", max);

        for n in 0..max {
            loop {
                let len = self.transport.receive(&mut buf).await?;
                let Some(bit) = peek_seq(&buf[..len]) else {
                    trace!("짧은 프레임 무시: {} bytes", len);
                    continue;
                };

                // 기대 비트가 아니어도 받은 비트를 그대로 ACK
                self.transport.acknowledge(&Ack(bit).encode()).await?;
                self.stats.acks_sent += 1;

                if is_expected_sequence(bit, n) {
                    break;
                }
                debug!("중복 프레임: bit={}, expected msg={}", bit, n);
                self.stats.duplicate_frames += 1;
            }

            self.stats.messages += 1;
        }

        self.linger(&mut buf).await?;
        info!("Stop-and-wait receiver done: {}", self.stats.summary());
        Ok(self.stats.clone())
    }

    /// 마지막 ACK이 손실된 송신자를 위해 재전송에 계속 응답
    async fn linger(&mut self, buf: &mut [u8]) -> Result<()> {
        let linger = self.config.linger();
        if linger.is_zero() {
            return Ok(());
        }

        while self.transport.poll_receive(linger).await? {
            let len = self.transport.receive(buf).await?;
            if let Some(bit) = peek_seq(&buf[..len]) {
                self.transport.acknowledge(&Ack(bit).encode()).await?;
                self.stats.acks_sent += 1;
                self.stats.duplicate_frames += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sim::{memory_pair, FaultPlan, Faulty};

    fn config() -> Config {
        Config {
            frame_size: 16,
            ..Config::stop_and_wait()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lossless_session() {
        let (a, b) = memory_pair();
        let mut sender = StopWaitSender::new(a, config()).unwrap();
        let mut receiver = StopWaitReceiver::new(b, config()).unwrap();

        let (sent, received) = tokio::join!(sender.run(10), receiver.run(10));
        let sent = sent.unwrap();
        let received = received.unwrap();

        assert_eq!(sent.messages, 10);
        assert_eq!(sent.retransmissions, 0);
        assert_eq!(received.messages, 10);
        assert_eq!(received.duplicate_frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_frame_is_resent_after_timeout() {
        let (a, b) = memory_pair();
        let a = Faulty::new(a, FaultPlan::new().drop_nth(0));
        let tap = a.tap();
        let mut sender = StopWaitSender::new(a, config()).unwrap();
        let mut receiver = StopWaitReceiver::new(b, config()).unwrap();

        let start = tokio::time::Instant::now();
        let (sent, received) = tokio::join!(sender.run(2), receiver.run(2));

        assert_eq!(sent.unwrap().retransmissions, 1);
        assert_eq!(received.unwrap().duplicate_frames, 0);
        assert_eq!(tap.seqs(), vec![0, 0, 1]);
        assert!(start.elapsed() >= Duration::from_micros(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_ack_triggers_resend() {
        let (a, mut b) = memory_pair();
        // 이전 라운드의 ACK 1이 먼저 도착해 있음
        b.send(&Ack(1).encode()).await.unwrap();

        let mut sender = StopWaitSender::new(a, config()).unwrap();
        let mut receiver = StopWaitReceiver::new(b, config()).unwrap();

        let (sent, received) = tokio::join!(sender.run(1), receiver.run(1));
        let sent = sent.unwrap();

        assert_eq!(sent.messages, 1);
        assert_eq!(sent.stale_acks, 1);
        assert_eq!(sent.retransmissions, 1);
        assert_eq!(received.unwrap().messages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_reacks_duplicate() {
        let (mut a, b) = memory_pair();
        let mut receiver = StopWaitReceiver::new(b, config()).unwrap();

        for bit in [0u32, 0, 1] {
            a.send(&Frame::new(bit, Bytes::new()).encode(16)).await.unwrap();
        }

        let stats = receiver.run(2).await.unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.duplicate_frames, 1);
        assert_eq!(stats.acks_sent, 3);

        let mut acks = Vec::new();
        let mut buf = [0u8; 4];
        while a.poll_receive(Duration::ZERO).await.unwrap() {
            let len = a.receive(&mut buf).await.unwrap();
            acks.push(Ack::decode(&buf[..len]).unwrap().value());
        }
        assert_eq!(acks, vec![0, 0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_linger_answers_lost_final_ack() {
        let (a, b) = memory_pair();
        // 수신자의 첫 ACK (마지막 메시지의 ACK) 손실
        let b = Faulty::new(b, FaultPlan::new().drop_nth(0));
        let config = config().with_linger(Duration::from_millis(10));
        let mut sender = StopWaitSender::new(a, config.clone()).unwrap();
        let mut receiver = StopWaitReceiver::new(b, config).unwrap();

        let (sent, received) = tokio::join!(sender.run(1), receiver.run(1));
        assert_eq!(sent.unwrap().retransmissions, 1);

        let received = received.unwrap();
        assert_eq!(received.messages, 1);
        assert_eq!(received.acks_sent, 2);
    }
}
