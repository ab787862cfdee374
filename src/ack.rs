//! 누적 ACK 해석 (AckAdvance)
//!
//! 방금 받은 누적 ACK로 송신자의 후미(가장 오래된 미확인 프레임)를 얼마나
//! 옮길 수 있는지 계산. 오래된 윈도우의 중복/지연 ACK, 링 밖의 값은 0.

use std::time::Duration;

use tracing::trace;

use crate::frame::Ack;
use crate::seq::{Seq, SeqRing};
use crate::transport::Transport;
use crate::{Result, SEQ_HEADER_LEN};

/// ACK 폴링 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEvent {
    /// 수신 가능한 ACK 없음
    Idle,

    /// 받았지만 허용 범위 밖 (폐기)
    Stale(Ack),

    /// 후미를 `distance`만큼 전진
    Advance { ack: Ack, distance: u32 },
}

impl AckEvent {
    /// 후미 전진 거리, 범위 [0, window_size]
    pub fn distance(&self) -> u32 {
        match self {
            AckEvent::Advance { distance, .. } => *distance,
            _ => 0,
        }
    }
}

/// `ack`이 `oldest_seq`부터 `window_size`개 미확인 프레임 중 하나 이상을
/// 확인하면 후미 전진 거리, 아니면 0
///
/// 누적 ACK은 "다음 기대 번호"이므로 `oldest_seq + 1 ..= oldest_seq + window_size`
/// 범위만 허용. `oldest_seq` 자신과 그 뒤 `window_size`개는 이전 윈도우의 값.
pub fn ack_advance_distance(ack: Seq, oldest_seq: Seq, ring: SeqRing, window_size: usize) -> u32 {
    if !ring.contains(ack) || !ring.contains(oldest_seq) {
        return 0;
    }

    if (ring.distance(ring.next(oldest_seq), ack) as usize) < window_size {
        ring.distance(oldest_seq, ack)
    } else {
        0
    }
}

/// 최대 `wait` 동안 ACK을 기다려 하나 읽고 해석
/// `wait`이 0이면 블로킹 없이 확인만 함
pub async fn ack_advance<T: Transport>(
    transport: &mut T,
    oldest_seq: Seq,
    ring: SeqRing,
    window_size: usize,
    wait: Duration,
) -> Result<AckEvent> {
    if !transport.poll_receive(wait).await? {
        return Ok(AckEvent::Idle);
    }

    let mut buf = [0u8; SEQ_HEADER_LEN];
    let len = transport.receive(&mut buf).await?;
    let Some(ack) = Ack::decode(&buf[..len]) else {
        trace!("짧은 ACK 데이터그램 무시: {} bytes", len);
        return Ok(AckEvent::Idle);
    };

    let distance = ack_advance_distance(ack.value(), oldest_seq, ring, window_size);
    if distance == 0 {
        Ok(AckEvent::Stale(ack))
    } else {
        Ok(AckEvent::Advance { ack, distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::memory_pair;

    const W: usize = 2;

    fn ring() -> SeqRing {
        SeqRing::for_window(W)
    }

    #[test]
    fn test_accepts_acks_confirming_outstanding_frames() {
        // 미확인 3, 4 → ACK 4는 3 확인, ACK 0은 3과 4 확인
        assert_eq!(ack_advance_distance(4, 3, ring(), W), 1);
        assert_eq!(ack_advance_distance(0, 3, ring(), W), 2);
    }

    #[test]
    fn test_rejects_stale_acks() {
        // ACK 3 = "3을 기다림" → 새로 확인된 것 없음
        assert_eq!(ack_advance_distance(3, 3, ring(), W), 0);
        // 이전 윈도우의 ACK
        assert_eq!(ack_advance_distance(2, 3, ring(), W), 0);
        assert_eq!(ack_advance_distance(1, 3, ring(), W), 0);
    }

    #[test]
    fn test_rejects_malformed_acks() {
        assert_eq!(ack_advance_distance(5, 3, ring(), W), 0);
        assert_eq!(ack_advance_distance(u32::MAX, 0, ring(), W), 0);
    }

    #[test]
    fn test_distance_never_exceeds_window() {
        let ring = SeqRing::for_window(4);
        for oldest in 0..ring.size() {
            for ack in 0..ring.size() {
                let d = ack_advance_distance(ack, oldest, ring, 4);
                assert!(d <= 4);
                assert_eq!(d == 0, ring.distance(oldest, ack) == 0 || ring.distance(oldest, ack) > 4);
            }
        }
    }

    #[tokio::test]
    async fn test_polls_transport() {
        let (mut a, mut b) = memory_pair();

        let idle = ack_advance(&mut a, 0, ring(), W, Duration::ZERO).await.unwrap();
        assert_eq!(idle, AckEvent::Idle);

        b.send(&Ack(0).encode()).await.unwrap();
        b.send(&Ack(1).encode()).await.unwrap();

        let stale = ack_advance(&mut a, 0, ring(), W, Duration::ZERO).await.unwrap();
        assert_eq!(stale, AckEvent::Stale(Ack(0)));
        assert_eq!(stale.distance(), 0);

        let advance = ack_advance(&mut a, 0, ring(), W, Duration::ZERO).await.unwrap();
        assert_eq!(advance.distance(), 1);
    }
}
