//! 프레임과 ACK 와이어 포맷
//!
//! 모든 데이터그램의 첫 4바이트(little-endian u32)가 시퀀스 번호.
//! 나머지는 양 끝이 미리 합의한 고정 크기의 불투명 페이로드.
//! 체크섬, 길이, 플래그 없음 (무결성은 전송 계층 책임).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::seq::Seq;
use crate::SEQ_HEADER_LEN;

/// 데이터 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 시퀀스 번호
    pub seq: Seq,

    /// 불투명 페이로드
    pub payload: Bytes,
}

impl Frame {
    pub fn new(seq: Seq, payload: Bytes) -> Self {
        Self { seq, payload }
    }

    /// 고정 크기 데이터그램으로 직렬화
    /// 페이로드는 `frame_size - 4`에 맞춰 자르거나 0으로 채움
    pub fn encode(&self, frame_size: usize) -> Bytes {
        let body_len = frame_size.saturating_sub(SEQ_HEADER_LEN);
        let mut buf = BytesMut::with_capacity(SEQ_HEADER_LEN + body_len);
        buf.put_u32_le(self.seq);

        let copy_len = self.payload.len().min(body_len);
        buf.put_slice(&self.payload[..copy_len]);
        buf.put_bytes(0, body_len - copy_len);
        buf.freeze()
    }
}

/// 확인 응답
///
/// 정지-대기: 확인하는 비트를 그대로 반송.
/// 슬라이딩 윈도우: 누적 값, 수신자가 다음에 기대하는 시퀀스 번호.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack(pub Seq);

impl Ack {
    pub fn value(&self) -> Seq {
        self.0
    }

    pub fn encode(&self) -> [u8; SEQ_HEADER_LEN] {
        self.0.to_le_bytes()
    }

    pub fn decode(datagram: &[u8]) -> Option<Self> {
        peek_seq(datagram).map(Ack)
    }
}

/// 데이터그램의 시퀀스 필드만 읽음
pub fn peek_seq(datagram: &[u8]) -> Option<Seq> {
    if datagram.len() < SEQ_HEADER_LEN {
        return None;
    }
    let mut header = &datagram[..SEQ_HEADER_LEN];
    Some(header.get_u32_le())
}
