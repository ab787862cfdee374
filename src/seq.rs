//! 시퀀스 번호 링 산술
//!
//! 정지-대기는 크기 2 (교대 비트), 슬라이딩 윈도우는 크기 `2 * window + 1`.
//! 모든 모듈러 연산은 이 타입을 통해서만 수행.

/// 시퀀스 번호 (와이어 상 4바이트)
pub type Seq = u32;

/// 유한 시퀀스 번호 링
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRing {
    size: u32,
}

impl SeqRing {
    /// 크기 지정 링 생성
    pub fn new(size: u32) -> Self {
        debug_assert!(size >= 2, "sequence ring needs at least two values");
        Self { size }
    }

    /// 교대 비트 링 (0, 1)
    pub fn alternating_bit() -> Self {
        Self::new(2)
    }

    /// 윈도우 크기에 맞는 링: 현재 윈도우와 직전 윈도우의 ACK를 구분하려면
    /// 링이 `window`보다 커야 함
    pub fn for_window(window_size: usize) -> Self {
        Self::new(window_size as u32 * 2 + 1)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// 링 범위 안의 값인지
    pub fn contains(&self, seq: Seq) -> bool {
        seq < self.size
    }

    /// n번째 메시지의 시퀀스 번호
    pub fn seq_for(&self, message_index: u64) -> Seq {
        (message_index % self.size as u64) as Seq
    }

    /// `seq`에서 `n`만큼 앞
    pub fn add(&self, seq: Seq, n: u32) -> Seq {
        ((seq as u64 + n as u64) % self.size as u64) as Seq
    }

    pub fn next(&self, seq: Seq) -> Seq {
        self.add(seq, 1)
    }

    /// `seq`에서 한 칸 뒤
    pub fn prev(&self, seq: Seq) -> Seq {
        self.add(seq, self.size - 1)
    }

    /// `from`에서 `to`까지 앞 방향 거리, 범위 [0, size)
    pub fn distance(&self, from: Seq, to: Seq) -> u32 {
        ((to as u64 + self.size as u64 - from as u64 % self.size as u64) % self.size as u64) as u32
    }
}

/// 정지-대기 수신자의 루프 조건: 받은 비트가 `expected_index`번째 메시지의
/// 비트와 같은지
pub fn is_expected_sequence(received: Seq, expected_index: u64) -> bool {
    received as u64 == expected_index % 2
}
