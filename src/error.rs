//! 에러 타입 정의
//!
//! 타임아웃, 오래된 ACK, 중복 프레임은 에러가 아님 (재전송/폐기로 처리하고
//! `SessionStats`에만 기록). 여기에는 세션을 계속할 수 없는 경우만 있음.

use thiserror::Error;

/// ARQ 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("유효하지 않은 설정: {reason}")]
    InvalidConfig { reason: String },

    #[error("연결 종료")]
    ConnectionClosed,
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
