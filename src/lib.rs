//! # UDP ARQ
//!
//! 비신뢰 데이터그램 전송 위의 신뢰성 있는 순서 보장 전달
//!
//! ## 구성
//! - **정지-대기**: 교대 비트, 한 번에 프레임 하나 ([`StopWaitSender`], [`StopWaitReceiver`])
//! - **슬라이딩 윈도우**: 누적 ACK + 타임아웃 시 Go-Back-N 재전송 ([`WindowSender`])
//! - **선택적 버퍼링 수신**: 순서 어긋난 프레임 보관, 누적 ACK만 전송 ([`WindowReceiver`])
//! - **AckAdvance**: 오래된/잘못된 ACK 거부 ([`ack::ack_advance`])
//!
//! 모든 결함은 지연으로 취급: 재전송으로 복구하고 에러로 보고하지 않음.
//! 재시도 횟수 제한 없음 (모든 프레임이 확인될 때까지 계속).

pub mod ack;
pub mod config;
pub mod error;
pub mod frame;
pub mod seq;
pub mod sim;
pub mod stats;
pub mod stop_wait;
pub mod timer;
pub mod transport;
pub mod window_receiver;
pub mod window_sender;

pub use ack::{ack_advance, ack_advance_distance, AckEvent};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{Ack, Frame};
pub use seq::{is_expected_sequence, Seq, SeqRing};
pub use stats::SessionStats;
pub use stop_wait::{StopWaitReceiver, StopWaitSender};
pub use timer::Timer;
pub use transport::{Transport, UdpTransport};
pub use window_receiver::{Acceptance, ReceiveBuffer, WindowReceiver};
pub use window_sender::{OutstandingWindow, WindowSender};

/// 시퀀스 헤더 길이 (바이트, little-endian u32)
pub const SEQ_HEADER_LEN: usize = 4;

/// 기본 프레임 크기 (바이트)
pub const DEFAULT_FRAME_SIZE: usize = 1460;

/// 기본 ACK 타임아웃 (마이크로초)
pub const DEFAULT_RETRANSMIT_TIMEOUT_US: u64 = 1500;
