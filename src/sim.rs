//! 네트워크 시뮬레이터
//!
//! - `memory_pair()`: 프로세스 내 데이터그램 링크 (tokio mpsc)
//! - `Faulty<T>`: 임의의 전송을 감싸 송신 데이터그램에 손실/중복/순서 뒤바뀜 적용
//! - `WireTap`: 감싼 전송으로 넘겨진 모든 데이터그램 기록 (테스트 검증용)
//!
//! 스크립트 결함은 송신 데이터그램의 0부터 시작하는 순번으로 지정.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::trace;

use crate::frame::peek_seq;
use crate::seq::Seq;
use crate::transport::{copy_datagram, Transport};
use crate::{Error, Result};

/// 메모리 링크의 한쪽 끝
#[derive(Debug)]
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
    pending: Option<Bytes>,
}

/// 서로 연결된 두 메모리 전송 생성
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    (
        MemoryTransport {
            tx: a_tx,
            rx: a_rx,
            pending: None,
        },
        MemoryTransport {
            tx: b_tx,
            rx: b_rx,
            pending: None,
        },
    )
}

impl Transport for MemoryTransport {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        // 상대가 사라진 뒤의 전송은 손실과 같음
        let _ = self.tx.send(Bytes::copy_from_slice(datagram));
        Ok(())
    }

    async fn poll_receive(&mut self, wait: Duration) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }

        if wait.is_zero() {
            return match self.rx.try_recv() {
                Ok(datagram) => {
                    self.pending = Some(datagram);
                    Ok(true)
                }
                Err(TryRecvError::Empty) => Ok(false),
                Err(TryRecvError::Disconnected) => Err(Error::ConnectionClosed),
            };
        }

        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(datagram)) => {
                self.pending = Some(datagram);
                Ok(true)
            }
            Ok(None) => Err(Error::ConnectionClosed),
            Err(_) => Ok(false),
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let datagram = match self.pending.take() {
            Some(datagram) => datagram,
            None => self.rx.recv().await.ok_or(Error::ConnectionClosed)?,
        };
        Ok(copy_datagram(&datagram, buf))
    }
}

/// 송신 데이터그램에 적용할 결함 모델
#[derive(Debug, Clone)]
pub struct FaultPlan {
    /// 버릴 데이터그램 순번
    pub drop: BTreeSet<u64>,

    /// 두 번 보낼 데이터그램 순번
    pub duplicate: BTreeSet<u64>,

    /// 다음 데이터그램 뒤로 미룰 순번 (순서 뒤바뀜)
    pub delay: BTreeSet<u64>,

    /// 무작위 손실 확률 (0.0 ~ 1.0)
    pub loss_rate: f64,

    /// 무작위 중복 확률 (0.0 ~ 1.0)
    pub duplicate_rate: f64,

    /// 무작위 결함 시드
    pub seed: u64,
}

impl Default for FaultPlan {
    fn default() -> Self {
        // 결함 없음: 투명한 통과
        Self {
            drop: BTreeSet::new(),
            duplicate: BTreeSet::new(),
            delay: BTreeSet::new(),
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            seed: 0,
        }
    }
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// 시드 고정 무작위 손실/중복
    pub fn random(loss_rate: f64, duplicate_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate: loss_rate.clamp(0.0, 1.0),
            duplicate_rate: duplicate_rate.clamp(0.0, 1.0),
            seed,
            ..Self::default()
        }
    }

    pub fn drop_nth(mut self, n: u64) -> Self {
        self.drop.insert(n);
        self
    }

    pub fn duplicate_nth(mut self, n: u64) -> Self {
        self.duplicate.insert(n);
        self
    }

    pub fn delay_nth(mut self, n: u64) -> Self {
        self.delay.insert(n);
        self
    }
}

/// 감싼 전송으로 넘겨진 데이터그램 기록 (결함 적용 전)
#[derive(Debug, Clone, Default)]
pub struct WireTap {
    datagrams: Arc<Mutex<Vec<Bytes>>>,
}

impl WireTap {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, datagram: &[u8]) {
        self.datagrams.lock().push(Bytes::copy_from_slice(datagram));
    }

    /// 기록된 데이터그램 수
    pub fn len(&self) -> usize {
        self.datagrams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.lock().is_empty()
    }

    /// 기록된 데이터그램의 시퀀스 필드 (짧은 데이터그램 제외)
    pub fn seqs(&self) -> Vec<Seq> {
        self.datagrams
            .lock()
            .iter()
            .filter_map(|d| peek_seq(d))
            .collect()
    }

    /// 특정 시퀀스 번호가 기록된 횟수
    pub fn count_seq(&self, seq: Seq) -> usize {
        self.seqs().into_iter().filter(|&s| s == seq).count()
    }
}

/// 결함 주입 전송 래퍼
#[derive(Debug)]
pub struct Faulty<T> {
    inner: T,
    plan: FaultPlan,
    rng: StdRng,
    sent: u64,
    held: Option<Bytes>,
    tap: WireTap,
}

impl<T: Transport> Faulty<T> {
    pub fn new(inner: T, plan: FaultPlan) -> Self {
        Self {
            rng: StdRng::seed_from_u64(plan.seed),
            inner,
            plan,
            sent: 0,
            held: None,
            tap: WireTap::new(),
        }
    }

    /// 이 래퍼의 송신 기록 핸들
    pub fn tap(&self) -> WireTap {
        self.tap.clone()
    }

    async fn transmit(&mut self, datagram: &[u8]) -> Result<()> {
        let n = self.sent;
        self.sent += 1;
        self.tap.record(datagram);

        if self.plan.drop.contains(&n)
            || (self.plan.loss_rate > 0.0 && self.rng.gen_bool(self.plan.loss_rate))
        {
            trace!("sim: 데이터그램 #{} 손실", n);
            return self.release_held().await;
        }

        if self.plan.delay.contains(&n) && self.held.is_none() {
            trace!("sim: 데이터그램 #{} 지연", n);
            self.held = Some(Bytes::copy_from_slice(datagram));
            return Ok(());
        }

        self.inner.send(datagram).await?;

        if self.plan.duplicate.contains(&n)
            || (self.plan.duplicate_rate > 0.0 && self.rng.gen_bool(self.plan.duplicate_rate))
        {
            trace!("sim: 데이터그램 #{} 중복", n);
            self.inner.send(datagram).await?;
        }

        self.release_held().await
    }

    async fn release_held(&mut self) -> Result<()> {
        if let Some(held) = self.held.take() {
            self.inner.send(&held).await?;
        }
        Ok(())
    }
}

impl<T: Transport> Transport for Faulty<T> {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        self.transmit(datagram).await
    }

    async fn acknowledge(&mut self, datagram: &[u8]) -> Result<()> {
        self.transmit(datagram).await
    }

    async fn poll_receive(&mut self, wait: Duration) -> Result<bool> {
        self.inner.poll_receive(wait).await
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.receive(buf).await
    }
}
