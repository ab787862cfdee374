//! 데이터그램 전송 추상화
//!
//! - 비신뢰, 순서 무보장, 손실 가능한 전송
//! - 프로토콜 로직은 이 트레잇만 사용 (소켓 바인딩은 외부 책임)

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::Result;

/// 최대 UDP 데이터그램 크기
const MAX_DATAGRAM: usize = 65_535;

/// 송수신자가 사용하는 전송 능력 집합
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// 데이터그램 하나 전송 (best-effort)
    async fn send(&mut self, datagram: &[u8]) -> Result<()>;

    /// 수신측이 ACK을 돌려보낼 때 사용. 의미상 `send`와 동일
    async fn acknowledge(&mut self, datagram: &[u8]) -> Result<()> {
        self.send(datagram).await
    }

    /// 최대 `wait` 동안 수신 가능한 데이터그램을 기다림 (소비하지 않음)
    /// `Duration::ZERO`이면 즉시 반환하는 폴링
    async fn poll_receive(&mut self, wait: Duration) -> Result<bool>;

    /// 데이터그램 하나를 `buf`로 소비 (블로킹). `buf`보다 길면 잘림
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// `src`를 `buf`에 복사하고 복사한 길이 반환
pub(crate) fn copy_datagram(src: &[u8], buf: &mut [u8]) -> usize {
    let n = src.len().min(buf.len());
    buf[..n].copy_from_slice(&src[..n]);
    n
}

/// 연결된 tokio UDP 소켓 위의 전송
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,

    /// `poll_receive`가 먼저 꺼낸 데이터그램
    pending: Option<Bytes>,

    recv_buf: Vec<u8>,
}

impl UdpTransport {
    /// 송신측: `bind`에 바인딩하고 `peer`로 연결
    pub async fn connect(bind: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(peer).await?;
        info!("UDP transport {} -> {}", socket.local_addr()?, peer);

        Ok(Self::from_socket(socket, None))
    }

    /// 수신측: 첫 데이터그램을 기다린 뒤 그 발신지로 연결
    /// 첫 데이터그램은 다음 `receive`에서 반환
    pub async fn accept(bind: SocketAddr) -> Result<Self> {
        Self::accept_on(UdpSocket::bind(bind).await?).await
    }

    /// 이미 바인딩된 소켓으로 `accept`
    pub async fn accept_on(socket: UdpSocket) -> Result<Self> {
        info!("Waiting for peer on {}", socket.local_addr()?);

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, peer) = socket.recv_from(&mut buf).await?;
        socket.connect(peer).await?;
        info!("Peer connected: {}", peer);

        Ok(Self::from_socket(
            socket,
            Some(Bytes::copy_from_slice(&buf[..len])),
        ))
    }

    fn from_socket(socket: UdpSocket, pending: Option<Bytes>) -> Self {
        Self {
            socket,
            pending,
            recv_buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.peer_addr()?)
    }

    /// 수신 결과 처리. 연결 거부(ICMP)는 손실로 취급
    fn stash(&mut self, result: std::io::Result<usize>) -> Result<bool> {
        match result {
            Ok(len) => {
                self.pending = Some(Bytes::copy_from_slice(&self.recv_buf[..len]));
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!("피어 미응답 (connection refused), 손실로 처리");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, datagram: &[u8]) -> Result<()> {
        match self.socket.send(datagram).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!("전송 거부 (connection refused), 손실로 처리");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn poll_receive(&mut self, wait: Duration) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }

        if wait.is_zero() {
            let result = self.socket.try_recv(&mut self.recv_buf);
            return self.stash(result);
        }

        // 연결 거부로 recv가 일찍 끝나도 마감 시각까지 계속 대기
        let deadline = Instant::now() + wait;
        loop {
            match tokio::time::timeout_at(deadline, self.socket.recv(&mut self.recv_buf)).await {
                Ok(result) => {
                    if self.stash(result)? {
                        return Ok(true);
                    }
                }
                Err(_) => return Ok(false),
            }
        }
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if let Some(datagram) = self.pending.take() {
                return Ok(copy_datagram(&datagram, buf));
            }

            let result = self.socket.recv(&mut self.recv_buf).await;
            self.stash(result)?;
        }
    }
}
