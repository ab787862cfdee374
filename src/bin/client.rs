//! ARQ 클라이언트 (송신자)
//!
//! 서버로 `max`개 메시지를 보내고 모두 확인받으면 재전송 수 출력
//!
//! 사용법:
//!   cargo run --release --bin arq-client -- [OPTIONS]
//!
//! 예시:
//!   # 슬라이딩 윈도우
//!   cargo run --release --bin arq-client -- --server 127.0.0.1:9000 --max 20000 --window 30
//!
//!   # 정지-대기 + 프레임 10% 손실 시뮬레이션
//!   cargo run --release --bin arq-client -- -s 127.0.0.1:9000 --mode stop-wait --loss 0.1

use std::net::SocketAddr;
use std::str::FromStr;

use bytes::Bytes;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use arq::sim::{FaultPlan, Faulty};
use arq::{Config, StopWaitSender, UdpTransport, WindowSender};

/// ARQ 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    StopWait,
    Window,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop-wait" | "sw" => Ok(Mode::StopWait),
            "window" | "sliding-window" | "gbn" => Ok(Mode::Window),
            other => Err(format!("알 수 없는 모드: {other}")),
        }
    }
}

/// 클라이언트 설정
struct ClientConfig {
    bind_addr: SocketAddr,
    server_addr: SocketAddr,
    mode: Mode,
    max: u64,
    loss: f64,
    seed: u64,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            server_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            mode: Mode::Window,
            max: 20_000,
            loss: 0.0,
            seed: 0,
            config: Config::default(),
        }
    }
}

/// `args[i]` 다음 값을 파싱. 실패하면 종료
fn value<T: FromStr>(args: &[String], i: usize, flag: &str) -> T
where
    T::Err: std::fmt::Display,
{
    let Some(raw) = args.get(i + 1) else {
        eprintln!("{flag}: 값 필요");
        std::process::exit(2);
    };
    raw.parse().unwrap_or_else(|e| {
        eprintln!("{flag}: 유효하지 않은 값 {raw:?}: {e}");
        std::process::exit(2);
    })
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = value(&args, i, "--bind");
                i += 1;
            }
            "--server" | "-s" => {
                config.server_addr = value(&args, i, "--server");
                i += 1;
            }
            "--mode" | "-m" => {
                config.mode = value(&args, i, "--mode");
                i += 1;
            }
            "--max" | "-n" => {
                config.max = value(&args, i, "--max");
                i += 1;
            }
            "--window" | "-w" => {
                config.config.window_size = value(&args, i, "--window");
                i += 1;
            }
            "--frame-size" => {
                config.config.frame_size = value(&args, i, "--frame-size");
                i += 1;
            }
            "--timeout-us" => {
                config.config.retransmit_timeout_us = value(&args, i, "--timeout-us");
                i += 1;
            }
            "--loss" => {
                config.loss = value(&args, i, "--loss");
                i += 1;
            }
            "--seed" => {
                config.seed = value(&args, i, "--seed");
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    r#"ARQ Client - 신뢰성 있는 데이터그램 송신자

사용법:
  cargo run --release --bin arq-client -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:0 = 자동 할당)
  -s, --server <ADDR>     서버 주소 (기본: 127.0.0.1:9000)
  -m, --mode <MODE>       stop-wait | window (기본: window)
  -n, --max <N>           세션 메시지 수, 서버와 동일해야 함 (기본: 20000)
  -w, --window <N>        윈도우 크기, 서버와 동일해야 함 (기본: 30)
  --frame-size <BYTES>    프레임 크기 (기본: 1460)
  --timeout-us <US>       ACK 타임아웃 마이크로초 (기본: 1500)
  --loss <RATIO>          프레임 손실 시뮬레이션 비율 0.0~1.0 (기본: 0)
  --seed <N>              손실 시뮬레이션 시드 (기본: 0)
  -h, --help              이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("알 수 없는 옵션: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG로 조정)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args();
    let config = client_config.config.clone();
    config.validate()?;

    info!("ARQ Client starting...");
    info!("Server address: {}", client_config.server_addr);
    info!("Mode: {:?}", client_config.mode);
    info!("Messages: {}", client_config.max);
    info!("Window size: {}", config.window_size);
    info!("Retransmit timeout: {}us", config.retransmit_timeout_us);

    let transport = UdpTransport::connect(client_config.bind_addr, client_config.server_addr).await?;
    info!("Bound to local address: {}", transport.local_addr()?);
    let transport = Faulty::new(
        transport,
        FaultPlan::random(client_config.loss, 0.0, client_config.seed),
    );

    // 테스트용 페이로드
    let payload = Bytes::from(vec![0xABu8; config.frame_size]);

    let stats = match client_config.mode {
        Mode::StopWait => {
            StopWaitSender::new(transport, config)?
                .with_payload(payload)
                .run(client_config.max)
                .await?
        }
        Mode::Window => {
            WindowSender::new(transport, config)?
                .with_payload(payload)
                .run(client_config.max)
                .await?
        }
    };

    info!("Transfer complete!");
    info!("  Retransmissions: {}", stats.retransmissions);
    info!("  {}", stats.summary());
    Ok(())
}
