//! ARQ 서버 (수신자)
//!
//! 첫 데이터그램을 보낸 피어와 연결하고 `max`개 메시지를 받아 ACK
//!
//! 사용법:
//!   cargo run --release --bin arq-server -- [OPTIONS]
//!
//! 예시:
//!   # 슬라이딩 윈도우, 20,000 메시지
//!   cargo run --release --bin arq-server -- --bind 0.0.0.0:9000 --max 20000 --window 30
//!
//!   # 정지-대기 + ACK 10% 손실 시뮬레이션
//!   cargo run --release --bin arq-server -- --mode stop-wait --loss 0.1 --linger-ms 200

use std::net::SocketAddr;
use std::str::FromStr;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use arq::sim::{FaultPlan, Faulty};
use arq::{Config, StopWaitReceiver, UdpTransport, WindowReceiver};

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

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    mode: Mode,
    max: u64,
    loss: f64,
    seed: u64,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
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

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = value(&args, i, "--bind");
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
            "--linger-ms" => {
                config.config.linger_ms = value(&args, i, "--linger-ms");
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
                    r#"ARQ Server - 신뢰성 있는 데이터그램 수신자

사용법:
  cargo run --release --bin arq-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:9000)
  -m, --mode <MODE>       stop-wait | window (기본: window)
  -n, --max <N>           세션 메시지 수, 클라이언트와 동일해야 함 (기본: 20000)
  -w, --window <N>        윈도우 크기, 클라이언트와 동일해야 함 (기본: 30)
  --frame-size <BYTES>    프레임 크기 (기본: 1460)
  --linger-ms <MS>        마지막 메시지 후 재전송 응답 시간 (기본: 0)
  --loss <RATIO>          ACK 손실 시뮬레이션 비율 0.0~1.0 (기본: 0)
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

    let server_config = parse_args();
    let config = server_config.config.clone();
    config.validate()?;

    info!("ARQ Server starting...");
    info!("Mode: {:?}", server_config.mode);
    info!("Messages: {}", server_config.max);
    info!("Window size: {}", config.window_size);
    info!("Frame size: {} bytes", config.frame_size);
    if server_config.loss > 0.0 {
        info!("Simulated ACK loss: {:.1}%", server_config.loss * 100.0);
    }

    let transport = UdpTransport::accept(server_config.bind_addr).await?;
    info!("Serving {} on {}", transport.peer_addr()?, transport.local_addr()?);
    let transport = Faulty::new(
        transport,
        FaultPlan::random(server_config.loss, 0.0, server_config.seed),
    );

    let stats = match server_config.mode {
        Mode::StopWait => {
            StopWaitReceiver::new(transport, config)?
                .run(server_config.max)
                .await?
        }
        Mode::Window => {
            WindowReceiver::new(transport, config)?
                .run(server_config.max)
                .await?
        }
    };

    info!("Session complete!");
    info!("  {}", stats.summary());
    Ok(())
}
