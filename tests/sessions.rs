//! 송수신 세션 통합 테스트
//!
//! 메모리 링크 + 결함 주입, 가상 시간(`start_paused`)으로 실행.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use arq::sim::{memory_pair, FaultPlan, Faulty};
use arq::{
    Config, StopWaitReceiver, StopWaitSender, Transport, UdpTransport, WindowReceiver,
    WindowSender,
};

fn stop_wait_config() -> Config {
    Config {
        frame_size: 16,
        ..Config::stop_and_wait()
    }
}

fn window_config(window_size: usize) -> Config {
    Config {
        window_size,
        frame_size: 16,
        ..Config::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_wait_lost_ack_is_recovered() {
    let (a, b) = memory_pair();
    let a = Faulty::new(a, FaultPlan::new());
    let sender_tap = a.tap();
    // 두 번째 ACK 손실
    let b = Faulty::new(b, FaultPlan::new().drop_nth(1));

    let mut sender = StopWaitSender::new(a, stop_wait_config()).unwrap();
    let mut receiver = StopWaitReceiver::new(b, stop_wait_config()).unwrap();

    let (sent, received) = tokio::join!(sender.run(3), receiver.run(3));
    let sent = sent.unwrap();
    let received = received.unwrap();

    assert_eq!(sent.messages, 3);
    assert_eq!(sent.retransmissions, 1);
    assert_eq!(sender_tap.count_seq(1), 2);
    assert_eq!(received.messages, 3);
    assert_eq!(received.duplicate_frames, 1);
}

#[tokio::test(start_paused = true)]
async fn test_window_lost_first_frame_goes_back_n() {
    let (a, b) = memory_pair();
    let a = Faulty::new(a, FaultPlan::new().drop_nth(0));
    let sender_tap = a.tap();

    let mut sender = WindowSender::new(a, window_config(2)).unwrap();
    let mut receiver = WindowReceiver::new(b, window_config(2)).unwrap();

    let (sent, received) = tokio::join!(sender.run(5), receiver.run(5));
    let sent = sent.unwrap();
    let received = received.unwrap();

    // 0 손실 → 타임아웃 후 0, 1 모두 재전송
    assert_eq!(&sender_tap.seqs()[..4], &[0, 1, 0, 1]);
    assert_eq!(sent.retransmissions, 2);
    assert_eq!(sent.timeouts, 1);
    assert_eq!(sent.messages, 5);

    // 버퍼에 있던 1의 재전송은 이미 흡수된 프레임
    assert_eq!(received.messages, 5);
    assert_eq!(received.duplicate_frames, 1);
    assert_eq!(receiver.next_expected(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_window_lost_ack_covered_by_cumulative_ack() {
    let (a, b) = memory_pair();
    // ACK 1 손실, 뒤따르는 ACK 2가 두 프레임 모두 확인
    let b = Faulty::new(b, FaultPlan::new().drop_nth(0));

    let mut sender = WindowSender::new(a, window_config(2)).unwrap();
    let mut receiver = WindowReceiver::new(b, window_config(2)).unwrap();

    let (sent, received) = tokio::join!(sender.run(5), receiver.run(5));
    let sent = sent.unwrap();

    assert_eq!(sent.retransmissions, 0);
    assert_eq!(sent.messages, 5);
    assert_eq!(received.unwrap().messages, 5);
    assert_eq!(sender.outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_window_duplicated_frame_counted_once() {
    let (a, b) = memory_pair();
    let a = Faulty::new(a, FaultPlan::new().duplicate_nth(0));

    let mut sender = WindowSender::new(a, window_config(3)).unwrap();
    let mut receiver = WindowReceiver::new(b, window_config(3)).unwrap();

    let (sent, received) = tokio::join!(sender.run(6), receiver.run(6));
    let received = received.unwrap();

    assert_eq!(sent.unwrap().retransmissions, 0);
    assert_eq!(received.messages, 6);
    assert_eq!(received.duplicate_frames, 1);
}

#[tokio::test(start_paused = true)]
async fn test_window_reordered_frames_buffered() {
    let (a, b) = memory_pair();
    // 0이 1 뒤에 도착
    let a = Faulty::new(a, FaultPlan::new().delay_nth(0));

    let mut sender = WindowSender::new(a, window_config(4)).unwrap();
    let mut receiver = WindowReceiver::new(b, window_config(4)).unwrap();

    let (sent, received) = tokio::join!(sender.run(8), receiver.run(8));

    assert_eq!(sent.unwrap().retransmissions, 0);
    let received = received.unwrap();
    assert_eq!(received.messages, 8);
    assert_eq!(received.duplicate_frames, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_wait_completes_under_random_faults() {
    for seed in [1u64, 2, 3] {
        let (a, b) = memory_pair();
        let a = Faulty::new(a, FaultPlan::random(0.2, 0.1, seed));
        let b = Faulty::new(b, FaultPlan::random(0.2, 0.1, seed + 100));
        let config = stop_wait_config().with_linger(Duration::from_millis(50));

        let mut sender = StopWaitSender::new(a, config.clone()).unwrap();
        let mut receiver = StopWaitReceiver::new(b, config).unwrap();

        let (sent, received) = tokio::join!(sender.run(50), receiver.run(50));
        let sent = sent.unwrap();

        assert_eq!(sent.messages, 50);
        assert!(sent.retransmissions > 0, "seed {seed}");
        assert_eq!(received.unwrap().messages, 50);
    }
}

#[tokio::test(start_paused = true)]
async fn test_window_completes_under_random_faults() {
    for (seed, window) in [(1u64, 1usize), (2, 4), (3, 30)] {
        let (a, b) = memory_pair();
        let a = Faulty::new(a, FaultPlan::random(0.2, 0.1, seed));
        let b = Faulty::new(b, FaultPlan::random(0.2, 0.1, seed + 100));
        let config = window_config(window).with_linger(Duration::from_millis(50));

        let mut sender = WindowSender::new(a, config.clone()).unwrap();
        let mut receiver = WindowReceiver::new(b, config).unwrap();

        let (sent, received) = tokio::join!(sender.run(200), receiver.run(200));
        let sent = sent.unwrap();

        assert_eq!(sent.messages, 200, "seed {seed}");
        assert!(sender.peak_outstanding() <= window);
        assert_eq!(sender.outstanding(), 0);
        assert_eq!(received.unwrap().messages, 200);
        assert_eq!(receiver.next_expected(), config_ring_seq(window, 200));
    }
}

/// 메시지 `n`의 시퀀스 번호 (2W+1 링)
fn config_ring_seq(window: usize, n: u64) -> u32 {
    window_config(window).seq_ring().seq_for(n)
}

#[tokio::test(start_paused = true)]
async fn test_window_never_exceeds_window_size() {
    let (a, b) = memory_pair();
    let mut sender = WindowSender::new(a, window_config(5)).unwrap();
    let mut receiver = WindowReceiver::new(b, window_config(5)).unwrap();

    let (sent, received) = tokio::join!(sender.run(100), receiver.run(100));

    assert_eq!(sent.unwrap().frames_sent, 100);
    assert_eq!(received.unwrap().messages, 100);
    assert_eq!(sender.peak_outstanding(), 5);
}

#[tokio::test]
async fn test_udp_loopback_window_session() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = socket.local_addr().unwrap();
    let config = Config::default().with_linger(Duration::from_millis(200));

    let server_config = config.clone();
    let server = async move {
        let transport = UdpTransport::accept_on(socket).await?;
        WindowReceiver::new(transport, server_config)?.run(500).await
    };

    let client = async move {
        let transport = UdpTransport::connect("127.0.0.1:0".parse().unwrap(), server_addr).await?;
        WindowSender::new(transport, config)?
            .with_payload(Bytes::from_static(b"hello"))
            .run(500)
            .await
    };

    let (received, sent) = tokio::join!(server, client);
    assert_eq!(received.unwrap().messages, 500);
    assert_eq!(sent.unwrap().messages, 500);
}

#[tokio::test(start_paused = true)]
async fn test_stray_runt_datagrams_ignored() {
    let (a, mut b) = memory_pair();
    let mut sender = StopWaitSender::new(a, stop_wait_config()).unwrap();

    // 송신측이 ACK 자리에서 짧은 데이터그램을 먼저 받음
    b.send(&[7, 7]).await.unwrap();
    let mut receiver = StopWaitReceiver::new(b, stop_wait_config()).unwrap();

    let (sent, received) = tokio::join!(sender.run(2), receiver.run(2));
    assert_eq!(sent.unwrap().messages, 2);
    assert_eq!(received.unwrap().messages, 2);
}

#[tokio::test]
async fn test_stop_wait_refused_peer_respects_timeout() {
    let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let transport = UdpTransport::connect("127.0.0.1:0".parse().unwrap(), closed_addr)
        .await
        .unwrap();
    let transport = Faulty::new(transport, FaultPlan::new());
    let tap = transport.tap();
    assert!(tap.is_empty());

    let config = stop_wait_config().with_retransmit_timeout(Duration::from_secs(1));
    let mut sender = StopWaitSender::new(transport, config).unwrap();

    // 타임아웃 전에 중단: 첫 전송 외의 재전송이 없어야 함
    let cut = tokio::time::timeout(Duration::from_millis(200), sender.run(1)).await;
    assert!(cut.is_err());
    assert_eq!(tap.len(), 1);
}
