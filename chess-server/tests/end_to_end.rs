//! 真实服务端 + 两个客户端的完整流程

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use chess_client::ServerProxy;
use chess_server::{ChessServer, ServerConfig, ServerState};
use protocol::{Color, ErrorCode, GameUpdate, ProtocolError, PushCommand};

async fn start_server() -> String {
    start_server_with(200).await.0
}

async fn start_server_with(liveness_interval_ms: u64) -> (String, Arc<ServerState>) {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        liveness_interval_ms,
        probe_timeout_ms: 1000,
        ..ServerConfig::default()
    };
    let server = ChessServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let state = server.state();
    server.spawn();
    (addr, state)
}

/// 等待下一条推送
async fn next_push(rx: &mut UnboundedReceiver<PushCommand>) -> PushCommand {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("push timed out")
        .expect("push channel closed")
}

/// 跳过文本通知，等待下一条棋盘更新
async fn next_update(rx: &mut UnboundedReceiver<PushCommand>) -> GameUpdate {
    loop {
        if let PushCommand::UpdateGame(update) = next_push(rx).await {
            return update;
        }
    }
}

fn remote_code(err: ProtocolError) -> ErrorCode {
    match err {
        ProtocolError::Remote { code, .. } => code,
        other => panic!("expected error reply, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_join_and_move() {
    let addr = start_server().await;
    let (mut white, mut white_rx) = ServerProxy::connect(&addr, "P1").await.unwrap();
    let (mut black, mut black_rx) = ServerProxy::connect(&addr, "P2").await.unwrap();

    let game_id = white.create_game(Color::White).await.unwrap();
    assert_eq!(game_id.len(), 6);
    assert_eq!(
        next_push(&mut white_rx).await,
        PushCommand::ReceiveMessage("White player has joined".to_string())
    );

    assert_eq!(black.join_game(&game_id).await.unwrap(), Color::Black);
    for rx in [&mut white_rx, &mut black_rx] {
        assert_eq!(
            next_push(rx).await,
            PushCommand::ReceiveMessage("Black player has joined".to_string())
        );
        assert_eq!(next_push(rx).await, PushCommand::StartGame);
    }

    white.move_piece(&game_id, (4, 6), (4, 4), "").await.unwrap();
    for rx in [&mut white_rx, &mut black_rx] {
        let update = next_update(rx).await;
        assert_eq!((update.from_x, update.from_y), (4, 6));
        assert_eq!((update.to_x, update.to_y), (4, 4));
        assert!(!update.game_over);
    }

    let snapshot = black.get_board(&game_id).await.unwrap();
    assert_eq!(snapshot.current_turn, 2);
    assert!(snapshot.white.iter().any(|f| f.kind == "pawn" && f.pos == "e4"));

    white.end_connection().await.unwrap();
    black.end_connection().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_errors_do_not_close_connection() {
    let addr = start_server().await;
    let (mut white, _white_rx) = ServerProxy::connect(&addr, "P1").await.unwrap();
    let (mut black, _black_rx) = ServerProxy::connect(&addr, "P2").await.unwrap();

    let err = white.join_game("NOPE00").await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::Game);

    let game_id = white.create_game(Color::White).await.unwrap();

    // 对手未加入前不能走棋
    let err = white.move_piece(&game_id, (4, 6), (4, 4), "").await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::Player);

    black.join_game(&game_id).await.unwrap();

    let err = white.move_piece(&game_id, (4, 4), (4, 3), "").await.unwrap_err();
    match err {
        ProtocolError::Remote { code, message } => {
            assert_eq!(code, ErrorCode::IllegalMove);
            assert_eq!(message, "No figure on field 4,4");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = black.move_piece(&game_id, (4, 1), (4, 3), "").await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::IllegalMove);

    // 出错后同一连接仍可用
    white.move_piece(&game_id, (4, 6), (4, 4), "").await.unwrap();
    black.move_piece(&game_id, (4, 1), (4, 3), "").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_leave_and_end_connection() {
    let addr = start_server().await;
    let (mut white, mut white_rx) = ServerProxy::connect(&addr, "P1").await.unwrap();
    let (mut black, _black_rx) = ServerProxy::connect(&addr, "P2").await.unwrap();

    let game_id = white.create_game(Color::White).await.unwrap();
    black.join_game(&game_id).await.unwrap();

    // 跳过加入通知和开局
    for _ in 0..3 {
        next_push(&mut white_rx).await;
    }

    black.end_connection().await.unwrap();
    assert_eq!(
        next_push(&mut white_rx).await,
        PushCommand::ReceiveMessage("Black player has left".to_string())
    );

    white.leave_game(&game_id).await.unwrap();
    let err = white.get_board(&game_id).await.unwrap_err();
    assert_eq!(remote_code(err), ErrorCode::Game);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_after_drop_keeps_seat() {
    // 存活检测间隔足够长，旧通道只能由握手发现
    let (addr, state) = start_server_with(60_000).await;
    let (mut white, _white_rx) = ServerProxy::connect(&addr, "P1").await.unwrap();
    let (mut black, mut black_rx) = ServerProxy::connect(&addr, "P2").await.unwrap();

    let game_id = white.create_game(Color::White).await.unwrap();
    black.join_game(&game_id).await.unwrap();
    let stale = state.players.get("P1").await.unwrap();

    // 不发送 END_CONNECTION 直接断开
    drop(white);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut white, mut white_rx) = ServerProxy::connect(&addr, "P1").await.unwrap();
    white.move_piece(&game_id, (4, 6), (4, 4), "").await.unwrap();

    for rx in [&mut white_rx, &mut black_rx] {
        let update = next_update(rx).await;
        assert_eq!((update.to_x, update.to_y), (4, 4));
    }

    let current = state.players.get("P1").await.unwrap();
    assert!(!Arc::ptr_eq(&current, &stale));
    assert!(stale.is_broken());
    assert!(!current.is_broken());
    assert_eq!(state.registry.game_of("P1").await, Some(game_id.clone()));

    let snapshot = black.get_board(&game_id).await.unwrap();
    assert_eq!(snapshot.current_turn, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_client_is_evicted() {
    let (addr, state) = start_server_with(200).await;
    let (mut white, _white_rx) = ServerProxy::connect(&addr, "P1").await.unwrap();
    let (mut black, mut black_rx) = ServerProxy::connect(&addr, "P2").await.unwrap();

    let game_id = white.create_game(Color::White).await.unwrap();
    black.join_game(&game_id).await.unwrap();

    drop(white);

    let left = PushCommand::ReceiveMessage("White player has left".to_string());
    while next_push(&mut black_rx).await != left {}

    assert!(state.players.get("P1").await.is_none());
    assert_eq!(state.registry.game_of("P1").await, None);
    assert_eq!(state.registry.game_of("P2").await, Some(game_id.clone()));

    // 留下的玩家仍可正常请求
    let snapshot = black.get_board(&game_id).await.unwrap();
    assert_eq!(snapshot.current_turn, 1);
}
