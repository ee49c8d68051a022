//! 推送接收
//!
//! 服务端通过反向连接推送 UPDATE_GAME 等命令，这里是客户端一侧的应答方。

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use protocol::{Connection, ErrorCode, Frame, Listener, PushCommand, TcpListener};

/// 推送接收器
///
/// 依次接受服务端的反向连接，对每条推送回复确认，并转发给应用层。
pub struct PushReceiver {
    listener: TcpListener,
    tx: mpsc::UnboundedSender<PushCommand>,
}

impl PushReceiver {
    pub fn new(listener: TcpListener, tx: mpsc::UnboundedSender<PushCommand>) -> Self {
        Self { listener, tx }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    debug!(peer = ?conn.peer_addr(), "push channel opened");
                    if serve(conn, &self.tx).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept push channel");
                    return;
                }
            }
        }
    }
}

/// 处理一条推送连接，直到 END_CONNECTION 或连接断开
///
/// 服务端发送了 END_CONNECTION 时返回 `true`。
pub async fn serve<C: Connection>(mut conn: C, tx: &mpsc::UnboundedSender<PushCommand>) -> bool {
    let mut ended = false;
    loop {
        let frame = match conn.offer(&PushCommand::menu()).await {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => {
                debug!(error = %e, "push channel closed");
                break;
            }
            Err(e) => {
                if conn.send(&Frame::error(ErrorCode::Transport, e.to_string())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let reply = match PushCommand::from_frame(&frame) {
            Ok(command) => {
                let finished = command == PushCommand::EndConnection;
                if command != PushCommand::StillAlive && tx.send(command).is_err() {
                    debug!("push receiver dropped by application");
                }
                if finished {
                    let _ = conn.send(&Frame::success()).await;
                    info!("server ended push channel");
                    ended = true;
                    break;
                }
                Frame::success()
            }
            Err(e) => {
                warn!(code = frame.code, error = %e, "malformed push");
                Frame::error(ErrorCode::StructuredData, e.to_string())
            }
        };

        if conn.send(&reply).await.is_err() {
            break;
        }
    }

    let _ = conn.close().await;
    ended
}
