//! 客户端连接处理
//!
//! 每个入站连接一个任务，循环执行：发送菜单 -> 读取命令 -> 分发 -> 回复。
//! 需要玩家身份的命令先在同一连接上完成握手，必要时反向连接客户端建立推送通道。

use std::sync::Arc;

use tracing::{debug, info, warn};

use protocol::{
    ClientCommand, Connection, Connector, ErrorCode, Frame, TcpConnector,
    CONNECTION_INFORMATION_MENU, USER_INFORMATION_MENU,
};

use crate::error::{Result, ServerError};
use crate::player::PlayerLink;
use crate::server::ServerState;

/// 单个入站连接的会话
pub struct ConnectionSession {
    conn: Box<dyn Connection>,
    state: Arc<ServerState>,
    /// 本连接建立的推送通道
    opened: Vec<Arc<PlayerLink>>,
    peer: String,
}

impl ConnectionSession {
    pub fn new(conn: Box<dyn Connection>, state: Arc<ServerState>) -> Self {
        let peer = conn.peer_addr().unwrap_or_else(|| "unknown".to_string());
        Self {
            conn,
            state,
            opened: Vec::new(),
            peer,
        }
    }

    /// 请求循环，直到客户端结束连接或传输出错
    pub async fn run(mut self) {
        let mut ended = false;

        loop {
            let request = match self.conn.offer(&ClientCommand::menu()).await {
                Ok(frame) => frame,
                Err(e) if e.is_fatal() => {
                    debug!(peer = %self.peer, error = %e, "connection dropped");
                    break;
                }
                Err(e) => {
                    // 无法解析的帧：回复错误后继续
                    if self.reply(Frame::error(ErrorCode::Transport, e.to_string())).await {
                        continue;
                    }
                    break;
                }
            };

            let command = match ClientCommand::from_frame(&request) {
                Ok(command) => command,
                Err(e) => {
                    warn!(peer = %self.peer, code = request.code, error = %e, "malformed command");
                    if self.reply(Frame::error(ErrorCode::Transport, e.to_string())).await {
                        continue;
                    }
                    break;
                }
            };

            ended = command == ClientCommand::EndConnection;
            let code = command.code();
            let reply = match self.dispatch(command).await {
                Ok(reply) => reply,
                Err(e) if e.is_fatal() => {
                    debug!(peer = %self.peer, error = %e, "connection failed during command");
                    break;
                }
                Err(e) => {
                    debug!(peer = %self.peer, code, error = %e, "command rejected");
                    Frame::error(e.code(), e.to_string())
                }
            };

            if !self.reply(reply).await || ended {
                break;
            }
        }

        if ended {
            self.end().await;
        } else if let Err(e) = self.conn.close().await {
            debug!(peer = %self.peer, error = %e, "failed to close connection");
        }
        info!(peer = %self.peer, "connection closed");
    }

    /// 发送回复，返回连接是否仍可用
    async fn reply(&mut self, frame: Frame) -> bool {
        match self.conn.send(&frame).await {
            Ok(()) => true,
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "failed to send reply");
                false
            }
        }
    }

    async fn dispatch(&mut self, command: ClientCommand) -> Result<Frame> {
        if let ClientCommand::GetBoard { game_id } = &command {
            let json = self.state.registry.get_board(game_id).await?;
            return Ok(Frame::success_with([json]));
        }
        if !command.needs_player() {
            return Ok(Frame::success());
        }

        let link = self.resolve_player().await?;
        let player_id = link.id().as_str();
        let registry = &self.state.registry;

        let reply = match command {
            ClientCommand::CreateGame { color } => {
                let game_id = registry.create_game(player_id, color).await?;
                Frame::success_with([game_id])
            }
            ClientCommand::JoinGame { game_id } => {
                let color = registry.join_game(player_id, &game_id).await?;
                Frame::success_with([color.wire_name()])
            }
            ClientCommand::LeaveGame { game_id } => {
                registry.leave_game(player_id, &game_id).await?;
                Frame::success()
            }
            ClientCommand::MovePiece {
                game_id,
                from_x,
                from_y,
                to_x,
                to_y,
                promotion,
            } => {
                registry
                    .move_piece(player_id, &game_id, (from_x, from_y), (to_x, to_y), &promotion)
                    .await?;
                Frame::success()
            }
            ClientCommand::GetBoard { .. } | ClientCommand::EndConnection => Frame::success(),
        };
        Ok(reply)
    }

    /// 玩家身份握手
    ///
    /// 已知玩家的推送通道探测成功时直接复用；新玩家或通道已失效时，
    /// 需提供回连地址，服务端主动连接后注册。
    async fn resolve_player(&mut self) -> Result<Arc<PlayerLink>> {
        let reply = self.conn.offer(USER_INFORMATION_MENU).await?.into_success()?;
        let player_id = reply.arg(0)?.trim().to_string();
        if player_id.is_empty() {
            return Err(ServerError::Player("Player id must not be empty".to_string()));
        }

        if let Some(link) = self.state.players.get(&player_id).await {
            match link.probe().await {
                Ok(()) => {
                    self.conn.send(&Frame::success()).await?;
                    return Ok(link);
                }
                Err(e) => {
                    // 客户端重连后旧的推送通道已失效，重新建立
                    info!(player = %player_id, error = %e, "stale push channel, reconnecting");
                    self.state.players.remove_if_same(&link).await;
                    link.close().await;
                }
            }
        }

        let reply = self
            .conn
            .offer(CONNECTION_INFORMATION_MENU)
            .await?
            .into_success()?;
        let ip = reply.arg(0)?.trim();
        let port: u16 = reply.arg(1)?.trim().parse().map_err(|_| {
            ServerError::StructuredData(format!("Invalid port: {:?}", reply.args.get(1)))
        })?;
        let addr = push_address(ip, port);

        let config = &self.state.config;
        let channel = TcpConnector::with_timeout(config.connect_timeout())
            .connect(&addr)
            .await
            .map_err(|e| ServerError::PushChannel(format!("Could not connect to {addr}: {e}")))?;

        let link = PlayerLink::new(player_id.clone(), Box::new(channel), config.probe_timeout());
        let (link, inserted) = self.state.players.register(link).await;
        if inserted {
            info!(peer = %self.peer, player = %player_id, push = %addr, "player registered");
            self.opened.push(link.clone());
        } else {
            debug!(player = %player_id, "player registered concurrently, dropping new channel");
        }
        Ok(link)
    }

    /// 关闭入站连接，并清理本连接建立的所有玩家
    async fn end(&mut self) {
        if let Err(e) = self.conn.close().await {
            debug!(peer = %self.peer, error = %e, "failed to close connection");
        }
        for link in std::mem::take(&mut self.opened) {
            // 同一 ID 可能已由其他连接重新注册，此时不能影响新的玩家
            if self.state.players.remove_if_same(&link).await {
                self.state.registry.evict(link.id()).await;
                info!(peer = %self.peer, player = %link.id(), "player disconnected");
            }
            link.close().await;
        }
    }
}

/// 回连地址，IPv6 需要加方括号
fn push_address(ip: &str, port: u16) -> String {
    if ip.contains(':') && !ip.starts_with('[') {
        format!("[{ip}]:{port}")
    } else {
        format!("{ip}:{port}")
    }
}
