//! 网络通信模块
//!
//! 使用 protocol 库的传输层抽象。请求连接上按锁步模式发送命令，
//! 推送连接由服务端反向建立，见 [`PushReceiver`]。

mod push;

pub use push::{serve, PushReceiver};

use std::net::{IpAddr, SocketAddr};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use protocol::{
    BoardSnapshot, ClientCommand, Color, Connection, Connector, Frame, GameId, Listener,
    PlayerId, ProtocolError, PushCommand, Result, TcpConnection, TcpConnector, TcpListener,
    CONNECTION_INFORMATION_MENU, USER_INFORMATION_MENU,
};

/// 服务端代理
///
/// 每个方法对应一条客户端命令，需要身份的命令会自动完成握手。
pub struct ServerProxy {
    conn: TcpConnection,
    player_id: PlayerId,
    /// 推送监听地址（回连用）
    push_ip: IpAddr,
    push_port: u16,
    /// 结束连接后不再终止，等待服务端关闭推送通道
    push_task: Option<JoinHandle<()>>,
}

impl ServerProxy {
    /// 连接服务端，同时在本机开启推送监听
    ///
    /// 返回的接收端会收到服务端推送的所有命令（不含 STILL_ALIVE）。
    pub async fn connect(
        addr: &str,
        player_id: impl Into<PlayerId>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PushCommand>)> {
        let conn = TcpConnector::new().connect(addr).await?;
        let local = conn
            .local_addr()
            .ok_or_else(|| ProtocolError::framing("connection has no local address"))?;
        let push_ip = parse_socket_addr(&local)?.ip();

        let listener = TcpListener::bind(&SocketAddr::new(push_ip, 0).to_string()).await?;
        let push_addr = listener
            .local_addr()
            .ok_or_else(|| ProtocolError::framing("push listener has no local address"))?;
        let push_port = parse_socket_addr(&push_addr)?.port();

        let (tx, rx) = mpsc::unbounded_channel();
        let push_task = PushReceiver::new(listener, tx).spawn();

        let player_id = player_id.into();
        info!(server = %addr, player = %player_id, push = %push_addr, "connected to server");
        Ok((
            Self {
                conn,
                player_id,
                push_ip,
                push_port,
                push_task: Some(push_task),
            },
            rx,
        ))
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    /// 创建对局，返回对局 ID
    pub async fn create_game(&mut self, color: Color) -> Result<GameId> {
        let reply = self.request(ClientCommand::CreateGame { color }).await?;
        Ok(reply.arg(0)?.to_string())
    }

    /// 加入对局，返回分配到的颜色
    pub async fn join_game(&mut self, game_id: &str) -> Result<Color> {
        let reply = self
            .request(ClientCommand::JoinGame {
                game_id: game_id.to_string(),
            })
            .await?;
        let raw = reply.arg(0)?;
        Color::from_wire(raw)
            .ok_or_else(|| ProtocolError::framing(format!("unknown color: {raw:?}")))
    }

    pub async fn leave_game(&mut self, game_id: &str) -> Result<()> {
        self.request(ClientCommand::LeaveGame {
            game_id: game_id.to_string(),
        })
        .await?;
        Ok(())
    }

    /// 走棋，`promotion` 为空时默认升变为后
    pub async fn move_piece(
        &mut self,
        game_id: &str,
        from: (i32, i32),
        to: (i32, i32),
        promotion: &str,
    ) -> Result<()> {
        self.request(ClientCommand::MovePiece {
            game_id: game_id.to_string(),
            from_x: from.0,
            from_y: from.1,
            to_x: to.0,
            to_y: to.1,
            promotion: promotion.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn get_board(&mut self, game_id: &str) -> Result<BoardSnapshot> {
        let reply = self
            .request(ClientCommand::GetBoard {
                game_id: game_id.to_string(),
            })
            .await?;
        Ok(BoardSnapshot::from_json(reply.arg(0)?)?)
    }

    /// 结束连接，服务端随后会关闭推送通道
    pub async fn end_connection(mut self) -> Result<()> {
        self.request(ClientCommand::EndConnection).await?;
        if let Err(e) = self.conn.close().await {
            debug!(player = %self.player_id, error = %e, "failed to close connection");
        }
        self.push_task.take();
        Ok(())
    }

    /// 发送命令并等待最终回复，期间应答服务端的身份握手
    async fn request(&mut self, command: ClientCommand) -> Result<Frame> {
        debug!(player = %self.player_id, code = command.code(), "sending command");
        let mut frame = self.conn.call(&command.to_frame()).await?;

        while frame.is_menu() {
            let menu = frame.arg(0)?.to_string();
            if menu == USER_INFORMATION_MENU {
                self.conn
                    .send(&Frame::success_with([self.player_id.clone()]))
                    .await?;
                frame = self.conn.recv().await?;
                // 已知玩家：先确认握手，再回复命令
                if frame.is_success() {
                    frame = self.conn.recv().await?;
                }
            } else if menu == CONNECTION_INFORMATION_MENU {
                self.conn
                    .send(&Frame::success_with([
                        self.push_ip.to_string(),
                        self.push_port.to_string(),
                    ]))
                    .await?;
                frame = self.conn.recv().await?;
            } else {
                return Err(ProtocolError::framing(format!("unexpected menu: {menu:?}")));
            }
        }

        frame.into_success()
    }
}

impl Drop for ServerProxy {
    fn drop(&mut self) {
        if let Some(task) = self.push_task.take() {
            task.abort();
        }
    }
}

fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|_| ProtocolError::framing(format!("invalid socket address: {addr:?}")))
}
