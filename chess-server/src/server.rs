//! 服务器主逻辑

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use protocol::{Connection, Listener, TcpListener};

use crate::config::ServerConfig;
use crate::connection::ConnectionSession;
use crate::liveness::LivenessSweeper;
use crate::player::PlayerTable;
use crate::registry::{BoardLayout, GameRegistry};

/// accept 失败后的重试间隔
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// 服务器状态（所有连接共享）
pub struct ServerState {
    pub config: ServerConfig,
    pub players: Arc<PlayerTable>,
    pub registry: Arc<GameRegistry>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let players = Arc::new(PlayerTable::new());
        let layout = match &config.initial_board {
            Some(path) => BoardLayout::File(path.clone()),
            None => BoardLayout::Standard,
        };
        let registry = Arc::new(GameRegistry::new(players.clone(), layout));
        Self {
            config,
            players,
            registry,
        }
    }
}

/// 国际象棋服务器
pub struct ChessServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl ChessServer {
    /// 绑定监听地址
    pub async fn bind(config: ServerConfig) -> protocol::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(ServerState::new(config)),
        })
    }

    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        self.state.clone()
    }

    /// 启动存活检测并开始接受连接
    pub async fn run(mut self) {
        let _sweeper = LivenessSweeper::new(
            self.state.players.clone(),
            self.state.registry.clone(),
            self.state.config.liveness_interval(),
        )
        .spawn();

        info!(addr = ?self.local_addr(), "chess server listening");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let peer = conn.peer_addr().unwrap_or_else(|| "unknown".to_string());
                    info!(peer = %peer, "connection accepted");
                    let session = ConnectionSession::new(Box::new(conn), self.state.clone());
                    tokio::spawn(session.run());
                }
                Err(e) => {
                    // 文件描述符耗尽等情况下稍后重试
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }

    /// 在后台任务中运行
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
