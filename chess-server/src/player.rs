//! 玩家管理
//!
//! 每个玩家对应一个 [`PlayerLink`]：玩家 ID + 服务端主动建立的反向推送连接。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, warn};

use protocol::{Connection, PlayerId, ProtocolError, PushCommand};

use crate::error::{Result, ServerError};

/// 玩家推送通道
pub struct PlayerLink {
    id: PlayerId,
    /// 推送与探测共用，互斥保证不会在线上交错
    channel: Mutex<Box<dyn Connection>>,
    broken: AtomicBool,
    exchange_timeout: Duration,
}

impl PlayerLink {
    pub fn new(id: PlayerId, channel: Box<dyn Connection>, exchange_timeout: Duration) -> Self {
        Self {
            id,
            channel: Mutex::new(channel),
            broken: AtomicBool::new(false),
            exchange_timeout,
        }
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    /// 推送通道是否已损坏
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// 推送一条命令并等待客户端确认
    ///
    /// 失败或超时后通道被标记为损坏，之后的推送直接失败。
    pub async fn push(&self, command: &PushCommand) -> Result<()> {
        if self.is_broken() {
            return Err(ServerError::PushChannel(format!(
                "Push channel of player {} is broken",
                self.id
            )));
        }

        let frame = command.to_frame()?;
        let mut channel = self.channel.lock().await;
        let exchange = async {
            let reply = channel.call(&frame).await?;
            reply.into_success()
        };

        match timeout(self.exchange_timeout, exchange).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                self.broken.store(true, Ordering::SeqCst);
                Err(e.into())
            }
            Err(_) => {
                self.broken.store(true, Ordering::SeqCst);
                Err(ProtocolError::ConnectionTimeout.into())
            }
        }
    }

    /// 存活探测
    pub async fn probe(&self) -> Result<()> {
        self.push(&PushCommand::StillAlive).await
    }

    /// 通知客户端关闭推送通道，然后关闭连接
    pub async fn close(&self) {
        if let Err(e) = self.push(&PushCommand::EndConnection).await {
            debug!(player = %self.id, error = %e, "END_CONNECTION not acknowledged");
        }
        self.broken.store(true, Ordering::SeqCst);
        let mut channel = self.channel.lock().await;
        if let Err(e) = channel.close().await {
            debug!(player = %self.id, error = %e, "failed to close push channel");
        }
    }
}

impl std::fmt::Debug for PlayerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerLink")
            .field("id", &self.id)
            .field("broken", &self.is_broken())
            .finish()
    }
}

/// 玩家表
#[derive(Default)]
pub struct PlayerTable {
    /// 玩家 ID -> 推送通道
    links: RwLock<HashMap<PlayerId, Arc<PlayerLink>>>,
}

impl PlayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取玩家
    pub async fn get(&self, player_id: &str) -> Option<Arc<PlayerLink>> {
        self.links.read().await.get(player_id).cloned()
    }

    /// 注册玩家
    ///
    /// 若同一 ID 已被并发注册，返回已有的通道和 `false`，调用方负责关闭新通道。
    pub async fn register(&self, link: PlayerLink) -> (Arc<PlayerLink>, bool) {
        let mut links = self.links.write().await;
        if let Some(existing) = links.get(link.id()) {
            return (existing.clone(), false);
        }
        let link = Arc::new(link);
        links.insert(link.id().clone(), link.clone());
        (link, true)
    }

    /// 仅当表中仍是同一个通道时移除
    pub async fn remove_if_same(&self, link: &Arc<PlayerLink>) -> bool {
        let mut links = self.links.write().await;
        match links.get(link.id()) {
            Some(current) if Arc::ptr_eq(current, link) => {
                links.remove(link.id());
                true
            }
            _ => false,
        }
    }

    /// 所有玩家的快照
    pub async fn all(&self) -> Vec<Arc<PlayerLink>> {
        self.links.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }

    /// 推送给指定玩家，失败只记录日志
    pub async fn push(&self, player_id: &str, command: &PushCommand) {
        let Some(link) = self.get(player_id).await else {
            debug!(player = %player_id, "no push channel, dropping push");
            return;
        };
        if let Err(e) = link.push(command).await {
            warn!(player = %player_id, code = command.code(), error = %e, "push failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;

    use async_trait::async_trait;
    use protocol::{ErrorCode, Frame};

    /// 按脚本回复的内存连接
    pub(crate) struct ScriptedConnection {
        incoming: VecDeque<Frame>,
        pub sent: Arc<std::sync::Mutex<Vec<Frame>>>,
        /// 脚本用完后挂起而不是报告连接关闭
        stall: bool,
    }

    impl ScriptedConnection {
        pub(crate) fn new(incoming: Vec<Frame>) -> Self {
            Self {
                incoming: incoming.into(),
                sent: Arc::new(std::sync::Mutex::new(Vec::new())),
                stall: false,
            }
        }

        /// 一个永远确认推送的客户端
        pub(crate) fn acknowledging(pushes: usize) -> Self {
            let mut script = Vec::new();
            for _ in 0..pushes {
                script.push(Frame::menu(PushCommand::menu()));
                script.push(Frame::success());
            }
            Self::new(script)
        }

        pub(crate) fn stalling(mut self) -> Self {
            self.stall = true;
            self
        }
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn send(&mut self, frame: &Frame) -> protocol::Result<()> {
            self.sent.lock().unwrap().push(frame.clone());
            Ok(())
        }

        async fn recv(&mut self) -> protocol::Result<Frame> {
            match self.incoming.pop_front() {
                Some(frame) => Ok(frame),
                None if self.stall => std::future::pending().await,
                None => Err(ProtocolError::ConnectionClosed),
            }
        }

        async fn close(&mut self) -> protocol::Result<()> {
            Ok(())
        }

        fn peer_addr(&self) -> Option<String> {
            None
        }

        fn local_addr(&self) -> Option<String> {
            None
        }
    }

    fn link(id: &str, conn: ScriptedConnection) -> PlayerLink {
        PlayerLink::new(id.to_string(), Box::new(conn), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_push_acknowledged() {
        let conn = ScriptedConnection::acknowledging(1);
        let sent = conn.sent.clone();
        let link = link("p1", conn);

        link.push(&PushCommand::ReceiveMessage("White player has joined".to_string()))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], Frame::new(1, ["White player has joined"]));
        assert!(!link.is_broken());
    }

    #[tokio::test]
    async fn test_push_rejected_marks_broken() {
        let conn = ScriptedConnection::new(vec![
            Frame::menu(PushCommand::menu()),
            Frame::error(ErrorCode::StructuredData, "bad json"),
        ]);
        let link = link("p1", conn);

        let err = link.probe().await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Transport(ProtocolError::Remote {
                code: ErrorCode::StructuredData,
                ..
            })
        ));
        assert!(link.is_broken());

        // 之后直接失败
        assert!(matches!(
            link.probe().await,
            Err(ServerError::PushChannel(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let conn = ScriptedConnection::new(vec![Frame::menu(PushCommand::menu())]).stalling();
        let link = link("p1", conn);

        let err = link.probe().await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Transport(ProtocolError::ConnectionTimeout)
        ));
        assert!(link.is_broken());
    }

    #[tokio::test]
    async fn test_player_table() {
        let table = PlayerTable::new();
        let (first, inserted) = table
            .register(link("p1", ScriptedConnection::acknowledging(0)))
            .await;
        assert!(inserted);

        let (same, inserted) = table
            .register(link("p1", ScriptedConnection::acknowledging(0)))
            .await;
        assert!(!inserted);
        assert!(Arc::ptr_eq(&first, &same));
        assert_eq!(table.len().await, 1);

        let stranger = Arc::new(link("p1", ScriptedConnection::acknowledging(0)));
        assert!(!table.remove_if_same(&stranger).await);
        assert!(table.remove_if_same(&first).await);
        assert!(table.is_empty().await);
        assert!(table.get("p1").await.is_none());
    }
}
