//! 存活检测
//!
//! 定时向每个玩家的推送通道发送 STILL_ALIVE，探测失败的玩家被移除并强制离开所在对局。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use protocol::PlayerId;

use crate::player::PlayerTable;
use crate::registry::GameRegistry;

pub struct LivenessSweeper {
    players: Arc<PlayerTable>,
    registry: Arc<GameRegistry>,
    interval: Duration,
}

impl LivenessSweeper {
    pub fn new(players: Arc<PlayerTable>, registry: Arc<GameRegistry>, interval: Duration) -> Self {
        Self {
            players,
            registry,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = self.sweep().await;
            if !evicted.is_empty() {
                info!(count = evicted.len(), players = ?evicted, "evicted unresponsive players");
            }
        }
    }

    /// 并发探测所有玩家，返回被移除的玩家
    pub async fn sweep(&self) -> Vec<PlayerId> {
        let mut probes = JoinSet::new();
        for link in self.players.all().await {
            probes.spawn(async move {
                let result = link.probe().await;
                (link, result)
            });
        }

        let mut evicted = Vec::new();
        while let Some(joined) = probes.join_next().await {
            let Ok((link, result)) = joined else {
                continue;
            };
            let Err(e) = result else {
                continue;
            };

            debug!(player = %link.id(), error = %e, "liveness probe failed");
            // 期间玩家可能已用新通道重新注册
            if self.players.remove_if_same(&link).await {
                self.registry.evict(link.id()).await;
                link.close().await;
                evicted.push(link.id().clone());
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use protocol::{Color, Frame, PushCommand};

    use crate::player::tests::ScriptedConnection;
    use crate::player::PlayerLink;
    use crate::registry::BoardLayout;

    fn link(id: &str, conn: ScriptedConnection) -> PlayerLink {
        PlayerLink::new(id.to_string(), Box::new(conn), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_sweep_evicts_dead_players() {
        let players = Arc::new(PlayerTable::new());
        let registry = Arc::new(GameRegistry::new(players.clone(), BoardLayout::Standard));

        // p1 确认所有推送，p2 在加入对局后失联
        let alive = ScriptedConnection::acknowledging(8);
        let alive_sent = alive.sent.clone();
        players.register(link("p1", alive)).await;
        players
            .register(link("p2", ScriptedConnection::acknowledging(2).stalling()))
            .await;

        let game_id = registry.create_game("p1", Color::White).await.unwrap();
        registry.join_game("p2", &game_id).await.unwrap();

        let sweeper = LivenessSweeper::new(players.clone(), registry.clone(), Duration::from_secs(3));
        let evicted = sweeper.sweep().await;

        assert_eq!(evicted, vec!["p2".to_string()]);
        assert!(players.get("p2").await.is_none());
        assert!(players.get("p1").await.is_some());
        assert_eq!(registry.game_of("p2").await, None);
        assert_eq!(registry.game_of("p1").await, Some(game_id));

        // 留下的玩家收到离开通知
        let sent = alive_sent.lock().unwrap();
        assert!(sent.contains(&Frame::new(1, ["Black player has left"])));
        assert!(sent.contains(&PushCommand::StillAlive.to_frame().unwrap()));
    }

    #[tokio::test]
    async fn test_sweep_keeps_healthy_players() {
        let players = Arc::new(PlayerTable::new());
        let registry = Arc::new(GameRegistry::new(players.clone(), BoardLayout::Standard));
        players
            .register(link("p1", ScriptedConnection::acknowledging(2)))
            .await;

        let sweeper = LivenessSweeper::new(players.clone(), registry, Duration::from_secs(3));
        assert!(sweeper.sweep().await.is_empty());
        assert!(sweeper.sweep().await.is_empty());
        // 脚本用完后连接关闭
        assert_eq!(sweeper.sweep().await, vec!["p1".to_string()]);
        assert!(players.is_empty().await);
    }
}
