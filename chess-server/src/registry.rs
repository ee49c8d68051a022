//! 对局注册表
//!
//! 锁顺序：座位表 -> 对局表，对局锁 -> 座位表 / 对局表。
//! 持有对局表锁时从不等待对局锁。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use protocol::{Board, BoardSnapshot, Color, GameId, PlayerId, GAME_ID_CHARSET, GAME_ID_LEN};

use crate::error::{Result, ServerError};
use crate::game::{GameSession, Outbox};
use crate::player::PlayerTable;

/// 新对局的初始布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardLayout {
    /// 标准开局
    Standard,
    /// 从快照文件加载（每次创建对局时读取）
    File(PathBuf),
}

impl BoardLayout {
    pub async fn load(&self) -> Result<Board> {
        match self {
            BoardLayout::Standard => Ok(Board::initial()),
            BoardLayout::File(path) => {
                let json = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ServerError::StructuredData(format!(
                        "Could not load board: {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(BoardSnapshot::from_json(&json)?.to_board()?)
            }
        }
    }
}

type SharedSession = Arc<Mutex<GameSession>>;

/// 对局注册表
pub struct GameRegistry {
    games: RwLock<HashMap<GameId, SharedSession>>,
    /// 玩家 ID -> 当前所在对局
    seats: Mutex<HashMap<PlayerId, GameId>>,
    players: Arc<PlayerTable>,
    layout: BoardLayout,
}

impl GameRegistry {
    pub fn new(players: Arc<PlayerTable>, layout: BoardLayout) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            seats: Mutex::new(HashMap::new()),
            players,
            layout,
        }
    }

    /// 创建对局，返回对局 ID
    pub async fn create_game(&self, player_id: &str, color: Color) -> Result<GameId> {
        let board = self.layout.load().await?;
        let mut outbox = Outbox::new();

        let mut seats = self.seats.lock().await;
        if let Some(current) = seats.get(player_id) {
            return Err(ServerError::Player(format!(
                "Player is already part of game {current}"
            )));
        }

        let game_id = {
            let mut games = self.games.write().await;
            let game_id = loop {
                let candidate = generate_game_id();
                if !games.contains_key(&candidate) {
                    break candidate;
                }
            };
            let session = GameSession::create(
                game_id.clone(),
                player_id.to_string(),
                color,
                board,
                &mut outbox,
            );
            games.insert(game_id.clone(), Arc::new(Mutex::new(session)));
            game_id
        };
        seats.insert(player_id.to_string(), game_id.clone());
        drop(seats);

        info!(game = %game_id, player = %player_id, color = color.wire_name(), "game created");
        outbox.flush(&self.players).await;
        Ok(game_id)
    }

    /// 加入对局，返回分配到的颜色
    pub async fn join_game(&self, player_id: &str, game_id: &str) -> Result<Color> {
        let session = self.session(game_id).await?;

        {
            let mut seats = self.seats.lock().await;
            if let Some(current) = seats.get(player_id) {
                return Err(ServerError::Player(format!(
                    "Player is already part of game {current}"
                )));
            }
            seats.insert(player_id.to_string(), game_id.to_string());
        }

        let mut session = session.lock().await;
        let mut outbox = Outbox::new();
        match session.join(player_id.to_string(), &mut outbox) {
            Ok(color) => {
                info!(game = %game_id, player = %player_id, color = color.wire_name(), "player joined");
                outbox.flush(&self.players).await;
                Ok(color)
            }
            Err(e) => {
                drop(session);
                self.release_seat(player_id, game_id).await;
                Err(e)
            }
        }
    }

    /// 离开对局，座位全空时移除对局
    pub async fn leave_game(&self, player_id: &str, game_id: &str) -> Result<()> {
        let session = self.session(game_id).await?;
        let mut session = session.lock().await;

        let mut outbox = Outbox::new();
        let color = session.leave(player_id, &mut outbox)?;
        self.release_seat(player_id, game_id).await;
        info!(game = %game_id, player = %player_id, color = color.wire_name(), "player left");

        outbox.flush(&self.players).await;
        if session.is_empty() {
            self.remove_session(&mut session).await;
        }
        Ok(())
    }

    /// 走棋，对局结束时移除对局
    pub async fn move_piece(
        &self,
        player_id: &str,
        game_id: &str,
        from: (i32, i32),
        to: (i32, i32),
        promotion: &str,
    ) -> Result<()> {
        let session = self.session(game_id).await?;
        let mut session = session.lock().await;

        let mut outbox = Outbox::new();
        let update = session.move_piece(player_id, from, to, promotion, &mut outbox)?;
        debug!(game = %game_id, player = %player_id, ?from, ?to, "move applied");

        // 持有对局锁推送，保证同一对局的更新顺序
        outbox.flush(&self.players).await;
        if update.game_over {
            info!(game = %game_id, result = %update.message, "game finished");
            self.remove_session(&mut session).await;
        }
        Ok(())
    }

    /// 获取棋盘快照 JSON
    pub async fn get_board(&self, game_id: &str) -> Result<String> {
        let session = self.session(game_id).await?;
        let snapshot = session.lock().await.snapshot()?;
        Ok(snapshot.to_json()?)
    }

    /// 玩家当前所在的对局
    pub async fn game_of(&self, player_id: &str) -> Option<GameId> {
        self.seats.lock().await.get(player_id).cloned()
    }

    /// 强制玩家离开所在对局（断线或被驱逐）
    pub async fn evict(&self, player_id: &str) {
        let Some(game_id) = self.game_of(player_id).await else {
            return;
        };
        match self.leave_game(player_id, &game_id).await {
            Ok(()) => info!(game = %game_id, player = %player_id, "player forced to leave"),
            Err(e) => {
                warn!(game = %game_id, player = %player_id, error = %e, "forced leave failed");
                self.release_seat(player_id, &game_id).await;
            }
        }
    }

    /// 当前对局数量
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }

    pub async fn contains(&self, game_id: &str) -> bool {
        self.games.read().await.contains_key(game_id)
    }

    async fn session(&self, game_id: &str) -> Result<SharedSession> {
        self.games
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| ServerError::unknown_game(game_id))
    }

    /// 关闭并移除对局，释放所有座位（调用方持有对局锁）
    async fn remove_session(&self, session: &mut GameSession) {
        session.close();
        self.games.write().await.remove(session.id());

        let mut seats = self.seats.lock().await;
        for player_id in session.players() {
            if seats.get(&player_id) == Some(session.id()) {
                seats.remove(&player_id);
            }
        }
        info!(game = %session.id(), "game removed");
    }

    async fn release_seat(&self, player_id: &str, game_id: &str) {
        let mut seats = self.seats.lock().await;
        if seats.get(player_id).map(String::as_str) == Some(game_id) {
            seats.remove(player_id);
        }
    }
}

/// 随机生成对局 ID
fn generate_game_id() -> GameId {
    let mut rng = rand::thread_rng();
    (0..GAME_ID_LEN)
        .map(|_| GAME_ID_CHARSET[rng.gen_range(0..GAME_ID_CHARSET.len())] as char)
        .collect()
}
