//! 对局控制
//!
//! [`GameSession`] 持有一个棋盘和黑白两个座位，负责走子顺序和玩家身份检查。
//! 所有推送先收集到 [`Outbox`]，由调用方在持有对局锁时统一发送。

use protocol::{
    BoardSnapshot, Color, FigureKind, GameId, GameUpdate, MoveGenerator, PlayerId, Position,
    PushCommand,
};

use crate::error::{Result, ServerError};
use crate::player::PlayerTable;

/// 对局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 等待玩家（0 或 1 个座位有人）
    AwaitingPlayers,
    /// 对局进行中
    Active,
    /// 对局结束
    Finished,
}

/// 待发送的推送
#[derive(Debug, Default)]
pub struct Outbox {
    pushes: Vec<(PlayerId, PushCommand)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, player_id: &PlayerId, command: PushCommand) {
        self.pushes.push((player_id.clone(), command));
    }

    pub fn broadcast(&mut self, players: &[PlayerId], command: PushCommand) {
        for player_id in players {
            self.send(player_id, command.clone());
        }
    }

    pub fn pushes(&self) -> &[(PlayerId, PushCommand)] {
        &self.pushes
    }

    pub fn is_empty(&self) -> bool {
        self.pushes.is_empty()
    }

    /// 按顺序推送，单个玩家失败不影响其他玩家
    pub async fn flush(self, players: &PlayerTable) {
        for (player_id, command) in self.pushes {
            players.push(&player_id, &command).await;
        }
    }
}

/// 一局棋
#[derive(Debug)]
pub struct GameSession {
    id: GameId,
    board: protocol::Board,
    white: Option<PlayerId>,
    black: Option<PlayerId>,
    /// 已从注册表移除，之后的操作都视为对局不存在
    closed: bool,
}

impl GameSession {
    /// 创建对局，创建者坐在指定颜色
    pub fn create(
        id: GameId,
        player_id: PlayerId,
        color: Color,
        board: protocol::Board,
        outbox: &mut Outbox,
    ) -> Self {
        let mut session = Self {
            id,
            board,
            white: None,
            black: None,
            closed: false,
        };
        *session.seat_mut(color) = Some(player_id);
        outbox.broadcast(&session.players(), seat_notice(color, "joined"));
        session
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn board(&self) -> &protocol::Board {
        &self.board
    }

    pub fn state(&self) -> SessionState {
        if self.board.is_game_over() {
            SessionState::Finished
        } else if self.white.is_some() && self.black.is_some() {
            SessionState::Active
        } else {
            SessionState::AwaitingPlayers
        }
    }

    /// 当前在座的玩家（白方在前）
    pub fn players(&self) -> Vec<PlayerId> {
        self.white.iter().chain(self.black.iter()).cloned().collect()
    }

    /// 玩家所在的座位
    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        if self.white.as_deref() == Some(player_id) {
            Some(Color::White)
        } else if self.black.as_deref() == Some(player_id) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.state() == SessionState::Finished
    }

    /// 标记为已关闭
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// 加入对局，优先坐白方
    pub fn join(&mut self, player_id: PlayerId, outbox: &mut Outbox) -> Result<Color> {
        self.ensure_open()?;
        if self.color_of(&player_id).is_some() {
            return Err(ServerError::Player(format!(
                "Player is already part of game {}",
                self.id
            )));
        }

        let color = if self.white.is_none() {
            Color::White
        } else if self.black.is_none() {
            Color::Black
        } else {
            return Err(ServerError::Player(
                "Both players have already joined".to_string(),
            ));
        };
        *self.seat_mut(color) = Some(player_id);

        let players = self.players();
        outbox.broadcast(&players, seat_notice(color, "joined"));
        if self.state() == SessionState::Active {
            outbox.broadcast(&players, PushCommand::StartGame);
        }
        Ok(color)
    }

    /// 走棋，成功后向双方推送棋盘更新
    pub fn move_piece(
        &mut self,
        player_id: &str,
        from: (i32, i32),
        to: (i32, i32),
        promotion: &str,
        outbox: &mut Outbox,
    ) -> Result<GameUpdate> {
        self.ensure_open()?;
        let color = self
            .color_of(player_id)
            .ok_or_else(|| ServerError::Player("Player is not part of this game".to_string()))?;
        if self.white.is_none() || self.black.is_none() {
            return Err(ServerError::Player(
                "Both players must be added before starting the game".to_string(),
            ));
        }
        if self.board.is_game_over() {
            return Err(ServerError::Game(format!("Game {} is already over", self.id)));
        }

        // 先校验所有参数，失败时棋盘不变
        let promotion = parse_promotion(promotion)?;
        let from = Position::checked(from.0, from.1)?;
        let to = Position::checked(to.0, to.1)?;

        let figure = self.board.get(from).ok_or(protocol::ChessError::NoFigure {
            x: from.x,
            y: from.y,
        })?;
        if figure.color != color {
            return Err(ServerError::IllegalMove(format!(
                "Figure on field {from} belongs to the opponent"
            )));
        }
        if self.board.turn_color() != color {
            return Err(ServerError::IllegalMove(format!(
                "It is {}'s turn",
                self.board.turn_color().fancy_name()
            )));
        }

        let report = MoveGenerator::play(&mut self.board, from, to, promotion)?;

        let update = GameUpdate {
            from_x: from.x as i32,
            from_y: from.y as i32,
            to_x: to.x as i32,
            to_y: to.y as i32,
            promotion_figure: report
                .promoted
                .map(|kind| kind.name().to_string())
                .unwrap_or_default(),
            game_over: self.board.is_game_over(),
            message: self.board.message().to_string(),
        };
        outbox.broadcast(&self.players(), PushCommand::UpdateGame(update.clone()));
        Ok(update)
    }

    /// 离开对局，通知仍在座的玩家
    pub fn leave(&mut self, player_id: &str, outbox: &mut Outbox) -> Result<Color> {
        self.ensure_open()?;
        let color = self
            .color_of(player_id)
            .ok_or_else(|| ServerError::Player("Player is not part of this game".to_string()))?;
        *self.seat_mut(color) = None;
        outbox.broadcast(&self.players(), seat_notice(color, "left"));
        Ok(color)
    }

    /// 当前棋盘快照
    pub fn snapshot(&self) -> Result<BoardSnapshot> {
        self.ensure_open()?;
        Ok(BoardSnapshot::from_board(&self.board))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ServerError::unknown_game(&self.id));
        }
        Ok(())
    }

    fn seat_mut(&mut self, color: Color) -> &mut Option<PlayerId> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

fn seat_notice(color: Color, action: &str) -> PushCommand {
    PushCommand::ReceiveMessage(format!("{} player has {action}", color.fancy_name()))
}

/// 解析升变参数：空字符串为后，只接受车、马、象、后
fn parse_promotion(raw: &str) -> Result<FigureKind> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(FigureKind::Queen);
    }
    match FigureKind::from_name(raw)? {
        kind if kind.is_promotion_target() => Ok(kind),
        _ => Err(ServerError::IllegalMove(format!(
            "Cannot promote to \"{raw}\""
        ))),
    }
}
