//! 棋盘状态

use crate::constants::{BOARD_SIZE, FIFTY_MOVE_LIMIT};
use crate::error::ChessError;
use crate::moves::MoveGenerator;
use crate::piece::{Color, Figure, FigureKind, Position};

/// 后排棋子顺序（从 a 列到 h 列）
const BACK_RANK: [FigureKind; 8] = [
    FigureKind::Rook,
    FigureKind::Knight,
    FigureKind::Bishop,
    FigureKind::Queen,
    FigureKind::King,
    FigureKind::Bishop,
    FigureKind::Knight,
    FigureKind::Rook,
];

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// 8x8 棋盘，索引为 y * 8 + x
    fields: Vec<Option<Figure>>,
    /// 当前回合数，从 1 开始，奇数白方走，偶数黑方走
    current_turn: u32,
    /// 自上次吃子或走兵以来的半回合数
    fifty_move_counter: u32,
    game_over: bool,
    message: String,
}

/// 一次走子的直接结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// 被吃掉的棋子（包括吃过路兵）
    pub captured: Option<Figure>,
    /// 走的是兵
    pub pawn_moved: bool,
}

impl MoveOutcome {
    /// 吃子或走兵会重置 50 回合计数
    pub fn resets_fifty_move_counter(&self) -> bool {
        self.captured.is_some() || self.pawn_moved
    }
}

/// 走子后的局面评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    /// 无特殊情况
    Ongoing,
    /// 指定阵营被将军
    Check(Color),
    /// 将死，记录胜方
    Checkmate { winner: Color },
    /// 指定阵营无子可动
    Stalemate(Color),
    /// 50 回合规则和棋
    FiftyMoveDraw,
}

impl GameStatus {
    /// 对局是否结束
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Ongoing | GameStatus::Check(_))
    }

    /// 推送给玩家的状态描述
    pub fn message(&self) -> String {
        match self {
            GameStatus::Ongoing => String::new(),
            GameStatus::Check(color) => format!("Check! {} has to defend.", color.fancy_name()),
            GameStatus::Checkmate { winner } => format!("Check mate! {} wins.", winner.fancy_name()),
            GameStatus::Stalemate(color) => format!("Stalemate! {} can't move.", color.fancy_name()),
            GameStatus::FiftyMoveDraw => "50-move-rule applies".to_string(),
        }
    }
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            fields: vec![None; BOARD_SIZE * BOARD_SIZE],
            current_turn: 1,
            fifty_move_counter: 0,
            game_over: false,
            message: String::new(),
        }
    }

    /// 创建标准初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for (x, kind) in BACK_RANK.iter().enumerate() {
            let x = x as u8;
            // 黑方在上方（y=0..1）
            board.place(Figure::new(*kind, Color::Black, Position::new_unchecked(x, 0)));
            board.place(Figure::new(
                FigureKind::Pawn,
                Color::Black,
                Position::new_unchecked(x, Color::Black.pawn_rank()),
            ));
            // 白方在下方（y=6..7）
            board.place(Figure::new(
                FigureKind::Pawn,
                Color::White,
                Position::new_unchecked(x, Color::White.pawn_rank()),
            ));
            board.place(Figure::new(*kind, Color::White, Position::new_unchecked(x, 7)));
        }

        board
    }

    /// 设置回合计数（用于加载快照）
    pub fn with_counters(mut self, current_turn: u32, fifty_move_counter: u32) -> Self {
        self.current_turn = current_turn.max(1);
        self.fifty_move_counter = fifty_move_counter;
        self
    }

    pub fn current_turn(&self) -> u32 {
        self.current_turn
    }

    pub fn fifty_move_counter(&self) -> u32 {
        self.fifty_move_counter
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// 最近一次评估的状态描述
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 当前走子方
    pub fn turn_color(&self) -> Color {
        Color::for_turn(self.current_turn)
    }

    /// 获取指定位置的棋子
    pub fn get(&self, pos: Position) -> Option<Figure> {
        self.fields.get(pos.to_index()).copied().flatten()
    }

    /// 放置棋子到它自己记录的位置，覆盖原有棋子
    pub fn place(&mut self, figure: Figure) {
        if let Some(slot) = self.fields.get_mut(figure.position.to_index()) {
            *slot = Some(figure);
        }
    }

    /// 移除指定位置的棋子
    pub fn remove(&mut self, pos: Position) -> Option<Figure> {
        self.fields.get_mut(pos.to_index()).and_then(Option::take)
    }

    /// 移动棋子（不检查规则）
    ///
    /// 负责吃子、吃过路兵以及记录棋子第一次移动的回合。
    pub fn move_figure(&mut self, from: Position, to: Position) -> Result<MoveOutcome, ChessError> {
        let mut figure = self.remove(from).ok_or(ChessError::NoFigure {
            x: from.x,
            y: from.y,
        })?;

        let mut captured = self.remove(to);

        // 兵斜走到空格：吃掉旁边被越过的兵
        if figure.kind == FigureKind::Pawn && from.x != to.x && captured.is_none() {
            let passed = Position::new_unchecked(to.x, from.y);
            if matches!(self.get(passed), Some(f) if f.kind == FigureKind::Pawn && f.color != figure.color)
            {
                captured = self.remove(passed);
            }
        }

        if !figure.has_moved() {
            figure.first_turn = self.current_turn as i32;
        }
        figure.position = to;
        self.place(figure);

        Ok(MoveOutcome {
            captured,
            pawn_moved: figure.kind == FigureKind::Pawn,
        })
    }

    /// 把指定位置的兵替换为新棋子
    pub fn promote(&mut self, pos: Position, kind: FigureKind) -> Result<Figure, ChessError> {
        let pawn = self.get(pos).ok_or(ChessError::NoFigure { x: pos.x, y: pos.y })?;
        let promoted = Figure::new(kind, pawn.color, pos);
        self.place(promoted);
        Ok(promoted)
    }

    /// 进入下一回合并评估局面
    pub fn advance_turn(&mut self, outcome: &MoveOutcome) -> GameStatus {
        self.current_turn += 1;
        if outcome.resets_fifty_move_counter() {
            self.fifty_move_counter = 0;
        } else {
            self.fifty_move_counter += 1;
        }

        let status = self.evaluate();
        self.game_over = status.is_terminal();
        self.message = status.message();
        status
    }

    /// 评估当前走子方的局面：将军/将死优先，其次困毙，最后 50 回合规则
    pub fn evaluate(&self) -> GameStatus {
        let color = self.turn_color();
        if self.find_king(color).is_some() {
            let can_move = MoveGenerator::has_legal_moves(self, color);
            if MoveGenerator::is_in_check(self, color) {
                return if can_move {
                    GameStatus::Check(color)
                } else {
                    GameStatus::Checkmate {
                        winner: color.opponent(),
                    }
                };
            }
            if !can_move {
                return GameStatus::Stalemate(color);
            }
        }
        if self.fifty_move_counter >= FIFTY_MOVE_LIMIT {
            return GameStatus::FiftyMoveDraw;
        }
        GameStatus::Ongoing
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, color: Color) -> Option<Position> {
        self.fields
            .iter()
            .flatten()
            .find(|f| f.kind == FigureKind::King && f.color == color)
            .map(|f| f.position)
    }

    /// 获取指定阵营的所有棋子
    pub fn figures(&self, color: Color) -> Vec<Figure> {
        self.fields
            .iter()
            .flatten()
            .filter(|f| f.color == color)
            .copied()
            .collect()
    }

    /// 获取所有棋子
    pub fn all_figures(&self) -> Vec<Figure> {
        self.fields.iter().flatten().copied().collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}
