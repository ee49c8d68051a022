//! 走法生成和验证
//!
//! 合法性检查采用"复制棋盘、模拟走子、重算攻击格"的方式，
//! 每次查询的代价为 O(走法数 × 全盘攻击计算)，不维护增量攻击表。

use std::collections::HashSet;

use crate::board::{Board, GameStatus};
use crate::error::ChessError;
use crate::piece::{Color, Figure, FigureKind, Position};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const ROOK_DIRECTIONS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];

/// 走法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    /// 起始位置
    pub from: Position,
    /// 目标位置
    pub to: Position,
}

impl Move {
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from.to_algebraic(), self.to.to_algebraic())
    }
}

/// 执行一步合法走子后的完整结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    pub mv: Move,
    pub captured: Option<Figure>,
    /// 实际发生的升变
    pub promoted: Option<FigureKind>,
    /// 走子后轮到的一方面临的局面
    pub status: GameStatus,
}

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 生成指定棋子的所有伪合法走法（不考虑将军）
    pub fn pseudo_legal_moves(board: &Board, figure: &Figure) -> Vec<Move> {
        let from = figure.position;
        if figure.kind == FigureKind::Pawn {
            return Self::pawn_moves(board, figure);
        }

        Self::attacks(board, figure)
            .into_iter()
            .filter(|to| !matches!(board.get(*to), Some(target) if target.color == figure.color))
            .map(|to| Move::new(from, to))
            .collect()
    }

    /// 生成指定位置棋子的所有合法走法（过滤掉会让己方王被将军的走法）
    pub fn legal_moves(board: &Board, from: Position) -> Vec<Move> {
        let figure = match board.get(from) {
            Some(figure) => figure,
            None => return Vec::new(),
        };

        Self::pseudo_legal_moves(board, &figure)
            .into_iter()
            .filter(|mv| Self::keeps_king_safe(board, *mv, figure.color))
            .collect()
    }

    /// 生成指定阵营的所有合法走法
    pub fn generate_legal(board: &Board, color: Color) -> Vec<Move> {
        board
            .figures(color)
            .iter()
            .flat_map(|figure| Self::legal_moves(board, figure.position))
            .collect()
    }

    /// 指定阵营是否还有合法走法
    pub fn has_legal_moves(board: &Board, color: Color) -> bool {
        board
            .figures(color)
            .iter()
            .any(|figure| !Self::legal_moves(board, figure.position).is_empty())
    }

    /// 检查单步走法是否合法
    pub fn is_legal(board: &Board, from: Position, to: Position) -> bool {
        Self::legal_moves(board, from)
            .iter()
            .any(|mv| mv.to == to)
    }

    /// 指定阵营攻击到的所有格子
    pub fn attacked_fields(board: &Board, color: Color) -> HashSet<Position> {
        board
            .figures(color)
            .iter()
            .flat_map(|figure| Self::attacks(board, figure))
            .collect()
    }

    /// 检查指定阵营是否被将军
    pub fn is_in_check(board: &Board, color: Color) -> bool {
        match board.find_king(color) {
            Some(king) => Self::attacked_fields(board, color.opponent()).contains(&king),
            // 没有王，视为不被将军
            None => false,
        }
    }

    /// 执行一步走子：检查合法性、走子、必要时升变，然后进入下一回合
    ///
    /// 失败时棋盘保持不变。
    pub fn play(
        board: &mut Board,
        from: Position,
        to: Position,
        promotion: FigureKind,
    ) -> Result<MoveReport, ChessError> {
        if !promotion.is_promotion_target() {
            return Err(ChessError::UnknownFigure(promotion.name().to_string()));
        }

        let figure = board.get(from).ok_or(ChessError::NoFigure {
            x: from.x,
            y: from.y,
        })?;
        if figure.color != board.turn_color() || !Self::is_legal(board, from, to) {
            return Err(ChessError::IllegalDestination { x: to.x, y: to.y });
        }

        let outcome = board.move_figure(from, to)?;

        let promoted = if figure.kind == FigureKind::Pawn && to.y == figure.color.promotion_rank() {
            board.promote(to, promotion)?;
            Some(promotion)
        } else {
            None
        };

        let status = board.advance_turn(&outcome);

        Ok(MoveReport {
            mv: Move::new(from, to),
            captured: outcome.captured,
            promoted,
            status,
        })
    }

    /// 模拟走子后己方王是否安全
    fn keeps_king_safe(board: &Board, mv: Move, color: Color) -> bool {
        let mut trial = board.clone();
        if trial.move_figure(mv.from, mv.to).is_err() {
            return false;
        }
        !Self::is_in_check(&trial, color)
    }

    /// 棋子控制的格子（不论格子上是否有己方棋子）
    fn attacks(board: &Board, figure: &Figure) -> Vec<Position> {
        let from = figure.position;
        match figure.kind {
            FigureKind::Pawn => [-1i8, 1]
                .iter()
                .filter_map(|dx| from.offset(*dx, figure.color.forward()))
                .collect(),
            FigureKind::Knight => Self::steps(from, &KNIGHT_OFFSETS),
            FigureKind::King => Self::steps(from, &KING_OFFSETS),
            FigureKind::Rook => Self::slides(board, from, &ROOK_DIRECTIONS),
            FigureKind::Bishop => Self::slides(board, from, &BISHOP_DIRECTIONS),
            FigureKind::Queen => {
                let mut fields = Self::slides(board, from, &ROOK_DIRECTIONS);
                fields.extend(Self::slides(board, from, &BISHOP_DIRECTIONS));
                fields
            }
        }
    }

    fn steps(from: Position, offsets: &[(i8, i8)]) -> Vec<Position> {
        offsets
            .iter()
            .filter_map(|(dx, dy)| from.offset(*dx, *dy))
            .collect()
    }

    /// 沿方向滑动，遇到第一个棋子停止（包含该格）
    fn slides(board: &Board, from: Position, directions: &[(i8, i8)]) -> Vec<Position> {
        let mut fields = Vec::new();
        for (dx, dy) in directions {
            let mut current = from;
            while let Some(next) = current.offset(*dx, *dy) {
                fields.push(next);
                if board.get(next).is_some() {
                    break;
                }
                current = next;
            }
        }
        fields
    }

    /// 生成兵的走法：前进、起始行双步、斜吃、吃过路兵
    fn pawn_moves(board: &Board, pawn: &Figure) -> Vec<Move> {
        let from = pawn.position;
        let forward = pawn.color.forward();
        let mut moves = Vec::new();

        if let Some(one) = from.offset(0, forward) {
            if board.get(one).is_none() {
                moves.push(Move::new(from, one));

                if from.y == pawn.color.pawn_rank() {
                    if let Some(two) = from.offset(0, forward * 2) {
                        if board.get(two).is_none() {
                            moves.push(Move::new(from, two));
                        }
                    }
                }
            }
        }

        for dx in [-1i8, 1] {
            let Some(to) = from.offset(dx, forward) else {
                continue;
            };
            match board.get(to) {
                Some(target) if target.color != pawn.color => moves.push(Move::new(from, to)),
                Some(_) => {}
                None => {
                    if Self::can_capture_en_passant(board, pawn, dx) {
                        moves.push(Move::new(from, to));
                    }
                }
            }
        }

        moves
    }

    /// 旁边的对方兵刚在上一回合第一次移动（双步）
    fn can_capture_en_passant(board: &Board, pawn: &Figure, dx: i8) -> bool {
        if pawn.position.y != pawn.color.en_passant_rank() {
            return false;
        }
        let Some(side) = pawn.position.offset(dx, 0) else {
            return false;
        };
        matches!(
            board.get(side),
            Some(passed) if passed.kind == FigureKind::Pawn
                && passed.color != pawn.color
                && passed.first_turn == board.current_turn() as i32 - 1
        )
    }
}
