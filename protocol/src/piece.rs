//! 棋子定义

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::ChessError;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

impl FigureKind {
    /// 线上/快照中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            FigureKind::Pawn => "pawn",
            FigureKind::Rook => "rook",
            FigureKind::Knight => "knight",
            FigureKind::Bishop => "bishop",
            FigureKind::Queen => "queen",
            FigureKind::King => "king",
        }
    }

    /// 从名称解析（不区分大小写）
    pub fn from_name(name: &str) -> Result<FigureKind, ChessError> {
        match name.to_ascii_lowercase().as_str() {
            "pawn" => Ok(FigureKind::Pawn),
            "rook" => Ok(FigureKind::Rook),
            "knight" => Ok(FigureKind::Knight),
            "bishop" => Ok(FigureKind::Bishop),
            "queen" => Ok(FigureKind::Queen),
            "king" => Ok(FigureKind::King),
            _ => Err(ChessError::UnknownFigure(name.to_string())),
        }
    }

    /// 兵升变可选的目标类型
    pub fn is_promotion_target(&self) -> bool {
        matches!(
            self,
            FigureKind::Rook | FigureKind::Knight | FigureKind::Bishop | FigureKind::Queen
        )
    }
}

impl std::fmt::Display for FigureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// 白方（先手，在下方，y=6..7）
    White,
    /// 黑方（后手，在上方，y=0..1）
    Black,
}

impl Color {
    /// 获取对方阵营
    pub fn opponent(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// 回合计数的奇偶决定走子方：奇数白方，偶数黑方
    pub fn for_turn(turn: u32) -> Color {
        if turn % 2 == 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    /// 展示用名称（"White" / "Black"）
    pub fn fancy_name(&self) -> &'static str {
        match self {
            Color::White => "White",
            Color::Black => "Black",
        }
    }

    /// 线上名称（"WHITE" / "BLACK"）
    pub fn wire_name(&self) -> &'static str {
        match self {
            Color::White => "WHITE",
            Color::Black => "BLACK",
        }
    }

    /// 从线上名称解析（不区分大小写）
    pub fn from_wire(name: &str) -> Option<Color> {
        match name.trim().to_ascii_uppercase().as_str() {
            "WHITE" => Some(Color::White),
            "BLACK" => Some(Color::Black),
            _ => None,
        }
    }

    /// 兵的前进方向（y 轴增量）
    pub fn forward(&self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    /// 兵的起始行
    pub fn pawn_rank(&self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    /// 可以吃过路兵的行
    pub fn en_passant_rank(&self) -> u8 {
        match self {
            Color::White => 3,
            Color::Black => 4,
        }
    }

    /// 升变行
    pub fn promotion_rank(&self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

/// 棋盘位置，(0,0) 为 a8，(7,7) 为 h1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// 列 (0-7)
    pub x: u8,
    /// 行 (0-7)
    pub y: u8,
}

impl Position {
    /// 创建新位置
    pub fn new(x: i32, y: i32) -> Option<Self> {
        let size = BOARD_SIZE as i32;
        if (0..size).contains(&x) && (0..size).contains(&y) {
            Some(Self {
                x: x as u8,
                y: y as u8,
            })
        } else {
            None
        }
    }

    /// 创建新位置，越界时返回错误
    pub fn checked(x: i32, y: i32) -> Result<Self, ChessError> {
        Self::new(x, y).ok_or(ChessError::InvalidPosition { x, y })
    }

    /// 创建新位置（不检查边界，内部使用）
    pub const fn new_unchecked(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// 获取偏移后的位置
    pub fn offset(&self, dx: i8, dy: i8) -> Option<Position> {
        Self::new(self.x as i32 + dx as i32, self.y as i32 + dy as i32)
    }

    /// 转换为数组索引
    pub fn to_index(&self) -> usize {
        self.y as usize * BOARD_SIZE + self.x as usize
    }

    /// 代数记法，例如 (4, 6) -> "e2"
    pub fn to_algebraic(&self) -> String {
        let file = (b'a' + self.x) as char;
        let rank = (b'1' + (7 - self.y)) as char;
        format!("{file}{rank}")
    }

    /// 从代数记法解析
    pub fn from_algebraic(notation: &str) -> Result<Self, ChessError> {
        let bytes = notation.as_bytes();
        if bytes.len() != 2 {
            return Err(ChessError::InvalidNotation(notation.to_string()));
        }
        let x = bytes[0].to_ascii_lowercase() as i32 - b'a' as i32;
        let y = 7 - (bytes[1] as i32 - b'1' as i32);
        Self::new(x, y).ok_or_else(|| ChessError::InvalidNotation(notation.to_string()))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// 棋子
///
/// `position` 始终与其所在格子的坐标一致，由 [`crate::Board`] 维护。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Figure {
    pub kind: FigureKind,
    pub color: Color,
    pub position: Position,
    /// 第一次移动时的回合数，-1 表示从未移动
    pub first_turn: i32,
}

impl Figure {
    /// 创建新棋子
    pub fn new(kind: FigureKind, color: Color, position: Position) -> Self {
        Self {
            kind,
            color,
            position,
            first_turn: -1,
        }
    }

    /// 是否已经移动过
    pub fn has_moved(&self) -> bool {
        self.first_turn >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algebraic_notation() {
        assert_eq!(Position::new_unchecked(4, 6).to_algebraic(), "e2");
        assert_eq!(Position::new_unchecked(0, 0).to_algebraic(), "a8");
        assert_eq!(Position::new_unchecked(7, 7).to_algebraic(), "h1");

        assert_eq!(Position::from_algebraic("e4").unwrap(), Position::new_unchecked(4, 4));
        assert_eq!(Position::from_algebraic("A8").unwrap(), Position::new_unchecked(0, 0));
        assert!(Position::from_algebraic("i1").is_err());
        assert!(Position::from_algebraic("a9").is_err());
        assert!(Position::from_algebraic("e").is_err());
    }

    #[test]
    fn test_position_bounds() {
        assert!(Position::new(0, 0).is_some());
        assert!(Position::new(7, 7).is_some());
        assert!(Position::new(8, 0).is_none());
        assert!(Position::new(0, -1).is_none());
        assert_eq!(
            Position::checked(9, 2),
            Err(ChessError::InvalidPosition { x: 9, y: 2 })
        );
        assert_eq!(Position::new_unchecked(7, 0).offset(1, 0), None);
    }

    #[test]
    fn test_turn_parity() {
        assert_eq!(Color::for_turn(1), Color::White);
        assert_eq!(Color::for_turn(2), Color::Black);
        assert_eq!(Color::for_turn(101), Color::White);
    }

    #[test]
    fn test_color_wire_name() {
        assert_eq!(Color::from_wire("WHITE"), Some(Color::White));
        assert_eq!(Color::from_wire("black"), Some(Color::Black));
        assert_eq!(Color::from_wire("red"), None);
        assert_eq!(Color::Black.wire_name(), "BLACK");
    }

    #[test]
    fn test_figure_kind_names() {
        assert_eq!(FigureKind::from_name("Queen").unwrap(), FigureKind::Queen);
        assert!(matches!(
            FigureKind::from_name("wizard"),
            Err(ChessError::UnknownFigure(_))
        ));
        assert!(!FigureKind::King.is_promotion_target());
        assert!(!FigureKind::Pawn.is_promotion_target());
        assert_eq!(serde_json::to_string(&FigureKind::Knight).unwrap(), "\"knight\"");
    }
}
