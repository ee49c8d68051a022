//! 棋盘快照（JSON）
//!
//! 格式：
//! `{"current_turn": 1, "fifty_move_counter": 0, "black": [...], "white": [...]}`，
//! 每个棋子为 `{"type": "pawn", "pos": "e2", "first_turn": -1}`。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::{ChessError, Result};
use crate::piece::{Color, Figure, FigureKind, Position};

/// 快照中的单个棋子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureEntry {
    /// 棋子类型名（pawn, rook, knight, bishop, queen, king）
    #[serde(rename = "type")]
    pub kind: String,
    /// 代数记法位置
    pub pos: String,
    #[serde(default = "never_moved")]
    pub first_turn: i32,
}

fn never_moved() -> i32 {
    -1
}

/// 棋盘快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub current_turn: u32,
    #[serde(alias = "50_move_rule_turns", default)]
    pub fifty_move_counter: u32,
    #[serde(default)]
    pub black: Vec<FigureEntry>,
    #[serde(default)]
    pub white: Vec<FigureEntry>,
}

impl BoardSnapshot {
    /// 从棋盘生成快照
    pub fn from_board(board: &Board) -> Self {
        let entries = |color: Color| {
            board
                .figures(color)
                .iter()
                .map(|figure| FigureEntry {
                    kind: figure.kind.name().to_string(),
                    pos: figure.position.to_algebraic(),
                    first_turn: figure.first_turn,
                })
                .collect()
        };

        Self {
            current_turn: board.current_turn(),
            fifty_move_counter: board.fifty_move_counter(),
            black: entries(Color::Black),
            white: entries(Color::White),
        }
    }

    /// 还原棋盘，拒绝未知棋子、非法位置和重叠的棋子
    pub fn to_board(&self) -> std::result::Result<Board, ChessError> {
        if self.current_turn == 0 {
            return Err(invalid("current_turn must start at 1"));
        }

        let mut board = Board::empty().with_counters(self.current_turn, self.fifty_move_counter);
        let mut occupied = HashSet::new();

        for (color, entries) in [(Color::Black, &self.black), (Color::White, &self.white)] {
            for entry in entries {
                let kind = FigureKind::from_name(&entry.kind).map_err(|e| invalid(e.to_string()))?;
                let position =
                    Position::from_algebraic(&entry.pos).map_err(|e| invalid(e.to_string()))?;
                if !occupied.insert(position) {
                    return Err(invalid(format!("two figures on {}", entry.pos)));
                }

                let mut figure = Figure::new(kind, color, position);
                figure.first_turn = entry.first_turn;
                board.place(figure);
            }
        }

        Ok(board)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, ChessError> {
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))
    }
}

fn invalid(reason: impl Into<String>) -> ChessError {
    ChessError::InvalidSnapshot {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::MoveGenerator;

    #[test]
    fn test_initial_snapshot() {
        let snapshot = BoardSnapshot::from_board(&Board::initial());
        assert_eq!(snapshot.current_turn, 1);
        assert_eq!(snapshot.black.len(), 16);
        assert_eq!(snapshot.white.len(), 16);
        assert!(snapshot.white.contains(&FigureEntry {
            kind: "king".to_string(),
            pos: "e1".to_string(),
            first_turn: -1,
        }));
    }

    #[test]
    fn test_snapshot_preserves_board() {
        let mut board = Board::initial();
        MoveGenerator::play(
            &mut board,
            Position::new_unchecked(4, 6),
            Position::new_unchecked(4, 4),
            FigureKind::Queen,
        )
        .unwrap();

        let json = BoardSnapshot::from_board(&board).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["current_turn"], 2);
        assert_eq!(value["fifty_move_counter"], 0);

        let restored = BoardSnapshot::from_json(&json).unwrap().to_board().unwrap();
        assert_eq!(restored, board);
        assert_eq!(restored.get(Position::new_unchecked(4, 4)).unwrap().first_turn, 1);
    }

    #[test]
    fn test_legacy_counter_key() {
        let json = r#"{"current_turn": 7, "50_move_rule_turns": 12,
            "black": [{"type": "king", "pos": "e8", "first_turn": -1}],
            "white": [{"type": "king", "pos": "e1", "first_turn": 3}]}"#;
        let board = BoardSnapshot::from_json(json).unwrap().to_board().unwrap();

        assert_eq!(board.current_turn(), 7);
        assert_eq!(board.fifty_move_counter(), 12);
        assert_eq!(board.turn_color(), Color::White);
        assert_eq!(board.find_king(Color::White), Some(Position::new_unchecked(4, 7)));
    }

    #[test]
    fn test_rejects_bad_snapshots() {
        let unknown = r#"{"current_turn": 1, "black": [{"type": "dragon", "pos": "a1", "first_turn": -1}]}"#;
        let bad_pos = r#"{"current_turn": 1, "white": [{"type": "pawn", "pos": "z9", "first_turn": -1}]}"#;
        let overlap = r#"{"current_turn": 1,
            "black": [{"type": "pawn", "pos": "a2", "first_turn": -1}],
            "white": [{"type": "rook", "pos": "a2", "first_turn": -1}]}"#;

        for json in [unknown, bad_pos, overlap] {
            let result = BoardSnapshot::from_json(json).and_then(|s| s.to_board());
            assert!(matches!(result, Err(ChessError::InvalidSnapshot { .. })), "{json}");
        }

        assert!(matches!(
            BoardSnapshot::from_json("{\"black\": 3"),
            Err(ChessError::InvalidSnapshot { .. })
        ));
    }
}
