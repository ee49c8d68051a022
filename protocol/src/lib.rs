//! 国际象棋共享协议库
//!
//! 包含:
//! - 棋子、棋盘、位置等核心数据结构
//! - 走法生成和规则判定（将军、将死、困毙、吃过路兵、升变、50 回合规则）
//! - 单行文本帧编解码 (Frame)
//! - 双向命令定义 (ClientCommand, PushCommand)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 棋盘快照 (JSON)

mod board;
mod codec;
mod constants;
mod error;
mod message;
mod moves;
mod piece;
mod snapshot;
mod transport;

pub use board::{Board, GameStatus, MoveOutcome};
pub use codec::Frame;
pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use message::{
    ClientCommand, ErrorCode, GameId, GameUpdate, PlayerId, PushCommand,
    CONNECTION_INFORMATION_MENU, USER_INFORMATION_MENU,
};
pub use moves::{Move, MoveGenerator, MoveReport};
pub use piece::{Color, Figure, FigureKind, Position};
pub use snapshot::{BoardSnapshot, FigureEntry};
pub use transport::{
    Connection, Connector, Listener,
    TcpConnection, TcpConnector, TcpListener,
    FrameReader, FrameWriter,
};
