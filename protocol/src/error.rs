//! 错误类型定义

use thiserror::Error;

use crate::message::ErrorCode;

/// 象棋规则错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 无效的位置
    #[error("Field {x},{y} is not on the board")]
    InvalidPosition { x: i32, y: i32 },

    /// 无效的代数记法位置
    #[error("Invalid position: \"{0}\"")]
    InvalidNotation(String),

    /// 没有棋子
    #[error("No figure on field {x},{y}")]
    NoFigure { x: u8, y: u8 },

    /// 无效的走法
    #[error("Figure cannot move to {x},{y}")]
    IllegalDestination { x: u8, y: u8 },

    /// 未知棋子类型
    #[error("Unknown Figure: \"{0}\"")]
    UnknownFigure(String),

    /// 棋盘快照不合法
    #[error("Could not load board: {reason}")]
    InvalidSnapshot { reason: String },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 帧格式错误
    #[error("Malformed frame: {reason}")]
    Framing { reason: String },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 收到了不期望的帧
    #[error("Unexpected frame: expected code {expected}, got {actual}")]
    UnexpectedFrame { expected: u32, actual: u32 },

    /// 对端返回错误码
    #[error("Remote error {code}: {message}")]
    Remote { code: ErrorCode, message: String },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 象棋规则错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

impl ProtocolError {
    /// 构造帧格式错误
    pub fn framing(reason: impl Into<String>) -> Self {
        ProtocolError::Framing {
            reason: reason.into(),
        }
    }

    /// 底层流是否已不可用（IO 错误、关闭、超时）
    ///
    /// 帧格式错误只影响当前这一行，连接仍保持同步。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::ConnectionTimeout
                | ProtocolError::ConnectionClosed
                | ProtocolError::FrameTooLarge { .. }
        )
    }
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
