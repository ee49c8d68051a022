//! 服务端错误类型

use thiserror::Error;

use protocol::{ChessError, ErrorCode, ProtocolError};

/// 服务端业务错误
///
/// 除 [`ServerError::Transport`] 中的致命错误外，都会转换为错误回复帧，连接继续。
#[derive(Error, Debug)]
pub enum ServerError {
    /// 对局不存在或已失效
    #[error("{0}")]
    Game(String),

    /// 玩家身份/座位错误
    #[error("{0}")]
    Player(String),

    /// 非法走法
    #[error("{0}")]
    IllegalMove(String),

    /// 结构化数据错误
    #[error("{0}")]
    StructuredData(String),

    /// 推送通道不可用（反向连接失败、已损坏）
    #[error("{0}")]
    PushChannel(String),

    /// 传输层错误
    #[error(transparent)]
    Transport(#[from] ProtocolError),
}

impl ServerError {
    /// 对局不存在
    pub fn unknown_game(game_id: &str) -> Self {
        ServerError::Game(format!("Game with id {game_id} does not exist"))
    }

    /// 对应的线上错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            ServerError::Game(_) => ErrorCode::Game,
            ServerError::Player(_) => ErrorCode::Player,
            ServerError::IllegalMove(_) => ErrorCode::IllegalMove,
            ServerError::StructuredData(_) => ErrorCode::StructuredData,
            ServerError::Transport(ProtocolError::Json(_)) => ErrorCode::StructuredData,
            ServerError::PushChannel(_) | ServerError::Transport(_) => ErrorCode::Transport,
        }
    }

    /// 是否需要断开当前连接
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Transport(e) if e.is_fatal())
    }
}

impl From<ChessError> for ServerError {
    fn from(err: ChessError) -> Self {
        match err {
            ChessError::InvalidSnapshot { .. } => ServerError::StructuredData(err.to_string()),
            _ => ServerError::IllegalMove(err.to_string()),
        }
    }
}

/// 服务端操作结果类型
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ServerError::unknown_game("ABC").code(), ErrorCode::Game);
        assert_eq!(
            ServerError::unknown_game("ABC").to_string(),
            "Game with id ABC does not exist"
        );
        assert_eq!(
            ServerError::from(ChessError::NoFigure { x: 0, y: 3 }).code(),
            ErrorCode::IllegalMove
        );
        assert_eq!(
            ServerError::from(ChessError::InvalidSnapshot {
                reason: "x".to_string()
            })
            .code(),
            ErrorCode::StructuredData
        );
        assert_eq!(
            ServerError::PushChannel("down".to_string()).code(),
            ErrorCode::Transport
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ServerError::Transport(ProtocolError::ConnectionClosed).is_fatal());
        assert!(!ServerError::Transport(ProtocolError::framing("bad")).is_fatal());
        assert!(!ServerError::PushChannel("refused".to_string()).is_fatal());
        assert!(!ServerError::Player("nope".to_string()).is_fatal());
    }
}
