//! 消息类型定义
//!
//! 两个方向的命令都以序号作为帧状态码，参数按固定顺序排列。

use serde::{Deserialize, Serialize};

use crate::codec::Frame;
use crate::error::{ProtocolError, Result};
use crate::piece::Color;

/// 玩家 ID（客户端提供的不透明字符串）
pub type PlayerId = String;

/// 对局 ID
pub type GameId = String;

/// 询问玩家 ID 的菜单文本
pub const USER_INFORMATION_MENU: &str = "USER_INFORMATION 0: <id>";

/// 询问反向连接地址的菜单文本
pub const CONNECTION_INFORMATION_MENU: &str = "CONNECTION_INFORMATION 0: <ip>,<port>";

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    /// 对局不存在或已失效
    Game = 1,
    /// 玩家身份/座位错误
    Player = 2,
    /// 非法走法
    IllegalMove = 3,
    /// 结构化数据（JSON）错误
    StructuredData = 4,
    /// 传输层/IO 错误
    Transport = 5,
}

impl ErrorCode {
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Game),
            2 => Some(ErrorCode::Player),
            3 => Some(ErrorCode::IllegalMove),
            4 => Some(ErrorCode::StructuredData),
            5 => Some(ErrorCode::Transport),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.as_u32())
    }
}

/// 客户端发送给服务端的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// 走棋
    MovePiece {
        game_id: GameId,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        /// 升变目标，空字符串表示默认（后）
        promotion: String,
    },
    /// 获取棋盘快照
    GetBoard { game_id: GameId },
    /// 创建对局
    CreateGame { color: Color },
    /// 加入对局
    JoinGame { game_id: GameId },
    /// 离开对局
    LeaveGame { game_id: GameId },
    /// 结束连接
    EndConnection,
}

impl ClientCommand {
    pub const MOVE_PIECE: u32 = 0;
    pub const GET_BOARD: u32 = 1;
    pub const CREATE_GAME: u32 = 2;
    pub const JOIN_GAME: u32 = 3;
    pub const LEAVE_GAME: u32 = 4;
    pub const END_CONNECTION: u32 = 5;

    /// 菜单帧中列出的所有命令
    const MENU: [(&'static str, u32, &'static str); 6] = [
        (
            "MOVE_PIECE",
            Self::MOVE_PIECE,
            "<gameId>,<fromX>,<fromY>,<toX>,<toY>,<promotion>",
        ),
        ("GET_BOARD", Self::GET_BOARD, "<gameId>"),
        ("CREATE_GAME", Self::CREATE_GAME, "<color>"),
        ("JOIN_GAME", Self::JOIN_GAME, "<gameId>"),
        ("LEAVE_GAME", Self::LEAVE_GAME, "<gameId>"),
        ("END_CONNECTION", Self::END_CONNECTION, ""),
    ];

    /// 状态码（命令序号）
    pub fn code(&self) -> u32 {
        match self {
            ClientCommand::MovePiece { .. } => Self::MOVE_PIECE,
            ClientCommand::GetBoard { .. } => Self::GET_BOARD,
            ClientCommand::CreateGame { .. } => Self::CREATE_GAME,
            ClientCommand::JoinGame { .. } => Self::JOIN_GAME,
            ClientCommand::LeaveGame { .. } => Self::LEAVE_GAME,
            ClientCommand::EndConnection => Self::END_CONNECTION,
        }
    }

    /// 是否需要先完成玩家身份握手
    pub fn needs_player(&self) -> bool {
        !matches!(
            self,
            ClientCommand::GetBoard { .. } | ClientCommand::EndConnection
        )
    }

    /// 服务端在读取请求前发送的菜单文本
    pub fn menu() -> String {
        menu_text(&Self::MENU)
    }

    pub fn to_frame(&self) -> Frame {
        match self {
            ClientCommand::MovePiece {
                game_id,
                from_x,
                from_y,
                to_x,
                to_y,
                promotion,
            } => Frame::new(
                self.code(),
                [
                    game_id.clone(),
                    from_x.to_string(),
                    from_y.to_string(),
                    to_x.to_string(),
                    to_y.to_string(),
                    promotion.clone(),
                ],
            ),
            ClientCommand::GetBoard { game_id }
            | ClientCommand::JoinGame { game_id }
            | ClientCommand::LeaveGame { game_id } => Frame::new(self.code(), [game_id.clone()]),
            ClientCommand::CreateGame { color } => Frame::new(self.code(), [color.wire_name()]),
            ClientCommand::EndConnection => Frame::bare(self.code()),
        }
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let command = match frame.code {
            Self::MOVE_PIECE => ClientCommand::MovePiece {
                game_id: frame.arg(0)?.to_string(),
                from_x: int_arg(frame, 1)?,
                from_y: int_arg(frame, 2)?,
                to_x: int_arg(frame, 3)?,
                to_y: int_arg(frame, 4)?,
                // 旧客户端可能省略升变参数
                promotion: frame.args.get(5).cloned().unwrap_or_default(),
            },
            Self::GET_BOARD => ClientCommand::GetBoard {
                game_id: frame.arg(0)?.to_string(),
            },
            Self::CREATE_GAME => {
                let raw = frame.arg(0)?;
                let color = Color::from_wire(raw)
                    .ok_or_else(|| ProtocolError::framing(format!("unknown color: {raw:?}")))?;
                ClientCommand::CreateGame { color }
            }
            Self::JOIN_GAME => ClientCommand::JoinGame {
                game_id: frame.arg(0)?.to_string(),
            },
            Self::LEAVE_GAME => ClientCommand::LeaveGame {
                game_id: frame.arg(0)?.to_string(),
            },
            Self::END_CONNECTION => ClientCommand::EndConnection,
            other => {
                return Err(ProtocolError::framing(format!(
                    "unknown command code {other}"
                )))
            }
        };
        Ok(command)
    }
}

/// 走棋后推送给双方的棋盘增量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub from_x: i32,
    pub from_y: i32,
    pub to_x: i32,
    pub to_y: i32,
    /// 实际执行的升变类型，无升变时为空
    pub promotion_figure: String,
    pub game_over: bool,
    /// 局面状态描述（将军、将死等），无则为空
    pub message: String,
}

/// 服务端通过反向连接推送给客户端的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushCommand {
    /// 棋盘更新
    UpdateGame(GameUpdate),
    /// 文本通知
    ReceiveMessage(String),
    /// 对局开始
    StartGame,
    /// 存活探测
    StillAlive,
    /// 关闭推送通道
    EndConnection,
}

impl PushCommand {
    pub const UPDATE_GAME: u32 = 0;
    pub const RECEIVE_MESSAGE: u32 = 1;
    pub const START_GAME: u32 = 2;
    pub const STILL_ALIVE: u32 = 3;
    pub const END_CONNECTION: u32 = 4;

    const MENU: [(&'static str, u32, &'static str); 5] = [
        ("UPDATE_GAME", Self::UPDATE_GAME, "<json>"),
        ("RECEIVE_MESSAGE", Self::RECEIVE_MESSAGE, "<message>"),
        ("START_GAME", Self::START_GAME, ""),
        ("STILL_ALIVE", Self::STILL_ALIVE, ""),
        ("END_CONNECTION", Self::END_CONNECTION, ""),
    ];

    pub fn code(&self) -> u32 {
        match self {
            PushCommand::UpdateGame(_) => Self::UPDATE_GAME,
            PushCommand::ReceiveMessage(_) => Self::RECEIVE_MESSAGE,
            PushCommand::StartGame => Self::START_GAME,
            PushCommand::StillAlive => Self::STILL_ALIVE,
            PushCommand::EndConnection => Self::END_CONNECTION,
        }
    }

    /// 客户端推送线程在读取推送前发送的菜单文本
    pub fn menu() -> String {
        menu_text(&Self::MENU)
    }

    pub fn to_frame(&self) -> Result<Frame> {
        let frame = match self {
            PushCommand::UpdateGame(update) => {
                Frame::new(self.code(), [serde_json::to_string(update)?])
            }
            PushCommand::ReceiveMessage(text) => Frame::new(self.code(), [text.clone()]),
            PushCommand::StartGame | PushCommand::StillAlive | PushCommand::EndConnection => {
                Frame::bare(self.code())
            }
        };
        Ok(frame)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let command = match frame.code {
            Self::UPDATE_GAME => PushCommand::UpdateGame(serde_json::from_str(frame.arg(0)?)?),
            Self::RECEIVE_MESSAGE => PushCommand::ReceiveMessage(frame.message()),
            Self::START_GAME => PushCommand::StartGame,
            Self::STILL_ALIVE => PushCommand::StillAlive,
            Self::END_CONNECTION => PushCommand::EndConnection,
            other => {
                return Err(ProtocolError::framing(format!(
                    "unknown push code {other}"
                )))
            }
        };
        Ok(command)
    }
}

fn int_arg(frame: &Frame, index: usize) -> Result<i32> {
    let raw = frame.arg(index)?;
    raw.trim()
        .parse()
        .map_err(|_| ProtocolError::framing(format!("argument #{index} is not an integer: {raw:?}")))
}

fn menu_text(entries: &[(&str, u32, &str)]) -> String {
    entries
        .iter()
        .map(|(name, code, args)| format!("{name} - {code}:{args} ; "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_frame() {
        let cmd = ClientCommand::MovePiece {
            game_id: "ABC123".to_string(),
            from_x: 4,
            from_y: 6,
            to_x: 4,
            to_y: 4,
            promotion: String::new(),
        };
        let frame = cmd.to_frame();
        assert_eq!(frame.code, 0);
        assert_eq!(frame.args, vec!["ABC123", "4", "6", "4", "4", ""]);

        let line = frame.encode().unwrap();
        let decoded = ClientCommand::from_frame(&Frame::decode(&line).unwrap()).unwrap();
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn test_create_game_color() {
        let frame = Frame::new(2, ["black"]);
        assert_eq!(
            ClientCommand::from_frame(&frame).unwrap(),
            ClientCommand::CreateGame { color: Color::Black }
        );

        let frame = Frame::new(2, ["GREEN"]);
        assert!(ClientCommand::from_frame(&frame).is_err());
    }

    #[test]
    fn test_bad_client_frames() {
        assert!(ClientCommand::from_frame(&Frame::bare(42)).is_err());
        assert!(ClientCommand::from_frame(&Frame::bare(3)).is_err());
        assert!(ClientCommand::from_frame(&Frame::new(0, ["ID", "x", "6", "4", "4"])).is_err());
        assert_eq!(
            ClientCommand::from_frame(&Frame::bare(5)).unwrap(),
            ClientCommand::EndConnection
        );
    }

    #[test]
    fn test_needs_player() {
        assert!(ClientCommand::CreateGame { color: Color::White }.needs_player());
        assert!(!ClientCommand::GetBoard {
            game_id: "X".to_string()
        }
        .needs_player());
        assert!(!ClientCommand::EndConnection.needs_player());
    }

    #[test]
    fn test_menu_text() {
        let menu = ClientCommand::menu();
        assert!(menu.starts_with("MOVE_PIECE - 0:"));
        assert!(menu.contains("END_CONNECTION - 5: ; "));

        let menu = PushCommand::menu();
        assert!(menu.contains("STILL_ALIVE - 3: ; "));
    }

    #[test]
    fn test_update_game_json() {
        let update = GameUpdate {
            from_x: 4,
            from_y: 6,
            to_x: 4,
            to_y: 4,
            promotion_figure: String::new(),
            game_over: false,
            message: String::new(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["fromX"], 4);
        assert_eq!(json["toY"], 4);
        assert_eq!(json["gameOver"], false);
        assert_eq!(json["promotionFigure"], "");

        let frame = PushCommand::UpdateGame(update.clone()).to_frame().unwrap();
        let line = frame.encode().unwrap();
        let decoded = PushCommand::from_frame(&Frame::decode(&line).unwrap()).unwrap();
        assert_eq!(decoded, PushCommand::UpdateGame(update));
    }

    #[test]
    fn test_push_bad_json() {
        let frame = Frame::new(0, ["{not json"]);
        assert!(matches!(
            PushCommand::from_frame(&frame),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Game.as_u32(), 1);
        assert_eq!(ErrorCode::Transport.as_u32(), 5);
        assert_eq!(ErrorCode::from_u32(4), Some(ErrorCode::StructuredData));
        assert_eq!(ErrorCode::from_u32(0), None);
        assert_eq!(ErrorCode::from_u32(999), None);
    }
}
