//! 国际象棋服务端
//!
//! 包含:
//! - 对局状态机与注册表
//! - 玩家推送通道管理
//! - 入站连接处理（含反向连接握手）
//! - 存活检测

pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod liveness;
pub mod player;
pub mod registry;
pub mod server;

pub use config::ServerConfig;
pub use connection::ConnectionSession;
pub use error::{Result, ServerError};
pub use game::{GameSession, Outbox, SessionState};
pub use liveness::LivenessSweeper;
pub use player::{PlayerLink, PlayerTable};
pub use registry::{BoardLayout, GameRegistry};
pub use server::{ChessServer, ServerState};
