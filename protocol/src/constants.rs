//! 协议常量定义

use std::time::Duration;

/// 棋盘边长（8x8）
pub const BOARD_SIZE: usize = 8;

/// 成功回复码
pub const SUCCESS_CODE: u32 = 0;

/// 菜单/探测帧码（不是终止状态）
pub const MENU_CODE: u32 = 999;

/// 成功回复的默认参数
pub const SUCCESS_TEXT: &str = "success";

/// 分隔状态码与参数（ASCII US）
pub const UNIT_SEPARATOR: char = '\u{1F}';

/// 分隔参数（ASCII RS）
pub const RECORD_SEPARATOR: char = '\u{1E}';

/// 单帧最大长度（字节，不含换行）
pub const MAX_FRAME_SIZE: usize = 65536;

/// 对局 ID 长度
pub const GAME_ID_LEN: usize = 6;

/// 对局 ID 字符集
pub const GAME_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// 50 回合规则对应的半回合数
pub const FIFTY_MOVE_LIMIT: u32 = 100;

/// 存活检测间隔（毫秒）
pub const LIVENESS_INTERVAL_MS: u64 = 3000;

/// 单次推送/探测往返的超时（毫秒）
pub const PROBE_TIMEOUT_MS: u64 = 5000;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
