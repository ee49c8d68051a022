//! 国际象棋客户端
//!
//! 无界面的客户端网络层：[`ServerProxy`] 发送命令，[`PushReceiver`] 接收服务端推送。

pub mod network;

pub use network::{PushReceiver, ServerProxy};
