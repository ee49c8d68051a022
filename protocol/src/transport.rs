//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体传输实现解耦。
//! 每帧为一行文本，见 [`crate::Frame`]。

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use crate::codec::Frame;
use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, MAX_FRAME_SIZE, MENU_CODE};

/// 连接抽象 trait（核心抽象，用于业务层）
///
/// 所有交换都是"应答方先发菜单，调用方再发请求"的锁步模式。
#[async_trait]
pub trait Connection: Send + Sync {
    /// 发送一帧
    async fn send(&mut self, frame: &Frame) -> Result<()>;

    /// 接收一帧
    async fn recv(&mut self) -> Result<Frame>;

    /// 关闭连接
    async fn close(&mut self) -> Result<()>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;

    /// 获取本端地址
    fn local_addr(&self) -> Option<String>;

    /// 应答方：发送菜单，然后等待对方的请求
    async fn offer(&mut self, menu: &str) -> Result<Frame> {
        self.send(&Frame::menu(menu)).await?;
        self.recv().await
    }

    /// 调用方：读取菜单，发送请求，然后等待回复
    async fn call(&mut self, request: &Frame) -> Result<Frame> {
        let menu = self.recv().await?;
        if !menu.is_menu() {
            return Err(ProtocolError::UnexpectedFrame {
                expected: MENU_CODE,
                actual: menu.code,
            });
        }
        self.send(request).await?;
        self.recv().await
    }
}

/// 连接器 trait（主动发起连接的一方使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（被动接受连接的一方使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self {
            timeout: CONNECT_TIMEOUT,
        }
    }

    /// 使用自定义连接超时
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
    local_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let local_addr = stream.local_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            peer_addr,
            local_addr,
        })
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame).await
    }

    async fn recv(&mut self) -> Result<Frame> {
        self.reader.read_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }

    fn local_addr(&self) -> Option<String> {
        self.local_addr.clone()
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 帧读写
// ============================================================================

/// 帧读取器，按 `\n` 切分
pub struct FrameReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::with_capacity(256),
        }
    }

    /// 读取并解码一帧
    pub async fn read_frame(&mut self) -> Result<Frame> {
        self.buffer.clear();
        // 多留出 "\r\n" 的空间
        let limit = (MAX_FRAME_SIZE + 2) as u64;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buffer)
            .await?;

        if read == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if self.buffer.last() != Some(&b'\n') {
            if read as u64 >= limit {
                return Err(ProtocolError::FrameTooLarge {
                    size: read,
                    max: MAX_FRAME_SIZE,
                });
            }
            // 行没有结束就遇到 EOF
            return Err(ProtocolError::ConnectionClosed);
        }

        let line = std::str::from_utf8(&self.buffer)
            .map_err(|e| ProtocolError::framing(format!("frame is not valid UTF-8: {e}")))?;
        let frame = Frame::decode(line)?;
        trace!(code = frame.code, args = frame.args.len(), "recv frame");
        Ok(frame)
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧，立即 flush
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mut line = frame.encode()?;
        if line.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        line.push('\n');

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        trace!(code = frame.code, args = frame.args.len(), "sent frame");
        Ok(())
    }

    /// 关闭写端
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
