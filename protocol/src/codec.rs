//! 单行文本帧编解码
//!
//! 帧格式：`<非负整数状态码><US><参数1><RS><参数2>...`，以 `\n` 结尾。
//! 参数中不允许出现 US、RS 以及换行符。
//! `<code><US>` 表示没有参数，因此只有一个空字符串参数的帧解码后参数列表为空。

use crate::constants::{MENU_CODE, RECORD_SEPARATOR, SUCCESS_CODE, SUCCESS_TEXT, UNIT_SEPARATOR};
use crate::error::{ProtocolError, Result};
use crate::message::ErrorCode;

/// RPC 帧：状态码 + 有序参数列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub code: u32,
    pub args: Vec<String>,
}

impl Frame {
    /// 创建新帧
    pub fn new<I, S>(code: u32, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// 无参数帧
    pub fn bare(code: u32) -> Self {
        Self {
            code,
            args: Vec::new(),
        }
    }

    /// 成功回复 `0 ["success"]`
    pub fn success() -> Self {
        Self::new(SUCCESS_CODE, [SUCCESS_TEXT])
    }

    /// 携带返回值的成功回复
    pub fn success_with<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SUCCESS_CODE, args)
    }

    /// 菜单/探测帧
    pub fn menu(text: impl Into<String>) -> Self {
        Self::new(MENU_CODE, [text.into()])
    }

    /// 错误回复，消息放在第一个参数
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.as_u32(), [sanitize(&message.into())])
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn is_menu(&self) -> bool {
        self.code == MENU_CODE
    }

    /// 获取第 i 个参数
    pub fn arg(&self, index: usize) -> Result<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| ProtocolError::framing(format!("missing argument #{index}")))
    }

    /// 把回复帧转换为结果：0 为成功，已知错误码转换为 [`ProtocolError::Remote`]
    pub fn into_success(self) -> Result<Frame> {
        if self.is_success() {
            return Ok(self);
        }
        match ErrorCode::from_u32(self.code) {
            Some(code) => Err(ProtocolError::Remote {
                code,
                message: self.message(),
            }),
            None => Err(ProtocolError::UnexpectedFrame {
                expected: SUCCESS_CODE,
                actual: self.code,
            }),
        }
    }

    /// 参数以逗号连接，用于错误消息展示
    pub fn message(&self) -> String {
        self.args.join(",")
    }

    /// 编码为一行文本（不含换行符）
    ///
    /// `[""]` 与无参数编码结果相同。
    pub fn encode(&self) -> Result<String> {
        let mut line = self.code.to_string();
        line.push(UNIT_SEPARATOR);
        for (i, arg) in self.args.iter().enumerate() {
            if arg.contains(is_reserved) {
                return Err(ProtocolError::framing(format!(
                    "argument #{i} contains a reserved separator"
                )));
            }
            if i > 0 {
                line.push(RECORD_SEPARATOR);
            }
            line.push_str(arg);
        }
        Ok(line)
    }

    /// 从一行文本解码（可带行尾换行符）
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        let (code_part, rest) = match line.split_once(UNIT_SEPARATOR) {
            Some((code, rest)) => (code, Some(rest)),
            None => (line, None),
        };

        if code_part.is_empty() || !code_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::framing(format!(
                "status code is not a non-negative integer: {code_part:?}"
            )));
        }
        let code = code_part
            .parse::<u32>()
            .map_err(|e| ProtocolError::framing(format!("status code out of range: {e}")))?;

        let args = match rest {
            None | Some("") => Vec::new(),
            Some(rest) => {
                if rest.contains(UNIT_SEPARATOR) {
                    return Err(ProtocolError::framing("more than one unit separator"));
                }
                rest.split(RECORD_SEPARATOR).map(str::to_string).collect()
            }
        };

        Ok(Self { code, args })
    }
}

fn is_reserved(c: char) -> bool {
    c == UNIT_SEPARATOR || c == RECORD_SEPARATOR || c == '\n' || c == '\r'
}

/// 去掉保留字符，错误消息可能来自任意输入
fn sanitize(text: &str) -> String {
    text.chars().map(|c| if is_reserved(c) { ' ' } else { c }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_frame_round_trip() {
        let frame = Frame::new(3, ["no figure here"]);
        let line = frame.encode().unwrap();
        assert_eq!(line, "3\u{1F}no figure here");

        let decoded = Frame::decode(&line).unwrap();
        assert_eq!(decoded.code, 3);
        assert_eq!(decoded.args, vec!["no figure here".to_string()]);
    }

    #[test]
    fn test_multiple_args() {
        let frame = Frame::new(0, ["ABC123", "4", "6", "4", "4", ""]);
        let line = frame.encode().unwrap();
        let decoded = Frame::decode(&format!("{line}\n")).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(decoded.arg(5).unwrap(), "");
    }

    #[test]
    fn test_decode_without_args() {
        assert_eq!(Frame::decode("5").unwrap(), Frame::bare(5));
        assert_eq!(Frame::decode("5\u{1F}").unwrap(), Frame::bare(5));
        assert_eq!(Frame::decode("2\u{1F}\r\n").unwrap(), Frame::bare(2));
    }

    #[test]
    fn test_single_empty_arg_same_as_none() {
        let line = Frame::new(1, [""]).encode().unwrap();
        assert_eq!(line, Frame::bare(1).encode().unwrap());

        let decoded = Frame::decode(&line).unwrap();
        assert_eq!(decoded, Frame::bare(1));
        assert_eq!(decoded.message(), "");
        assert!(decoded.arg(0).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_code() {
        assert!(Frame::decode("").is_err());
        assert!(Frame::decode("abc\u{1F}x").is_err());
        assert!(Frame::decode("-1\u{1F}x").is_err());
        assert!(Frame::decode("99999999999\u{1F}x").is_err());
        assert!(Frame::decode("1\u{1F}a\u{1F}b").is_err());
    }

    #[test]
    fn test_encode_rejects_reserved_chars() {
        let frame = Frame::new(0, ["a\u{1E}b"]);
        assert!(matches!(frame.encode(), Err(ProtocolError::Framing { .. })));

        let frame = Frame::new(0, ["line\nbreak"]);
        assert!(frame.encode().is_err());
    }

    #[test]
    fn test_error_frame_is_sanitized() {
        let frame = Frame::error(ErrorCode::Game, "bad\nid");
        assert_eq!(frame.code, 1);
        assert_eq!(frame.args[0], "bad id");
        assert!(frame.encode().is_ok());
    }

    #[test]
    fn test_into_success() {
        assert!(Frame::success().into_success().is_ok());

        let err = Frame::error(ErrorCode::IllegalMove, "No figure on field 0,3")
            .into_success()
            .unwrap_err();
        match err {
            ProtocolError::Remote { code, message } => {
                assert_eq!(code, ErrorCode::IllegalMove);
                assert_eq!(message, "No figure on field 0,3");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            Frame::menu("x").into_success(),
            Err(ProtocolError::UnexpectedFrame { actual: 999, .. })
        ));
    }

    #[test]
    fn test_menu_and_success() {
        assert!(Frame::menu("MOVE_PIECE - 0:").is_menu());
        assert!(Frame::success().is_success());
        assert_eq!(Frame::success().message(), "success");
    }
}
