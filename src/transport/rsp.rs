//! 基于字节流的 RSP 客户端

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::{Transport, TransportError};
use crate::const_values::{DEFAULT_MAX_RETRANSMITS, OK_REPLY};
use crate::protocol::Command;
use crate::protocol::packet::{encode_frame, unescape_payload, verify_checksum};

/// RSP 客户端
pub struct RspClient<S> {
    stream: BufReader<S>,
    /// 是否需要 `+`/`-` 确认
    ack_mode: bool,
    max_retransmits: u32,
}

impl RspClient<TcpStream> {
    /// 连接到调试服务器
    pub fn connect(addr: &str, read_timeout: Option<Duration>) -> Result<Self, TransportError> {
        info!(addr, "连接调试服务器");
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(read_timeout)?;
        stream.set_nodelay(true)?;
        info!(peer = ?stream.peer_addr().ok(), "TCP连接已建立");
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> RspClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            ack_mode: true,
            max_retransmits: DEFAULT_MAX_RETRANSMITS,
        }
    }

    pub fn with_max_retransmits(mut self, max_retransmits: u32) -> Self {
        self.max_retransmits = max_retransmits;
        self
    }

    /// 协商关闭确认模式，成功后不再收发 `+`/`-`
    pub fn start_no_ack_mode(&mut self) -> Result<bool, TransportError> {
        let reply = self.send(&Command::StartNoAckMode.to_string())?;
        if reply == OK_REPLY {
            self.ack_mode = false;
            info!("已切换到 no-ack 模式");
            Ok(true)
        } else {
            warn!(reply = %reply, "调试服务器不支持 no-ack 模式");
            Ok(false)
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.get_mut();
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        self.stream.read_exact(&mut byte).map_err(eof_as_closed)?;
        Ok(byte[0])
    }

    fn send_packet(&mut self, payload: &str) -> Result<(), TransportError> {
        let frame = encode_frame(payload);
        for attempt in 0..=self.max_retransmits {
            if attempt > 0 {
                warn!(attempt, payload, "收到 NACK，重传报文");
            }
            self.write_raw(frame.as_bytes())?;
            if !self.ack_mode || self.wait_for_ack()? {
                return Ok(());
            }
        }
        Err(TransportError::RetransmitsExhausted {
            command: payload.to_string(),
            attempts: self.max_retransmits + 1,
        })
    }

    /// 等待确认，`+` 返回 true，`-` 返回 false，其余字节忽略
    fn wait_for_ack(&mut self) -> Result<bool, TransportError> {
        loop {
            match self.read_byte()? {
                b'+' => return Ok(true),
                b'-' => return Ok(false),
                _ => continue,
            }
        }
    }

    fn receive_packet(&mut self) -> Result<String, TransportError> {
        let mut failures = 0;
        loop {
            // 跳过 '$' 之前的内容
            let mut skipped = Vec::new();
            let read = self.stream.read_until(b'$', &mut skipped)?;
            if read == 0 || skipped.last() != Some(&b'$') {
                return Err(TransportError::Closed);
            }

            let mut raw = Vec::new();
            let read = self.stream.read_until(b'#', &mut raw)?;
            if read == 0 || raw.last() != Some(&b'#') {
                return Err(TransportError::Closed);
            }
            raw.pop();

            let mut digits = [0u8; 2];
            self.stream.read_exact(&mut digits).map_err(eof_as_closed)?;

            if let Err(e) = verify_checksum(&raw, &digits) {
                if !self.ack_mode || failures >= self.max_retransmits {
                    return Err(e.into());
                }
                failures += 1;
                warn!(failures, "应答校验失败，请求重发: {}", e);
                self.write_raw(b"-")?;
                continue;
            }
            if self.ack_mode {
                self.write_raw(b"+")?;
            }

            let payload = unescape_payload(&raw)?;
            return String::from_utf8(payload).map_err(|_| TransportError::InvalidUtf8);
        }
    }
}

impl<S: Read + Write> Transport for RspClient<S> {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        trace!(command, "发送命令");
        self.send_packet(command)?;
        loop {
            let reply = self.receive_packet()?;
            if let Some(output) = console_output(&reply) {
                debug!(output = %output.trim_end(), "目标输出");
                continue;
            }
            trace!(reply = %reply, "收到应答");
            return Ok(reply);
        }
    }
}

/// 识别 `O<hex>` 控制台输出报文
fn console_output(reply: &str) -> Option<String> {
    let encoded = reply.strip_prefix('O')?;
    if encoded.is_empty() || reply == OK_REPLY {
        return None;
    }
    let bytes = hex::decode(encoded).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn eof_as_closed(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::Closed
    } else {
        TransportError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::protocol::packet::checksum;

    // 测试用的内存流
    struct MockStream {
        read_data: VecDeque<u8>,
        write_data: Vec<u8>,
    }

    impl MockStream {
        fn new(read_data: &[u8]) -> Self {
            Self {
                read_data: read_data.iter().copied().collect(),
                write_data: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.read_data.len());
            for item in buf.iter_mut().take(n) {
                *item = self.read_data.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.write_data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![b'$'];
        out.extend_from_slice(payload);
        out.extend_from_slice(format!("#{:02x}", checksum(payload)).as_bytes());
        out
    }

    #[test]
    fn test_send_read_memory() {
        let mut input = vec![b'+'];
        input.extend(frame(b"decafbad"));
        let mut stream = MockStream::new(&input);

        let reply = RspClient::new(&mut stream).send("m1000,4").unwrap();
        assert_eq!(reply, "decafbad");
        assert_eq!(stream.write_data, b"$m1000,4#8e+");
    }

    #[test]
    fn test_retransmit_on_nack() {
        let mut input = vec![b'-', b'+'];
        input.extend(frame(b"OK"));
        let mut stream = MockStream::new(&input);

        let reply = RspClient::new(&mut stream).send("D").unwrap();
        assert_eq!(reply, "OK");
        assert_eq!(stream.write_data, b"$D#44$D#44+");
    }

    #[test]
    fn test_retransmits_exhausted() {
        let mut stream = MockStream::new(b"---");
        let result = RspClient::new(&mut stream).with_max_retransmits(2).send("c");
        assert!(matches!(
            result,
            Err(TransportError::RetransmitsExhausted { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_bad_checksum_requests_resend() {
        let mut input = b"+$OK#00".to_vec();
        input.extend(frame(b"OK"));
        let mut stream = MockStream::new(&input);

        let reply = RspClient::new(&mut stream).send("c").unwrap();
        assert_eq!(reply, "OK");
        assert_eq!(stream.write_data, b"$c#63-+");
    }

    #[test]
    fn test_skips_console_output_and_expands_rle() {
        let mut input = vec![b'+'];
        input.extend(frame(b"O68690a"));
        input.extend(frame(b"T05thread:1a;20:0* 1;"));
        let mut stream = MockStream::new(&input);

        let reply = RspClient::new(&mut stream).send("c").unwrap();
        assert_eq!(reply, "T05thread:1a;20:00001;");
    }

    #[test]
    fn test_no_ack_mode() {
        let mut input = vec![b'+'];
        input.extend(frame(b"OK"));
        input.extend(frame(b"OK"));
        let mut stream = MockStream::new(&input);

        let mut client = RspClient::new(&mut stream);
        assert!(client.start_no_ack_mode().unwrap());
        assert_eq!(client.send("D").unwrap(), "OK");
        assert_eq!(stream.write_data, b"$QStartNoAckMode#b0+$D#44");
    }

    #[test]
    fn test_closed_connection() {
        let mut stream = MockStream::new(b"+$OK");
        let result = RspClient::new(&mut stream).send("c");
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[test]
    fn test_console_output_detection() {
        assert_eq!(console_output("O6869").as_deref(), Some("hi"));
        assert_eq!(console_output("OK"), None);
        assert_eq!(console_output("O"), None);
    }
}
