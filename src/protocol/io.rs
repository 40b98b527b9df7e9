//! Deadline-bounded socket I/O.
//!
//! Every read or write runs against a fixed [`Deadline`]. When a wait is
//! interrupted the remaining budget is recomputed from that deadline, so
//! retries never extend the total time allowed.

use crate::SeatwardenError;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default socket I/O timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(5000);

/// Byte a DUMP client sends after each received line.
pub const DUMP_LINE_ACK: u8 = 0x06;

/// Longest DUMP line sent on the wire.
pub const MAX_DUMP_LINE: usize = 1024;

/// A fixed point in time by which an operation must complete.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }

    fn tokio_instant(&self) -> tokio::time::Instant {
        tokio::time::Instant::from_std(self.0)
    }
}

fn transport(context: &str, e: std::io::Error) -> SeatwardenError {
    SeatwardenError::Transport(format!("{}: {}", context, e))
}

/// Fill `buf` from a blocking stream before `deadline`.
pub fn read_full(
    stream: &mut TcpStream,
    buf: &mut [u8],
    deadline: Deadline,
) -> Result<(), SeatwardenError> {
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.remaining().ok_or(SeatwardenError::Timeout)?;
        stream
            .set_read_timeout(Some(remaining))
            .map_err(|e| transport("set read timeout", e))?;

        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(SeatwardenError::Transport(
                    "connection closed by peer".to_string(),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(SeatwardenError::Timeout)
            }
            Err(e) => return Err(transport("read", e)),
        }
    }
    Ok(())
}

/// Write all of `buf` to a blocking stream before `deadline`.
pub fn write_full(
    stream: &mut TcpStream,
    buf: &[u8],
    deadline: Deadline,
) -> Result<(), SeatwardenError> {
    let mut written = 0;
    while written < buf.len() {
        let remaining = deadline.remaining().ok_or(SeatwardenError::Timeout)?;
        stream
            .set_write_timeout(Some(remaining))
            .map_err(|e| transport("set write timeout", e))?;

        match stream.write(&buf[written..]) {
            Ok(0) => {
                return Err(SeatwardenError::Transport(
                    "connection closed by peer".to_string(),
                ))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(SeatwardenError::Timeout)
            }
            Err(e) => return Err(transport("write", e)),
        }
    }
    Ok(())
}

/// Fill `buf` from an async stream before `deadline`.
pub async fn read_full_async<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
    deadline: Deadline,
) -> Result<(), SeatwardenError> {
    match tokio::time::timeout_at(deadline.tokio_instant(), reader.read_exact(buf)).await {
        Err(_) => Err(SeatwardenError::Timeout),
        Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(SeatwardenError::Transport(
            "connection closed by peer".to_string(),
        )),
        Ok(Err(e)) => Err(transport("read", e)),
        Ok(Ok(_)) => Ok(()),
    }
}

/// Write all of `buf` to an async stream before `deadline`.
pub async fn write_full_async<W: AsyncWrite + Unpin>(
    writer: &mut W,
    buf: &[u8],
    deadline: Deadline,
) -> Result<(), SeatwardenError> {
    let io = async {
        writer.write_all(buf).await?;
        writer.flush().await
    };
    match tokio::time::timeout_at(deadline.tokio_instant(), io).await {
        Err(_) => Err(SeatwardenError::Timeout),
        Ok(Err(e)) => Err(transport("write", e)),
        Ok(Ok(())) => Ok(()),
    }
}

/// Frame a DUMP line: big-endian u16 length followed by the bytes.
/// Lines are clipped to [`MAX_DUMP_LINE`]; an empty frame ends the listing.
pub fn frame_dump_line(line: &str) -> Vec<u8> {
    let mut n = line.len().min(MAX_DUMP_LINE);
    while !line.is_char_boundary(n) {
        n -= 1;
    }
    let mut out = Vec::with_capacity(2 + n);
    out.extend_from_slice(&(n as u16).to_be_bytes());
    out.extend_from_slice(&line.as_bytes()[..n]);
    out
}

/// Stream listing lines, waiting for the client's acknowledgement after each.
pub async fn send_dump_lines<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    lines: &[String],
    timeout: Duration,
) -> Result<(), SeatwardenError> {
    let mut ack = [0u8; 1];
    for line in lines.iter().filter(|l| !l.is_empty()) {
        write_full_async(stream, &frame_dump_line(line), Deadline::after(timeout)).await?;
        read_full_async(stream, &mut ack, Deadline::after(timeout)).await?;
        if ack[0] != DUMP_LINE_ACK {
            return Err(SeatwardenError::MalformedRequest(
                "bad dump acknowledgement".to_string(),
            ));
        }
    }
    write_full_async(stream, &0u16.to_be_bytes(), Deadline::after(timeout)).await
}

/// Receive listing lines, acknowledging each one, until the end frame.
pub fn recv_dump_lines(
    stream: &mut TcpStream,
    timeout: Duration,
) -> Result<Vec<String>, SeatwardenError> {
    let mut lines = Vec::new();
    loop {
        let mut len = [0u8; 2];
        read_full(stream, &mut len, Deadline::after(timeout))?;
        let len = u16::from_be_bytes(len) as usize;
        if len == 0 {
            return Ok(lines);
        }
        if len > MAX_DUMP_LINE {
            return Err(SeatwardenError::MalformedRequest(format!(
                "dump line of {} bytes",
                len
            )));
        }
        let mut buf = vec![0u8; len];
        read_full(stream, &mut buf, Deadline::after(timeout))?;
        lines.push(String::from_utf8_lossy(&buf).into_owned());
        write_full(stream, &[DUMP_LINE_ACK], Deadline::after(timeout))?;
    }
}
