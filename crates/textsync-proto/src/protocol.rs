//! Length-prefixed postcard framing for [`Frame`].
//!
//! Framing is a 4-byte little-endian length prefix followed by a
//! postcard-encoded [`Frame`], the same convention this protocol's IPC
//! framing uses but carried over a TCP stream instead of a Unix socket.

use std::io::{Error as IoError, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::Frame;

/// Frames larger than this are rejected rather than trusted blindly.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Reads one length-prefixed [`Frame`] from `input`.
///
/// Returns an `UnexpectedEof`-kind error when the peer closes the
/// connection cleanly between frames.
pub async fn read_frame(input: &mut (impl AsyncRead + Unpin + Send)) -> std::io::Result<Frame> {
	let mut len_bytes = [0u8; 4];
	input.read_exact(&mut len_bytes).await?;
	let len = u32::from_le_bytes(len_bytes) as usize;

	if len > MAX_FRAME_BYTES {
		return Err(IoError::new(
			ErrorKind::InvalidData,
			format!("frame too large: {len} bytes"),
		));
	}

	let mut buf = vec![0u8; len];
	input.read_exact(&mut buf).await?;

	postcard::from_bytes(&buf).map_err(|e| IoError::new(ErrorKind::InvalidData, e.to_string()))
}

/// Writes one length-prefixed [`Frame`] to `output` and flushes it.
pub async fn write_frame(
	output: &mut (impl AsyncWrite + Unpin + Send),
	frame: &Frame,
) -> std::io::Result<()> {
	let buf = postcard::to_allocvec(frame)
		.map_err(|e| IoError::new(ErrorKind::InvalidData, e.to_string()))?;

	if buf.len() > MAX_FRAME_BYTES {
		return Err(IoError::new(
			ErrorKind::InvalidData,
			format!("frame too large: {} bytes", buf.len()),
		));
	}

	output.write_all(&(buf.len() as u32).to_le_bytes()).await?;
	output.write_all(&buf).await?;
	output.flush().await?;
	Ok(())
}

/// True for the connection-loss error kinds the session layer treats as a
/// dropped peer rather than a protocol bug.
#[must_use]
pub fn is_disconnect(err: &std::io::Error) -> bool {
	matches!(
		err.kind(),
		ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{Request, RequestId, RequestPayload};

	#[tokio::test]
	async fn frame_round_trips_over_a_duplex_pipe() {
		let (mut a, mut b) = tokio::io::duplex(4096);
		let frame = Frame::Request(Request {
			id: RequestId(7),
			payload: RequestPayload::GetText,
		});

		write_frame(&mut a, &frame).await.unwrap();
		let got = read_frame(&mut b).await.unwrap();

		match got {
			Frame::Request(req) => {
				assert_eq!(req.id, RequestId(7));
				assert!(matches!(req.payload, RequestPayload::GetText));
			}
			Frame::Response(_) => panic!("expected a request frame"),
		}
	}
}
