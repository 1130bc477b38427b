use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Comment lines (keep-alives) and the
/// `event`, `id` and `retry` fields are skipped.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is already buffered before reading more, the
            // previous chunk may have carried several events.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // Abort if no more data available, an unterminated
                // event is dropped.
                return Ok(None);
            };
            // Normalize CRLF line endings. Raw carriage returns never
            // appear inside JSON payloads.
            self.buf.extend(bytes.iter().filter(|b| **b != b'\r'));
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        while let Some(eol_idx) =
            self.buf.windows(2).position(|w| w == b"\n\n")
        {
            let block: Vec<u8> = self.buf.drain(0..eol_idx + 2).collect();
            // Decode whole blocks only, so multi-byte characters split
            // across chunks stay intact.
            let block = std::str::from_utf8(&block[..eol_idx])
                .map_err(|_| Error::InvalidPayload)?;

            let mut data: Option<String> = None;
            for line in block.lines() {
                if line.starts_with(':') {
                    continue;
                }
                let (name, value) = match line.split_once(':') {
                    Some((name, value)) => {
                        (name, value.strip_prefix(' ').unwrap_or(value))
                    }
                    None => (line, ""),
                };
                match name {
                    "data" => {
                        let data = data.get_or_insert_default();
                        if !data.is_empty() {
                            data.push('\n');
                        }
                        data.push_str(value);
                    }
                    "event" | "id" | "retry" => {}
                    _ => return Err(Error::InvalidPayload),
                }
            }

            if let Some(data) = data {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }
}
