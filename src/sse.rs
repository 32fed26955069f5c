//! Decoding of server-sent event streams.
//!
//! An event stream is a sequence of lines, each terminated by `"\r\n"`,
//! `"\n"`, or a lone `"\r"`. Lines are either empty, comments starting with
//! a colon, or fields of the form `name: value`. An empty line dispatches
//! the event assembled from the fields seen since the last dispatch.
//!
//! Data arrives in arbitrary chunks, so the [`Decoder`] keeps whatever
//! incomplete line is left at the end of a chunk until the next one shows
//! up.

use std::mem;
use std::time::Duration;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::take_till1;
use nom::bytes::streaming::{tag, take_till};
use nom::character::complete::char;
use nom::combinator::{map, opt, rest};
use nom::sequence::{pair, preceded, terminated};


//------------ Configurable Constants ----------------------------------------

/// The longest line we are willing to keep in memory.
///
/// Longer lines are skipped and the event they are part of is dropped.
const MAX_LINE_LEN: usize = 1 << 20;

/// The UTF-8 byte order mark a stream may start with.
const BOM: &[u8] = b"\xEF\xBB\xBF";


//------------ Event ---------------------------------------------------------

/// A dispatched event.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Event {
    /// The event type.
    ///
    /// This is `"message"` if the stream didn’t provide one.
    pub event: String,

    /// The event data.
    ///
    /// Multiple data lines are joined with line feeds.
    pub data: String,

    /// The last event ID seen on the stream.
    pub id: Option<String>,
}


//------------ Decoder -------------------------------------------------------

/// An incremental decoder for an event stream.
#[derive(Debug, Default)]
pub struct Decoder {
    /// Bytes received but not yet consumed as a complete line.
    buf: Vec<u8>,

    /// The event type of the event being assembled.
    event: Option<String>,

    /// The data lines of the event being assembled.
    data: Option<String>,

    /// The last event ID.
    last_id: Option<String>,

    /// The reconnection time most recently requested by the server.
    retry: Option<Duration>,

    /// The number of bytes at the start of `buf` without a line break.
    scanned: usize,

    /// Whether the byte order mark has been dealt with.
    started: bool,

    /// Whether the current line is too long and is being skipped.
    overlong: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Feeds a chunk of data and returns all events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(chunk);
        if !self.started {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                return Vec::new()
            }
            if self.buf.starts_with(BOM) {
                self.buf.drain(..BOM.len());
            }
            self.started = true;
        }

        let mut res = Vec::new();
        let mut consumed = 0;
        loop {
            let pending = &self.buf[consumed..];
            let eol = match pending[self.scanned..].iter().position(|&ch| {
                is_eol(ch)
            }) {
                Some(pos) => self.scanned + pos,
                None => {
                    self.scanned = pending.len();
                    break
                }
            };
            let (rest, line) = match next_line(pending) {
                Ok(some) => some,
                Err(_) => {
                    // A lone "\r" at the end. Look at it again next time.
                    self.scanned = eol;
                    break
                }
            };
            let line_len = pending.len() - rest.len();
            let line = String::from_utf8_lossy(line).into_owned();
            consumed += line_len;
            self.scanned = 0;
            if mem::take(&mut self.overlong) {
                continue
            }
            if let Some(event) = self.process_line(&line) {
                res.push(event)
            }
        }
        self.buf.drain(..consumed);

        if self.scanned > MAX_LINE_LEN {
            self.buf.drain(..self.scanned);
            self.scanned = 0;
            self.overlong = true;
            self.event = None;
            self.data = None;
        }
        res
    }

    /// Finishes decoding at the end of the stream.
    ///
    /// A final line without terminator still counts, but an event that
    /// hasn’t been dispatched by an empty line is dropped.
    pub fn finish(&mut self) {
        let buf = mem::take(&mut self.buf);
        self.scanned = 0;
        if !mem::take(&mut self.overlong) {
            let text = String::from_utf8_lossy(&buf);
            let line = text.strip_suffix('\r').unwrap_or(&text);
            if !line.is_empty() {
                let _ = self.process_line(line);
            }
        }
        self.event = None;
        self.data = None;
    }

    /// Returns the reconnection time requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn process_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            return self.dispatch()
        }
        match parse_line(line) {
            Ok((_, Line::Field(name, value))) => self.process_field(name, value),
            Ok((_, Line::Comment(_))) | Err(_) => { }
        }
        None
    }

    fn process_field(&mut self, name: &str, value: &str) {
        match name {
            "event" => self.event = Some(value.into()),
            "data" => {
                match self.data {
                    Some(ref mut data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => self.data = Some(value.into())
                }
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.into())
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|ch| ch.is_ascii_digit()) {
                    if let Ok(ms) = value.parse() {
                        self.retry = Some(Duration::from_millis(ms))
                    }
                }
            }
            _ => { }
        }
    }

    fn dispatch(&mut self) -> Option<Event> {
        let event = self.event.take();
        let data = self.data.take()?;
        Some(Event {
            event: event.filter(|event| !event.is_empty())
                .unwrap_or_else(|| "message".into()),
            data,
            id: self.last_id.clone(),
        })
    }
}


//------------ Parsing -------------------------------------------------------

/// A single line of an event stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Line<'a> {
    Comment(&'a str),
    Field(&'a str, &'a str),
}

fn is_eol(ch: u8) -> bool {
    ch == b'\r' || ch == b'\n'
}

/// Splits off the next complete line.
///
/// Returns `Incomplete` if the data doesn’t contain a full line yet. This
/// includes a `"\r"` at the very end since it may be the first half of a
/// `"\r\n"`.
fn next_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(
        take_till(is_eol),
        alt((tag("\r\n"), tag("\n"), tag("\r")))
    )(input)
}

/// Parses the content of a non-empty line.
fn parse_line(input: &str) -> IResult<&str, Line> {
    alt((
        map(preceded(char(':'), rest), Line::Comment),
        map(
            pair(
                take_till1(|ch: char| ch == ':'),
                opt(preceded(char(':'), preceded(opt(char(' ')), rest)))
            ),
            |(name, value)| Line::Field(name, value.unwrap_or(""))
        ),
    ))(input)
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn event(event: &str, data: &str) -> Event {
        Event { event: event.into(), data: data.into(), id: None }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line(": hi").unwrap().1, Line::Comment(" hi"));
        assert_eq!(parse_line("data: x").unwrap().1, Line::Field("data", "x"));
        assert_eq!(parse_line("data:x").unwrap().1, Line::Field("data", "x"));
        assert_eq!(parse_line("data:  x").unwrap().1, Line::Field("data", " x"));
        assert_eq!(parse_line("data").unwrap().1, Line::Field("data", ""));
        assert_eq!(
            parse_line("data: a:b").unwrap().1, Line::Field("data", "a:b")
        );
    }

    #[test]
    fn test_next_line() {
        assert_eq!(next_line(b"ab\ncd").unwrap(), (&b"cd"[..], &b"ab"[..]));
        assert_eq!(next_line(b"ab\r\ncd").unwrap(), (&b"cd"[..], &b"ab"[..]));
        assert_eq!(next_line(b"ab\rcd").unwrap(), (&b"cd"[..], &b"ab"[..]));
        assert!(next_line(b"ab").is_err());
        assert!(next_line(b"ab\r").is_err());
    }

    #[test]
    fn single_event() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(b"event: reset\ndata: []\n\n"),
            vec![event("reset", "[]")]
        );
    }

    #[test]
    fn default_type_and_multiline_data() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(b": keep-alive\ndata: a\ndata: b\n\n"),
            vec![event("message", "a\nb")]
        );
    }

    #[test]
    fn split_chunks() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"event: upd").is_empty());
        assert!(decoder.feed(b"ate\r").is_empty());
        assert!(decoder.feed(b"\ndata: {\"id\"").is_empty());
        assert!(decoder.feed(b": 1}\r\n").is_empty());
        assert_eq!(
            decoder.feed(b"\r\nevent: remove\r\ndata: x\r\n\r\n"),
            vec![event("update", "{\"id\": 1}"), event("remove", "x")]
        );
    }

    #[test]
    fn split_multibyte() {
        let mut decoder = Decoder::new();
        let data = "data: Café\n\n".as_bytes();
        let (head, tail) = data.split_at(10);
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail), vec![event("message", "Café")]);
    }

    #[test]
    fn no_data_no_event() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"event: add\n\n").is_empty());
        // The type doesn’t leak into the next event.
        assert_eq!(
            decoder.feed(b"data: 1\n\n"), vec![event("message", "1")]
        );
    }

    #[test]
    fn id_and_retry() {
        let mut decoder = Decoder::new();
        let events = decoder.feed(b"id: 7\nretry: 2500\nretry: x\ndata: 1\n\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(decoder.retry(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn byte_order_mark() {
        let mut decoder = Decoder::new();
        assert_eq!(
            decoder.feed(b"\xEF\xBB\xBFevent: reset\ndata: []\n\n"),
            vec![event("reset", "[]")]
        );

        // Split across chunks.
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"\xEF").is_empty());
        assert!(decoder.feed(b"\xBB\xBFevent: add\n").is_empty());
        assert_eq!(decoder.feed(b"data: 1\n\n"), vec![event("add", "1")]);

        // Only at the very start.
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"data: 1\n\n\xEF\xBB\xBFevent: add\n").len() == 1);
        assert_eq!(decoder.feed(b"data: 2\n\n"), vec![event("message", "2")]);
    }

    #[test]
    fn long_line_in_many_chunks() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"event: reset\ndata: ").is_empty());
        for _ in 0..100 {
            assert!(decoder.feed(&[b'1'; 1000]).is_empty());
            assert_eq!(decoder.scanned, decoder.buf.len());
        }
        let events = decoder.feed(b"\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.len(), 100_000);
    }

    #[test]
    fn overlong_line_is_skipped() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"event: reset\ndata: ").is_empty());
        let chunk = vec![b'x'; 64 * 1024];
        for _ in 0..(MAX_LINE_LEN / chunk.len() + 2) {
            assert!(decoder.feed(&chunk).is_empty());
            assert!(decoder.buf.len() <= MAX_LINE_LEN + chunk.len());
        }
        assert!(decoder.feed(b"\r").is_empty());
        assert_eq!(
            decoder.feed(b"\n\ndata: ok\n\n"), vec![event("message", "ok")]
        );
    }

    #[test]
    fn finish_drops_partial_event() {
        let mut decoder = Decoder::new();
        assert!(decoder.feed(b"event: add\ndata: 1").is_empty());
        decoder.finish();
        assert!(decoder.feed(b"\n").is_empty());
    }
}
