//! Wire format shared by the session server, its clients, and remote workers.
//!
//! A request is a one-byte command code followed by its payload. Every
//! request is answered, in order, by a one-byte status: [`OK`] followed by
//! the reply payload, or [`REFUSED`] followed by a message. Numbers are
//! little-endian 32-bit words unless noted; strings and word runs carry a
//! 32-bit length prefix.
//!
//! A chunk batch is the channel count, then per channel `(samples, stride,
//! samples × stride words)`, then the chunk count.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sluice_core::{BufferData, Properties, SignalType, Value};

use crate::error::RemoteError;

/// Longest string, list, or word run accepted from a peer.
pub const MAX_LEN: usize = 1 << 28;

/// Words read per step of a sample block. Buffers grow only as data
/// arrives, so a length prefix alone cannot force a large allocation.
const READ_PIECE: usize = 1 << 16;

/// Status byte of a successful reply.
pub const OK: u8 = 0;
/// Status byte of a refusal; a message follows.
pub const REFUSED: u8 = 1;

/// Requests a worker pool sends to a remote worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Properties follow; configures the stage.
    InitFromProperties = 0,
    /// Input types then output types follow; replies with a bool word.
    SpecifyTypes = 1,
    /// Prepare for chunks.
    Go = 2,
    /// No more chunks.
    Stop = 3,
    /// A chunk batch follows; results are held for [`Command::DeliverResults`].
    Transact = 4,
    /// Replies with the oldest held batch and the nanoseconds spent on it.
    DeliverResults = 5,
    /// A chunk batch follows; replies with its results directly.
    ProcessChunks = 6,
    /// Input and output channel counts follow.
    DefineIo = 7,
    /// The pool is about to stop.
    Stopping = 8,
    /// The pool has stopped.
    Stopped = 9,
    /// Ends the connection.
    Close = 10,
}

impl Command {
    const ALL: [Command; 11] = [
        Command::InitFromProperties,
        Command::SpecifyTypes,
        Command::Go,
        Command::Stop,
        Command::Transact,
        Command::DeliverResults,
        Command::ProcessChunks,
        Command::DefineIo,
        Command::Stopping,
        Command::Stopped,
        Command::Close,
    ];

    /// Decodes a command byte.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

/// Requests a client sends to the session server.
///
/// The first request on a connection must be [`Open`](Control::Open),
/// [`Attach`](Control::Attach), [`Worker`](Control::Worker),
/// [`Types`](Control::Types), or [`Close`](Control::Close). `Worker` turns
/// the connection into a worker link that speaks [`Command`]s from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Control {
    /// Ends the connection. Same byte as [`Command::Close`].
    Close = 10,
    /// Creates a session; replies with its key.
    Open = 16,
    /// Key follows; binds the connection to an existing session.
    Attach = 17,
    /// Key and stage id follow; the connection becomes a worker link.
    Worker = 18,
    /// Replies with every type id the server can instantiate.
    Types = 19,
    /// Marks the session as alive.
    KeepAlive = 20,
    /// Type id and node name follow.
    Create = 21,
    /// Node name and properties follow.
    Init = 22,
    /// Wait flag follows; starts every node of the session.
    Go = 23,
    /// Stops every node of the session.
    Stop = 24,
    /// Blocks until the session's nodes have settled.
    WaitUntilGoing = 25,
    /// Clears buffers and processor state.
    Reset = 26,
    /// Producer name, output, consumer name, input follow.
    Connect = 27,
    /// As [`Control::Connect`], adding a copying consumer.
    Split = 28,
    /// As [`Control::Connect`], adding a consumer of the same buffer.
    Share = 29,
    /// Node name and input follow.
    Disconnect = 30,
    /// Node name follows; stops and deletes the node.
    Remove = 31,
    /// Node name and count follow; adds in-process workers to its pool.
    AddWorkers = 32,
    /// Node name, host, port, key, count follow; adds workers served elsewhere.
    AddRemoteWorkers = 33,
}

impl Control {
    /// Decodes a control byte.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            10 => Control::Close,
            16 => Control::Open,
            17 => Control::Attach,
            18 => Control::Worker,
            19 => Control::Types,
            20 => Control::KeepAlive,
            21 => Control::Create,
            22 => Control::Init,
            23 => Control::Go,
            24 => Control::Stop,
            25 => Control::WaitUntilGoing,
            26 => Control::Reset,
            27 => Control::Connect,
            28 => Control::Split,
            29 => Control::Share,
            30 => Control::Disconnect,
            31 => Control::Remove,
            32 => Control::AddWorkers,
            33 => Control::AddRemoteWorkers,
            _ => return None,
        })
    }
}

/// A buffered, bidirectional TCP link.
#[derive(Debug)]
pub struct Channel {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Channel {
    /// Wraps a connected stream.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// The underlying stream, for timeouts and shutdown.
    pub fn stream(&self) -> &TcpStream {
        self.writer.get_ref()
    }

    /// Read half.
    pub fn reader(&mut self) -> &mut BufReader<TcpStream> {
        &mut self.reader
    }

    /// Write half. Nothing is sent until [`flush`](Self::flush).
    pub fn writer(&mut self) -> &mut BufWriter<TcpStream> {
        &mut self.writer
    }

    /// Sends everything written so far.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Reads the next request byte. `None` means the peer hung up.
    pub fn read_code(&mut self) -> Result<Option<u8>, RemoteError> {
        match self.reader.read_u8() {
            Ok(code) => Ok(Some(code)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Sends a request byte (unflushed).
    pub fn send_code(&mut self, code: u8) -> io::Result<()> {
        self.writer.write_u8(code)
    }

    /// Reads a reply status, turning a refusal into [`RemoteError::Refused`].
    pub fn read_status(&mut self) -> Result<(), RemoteError> {
        read_status(&mut self.reader)
    }
}

/// Writes a length or index word.
pub fn write_len<W: Write>(w: &mut W, n: usize) -> io::Result<()> {
    let n = u32::try_from(n).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds 32 bits"))?;
    w.write_u32::<LittleEndian>(n)
}

/// Reads a length or index word, rejecting absurd values.
pub fn read_len<R: Read>(r: &mut R) -> Result<usize, RemoteError> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    if n > MAX_LEN {
        return Err(RemoteError::protocol(format!("length {n} exceeds {MAX_LEN}")));
    }
    Ok(n)
}

/// Writes a session key or port.
pub fn write_word<W: Write>(w: &mut W, word: u32) -> io::Result<()> {
    w.write_u32::<LittleEndian>(word)
}

/// Reads a raw word.
pub fn read_word<R: Read>(r: &mut R) -> Result<u32, RemoteError> {
    Ok(r.read_u32::<LittleEndian>()?)
}

/// Writes a bool as a full word.
pub fn write_bool<W: Write>(w: &mut W, b: bool) -> io::Result<()> {
    w.write_u32::<LittleEndian>(u32::from(b))
}

/// Reads a bool word.
pub fn read_bool<R: Read>(r: &mut R) -> Result<bool, RemoteError> {
    match r.read_u32::<LittleEndian>()? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RemoteError::protocol(format!("bad bool word {other}"))),
    }
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_len(w, s.len())?;
    w.write_all(s.as_bytes())
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_str<R: Read>(r: &mut R) -> Result<String, RemoteError> {
    let len = read_len(r)?;
    let mut bytes = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() < len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    String::from_utf8(bytes).map_err(|e| RemoteError::protocol(e.to_string()))
}

/// Writes a list of strings.
pub fn write_strs<W: Write, S: AsRef<str>>(w: &mut W, items: &[S]) -> io::Result<()> {
    write_len(w, items.len())?;
    items.iter().try_for_each(|s| write_str(w, s.as_ref()))
}

/// Reads a list of strings.
pub fn read_strs<R: Read>(r: &mut R) -> Result<Vec<String>, RemoteError> {
    let n = read_len(r)?;
    (0..n).map(|_| read_str(r)).collect()
}

/// Writes a signal type descriptor: tag word, then its fields.
pub fn write_type<W: Write>(w: &mut W, ty: &SignalType) -> io::Result<()> {
    w.write_u32::<LittleEndian>(ty.tag())?;
    match *ty {
        SignalType::Value { rate } | SignalType::Wave { rate } => w.write_f32::<LittleEndian>(rate),
        SignalType::Spectrum { bins, rate, step } => {
            write_len(w, bins)?;
            w.write_f32::<LittleEndian>(rate)?;
            write_len(w, step)
        }
        SignalType::Features { size, rate } => {
            write_len(w, size)?;
            w.write_f32::<LittleEndian>(rate)
        }
    }
}

/// Reads a signal type descriptor.
pub fn read_type<R: Read>(r: &mut R) -> Result<SignalType, RemoteError> {
    let tag = r.read_u32::<LittleEndian>()?;
    Ok(match tag {
        0 => SignalType::Value {
            rate: r.read_f32::<LittleEndian>()?,
        },
        1 => SignalType::Wave {
            rate: r.read_f32::<LittleEndian>()?,
        },
        2 => SignalType::Spectrum {
            bins: read_len(r)?,
            rate: r.read_f32::<LittleEndian>()?,
            step: read_len(r)?,
        },
        3 => SignalType::Features {
            size: read_len(r)?,
            rate: r.read_f32::<LittleEndian>()?,
        },
        other => return Err(RemoteError::protocol(format!("unknown signal type tag {other}"))),
    })
}

/// Writes a counted list of type descriptors.
pub fn write_types<W: Write>(w: &mut W, types: &[SignalType]) -> io::Result<()> {
    write_len(w, types.len())?;
    types.iter().try_for_each(|ty| write_type(w, ty))
}

/// Reads a counted list of type descriptors.
pub fn read_types<R: Read>(r: &mut R) -> Result<Vec<SignalType>, RemoteError> {
    let n = read_len(r)?;
    (0..n).map(|_| read_type(r)).collect()
}

/// Writes a property set: entry count, then `(key, tag, value)` per entry.
pub fn write_properties<W: Write>(w: &mut W, props: &Properties) -> io::Result<()> {
    write_len(w, props.len())?;
    for (key, value) in props.iter() {
        write_str(w, key)?;
        match value {
            Value::Bool(b) => {
                w.write_u8(0)?;
                write_bool(w, *b)?;
            }
            Value::Int(i) => {
                w.write_u8(1)?;
                w.write_i64::<LittleEndian>(*i)?;
            }
            Value::Float(f) => {
                w.write_u8(2)?;
                w.write_f64::<LittleEndian>(*f)?;
            }
            Value::Text(t) => {
                w.write_u8(3)?;
                write_str(w, t)?;
            }
        }
    }
    Ok(())
}

/// Reads a property set.
pub fn read_properties<R: Read>(r: &mut R) -> Result<Properties, RemoteError> {
    let n = read_len(r)?;
    let mut props = Properties::new();
    for _ in 0..n {
        let key = read_str(r)?;
        let value = match r.read_u8()? {
            0 => Value::Bool(read_bool(r)?),
            1 => Value::Int(r.read_i64::<LittleEndian>()?),
            2 => Value::Float(r.read_f64::<LittleEndian>()?),
            3 => Value::Text(read_str(r)?),
            other => return Err(RemoteError::protocol(format!("unknown property tag {other}"))),
        };
        props.set(key, value);
    }
    Ok(props)
}

/// Writes a chunk batch.
pub fn write_batch<W: Write>(w: &mut W, blocks: &[BufferData], count: usize) -> io::Result<()> {
    write_len(w, blocks.len())?;
    for block in blocks {
        write_len(w, block.samples())?;
        write_len(w, block.stride())?;
        for &word in block.words() {
            w.write_f32::<LittleEndian>(word)?;
        }
    }
    write_len(w, count)
}

/// Reads a chunk batch: one block per channel, and the chunk count.
pub fn read_batch<R: Read>(r: &mut R) -> Result<(Vec<BufferData>, usize), RemoteError> {
    let channels = read_len(r)?;
    let mut blocks = Vec::with_capacity(channels.min(64));
    for _ in 0..channels {
        let samples = read_len(r)?;
        let stride = read_len(r)?;
        if stride == 0 {
            return Err(RemoteError::protocol("zero stride"));
        }
        let len = samples
            .checked_mul(stride)
            .filter(|&len| len <= MAX_LEN)
            .ok_or_else(|| RemoteError::protocol(format!("{samples} samples of stride {stride} is too large")))?;
        let mut words = Vec::with_capacity(len.min(READ_PIECE));
        while words.len() < len {
            let start = words.len();
            words.resize(start + (len - start).min(READ_PIECE), 0.0);
            r.read_f32_into::<LittleEndian>(&mut words[start..])?;
        }
        blocks.push(BufferData::from_words(words, stride));
    }
    let count = read_len(r)?;
    Ok((blocks, count))
}

/// Writes a duration as 64-bit nanoseconds.
pub fn write_elapsed<W: Write>(w: &mut W, elapsed: Duration) -> io::Result<()> {
    w.write_u64::<LittleEndian>(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
}

/// Reads a duration written by [`write_elapsed`].
pub fn read_elapsed<R: Read>(r: &mut R) -> Result<Duration, RemoteError> {
    Ok(Duration::from_nanos(r.read_u64::<LittleEndian>()?))
}

/// Writes a success status.
pub fn write_ok<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_u8(OK)
}

/// Writes a refusal with its reason.
pub fn write_refusal<W: Write>(w: &mut W, reason: &str) -> io::Result<()> {
    w.write_u8(REFUSED)?;
    write_str(w, reason)
}

/// Reads a reply status.
pub fn read_status<R: Read>(r: &mut R) -> Result<(), RemoteError> {
    match r.read_u8()? {
        OK => Ok(()),
        REFUSED => Err(RemoteError::Refused(read_str(r)?)),
        other => Err(RemoteError::protocol(format!("bad status byte {other}"))),
    }
}
