//! Reassembling delimited frames from a chunked stream.
//!
//! The model server answers with one JSON envelope per line, but the HTTP
//! body arrives in chunks that ignore line boundaries. [`DelimitedSplitter`]
//! buffers the unterminated tail between chunks and hands back whole frames;
//! [`split_chunks`] and [`split_stream`] drive it over an iterator or an async
//! stream, and [`decode_utf8`] turns raw body bytes into text first.

pub mod frames;
pub mod splitter;
pub mod utf8;

pub use frames::{FrameStream, SplitFrames, Utf8Stream, decode_utf8, split_chunks, split_stream};
pub use splitter::{DelimitedSplitter, NEWLINE, SplitError, SplitterState};
pub use utf8::Utf8ChunkDecoder;
