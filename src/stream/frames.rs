//! Adapters that run a [`DelimitedSplitter`] over a chunk source.
//!
//! Both adapters follow the same rules:
//!
//! - frames come out in input order, including empty frames between
//!   adjacent delimiters
//! - on clean end of input the buffered tail is flushed if non-empty
//! - an upstream error is passed through once, after which the adapter
//!   yields nothing; the buffered tail is dropped, not flushed
//! - dropping the adapter abandons the source without flushing

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, ready};

use super::splitter::{DelimitedSplitter, SplitError};
use super::utf8::Utf8ChunkDecoder;

/// Iterator over frames split from an iterator of text chunks
pub struct SplitFrames<I> {
    chunks: I,
    splitter: DelimitedSplitter,
    pending: VecDeque<String>,
    done: bool,
}

impl<I, E> Iterator for SplitFrames<I>
where
    I: Iterator<Item = Result<String, E>>,
{
    type Item = Result<String, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            if self.done {
                return None;
            }
            match self.chunks.next() {
                Some(Ok(chunk)) => self.pending.extend(self.splitter.feed(&chunk).unwrap_or_default()),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return self.splitter.finish().map(Ok);
                }
            }
        }
    }
}

/// Split an iterator of text chunks into frames
pub fn split_chunks<I, E>(chunks: I, delimiter: &str) -> Result<SplitFrames<I::IntoIter>, SplitError>
where
    I: IntoIterator<Item = Result<String, E>>,
{
    Ok(SplitFrames {
        chunks: chunks.into_iter(),
        splitter: DelimitedSplitter::new(delimiter)?,
        pending: VecDeque::new(),
        done: false,
    })
}

/// Stream of frames split from a stream of text chunks
pub struct FrameStream<S> {
    inner: S,
    splitter: DelimitedSplitter,
    pending: VecDeque<String>,
    done: bool,
}

impl<S, E> Stream for FrameStream<S>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.done {
                return Poll::Ready(None);
            }
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => this.pending.extend(this.splitter.feed(&chunk).unwrap_or_default()),
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    return Poll::Ready(this.splitter.finish().map(Ok));
                }
            }
        }
    }
}

/// Split a stream of text chunks into frames
///
/// ```
/// use futures::{StreamExt, executor::block_on, stream};
/// use ollama_chat::stream::split_stream;
///
/// let chunks = stream::iter(vec![Ok::<_, std::io::Error>("hello\nwor".to_string()), Ok("ld\n".to_string())]);
/// let frames: Vec<String> = block_on(split_stream(chunks, "\n").unwrap().map(|f| f.unwrap()).collect());
/// assert_eq!(frames, vec!["hello", "world"]);
/// ```
pub fn split_stream<S, E>(stream: S, delimiter: &str) -> Result<FrameStream<S>, SplitError>
where
    S: Stream<Item = Result<String, E>> + Unpin,
{
    Ok(FrameStream {
        inner: stream,
        splitter: DelimitedSplitter::new(delimiter)?,
        pending: VecDeque::new(),
        done: false,
    })
}

/// Stream of text decoded from a stream of byte chunks
pub struct Utf8Stream<S> {
    inner: S,
    decoder: Utf8ChunkDecoder,
    done: bool,
}

impl<S, E> Stream for Utf8Stream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(bytes)) => Poll::Ready(Some(Ok(this.decoder.decode(&bytes)))),
            Some(Err(e)) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.done = true;
                Poll::Ready(this.decoder.finish().map(Ok))
            }
        }
    }
}

/// Decode a byte stream (such as an HTTP body) into text chunks
pub fn decode_utf8<S, E>(stream: S) -> Utf8Stream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    Utf8Stream { inner: stream, decoder: Utf8ChunkDecoder::new(), done: false }
}
