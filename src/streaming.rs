//! Single-pass streaming decoder for heap dumps.
//!
//! [`DumpStream`] is a pull iterator over [`Record`]s: callers drive the
//! loop and can stop early by dropping the stream. Progress reporting and
//! error delivery go through an observer object so they stay out of the
//! record path, and recovery behavior is a plain policy value.

use std::io::BufRead;
use std::time::{Duration, Instant};

use crate::codec::{at_eof, read_varint, CountingReader};
use crate::error::{HeapLensError, Result};
use crate::records::{decode_params, decode_record, DumpParams, Record, MAX_TAG, TAG_PARAMS};

/// Magic bytes every dump starts with.
pub const DUMP_HEADER: &[u8; 16] = b"go1.7 heap dump\n";

/// Default capacity for the read buffer wrapped around dump files.
pub const READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Smallest read buffer worth using on a real dump.
pub const MIN_READ_BUFFER_SIZE: usize = 1024 * 1024;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Error-recovery behavior for one parse.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryPolicy {
    /// Recoverable failures tolerated before the parse aborts.
    pub max_errors: usize,
    /// Whether to scan forward and resume after a recoverable failure.
    pub skip_on_error: bool,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_errors: 100,
            skip_on_error: true,
        }
    }
}

/// Receives progress ticks and recoverable-error notifications.
///
/// All methods have no-op defaults; implement only what you watch.
/// Returning an error from [`ParseObserver::on_error`] aborts the parse
/// and the error is handed back to the caller unchanged.
pub trait ParseObserver {
    fn on_progress(&mut self, bytes_read: u64, records: u64, elapsed: Duration) {
        let _ = (bytes_read, records, elapsed);
    }

    fn on_error(&mut self, err: &HeapLensError, recoverable: bool) -> Result<()> {
        let _ = (err, recoverable);
        Ok(())
    }
}

/// Observer that ignores everything.
pub struct NullObserver;

impl ParseObserver for NullObserver {}

/// Iterator over the records of one dump.
///
/// Yields `Err` exactly once for a fatal failure and then fuses. The
/// final item of a well-formed dump is [`Record::Eof`].
pub struct DumpStream<'a, R: BufRead> {
    r: CountingReader<R>,
    params: Option<DumpParams>,
    policy: RecoveryPolicy,
    observer: &'a mut dyn ParseObserver,
    started: Instant,
    last_report: Instant,
    records: u64,
    errors: usize,
    pending_tag: Option<u64>,
    done: bool,
}

impl<'a, R: BufRead> std::fmt::Debug for DumpStream<'a, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpStream")
            .field("params", &self.params)
            .field("policy", &self.policy)
            .field("records", &self.records)
            .field("errors", &self.errors)
            .field("pending_tag", &self.pending_tag)
            .field("done", &self.done)
            .finish()
    }
}

impl<'a, R: BufRead> DumpStream<'a, R> {
    /// Verify the dump header and set up the stream. Emits an initial
    /// progress tick so observers see the parse begin.
    pub fn new(
        reader: R,
        policy: RecoveryPolicy,
        observer: &'a mut dyn ParseObserver,
    ) -> Result<Self> {
        let mut r = CountingReader::new(reader);
        let mut header = [0u8; 16];
        std::io::Read::read_exact(&mut r, &mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                HeapLensError::TruncatedRecord
            } else {
                HeapLensError::Io(e)
            }
        })?;
        if &header != DUMP_HEADER {
            return Err(HeapLensError::InvalidHeader(
                String::from_utf8_lossy(&header).into_owned(),
            ));
        }

        let started = Instant::now();
        observer.on_progress(r.bytes_read(), 0, started.elapsed());
        Ok(Self {
            r,
            params: None,
            policy,
            observer,
            started,
            last_report: started,
            records: 0,
            errors: 0,
            pending_tag: None,
            done: false,
        })
    }

    /// Dump parameters, once the Params record has been seen.
    pub fn params(&self) -> Option<&DumpParams> {
        self.params.as_ref()
    }

    /// Bytes consumed from the underlying reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.r.bytes_read()
    }

    fn report_progress(&mut self, force: bool) {
        if force || self.last_report.elapsed() >= PROGRESS_INTERVAL {
            self.observer
                .on_progress(self.r.bytes_read(), self.records, self.started.elapsed());
            self.last_report = Instant::now();
        }
    }

    /// Deliver a recoverable failure to the observer and, if the policy
    /// allows, scan forward to the next plausible tag byte.
    fn recover(&mut self, err: HeapLensError) -> Result<()> {
        self.errors += 1;
        let will_skip = self.policy.skip_on_error;
        self.observer.on_error(&err, will_skip)?;
        if !will_skip {
            return Err(err);
        }
        if self.errors > self.policy.max_errors {
            return Err(HeapLensError::ErrorBudgetExceeded {
                count: self.errors,
                last: Box::new(err),
            });
        }
        log::warn!("skipping corrupt record: {}", err);
        self.scan_to_next_tag()?;
        Ok(())
    }

    /// Advance byte by byte until something that could be a record tag
    /// shows up, then stash it for the next iteration.
    fn scan_to_next_tag(&mut self) -> Result<()> {
        loop {
            let buf = self.r.fill_buf()?;
            if buf.is_empty() {
                return Ok(()); // plain end of input
            }
            let b = buf[0];
            self.r.consume(1);
            if u64::from(b) <= MAX_TAG {
                self.pending_tag = Some(u64::from(b));
                return Ok(());
            }
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            let tag = match self.pending_tag.take() {
                Some(tag) => tag,
                None => {
                    if at_eof(&mut self.r)? {
                        return Ok(None);
                    }
                    read_varint(&mut self.r)?
                }
            };
            self.records += 1;
            self.report_progress(false);

            if tag > MAX_TAG {
                self.recover(HeapLensError::UnknownTag(tag))?;
                continue;
            }
            if tag == TAG_PARAMS {
                // params corruption is never recoverable
                let params = decode_params(&mut self.r)
                    .map_err(|e| HeapLensError::ParamsCorrupt(Box::new(e)))?;
                self.params = Some(params.clone());
                return Ok(Some(Record::Params(params)));
            }
            match decode_record(&mut self.r, tag, self.params.as_ref()) {
                Ok(Some(rec)) => return Ok(Some(rec)),
                Ok(None) => continue,
                Err(e) if e.recoverable() => self.recover(e)?,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<R: BufRead> Iterator for DumpStream<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(rec)) => {
                if matches!(rec, Record::Eof) {
                    self.done = true;
                    self.report_progress(true);
                }
                Some(Ok(rec))
            }
            Ok(None) => {
                self.done = true;
                self.report_progress(true);
                None
            }
            Err(e) => {
                self.done = true;
                self.report_progress(true);
                Some(Err(e))
            }
        }
    }
}
