//! MIB subtree traversal.
//!
//! The walk engine advances a cursor with GET-NEXT (v1) or GET-BULK
//! (v2c/v3) and stops on the first varbind that leaves the root subtree
//! or carries an exception marker. Agents that fail to advance the
//! cursor are detected and aborted rather than looped on.

use tokio_util::sync::CancellationToken;

use super::Client;
use crate::error::{Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::VarBind;

/// Outcome of feeding one batch through the termination rules.
enum BatchOutcome {
    /// Batch fully consumed; keep walking.
    Continue,
    /// A stop condition was hit mid-batch.
    Done,
}

impl Client {
    /// Walk the subtree under `root`, collecting every varbind.
    ///
    /// Termination: an OID outside `root`, an exception marker
    /// (noSuchObject / noSuchInstance / endOfMibView), an empty batch, or
    /// a trailing v1 `noSuchName` error. All are normal ends; other SNMP
    /// errors propagate.
    pub async fn walk(&self, cancel: &CancellationToken, root: &Oid) -> Result<Vec<VarBind>> {
        let mut results = Vec::new();
        self.walk_func(cancel, root, |vb| {
            results.push(vb);
            Ok(())
        })
        .await?;
        Ok(results)
    }

    /// Walk the subtree under `root`, invoking `f` per varbind.
    ///
    /// An error returned by `f` halts the walk and is surfaced unchanged.
    pub async fn walk_func(
        &self,
        cancel: &CancellationToken,
        root: &Oid,
        mut f: impl FnMut(VarBind) -> Result<()>,
    ) -> Result<()> {
        root.validate()?;
        self.inner.metrics.walk_requests.incr();

        let use_bulk = self.config().version.supports_bulk();
        let max_repetitions = self.config().max_repetitions;
        let non_repeaters = self.config().non_repeaters;

        let mut cursor = root.clone();
        // Non-progress strikes: a compliant agent always returns OIDs
        // strictly greater than the cursor, so a second consecutive
        // failure to advance means the agent is looping.
        let mut strikes = 0u8;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let batch = if use_bulk {
                self.get_bulk(
                    cancel,
                    non_repeaters,
                    max_repetitions,
                    std::slice::from_ref(&cursor),
                )
                .await
            } else {
                self.get_next(cancel, std::slice::from_ref(&cursor)).await
            };

            let batch = match batch {
                Ok(batch) => batch,
                // v1 signals end-of-view with a top-level noSuchName
                Err(Error::Snmp {
                    status: ErrorStatus::NoSuchName,
                    ..
                }) => return Ok(()),
                Err(e) => return Err(e),
            };

            if batch.is_empty() {
                return Ok(());
            }

            let issued = cursor.clone();
            match self.consume_batch(batch, root, &mut cursor, &mut f)? {
                BatchOutcome::Done => return Ok(()),
                BatchOutcome::Continue => {}
            }

            if cursor <= issued {
                strikes += 1;
                if strikes >= 2 {
                    tracing::warn!(
                        target: "edgesnmp::client",
                        peer = %self.peer_addr(),
                        cursor = %cursor,
                        "aborting walk: agent is not advancing"
                    );
                    return Err(Error::NonMonotonicWalk {
                        target: self.peer_addr(),
                        oid: cursor,
                    });
                }
            } else {
                strikes = 0;
            }
        }
    }

    fn consume_batch(
        &self,
        batch: Vec<VarBind>,
        root: &Oid,
        cursor: &mut Oid,
        f: &mut impl FnMut(VarBind) -> Result<()>,
    ) -> Result<BatchOutcome> {
        for vb in batch {
            // Left the subtree: stop without reporting this varbind
            if !vb.oid.starts_with(root) {
                return Ok(BatchOutcome::Done);
            }
            // Exception markers terminate, also unreported
            if vb.value.is_exception() {
                return Ok(BatchOutcome::Done);
            }

            *cursor = vb.oid.clone();
            f(vb)?;
        }
        Ok(BatchOutcome::Continue)
    }
}
