//! Transfer bridge
//!
//! Two-way mapping between native transfer records and their managed views.
//! Wrapping is create-or-reuse: the correspondence table guarantees that
//! repeated wraps of one handle observe one managed object, so callers can
//! stash state on it between submission and completion. Reset is the sole
//! authoritative eviction trigger; managed-object finalization ordering
//! across the boundary is unreliable and is never relied on.
//!
//! A bridge is an explicitly constructed context object. Independent
//! bridges have independent tables and tag their transfers, so objects
//! cannot be smuggled from one bridge into another.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use common::{Error, Result};
use native::{DeviceRef, TransferHandle, TransferKind, TransferStatus};

use crate::managed::ManagedTransfer;
use crate::registry::CorrespondenceTable;

static NEXT_BRIDGE_TAG: AtomicU64 = AtomicU64::new(1);

/// The bridge between native transfer records and managed transfers.
pub struct TransferBridge {
    tag: u64,
    table: CorrespondenceTable,
}

impl TransferBridge {
    pub fn new() -> Self {
        Self {
            tag: NEXT_BRIDGE_TAG.fetch_add(1, Ordering::Relaxed),
            table: CorrespondenceTable::new(),
        }
    }

    /// Wrap a native transfer record, reusing the existing managed view if
    /// one is registered for this handle.
    ///
    /// The null handle is `InvalidArgument` (an unsubmitted or already-freed
    /// transfer), as is a record carrying an unknown transfer type. Safe to
    /// call concurrently from any threads: table access is the single
    /// serialization point, and two racing wraps of one handle both observe
    /// the same managed object.
    ///
    /// # Safety
    ///
    /// A non-null `handle` must identify a native record owned by the native
    /// core and alive for the duration of the call.
    pub unsafe fn wrap_transfer(&self, handle: TransferHandle) -> Result<Arc<ManagedTransfer>> {
        if handle.is_null() {
            return Err(Error::InvalidArgument("null transfer handle".to_string()));
        }

        self.table.get_or_try_insert(handle.as_usize(), || {
            // SAFETY: the caller guarantees the record is alive for the
            // duration of this call; the completion-written fields are
            // atomics, so observing them mid-completion cannot tear.
            let record = unsafe { &*handle.as_ptr() };

            let kind = TransferKind::from_raw(record.transfer_type).ok_or_else(|| {
                Error::InvalidArgument(format!("unknown transfer type {}", record.transfer_type))
            })?;
            let status = TransferStatus::from_raw(record.status.load(Ordering::Acquire));
            let actual_length = record.actual_length.load(Ordering::Acquire).max(0) as usize;

            debug!(
                "wrapping transfer {:#x} (endpoint {:#04x}, {:?})",
                handle.as_usize(),
                record.endpoint,
                kind
            );

            Ok(Arc::new(ManagedTransfer::new(
                self.tag,
                handle,
                DeviceRef::from_ptr(record.dev_handle),
                record.endpoint,
                kind,
                record.timeout,
                record.length.max(0) as usize,
                status,
                actual_length,
            )))
        })
    }

    /// Recover the native handle backing a managed transfer.
    ///
    /// Pure accessor. Fails with `InvalidState` if the object came from a
    /// different bridge, or if its handle is stale (the table entry was
    /// evicted by a reset, or replaced after the native core reused the
    /// address). Returning a possibly-dangling handle silently would be
    /// worse than failing, so staleness is always checked.
    pub fn unwrap_transfer(&self, transfer: &Arc<ManagedTransfer>) -> Result<TransferHandle> {
        if transfer.bridge_tag() != self.tag {
            return Err(Error::InvalidState(
                "transfer was not produced by this bridge".to_string(),
            ));
        }

        let handle = transfer.handle();
        if !self.table.is_current(handle.as_usize(), transfer) {
            return Err(Error::InvalidState(format!(
                "stale transfer handle {:#x}",
                handle.as_usize()
            )));
        }

        Ok(handle)
    }

    /// Clear a managed transfer's shadow state and evict its table entry,
    /// preparing the underlying native slot for reuse.
    ///
    /// The wrap-time scalar copies stay; buffer, callback, user context,
    /// status, and actual length return to their not-yet-submitted
    /// defaults. Idempotent: resetting twice, or resetting an object whose
    /// entry is already gone, is a no-op. The entry is only evicted when it
    /// still refers to this exact object, so a stale object's reset cannot
    /// evict a successor registered at the same address.
    pub fn reset_transfer(&self, transfer: &Arc<ManagedTransfer>) {
        let handle = transfer.handle();
        let evicted = self
            .table
            .remove_entry_for(handle.as_usize(), transfer);
        transfer.reset_shadow();

        if evicted {
            debug!("reset transfer {:#x}", handle.as_usize());
        } else {
            debug!("redundant reset for transfer {:#x}", handle.as_usize());
        }
    }

    /// Completion-dispatch path: refresh the managed view from the native
    /// record and invoke the parked callback, if any.
    ///
    /// Wraps the handle first (create-or-reuse, since a completion may
    /// arrive for a transfer the caller never wrapped), copies the
    /// completion-written fields into the shadow state under its lock, then
    /// runs the callback outside all locks so it may call back into the
    /// bridge.
    ///
    /// # Safety
    ///
    /// Same contract as [`wrap_transfer`](Self::wrap_transfer).
    pub unsafe fn complete_transfer(&self, handle: TransferHandle) -> Result<Arc<ManagedTransfer>> {
        let transfer = unsafe { self.wrap_transfer(handle) }?;

        // SAFETY: the caller guarantees the record is alive for the
        // duration of this call.
        let record = unsafe { &*handle.as_ptr() };
        let status = TransferStatus::from_raw(record.status.load(Ordering::Acquire));
        let actual_length = record.actual_length.load(Ordering::Acquire).max(0) as usize;

        debug!(
            "completing transfer {:#x} ({:?}, {} bytes)",
            handle.as_usize(),
            status,
            actual_length
        );

        let callback = transfer.refresh_from_native(status, actual_length);
        if let Some(callback) = callback {
            callback(&transfer);
        }

        Ok(transfer)
    }

    /// Number of handles currently mapped to a live managed transfer.
    pub fn live_entries(&self) -> usize {
        self.table.live_entries()
    }
}

impl Default for TransferBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::TransferPool;
    use native::{TRANSFER_TYPE_BULK, TRANSFER_TYPE_INTERRUPT};

    fn pooled_bulk_transfer(pool: &mut TransferPool) -> TransferHandle {
        let handle = pool.alloc();
        let record = pool.record_mut(handle).unwrap();
        record.endpoint = 0x81;
        record.transfer_type = TRANSFER_TYPE_BULK;
        record.timeout = 5000;
        record.length = 512;
        handle
    }

    #[test]
    fn test_wrap_null_handle_fails() {
        let bridge = TransferBridge::new();
        let err = unsafe { bridge.wrap_transfer(TransferHandle::NULL) }.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_wrap_copies_submission_fields() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);

        let transfer = unsafe { TransferBridge::new().wrap_transfer(handle) }.unwrap();

        assert_eq!(transfer.endpoint(), 0x81);
        assert_eq!(transfer.kind(), TransferKind::Bulk);
        assert_eq!(transfer.timeout_ms(), 5000);
        assert_eq!(transfer.buffer_len(), 512);
        assert_eq!(transfer.status(), None);
        assert_eq!(transfer.actual_length(), 0);
    }

    #[test]
    fn test_identity_stability() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);
        let bridge = TransferBridge::new();

        let first = unsafe { bridge.wrap_transfer(handle) }.unwrap();
        let second = unsafe { bridge.wrap_transfer(handle) }.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bridge.live_entries(), 1);
    }

    #[test]
    fn test_unwrap_round_trip() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);
        let bridge = TransferBridge::new();

        let transfer = unsafe { bridge.wrap_transfer(handle) }.unwrap();
        assert_eq!(bridge.unwrap_transfer(&transfer).unwrap(), handle);
    }

    #[test]
    fn test_unwrap_foreign_bridge_object_fails() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);

        let bridge = TransferBridge::new();
        let other = TransferBridge::new();
        let transfer = unsafe { other.wrap_transfer(handle) }.unwrap();

        let err = bridge.unwrap_transfer(&transfer).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_unwrap_after_reset_fails() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);
        let bridge = TransferBridge::new();

        let transfer = unsafe { bridge.wrap_transfer(handle) }.unwrap();
        bridge.reset_transfer(&transfer);

        let err = bridge.unwrap_transfer(&transfer).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_wrap_unknown_transfer_type_fails() {
        let mut pool = TransferPool::new();
        let handle = pool.alloc();
        pool.record_mut(handle).unwrap().transfer_type = 9;

        let bridge = TransferBridge::new();
        let err = unsafe { bridge.wrap_transfer(handle) }.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        // The failed wrap left nothing behind; fixing the record makes the
        // handle wrappable.
        assert_eq!(bridge.live_entries(), 0);
        pool.record_mut(handle).unwrap().transfer_type = TRANSFER_TYPE_INTERRUPT;
        let transfer = unsafe { bridge.wrap_transfer(handle) }.unwrap();
        assert_eq!(transfer.kind(), TransferKind::Interrupt);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);
        let bridge = TransferBridge::new();

        let transfer = unsafe { bridge.wrap_transfer(handle) }.unwrap();
        bridge.reset_transfer(&transfer);
        bridge.reset_transfer(&transfer);

        assert_eq!(bridge.live_entries(), 0);
        assert!(transfer.status().is_none());
    }

    #[test]
    fn test_distinct_bridges_are_independent() {
        let mut pool = TransferPool::new();
        let handle = pooled_bulk_transfer(&mut pool);

        let a = TransferBridge::new();
        let b = TransferBridge::new();

        let wrapped_a = unsafe { a.wrap_transfer(handle) }.unwrap();
        let wrapped_b = unsafe { b.wrap_transfer(handle) }.unwrap();

        assert!(!Arc::ptr_eq(&wrapped_a, &wrapped_b));
        assert_eq!(a.live_entries(), 1);
        assert_eq!(b.live_entries(), 1);
    }
}
