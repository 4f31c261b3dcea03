//! Managed representations of native USB structures
//!
//! Descriptor wrappers are plain owned trees: every scalar is copied, every
//! child array is an owned `Vec` in native declaration order, and nothing
//! points back into native memory once construction finishes. They stay
//! valid no matter what the native core does with the source descriptors.
//!
//! [`ManagedTransfer`] is different: it is a live view over one native
//! transfer record, identified by an opaque handle it never dereferences.
//! The wrap-time scalar copies are immutable; the caller-visible mutable
//! state (buffer reference, callback, user context, completion results)
//! lives behind a single mutex so the completion path and the caller's
//! thread cannot observe torn updates.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use native::{DeviceRef, TransferHandle, TransferKind, TransferStatus};

/// One wrapped endpoint descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedEndpoint {
    /// Endpoint address, including the direction bit.
    pub address: u8,
    /// Endpoint attributes.
    pub attributes: u8,
    /// Maximum packet size this endpoint can handle.
    pub max_packet_size: u16,
    /// Polling interval for data transfers.
    pub interval: u8,
    /// Rate feedback refresh (audio endpoints).
    pub refresh: u8,
    /// Synch endpoint address (audio endpoints).
    pub synch_address: u8,
    /// Vendor-specific descriptor bytes, copied verbatim.
    #[serde(with = "serde_bytes")]
    pub extra: Vec<u8>,
}

/// One wrapped alternate setting with its endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedAlternateSetting {
    /// Interface number this setting belongs to.
    pub interface_number: u8,
    /// Value used to select this alternate setting.
    pub alternate_setting: u8,
    /// Interface class code.
    pub class: u8,
    /// Interface subclass code.
    pub subclass: u8,
    /// Interface protocol code.
    pub protocol: u8,
    /// Index of the string descriptor naming this interface.
    pub interface_index: u8,
    /// Wrapped endpoints, in native declaration order.
    pub endpoints: Vec<ManagedEndpoint>,
    /// Vendor-specific descriptor bytes, copied verbatim.
    #[serde(with = "serde_bytes")]
    pub extra: Vec<u8>,
}

/// One wrapped interface: its alternate settings in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedInterface {
    /// Wrapped alternate settings, in native declaration order.
    pub alt_settings: Vec<ManagedAlternateSetting>,
}

/// One wrapped configuration descriptor with its interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedConfig {
    /// Value used to select this configuration.
    pub configuration_value: u8,
    /// Index of the string descriptor naming this configuration.
    pub configuration_index: u8,
    /// Configuration attributes (self-powered, remote wakeup).
    pub attributes: u8,
    /// Maximum power consumption, in 2 mA units.
    pub max_power: u8,
    /// Wrapped interfaces, in native declaration order.
    pub interfaces: Vec<ManagedInterface>,
    /// Vendor-specific descriptor bytes, copied verbatim.
    #[serde(with = "serde_bytes")]
    pub extra: Vec<u8>,
}

/// Completion hook a caller can park on a managed transfer.
///
/// Invoked by the bridge's completion path with the managed transfer whose
/// native record just finished, after the shadow state has been refreshed.
pub type TransferCallback = Arc<dyn Fn(&Arc<ManagedTransfer>) + Send + Sync>;

/// Caller-visible mutable state of a managed transfer.
#[derive(Default)]
struct ShadowState {
    status: Option<TransferStatus>,
    actual_length: usize,
    buffer: Option<Bytes>,
    callback: Option<TransferCallback>,
    user_context: Option<Arc<dyn Any + Send + Sync>>,
}

/// Managed view over one native transfer record.
///
/// Produced only by a transfer bridge; at most one live instance exists per
/// native handle per bridge. The embedded handle is an identity value, never
/// dereferenced through this type.
pub struct ManagedTransfer {
    bridge_tag: u64,
    handle: TransferHandle,
    device: DeviceRef,
    endpoint: u8,
    kind: TransferKind,
    timeout_ms: u32,
    buffer_len: usize,
    shadow: Mutex<ShadowState>,
}

impl ManagedTransfer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bridge_tag: u64,
        handle: TransferHandle,
        device: DeviceRef,
        endpoint: u8,
        kind: TransferKind,
        timeout_ms: u32,
        buffer_len: usize,
        status: Option<TransferStatus>,
        actual_length: usize,
    ) -> Self {
        Self {
            bridge_tag,
            handle,
            device,
            endpoint,
            kind,
            timeout_ms,
            buffer_len,
            shadow: Mutex::new(ShadowState {
                status,
                actual_length,
                ..ShadowState::default()
            }),
        }
    }

    /// Native device handle this transfer targets (opaque).
    pub fn device(&self) -> DeviceRef {
        self.device
    }

    /// Endpoint address, including the direction bit.
    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }

    /// Transfer type.
    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Timeout in milliseconds (0 = unlimited).
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Length of the native data buffer at wrap time.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Completion status, `None` until a completion has been observed.
    pub fn status(&self) -> Option<TransferStatus> {
        self.shadow().status
    }

    /// Bytes actually transferred, as of the last observed completion.
    pub fn actual_length(&self) -> usize {
        self.shadow().actual_length
    }

    /// The buffer reference parked on this transfer, if any.
    pub fn buffer(&self) -> Option<Bytes> {
        self.shadow().buffer.clone()
    }

    /// Park a buffer reference, keeping its backing storage alive while the
    /// native I/O runs. `None` detaches.
    pub fn set_buffer(&self, buffer: Option<Bytes>) {
        self.shadow().buffer = buffer;
    }

    /// The completion callback parked on this transfer, if any.
    pub fn callback(&self) -> Option<TransferCallback> {
        self.shadow().callback.clone()
    }

    /// Park a completion callback. `None` detaches.
    pub fn set_callback(&self, callback: Option<TransferCallback>) {
        self.shadow().callback = callback;
    }

    /// The user context parked on this transfer, if any.
    pub fn user_context(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.shadow().user_context.clone()
    }

    /// Park an arbitrary user context. `None` detaches.
    pub fn set_user_context(&self, user_context: Option<Arc<dyn Any + Send + Sync>>) {
        self.shadow().user_context = user_context;
    }

    pub(crate) fn bridge_tag(&self) -> u64 {
        self.bridge_tag
    }

    pub(crate) fn handle(&self) -> TransferHandle {
        self.handle
    }

    /// Clear all shadow fields back to their not-yet-submitted defaults.
    pub(crate) fn reset_shadow(&self) {
        *self.shadow() = ShadowState::default();
    }

    /// Record a completion observed on the native side. Returns the parked
    /// callback so the caller can invoke it without holding the lock.
    pub(crate) fn refresh_from_native(
        &self,
        status: Option<TransferStatus>,
        actual_length: usize,
    ) -> Option<TransferCallback> {
        let mut shadow = self.shadow();
        shadow.status = status;
        shadow.actual_length = actual_length;
        shadow.callback.clone()
    }

    fn shadow(&self) -> MutexGuard<'_, ShadowState> {
        self.shadow.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManagedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedTransfer")
            .field("handle", &self.handle)
            .field("device", &self.device)
            .field("endpoint", &self.endpoint)
            .field("kind", &self.kind)
            .field("timeout_ms", &self.timeout_ms)
            .field("buffer_len", &self.buffer_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_transfer() -> Arc<ManagedTransfer> {
        Arc::new(ManagedTransfer::new(
            1,
            TransferHandle::NULL,
            DeviceRef::from_ptr(std::ptr::null_mut()),
            0x81,
            TransferKind::Bulk,
            5000,
            512,
            None,
            0,
        ))
    }

    #[test]
    fn test_scalar_copies() {
        let transfer = test_transfer();

        assert_eq!(transfer.endpoint(), 0x81);
        assert_eq!(transfer.kind(), TransferKind::Bulk);
        assert_eq!(transfer.timeout_ms(), 5000);
        assert_eq!(transfer.buffer_len(), 512);
        assert_eq!(transfer.status(), None);
        assert_eq!(transfer.actual_length(), 0);
    }

    #[test]
    fn test_shadow_buffer_roundtrip() {
        let transfer = test_transfer();
        assert!(transfer.buffer().is_none());

        transfer.set_buffer(Some(Bytes::from_static(b"abc")));
        assert_eq!(transfer.buffer().unwrap().as_ref(), b"abc");

        transfer.set_buffer(None);
        assert!(transfer.buffer().is_none());
    }

    #[test]
    fn test_user_context_roundtrip() {
        let transfer = test_transfer();

        transfer.set_user_context(Some(Arc::new(42u32)));
        let context = transfer.user_context().unwrap();
        assert_eq!(context.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn test_reset_shadow_clears_everything() {
        let transfer = test_transfer();
        transfer.set_buffer(Some(Bytes::from_static(b"abc")));
        transfer.set_callback(Some(Arc::new(|_| {})));
        transfer.set_user_context(Some(Arc::new(7u8)));
        transfer.refresh_from_native(Some(TransferStatus::Completed), 3);

        transfer.reset_shadow();

        assert!(transfer.buffer().is_none());
        assert!(transfer.callback().is_none());
        assert!(transfer.user_context().is_none());
        assert_eq!(transfer.status(), None);
        assert_eq!(transfer.actual_length(), 0);
    }

    #[test]
    fn test_refresh_returns_parked_callback() {
        let transfer = test_transfer();
        assert!(transfer.refresh_from_native(Some(TransferStatus::Error), 0).is_none());

        transfer.set_callback(Some(Arc::new(|_| {})));
        assert!(
            transfer
                .refresh_from_native(Some(TransferStatus::Completed), 10)
                .is_some()
        );
        assert_eq!(transfer.status(), Some(TransferStatus::Completed));
        assert_eq!(transfer.actual_length(), 10);
    }

    #[test]
    fn test_descriptor_clone_equality() {
        let endpoint = ManagedEndpoint {
            address: 0x81,
            attributes: 0x02,
            max_packet_size: 512,
            interval: 0,
            refresh: 0,
            synch_address: 0,
            extra: vec![0x05, 0x25],
        };

        let cloned = endpoint.clone();
        assert_eq!(endpoint, cloned);

        let setting = ManagedAlternateSetting {
            interface_number: 0,
            alternate_setting: 1,
            class: 0xFF,
            subclass: 0,
            protocol: 0,
            interface_index: 0,
            endpoints: vec![endpoint],
            extra: Vec::new(),
        };
        assert_eq!(setting.endpoints.len(), 1);
        assert_eq!(setting.endpoints[0], cloned);
    }
}
