//! Fixed C-style surface of the native USB core
//!
//! This crate defines the struct layouts, constants, and opaque handle types
//! through which the rest of the workspace consumes the native USB core. The
//! core itself (device enumeration, transfer execution, event processing) is
//! an external collaborator; nothing here executes USB I/O.
//!
//! Two families of records exist:
//!
//! - Descriptor records ([`NativeInterface`], [`NativeInterfaceDescriptor`],
//!   [`NativeEndpointDescriptor`], [`NativeConfigDescriptor`]): read-only,
//!   statically allocated by the native core, stable for the duration of the
//!   query that produced them.
//! - Transfer records ([`NativeTransfer`]): mutable, owned by the native
//!   core, with completion-written fields declared as atomics so they can be
//!   observed from another thread without tearing.
//!
//! # Example
//!
//! ```
//! use native::{NativeTransfer, TransferHandle, TransferStatus, TRANSFER_COMPLETED};
//!
//! let mut record = Box::new(NativeTransfer::new());
//! let handle = TransferHandle::from_ptr(&mut *record);
//!
//! assert!(!handle.is_null());
//! assert_eq!(TransferStatus::from_raw(TRANSFER_COMPLETED), Some(TransferStatus::Completed));
//! ```

pub mod descriptor;
pub mod transfer;

pub use descriptor::{
    DT_CONFIG, DT_ENDPOINT, DT_INTERFACE, NativeConfigDescriptor, NativeEndpointDescriptor,
    NativeInterface, NativeInterfaceDescriptor,
};
pub use transfer::{
    DeviceRef, NativeTransfer, NativeTransferCallback, TRANSFER_CANCELLED, TRANSFER_COMPLETED,
    TRANSFER_ERROR, TRANSFER_NO_DEVICE, TRANSFER_NONE, TRANSFER_OVERFLOW, TRANSFER_STALL,
    TRANSFER_TIMED_OUT, TRANSFER_TYPE_BULK, TRANSFER_TYPE_CONTROL, TRANSFER_TYPE_INTERRUPT,
    TRANSFER_TYPE_ISOCHRONOUS, TransferHandle, TransferKind, TransferStatus,
};
