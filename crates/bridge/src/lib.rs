//! Bridge between native asynchronous USB I/O and managed transfer objects
//!
//! This crate converts native, C-style USB structures into long-lived
//! managed representations:
//!
//! - The descriptor wrapper ([`descriptor`]) deep-copies interface /
//!   alternate-setting / endpoint descriptor trees into owned managed
//!   objects with no remaining ties to native memory.
//! - The transfer bridge ([`TransferBridge`]) maintains the two-way mapping
//!   between native transfer records (mutated asynchronously by the native
//!   core's event-processing thread) and the reference-counted
//!   [`ManagedTransfer`] views callers hold.
//!
//! The correspondence table behind the bridge is keyed by raw handle
//! address and stores weak references: it enforces one managed object per
//! live native handle without ever keeping one alive, and `reset` is the
//! sole eviction trigger.
//!
//! # Example
//!
//! ```
//! use bridge::TransferBridge;
//! use common::test_utils::TransferPool;
//! use native::TRANSFER_TYPE_BULK;
//!
//! let mut pool = TransferPool::new();
//! let handle = pool.alloc();
//! let record = pool.record_mut(handle).unwrap();
//! record.endpoint = 0x81;
//! record.transfer_type = TRANSFER_TYPE_BULK;
//!
//! let bridge = TransferBridge::new();
//!
//! // SAFETY: the pool keeps the record alive.
//! let transfer = unsafe { bridge.wrap_transfer(handle) }.unwrap();
//! assert_eq!(transfer.endpoint(), 0x81);
//!
//! // Wrapping again observes the same managed object.
//! let again = unsafe { bridge.wrap_transfer(handle) }.unwrap();
//! assert!(std::sync::Arc::ptr_eq(&transfer, &again));
//!
//! // Round trip back to the native handle.
//! assert_eq!(bridge.unwrap_transfer(&transfer).unwrap(), handle);
//!
//! // Reset clears the shadow state and evicts the table entry.
//! bridge.reset_transfer(&transfer);
//! assert!(bridge.unwrap_transfer(&transfer).is_err());
//! ```

pub mod descriptor;
pub mod managed;
pub mod transfer;

mod registry;

pub use common::{Error, Result};
pub use descriptor::{
    wrap_alternate_setting, wrap_config, wrap_endpoint, wrap_interface, wrap_interface_array,
};
pub use managed::{
    ManagedAlternateSetting, ManagedConfig, ManagedEndpoint, ManagedInterface, ManagedTransfer,
    TransferCallback,
};
pub use transfer::TransferBridge;
