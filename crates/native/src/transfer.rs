//! Native transfer records and the opaque handles that identify them
//!
//! A [`NativeTransfer`] is allocated and owned by the native USB core. The
//! caller fills in the submission fields (endpoint, type, timeout, buffer)
//! before handing the record to the core; the core's completion machinery
//! writes `status` and `actual_length` from its event-processing thread when
//! the I/O finishes. Those two fields are atomics for exactly that reason.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::AtomicI32;

use serde::{Deserialize, Serialize};

/// Completion status has not been written yet (record is idle or in flight).
pub const TRANSFER_NONE: i32 = -1;
/// Transfer completed without error.
pub const TRANSFER_COMPLETED: i32 = 0;
/// Transfer failed.
pub const TRANSFER_ERROR: i32 = 1;
/// Transfer timed out before completing.
pub const TRANSFER_TIMED_OUT: i32 = 2;
/// Transfer was cancelled.
pub const TRANSFER_CANCELLED: i32 = 3;
/// Endpoint stalled (halt condition).
pub const TRANSFER_STALL: i32 = 4;
/// Device was disconnected.
pub const TRANSFER_NO_DEVICE: i32 = 5;
/// Device sent more data than requested.
pub const TRANSFER_OVERFLOW: i32 = 6;

/// Control transfer (endpoint 0).
pub const TRANSFER_TYPE_CONTROL: u8 = 0;
/// Isochronous transfer.
pub const TRANSFER_TYPE_ISOCHRONOUS: u8 = 1;
/// Bulk transfer.
pub const TRANSFER_TYPE_BULK: u8 = 2;
/// Interrupt transfer.
pub const TRANSFER_TYPE_INTERRUPT: u8 = 3;

/// Native completion callback slot.
///
/// The native core invokes this from its event-processing thread. The bridge
/// never reads or writes the slot; it exists so the record layout matches
/// what the core expects.
pub type NativeTransferCallback = Option<unsafe extern "C" fn(*mut NativeTransfer)>;

/// One native transfer record, owned by the native USB core.
///
/// Field layout is fixed; the native core reads and writes these records
/// directly. `status` and `actual_length` are written by the completion
/// machinery after async I/O finishes and are therefore atomics (same size
/// and bit validity as the plain `int` they mirror). Every other field is
/// written only by the submitting caller before the record is in flight.
#[derive(Debug)]
#[repr(C)]
pub struct NativeTransfer {
    /// Native device handle this transfer targets.
    pub dev_handle: *mut c_void,
    /// Transfer flags (core-defined, opaque to the bridge).
    pub flags: u8,
    /// Endpoint address, including the direction bit.
    pub endpoint: u8,
    /// Transfer type, one of the `TRANSFER_TYPE_*` constants.
    pub transfer_type: u8,
    /// Timeout in milliseconds (0 = unlimited).
    pub timeout: u32,
    /// Completion status, one of the `TRANSFER_*` status constants.
    pub status: AtomicI32,
    /// Length of the data buffer in bytes.
    pub length: i32,
    /// Bytes actually transferred, written on completion.
    pub actual_length: AtomicI32,
    /// Native completion callback.
    pub callback: NativeTransferCallback,
    /// Core-side user data slot.
    pub user_data: *mut c_void,
    /// Data buffer.
    pub buffer: *mut u8,
    /// Number of isochronous packets (0 for non-iso transfers).
    pub num_iso_packets: i32,
}

impl NativeTransfer {
    /// Create an idle record: no device, no buffer, status not yet written.
    pub fn new() -> Self {
        Self {
            dev_handle: ptr::null_mut(),
            flags: 0,
            endpoint: 0,
            transfer_type: TRANSFER_TYPE_CONTROL,
            timeout: 0,
            status: AtomicI32::new(TRANSFER_NONE),
            length: 0,
            actual_length: AtomicI32::new(0),
            callback: None,
            user_data: ptr::null_mut(),
            buffer: ptr::null_mut(),
            num_iso_packets: 0,
        }
    }
}

impl Default for NativeTransfer {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed view of the raw `TRANSFER_*` status constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Transfer completed without error.
    Completed,
    /// Transfer failed.
    Error,
    /// Transfer timed out.
    TimedOut,
    /// Transfer was cancelled.
    Cancelled,
    /// Endpoint stalled.
    Stall,
    /// Device was disconnected.
    NoDevice,
    /// Device sent more data than requested.
    Overflow,
}

impl TransferStatus {
    /// Map a raw status value to its typed form.
    ///
    /// Returns `None` for [`TRANSFER_NONE`] (no completion has been recorded
    /// yet) and for values outside the defined range.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            TRANSFER_COMPLETED => Some(Self::Completed),
            TRANSFER_ERROR => Some(Self::Error),
            TRANSFER_TIMED_OUT => Some(Self::TimedOut),
            TRANSFER_CANCELLED => Some(Self::Cancelled),
            TRANSFER_STALL => Some(Self::Stall),
            TRANSFER_NO_DEVICE => Some(Self::NoDevice),
            TRANSFER_OVERFLOW => Some(Self::Overflow),
            _ => None,
        }
    }

    /// The raw constant this status corresponds to.
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Completed => TRANSFER_COMPLETED,
            Self::Error => TRANSFER_ERROR,
            Self::TimedOut => TRANSFER_TIMED_OUT,
            Self::Cancelled => TRANSFER_CANCELLED,
            Self::Stall => TRANSFER_STALL,
            Self::NoDevice => TRANSFER_NO_DEVICE,
            Self::Overflow => TRANSFER_OVERFLOW,
        }
    }
}

/// Typed view of the raw `TRANSFER_TYPE_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Control transfer (endpoint 0).
    Control,
    /// Isochronous transfer.
    Isochronous,
    /// Bulk transfer.
    Bulk,
    /// Interrupt transfer.
    Interrupt,
}

impl TransferKind {
    /// Map a raw transfer type to its typed form, `None` if out of range.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            TRANSFER_TYPE_CONTROL => Some(Self::Control),
            TRANSFER_TYPE_ISOCHRONOUS => Some(Self::Isochronous),
            TRANSFER_TYPE_BULK => Some(Self::Bulk),
            TRANSFER_TYPE_INTERRUPT => Some(Self::Interrupt),
            _ => None,
        }
    }

    /// The raw constant this kind corresponds to.
    pub fn as_raw(self) -> u8 {
        match self {
            Self::Control => TRANSFER_TYPE_CONTROL,
            Self::Isochronous => TRANSFER_TYPE_ISOCHRONOUS,
            Self::Bulk => TRANSFER_TYPE_BULK,
            Self::Interrupt => TRANSFER_TYPE_INTERRUPT,
        }
    }
}

/// Opaque handle identifying one native transfer record.
///
/// The handle is the record's address carried as a plain integer. Holders
/// treat it as an identity value only; it is never dereferenced outside the
/// bridge, so it stays meaningful (as a key) even after the record it named
/// has been recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferHandle(usize);

impl TransferHandle {
    /// The null sentinel: names no record.
    pub const NULL: TransferHandle = TransferHandle(0);

    /// Capture the address of a native record.
    pub fn from_ptr(ptr: *mut NativeTransfer) -> Self {
        Self(ptr as usize)
    }

    /// The record address as a pointer. Dereferencing is only sound while
    /// the native core keeps the record alive.
    pub fn as_ptr(self) -> *mut NativeTransfer {
        self.0 as *mut NativeTransfer
    }

    /// The record address as an integer (table key).
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Whether this is the null sentinel.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Opaque reference to the native device handle a transfer targets.
///
/// Like [`TransferHandle`], an address carried as an identity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceRef(usize);

impl DeviceRef {
    /// Capture the address of a native device handle.
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    /// The address as an integer.
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Whether the transfer carried no device handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}
