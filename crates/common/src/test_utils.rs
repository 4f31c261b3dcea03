//! Test utilities for rust-usb-bridge
//!
//! Stand-ins for the native USB core, used by tests across crates: a
//! transfer pool that owns boxed records behind stable addresses (with an
//! address-reusing free list, so recycling scenarios are reproducible), and
//! self-owning descriptor fixtures whose internal pointers stay valid for
//! the fixture's lifetime.
//!
//! # Example
//!
//! ```
//! use common::test_utils::TransferPool;
//! use native::TRANSFER_TYPE_BULK;
//!
//! let mut pool = TransferPool::new();
//! let handle = pool.alloc();
//!
//! let record = pool.record_mut(handle).unwrap();
//! record.endpoint = 0x81;
//! record.transfer_type = TRANSFER_TYPE_BULK;
//!
//! pool.free(handle);
//! ```

use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::Ordering;

use native::{
    DT_ENDPOINT, DT_INTERFACE, NativeConfigDescriptor, NativeEndpointDescriptor, NativeInterface,
    NativeInterfaceDescriptor, NativeTransfer, TRANSFER_TYPE_BULK, TRANSFER_TYPE_INTERRUPT,
    TransferHandle,
};

/// Pool of native transfer records with an address-reusing free list.
///
/// Freed records go onto the free list with their fields reset; the next
/// `alloc` pops from that list first, so tests can provoke the "native core
/// reuses the same address for an unrelated transfer" scenario on demand.
pub struct TransferPool {
    live: HashMap<usize, Box<NativeTransfer>>,
    free: Vec<Box<NativeTransfer>>,
}

impl TransferPool {
    pub fn new() -> Self {
        Self {
            live: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Hand out a record, recycling a freed one when available.
    pub fn alloc(&mut self) -> TransferHandle {
        let mut record = self
            .free
            .pop()
            .unwrap_or_else(|| Box::new(NativeTransfer::new()));
        let handle = TransferHandle::from_ptr(&mut *record);
        self.live.insert(handle.as_usize(), record);
        handle
    }

    /// Return a record to the free list, resetting its fields.
    ///
    /// Freeing an unknown handle is ignored, matching how the native core
    /// tolerates redundant recycling.
    pub fn free(&mut self, handle: TransferHandle) {
        if let Some(mut record) = self.live.remove(&handle.as_usize()) {
            *record = NativeTransfer::new();
            self.free.push(record);
        }
    }

    /// Shared view of a live record.
    pub fn record(&self, handle: TransferHandle) -> Option<&NativeTransfer> {
        self.live.get(&handle.as_usize()).map(|r| &**r)
    }

    /// Mutable view of a live record, for filling submission fields.
    pub fn record_mut(&mut self, handle: TransferHandle) -> Option<&mut NativeTransfer> {
        self.live.get_mut(&handle.as_usize()).map(|r| &mut **r)
    }

    /// Number of records currently handed out.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Default for TransferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Write completion results into a record the way the native core's
/// event-processing thread does: actual length first, then status.
///
/// # Safety
///
/// `handle` must identify a record still owned by a live [`TransferPool`]
/// (or otherwise kept alive) for the duration of the call.
pub unsafe fn complete_record(handle: TransferHandle, status: i32, actual_length: i32) {
    // SAFETY: the caller guarantees the record outlives this call.
    let record = unsafe { &*handle.as_ptr() };
    record.actual_length.store(actual_length, Ordering::SeqCst);
    record.status.store(status, Ordering::SeqCst);
}

/// Description of one endpoint in a fixture.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
    pub extra: Vec<u8>,
}

impl EndpointSpec {
    /// A bulk endpoint at the given address.
    pub fn bulk(address: u8) -> Self {
        Self {
            address,
            attributes: TRANSFER_TYPE_BULK,
            max_packet_size: 512,
            interval: 0,
            extra: Vec::new(),
        }
    }

    /// An interrupt endpoint at the given address.
    pub fn interrupt(address: u8) -> Self {
        Self {
            address,
            attributes: TRANSFER_TYPE_INTERRUPT,
            max_packet_size: 64,
            interval: 10,
            extra: Vec::new(),
        }
    }

    /// Attach vendor-specific extra bytes.
    pub fn with_extra(mut self, extra: &[u8]) -> Self {
        self.extra = extra.to_vec();
        self
    }
}

/// Description of one alternate setting in a fixture.
#[derive(Debug, Clone)]
pub struct AltSpec {
    pub endpoints: Vec<EndpointSpec>,
    pub class: u8,
    pub extra: Vec<u8>,
}

impl AltSpec {
    pub fn new(endpoints: Vec<EndpointSpec>) -> Self {
        Self {
            endpoints,
            class: 0xFF,
            extra: Vec::new(),
        }
    }

    /// Attach vendor-specific extra bytes to the setting itself.
    pub fn with_extra(mut self, extra: &[u8]) -> Self {
        self.extra = extra.to_vec();
        self
    }
}

/// A native interface record plus everything it points into.
///
/// The endpoint arrays, extra-byte slabs, and alternate-setting array are
/// boxed so their addresses survive moves of the fixture itself; the
/// `NativeInterface` handed out by [`native`](Self::native) stays valid for
/// the fixture's lifetime.
pub struct InterfaceFixture {
    _endpoint_slabs: Vec<Box<[NativeEndpointDescriptor]>>,
    _extra_slabs: Vec<Box<[u8]>>,
    _alt_settings: Box<[NativeInterfaceDescriptor]>,
    interface: NativeInterface,
}

impl InterfaceFixture {
    /// Build an interface whose alternate settings are numbered in order.
    pub fn new(interface_number: u8, alt_specs: Vec<AltSpec>) -> Self {
        let mut endpoint_slabs = Vec::new();
        let mut extra_slabs: Vec<Box<[u8]>> = Vec::new();
        let mut alt_settings = Vec::with_capacity(alt_specs.len());

        for (alt_index, spec) in alt_specs.iter().enumerate() {
            let mut endpoints = Vec::with_capacity(spec.endpoints.len());
            for ep in &spec.endpoints {
                let (extra, extra_length) = intern_extra(&mut extra_slabs, &ep.extra);
                endpoints.push(NativeEndpointDescriptor {
                    length: 7,
                    descriptor_type: DT_ENDPOINT,
                    endpoint_address: ep.address,
                    attributes: ep.attributes,
                    max_packet_size: ep.max_packet_size,
                    interval: ep.interval,
                    refresh: 0,
                    synch_address: 0,
                    extra,
                    extra_length,
                });
            }

            let slab = endpoints.into_boxed_slice();
            let endpoint_ptr = if slab.is_empty() {
                ptr::null()
            } else {
                slab.as_ptr()
            };
            let num_endpoints = slab.len() as u8;
            endpoint_slabs.push(slab);

            let (extra, extra_length) = intern_extra(&mut extra_slabs, &spec.extra);
            alt_settings.push(NativeInterfaceDescriptor {
                length: 9,
                descriptor_type: DT_INTERFACE,
                interface_number,
                alternate_setting: alt_index as u8,
                num_endpoints,
                interface_class: spec.class,
                interface_subclass: 0,
                interface_protocol: 0,
                interface_index: 0,
                endpoint: endpoint_ptr,
                extra,
                extra_length,
            });
        }

        let alt_slab = alt_settings.into_boxed_slice();
        let interface = NativeInterface {
            altsetting: if alt_slab.is_empty() {
                ptr::null()
            } else {
                alt_slab.as_ptr()
            },
            num_altsetting: alt_slab.len() as i32,
        };

        Self {
            _endpoint_slabs: endpoint_slabs,
            _extra_slabs: extra_slabs,
            _alt_settings: alt_slab,
            interface,
        }
    }

    /// Shorthand: one interface, one alternate setting per endpoint list,
    /// all endpoints bulk.
    pub fn bulk(interface_number: u8, alt_endpoint_addresses: &[&[u8]]) -> Self {
        let alt_specs = alt_endpoint_addresses
            .iter()
            .map(|addresses| AltSpec::new(addresses.iter().map(|&a| EndpointSpec::bulk(a)).collect()))
            .collect();
        Self::new(interface_number, alt_specs)
    }

    /// The native record, valid while the fixture is alive.
    pub fn native(&self) -> &NativeInterface {
        &self.interface
    }
}

/// A native configuration descriptor plus the interface fixtures it points at.
pub struct ConfigFixture {
    _interfaces: Vec<InterfaceFixture>,
    _interface_slab: Box<[NativeInterface]>,
    config: NativeConfigDescriptor,
}

impl ConfigFixture {
    pub fn new(configuration_value: u8, interfaces: Vec<InterfaceFixture>) -> Self {
        let slab: Box<[NativeInterface]> = interfaces
            .iter()
            .map(|f| NativeInterface {
                altsetting: f.interface.altsetting,
                num_altsetting: f.interface.num_altsetting,
            })
            .collect();

        let config = NativeConfigDescriptor {
            length: 9,
            descriptor_type: native::DT_CONFIG,
            total_length: 0,
            num_interfaces: slab.len() as u8,
            configuration_value,
            configuration_index: 0,
            attributes: 0x80,
            max_power: 0x32,
            interface: if slab.is_empty() {
                ptr::null()
            } else {
                slab.as_ptr()
            },
            extra: ptr::null(),
            extra_length: 0,
        };

        Self {
            _interfaces: interfaces,
            _interface_slab: slab,
            config,
        }
    }

    /// The native record, valid while the fixture is alive.
    pub fn native(&self) -> &NativeConfigDescriptor {
        &self.config
    }
}

fn intern_extra(slabs: &mut Vec<Box<[u8]>>, extra: &[u8]) -> (*const u8, i32) {
    if extra.is_empty() {
        return (ptr::null(), 0);
    }
    let slab: Box<[u8]> = extra.to_vec().into_boxed_slice();
    let ptr = slab.as_ptr();
    let len = slab.len() as i32;
    slabs.push(slab);
    (ptr, len)
}
