//! Native descriptor records
//!
//! Read-only, statically allocated structures describing a device's
//! interfaces and endpoints. The native core guarantees they stay valid and
//! unmodified for the scope of the query that produced them, which is why
//! none of these carry any synchronization.
//!
//! An interface is a sequence of alternate settings; each alternate setting
//! is an interface descriptor carrying its own endpoint array. Declaration
//! order within those arrays is semantically meaningful and must be
//! preserved by anything that copies them.

use std::ptr;

/// Descriptor type value for configuration descriptors.
pub const DT_CONFIG: u8 = 0x02;
/// Descriptor type value for interface descriptors.
pub const DT_INTERFACE: u8 = 0x04;
/// Descriptor type value for endpoint descriptors.
pub const DT_ENDPOINT: u8 = 0x05;

/// One endpoint descriptor.
#[derive(Debug)]
#[repr(C)]
pub struct NativeEndpointDescriptor {
    /// Size of this descriptor in bytes.
    pub length: u8,
    /// Descriptor type ([`DT_ENDPOINT`]).
    pub descriptor_type: u8,
    /// Endpoint address, including the direction bit.
    pub endpoint_address: u8,
    /// Endpoint attributes (transfer type, sync/usage for iso endpoints).
    pub attributes: u8,
    /// Maximum packet size this endpoint can handle.
    pub max_packet_size: u16,
    /// Polling interval for data transfers.
    pub interval: u8,
    /// Rate feedback refresh (audio endpoints).
    pub refresh: u8,
    /// Synch endpoint address (audio endpoints).
    pub synch_address: u8,
    /// Vendor-specific descriptor bytes following the standard fields.
    pub extra: *const u8,
    /// Length of `extra` in bytes.
    pub extra_length: i32,
}

impl NativeEndpointDescriptor {
    /// A zeroed endpoint descriptor with no extra bytes.
    pub fn zeroed() -> Self {
        Self {
            length: 7,
            descriptor_type: DT_ENDPOINT,
            endpoint_address: 0,
            attributes: 0,
            max_packet_size: 0,
            interval: 0,
            refresh: 0,
            synch_address: 0,
            extra: ptr::null(),
            extra_length: 0,
        }
    }
}

/// One alternate setting of an interface.
#[derive(Debug)]
#[repr(C)]
pub struct NativeInterfaceDescriptor {
    /// Size of this descriptor in bytes.
    pub length: u8,
    /// Descriptor type ([`DT_INTERFACE`]).
    pub descriptor_type: u8,
    /// Interface number this setting belongs to.
    pub interface_number: u8,
    /// Value used to select this alternate setting.
    pub alternate_setting: u8,
    /// Number of endpoints in `endpoint` (excluding endpoint 0).
    pub num_endpoints: u8,
    /// Interface class code.
    pub interface_class: u8,
    /// Interface subclass code.
    pub interface_subclass: u8,
    /// Interface protocol code.
    pub interface_protocol: u8,
    /// Index of the string descriptor naming this interface.
    pub interface_index: u8,
    /// Endpoint descriptor array, `num_endpoints` entries in declaration order.
    pub endpoint: *const NativeEndpointDescriptor,
    /// Vendor-specific descriptor bytes following the standard fields.
    pub extra: *const u8,
    /// Length of `extra` in bytes.
    pub extra_length: i32,
}

impl NativeInterfaceDescriptor {
    /// A zeroed interface descriptor with no endpoints and no extra bytes.
    pub fn zeroed() -> Self {
        Self {
            length: 9,
            descriptor_type: DT_INTERFACE,
            interface_number: 0,
            alternate_setting: 0,
            num_endpoints: 0,
            interface_class: 0,
            interface_subclass: 0,
            interface_protocol: 0,
            interface_index: 0,
            endpoint: ptr::null(),
            extra: ptr::null(),
            extra_length: 0,
        }
    }
}

/// One interface: an ordered collection of alternate settings.
#[derive(Debug)]
#[repr(C)]
pub struct NativeInterface {
    /// Alternate setting array, `num_altsetting` entries in declaration order.
    pub altsetting: *const NativeInterfaceDescriptor,
    /// Number of entries in `altsetting`.
    pub num_altsetting: i32,
}

/// One configuration descriptor with its interface array.
#[derive(Debug)]
#[repr(C)]
pub struct NativeConfigDescriptor {
    /// Size of this descriptor in bytes.
    pub length: u8,
    /// Descriptor type ([`DT_CONFIG`]).
    pub descriptor_type: u8,
    /// Total length of descriptor data returned for this configuration.
    pub total_length: u16,
    /// Number of interfaces in `interface`.
    pub num_interfaces: u8,
    /// Value used to select this configuration.
    pub configuration_value: u8,
    /// Index of the string descriptor naming this configuration.
    pub configuration_index: u8,
    /// Configuration attributes (self-powered, remote wakeup).
    pub attributes: u8,
    /// Maximum power consumption, in 2 mA units.
    pub max_power: u8,
    /// Interface array, `num_interfaces` entries in declaration order.
    pub interface: *const NativeInterface,
    /// Vendor-specific descriptor bytes following the standard fields.
    pub extra: *const u8,
    /// Length of `extra` in bytes.
    pub extra_length: i32,
}
