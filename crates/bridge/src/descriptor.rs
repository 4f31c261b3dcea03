//! Descriptor wrapping
//!
//! Recursive deep copy of native descriptor records into managed trees:
//! config → interfaces → alternate settings → endpoints, order preserved at
//! every level. The native core guarantees descriptor stability for the
//! scope of the query that produced them, so the copy needs no
//! synchronization; the only failure modes are malformed counts and
//! allocation failure.
//!
//! Every function here chases raw pointers supplied by the native core and
//! is therefore `unsafe`; the safety contract is the same throughout: the
//! record and everything it points at must stay alive and unmodified for
//! the duration of the call.

use std::slice;

use common::{Error, Result};
use native::{
    NativeConfigDescriptor, NativeEndpointDescriptor, NativeInterface, NativeInterfaceDescriptor,
};

use crate::managed::{ManagedAlternateSetting, ManagedConfig, ManagedEndpoint, ManagedInterface};

/// Wrap one endpoint descriptor.
///
/// # Safety
///
/// `native.extra` must point at `native.extra_length` readable bytes (or be
/// null) for the duration of the call.
pub unsafe fn wrap_endpoint(native: &NativeEndpointDescriptor) -> Result<ManagedEndpoint> {
    let extra = unsafe { copy_extra(native.extra, native.extra_length) }?;
    Ok(ManagedEndpoint {
        address: native.endpoint_address,
        attributes: native.attributes,
        max_packet_size: native.max_packet_size,
        interval: native.interval,
        refresh: native.refresh,
        synch_address: native.synch_address,
        extra,
    })
}

/// Wrap one alternate setting, including its endpoint array in declaration
/// order.
///
/// # Safety
///
/// `native.endpoint` must point at `native.num_endpoints` valid endpoint
/// descriptors (or be null when the count is zero), and every pointed-at
/// record must satisfy [`wrap_endpoint`]'s contract, for the duration of
/// the call.
pub unsafe fn wrap_alternate_setting(
    native: &NativeInterfaceDescriptor,
) -> Result<ManagedAlternateSetting> {
    let count = native.num_endpoints as usize;
    let mut endpoints = reserve_vec(count)?;
    if count > 0 {
        if native.endpoint.is_null() {
            return Err(Error::InvalidArgument(format!(
                "null endpoint array with {} endpoints declared",
                count
            )));
        }
        // SAFETY: the caller guarantees `count` valid records behind the
        // pointer.
        let descriptors = unsafe { slice::from_raw_parts(native.endpoint, count) };
        for descriptor in descriptors {
            endpoints.push(unsafe { wrap_endpoint(descriptor) }?);
        }
    }

    let extra = unsafe { copy_extra(native.extra, native.extra_length) }?;
    Ok(ManagedAlternateSetting {
        interface_number: native.interface_number,
        alternate_setting: native.alternate_setting,
        class: native.interface_class,
        subclass: native.interface_subclass,
        protocol: native.interface_protocol,
        interface_index: native.interface_index,
        endpoints,
        extra,
    })
}

/// Wrap one interface, including its alternate settings in declaration
/// order.
///
/// # Safety
///
/// `native.altsetting` must point at `native.num_altsetting` valid records
/// (or be null when the count is zero), each satisfying
/// [`wrap_alternate_setting`]'s contract, for the duration of the call.
pub unsafe fn wrap_interface(native: &NativeInterface) -> Result<ManagedInterface> {
    if native.num_altsetting < 0 {
        return Err(Error::InvalidArgument(format!(
            "negative alternate setting count: {}",
            native.num_altsetting
        )));
    }

    let count = native.num_altsetting as usize;
    let mut alt_settings = reserve_vec(count)?;
    if count > 0 {
        if native.altsetting.is_null() {
            return Err(Error::InvalidArgument(format!(
                "null alternate setting array with {} settings declared",
                count
            )));
        }
        // SAFETY: the caller guarantees `count` valid records behind the
        // pointer.
        let descriptors = unsafe { slice::from_raw_parts(native.altsetting, count) };
        for descriptor in descriptors {
            alt_settings.push(unsafe { wrap_alternate_setting(descriptor) }?);
        }
    }

    Ok(ManagedInterface { alt_settings })
}

/// Wrap `count` consecutive interface records.
///
/// A negative count is `InvalidArgument`; a zero count yields an empty
/// vector without touching the pointer. A failure wrapping any element
/// aborts the whole wrap; partial results are never returned.
///
/// # Safety
///
/// When `count > 0`, `interfaces` must point at `count` valid records, each
/// satisfying [`wrap_interface`]'s contract, for the duration of the call.
/// The pointer is not read when `count` is zero or negative.
pub unsafe fn wrap_interface_array(
    count: i32,
    interfaces: *const NativeInterface,
) -> Result<Vec<ManagedInterface>> {
    if count < 0 {
        return Err(Error::InvalidArgument(format!(
            "negative interface count: {}",
            count
        )));
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    if interfaces.is_null() {
        return Err(Error::InvalidArgument(format!(
            "null interface array with {} interfaces declared",
            count
        )));
    }

    let count = count as usize;
    let mut wrapped = reserve_vec(count)?;
    // SAFETY: the caller guarantees `count` valid records behind the
    // pointer.
    let records = unsafe { slice::from_raw_parts(interfaces, count) };
    for native in records {
        wrapped.push(unsafe { wrap_interface(native) }?);
    }
    Ok(wrapped)
}

/// Wrap one configuration descriptor, including its interface array.
///
/// # Safety
///
/// `native.interface` must point at `native.num_interfaces` valid records
/// satisfying [`wrap_interface`]'s contract, and `native.extra` must point
/// at `native.extra_length` readable bytes (or be null), for the duration
/// of the call.
pub unsafe fn wrap_config(native: &NativeConfigDescriptor) -> Result<ManagedConfig> {
    let interfaces =
        unsafe { wrap_interface_array(native.num_interfaces as i32, native.interface) }?;
    let extra = unsafe { copy_extra(native.extra, native.extra_length) }?;
    Ok(ManagedConfig {
        configuration_value: native.configuration_value,
        configuration_index: native.configuration_index,
        attributes: native.attributes,
        max_power: native.max_power,
        interfaces,
        extra,
    })
}

/// Reserve a vector up front so allocation failure surfaces as
/// `ResourceExhausted` before any native memory is read.
fn reserve_vec<T>(capacity: usize) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    vec.try_reserve_exact(capacity).map_err(|_| {
        Error::ResourceExhausted(format!("cannot reserve {} descriptor slots", capacity))
    })?;
    Ok(vec)
}

/// Copy a descriptor's trailing vendor-specific bytes, if any.
unsafe fn copy_extra(extra: *const u8, extra_length: i32) -> Result<Vec<u8>> {
    if extra.is_null() || extra_length <= 0 {
        return Ok(Vec::new());
    }

    let len = extra_length as usize;
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| Error::ResourceExhausted(format!("cannot copy {} extra bytes", len)))?;
    // SAFETY: the caller guarantees `len` readable bytes behind the pointer.
    bytes.extend_from_slice(unsafe { slice::from_raw_parts(extra, len) });
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{AltSpec, ConfigFixture, EndpointSpec, InterfaceFixture};
    use std::ptr;

    #[test]
    fn test_wrap_endpoint_copies_scalars() {
        let fixture = InterfaceFixture::new(
            0,
            vec![AltSpec::new(vec![EndpointSpec::interrupt(0x81)])],
        );
        let interface = unsafe { wrap_interface(fixture.native()) }.unwrap();

        let endpoint = &interface.alt_settings[0].endpoints[0];
        assert_eq!(endpoint.address, 0x81);
        assert_eq!(endpoint.attributes, native::TRANSFER_TYPE_INTERRUPT);
        assert_eq!(endpoint.max_packet_size, 64);
        assert_eq!(endpoint.interval, 10);
        assert!(endpoint.extra.is_empty());
    }

    #[test]
    fn test_wrap_endpoint_copies_extra_bytes() {
        let fixture = InterfaceFixture::new(
            0,
            vec![AltSpec::new(vec![
                EndpointSpec::bulk(0x01).with_extra(&[0x07, 0x30, 0xAA]),
            ])],
        );
        let interface = unsafe { wrap_interface(fixture.native()) }.unwrap();

        assert_eq!(
            interface.alt_settings[0].endpoints[0].extra,
            vec![0x07, 0x30, 0xAA]
        );
    }

    #[test]
    fn test_order_preservation() {
        // Alternate settings [A0, A1], A0 with endpoints [E0, E1], A1 with [E2].
        let fixture = InterfaceFixture::bulk(3, &[&[0x81, 0x01], &[0x82]]);
        let interface = unsafe { wrap_interface(fixture.native()) }.unwrap();

        assert_eq!(interface.alt_settings.len(), 2);
        assert_eq!(interface.alt_settings[0].alternate_setting, 0);
        assert_eq!(interface.alt_settings[1].alternate_setting, 1);

        let first: Vec<u8> = interface.alt_settings[0]
            .endpoints
            .iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(first, vec![0x81, 0x01]);

        let second: Vec<u8> = interface.alt_settings[1]
            .endpoints
            .iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(second, vec![0x82]);
    }

    #[test]
    fn test_alt_setting_extra_bytes() {
        let fixture = InterfaceFixture::new(
            1,
            vec![AltSpec::new(vec![EndpointSpec::bulk(0x81)]).with_extra(&[0x01, 0x02])],
        );
        let interface = unsafe { wrap_interface(fixture.native()) }.unwrap();

        assert_eq!(interface.alt_settings[0].extra, vec![0x01, 0x02]);
        assert_eq!(interface.alt_settings[0].interface_number, 1);
    }

    #[test]
    fn test_wrap_interface_array_negative_count() {
        let err = unsafe { wrap_interface_array(-1, ptr::null()) }.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_wrap_interface_array_zero_count_never_dereferences() {
        // A dangling, never-valid pointer: the zero-count path must not read it.
        let dangling = 0xDEAD_BEEF as *const NativeInterface;
        let wrapped = unsafe { wrap_interface_array(0, dangling) }.unwrap();
        assert!(wrapped.is_empty());
    }

    #[test]
    fn test_wrap_interface_array_null_with_positive_count() {
        let err = unsafe { wrap_interface_array(2, ptr::null()) }.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_wrap_interface_array_multiple() {
        let fixtures = [
            InterfaceFixture::bulk(0, &[&[0x81]]),
            InterfaceFixture::bulk(1, &[&[0x02], &[0x82, 0x03]]),
        ];
        let natives: Vec<NativeInterface> = fixtures
            .iter()
            .map(|f| NativeInterface {
                altsetting: f.native().altsetting,
                num_altsetting: f.native().num_altsetting,
            })
            .collect();

        let wrapped = unsafe { wrap_interface_array(2, natives.as_ptr()) }.unwrap();
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[0].alt_settings.len(), 1);
        assert_eq!(wrapped[1].alt_settings.len(), 2);
        assert_eq!(wrapped[1].alt_settings[1].endpoints.len(), 2);
    }

    #[test]
    fn test_wrap_interface_negative_altsetting_count() {
        let native = NativeInterface {
            altsetting: ptr::null(),
            num_altsetting: -4,
        };
        let err = unsafe { wrap_interface(&native) }.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_wrap_empty_interface() {
        let native = NativeInterface {
            altsetting: ptr::null(),
            num_altsetting: 0,
        };
        let interface = unsafe { wrap_interface(&native) }.unwrap();
        assert!(interface.alt_settings.is_empty());
    }

    #[test]
    fn test_wrap_config() {
        let fixture = ConfigFixture::new(
            1,
            vec![
                InterfaceFixture::bulk(0, &[&[0x81]]),
                InterfaceFixture::bulk(1, &[&[0x02]]),
            ],
        );
        let config = unsafe { wrap_config(fixture.native()) }.unwrap();

        assert_eq!(config.configuration_value, 1);
        assert_eq!(config.attributes, 0x80);
        assert_eq!(config.max_power, 0x32);
        assert_eq!(config.interfaces.len(), 2);
        assert_eq!(config.interfaces[0].alt_settings[0].endpoints[0].address, 0x81);
    }

    #[test]
    fn test_wrapped_tree_outlives_fixture() {
        let interface = {
            let fixture = InterfaceFixture::bulk(0, &[&[0x81, 0x01]]);
            unsafe { wrap_interface(fixture.native()) }.unwrap()
        };
        // The fixture (and all native memory) is gone; the managed tree is
        // an independent copy.
        assert_eq!(interface.alt_settings[0].endpoints.len(), 2);
    }
}
