#![no_main]

use libfuzzer_sys::fuzz_target;
use fprint_core::{
    translate_acquired, translate_error, AcquiredInfo, SensorError, ACQUIRED_VENDOR_BASE,
    ERROR_VENDOR_BASE,
};

fuzz_target!(|data: &[u8]| {
    if data.len() >= 4 {
        let code = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);

        // Translation never panics and vendor codes never go negative
        let (error, vendor) = translate_error(code);
        assert!(vendor >= 0);
        if code >= ERROR_VENDOR_BASE {
            assert_eq!(error, SensorError::Vendor);
            assert_eq!(vendor, code - ERROR_VENDOR_BASE);
        }

        let (info, vendor) = translate_acquired(code);
        assert!(vendor >= 0);
        assert_ne!(info, AcquiredInfo::Unknown);
        if code >= ACQUIRED_VENDOR_BASE {
            assert_eq!(info, AcquiredInfo::Vendor);
        }
    }
});
