#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use fprint_core::{Finger, MessageType, Notification, RawMessage};

#[derive(Debug, Arbitrary)]
struct Input {
    msg_type: i32,
    code: i32,
    fid: i32,
    gid: i32,
    remaining: u32,
}

fuzz_target!(|input: Input| {
    let raw = RawMessage {
        msg_type: input.msg_type,
        code: input.code,
        finger: Finger {
            fid: input.fid,
            gid: input.gid,
        },
        remaining: input.remaining,
        hat: None,
    };

    // Decoding fails exactly for unknown message types
    match Notification::decode(raw) {
        Ok(notification) => {
            assert!(MessageType::try_from(input.msg_type).is_ok());
            match notification {
                Notification::Authenticated { template_id, .. } => assert_ne!(template_id, 0),
                Notification::EnrollmentsRemoved { ids, .. }
                | Notification::EnrollmentsEnumerated { ids, .. } => {
                    assert_eq!(ids.is_empty(), input.fid == 0);
                }
                _ => {}
            }
        }
        Err(_) => assert!(MessageType::try_from(input.msg_type).is_err()),
    }
});
