#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::IpAddr;

fuzz_target!(|data: &[u8]| {
    // Opening and querying garbage must fail cleanly, never panic
    let Ok(db) = tinymmdb::Database::from_bytes(data.to_vec()) else {
        return;
    };

    let addrs: [IpAddr; 4] = [
        "0.0.0.0".parse().unwrap(),
        "24.24.24.24".parse().unwrap(),
        "255.255.255.255".parse().unwrap(),
        "2001:db8::1".parse().unwrap(),
    ];
    for addr in addrs {
        if let Ok(result) = db.lookup(addr) {
            if let Some(entry) = result.entry() {
                let _ = entry.get_tree();
                let _ = entry.get_value(&["country", "iso_code"]);
            }
        }
    }
    let _ = db.metadata_entry().get_tree();
});
