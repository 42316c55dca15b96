#![no_main]
use libfuzzer_sys::fuzz_target;
use tinymmdb::data_section::DataDecoder;
use tinymmdb::materialize::materialize;
use tinymmdb::{export, path};

fuzz_target!(|data: &[u8]| {
    // First byte picks the start offset, the rest is the data section
    let Some((&start, section)) = data.split_first() else {
        return;
    };
    let decoder = DataDecoder::new(section, 0);
    let offset = u32::from(start);

    let _ = decoder.decode(offset);
    let _ = path::skip(&decoder, offset);
    let _ = path::get_value(&decoder, offset, &["a", "0", "b"]);
    if let Ok(nodes) = materialize(&decoder, offset, 64) {
        let _ = export::to_json(&nodes);
        let _ = export::dump(&nodes, &mut std::io::sink());
    }
});
