#![no_main]

use libfuzzer_sys::fuzz_target;
use weave_dag::{codec, copy_header, Header};

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = codec::decode::<Header>(data) {
        let _ = header.validate_structure();
        let _ = header.verify_author();
        assert_eq!(copy_header(&header).hash(), header.hash());
    }
});
