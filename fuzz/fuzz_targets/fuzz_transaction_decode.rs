#![no_main]

use libfuzzer_sys::fuzz_target;
use weave_dag::{codec, Message, Transaction};

fuzz_target!(|data: &[u8]| {
    if let Ok(tx) = codec::decode::<Transaction>(data) {
        let _ = tx.verify();
        let _ = tx.hash();
    }

    // Tagged message bodies: first byte picks a tag, the rest is the body.
    if let Some((&tag, body)) = data.split_first() {
        let app = match tag % 7 {
            0 => "payment",
            1 => "text",
            2 => "config",
            3 => "contract_template",
            4 => "contract_deploy",
            5 => "contract_invoke",
            _ => "unknown",
        };
        let _ = Message::decode(app, body);
    }
});
