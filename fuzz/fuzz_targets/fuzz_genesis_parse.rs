#![no_main]

use libfuzzer_sys::fuzz_target;
use weave_dag::{create_genesis_unit, genesis_transactions, GenesisConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = GenesisConfig::from_json_str(text) else {
        return;
    };
    if config.validate().is_ok() {
        let txs = genesis_transactions(&config).expect("valid config yields transactions");
        let unit = create_genesis_unit(&config, txs).expect("valid config yields genesis");
        assert!(unit.is_genesis());
    }
});
