#![no_main]
use assetstream_rs::{
    AssetHandle, FileProvider, ManifestRegistry, MemoryProvider, StreamConfig,
};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

// Manifest parsing over untrusted bytes; companions are small fixed files
fuzz_target!(|data: &[u8]| {
    let memory = MemoryProvider::new();
    memory.insert("data/fuzz.manifest", data.to_vec());
    memory.insert("data/fuzz.bin", vec![0u8; 256]);
    memory.insert("data/fuzz.relo", vec![0u8; 64]);
    memory.insert("data/fuzz.imp", vec![0u8; 64]);
    let provider: Arc<dyn FileProvider> = Arc::new(memory);

    let config = StreamConfig::default().with_version_file(false);
    let mut registry = ManifestRegistry::with_config(config);
    let id = match registry.load(&provider, "fuzz.manifest") {
        Ok(id) => id,
        Err(_) => {
            assert!(registry.is_empty());
            return;
        }
    };

    let manifest = match registry.manifest(id) {
        Ok(m) => m,
        Err(_) => return,
    };
    for asset in manifest.assets() {
        let _ = manifest.get_chunk(&asset.handle());
    }
    let _ = registry.find(id, &AssetHandle::new(0, 0));
});
