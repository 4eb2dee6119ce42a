#![no_main]
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use sealed_id::{Codec, KeyMaterial};

static CODEC: Lazy<Codec> =
    Lazy::new(|| Codec::new("test", &KeyMaterial::from_key([42u8; 32])).expect("codec"));

fuzz_target!(|data: &[u8]| {
    let token = String::from_utf8_lossy(data);
    let _ = CODEC.decode_bytes(&token);
    let _ = CODEC.decode::<u64>(&token);
});
