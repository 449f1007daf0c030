#![no_main]

use libfuzzer_sys::fuzz_target;
use shiguredo_decompress::{ByteSink, ByteSource, Decompress, DeflateDecompressor, decode_all};

fuzz_target!(|data: &[u8]| {
    // データを一度に与える
    let mut decoder = DeflateDecompressor::new();
    let _ = decode_all(&mut decoder, data);

    // データを分割して与える (ストリーミングシナリオ)
    let mut decoder = DeflateDecompressor::new();
    let mut buf = [0u8; 256];
    let mut start = 0;
    loop {
        let end = (start + 13).min(data.len());
        let is_final = end == data.len();
        let mut source = ByteSource::new(&data[start..end], is_final);
        loop {
            let consumed_before = source.position();
            let mut sink = ByteSink::new(&mut buf);
            if decoder.decompress(&mut source, &mut sink).is_err() {
                return;
            }
            if sink.position() == 0 && source.position() == consumed_before {
                break;
            }
        }
        if is_final {
            break;
        }
        start = end;
    }
});
