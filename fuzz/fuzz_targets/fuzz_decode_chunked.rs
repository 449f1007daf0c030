#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_decompress::{
    ByteSink, ByteSource, Decompress, DeflateDecompressor, GzipDecompressor,
};

#[derive(Debug, Arbitrary)]
struct Input {
    gzip: bool,
    in_chunk: u16,
    out_chunk: u16,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let in_chunk = (input.in_chunk as usize % 512) + 1;
    let out_chunk = (input.out_chunk as usize % 512) + 1;

    let mut decoder: Box<dyn Decompress> = if input.gzip {
        Box::new(GzipDecompressor::new())
    } else {
        Box::new(DeflateDecompressor::new())
    };

    let mut buf = vec![0u8; out_chunk];
    let data = &input.data;
    let mut start = 0;
    loop {
        let end = (start + in_chunk).min(data.len());
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
