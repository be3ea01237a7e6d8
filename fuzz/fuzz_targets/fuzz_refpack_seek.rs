#![no_main]
use assetstream_rs::RefPackStream;
use libfuzzer_sys::{
    arbitrary::{Arbitrary, Unstructured},
    fuzz_target,
};
use std::io::{Cursor, Read, Seek, SeekFrom};

#[derive(Debug, Arbitrary)]
enum StreamOp {
    Read(u16),
    SeekStart(u16),
    SeekCurrent(i16),
    SeekEnd(i16),
}

fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let stream: Vec<u8> = match u.arbitrary() {
        Ok(s) => s,
        Err(_) => return,
    };
    let ops: Vec<StreamOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut decoder = match RefPackStream::new(Cursor::new(stream)) {
        Ok(d) => d,
        Err(_) => return,
    };
    if decoder.len() > 1 << 20 {
        return;
    }

    let mut buf = vec![0u8; u16::MAX as usize];
    for op in ops.iter().take(32) {
        let remaining = decoder.len().saturating_sub(decoder.position());
        let result = match *op {
            StreamOp::Read(n) => decoder
                .read(&mut buf[..n as usize])
                .map(|read| assert!(read as u64 <= remaining)),
            StreamOp::SeekStart(n) => decoder.seek(SeekFrom::Start(n as u64)).map(|_| ()),
            StreamOp::SeekCurrent(n) => decoder.seek(SeekFrom::Current(n as i64)).map(|_| ()),
            StreamOp::SeekEnd(n) => decoder.seek(SeekFrom::End(n as i64)).map(|_| ()),
        };
        if result.is_err() {
            return;
        }
    }
});
