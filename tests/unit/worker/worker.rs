use std::time::Duration;

use super::*;

fn solid(width: u32, height: u32) -> ReelResult<DecodedFrame> {
    DecodedFrame::new(width, height, vec![width as u8; (width * height * 4) as usize])
}

fn request(seq: u64, width: u32) -> DecodeRequest {
    DecodeRequest {
        seq,
        frame_index: seq as usize,
        input: Arc::new(NativeRasterInput {
            width,
            height: 1,
            data_b64: String::new(),
            id: Some(format!("r{seq}")),
        }),
    }
}

fn recv(worker: &DecodeWorker) -> DecodeResponse {
    worker
        .responses()
        .recv_timeout(Duration::from_secs(5))
        .expect("worker response")
}

#[test]
fn responses_pair_with_requests_in_order() {
    let worker = DecodeWorker::spawn(Arc::new(|input: &NativeRasterInput| {
        solid(input.width, input.height)
    }))
    .unwrap();

    for seq in 0..5 {
        worker.submit(request(seq, seq as u32 + 1)).unwrap();
    }
    for seq in 0..5 {
        let resp = recv(&worker);
        assert_eq!(resp.seq, seq);
        assert_eq!(resp.frame_index, seq as usize);
        let frame = resp.result.unwrap();
        assert_eq!(frame.width, seq as u32 + 1);
        assert_eq!(frame.pixels[0], seq as u8 + 1);
    }
    worker.shutdown();
}

#[test]
fn decode_errors_are_returned_per_request() {
    let worker = DecodeWorker::spawn(native_raster_decoder()).unwrap();
    worker.submit(request(9, 2)).unwrap();
    let resp = recv(&worker);
    assert_eq!(resp.seq, 9);
    assert!(matches!(resp.result, Err(ReelError::Decompression(_))));
    worker.shutdown();
}

#[test]
fn a_panicking_decode_fails_only_that_request() {
    let worker = DecodeWorker::spawn(Arc::new(|input: &NativeRasterInput| {
        if input.width == 13 {
            panic!("unlucky frame");
        }
        solid(input.width, input.height)
    }))
    .unwrap();

    worker.submit(request(0, 13)).unwrap();
    worker.submit(request(1, 2)).unwrap();

    let failed = recv(&worker);
    assert_eq!(failed.seq, 0);
    match failed.result {
        Err(ReelError::Worker(msg)) => assert!(msg.contains("unlucky frame")),
        other => panic!("expected worker error, got {other:?}"),
    }

    let ok = recv(&worker);
    assert_eq!(ok.seq, 1);
    assert!(ok.result.is_ok());
    worker.shutdown();
}

#[test]
fn workers_get_distinct_ids() {
    let decode = native_raster_decoder();
    let a = DecodeWorker::spawn(decode.clone()).unwrap();
    let b = DecodeWorker::spawn(decode).unwrap();
    assert_ne!(a.id(), b.id());
}
