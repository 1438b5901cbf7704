//! Decoder throughput over a synthetic streaming body

use bytes::Bytes;
use chatrelay_core::providers::openai::decode_line;
use chatrelay_core::providers::StreamDecoder;
use chatrelay_core::RelayResult;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::stream;

fn body(fragments: usize) -> String {
    let mut body = String::new();
    for i in 0..fragments {
        body.push_str(&format!(
            "data: {{\"id\":\"chatcmpl-1\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"token{} \"}},\"finish_reason\":null}}]}}\n\n",
            i
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn bench_decode_line(c: &mut Criterion) {
    let line = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"}}]}";
    c.bench_function("decode_line", |b| b.iter(|| decode_line(black_box(line))));
}

fn bench_stream_decoder(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("stream_decoder");

    for chunk_size in [16usize, 256, 4096] {
        let payload = Bytes::from(body(500));
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let chunks: Vec<RelayResult<Bytes>> = payload
                        .chunks(chunk_size)
                        .map(|c| Ok(Bytes::copy_from_slice(c)))
                        .collect();
                    runtime.block_on(async {
                        let mut decoder = StreamDecoder::new(stream::iter(chunks));
                        let mut events = 0;
                        while let Some(event) = decoder.next_event().await {
                            black_box(event.unwrap());
                            events += 1;
                        }
                        events
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_decode_line, bench_stream_decoder);
criterion_main!(benches);
