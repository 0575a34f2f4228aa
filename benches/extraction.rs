use criterion::{Criterion, criterion_group, criterion_main};
use lorekeeper::extract::ExtractorDispatcher;
use std::hint::black_box;

fn sample_html() -> String {
    let sections: String = (0..300)
        .map(|i| {
            format!(
                "<section><h2>Chapter {i}</h2><p>The caravan crossed the dunes on day {i}.</p>\
                 <script>track({i});</script></section>"
            )
        })
        .collect();
    format!("<html><head><title>Travelogue</title><style>p {{ margin: 0 }}</style></head><body>{sections}</body></html>")
}

fn sample_json() -> String {
    let entries: Vec<String> = (0..500)
        .map(|i| format!(r#"{{"id": {i}, "name": "entry {i}", "tags": ["a", "b"]}}"#))
        .collect();
    format!("[{}]", entries.join(","))
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let dispatcher = ExtractorDispatcher::new();
    let html = sample_html();
    let json = sample_json();

    c.bench_function("extraction_html", |b| {
        b.iter(|| {
            dispatcher.extract("travelogue.html", Some("text/html"), black_box(html.as_bytes()))
        })
    });
    c.bench_function("extraction_json", |b| {
        b.iter(|| dispatcher.extract("entries.json", None, black_box(json.as_bytes())))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
