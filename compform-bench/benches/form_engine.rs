//! compform benchmark suite
//!
//! Hot paths of a completion round trip that do not touch the network:
//!   form_construction ........ template validation and placeholder scan
//!   form_messages ............ key validation and substitution
//!   form_response_format ..... JSON-schema projection
//!   parse_structured ......... JSON reply to mapping
//!   parse_text_with_thinking . `<think>` split
//!   sse_decode_100_events .... streaming body to deltas

use std::hint::black_box;

use compform_core::Form;
use compform_llm::SseDecoder;
use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};

fn review_template() -> Value {
    json!({
        "system": "You are a {persona} reviewing {language} code. Be {tone}.",
        "user": "Review this change:\n{diff}\n\nFocus on {focus}.",
        "response": {
            "verdict": { "type": "string", "description": "approve or request changes" },
            "score": { "type": "integer" },
            "issues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "line": { "type": "integer" },
                        "message": { "type": "string" },
                        "severity": { "type": "string" }
                    },
                    "required": ["severity", "line", "message"]
                }
            }
        }
    })
}

fn filled_form() -> Form {
    let mut form = Form::from_value(&review_template()).expect("valid template");
    for (key, value) in [
        ("persona", "senior engineer"),
        ("language", "Rust"),
        ("tone", "direct"),
        ("diff", "- let x = 1;\n+ let x = 2;"),
        ("focus", "correctness"),
    ] {
        form.put(key, value).expect("declared key");
    }
    form
}

fn bench_construction(c: &mut Criterion) {
    let template = review_template();
    c.bench_function("form_construction", |b| {
        b.iter(|| Form::from_value(black_box(&template)).expect("valid template"));
    });
}

fn bench_messages(c: &mut Criterion) {
    let form = filled_form();
    c.bench_function("form_messages", |b| {
        b.iter(|| black_box(&form).messages().expect("complete"));
    });
}

fn bench_response_format(c: &mut Criterion) {
    let form = filled_form();
    c.bench_function("form_response_format", |b| {
        b.iter(|| black_box(&form).response_format());
    });
}

fn bench_parse(c: &mut Criterion) {
    let structured = filled_form().create_request().expect("request");
    let reply = json!({
        "verdict": "request changes",
        "score": 3,
        "issues": [{ "line": 2, "message": "magic number", "severity": "minor" }]
    })
    .to_string();
    c.bench_function("parse_structured", |b| {
        b.iter(|| structured.parse(black_box(&reply)).expect("object"));
    });

    let text = Form::from_value(&json!({
        "user": "Tell a story.",
        "response": { "story": { "type": "text" } }
    }))
    .expect("valid template")
    .create_request()
    .expect("request");
    let raw = format!("<think>{}</think>{}", "plan ".repeat(50), "Once upon a time. ".repeat(50));
    c.bench_function("parse_text_with_thinking", |b| {
        b.iter(|| text.parse(black_box(&raw)).expect("text"));
    });
}

fn bench_sse(c: &mut Criterion) {
    let mut body = String::new();
    for i in 0..100 {
        body.push_str(&format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"token{i} \"}}}}]}}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    let bytes = body.into_bytes();

    c.bench_function("sse_decode_100_events", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::new();
            let mut count = 0;
            for chunk in black_box(&bytes).chunks(64) {
                count += decoder.push(chunk).expect("valid stream").len();
            }
            count
        });
    });
}

criterion_group!(
    benches,
    bench_construction,
    bench_messages,
    bench_response_format,
    bench_parse,
    bench_sse,
);
criterion_main!(benches);
