use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use ooxml_schema::catalog::SchemaCatalog;
use ooxml_schema::documents::Document;
use ooxml_schema::validators::{CompiledParticle, OpenXmlValidator};
use ooxml_schema::FileFormatVersion;

const PARAGRAPHS: [usize; 3] = [100, 1_000, 10_000];

const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn document_xml(paragraphs: usize) -> String {
    let body = r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>text</w:t></w:r><w:bookmarkStart w:id="0" w:name="x"/></w:p>"#
        .repeat(paragraphs);
    format!(r#"<w:document xmlns:w="{W}"><w:body>{body}<w:sectPr/></w:body></w:document>"#)
}

fn bench_compile(c: &mut Criterion) {
    let catalog = SchemaCatalog::wordprocessing_sample().expect("bundled catalog");
    let models: Vec<_> = catalog
        .descriptors()
        .iter()
        .filter_map(|d| d.content_model.clone())
        .collect();

    c.bench_function("compile_all_content_models", |b| {
        b.iter_batched(
            || {
                models
                    .iter()
                    .map(|m| CompiledParticle::new(Arc::clone(m), FileFormatVersion::Office2010))
                    .collect::<Vec<_>>()
            },
            |particles| {
                for particle in &particles {
                    black_box(particle.lookup().len());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_validate(c: &mut Criterion) {
    let cache = Arc::new(SchemaCatalog::wordprocessing_sample().expect("bundled catalog").into_cache());
    let validator = OpenXmlValidator::new(cache);
    let registry = validator.registry().expect("registry");

    let mut group = c.benchmark_group("validate_element");
    for &size in &PARAGRAPHS {
        let document = Document::parse(&document_xml(size), &registry).expect("sample document");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &document, |b, document| {
            b.iter(|| {
                let errors = validator
                    .validate_element(document.root())
                    .expect("validatable root")
                    .count();
                black_box(errors)
            });
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let cache = SchemaCatalog::wordprocessing_sample().expect("bundled catalog").into_cache();
    let registry = cache.get(FileFormatVersion::Office2007).expect("registry");
    let xml = document_xml(1_000);

    c.bench_function("parse_1000_paragraphs", |b| {
        b.iter(|| Document::parse(black_box(&xml), &registry).expect("sample document"));
    });
}

criterion_group!(benches, bench_compile, bench_validate, bench_parse);
criterion_main!(benches);
