//! XPath component and XSLT transformer benchmarks
//!
//! Compares a static expression (compiled once) with a dynamic one (compiled per
//! message) over inventories of growing size, and measures a static stylesheet run.
//!
//! Run benchmarks: `cargo bench --bench xpath_evaluation`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use xmlbridge::{
    DynamicString, FlowContext, Message, NativeEngine, ProcessorSync, ScriptEngineService,
    StaticResourceTransformer, XPathComponent, XPathComponentConfig, XsltTransformerStrategy,
};

const REPORT_XSL: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
    <xsl:output method="text"/>
    <xsl:template match="/">
        <xsl:for-each select="inventory/book[price &gt; 10]">
            <xsl:sort select="title"/>
            <xsl:value-of select="title"/>;
        </xsl:for-each>
    </xsl:template>
</xsl:stylesheet>"#;

#[derive(Debug)]
struct FixedScript(String);

impl ScriptEngineService for FixedScript {
    fn evaluate(&self, _: &DynamicString, _: &FlowContext, _: &Message) -> Option<String> {
        Some(self.0.clone())
    }
}

/// An inventory document with `count` books.
fn generate_inventory(count: usize) -> String {
    let mut xml = String::from("<inventory>");
    for i in 0..count {
        xml.push_str(&format!(
            "<book year=\"{}\"><title>Title {}</title><price>{}.50</price></book>",
            1990 + i % 30,
            i,
            i % 40
        ));
    }
    xml.push_str("</inventory>");
    xml
}

fn xpath_component(expression: &str, dynamic: bool) -> XPathComponent {
    let config = XPathComponentConfig {
        expression: if dynamic { "#[query]".into() } else { expression.into() },
        configuration: None,
    };
    let mut component = XPathComponent::new(config);
    if dynamic {
        component = component.with_script_engine(Arc::new(FixedScript(expression.to_string())));
    }
    component.initialize().unwrap();
    component
}

fn bench_expression_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("expression_strategy");
    let expression = "count(//book[@year > 2005 and price > 10])";
    let flow = FlowContext::default();

    for books in [10, 100, 1000] {
        let xml = generate_inventory(books);
        group.throughput(Throughput::Bytes(xml.len() as u64));

        for (label, dynamic) in [("static", false), ("dynamic", true)] {
            let component = xpath_component(expression, dynamic);
            group.bench_with_input(BenchmarkId::new(label, books), &xml, |b, xml| {
                b.iter(|| {
                    let message = Message::text(xml.as_str());
                    black_box(component.apply(message, &flow).unwrap())
                })
            });
        }
    }
    group.finish();
}

fn bench_static_stylesheet(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_stylesheet");
    let transformer =
        StaticResourceTransformer::from_source(Arc::new(NativeEngine), REPORT_XSL.as_bytes()).unwrap();
    let message = Message::default();
    let flow = FlowContext::default();

    for books in [10, 100, 1000] {
        let xml = generate_inventory(books);
        group.throughput(Throughput::Elements(books as u64));
        group.bench_with_input(BenchmarkId::from_parameter(books), &xml, |b, xml| {
            b.iter(|| {
                let mut input = xml.as_bytes();
                black_box(transformer.transform(&mut input, &message, &flow).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_expression_strategies, bench_static_stylesheet);
criterion_main!(benches);
