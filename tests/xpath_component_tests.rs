mod common;

use common::{CountingEngine, LookupScriptEngine, TestResult, bookstore_namespaces, fixture, init_logger};
use num_bigint::BigInt;
use std::sync::Arc;
use xmlbridge::{
    ErrorKind, FlowContext, Message, Payload, ProcessorSync, XPATH_EXPRESSION_ATTRIBUTE,
    XPathComponent, XPathComponentConfig, XPathConfiguration, XPathResult,
};

fn component(expression: &str, namespaces: Option<XPathConfiguration>) -> XPathComponent {
    init_logger();
    XPathComponent::new(XPathComponentConfig {
        expression: expression.into(),
        configuration: namespaces,
    })
}

fn inventory() -> Message {
    Message::binary(fixture("book_inventory.xml"))
}

fn apply(expression: &str, message: Message) -> Result<Message, xmlbridge::PlatformError> {
    let mut component = component(expression, None);
    component.initialize()?;
    component.apply(message, &FlowContext::default())
}

#[test]
fn test_empty_node_set_gives_empty_payload() -> TestResult {
    let out = apply("/inventory/magazine", inventory())?;
    assert_eq!(out.payload(), &Payload::Empty);
    assert_eq!(out.attributes().get(XPATH_EXPRESSION_ATTRIBUTE), Some("/inventory/magazine"));
    Ok(())
}

#[test]
fn test_count_is_an_integer() -> TestResult {
    let out = apply("count(//book/title)", inventory())?;
    assert_eq!(out.payload(), &Payload::XPath(XPathResult::Integer(BigInt::from(3))));
    Ok(())
}

#[test]
fn test_namespaced_text_values_in_document_order() -> TestResult {
    let mut component = component(
        "//ns2:bookStore/ns2:book/ns2:name/text()",
        Some(bookstore_namespaces()),
    );
    component.initialize()?;
    let out = component.apply(Message::binary(fixture("book_store.xml")), &FlowContext::default())?;
    assert_eq!(
        out.payload(),
        &Payload::XPath(XPathResult::List(vec![
            "Data Structure".to_string(),
            "Java Core".to_string()
        ]))
    );
    Ok(())
}

#[test]
fn test_unbound_prefix_is_an_invalid_expression() -> TestResult {
    let err = apply("//ns2:book", Message::binary(fixture("book_store.xml"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidExpression);
    Ok(())
}

#[test]
fn test_boolean_and_text_results() -> TestResult {
    let out = apply("boolean(/inventory/book/price[text() > 14])", inventory())?;
    assert_eq!(out.payload(), &Payload::XPath(XPathResult::Boolean(true)));

    let out = apply("boolean(/inventory/book/price[text() > 100])", inventory())?;
    assert_eq!(out.payload(), &Payload::XPath(XPathResult::Boolean(false)));

    let out = apply("//book[@year>2001]/title/text()", inventory())?;
    assert_eq!(
        out.payload(),
        &Payload::XPath(XPathResult::String("Burning Tower".to_string()))
    );
    Ok(())
}

#[test]
fn test_unresolved_dynamic_expression_never_reaches_the_engine() -> TestResult {
    let engine = CountingEngine::new();
    let mut component = component("#[attributes.query]", None)
        .with_engine(engine.clone())
        .with_script_engine(Arc::new(LookupScriptEngine));
    component.initialize()?;

    let out = component.apply(inventory().with_attribute("other", "x"), &FlowContext::default())?;
    assert_eq!(out.payload(), &Payload::Empty);
    assert!(!out.attributes().contains_key(XPATH_EXPRESSION_ATTRIBUTE));
    assert_eq!(out.attributes().get("other"), Some("x"));
    assert_eq!(engine.parses(), 0);
    assert_eq!(engine.expression_compiles(), 0);
    Ok(())
}

#[test]
fn test_resolved_dynamic_expression_matches_static() -> TestResult {
    let expression = "count(//book[author='Neal Stephenson'])";

    let engine = CountingEngine::new();
    let mut dynamic = component("#[vars.query]", None)
        .with_engine(engine.clone())
        .with_script_engine(Arc::new(LookupScriptEngine));
    dynamic.initialize()?;
    let flow = FlowContext::new("books").with_variable("query", expression);
    let from_dynamic = dynamic.apply(inventory(), &flow)?;
    let again = dynamic.apply(inventory(), &flow)?;

    let from_static = apply(expression, inventory())?;
    assert_eq!(from_dynamic.payload(), from_static.payload());
    assert_eq!(from_dynamic.payload(), &Payload::XPath(XPathResult::Integer(BigInt::from(2))));
    assert_eq!(from_dynamic.attributes().get(XPATH_EXPRESSION_ATTRIBUTE), Some(expression));
    assert_eq!(again.payload(), from_static.payload());
    assert_eq!(engine.expression_compiles(), 2);
    Ok(())
}

#[test]
fn test_static_expression_compiles_once() -> TestResult {
    let engine = CountingEngine::new();
    let mut component = component("sum(//price)", None).with_engine(engine.clone());
    component.initialize()?;
    for _ in 0..3 {
        let out = component.apply(inventory(), &FlowContext::default())?;
        assert!(matches!(out.payload(), Payload::XPath(XPathResult::Decimal(_))));
    }
    assert_eq!(engine.parses(), 3);
    assert_eq!(engine.expression_compiles(), 1);
    Ok(())
}

#[test]
fn test_malformed_payload() -> TestResult {
    let err = apply("count(//book)", Message::text("<inventory><book></inventory>")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);

    let err = apply("count(//book)", Message::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    Ok(())
}

#[test]
fn test_component_from_json_configuration() -> TestResult {
    init_logger();
    let config: XPathComponentConfig = xmlbridge::config::from_json(
        r#"{
            "expression": "//ns2:book[@id='2']/ns2:name/text()",
            "configuration": { "prefixNamespaces": { "ns2": "http://bookstore.com/schemes" } }
        }"#,
    )?;
    let mut component = XPathComponent::new(config);
    component.initialize()?;
    let out = component.apply(Message::binary(fixture("book_store.xml")), &FlowContext::default())?;
    assert_eq!(out.payload(), &Payload::XPath(XPathResult::String("Java Core".to_string())));
    Ok(())
}

#[test]
fn test_component_is_shared_between_threads() -> TestResult {
    let mut component = component("count(//book)", None);
    component.initialize()?;
    let component = Arc::new(component);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let component = Arc::clone(&component);
            std::thread::spawn(move || component.apply(inventory(), &FlowContext::default()))
        })
        .collect();
    for handle in handles {
        let out = handle.join().map_err(|_| "worker panicked")??;
        assert_eq!(out.payload(), &Payload::XPath(XPathResult::Integer(BigInt::from(3))));
    }
    Ok(())
}

#[test]
fn test_payload_in_declared_or_utf16_encoding() -> TestResult {
    let latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>caf\xE9</a>".to_vec();
    let out = apply("string(/a)", Message::binary(latin1))?;
    assert_eq!(out.payload(), &Payload::XPath(XPathResult::String("caf\u{e9}".to_string())));

    let mut utf16 = vec![0xFF, 0xFE];
    utf16.extend(
        "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a>caf\u{e9}</a>"
            .encode_utf16()
            .flat_map(u16::to_le_bytes),
    );
    let out = apply("string(/a)", Message::binary(utf16))?;
    assert_eq!(out.payload(), &Payload::XPath(XPathResult::String("caf\u{e9}".to_string())));

    let unknown = b"<?xml version=\"1.0\" encoding=\"klingon\"?><a/>".to_vec();
    let err = apply("string(/a)", Message::binary(unknown)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    Ok(())
}
