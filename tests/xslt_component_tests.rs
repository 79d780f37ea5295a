mod common;

use common::{CountingEngine, LookupScriptEngine, TestResult, fixture, fixture_resources, init_logger};
use std::sync::Arc;
use xmlbridge::{
    ErrorKind, FlowContext, InMemoryResourceProvider, Message, Payload, ProcessorSync,
    ResourceProvider, StaticResourceTransformer, XsltComponent, XsltComponentConfig,
    XsltFileComponent, XsltFileComponentConfig, XsltTransformerStrategy,
};

const REPORT: &str = r#"<report count="3"><entry year="2005">Burning Tower</entry><entry year="2000">Snow Crash</entry><entry year="1995">Zodiac</entry></report>"#;

fn report_component() -> XsltComponent {
    init_logger();
    XsltComponent::new(
        XsltComponentConfig {
            style_sheet_file: "inventory_report.xsl".to_string(),
        },
        fixture_resources(),
    )
}

fn inventory() -> Message {
    Message::binary(fixture("book_inventory.xml"))
}

#[test]
fn test_static_stylesheet_from_file() -> TestResult {
    let engine = CountingEngine::new();
    let mut component = report_component().with_engine(engine.clone());
    component.initialize()?;

    for _ in 0..2 {
        let out = component.apply(inventory().with_attribute("batch", "1"), &FlowContext::default())?;
        assert_eq!(out.payload(), &Payload::Text(REPORT.to_string()));
        assert_eq!(out.attributes().get("batch"), Some("1"));
    }
    assert_eq!(engine.stylesheet_compiles(), 1);
    assert_eq!(engine.transforms(), 2);
    Ok(())
}

#[test]
fn test_dispose_twice_is_harmless() -> TestResult {
    let mut component = report_component();
    component.initialize()?;
    component.dispose();
    component.dispose();

    let err = component.apply(inventory(), &FlowContext::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transformation);
    Ok(())
}

#[test]
fn test_strategy_dispose_twice_is_harmless() -> TestResult {
    init_logger();
    let resources = fixture_resources();
    let mut transformer = StaticResourceTransformer::load(
        Arc::new(xmlbridge::NativeEngine),
        resources.as_ref(),
        "titles.xsl",
    )?;
    let output = transformer.transform(
        &mut fixture("book_inventory.xml").as_slice(),
        &Message::default(),
        &FlowContext::default(),
    )?;
    assert_eq!(output, "Snow Crash, Burning Tower, Zodiac");

    transformer.dispose();
    transformer.dispose();
    assert!(transformer.is_disposed());
    Ok(())
}

#[test]
fn test_malformed_input_produces_no_output() -> TestResult {
    let mut component = report_component();
    component.initialize()?;
    let err = component
        .apply(Message::text("<inventory><book>"), &FlowContext::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDocument);
    Ok(())
}

#[test]
fn test_latin1_payload_is_decoded() -> TestResult {
    let mut component = report_component();
    component.initialize()?;
    let payload = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
<inventory><book year=\"1999\"><title>Caf\xE9</title></book></inventory>"
        .to_vec();
    let out = component.apply(Message::binary(payload), &FlowContext::default())?;
    assert_eq!(
        out.payload(),
        &Payload::Text("<report count=\"1\"><entry year=\"1999\">Caf\u{e9}</entry></report>".to_string())
    );
    Ok(())
}

#[test]
fn test_dynamic_file_name_per_message() -> TestResult {
    init_logger();
    let engine = CountingEngine::new();
    let mut component = XsltFileComponent::new(
        XsltFileComponentConfig {
            file_name: "#[attributes.stylesheet]".into(),
        },
        fixture_resources(),
    )
    .with_engine(engine.clone())
    .with_script_engine(Arc::new(LookupScriptEngine));
    component.initialize()?;
    assert_eq!(engine.stylesheet_compiles(), 0);

    let flow = FlowContext::default();
    let titles = component.apply(inventory().with_attribute("stylesheet", "titles.xsl"), &flow)?;
    assert_eq!(
        titles.payload(),
        &Payload::Text("Snow Crash, Burning Tower, Zodiac".to_string())
    );
    let report = component.apply(
        inventory().with_attribute("stylesheet", "inventory_report.xsl"),
        &flow,
    )?;
    assert_eq!(report.payload(), &Payload::Text(REPORT.to_string()));
    assert_eq!(engine.stylesheet_compiles(), 2);

    let err = component.apply(inventory(), &flow).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transformation);
    assert_eq!(engine.stylesheet_compiles(), 2);
    assert_eq!(engine.transforms(), 2);
    Ok(())
}

#[test]
fn test_stylesheet_outside_fixtures_is_refused() -> TestResult {
    init_logger();
    let mut component = XsltFileComponent::new(
        XsltFileComponentConfig {
            file_name: "../Cargo.toml".into(),
        },
        fixture_resources(),
    );
    let err = component.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    Ok(())
}

#[test]
fn test_broken_stylesheet_fails_initialize() -> TestResult {
    init_logger();
    let resources = InMemoryResourceProvider::new();
    resources.add(
        "broken.xsl",
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
             <xsl:template match="/"><xsl:call-template name="missing"/></xsl:template>
           </xsl:stylesheet>"#,
    )?;
    let resources: Arc<dyn ResourceProvider> = Arc::new(resources);
    let mut component = XsltComponent::new(
        XsltComponentConfig {
            style_sheet_file: "broken.xsl".to_string(),
        },
        resources,
    );
    let err = component.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transformation);
    Ok(())
}

#[test]
fn test_component_config_from_json() -> TestResult {
    let config: XsltComponentConfig =
        xmlbridge::config::from_json(r#"{ "styleSheetFile": "inventory_report.xsl" }"#)?;
    assert_eq!(config.style_sheet_file, "inventory_report.xsl");

    let config: XsltFileComponentConfig =
        xmlbridge::config::from_json(r##"{ "fileName": "#[attributes.stylesheet]" }"##)?;
    assert!(config.file_name.is_dynamic());
    Ok(())
}
