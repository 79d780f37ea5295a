use crate::ast::{PreparsedTemplate, ResultName};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xmlbridge_xpath::XPathValue;
use xmlbridge_xpath::datasource::{DataSourceNode, NodeType, QName};

/// Deep-copies every node of a node-set; any other value is written as text.
pub(crate) fn handle_copy_of<'a, N: DataSourceNode<'a> + 'a>(
    value: XPathValue<N>,
    builder: &mut dyn OutputBuilder,
) {
    match value {
        XPathValue::NodeSet(nodes) => {
            for node in nodes {
                copy_node(node, builder);
            }
        }
        other => {
            let content = other.to_string();
            if !content.is_empty() {
                builder.add_text(&content);
            }
        }
    }
}

/// Shallow copy of the context node; `body` supplies the content of a copied element.
pub(crate) fn handle_copy<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    match context_node.node_type() {
        NodeType::Element => {
            builder.start_element(result_name(context_node.name()));
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
            builder.end_element();
        }
        NodeType::Root => {
            executor.execute_template(body, context_node, context_position, context_size, builder)?;
        }
        _ => copy_node(context_node, builder),
    }
    Ok(())
}

fn copy_node<'a, N: DataSourceNode<'a> + 'a>(node: N, builder: &mut dyn OutputBuilder) {
    match node.node_type() {
        NodeType::Element => {
            builder.start_element(result_name(node.name()));
            for attr in node.attributes() {
                builder.set_attribute(result_name(attr.name()), &attr.string_value());
            }
            for child in node.children() {
                copy_node(child, builder);
            }
            builder.end_element();
        }
        NodeType::Root => {
            for child in node.children() {
                copy_node(child, builder);
            }
        }
        NodeType::Attribute => {
            builder.set_attribute(result_name(node.name()), &node.string_value());
        }
        NodeType::Text => builder.add_text(&node.string_value()),
        NodeType::Comment => builder.add_comment(&node.string_value()),
        NodeType::ProcessingInstruction => {
            let target = node.name().map_or("", |q| q.local_part);
            builder.add_processing_instruction(target, &node.string_value());
        }
    }
}

fn result_name(name: Option<QName<'_>>) -> ResultName {
    match name {
        Some(q) => ResultName {
            prefix: q.prefix.map(str::to_string),
            local: q.local_part.to_string(),
            namespace: q.namespace.map(str::to_string),
        },
        None => ResultName::local(""),
    }
}
