use crate::ast::{AttributeValueTemplate, NamespaceScope, PreparsedTemplate, ResultName};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use crate::util::split_qname;
use xmlbridge_xpath::XPathValue;
use xmlbridge_xpath::datasource::DataSourceNode;

pub(crate) fn handle_text(text: &str, builder: &mut dyn OutputBuilder) {
    builder.add_text(text);
}

pub(crate) fn handle_value_of<'a, N: DataSourceNode<'a> + 'a>(
    value: &XPathValue<N>,
    builder: &mut dyn OutputBuilder,
) {
    let content = value.to_string();
    if !content.is_empty() {
        builder.add_text(&content);
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_literal_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &ResultName,
    namespaces: &[(Option<String>, String)],
    attributes: &[(ResultName, AttributeValueTemplate)],
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    // Attribute values are evaluated before anything is written.
    let evaluated_attrs = {
        let merged_vars = executor.get_merged_variables();
        let e_ctx =
            executor.get_eval_context(context_node, &merged_vars, context_position, context_size);
        attributes
            .iter()
            .map(|(attr_name, avt)| Ok((attr_name.clone(), executor.evaluate_avt(avt, &e_ctx)?)))
            .collect::<Result<Vec<_>, ExecutionError>>()?
    };

    builder.start_element(name.clone());
    for (prefix, uri) in namespaces {
        builder.declare_namespace(prefix.as_deref(), uri);
    }
    for (attr_name, value) in evaluated_attrs {
        builder.set_attribute(attr_name, &value);
    }
    executor.execute_template(body, context_node, context_position, context_size, builder)?;
    builder.end_element();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_element<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    scope: &NamespaceScope,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let name = computed_name(
        executor,
        "element",
        name_avt,
        namespace_avt,
        scope,
        true,
        context_node,
        context_position,
        context_size,
    )?;
    builder.start_element(name);
    executor.execute_template(body, context_node, context_position, context_size, builder)?;
    builder.end_element();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_attribute<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    scope: &NamespaceScope,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let name = computed_name(
        executor,
        "attribute",
        name_avt,
        namespace_avt,
        scope,
        false,
        context_node,
        context_position,
        context_size,
    )?;
    if name.prefix.is_none() && name.local == "xmlns" {
        return Err(ExecutionError::InvalidName {
            kind: "attribute",
            name: name.local,
            message: "namespace declarations cannot be created as attributes".to_string(),
        });
    }
    let value = executor.execute_to_string(body, context_node, context_position, context_size)?;
    builder.set_attribute(name, &value);
    Ok(())
}

pub(crate) fn handle_processing_instruction<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name_avt: &AttributeValueTemplate,
    body: &PreparsedTemplate,
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let target = {
        let merged_vars = executor.get_merged_variables();
        let e_ctx =
            executor.get_eval_context(context_node, &merged_vars, context_position, context_size);
        executor.evaluate_avt(name_avt, &e_ctx)?
    };
    if !is_nc_name(&target) || target.eq_ignore_ascii_case("xml") {
        return Err(ExecutionError::InvalidName {
            kind: "processing-instruction",
            name: target,
            message: "target must be an NCName other than 'xml'".to_string(),
        });
    }
    let data = executor.execute_to_string(body, context_node, context_position, context_size)?;
    builder.add_processing_instruction(&target, data.replace("?>", "? >").trim_start());
    Ok(())
}

/// Evaluates the `name` and `namespace` attributes of `xsl:element` / `xsl:attribute`.
/// Without `namespace`, a prefix resolves against the stylesheet; an unprefixed element
/// takes the default namespace, an unprefixed attribute none.
#[allow(clippy::too_many_arguments)]
fn computed_name<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &TemplateExecutor<'s, 'a, N>,
    kind: &'static str,
    name_avt: &AttributeValueTemplate,
    namespace_avt: Option<&AttributeValueTemplate>,
    scope: &NamespaceScope,
    use_default: bool,
    context_node: N,
    context_position: usize,
    context_size: usize,
) -> Result<ResultName, ExecutionError> {
    let merged_vars = executor.get_merged_variables();
    let e_ctx = executor.get_eval_context(context_node, &merged_vars, context_position, context_size);
    let qname = executor.evaluate_avt(name_avt, &e_ctx)?;
    let (prefix, local) = split_qname(&qname);
    if !is_nc_name(local) || prefix.is_some_and(|p| !is_nc_name(p)) {
        return Err(ExecutionError::InvalidName {
            kind,
            name: qname.clone(),
            message: "not a valid QName".to_string(),
        });
    }

    let namespace = match namespace_avt {
        Some(avt) => Some(executor.evaluate_avt(avt, &e_ctx)?).filter(|ns| !ns.is_empty()),
        None => match prefix {
            Some(p) => Some(
                scope
                    .resolve(p)
                    .ok_or_else(|| ExecutionError::InvalidName {
                        kind,
                        name: qname.clone(),
                        message: format!("prefix '{}' is not declared", p),
                    })?
                    .to_string(),
            ),
            None if use_default => scope.default.clone(),
            None => None,
        },
    };
    Ok(ResultName {
        prefix: prefix.filter(|_| namespace.is_some()).map(str::to_string),
        local: local.to_string(),
        namespace,
    })
}

fn is_nc_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
