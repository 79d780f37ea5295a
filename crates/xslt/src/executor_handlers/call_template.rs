use crate::ast::WithParam;
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xmlbridge_xpath::datasource::DataSourceNode;

/// Calls a named template without changing the context node. Parameters the template
/// does not declare are ignored.
pub(crate) fn handle_call_template<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    name: &str,
    params: &[WithParam],
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let stylesheet = executor.stylesheet();
    let Some(template) = stylesheet.named_templates.get(name) else {
        return Err(ExecutionError::UnknownNamedTemplate(name.to_string()));
    };
    let passed = executor.evaluate_with_params(params, context_node, context_position, context_size)?;
    executor.invoke_template(
        &template.params,
        &template.body,
        &passed,
        context_node,
        context_position,
        context_size,
        builder,
    )
}
