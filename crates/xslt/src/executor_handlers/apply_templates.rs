use crate::ast::{SortKey, WithParam};
use crate::executor::{ExecutionError, TemplateExecutor};
use crate::output::OutputBuilder;
use xmlbridge_xpath::Expression;
use xmlbridge_xpath::datasource::DataSourceNode;

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_apply_templates<'s, 'a, N: DataSourceNode<'a> + 'a>(
    executor: &mut TemplateExecutor<'s, 'a, N>,
    select: Option<&Expression>,
    mode: Option<&str>,
    sort_keys: &[SortKey],
    params: &[WithParam],
    context_node: N,
    context_position: usize,
    context_size: usize,
    builder: &mut dyn OutputBuilder,
) -> Result<(), ExecutionError> {
    let mut nodes_to_process = match select {
        Some(sel) => executor.select_nodes(sel, context_node, context_position, context_size)?,
        None => context_node.children().collect(),
    };
    let passed = executor.evaluate_with_params(params, context_node, context_position, context_size)?;

    executor.sort_node_set(&mut nodes_to_process, sort_keys)?;
    executor.apply_templates_to_nodes(&nodes_to_process, mode, &passed, builder)
}
