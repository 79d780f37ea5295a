use crate::ast::{
    AttributeValueTemplate, AvtPart, CompiledStylesheet, Param, PreparsedTemplate, SortDataType,
    SortKey, SortOrder, TemplateRule, VariableValue, WithParam, XsltInstruction,
};
use crate::executor_handlers as handlers;
use crate::output::{OutputBuilder, TextCollector};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::marker::PhantomData;
use thiserror::Error;
use xmlbridge_xpath::datasource::{DataSourceNode, NodeType};
use xmlbridge_xpath::{EvaluationContext, Expression, FunctionRegistry, XPathError, XPathValue};

/// Nesting depth of template invocations before a run is aborted. Must fit in
/// [`crate::processor::EXECUTOR_STACK_SIZE`].
pub const MAX_TEMPLATE_DEPTH: usize = 512;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("XPath evaluation error: {0}")]
    XPath(#[from] XPathError),

    #[error("Call to unknown named template: '{0}'")]
    UnknownNamedTemplate(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid {kind} name '{name}': {message}")]
    InvalidName {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Transformation terminated by xsl:message: {0}")]
    Terminated(String),

    #[error("Template nesting exceeded {0} levels")]
    RecursionLimit(usize),

    #[error("Could not start the executor thread: {0}")]
    Spawn(String),
}

/// A stateful executor that writes a result tree by processing a `CompiledStylesheet`
/// against a generic `DataSourceNode`. It implements the XSLT "push" model.
pub struct TemplateExecutor<'s, 'a, N: DataSourceNode<'a>> {
    stylesheet: &'s CompiledStylesheet,
    functions: FunctionRegistry,
    root_node: N,
    global_variables: HashMap<String, XPathValue<N>>,
    /// Local scopes of the template currently executing, innermost last.
    variable_stack: Vec<HashMap<String, XPathValue<N>>>,
    depth: usize,
    _marker: PhantomData<&'a ()>,
}

impl<'s, 'a, N: DataSourceNode<'a> + 'a> TemplateExecutor<'s, 'a, N> {
    pub fn new(stylesheet: &'s CompiledStylesheet, root_node: N) -> Self {
        Self {
            stylesheet,
            functions: FunctionRegistry::xslt(),
            root_node,
            global_variables: HashMap::new(),
            variable_stack: vec![],
            depth: 0,
            _marker: PhantomData,
        }
    }

    /// Binds top-level parameters and variables, then applies templates to the root.
    pub fn execute(&mut self, builder: &mut dyn OutputBuilder) -> Result<(), ExecutionError> {
        let stylesheet = self.stylesheet;
        for Param { name, value } in &stylesheet.globals {
            let value = self.evaluate_variable_value(value, self.root_node, 1, 1)?;
            self.global_variables.insert(name.clone(), value);
        }
        let root = self.root_node;
        self.apply_templates_to_nodes(&[root], None, &HashMap::new(), builder)
    }

    // --- Scope Management ---
    pub(crate) fn push_scope(&mut self) {
        self.variable_stack.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.variable_stack.pop();
    }

    pub(crate) fn set_variable_in_current_scope(&mut self, name: String, value: XPathValue<N>) {
        if let Some(scope) = self.variable_stack.last_mut() {
            scope.insert(name, value);
        } else {
            self.global_variables.insert(name, value);
        }
    }

    pub(crate) fn get_merged_variables(&self) -> HashMap<String, XPathValue<N>> {
        let mut merged = self.global_variables.clone();
        for scope in &self.variable_stack {
            merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    pub(crate) fn get_eval_context<'d>(
        &'d self,
        context_node: N,
        merged_variables: &'d HashMap<String, XPathValue<N>>,
        context_position: usize,
        context_size: usize,
    ) -> EvaluationContext<'a, 'd, N> {
        EvaluationContext::new(context_node, self.root_node, &self.functions, merged_variables)
            .with_position(context_position, context_size)
    }

    /// Evaluates `expression` with every variable in scope visible.
    pub(crate) fn evaluate(
        &self,
        expression: &Expression,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<XPathValue<N>, ExecutionError> {
        let merged_vars = self.get_merged_variables();
        let e_ctx = self.get_eval_context(context_node, &merged_vars, context_position, context_size);
        Ok(xmlbridge_xpath::evaluate(expression, &e_ctx)?)
    }

    /// Evaluates `expression`, which must produce a node-set.
    pub(crate) fn select_nodes(
        &self,
        expression: &Expression,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<Vec<N>, ExecutionError> {
        match self.evaluate(expression, context_node, context_position, context_size)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(ExecutionError::TypeError(format!(
                "Expected a node-set to select from, got {:?}",
                other
            ))),
        }
    }

    /// Runs `body` with its own variable scope.
    pub(crate) fn execute_template(
        &mut self,
        body: &PreparsedTemplate,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        self.push_scope();
        let result = self.execute_instructions(body, context_node, context_position, context_size, builder);
        self.pop_scope();
        result
    }

    fn execute_instructions(
        &mut self,
        body: &PreparsedTemplate,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        for instruction in &body.0 {
            self.execute_instruction(instruction, context_node, context_position, context_size, builder)?;
        }
        Ok(())
    }

    /// Runs `body` against a collector and returns the text it produced.
    pub(crate) fn execute_to_string(
        &mut self,
        body: &PreparsedTemplate,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<String, ExecutionError> {
        let mut collector = TextCollector::new();
        self.execute_template(body, context_node, context_position, context_size, &mut collector)?;
        Ok(collector.into_string())
    }

    pub(crate) fn evaluate_avt(
        &self,
        avt: &AttributeValueTemplate,
        e_ctx: &EvaluationContext<'a, '_, N>,
    ) -> Result<String, ExecutionError> {
        match avt {
            AttributeValueTemplate::Static(s) => Ok(s.clone()),
            AttributeValueTemplate::Dynamic(parts) => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        AvtPart::Static(s) => result.push_str(s),
                        AvtPart::Dynamic(expression) => {
                            let s = xmlbridge_xpath::evaluate(expression, e_ctx)?.to_string();
                            result.push_str(&s);
                        }
                    }
                }
                Ok(result)
            }
        }
    }

    /// The value of a variable, parameter or `xsl:with-param`.
    pub(crate) fn evaluate_variable_value(
        &mut self,
        value: &VariableValue,
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<XPathValue<N>, ExecutionError> {
        match value {
            VariableValue::Select(expression) => {
                self.evaluate(expression, context_node, context_position, context_size)
            }
            VariableValue::Content(body) => Ok(XPathValue::String(self.execute_to_string(
                body,
                context_node,
                context_position,
                context_size,
            )?)),
            VariableValue::Empty => Ok(XPathValue::String(String::new())),
        }
    }

    pub(crate) fn evaluate_with_params(
        &mut self,
        params: &[WithParam],
        context_node: N,
        context_position: usize,
        context_size: usize,
    ) -> Result<HashMap<String, XPathValue<N>>, ExecutionError> {
        let mut passed = HashMap::with_capacity(params.len());
        for param in params {
            let value =
                self.evaluate_variable_value(&param.value, context_node, context_position, context_size)?;
            passed.insert(param.name.clone(), value);
        }
        Ok(passed)
    }

    /// Processes a single instruction.
    fn execute_instruction(
        &mut self,
        instruction: &XsltInstruction,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        match instruction {
            XsltInstruction::Text(text) => {
                handlers::literals::handle_text(text, builder);
                Ok(())
            }
            XsltInstruction::ValueOf { select } => {
                let value = self.evaluate(select, context_node, context_position, context_size)?;
                handlers::literals::handle_value_of(&value, builder);
                Ok(())
            }
            XsltInstruction::LiteralElement {
                name,
                namespaces,
                attributes,
                body,
            } => handlers::literals::handle_literal_element(
                self,
                name,
                namespaces,
                attributes,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::Element {
                name,
                namespace,
                scope,
                body,
            } => handlers::literals::handle_element(
                self,
                name,
                namespace.as_ref(),
                scope,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::Attribute {
                name,
                namespace,
                scope,
                body,
            } => handlers::literals::handle_attribute(
                self,
                name,
                namespace.as_ref(),
                scope,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::Comment { body } => {
                let text = self.execute_to_string(body, context_node, context_position, context_size)?;
                builder.add_comment(&text);
                Ok(())
            }
            XsltInstruction::ProcessingInstruction { name, body } => {
                handlers::literals::handle_processing_instruction(
                    self,
                    name,
                    body,
                    context_node,
                    context_position,
                    context_size,
                    builder,
                )
            }
            XsltInstruction::CopyOf { select } => {
                let value = self.evaluate(select, context_node, context_position, context_size)?;
                handlers::copy::handle_copy_of(value, builder);
                Ok(())
            }
            XsltInstruction::Copy { body } => handlers::copy::handle_copy(
                self,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::ApplyTemplates {
                select,
                mode,
                sort_keys,
                params,
            } => handlers::apply_templates::handle_apply_templates(
                self,
                select.as_ref(),
                mode.as_deref(),
                sort_keys,
                params,
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::CallTemplate { name, params } => {
                handlers::call_template::handle_call_template(
                    self,
                    name,
                    params,
                    context_node,
                    context_position,
                    context_size,
                    builder,
                )
            }
            XsltInstruction::ForEach {
                select,
                sort_keys,
                body,
            } => handlers::for_each::handle_for_each(
                self,
                select,
                sort_keys,
                body,
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::If { test, body } => {
                let condition = self
                    .evaluate(test, context_node, context_position, context_size)?
                    .to_bool();
                handlers::control_flow::handle_if(
                    self,
                    condition,
                    body,
                    context_node,
                    context_position,
                    context_size,
                    builder,
                )
            }
            XsltInstruction::Choose { whens, otherwise } => handlers::control_flow::handle_choose(
                self,
                whens,
                otherwise.as_ref(),
                context_node,
                context_position,
                context_size,
                builder,
            ),
            XsltInstruction::Message { body, terminate } => handlers::control_flow::handle_message(
                self,
                body,
                *terminate,
                context_node,
                context_position,
                context_size,
            ),
            XsltInstruction::Variable { name, value } => {
                let value =
                    self.evaluate_variable_value(value, context_node, context_position, context_size)?;
                handlers::variables::handle_variable(self, name, value)
            }
        }
    }

    pub(crate) fn apply_templates_to_nodes(
        &mut self,
        nodes: &[N],
        mode: Option<&str>,
        params: &HashMap<String, XPathValue<N>>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        let context_size = nodes.len();
        for (i, &node) in nodes.iter().enumerate() {
            let context_position = i + 1;
            if let Some(rule) = self.find_matching_template(node, mode)? {
                log::trace!("Node {:?} matched template '{}'", node, rule.pattern);
                self.invoke_template(&rule.params, &rule.body, params, node, context_position, context_size, builder)?;
            } else {
                self.apply_builtin_template(node, mode, builder)?;
            }
        }
        Ok(())
    }

    /// Runs a template body with a fresh local scope: the caller's locals are not visible,
    /// declared parameters take the passed value or their default.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn invoke_template(
        &mut self,
        declared: &[Param],
        body: &PreparsedTemplate,
        passed: &HashMap<String, XPathValue<N>>,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        if self.depth >= MAX_TEMPLATE_DEPTH {
            return Err(ExecutionError::RecursionLimit(MAX_TEMPLATE_DEPTH));
        }
        let caller_scopes = std::mem::take(&mut self.variable_stack);
        self.depth += 1;
        let result = self.run_with_params(
            declared,
            body,
            passed,
            context_node,
            context_position,
            context_size,
            builder,
        );
        self.depth -= 1;
        self.variable_stack = caller_scopes;
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_with_params(
        &mut self,
        declared: &[Param],
        body: &PreparsedTemplate,
        passed: &HashMap<String, XPathValue<N>>,
        context_node: N,
        context_position: usize,
        context_size: usize,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        self.push_scope();
        for param in declared {
            let value = match passed.get(&param.name) {
                Some(value) => value.clone(),
                None => self.evaluate_variable_value(&param.value, context_node, context_position, context_size)?,
            };
            self.set_variable_in_current_scope(param.name.clone(), value);
        }
        self.execute_template(body, context_node, context_position, context_size, builder)
    }

    fn apply_builtin_template(
        &mut self,
        node: N,
        mode: Option<&str>,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecutionError> {
        match node.node_type() {
            NodeType::Root | NodeType::Element => {
                let children: Vec<N> = node.children().collect();
                self.apply_templates_to_nodes(&children, mode, &HashMap::new(), builder)?;
            }
            NodeType::Text | NodeType::Attribute => {
                builder.add_text(&node.string_value());
            }
            NodeType::Comment | NodeType::ProcessingInstruction => {}
        }
        Ok(())
    }

    /// Rules are stored highest precedence first, so the first match wins.
    fn find_matching_template(
        &self,
        node: N,
        mode: Option<&str>,
    ) -> Result<Option<&'s TemplateRule>, ExecutionError> {
        let stylesheet = self.stylesheet;
        let Some(rules) = stylesheet.template_rules.get(&mode.map(String::from)) else {
            return Ok(None);
        };
        let e_ctx = EvaluationContext::new(node, self.root_node, &self.functions, &self.global_variables);
        for rule in rules {
            if rule.pattern.matches(node, &e_ctx)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }

    pub(crate) fn sort_node_set(
        &self,
        nodes: &mut Vec<N>,
        sort_keys: &[SortKey],
    ) -> Result<(), ExecutionError> {
        if sort_keys.is_empty() {
            return Ok(());
        }

        let merged_vars = self.get_merged_variables();
        let size = nodes.len();
        let mut keyed = Vec::with_capacity(size);
        for (i, &node) in nodes.iter().enumerate() {
            let e_ctx = self.get_eval_context(node, &merged_vars, i + 1, size);
            let mut keys = Vec::with_capacity(sort_keys.len());
            for key in sort_keys {
                keys.push(xmlbridge_xpath::evaluate(&key.select, &e_ctx)?);
            }
            keyed.push((node, keys));
        }

        // Stable, so equal keys keep document order.
        keyed.sort_by(|(_, a), (_, b)| {
            for (key_idx, key) in sort_keys.iter().enumerate() {
                let ordering = match key.data_type {
                    SortDataType::Number => compare_numbers(a[key_idx].to_number(), b[key_idx].to_number()),
                    SortDataType::Text => a[key_idx].to_string().cmp(&b[key_idx].to_string()),
                };
                let final_ordering = if key.order == SortOrder::Descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if final_ordering != Ordering::Equal {
                    return final_ordering;
                }
            }
            Ordering::Equal
        });
        *nodes = keyed.into_iter().map(|(node, _)| node).collect();
        Ok(())
    }

    pub(crate) fn stylesheet(&self) -> &'s CompiledStylesheet {
        self.stylesheet
    }
}

/// NaN sorts before every number.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
