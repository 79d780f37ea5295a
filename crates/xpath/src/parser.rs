//! A `nom`-based parser for the XPath 1.0 expression language.

use super::ast::*;
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize},
    multi::{many0, separated_list0},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated},
};
use num_bigint::BigInt;

// --- Main Public Parser ---

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expression(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::XPathParse(
            input.to_string(),
            format!("Parser did not consume all input. Remainder: '{}'", rem),
        )),
        Err(e) => Err(XPathError::XPathParse(input.to_string(), e.to_string())),
    }
}

// --- Combinators & Helpers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

/// Matches an operator name such as `and` or `div`, but not the prefix of a longer name.
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(tag(word), not(peek(take_while1(is_name_char))))
}

fn build_binary_expr_parser<'a, F, G>(
    sub_expr_parser: F,
    op_parser: G,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expression>
where
    F: Parser<&'a str, Output = Expression, Error = nom::error::Error<&'a str>> + Clone,
    G: Parser<&'a str, Output = BinaryOperator, Error = nom::error::Error<&'a str>> + Clone,
{
    move |input: &str| {
        let (input, mut left) = sub_expr_parser.clone().parse(input)?;
        let (input, remainder) =
            many0(pair(ws(op_parser.clone()), sub_expr_parser.clone())).parse(input)?;

        for (op, right) in remainder {
            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok((input, left))
    }
}

// --- Expression Parsers (in order of precedence) ---

fn expression(input: &str) -> IResult<&str, Expression> {
    or_expr(input)
}

fn or_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("or"), |_| BinaryOperator::Or).parse(input)
}

fn and_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(keyword("and"), |_| BinaryOperator::And).parse(input)
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(and_expr, or_op)(input)
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(equality_expr, and_op)(input)
}

fn equality_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("="), |_| BinaryOperator::Equals),
        map(tag("!="), |_| BinaryOperator::NotEquals),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(tag("<="), |_| BinaryOperator::LessThanOrEqual),
        map(tag("&lt;="), |_| BinaryOperator::LessThanOrEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("&gt;="), |_| BinaryOperator::GreaterThanOrEqual),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag("&lt;"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
        map(tag("&gt;"), |_| BinaryOperator::GreaterThan),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('+'), |_| BinaryOperator::Plus),
        map(char('-'), |_| BinaryOperator::Minus),
    ))
    .parse(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        map(char('*'), |_| BinaryOperator::Multiply),
        map(keyword("div"), |_| BinaryOperator::Divide),
        map(keyword("mod"), |_| BinaryOperator::Modulo),
    ))
    .parse(input)
}

fn union_op(input: &str) -> IResult<&str, BinaryOperator> {
    map(char('|'), |_| BinaryOperator::Union).parse(input)
}

fn equality_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(relational_expr, equality_op)(input)
}

fn relational_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(additive_expr, relational_op)(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(multiplicative_expr, additive_op)(input)
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(unary_expr, multiplicative_op)(input)
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    let (i, neg_op) = opt(ws(char('-'))).parse(input)?;
    if neg_op.is_some() {
        let (i, expr) = unary_expr(i)?;
        return Ok((
            i,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            },
        ));
    }
    union_expr(i)
}

fn union_expr(input: &str) -> IResult<&str, Expression> {
    build_binary_expr_parser(path_expr, union_op)(input)
}

/// Resolves the ambiguity between location paths and primary expressions that may be
/// followed by predicates and a path, e.g. `$books[1]/title`.
fn path_expr(input: &str) -> IResult<&str, Expression> {
    // Primary expressions go first: `position()` would otherwise be read as a step
    // named `position`.
    let (i, start_expr) = ws(alt((filter_expr, map(location_path, Expression::LocationPath))))
        .parse(input)?;

    let (i, remainder_steps) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;
    let (i, _) = multispace0(i)?;

    if remainder_steps.is_empty() {
        return Ok((i, start_expr));
    }

    let (start_point, is_absolute, mut steps) = match start_expr {
        Expression::LocationPath(lp) => (lp.start_point, lp.is_absolute, lp.steps),
        other => (Some(Box::new(other)), false, vec![]),
    };

    for (sep, next_step) in remainder_steps {
        if sep == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next_step);
    }

    Ok((
        i,
        Expression::LocationPath(LocationPath {
            start_point,
            is_absolute,
            steps,
        }),
    ))
}

fn filter_expr(input: &str) -> IResult<&str, Expression> {
    let (i, base) = primary_expr(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    if predicates.is_empty() {
        Ok((i, base))
    } else {
        Ok((
            i,
            Expression::Filter {
                base: Box::new(base),
                predicates,
            },
        ))
    }
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        variable_reference,
        number_literal,
        map(string_literal, Expression::Literal),
        function_call,
        delimited(ws(char('(')), expression, ws(char(')'))),
    ))
    .parse(input)
}

// --- Literal Parsers ---

/// `Digits ('.' Digits?)? | '.' Digits`. Literals without a fraction stay integers.
fn number_literal(input: &str) -> IResult<&str, Expression> {
    preceded(
        peek(satisfy(|c| c.is_ascii_digit() || c == '.')),
        map_res(recognize_float, |s: &str| {
            if s.contains(['.', 'e', 'E']) {
                s.parse::<f64>().map(Expression::Number).map_err(|_| ())
            } else {
                s.parse::<BigInt>().map(Expression::Integer).map_err(|_| ())
            }
        }),
    )
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
        )),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), q_name), Expression::Variable).parse(input)
}

// --- Name and NodeTest Parsers ---

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn nc_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_name_start_char), take_while(is_name_char))).parse(input)
}

fn q_name(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(nc_name, opt(pair(char(':'), nc_name)))),
        |s: &str| s.to_string(),
    )
    .parse(input)
}

fn node_type_test(input: &str) -> IResult<&str, NodeTest> {
    map(
        terminated(
            alt((
                tag("text"),
                tag("node"),
                tag("comment"),
                tag("processing-instruction"),
            )),
            pair(
                ws(char('(')),
                pair(opt(ws(string_literal)), ws(char(')'))),
            ),
        ),
        |node_type: &str| match node_type {
            "text" => NodeTest::NodeType(NodeTypeTest::Text),
            "comment" => NodeTest::NodeType(NodeTypeTest::Comment),
            "processing-instruction" => NodeTest::NodeType(NodeTypeTest::ProcessingInstruction),
            _ => NodeTest::NodeType(NodeTypeTest::Node),
        },
    )
    .parse(input)
}

/// Parses a node test. Shared with the XSLT pattern parser.
pub fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tag("*"), |_| NodeTest::Wildcard),
        node_type_test,
        map(terminated(nc_name, tag(":*")), |prefix: &str| {
            NodeTest::NamespaceWildcard {
                prefix: prefix.to_string(),
                namespace: None,
            }
        }),
        map(q_name, |name| NodeTest::Name(NameTest::from_qname(&name))),
    ))
    .parse(input)
}

// --- Path Parsers ---

fn axis(input: &str) -> IResult<&str, Axis> {
    map(
        pair(
            alt((
                tag("child"),
                tag("descendant-or-self"),
                tag("descendant"),
                tag("attribute"),
                tag("parent"),
                tag("ancestor-or-self"),
                tag("ancestor"),
                tag("self"),
                tag("following-sibling"),
                tag("preceding-sibling"),
                tag("following"),
                tag("preceding"),
            )),
            ws(tag("::")),
        ),
        |(axis_str, _)| match axis_str {
            "descendant-or-self" => Axis::DescendantOrSelf,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "parent" => Axis::Parent,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "ancestor" => Axis::Ancestor,
            "self" => Axis::SelfAxis,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            _ => Axis::Child,
        },
    )
    .parse(input)
}

/// Parses a bracketed predicate. Shared with the XSLT pattern parser.
pub fn predicate(input: &str) -> IResult<&str, Expression> {
    delimited(ws(char('[')), expression, ws(char(']'))).parse(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    let (i, (axis, node_test)) = alt((
        map(tag(".."), |_| (Axis::Parent, NodeTest::NodeType(NodeTypeTest::Node))),
        map(tag("."), |_| (Axis::SelfAxis, NodeTest::NodeType(NodeTypeTest::Node))),
        map(preceded(char('@'), node_test), |nt| (Axis::Attribute, nt)),
        map(pair(opt(axis), node_test), |(ax, nt)| {
            (ax.unwrap_or(Axis::Child), nt)
        }),
    ))
    .parse(input)?;
    let (i, predicates) = many0(predicate).parse(i)?;
    Ok((
        i,
        Step {
            axis,
            node_test,
            predicates,
        },
    ))
}

fn location_path(input: &str) -> IResult<&str, LocationPath> {
    let (i, (is_absolute, mut steps)) = if let Some(rem) = input.strip_prefix("//") {
        let (rem, step) = step(rem)?;
        (rem, (true, vec![Step::descendant_or_self(), step]))
    } else if let Some(rem) = input.strip_prefix('/') {
        match step(rem) {
            Ok((rem, first_step)) => (rem, (true, vec![first_step])),
            // The path is just "/".
            Err(_) => (rem, (true, vec![])),
        }
    } else {
        let (rem, first_step) = step(input)?;
        (rem, (false, vec![first_step]))
    };

    let (i, remainder) = many0(pair(alt((tag("//"), tag("/"))), step)).parse(i)?;

    for (sep, next_step) in remainder {
        if sep == "//" {
            steps.push(Step::descendant_or_self());
        }
        steps.push(next_step);
    }

    Ok((
        i,
        LocationPath {
            start_point: None,
            is_absolute,
            steps,
        },
    ))
}

// --- Function Call Parser ---

fn function_call(input: &str) -> IResult<&str, Expression> {
    // A function call is a QName followed by '('. Without the lookahead, `foo` in
    // `foo/bar` would be taken for a function name.
    let (i, name) = q_name(input)?;
    let (i, _) = peek(ws(char('('))).parse(i)?;

    // Node-type tests like text() are handled by the step parser.
    if matches!(
        name.as_str(),
        "text" | "node" | "comment" | "processing-instruction"
    ) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    let (i, _) = multispace0(i)?;
    let (i, args) = delimited(
        char('('),
        separated_list0(ws(char(',')), ws(expression)),
        ws(char(')')),
    )
    .parse(i)?;

    Ok((i, Expression::FunctionCall { name, args }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(name: &str) -> Step {
        Step {
            axis: Axis::Child,
            node_test: NodeTest::Name(NameTest::from_qname(name)),
            predicates: vec![],
        }
    }

    fn relative(steps: Vec<Step>) -> Expression {
        Expression::LocationPath(LocationPath {
            start_point: None,
            is_absolute: false,
            steps,
        })
    }

    #[test]
    fn test_parse_simple_path() {
        let result = parse_expression("foo/bar").unwrap();
        assert_eq!(result, relative(vec![child("foo"), child("bar")]));
    }

    #[test]
    fn test_parse_prefixed_names() {
        let result = parse_expression("//ns2:bookStore/ns2:book").unwrap();
        let Expression::LocationPath(lp) = result else {
            panic!("Expected LocationPath");
        };
        assert!(lp.is_absolute);
        assert_eq!(lp.steps.len(), 3);
        assert_eq!(
            lp.steps[1].node_test,
            NodeTest::Name(NameTest::new(Some("ns2"), "bookStore"))
        );
    }

    #[test]
    fn test_parse_namespace_wildcard() {
        let result = parse_expression("ns2:*").unwrap();
        let Expression::LocationPath(lp) = result else {
            panic!("Expected LocationPath");
        };
        assert_eq!(
            lp.steps[0].node_test,
            NodeTest::NamespaceWildcard {
                prefix: "ns2".to_string(),
                namespace: None
            }
        );
    }

    #[test]
    fn test_parse_integer_and_decimal_literals() {
        assert_eq!(
            parse_expression("2001").unwrap(),
            Expression::Integer(BigInt::from(2001))
        );
        assert_eq!(parse_expression("14.5").unwrap(), Expression::Number(14.5));
        assert_eq!(parse_expression(".5").unwrap(), Expression::Number(0.5));
        assert_eq!(parse_expression("0.5").unwrap(), Expression::Number(0.5));
        assert_eq!(parse_expression("(14.5)").unwrap(), Expression::Number(14.5));
        assert_eq!(number_literal("14.95"), Ok(("", Expression::Number(14.95))));
        assert_eq!(number_literal("7."), Ok(("", Expression::Number(7.0))));
    }

    #[test]
    fn test_trailing_decimal_in_comparison() {
        let expected = Expression::BinaryOp {
            left: Box::new(relative(vec![child("price")])),
            op: BinaryOperator::Equals,
            right: Box::new(Expression::Number(14.95)),
        };
        assert_eq!(parse_expression("price = 14.95").unwrap(), expected);
        assert!(number_literal("-1").is_err());
    }

    #[test]
    fn test_names_starting_with_inf_are_paths() {
        let result = parse_expression("info/nan").unwrap();
        assert_eq!(result, relative(vec![child("info"), child("nan")]));
    }

    #[test]
    fn test_parse_unary_minus() {
        let result = parse_expression("10 - -5").unwrap();
        let Expression::BinaryOp { left, op, right } = result else {
            panic!("Expected BinaryOp");
        };
        assert_eq!(op, BinaryOperator::Minus);
        assert_eq!(*left, Expression::Integer(BigInt::from(10)));
        assert_eq!(
            *right,
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(Expression::Integer(BigInt::from(5)))
            }
        );
    }

    #[test]
    fn test_parse_axes() {
        let Expression::LocationPath(lp) = parse_expression("following-sibling::foo").unwrap()
        else {
            panic!("Expected LocationPath");
        };
        assert_eq!(lp.steps[0].axis, Axis::FollowingSibling);

        let Expression::LocationPath(lp) = parse_expression("ancestor-or-self::*").unwrap() else {
            panic!("Expected LocationPath");
        };
        assert_eq!(lp.steps[0].axis, Axis::AncestorOrSelf);
        assert_eq!(lp.steps[0].node_test, NodeTest::Wildcard);
    }

    #[test]
    fn test_parse_path_starting_with_variable() {
        let result = parse_expression("$myVar/foo/bar").unwrap();
        assert_eq!(
            result,
            Expression::LocationPath(LocationPath {
                start_point: Some(Box::new(Expression::Variable("myVar".to_string()))),
                is_absolute: false,
                steps: vec![child("foo"), child("bar")]
            })
        );
    }

    #[test]
    fn test_parse_filter_expression() {
        let result = parse_expression("(//item)[1]").unwrap();
        let Expression::Filter { base, predicates } = result else {
            panic!("Expected Filter");
        };
        assert!(base.is_location_path());
        assert_eq!(predicates, vec![Expression::Integer(BigInt::from(1))]);
    }

    #[test]
    fn test_parse_predicate() {
        let result = parse_expression("foo[@id = 'a']").unwrap();
        let attr_path = relative(vec![Step {
            axis: Axis::Attribute,
            node_test: NodeTest::Name(NameTest::new(None, "id")),
            predicates: vec![],
        }]);
        let mut foo = child("foo");
        foo.predicates.push(Expression::BinaryOp {
            left: Box::new(attr_path),
            op: BinaryOperator::Equals,
            right: Box::new(Expression::Literal("a".into())),
        });
        assert_eq!(result, relative(vec![foo]));
    }

    #[test]
    fn test_parse_function_in_predicate() {
        let Expression::LocationPath(lp) = parse_expression("para[position()=1]").unwrap() else {
            panic!("Expected LocationPath");
        };
        assert_eq!(lp.steps[0].predicates.len(), 1);
        assert!(lp.steps[0].predicates[0].is_binary_op());
    }

    #[test]
    fn test_parse_text_node_test() {
        let Expression::LocationPath(lp) = parse_expression("foo/text()").unwrap() else {
            panic!("Expected LocationPath");
        };
        assert_eq!(lp.steps[1].node_test, NodeTest::NodeType(NodeTypeTest::Text));
    }

    #[test]
    fn test_parse_abbreviated_steps() {
        let Expression::LocationPath(lp) = parse_expression("../.").unwrap() else {
            panic!("Expected LocationPath");
        };
        assert_eq!(lp.steps[0].axis, Axis::Parent);
        assert_eq!(lp.steps[1].axis, Axis::SelfAxis);
    }

    #[test]
    fn test_parse_operator_precedence() {
        let result = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(Expression::Integer(BigInt::from(1))),
                op: BinaryOperator::Plus,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(Expression::Integer(BigInt::from(2))),
                    op: BinaryOperator::Multiply,
                    right: Box::new(Expression::Integer(BigInt::from(3))),
                }),
            }
        );
    }

    #[test]
    fn test_parse_boolean_logic() {
        let path = |n: &str| relative(vec![child(n)]);
        let eq = |a: &str, b: &str| Expression::BinaryOp {
            left: Box::new(path(a)),
            op: BinaryOperator::Equals,
            right: Box::new(path(b)),
        };

        let result = parse_expression("a = b or c = d and e = f").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(eq("a", "b")),
                op: BinaryOperator::Or,
                right: Box::new(Expression::BinaryOp {
                    left: Box::new(eq("c", "d")),
                    op: BinaryOperator::And,
                    right: Box::new(eq("e", "f")),
                }),
            }
        );
    }

    #[test]
    fn test_operator_keywords_do_not_split_names() {
        let result = parse_expression("order").unwrap();
        assert_eq!(result, path_of("order"));
        let result = parse_expression("a div b").unwrap();
        assert!(result.is_binary_op());
    }

    fn path_of(name: &str) -> Expression {
        relative(vec![child(name)])
    }

    #[test]
    fn test_parse_function_call_with_whitespace() {
        let result = parse_expression("count( //book/title )").unwrap();
        let Expression::FunctionCall { name, args } = result else {
            panic!("Expected FunctionCall");
        };
        assert_eq!(name, "count");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_parse_xml_entities_in_relational_expr() {
        let result = parse_expression("a &lt; b").unwrap();
        assert_eq!(
            result,
            Expression::BinaryOp {
                left: Box::new(path_of("a")),
                op: BinaryOperator::LessThan,
                right: Box::new(path_of("b")),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expression("//book[").is_err());
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("").is_err());
    }
}
