//! The XPath subset used by the legacy `XMLTABLE` projections and fragment
//! parsers.
//!
//! Supported: absolute (`/A/B`), relative (`./A`, `A`) and descendant (`//A`)
//! steps, a terminal `text()`, and the predicates `[not(NAME)]`, `[last()]`
//! and `[n]`. V1 marks nodes that failed form validation with a `fox-error`
//! child, so most paths carry `[not(fox-error)]`.

use roxmltree::Node;

use crate::MigrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    absolute: bool,
    steps: Vec<Step>,
    text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    descendant: bool,
    name: String,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    NotChild(String),
    Last,
    Position(usize),
}

impl XPath {
    /// # Errors
    /// Returns [`MigrationError::Configuration`] for expressions outside the
    /// supported subset.
    pub fn parse(expression: &str) -> Result<Self, MigrationError> {
        let invalid = |reason: &str| {
            MigrationError::Configuration(format!("invalid xpath {expression:?}: {reason}"))
        };

        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty expression"));
        }

        let absolute = trimmed.starts_with('/');
        let body = trimmed.strip_prefix("./").unwrap_or(trimmed);

        let mut steps = Vec::new();
        let mut text = false;
        let mut descendant = false;
        let segments: Vec<&str> = body.split('/').collect();
        let last_index = segments.len() - 1;

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                // A leading "/" yields one empty segment, "//" yields a second.
                if index > 0 || !absolute {
                    descendant = true;
                }
                continue;
            }
            if text {
                return Err(invalid("text() must be the final step"));
            }
            if *segment == "text()" {
                if index != last_index {
                    return Err(invalid("text() must be the final step"));
                }
                text = true;
                continue;
            }
            if *segment == "." {
                continue;
            }
            steps.push(parse_step(segment, descendant).map_err(|reason| invalid(&reason))?);
            descendant = false;
        }

        if steps.is_empty() && !text {
            return Err(invalid("no steps"));
        }

        Ok(Self {
            absolute,
            steps,
            text,
        })
    }

    /// Evaluates the path from `context`; absolute paths restart at the
    /// document root.
    ///
    /// Positional predicates count siblings under one parent, so `//I[1]`
    /// picks the first `I` of every parent. The result is in document order
    /// without duplicates.
    #[must_use]
    pub fn select<'a, 'input>(&self, context: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        let start = if self.absolute {
            context.document().root()
        } else {
            context
        };

        let mut current = vec![start];
        for step in &self.steps {
            let mut next = Vec::new();
            for node in current {
                let parents: Vec<Node<'a, 'input>> = if step.descendant {
                    node.descendants().collect()
                } else {
                    vec![node]
                };
                for parent in parents {
                    let mut candidates: Vec<Node<'a, 'input>> = parent
                        .children()
                        .filter(|candidate| step.matches(candidate))
                        .collect();
                    for predicate in &step.predicates {
                        candidates = predicate.apply(candidates);
                    }
                    next.extend(candidates);
                }
            }
            next.sort_by_key(|node| node.id().get());
            next.dedup_by_key(|node| node.id());
            current = next;
        }
        current
    }

    #[must_use]
    pub fn selects_text(&self) -> bool {
        self.text
    }
}

impl Step {
    fn matches(&self, node: &Node<'_, '_>) -> bool {
        node.is_element() && (self.name == "*" || node.tag_name().name() == self.name)
    }
}

impl Predicate {
    fn apply<'a, 'input>(&self, nodes: Vec<Node<'a, 'input>>) -> Vec<Node<'a, 'input>> {
        match self {
            Self::NotChild(name) => nodes
                .into_iter()
                .filter(|node| {
                    !node
                        .children()
                        .any(|child| child.is_element() && child.tag_name().name() == name.as_str())
                })
                .collect(),
            Self::Last => nodes.last().copied().into_iter().collect(),
            Self::Position(position) => nodes
                .get(position.saturating_sub(1))
                .copied()
                .into_iter()
                .collect(),
        }
    }
}

fn parse_step(segment: &str, descendant: bool) -> Result<Step, String> {
    let (name, mut rest) = match segment.find('[') {
        Some(index) => (&segment[..index], &segment[index..]),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err("missing element name".to_string());
    }

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        let inner_end = rest
            .find(']')
            .ok_or_else(|| "unterminated predicate".to_string())?;
        let inner = rest[1..inner_end].trim();
        predicates.push(parse_predicate(inner)?);
        rest = &rest[inner_end + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(format!("unexpected text after predicate: {rest}"));
        }
    }

    Ok(Step {
        descendant,
        name: name.to_string(),
        predicates,
    })
}

fn parse_predicate(inner: &str) -> Result<Predicate, String> {
    if inner == "last()" {
        return Ok(Predicate::Last);
    }
    if let Some(name) = inner
        .strip_prefix("not(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return Ok(Predicate::NotChild(name.trim().to_string()));
    }
    match inner.parse::<usize>() {
        Ok(position) if position > 0 => Ok(Predicate::Position(position)),
        _ => Err(format!("unsupported predicate [{inner}]")),
    }
}

/// Selects nodes for an XPath expression.
///
/// # Errors
/// Returns [`MigrationError::Configuration`] for an invalid expression.
pub fn select_nodes<'a, 'input>(
    context: Node<'a, 'input>,
    expression: &str,
) -> Result<Vec<Node<'a, 'input>>, MigrationError> {
    Ok(XPath::parse(expression)?.select(context))
}

/// Returns the trimmed text of the first node matched by `expression`, or
/// `None` when nothing matches or the text is blank.
///
/// # Errors
/// Returns [`MigrationError::Configuration`] for an invalid expression.
pub fn get_xml_val(node: Node<'_, '_>, expression: &str) -> Result<Option<String>, MigrationError> {
    let path = XPath::parse(expression)?;
    Ok(path.select(node).first().and_then(|found| node_text(*found)))
}

pub(crate) fn node_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// The serialized source text of an element, as stored by V1 in `XMLTYPE`
/// projection columns.
#[must_use]
pub fn fragment_text(node: Node<'_, '_>, source: &str) -> Option<String> {
    source
        .get(node.range())
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(ToString::to_string)
}

/// Looks for a child element by name.
#[must_use]
pub fn has_child(node: Node<'_, '_>, name: &str) -> bool {
    node.children()
        .any(|child| child.is_element() && child.tag_name().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn root_value(xml: &str, expression: &str) -> Option<String> {
        let document = must_ok(roxmltree::Document::parse(xml));
        must_ok(get_xml_val(document.root_element(), expression))
    }

    #[test]
    fn get_xml_val_matches_legacy_lookups() {
        let xml = "<ROOT><A>a</A><B>b</B></ROOT>";
        assert_eq!(root_value(xml, "/ROOT/A/text()").as_deref(), Some("a"));
        assert_eq!(root_value(xml, "//A").as_deref(), Some("a"));
        assert_eq!(root_value(xml, "./A/text()").as_deref(), Some("a"));
        assert_eq!(
            root_value("<ROOT><A>a</A><B> b\n</B></ROOT>", "/ROOT/B").as_deref(),
            Some("b")
        );
        assert_eq!(root_value("<ROOT><A>a</A><B> b </B></ROOT>", "ROOT/C/text()"), None);
    }

    #[test]
    fn fox_error_nodes_are_treated_as_absent() {
        let xml = "<LIST>\
            <ITEM><fox-error>bad</fox-error><V>1</V></ITEM>\
            <ITEM><V>2</V></ITEM>\
        </LIST>";
        let document = must_ok(roxmltree::Document::parse(xml));
        let nodes = must_ok(select_nodes(
            document.root_element(),
            "/LIST/ITEM[not(fox-error)]",
        ));
        assert_eq!(nodes.len(), 1);
        assert_eq!(must_ok(get_xml_val(nodes[0], "./V")).as_deref(), Some("2"));
    }

    #[test]
    fn last_and_position_predicates_pick_single_nodes() {
        let xml = "<L><I>1</I><I>2</I><I>3</I></L>";
        assert_eq!(root_value(xml, "/L/I[last()]/text()").as_deref(), Some("3"));
        assert_eq!(root_value(xml, "/L/I[2]").as_deref(), Some("2"));
        assert_eq!(root_value(xml, "/L/I[9]"), None);
    }

    #[test]
    fn descendant_steps_search_nested_levels() {
        let xml = "<IMA><APP><FA><SECTION1>true</SECTION1></FA></APP></IMA>";
        assert_eq!(root_value(xml, "//SECTION1").as_deref(), Some("true"));
        assert_eq!(root_value(xml, "/IMA//FA/SECTION1").as_deref(), Some("true"));
    }

    fn select_values(xml: &str, expression: &str) -> Vec<Option<String>> {
        let document = must_ok(roxmltree::Document::parse(xml));
        must_ok(select_nodes(document.root_element(), expression))
            .into_iter()
            .map(node_text)
            .collect()
    }

    #[test]
    fn descendant_positions_count_siblings_per_parent() {
        let xml = "<R>\
            <G><ITEM>a</ITEM><ITEM>b</ITEM></G>\
            <G><ITEM>c</ITEM></G>\
        </R>";
        assert_eq!(
            select_values(xml, "//ITEM[1]"),
            vec![Some("a".to_string()), Some("c".to_string())]
        );
        assert_eq!(
            select_values(xml, "//ITEM[last()]"),
            vec![Some("b".to_string()), Some("c".to_string())]
        );
        assert_eq!(select_values(xml, "//ITEM[2]"), vec![Some("b".to_string())]);
    }

    #[test]
    fn nested_descendant_steps_yield_each_node_once() {
        let xml = "<R><G><G><ITEM>x</ITEM></G><ITEM>y</ITEM></G></R>";
        assert_eq!(
            select_values(xml, "//G//ITEM"),
            vec![Some("x".to_string()), Some("y".to_string())]
        );
        assert_eq!(select_values(xml, "/R//G").len(), 2);
    }

    #[test]
    fn unsupported_expressions_are_configuration_errors() {
        for expression in ["", "/A[contains(x)]", "/A/text()/B", "/A[0]", "/A[1"] {
            assert!(
                matches!(XPath::parse(expression), Err(MigrationError::Configuration(_))),
                "expected failure for {expression:?}"
            );
        }
    }

    #[test]
    fn fragment_text_returns_serialized_subtree() {
        let xml = "<IMA><LIST>\n  <ITEM><V>1</V></ITEM>\n</LIST></IMA>";
        let document = must_ok(roxmltree::Document::parse(xml));
        let nodes = must_ok(select_nodes(document.root_element(), "/IMA/LIST"));
        assert_eq!(
            fragment_text(nodes[0], xml).as_deref(),
            Some("<LIST>\n  <ITEM><V>1</V></ITEM>\n</LIST>")
        );
    }
}
