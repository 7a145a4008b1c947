use crate::dom::{self, TextPolicy};
use crate::style::StyleMapping;
use kuchiki::NodeRef;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Table,
    Head,
    Body,
    Row,
    Cell,
}

#[derive(Clone)]
pub struct TableNode {
    pub element: NodeRef,
    /// Value of the `name` attribute, used as the sheet name.
    pub name: Option<String>,
    pub style: Arc<StyleMapping>,
    pub head: Option<SectionNode>,
    pub body: SectionNode,
}

#[derive(Clone)]
pub struct SectionNode {
    pub kind: NodeKind,
    pub element: NodeRef,
    pub style: Arc<StyleMapping>,
    pub rows: Vec<RowNode>,
}

#[derive(Clone)]
pub struct RowNode {
    pub element: NodeRef,
    pub style: Arc<StyleMapping>,
    pub cells: Vec<CellNode>,
}

#[derive(Clone)]
pub struct CellNode {
    pub element: NodeRef,
    pub style: Arc<StyleMapping>,
    pub text: String,
    pub classes: Vec<String>,
    pub colspan: u32,
    pub rowspan: u32,
}

/// Borrowed view of any node of a [`TableNode`] tree.
#[derive(Clone, Copy)]
pub enum ModelNode<'a> {
    Table(&'a TableNode),
    Section(&'a SectionNode),
    Row(&'a RowNode),
    Cell(&'a CellNode),
}

impl ModelNode<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            ModelNode::Table(_) => NodeKind::Table,
            ModelNode::Section(section) => section.kind,
            ModelNode::Row(_) => NodeKind::Row,
            ModelNode::Cell(_) => NodeKind::Cell,
        }
    }

    pub fn element(&self) -> &NodeRef {
        match self {
            ModelNode::Table(table) => &table.element,
            ModelNode::Section(section) => &section.element,
            ModelNode::Row(row) => &row.element,
            ModelNode::Cell(cell) => &cell.element,
        }
    }

    pub fn style(&self) -> &StyleMapping {
        match self {
            ModelNode::Table(table) => &table.style,
            ModelNode::Section(section) => &section.style,
            ModelNode::Row(row) => &row.style,
            ModelNode::Cell(cell) => &cell.style,
        }
    }
}

impl TableNode {
    /// Builds the model for one `<table>` element.
    ///
    /// The head exists only when this table's first `<thead>` has element
    /// children. The body is the first `<tbody>`, or the table element itself
    /// when there is none; body rows are every `<tr>` of this table outside the
    /// head. A row inside a later `<tbody>` or `<tfoot>` inherits from that
    /// element instead of the first body. Rows of nested tables are never
    /// included.
    pub fn build(element: &NodeRef) -> Self {
        let style = Arc::new(element_style(element, None));

        let head = find_owned(element, element, "thead")
            .into_iter()
            .next()
            .filter(dom::has_element_children)
            .map(|thead| {
                let section_style = Arc::new(element_style(&thead, Some(&style)));
                let rows = find_owned(element, &thead, "tr")
                    .iter()
                    .map(|tr| RowNode::build(tr, &section_style))
                    .collect();
                SectionNode {
                    kind: NodeKind::Head,
                    element: thead,
                    style: section_style,
                    rows,
                }
            });

        let body_element = find_owned(element, element, "tbody").into_iter().next();
        let body_style = match &body_element {
            Some(tbody) => Arc::new(element_style(tbody, Some(&style))),
            None => Arc::new(StyleMapping::child_of(Some(&style), "")),
        };
        let head_element = head.as_ref().map(|section| section.element.clone());
        let mut section_styles: Vec<(NodeRef, Arc<StyleMapping>)> = Vec::new();
        if let Some(tbody) = &body_element {
            section_styles.push((tbody.clone(), body_style.clone()));
        }
        let rows = find_owned(element, element, "tr")
            .iter()
            .filter(|tr| {
                head_element
                    .as_ref()
                    .map(|thead| !tr.ancestors().any(|ancestor| &ancestor == thead))
                    .unwrap_or(true)
            })
            .map(|tr| {
                let parent = match row_section(element, tr) {
                    Some(section) => section_style(&mut section_styles, &section, &style),
                    None => body_style.clone(),
                };
                RowNode::build(tr, &parent)
            })
            .collect();
        let body = SectionNode {
            kind: NodeKind::Body,
            element: body_element.unwrap_or_else(|| element.clone()),
            style: body_style,
            rows,
        };

        Self {
            element: element.clone(),
            name: dom::attribute(element, "name"),
            style,
            head,
            body,
        }
    }

    /// Head section (if any) followed by the body section.
    pub fn sections(&self) -> impl Iterator<Item = &SectionNode> {
        self.head.iter().chain(std::iter::once(&self.body))
    }

    /// All rows in write order: head rows, then body rows.
    pub fn rows(&self) -> impl Iterator<Item = &RowNode> {
        self.sections().flat_map(|section| section.rows.iter())
    }

    /// Pre-order walk over every node of the tree.
    pub fn nodes(&self) -> Vec<ModelNode<'_>> {
        let mut out = vec![ModelNode::Table(self)];
        for section in self.sections() {
            out.push(ModelNode::Section(section));
            for row in &section.rows {
                out.push(ModelNode::Row(row));
                out.extend(row.cells.iter().map(ModelNode::Cell));
            }
        }
        out
    }

    pub fn cell_count(&self) -> usize {
        self.rows().map(|row| row.cells.len()).sum()
    }
}

impl RowNode {
    fn build(tr: &NodeRef, parent: &Arc<StyleMapping>) -> Self {
        let style = Arc::new(element_style(tr, Some(parent)));
        let cells = dom::child_elements(tr, "th")
            .into_iter()
            .chain(dom::child_elements(tr, "td"))
            .map(|cell| CellNode::build(&cell, &style))
            .collect();
        Self {
            element: tr.clone(),
            style,
            cells,
        }
    }
}

impl CellNode {
    fn build(element: &NodeRef, parent: &Arc<StyleMapping>) -> Self {
        Self {
            element: element.clone(),
            style: Arc::new(element_style(element, Some(parent))),
            text: dom::text_content(element, &TextPolicy::cell()),
            classes: dom::class_tokens(element),
            colspan: dom::span_attribute(element, "colspan"),
            rowspan: dom::span_attribute(element, "rowspan"),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|token| token == class)
    }
}

/// Every table of `document`, in document order, nested tables included.
pub fn build_tables(document: &NodeRef) -> Vec<TableNode> {
    dom::find_all(document, "table")
        .iter()
        .map(TableNode::build)
        .collect()
}

fn element_style(element: &NodeRef, parent: Option<&Arc<StyleMapping>>) -> StyleMapping {
    let style = dom::attribute(element, "style").unwrap_or_default();
    StyleMapping::child_of(parent, &style)
}

/// The `<tbody>` or `<tfoot>` of `table` enclosing `tr`.
fn row_section(table: &NodeRef, tr: &NodeRef) -> Option<NodeRef> {
    tr.ancestors()
        .take_while(|ancestor| ancestor != table)
        .find(|ancestor| dom::is_tag(ancestor, "tbody") || dom::is_tag(ancestor, "tfoot"))
}

fn section_style(
    cache: &mut Vec<(NodeRef, Arc<StyleMapping>)>,
    section: &NodeRef,
    table_style: &Arc<StyleMapping>,
) -> Arc<StyleMapping> {
    if let Some((_, style)) = cache.iter().find(|(element, _)| element == section) {
        return style.clone();
    }
    let style = Arc::new(element_style(section, Some(table_style)));
    cache.push((section.clone(), style.clone()));
    style
}

/// Descendants of `scope` named `tag` whose nearest enclosing table is `table`.
fn find_owned(table: &NodeRef, scope: &NodeRef, tag: &str) -> Vec<NodeRef> {
    dom::find_all(scope, tag)
        .into_iter()
        .filter(|node| dom::closest_ancestor(node, "table").as_ref() == Some(table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(html: &str) -> TableNode {
        let document = dom::parse_document(html);
        let element = dom::find_first(&document, "table").expect("table");
        TableNode::build(&element)
    }

    fn texts(row: &RowNode) -> Vec<&str> {
        row.cells.iter().map(|cell| cell.text.as_str()).collect()
    }

    #[test]
    fn head_and_body_sections() {
        let t = table(
            "<table name='report'><thead><tr><th>h1</th><th>h2</th></tr></thead>\
             <tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></tbody></table>",
        );
        assert_eq!(t.name.as_deref(), Some("report"));
        let head = t.head.as_ref().expect("head");
        assert_eq!(head.kind, NodeKind::Head);
        assert_eq!(head.rows.len(), 1);
        assert_eq!(texts(&head.rows[0]), vec!["h1", "h2"]);
        assert_eq!(t.body.kind, NodeKind::Body);
        assert_eq!(t.body.rows.len(), 2);
        assert_eq!(texts(&t.body.rows[1]), vec!["c", "d"]);
        assert_eq!(t.cell_count(), 6);
    }

    #[test]
    fn missing_body_falls_back_to_the_table() {
        let t = table("<table><tr><td>1</td></tr><tr><td>2</td></tr></table>");
        assert!(t.head.is_none());
        assert_eq!(t.body.rows.len(), 2);
        assert_eq!(texts(&t.body.rows[0]), vec!["1"]);
    }

    #[test]
    fn empty_head_is_absent() {
        let t = table("<table><thead></thead><tbody><tr><td>x</td></tr></tbody></table>");
        assert!(t.head.is_none());
        assert_eq!(t.rows().count(), 1);
    }

    #[test]
    fn header_cells_come_before_data_cells() {
        let t = table("<table><tr><td>d1</td><th>h1</th><td>d2</td><th>h2</th></tr></table>");
        assert_eq!(texts(&t.body.rows[0]), vec!["h1", "h2", "d1", "d2"]);
    }

    #[test]
    fn nested_tables_do_not_leak_rows() {
        let t = table(
            "<table><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table>",
        );
        assert_eq!(t.rows().count(), 1);
        assert_eq!(t.body.rows[0].cells.len(), 1);
    }

    #[test]
    fn styles_cascade_through_every_level() {
        let t = table(
            "<table style='font-weight: bold; color: red'><tbody style='text-align: left'>\
             <tr style='color: blue'><td style='vertical-align: top' class='TYPE_NUMERIC x' colspan='2'>7</td></tr>\
             </tbody></table>",
        );
        let cell = &t.body.rows[0].cells[0];
        assert_eq!(cell.style.get("font-weight"), Some("bold"));
        assert_eq!(cell.style.get("text-align"), Some("left"));
        assert_eq!(cell.style.get("color"), Some("blue"));
        assert_eq!(cell.style.get("vertical-align"), Some("top"));
        assert_eq!(cell.style.depth(), 3);
        assert!(cell.has_class("TYPE_NUMERIC"));
        assert_eq!(cell.colspan, 2);
        assert_eq!(cell.rowspan, 1);
    }

    #[test]
    fn later_bodies_and_footers_style_their_own_rows() {
        let t = table(
            "<table style='font-weight: bold'>\
             <tbody style='text-align: left'><tr><td>a</td></tr></tbody>\
             <tbody style='text-align: right'><tr><td>b</td></tr></tbody>\
             <tfoot style='color: green'><tr><td>c</td></tr></tfoot></table>",
        );
        let rows = &t.body.rows;
        assert_eq!(rows.len(), 3, "every body and footer row is kept");
        let first = &rows[0].cells[0].style;
        let second = &rows[1].cells[0].style;
        let footer = &rows[2].cells[0].style;
        assert_eq!(first.get("text-align"), Some("left"));
        assert_eq!(second.get("text-align"), Some("right"), "second tbody style applies");
        assert_eq!(second.get("font-weight"), Some("bold"), "table style still inherited");
        assert_eq!(footer.get("text-align"), None, "footer does not inherit the first tbody");
        assert_eq!(footer.get("color"), Some("green"));
    }

    #[test]
    fn nodes_walk_in_pre_order() {
        let t = table("<table><thead><tr><th>h</th></tr></thead><tr><td>a</td></tr></table>");
        let kinds: Vec<NodeKind> = t.nodes().iter().map(ModelNode::kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Table,
                NodeKind::Head,
                NodeKind::Row,
                NodeKind::Cell,
                NodeKind::Body,
                NodeKind::Row,
                NodeKind::Cell,
            ]
        );
        let cell = t.nodes()[3];
        assert_eq!(dom::tag_name(cell.element()).as_deref(), Some("th"));
        assert!(cell.style().parent().is_some());
    }

    #[test]
    fn build_tables_is_document_ordered() {
        let document = dom::parse_document(
            "<table name='first'><tr><td>1</td></tr></table><p>gap</p><table name='second'></table>",
        );
        let names: Vec<Option<String>> =
            build_tables(&document).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![Some("first".to_string()), Some("second".to_string())]);
    }
}
